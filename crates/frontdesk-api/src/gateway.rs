//! Live subscriptions over Server-Sent Events.
//!
//! Each subscriber gets its own receiver on the event bus. Events are first
//! matched against the static [`SubscriptionFilter`], then visibility is
//! re-resolved for every event at delivery time: the staff member is reloaded
//! and the event's conversation looked up through the visibility-scoped
//! query. A membership or permission change therefore takes effect on the
//! next event without reconnecting. Dropping the stream unsubscribes.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive};
use axum::response::Sse;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};
use uuid::Uuid;

use frontdesk_core::{
    Error, EventEnvelope, MessageAction, Result, Staff, SubscriptionFilter, Visibility,
};
use frontdesk_db::Database;

use crate::auth::AuthStaff;
use crate::error::ApiResult;
use crate::AppState;

/// Whether `staff_id` may currently see the event.
async fn still_visible(db: &Database, staff_id: Uuid, envelope: &EventEnvelope) -> Result<bool> {
    let Some(staff) = db.staff.get(staff_id).await? else {
        return Ok(false);
    };
    let scope = Visibility::for_staff(&staff);
    Ok(db
        .conversations
        .get_visible(&scope, envelope.conversation_id)
        .await?
        .is_some())
}

/// Envelopes the staff member is allowed to receive under `filter`.
pub fn live_events(
    db: Database,
    staff: &Staff,
    filter: SubscriptionFilter,
) -> impl Stream<Item = EventEnvelope> + Send + 'static {
    let staff_id = staff.id;
    let rx = db.events.subscribe();

    BroadcastStream::new(rx).filter_map(move |item| {
        let db = db.clone();
        let filter = filter.clone();
        async move {
            let envelope = match item {
                Ok(envelope) => envelope,
                Err(BroadcastStreamRecvError::Lagged(missed)) => {
                    warn!(
                        subsystem = "gateway",
                        staff_id = %staff_id,
                        missed,
                        "Subscriber lagged, events dropped"
                    );
                    return None;
                }
            };
            if !filter.accepts(&envelope.payload) {
                return None;
            }
            match still_visible(&db, staff_id, &envelope).await {
                Ok(true) => Some(envelope),
                Ok(false) => {
                    debug!(
                        subsystem = "gateway",
                        staff_id = %staff_id,
                        event_id = %envelope.event_id,
                        "Event not visible to subscriber"
                    );
                    None
                }
                Err(e) => {
                    warn!(
                        subsystem = "gateway",
                        staff_id = %staff_id,
                        error = %e,
                        "Visibility check failed, event dropped"
                    );
                    None
                }
            }
        }
    })
}

fn to_sse(envelope: EventEnvelope) -> Option<Event> {
    let data = serde_json::to_string(&envelope).ok()?;
    Some(
        Event::default()
            .event(envelope.event_type)
            .id(envelope.event_id.to_string())
            .data(data),
    )
}

fn sse_response(
    state: &AppState,
    staff: &Staff,
    filter: SubscriptionFilter,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    debug!(
        subsystem = "gateway",
        staff_id = %staff.id,
        kind = ?filter.kind,
        conversation_id = ?filter.conversation_id,
        "Subscription opened"
    );
    let stream = live_events(state.db.clone(), staff, filter).filter_map(|envelope| async move {
        to_sse(envelope).map(Ok::<Event, Infallible>)
    });
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(state.config.sse_keepalive_secs))
            .text("keepalive"),
    )
}

/// Comma list of message actions, e.g. `create,delete`.
pub fn parse_actions(raw: Option<&str>) -> Result<Vec<MessageAction>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(|a| {
            MessageAction::parse(a)
                .ok_or_else(|| Error::Unprocessable(format!("Unknown message action: {a}")))
        })
        .collect()
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSubscriptionQuery {
    pub conversation_id: Option<Uuid>,
    pub actions: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceiptSubscriptionQuery {
    pub conversation_id: Option<Uuid>,
}

/// `GET /api/v1/subscriptions/messages`
pub async fn message_events(
    State(state): State<AppState>,
    AuthStaff(staff): AuthStaff,
    Query(query): Query<MessageSubscriptionQuery>,
) -> ApiResult<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let filter = SubscriptionFilter::messages()
        .with_conversation(query.conversation_id)
        .with_actions(parse_actions(query.actions.as_deref())?);
    Ok(sse_response(&state, &staff, filter))
}

/// `GET /api/v1/subscriptions/read-receipts`
pub async fn read_receipt_events(
    State(state): State<AppState>,
    AuthStaff(staff): AuthStaff,
    Query(query): Query<ReadReceiptSubscriptionQuery>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let filter = SubscriptionFilter::read_receipts().with_conversation(query.conversation_id);
    sse_response(&state, &staff, filter)
}
