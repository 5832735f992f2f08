//! Message handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use frontdesk_core::{Message, Page, PageRequest};

use crate::abilities::NewMessage;
use crate::auth::AuthStaff;
use crate::error::ApiResult;
use crate::handlers::PageQuery;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMessagesQuery {
    pub limit: Option<i64>,
    pub after: Option<Uuid>,
    pub conversation_id: Option<Uuid>,
}

/// `GET /api/v1/messages`
pub async fn list_messages(
    State(state): State<AppState>,
    AuthStaff(staff): AuthStaff,
    Query(query): Query<ListMessagesQuery>,
) -> ApiResult<Json<Page<Message>>> {
    let page = PageRequest::new(query.limit, query.after);
    let messages = state
        .abilities(staff)
        .get_messages(query.conversation_id, &page)
        .await?;
    Ok(Json(messages))
}

/// `GET /api/v1/conversations/:id/messages`
pub async fn list_conversation_messages(
    State(state): State<AppState>,
    AuthStaff(staff): AuthStaff,
    Path(conversation_id): Path<Uuid>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<Page<Message>>> {
    let messages = state
        .abilities(staff)
        .get_messages(Some(conversation_id), &page.into())
        .await?;
    Ok(Json(messages))
}

/// `POST /api/v1/conversations/:id/messages`
pub async fn send_message(
    State(state): State<AppState>,
    AuthStaff(staff): AuthStaff,
    Path(conversation_id): Path<Uuid>,
    Json(body): Json<NewMessage>,
) -> ApiResult<(StatusCode, Json<Message>)> {
    let message = state
        .abilities(staff)
        .send_message(conversation_id, body)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// `GET /api/v1/messages/:id`
pub async fn get_message(
    State(state): State<AppState>,
    AuthStaff(staff): AuthStaff,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Message>> {
    Ok(Json(state.abilities(staff).get_message(id).await?))
}

/// `DELETE /api/v1/messages/:id`
pub async fn delete_message(
    State(state): State<AppState>,
    AuthStaff(staff): AuthStaff,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Message>> {
    Ok(Json(state.abilities(staff).delete_message(id).await?))
}
