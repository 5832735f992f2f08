//! Outbound delivery of staff messages and inbound delivery confirmations.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use frontdesk_core::delivery::InvalidTransition;
use frontdesk_core::provider::BusinessAuthor;
use frontdesk_core::{
    defaults, send_eligibility, DeliveryStatus, DeliveryTransition, DeliveryUpdate, Error,
    Message, OutboundMessage, ProviderClient, Result, SendEligibility, SkipReason,
};
use frontdesk_db::Database;

use crate::handler::{JobContext, JobHandler, JobResult};
use crate::queue::DeliverMessage;

/// What a delivery run did.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryOutcome {
    /// The provider accepted the message.
    Sent(Message),
    /// The message is not eligible; nothing was sent.
    Skipped(SkipReason),
}

/// Posts locally authored messages to the provider.
pub struct MessageDelivery {
    db: Database,
    provider: Arc<dyn ProviderClient>,
}

impl MessageDelivery {
    pub fn new(db: Database, provider: Arc<dyn ProviderClient>) -> Self {
        Self { db, provider }
    }

    /// Deliver one message.
    ///
    /// Ineligible messages are skipped, so running this twice for the same
    /// message never posts twice once the first run recorded the provider id.
    /// A provider error marks the message `FAILED` and is returned.
    pub async fn deliver(&self, message_id: Uuid) -> Result<DeliveryOutcome> {
        let message = self
            .db
            .messages
            .get(message_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("message {message_id}")))?;
        let conversation = self
            .db
            .conversations
            .get(message.conversation_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("conversation {}", message.conversation_id)))?;

        let external_conversation_id = match send_eligibility(&conversation, &message) {
            SendEligibility::Skip(reason) => {
                debug!(
                    subsystem = "jobs",
                    component = "delivery",
                    message_id = %message_id,
                    reason = ?reason,
                    "Skipping delivery"
                );
                return Ok(DeliveryOutcome::Skipped(reason));
            }
            SendEligibility::Eligible => conversation.external_conversation_id.unwrap_or_default(),
        };

        let author_name = match message.author_id {
            Some(staff_id) => self.db.staff.get(staff_id).await?.map(|s| s.display_name),
            None => None,
        };
        let body = OutboundMessage {
            author: BusinessAuthor::new(author_name),
            content: message.content.clone(),
            metadata: None,
        };

        let posted = self
            .provider
            .post_message(self.provider.app_id(), &external_conversation_id, &body)
            .await;

        match posted {
            Ok(posted) => {
                let status = transition(&message, DeliveryTransition::ProviderAccepted)?;
                let updated = self
                    .db
                    .messages
                    .update_delivery(
                        message.id,
                        DeliveryUpdate {
                            status,
                            external_message_id: Some(posted.id),
                            error: None,
                        },
                    )
                    .await?;
                info!(
                    subsystem = "jobs",
                    component = "delivery",
                    message_id = %message_id,
                    conversation_id = %message.conversation_id,
                    "Message delivered to provider"
                );
                Ok(DeliveryOutcome::Sent(updated))
            }
            Err(err) => {
                let status = transition(&message, DeliveryTransition::ProviderRejected)?;
                self.db
                    .messages
                    .update_delivery(
                        message.id,
                        DeliveryUpdate {
                            status,
                            external_message_id: None,
                            error: Some(err.message()),
                        },
                    )
                    .await?;
                warn!(
                    subsystem = "jobs",
                    component = "delivery",
                    message_id = %message_id,
                    error = %err,
                    "Provider rejected message"
                );
                Err(err)
            }
        }
    }
}

fn transition(message: &Message, transition: DeliveryTransition) -> Result<DeliveryStatus> {
    message
        .customer_delivery_status
        .apply(transition)
        .map_err(|e: InvalidTransition| Error::Internal(e.to_string()))
}

/// Provider verdict carried by a delivery webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryConfirmation {
    Delivered,
    Failed(Option<String>),
}

/// Apply a delivery confirmation to the message with the given provider id.
///
/// Returns `NotFound` when no message carries that id. Confirmations that the
/// state machine rejects (for instance a late failure for a message that was
/// already delivered) are logged and leave the message unchanged.
pub async fn confirm_delivery(
    db: &Database,
    external_message_id: &str,
    confirmation: DeliveryConfirmation,
) -> Result<Message> {
    let message = db
        .messages
        .find_by_external_id(external_message_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("message with provider id {external_message_id}")))?;

    let (event, error) = match confirmation {
        DeliveryConfirmation::Delivered => (DeliveryTransition::ConfirmedDelivered, None),
        DeliveryConfirmation::Failed(reason) => (
            DeliveryTransition::ConfirmedFailed,
            Some(reason.unwrap_or_else(|| defaults::DELIVERY_FAILURE_DEFAULT.to_string())),
        ),
    };

    let status = match message.customer_delivery_status.apply(event) {
        Ok(status) => status,
        Err(e) => {
            debug!(
                subsystem = "jobs",
                component = "delivery",
                message_id = %message.id,
                error = %e,
                "Ignoring delivery confirmation"
            );
            return Ok(message);
        }
    };

    db.messages
        .update_delivery(
            message.id,
            DeliveryUpdate {
                status,
                external_message_id: None,
                error,
            },
        )
        .await
}

/// Job handler for `messages/deliver`.
pub struct DeliveryJobHandler {
    delivery: MessageDelivery,
}

impl DeliveryJobHandler {
    pub fn new(db: Database, provider: Arc<dyn ProviderClient>) -> Self {
        Self {
            delivery: MessageDelivery::new(db, provider),
        }
    }
}

#[async_trait]
impl JobHandler for DeliveryJobHandler {
    fn queue(&self) -> &'static str {
        defaults::MESSAGE_QUEUE
    }

    fn kind(&self) -> &'static str {
        defaults::JOB_KIND_DELIVER
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        let payload: DeliverMessage = match ctx.parse_payload() {
            Ok(payload) => payload,
            Err(e) => return JobResult::Failed(e.to_string()),
        };

        match self.delivery.deliver(payload.message_id).await {
            Ok(DeliveryOutcome::Sent(message)) => JobResult::Success(Some(json!({
                "status": message.customer_delivery_status,
                "sunshineMessageId": message.external_message_id,
            }))),
            Ok(DeliveryOutcome::Skipped(reason)) => {
                JobResult::Success(Some(json!({ "skipped": reason })))
            }
            // Deleted before it could be sent.
            Err(Error::NotFound(detail)) => JobResult::Failed(format!("Not found: {detail}")),
            Err(e) => {
                if !ctx.has_attempts_left() {
                    warn!(
                        subsystem = "jobs",
                        component = "delivery",
                        message_id = %payload.message_id,
                        attempt = ctx.attempt(),
                        error = %e,
                        "Delivery attempts exhausted, message stays FAILED"
                    );
                }
                JobResult::from_error(&e)
            }
        }
    }
}
