//! Dispatch of inbound provider events.
//!
//! Every handler is safe to run more than once for the same event: the
//! provider delivers at least once and the queue may replay a job.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

use frontdesk_core::webhook::{
    event_types, ConversationCreatePayload, ConversationMessagePayload, ConversationReadPayload,
    DeliveryPayload,
};
use frontdesk_core::{
    defaults, AuthorType, CreateMessageRequest, Error, ExternalConversation, ReaderType, Result,
    UpsertReadReceiptRequest, WebhookEvent,
};
use frontdesk_db::Database;

use crate::delivery::{confirm_delivery, DeliveryConfirmation};
use crate::handler::{JobContext, JobHandler, JobResult};

/// Handles one provider event type.
#[async_trait]
pub trait WebhookHandler: Send + Sync {
    async fn handle(&self, db: &Database, event: &WebhookEvent) -> Result<()>;
}

/// What the dispatcher did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Handled,
    /// No handler for the event type.
    Ignored,
}

/// Event type → handler table.
pub struct WebhookDispatcher {
    db: Database,
    handlers: HashMap<String, Arc<dyn WebhookHandler>>,
}

impl WebhookDispatcher {
    /// Dispatcher with a handler for every subscribed trigger.
    pub fn new(db: Database) -> Self {
        Self::empty(db)
            .with_handler(event_types::CONVERSATION_CREATE, ConversationCreateHandler)
            .with_handler(event_types::CONVERSATION_MESSAGE, ConversationMessageHandler)
            .with_handler(event_types::CONVERSATION_READ, ConversationReadHandler)
            .with_handler(event_types::DELIVERY_CHANNEL, DeliveryConfirmationHandler)
            .with_handler(event_types::DELIVERY_USER, DeliveryConfirmationHandler)
            .with_handler(event_types::DELIVERY_FAILURE, DeliveryConfirmationHandler)
    }

    /// Dispatcher with no handlers; every event is ignored.
    pub fn empty(db: Database) -> Self {
        Self {
            db,
            handlers: HashMap::new(),
        }
    }

    pub fn with_handler<H: WebhookHandler + 'static>(
        mut self,
        event_type: impl Into<String>,
        handler: H,
    ) -> Self {
        self.handlers.insert(event_type.into(), Arc::new(handler));
        self
    }

    pub fn handles(&self, event_type: &str) -> bool {
        self.handlers.contains_key(event_type)
    }

    /// Run the handler registered for the event's type. Unknown types are
    /// ignored without error.
    pub async fn dispatch(&self, event: &WebhookEvent) -> Result<Dispatch> {
        let Some(handler) = self.handlers.get(&event.event_type) else {
            debug!(
                subsystem = "jobs",
                component = "dispatcher",
                event_id = %event.id,
                event_type = %event.event_type,
                "No handler for webhook event type"
            );
            return Ok(Dispatch::Ignored);
        };
        handler.handle(&self.db, event).await?;
        info!(
            subsystem = "jobs",
            component = "dispatcher",
            event_id = %event.id,
            event_type = %event.event_type,
            "Webhook event handled"
        );
        Ok(Dispatch::Handled)
    }
}

/// `conversation:create`: upsert the customer, then the conversation.
pub struct ConversationCreateHandler;

#[async_trait]
impl WebhookHandler for ConversationCreateHandler {
    async fn handle(&self, db: &Database, event: &WebhookEvent) -> Result<()> {
        let payload: ConversationCreatePayload = event.parse_payload()?;
        let user = payload.user.as_ref().ok_or_else(|| {
            Error::Unprocessable(format!("conversation:create {} carries no user", event.id))
        })?;

        let customer = db.customers.upsert_profile(user.to_profile()).await?;
        let conversation = db
            .conversations
            .upsert_external(ExternalConversation {
                external_conversation_id: payload.conversation.id.clone(),
                customer_id: customer.id,
                source: payload.source.map(|s| s.source_type),
                metadata: payload
                    .conversation
                    .metadata
                    .clone()
                    .unwrap_or_else(|| json!({})),
            })
            .await?;
        debug!(
            subsystem = "jobs",
            component = "dispatcher",
            conversation_id = %conversation.id,
            "Provider conversation stored"
        );
        Ok(())
    }
}

/// `conversation:message`: store a customer message once.
pub struct ConversationMessageHandler;

#[async_trait]
impl WebhookHandler for ConversationMessageHandler {
    async fn handle(&self, db: &Database, event: &WebhookEvent) -> Result<()> {
        let payload: ConversationMessagePayload = event.parse_payload()?;
        let inbound = &payload.message;

        // Business messages come back as webhooks too; they are stored already.
        if !inbound.author.is_user() {
            return Ok(());
        }
        if db.messages.find_by_external_id(&inbound.id).await?.is_some() {
            debug!(
                subsystem = "jobs",
                component = "dispatcher",
                event_id = %event.id,
                "Inbound message already stored"
            );
            return Ok(());
        }

        let conversation = db
            .conversations
            .find_by_external_id(&payload.conversation.id)
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!("conversation {}", payload.conversation.id))
            })?;
        let user_id = inbound.author.provider_user_id().ok_or_else(|| {
            Error::Unprocessable(format!("message {} has no author user id", inbound.id))
        })?;
        let customer = db
            .customers
            .find_by_sunshine_user_id(user_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("customer {user_id}")))?;

        db.messages
            .create(CreateMessageRequest {
                conversation_id: conversation.id,
                author_type: AuthorType::Customer,
                author_id: Some(customer.id),
                content: inbound.content()?,
                external_message_id: Some(inbound.id.clone()),
                metadata: json!({}),
            })
            .await?;
        db.conversations.touch(conversation.id).await?;
        Ok(())
    }
}

/// `conversation:read`: move the customer's read receipt to the latest message.
pub struct ConversationReadHandler;

#[async_trait]
impl WebhookHandler for ConversationReadHandler {
    async fn handle(&self, db: &Database, event: &WebhookEvent) -> Result<()> {
        let payload: ConversationReadPayload = event.parse_payload()?;

        let Some(user_id) = payload
            .author()
            .filter(|a| a.is_user())
            .and_then(|a| a.provider_user_id())
        else {
            return Ok(());
        };
        let Some(customer) = db.customers.find_by_sunshine_user_id(user_id).await? else {
            return Ok(());
        };
        let Some(conversation) = db
            .conversations
            .find_by_external_id(&payload.conversation.id)
            .await?
        else {
            return Ok(());
        };
        let Some(latest) = db.messages.latest_in_conversation(conversation.id).await? else {
            return Ok(());
        };

        db.read_receipts
            .upsert(UpsertReadReceiptRequest {
                conversation_id: conversation.id,
                user_id: customer.id,
                user_type: ReaderType::Customer,
                last_read_message_id: latest.id,
            })
            .await?;
        Ok(())
    }
}

/// `conversation:message:delivery:{channel,user,failure}`.
pub struct DeliveryConfirmationHandler;

#[async_trait]
impl WebhookHandler for DeliveryConfirmationHandler {
    async fn handle(&self, db: &Database, event: &WebhookEvent) -> Result<()> {
        let payload: DeliveryPayload = event.parse_payload()?;
        let confirmation = if event.event_type == event_types::DELIVERY_FAILURE {
            DeliveryConfirmation::Failed(payload.error_text())
        } else {
            DeliveryConfirmation::Delivered
        };
        confirm_delivery(db, &payload.message.id, confirmation).await?;
        Ok(())
    }
}

/// Job handler for `webhooks/process`.
pub struct WebhookJobHandler {
    dispatcher: Arc<WebhookDispatcher>,
}

impl WebhookJobHandler {
    pub fn new(dispatcher: Arc<WebhookDispatcher>) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl JobHandler for WebhookJobHandler {
    fn queue(&self) -> &'static str {
        defaults::WEBHOOK_QUEUE
    }

    fn kind(&self) -> &'static str {
        defaults::JOB_KIND_PROCESS
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        let event: WebhookEvent = match ctx.parse_payload() {
            Ok(event) => event,
            Err(e) => return JobResult::Failed(e.to_string()),
        };
        match self.dispatcher.dispatch(&event).await {
            Ok(Dispatch::Handled) => JobResult::Success(None),
            Ok(Dispatch::Ignored) => JobResult::Success(Some(json!({ "ignored": event.event_type }))),
            Err(e) => JobResult::from_error(&e),
        }
    }
}
