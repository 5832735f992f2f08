//! In-memory message and read receipt repositories.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use frontdesk_core::cursor::{paginate, Cursor, SortDirection};
use frontdesk_core::{
    new_v7, CreateMessageRequest, DeliveryStatus, DeliveryUpdate, Error, EventBus, Message,
    MessageAction, MessageRepository, Page, PageRequest, ReadReceipt, ReadReceiptRepository,
    Result, UpsertReadReceiptRequest, Visibility,
};

use super::SharedState;

pub struct MemoryMessageRepository {
    state: SharedState,
    events: Arc<EventBus>,
}

impl MemoryMessageRepository {
    pub(crate) fn new(state: SharedState, events: Arc<EventBus>) -> Self {
        Self { state, events }
    }
}

#[async_trait]
impl MessageRepository for MemoryMessageRepository {
    async fn list(
        &self,
        scope: &Visibility,
        conversation_id: Option<Uuid>,
        page: &PageRequest,
    ) -> Result<Page<Message>> {
        let state = self.state.read().await;
        let rows: Vec<Message> = state
            .messages
            .values()
            .filter(|m| conversation_id.map_or(true, |id| m.conversation_id == id))
            .filter(|m| state.is_visible_id(scope, m.conversation_id))
            .cloned()
            .collect();
        Ok(paginate(rows, page, SortDirection::Desc, |m: &Message| {
            Cursor::new(m.created_at, m.id)
        }))
    }

    async fn get_visible(&self, scope: &Visibility, id: Uuid) -> Result<Option<Message>> {
        let state = self.state.read().await;
        Ok(state
            .messages
            .get(&id)
            .filter(|m| state.is_visible_id(scope, m.conversation_id))
            .cloned())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Message>> {
        Ok(self.state.read().await.messages.get(&id).cloned())
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Message>> {
        let state = self.state.read().await;
        Ok(state
            .messages
            .values()
            .find(|m| m.external_message_id.as_deref() == Some(external_id))
            .cloned())
    }

    async fn create(&self, req: CreateMessageRequest) -> Result<Message> {
        let message = {
            let mut state = self.state.write().await;
            if let Some(external_id) = req.external_message_id.as_deref() {
                if let Some(existing) = state
                    .messages
                    .values()
                    .find(|m| m.external_message_id.as_deref() == Some(external_id))
                {
                    return Ok(existing.clone());
                }
            }
            if !state.conversations.contains_key(&req.conversation_id) {
                return Err(Error::NotFound(format!(
                    "conversation {}",
                    req.conversation_id
                )));
            }

            let now = Utc::now();
            let message = Message {
                id: new_v7(),
                conversation_id: req.conversation_id,
                author_type: req.author_type,
                author_id: req.author_id,
                content: req.content,
                external_message_id: req.external_message_id,
                customer_delivery_status: DeliveryStatus::Unsent,
                customer_delivery_error: None,
                metadata: req.metadata,
                created_at: now,
                updated_at: now,
            };
            state.messages.insert(message.id, message.clone());
            message
        };
        self.events.publish_message(MessageAction::Create, &message);
        Ok(message)
    }

    async fn latest_in_conversation(&self, conversation_id: Uuid) -> Result<Option<Message>> {
        let state = self.state.read().await;
        Ok(state
            .messages
            .values()
            .filter(|m| m.conversation_id == conversation_id)
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
            .cloned())
    }

    async fn update_delivery(&self, id: Uuid, update: DeliveryUpdate) -> Result<Message> {
        let message = {
            let mut state = self.state.write().await;
            let message = state
                .messages
                .get_mut(&id)
                .ok_or_else(|| Error::NotFound(format!("message {id}")))?;
            message.customer_delivery_status = update.status;
            if update.external_message_id.is_some() {
                message.external_message_id = update.external_message_id;
            }
            message.customer_delivery_error = update.error;
            message.updated_at = Utc::now();
            message.clone()
        };
        self.events.publish_message(MessageAction::Update, &message);
        Ok(message)
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Message>> {
        let removed = self.state.write().await.messages.remove(&id);
        if let Some(message) = &removed {
            self.events.publish_message(MessageAction::Delete, message);
        }
        Ok(removed)
    }
}

pub struct MemoryReadReceiptRepository {
    state: SharedState,
    events: Arc<EventBus>,
}

impl MemoryReadReceiptRepository {
    pub(crate) fn new(state: SharedState, events: Arc<EventBus>) -> Self {
        Self { state, events }
    }
}

#[async_trait]
impl ReadReceiptRepository for MemoryReadReceiptRepository {
    async fn upsert(&self, req: UpsertReadReceiptRequest) -> Result<ReadReceipt> {
        let now = Utc::now();
        let receipt = {
            let mut state = self.state.write().await;
            let existing = state.read_receipts.values_mut().find(|r| {
                r.user_id == req.user_id
                    && r.user_type == req.user_type
                    && r.conversation_id == req.conversation_id
            });
            match existing {
                Some(receipt) => {
                    receipt.last_read_message_id = req.last_read_message_id;
                    receipt.updated_at = now;
                    receipt.clone()
                }
                None => {
                    let receipt = ReadReceipt {
                        id: new_v7(),
                        conversation_id: req.conversation_id,
                        user_id: req.user_id,
                        user_type: req.user_type,
                        last_read_message_id: req.last_read_message_id,
                        created_at: now,
                        updated_at: now,
                    };
                    state.read_receipts.insert(receipt.id, receipt.clone());
                    receipt
                }
            }
        };
        self.events.publish_read_receipt(&receipt);
        Ok(receipt)
    }

    async fn list(&self, scope: &Visibility, conversation_id: Uuid) -> Result<Vec<ReadReceipt>> {
        let state = self.state.read().await;
        if !state.is_visible_id(scope, conversation_id) {
            return Ok(Vec::new());
        }
        let mut receipts: Vec<ReadReceipt> = state
            .read_receipts
            .values()
            .filter(|r| r.conversation_id == conversation_id)
            .cloned()
            .collect();
        receipts.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        Ok(receipts)
    }
}
