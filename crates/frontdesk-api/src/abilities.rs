//! Capability-scoped operations for an authenticated staff member.
//!
//! Every read goes through the caller's [`Visibility`], which the storage
//! layer applies inside its queries. Mutations on an existing conversation
//! first resolve it through the visibility-scoped lookup; a conversation that
//! does not exist and one the caller cannot see both yield `Forbidden`.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::{info, warn};
use uuid::Uuid;

use frontdesk_core::rules::conversation_members_for_create;
use frontdesk_core::{
    send_eligibility, Activity, ActivityType, AuthorType, Conversation, ConversationFilter,
    ConversationType, CreateConversationRequest, CreateMessageRequest, Customer, Error, Message,
    MessageContent, Page, PageRequest, ProviderClient, ReadReceipt, ReaderType, Result,
    SendEligibility, Staff, Tag, UpsertReadReceiptRequest, Visibility,
};
use frontdesk_db::Database;
use frontdesk_jobs::enqueue_delivery;

/// Input of `createConversation`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewConversation {
    #[serde(rename = "type")]
    pub conversation_type: ConversationType,
    #[serde(default)]
    pub member_ids: Vec<Uuid>,
    #[serde(default)]
    pub metadata: Option<JsonValue>,
}

/// Input of `sendMessage`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewMessage {
    pub content: MessageContent,
    #[serde(default)]
    pub metadata: Option<JsonValue>,
}

/// Operations available to one staff member.
pub struct Abilities {
    db: Database,
    provider: Option<Arc<dyn ProviderClient>>,
    staff: Staff,
    scope: Visibility,
}

impl Abilities {
    pub fn new(db: Database, provider: Option<Arc<dyn ProviderClient>>, staff: Staff) -> Self {
        let scope = Visibility::for_staff(&staff);
        Self {
            db,
            provider,
            staff,
            scope,
        }
    }

    pub fn staff(&self) -> &Staff {
        &self.staff
    }

    pub fn scope(&self) -> &Visibility {
        &self.scope
    }

    /// Visible conversation or `Forbidden`.
    async fn visible_conversation(&self, id: Uuid) -> Result<Conversation> {
        self.db
            .conversations
            .get_visible(&self.scope, id)
            .await?
            .ok_or_else(Error::forbidden)
    }

    async fn require_existing_staff(&self, ids: &[Uuid]) -> Result<()> {
        let existing = self.db.staff.existing_ids(ids).await?;
        let unknown: Vec<String> = ids
            .iter()
            .filter(|id| !existing.contains(id))
            .map(|id| id.to_string())
            .collect();
        if !unknown.is_empty() {
            return Err(Error::Unprocessable(format!(
                "Unknown staff members: {}",
                unknown.join(", ")
            )));
        }
        Ok(())
    }

    // =========================================================================
    // CONVERSATIONS
    // =========================================================================

    pub async fn get_conversations(
        &self,
        filter: &ConversationFilter,
        page: &PageRequest,
    ) -> Result<Page<Conversation>> {
        self.db.conversations.list(&self.scope, filter, page).await
    }

    pub async fn get_conversation(&self, id: Uuid) -> Result<Conversation> {
        self.visible_conversation(id).await
    }

    pub async fn get_conversation_members(&self, id: Uuid) -> Result<Vec<Uuid>> {
        self.visible_conversation(id).await?;
        self.db.conversations.members(id).await
    }

    /// Create a staff conversation. The caller always becomes a member.
    pub async fn create_conversation(&self, input: NewConversation) -> Result<Conversation> {
        let members = conversation_members_for_create(
            self.staff.id,
            input.conversation_type,
            &input.member_ids,
        )?;
        self.require_existing_staff(&members).await?;

        let conversation = self
            .db
            .conversations
            .create(CreateConversationRequest {
                conversation_type: input.conversation_type,
                member_ids: members,
                metadata: input.metadata.unwrap_or_else(|| json!({})),
            })
            .await?;
        info!(
            subsystem = "api",
            component = "abilities",
            op = "create_conversation",
            conversation_id = %conversation.id,
            staff_id = %self.staff.id,
            "Conversation created"
        );
        Ok(conversation)
    }

    pub async fn join_conversation(&self, id: Uuid) -> Result<Conversation> {
        let conversation = self.visible_conversation(id).await?;
        self.db
            .conversations
            .add_members(conversation.id, &[self.staff.id])
            .await?;
        Ok(conversation)
    }

    pub async fn add_to_conversation(&self, id: Uuid, staff_ids: &[Uuid]) -> Result<Conversation> {
        let conversation = self.visible_conversation(id).await?;
        if staff_ids.is_empty() {
            return Err(Error::Unprocessable(
                "At least one staff member is required".to_string(),
            ));
        }
        self.require_existing_staff(staff_ids).await?;
        self.db
            .conversations
            .add_members(conversation.id, staff_ids)
            .await?;
        Ok(conversation)
    }

    pub async fn touch_conversation(&self, id: Uuid) -> Result<Conversation> {
        self.visible_conversation(id).await?;
        self.db.conversations.touch(id).await
    }

    // =========================================================================
    // MESSAGES
    // =========================================================================

    /// Visible messages, newest first. Listing a conversation the caller
    /// cannot see yields an empty page.
    pub async fn get_messages(
        &self,
        conversation_id: Option<Uuid>,
        page: &PageRequest,
    ) -> Result<Page<Message>> {
        self.db
            .messages
            .list(&self.scope, conversation_id, page)
            .await
    }

    pub async fn get_message(&self, id: Uuid) -> Result<Message> {
        self.db
            .messages
            .get_visible(&self.scope, id)
            .await?
            .ok_or_else(Error::forbidden)
    }

    /// Store a staff message and queue its delivery when it is bound for a
    /// customer.
    ///
    /// A customer-bound message is never left without a delivery job: if the
    /// job cannot be queued the message is removed again and the error is
    /// returned.
    pub async fn send_message(&self, conversation_id: Uuid, input: NewMessage) -> Result<Message> {
        let conversation = self.visible_conversation(conversation_id).await?;
        input.content.validate()?;

        let message = self
            .db
            .messages
            .create(CreateMessageRequest {
                conversation_id: conversation.id,
                author_type: AuthorType::Staff,
                author_id: Some(self.staff.id),
                content: input.content,
                external_message_id: None,
                metadata: input.metadata.unwrap_or_else(|| json!({})),
            })
            .await?;

        if send_eligibility(&conversation, &message) == SendEligibility::Eligible {
            let job = match enqueue_delivery(self.db.jobs.as_ref(), message.id).await {
                Ok(job) => job,
                Err(err) => {
                    warn!(
                        subsystem = "api",
                        component = "abilities",
                        op = "send_message",
                        message_id = %message.id,
                        error = %err,
                        "Delivery could not be queued, removing message"
                    );
                    if let Err(cleanup) = self.db.messages.delete(message.id).await {
                        warn!(
                            subsystem = "api",
                            component = "abilities",
                            message_id = %message.id,
                            error = %cleanup,
                            "Failed to remove undeliverable message"
                        );
                    }
                    return Err(err);
                }
            };
            info!(
                subsystem = "api",
                component = "abilities",
                op = "send_message",
                message_id = %message.id,
                job_id = %job.id,
                "Delivery queued"
            );
        }
        // Best effort once the message is stored and queued.
        if let Err(err) = self.db.conversations.touch(conversation.id).await {
            warn!(
                subsystem = "api",
                component = "abilities",
                op = "send_message",
                conversation_id = %conversation.id,
                error = %err,
                "Failed to touch conversation"
            );
        }
        Ok(message)
    }

    pub async fn delete_message(&self, id: Uuid) -> Result<Message> {
        let message = self.get_message(id).await?;
        self.db
            .messages
            .delete(message.id)
            .await?
            .ok_or_else(Error::forbidden)
    }

    // =========================================================================
    // CUSTOMERS
    // =========================================================================

    fn require_customer_access(&self) -> Result<()> {
        if self.scope.can_see_customers() {
            Ok(())
        } else {
            Err(Error::forbidden())
        }
    }

    pub async fn get_customers(&self, page: &PageRequest) -> Result<Page<Customer>> {
        self.require_customer_access()?;
        self.db.customers.list(page).await
    }

    pub async fn get_customer(&self, id: Uuid) -> Result<Customer> {
        self.require_customer_access()?;
        self.db
            .customers
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("customer {id}")))
    }

    // =========================================================================
    // TAGS
    // =========================================================================

    pub async fn get_tags(&self, page: &PageRequest) -> Result<Page<Tag>> {
        self.db.tags.list(page).await
    }

    pub async fn get_conversation_tags(&self, conversation_id: Uuid) -> Result<Vec<Tag>> {
        self.visible_conversation(conversation_id).await?;
        self.db.tags.for_conversation(conversation_id).await
    }

    /// Attach a tag by name, creating it on first use.
    pub async fn tag_conversation(&self, conversation_id: Uuid, name: &str) -> Result<Tag> {
        self.visible_conversation(conversation_id).await?;
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Unprocessable("Tag name must not be empty".to_string()));
        }
        let tag = self.db.tags.find_or_create(name).await?;
        self.db.tags.tag(conversation_id, tag.id).await?;
        self.db.conversations.touch(conversation_id).await?;
        Ok(tag)
    }

    pub async fn untag_conversation(&self, conversation_id: Uuid, tag_id: Uuid) -> Result<()> {
        self.visible_conversation(conversation_id).await?;
        self.db.tags.untag(conversation_id, tag_id).await?;
        self.db.conversations.touch(conversation_id).await?;
        Ok(())
    }

    // =========================================================================
    // READ RECEIPTS AND ACTIVITY
    // =========================================================================

    pub async fn get_read_receipts(&self, conversation_id: Uuid) -> Result<Vec<ReadReceipt>> {
        self.visible_conversation(conversation_id).await?;
        self.db
            .read_receipts
            .list(&self.scope, conversation_id)
            .await
    }

    /// Move the caller's read receipt to `message_id`, or to the latest
    /// message when none is given. Customer conversations also tell the
    /// customer that the business has read them.
    pub async fn mark_as_read(
        &self,
        conversation_id: Uuid,
        message_id: Option<Uuid>,
    ) -> Result<ReadReceipt> {
        let conversation = self.visible_conversation(conversation_id).await?;

        let message = match message_id {
            Some(id) => self
                .db
                .messages
                .get_visible(&self.scope, id)
                .await?
                .filter(|m| m.conversation_id == conversation.id)
                .ok_or_else(|| {
                    Error::Unprocessable("Message does not belong to the conversation".to_string())
                })?,
            None => self
                .db
                .messages
                .latest_in_conversation(conversation.id)
                .await?
                .ok_or_else(|| Error::Unprocessable("Conversation has no messages".to_string()))?,
        };

        let receipt = self
            .db
            .read_receipts
            .upsert(UpsertReadReceiptRequest {
                conversation_id: conversation.id,
                user_id: self.staff.id,
                user_type: ReaderType::Staff,
                last_read_message_id: message.id,
            })
            .await?;

        if let Err(e) = self
            .post_activity(&conversation, ActivityType::ConversationRead)
            .await
        {
            warn!(
                subsystem = "api",
                component = "abilities",
                op = "mark_as_read",
                conversation_id = %conversation.id,
                error = %e,
                "Read activity not forwarded to provider"
            );
        }
        Ok(receipt)
    }

    pub async fn start_typing(&self, conversation_id: Uuid) -> Result<()> {
        let conversation = self.visible_conversation(conversation_id).await?;
        self.post_activity(&conversation, ActivityType::TypingStart)
            .await
    }

    pub async fn stop_typing(&self, conversation_id: Uuid) -> Result<()> {
        let conversation = self.visible_conversation(conversation_id).await?;
        self.post_activity(&conversation, ActivityType::TypingStop)
            .await
    }

    /// Forward an activity for customer conversations; a no-op elsewhere.
    async fn post_activity(
        &self,
        conversation: &Conversation,
        activity_type: ActivityType,
    ) -> Result<()> {
        let Some(external_id) = conversation
            .external_conversation_id
            .as_deref()
            .filter(|_| conversation.conversation_type == ConversationType::Customer)
        else {
            return Ok(());
        };
        let provider = self
            .provider
            .as_ref()
            .ok_or_else(|| Error::Disabled("Messaging provider is not configured".to_string()))?;
        provider
            .post_activity(
                provider.app_id(),
                external_id,
                &Activity::business(activity_type),
            )
            .await
    }
}
