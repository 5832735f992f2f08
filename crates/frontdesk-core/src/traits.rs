//! Repository traits for frontdesk storage.
//!
//! Two backends implement these traits: Postgres (`frontdesk_db::Pg*`) and an
//! in-memory store with the same semantics (`frontdesk_db::memory`). Every
//! read that takes a [`Visibility`] applies it inside the query. Writes that
//! staff clients observe publish on the event bus after they commit.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::cursor::{Page, PageRequest};
use crate::error::Result;
use crate::merge::{CustomerProfile, ExternalConversation};
use crate::models::*;
use crate::rules::Visibility;

// =============================================================================
// STAFF
// =============================================================================

/// Identity asserted by the authentication layer.
#[derive(Debug, Clone)]
pub struct UpsertStaffRequest {
    pub external_id: String,
    pub display_name: String,
    pub permissions: Vec<Permission>,
}

#[async_trait]
pub trait StaffRepository: Send + Sync {
    /// Insert or refresh a staff member keyed by external id.
    async fn upsert(&self, req: UpsertStaffRequest) -> Result<Staff>;

    async fn get(&self, id: Uuid) -> Result<Option<Staff>>;

    /// Subset of `ids` that belong to existing staff members.
    async fn existing_ids(&self, ids: &[Uuid]) -> Result<Vec<Uuid>>;
}

// =============================================================================
// CUSTOMERS
// =============================================================================

#[async_trait]
pub trait CustomerRepository: Send + Sync {
    /// Upsert by provider user id following [`crate::merge::merge_customer`].
    async fn upsert_profile(&self, profile: CustomerProfile) -> Result<Customer>;

    async fn find_by_sunshine_user_id(&self, sunshine_user_id: &str) -> Result<Option<Customer>>;

    async fn get(&self, id: Uuid) -> Result<Option<Customer>>;

    /// Ordered by `(created_at desc, id desc)`.
    async fn list(&self, page: &PageRequest) -> Result<Page<Customer>>;
}

// =============================================================================
// CONVERSATIONS
// =============================================================================

/// Staff-initiated conversation. Members are already validated.
#[derive(Debug, Clone)]
pub struct CreateConversationRequest {
    pub conversation_type: ConversationType,
    pub member_ids: Vec<Uuid>,
    pub metadata: JsonValue,
}

/// Optional narrowing of a conversation listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationFilter {
    pub conversation_type: Option<ConversationType>,
    pub customer_id: Option<Uuid>,
    pub tag_id: Option<Uuid>,
}

#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Visible conversations ordered by `(updated_at desc, id desc)`.
    async fn list(
        &self,
        scope: &Visibility,
        filter: &ConversationFilter,
        page: &PageRequest,
    ) -> Result<Page<Conversation>>;

    /// Visibility-scoped lookup; `None` when absent or not visible.
    async fn get_visible(&self, scope: &Visibility, id: Uuid) -> Result<Option<Conversation>>;

    /// Unscoped lookup for trusted callers (workers, webhook handlers).
    async fn get(&self, id: Uuid) -> Result<Option<Conversation>>;

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Conversation>>;

    async fn create(&self, req: CreateConversationRequest) -> Result<Conversation>;

    /// Upsert by external id following
    /// [`crate::merge::merge_external_conversation`].
    async fn upsert_external(&self, incoming: ExternalConversation) -> Result<Conversation>;

    /// Add members; existing memberships are left as they are.
    async fn add_members(&self, conversation_id: Uuid, staff_ids: &[Uuid]) -> Result<()>;

    async fn members(&self, conversation_id: Uuid) -> Result<Vec<Uuid>>;

    /// Move `updated_at` to now and publish a touch event.
    async fn touch(&self, conversation_id: Uuid) -> Result<Conversation>;
}

// =============================================================================
// MESSAGES
// =============================================================================

#[derive(Debug, Clone)]
pub struct CreateMessageRequest {
    pub conversation_id: Uuid,
    pub author_type: AuthorType,
    pub author_id: Option<Uuid>,
    pub content: MessageContent,
    pub external_message_id: Option<String>,
    pub metadata: JsonValue,
}

/// New delivery state of a message, as decided by the delivery state machine.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryUpdate {
    pub status: DeliveryStatus,
    /// Set when the provider accepted the message; `None` keeps the current id.
    pub external_message_id: Option<String>,
    /// Replaces the stored error; `None` clears it.
    pub error: Option<String>,
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Visible messages ordered by `(created_at desc, id desc)`, optionally
    /// restricted to one conversation.
    async fn list(
        &self,
        scope: &Visibility,
        conversation_id: Option<Uuid>,
        page: &PageRequest,
    ) -> Result<Page<Message>>;

    /// A message is visible iff its conversation is.
    async fn get_visible(&self, scope: &Visibility, id: Uuid) -> Result<Option<Message>>;

    async fn get(&self, id: Uuid) -> Result<Option<Message>>;

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Message>>;

    /// Insert a message with status `UNSENT`. When `external_message_id` is
    /// already stored the existing row is returned unchanged and no event is
    /// published.
    async fn create(&self, req: CreateMessageRequest) -> Result<Message>;

    async fn latest_in_conversation(&self, conversation_id: Uuid) -> Result<Option<Message>>;

    /// Persist a delivery state change and publish an update event.
    async fn update_delivery(&self, id: Uuid, update: DeliveryUpdate) -> Result<Message>;

    /// Delete and publish a delete event; `None` when already gone.
    async fn delete(&self, id: Uuid) -> Result<Option<Message>>;
}

// =============================================================================
// READ RECEIPTS
// =============================================================================

#[derive(Debug, Clone)]
pub struct UpsertReadReceiptRequest {
    pub conversation_id: Uuid,
    pub user_id: Uuid,
    pub user_type: ReaderType,
    pub last_read_message_id: Uuid,
}

#[async_trait]
pub trait ReadReceiptRepository: Send + Sync {
    /// Upsert on `(user_id, user_type, conversation_id)` and publish.
    async fn upsert(&self, req: UpsertReadReceiptRequest) -> Result<ReadReceipt>;

    /// Receipts of a visible conversation; empty when not visible.
    async fn list(&self, scope: &Visibility, conversation_id: Uuid) -> Result<Vec<ReadReceipt>>;
}

// =============================================================================
// TAGS
// =============================================================================

#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Ordered by `(name asc, id asc)`.
    async fn list(&self, page: &PageRequest) -> Result<Page<Tag>>;

    async fn get(&self, id: Uuid) -> Result<Option<Tag>>;

    async fn find_or_create(&self, name: &str) -> Result<Tag>;

    /// Returns `false` when the tag was already attached.
    async fn tag(&self, conversation_id: Uuid, tag_id: Uuid) -> Result<bool>;

    /// Returns `false` when the tag was not attached.
    async fn untag(&self, conversation_id: Uuid, tag_id: Uuid) -> Result<bool>;

    async fn for_conversation(&self, conversation_id: Uuid) -> Result<Vec<Tag>>;
}

// =============================================================================
// JOB QUEUE
// =============================================================================

#[derive(Debug, Clone)]
pub struct QueueJobRequest {
    pub queue: String,
    pub kind: String,
    pub key: Option<String>,
    pub payload: JsonValue,
    pub max_attempts: i32,
}

#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Store a pending job and wake idle workers.
    async fn queue(&self, req: QueueJobRequest) -> Result<Job>;

    /// Claim the oldest runnable job of a queue, marking it running and
    /// counting the attempt.
    async fn claim_next(&self, queue: &str) -> Result<Option<Job>>;

    async fn complete(&self, job_id: Uuid) -> Result<()>;

    /// Record a failed attempt. With `retry_at` the job returns to pending
    /// and becomes runnable at that time; otherwise it stays failed.
    async fn fail(
        &self,
        job_id: Uuid,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<JobStatus>;

    async fn get(&self, job_id: Uuid) -> Result<Option<Job>>;

    /// Most recent jobs of a queue in the given status.
    async fn list_by_status(&self, queue: &str, status: JobStatus, limit: i64)
        -> Result<Vec<Job>>;

    async fn stats(&self, queue: &str) -> Result<QueueStats>;

    /// Handle notified whenever a job is queued.
    fn notifier(&self) -> Arc<Notify>;
}

// =============================================================================
// SETTINGS
// =============================================================================

#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;
}
