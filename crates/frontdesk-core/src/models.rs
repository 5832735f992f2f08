//! Domain entities shared by every frontdesk crate.
//!
//! Entities serialize in camelCase because they are consumed directly by the
//! staff web client. Enum variants that are stored in the database expose an
//! `as_str`/`parse` pair so both storage backends agree on the encoding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::{Error, Result};

// =============================================================================
// STAFF
// =============================================================================

/// Capability granted to a staff member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    /// May see and act on customer conversations.
    #[serde(rename = "chat:customer")]
    ChatCustomer,
    /// Unrestricted access.
    #[serde(rename = "admin")]
    Admin,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ChatCustomer => "chat:customer",
            Permission::Admin => "admin",
        }
    }

    /// Parse a stored permission. Unknown values yield `None` so that a
    /// permission added upstream never locks a staff member out.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "chat:customer" => Some(Permission::ChatCustomer),
            "admin" => Some(Permission::Admin),
            _ => None,
        }
    }
}

/// An authenticated staff member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Staff {
    pub id: Uuid,
    pub external_id: String,
    pub display_name: String,
    pub permissions: Vec<Permission>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Staff {
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    pub fn is_admin(&self) -> bool {
        self.has_permission(Permission::Admin)
    }
}

// =============================================================================
// CUSTOMER
// =============================================================================

/// An end customer known to the messaging provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: Uuid,
    pub external_id: Option<String>,
    pub sunshine_user_id: Option<String>,
    pub display_name: Option<String>,
    pub locale: Option<String>,
    pub metadata: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// CONVERSATION
// =============================================================================

/// Conversation kind. Drives the visibility rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationType {
    /// Visible to members only.
    Private,
    /// Visible to all staff.
    Public,
    /// Provider-side conversation with a customer.
    Customer,
}

impl ConversationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationType::Private => "PRIVATE",
            ConversationType::Public => "PUBLIC",
            ConversationType::Customer => "CUSTOMER",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "PRIVATE" => Ok(ConversationType::Private),
            "PUBLIC" => Ok(ConversationType::Public),
            "CUSTOMER" => Ok(ConversationType::Customer),
            other => Err(Error::Serialization(format!(
                "unknown conversation type: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub conversation_type: ConversationType,
    pub customer_id: Option<Uuid>,
    pub external_conversation_id: Option<String>,
    pub source: Option<String>,
    pub metadata: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// MESSAGE
// =============================================================================

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthorType {
    Staff,
    Customer,
    System,
}

impl AuthorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorType::Staff => "STAFF",
            AuthorType::Customer => "CUSTOMER",
            AuthorType::System => "SYSTEM",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "STAFF" => Ok(AuthorType::Staff),
            "CUSTOMER" => Ok(AuthorType::Customer),
            "SYSTEM" => Ok(AuthorType::System),
            other => Err(Error::Serialization(format!("unknown author type: {other}"))),
        }
    }
}

/// Local tracking state of a staff message towards the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Unsent,
    Sent,
    Delivered,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Unsent => "UNSENT",
            DeliveryStatus::Sent => "SENT",
            DeliveryStatus::Delivered => "DELIVERED",
            DeliveryStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "UNSENT" => Ok(DeliveryStatus::Unsent),
            "SENT" => Ok(DeliveryStatus::Sent),
            "DELIVERED" => Ok(DeliveryStatus::Delivered),
            "FAILED" => Ok(DeliveryStatus::Failed),
            other => Err(Error::Serialization(format!(
                "unknown delivery status: {other}"
            ))),
        }
    }
}

/// Message body in the provider's content shape, e.g.
/// `{"type": "text", "text": "hi", "actions": [...]}`.
///
/// Held as the raw JSON object so inbound content is stored verbatim,
/// including content types and fields this service does not interpret.
/// Staff input is checked with [`MessageContent::validate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageContent(JsonValue);

impl MessageContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self(serde_json::json!({ "type": "text", "text": text.into() }))
    }

    pub fn image(media_url: impl Into<String>) -> Self {
        Self(serde_json::json!({ "type": "image", "mediaUrl": media_url.into() }))
    }

    /// Wrap provider content as-is. Anything but a JSON object is rejected.
    pub fn from_json(value: JsonValue) -> Result<Self> {
        if value.is_object() {
            Ok(Self(value))
        } else {
            Err(Error::Unprocessable(
                "Message content must be a JSON object".to_string(),
            ))
        }
    }

    /// The `type` field (`text`, `image`, `file`, ...).
    pub fn content_type(&self) -> Option<&str> {
        self.0.get("type").and_then(JsonValue::as_str)
    }

    pub fn text_body(&self) -> Option<&str> {
        self.0.get("text").and_then(JsonValue::as_str)
    }

    pub fn as_json(&self) -> &JsonValue {
        &self.0
    }

    fn non_blank(&self, field: &str) -> bool {
        self.0
            .get(field)
            .and_then(JsonValue::as_str)
            .is_some_and(|v| !v.trim().is_empty())
    }

    /// Staff-authored content: text with a non-blank `text`, or image with a
    /// non-blank `mediaUrl`.
    pub fn validate(&self) -> Result<()> {
        match self.content_type() {
            Some("text") if self.non_blank("text") => Ok(()),
            Some("text") => Err(Error::Unprocessable(
                "Message text must not be empty".to_string(),
            )),
            Some("image") if self.non_blank("mediaUrl") => Ok(()),
            Some("image") => Err(Error::Unprocessable(
                "Image messages require a mediaUrl".to_string(),
            )),
            Some(other) => Err(Error::Unprocessable(format!(
                "Unsupported message type: {other}"
            ))),
            None => Err(Error::Unprocessable(
                "Message content requires a type".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub author_type: AuthorType,
    pub author_id: Option<Uuid>,
    pub content: MessageContent,
    /// Provider message id; `sunshineMessageId` on the wire.
    #[serde(rename = "sunshineMessageId")]
    pub external_message_id: Option<String>,
    pub customer_delivery_status: DeliveryStatus,
    pub customer_delivery_error: Option<String>,
    pub metadata: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// READ RECEIPT
// =============================================================================

/// Kind of reader a receipt belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReaderType {
    Staff,
    Customer,
}

impl ReaderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReaderType::Staff => "STAFF",
            ReaderType::Customer => "CUSTOMER",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "STAFF" => Ok(ReaderType::Staff),
            "CUSTOMER" => Ok(ReaderType::Customer),
            other => Err(Error::Serialization(format!("unknown reader type: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub user_id: Uuid,
    pub user_type: ReaderType,
    pub last_read_message_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// TAG
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// JOB QUEUE
// =============================================================================

/// Lifecycle state of a queued job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(Error::Serialization(format!("unknown job status: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: Uuid,
    /// Named queue the job belongs to.
    pub queue: String,
    /// Job kind within the queue; selects the handler.
    pub kind: String,
    /// Business key (message id, webhook event id).
    pub key: Option<String>,
    pub payload: JsonValue,
    pub status: JobStatus,
    pub attempts: i32,
    pub max_attempts: i32,
    pub error_message: Option<String>,
    pub run_after: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Per-queue job counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: i64,
    pub running: i64,
    pub completed: i64,
    pub failed: i64,
}
