//! Inbound provider webhook payloads.
//!
//! The provider posts batches of events. Each event is queued on its own and
//! later parsed into one of the typed payloads below by the dispatcher.
//! Unknown fields are ignored so provider additions never break ingestion.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};
use crate::merge::CustomerProfile;
use crate::models::MessageContent;

/// Event type names handled by the dispatcher.
pub mod event_types {
    pub const CONVERSATION_CREATE: &str = "conversation:create";
    pub const CONVERSATION_MESSAGE: &str = "conversation:message";
    pub const CONVERSATION_READ: &str = "conversation:read";
    pub const DELIVERY_CHANNEL: &str = "conversation:message:delivery:channel";
    pub const DELIVERY_USER: &str = "conversation:message:delivery:user";
    pub const DELIVERY_FAILURE: &str = "conversation:message:delivery:failure";
}

// =============================================================================
// ENVELOPE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppRef {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookRef {
    pub id: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// Body of `POST /webhooks/trigger`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookBatch {
    pub app: AppRef,
    pub webhook: WebhookRef,
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

/// One provider event; queued whole as the job payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub payload: JsonValue,
}

impl WebhookEvent {
    /// Parse the payload into the shape expected for this event type.
    pub fn parse_payload<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.payload.clone()).map_err(|e| {
            Error::Unprocessable(format!(
                "invalid {} payload for event {}: {e}",
                self.event_type, self.id
            ))
        })
    }
}

// =============================================================================
// SHARED FRAGMENTS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRef {
    pub id: String,
    #[serde(rename = "type", default)]
    pub conversation_type: Option<String>,
    #[serde(default)]
    pub metadata: Option<JsonValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub surname: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub id: String,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub profile: Option<UserProfile>,
    #[serde(default)]
    pub metadata: Option<JsonValue>,
}

impl UserRef {
    /// Customer profile carried by this provider user.
    pub fn to_profile(&self) -> CustomerProfile {
        let profile = self.profile.clone().unwrap_or_default();
        let name = [profile.given_name, profile.surname]
            .into_iter()
            .flatten()
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        CustomerProfile {
            sunshine_user_id: self.id.clone(),
            external_id: self.external_id.clone(),
            display_name: if name.is_empty() { None } else { Some(name) },
            locale: profile.locale,
            metadata: self
                .metadata
                .clone()
                .unwrap_or_else(|| JsonValue::Object(Default::default())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRef {
    #[serde(rename = "type")]
    pub source_type: String,
    #[serde(default)]
    pub integration_id: Option<String>,
}

/// Author of an inbound message or activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundAuthor {
    #[serde(rename = "type")]
    pub author_type: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub user: Option<UserRef>,
}

impl InboundAuthor {
    /// Customers are `user` authors; everything else is the business side.
    pub fn is_user(&self) -> bool {
        self.author_type == "user"
    }

    /// Provider user id of the author, from either location it may appear in.
    pub fn provider_user_id(&self) -> Option<&str> {
        self.user_id
            .as_deref()
            .or_else(|| self.user.as_ref().map(|u| u.id.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRef {
    pub id: String,
}

// =============================================================================
// TYPED PAYLOADS
// =============================================================================

/// `conversation:create`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationCreatePayload {
    pub conversation: ConversationRef,
    #[serde(default)]
    pub user: Option<UserRef>,
    #[serde(default)]
    pub source: Option<SourceRef>,
    #[serde(default)]
    pub creation_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub id: String,
    #[serde(default)]
    pub received: Option<String>,
    pub author: InboundAuthor,
    pub content: JsonValue,
    #[serde(default)]
    pub source: Option<SourceRef>,
}

impl InboundMessage {
    /// Content exactly as the provider sent it.
    pub fn content(&self) -> Result<MessageContent> {
        MessageContent::from_json(self.content.clone()).map_err(|_| {
            Error::Unprocessable(format!("content of message {} is not an object", self.id))
        })
    }
}

/// `conversation:message`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessagePayload {
    pub conversation: ConversationRef,
    pub message: InboundMessage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundActivity {
    pub author: InboundAuthor,
}

/// `conversation:read`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationReadPayload {
    pub conversation: ConversationRef,
    #[serde(default)]
    pub activity: Option<InboundActivity>,
}

impl ConversationReadPayload {
    pub fn author(&self) -> Option<&InboundAuthor> {
        self.activity.as_ref().map(|a| &a.author)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub underlying_error: Option<JsonValue>,
}

/// `conversation:message:delivery:*`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryPayload {
    pub conversation: ConversationRef,
    pub message: MessageRef,
    #[serde(default)]
    pub error: Option<DeliveryError>,
}

impl DeliveryPayload {
    /// Human-readable failure reason, if the provider supplied one.
    pub fn error_text(&self) -> Option<String> {
        let err = self.error.as_ref()?;
        err.message
            .clone()
            .or_else(|| {
                err.underlying_error
                    .as_ref()
                    .and_then(|u| u.get("message"))
                    .and_then(|m| m.as_str())
                    .map(String::from)
            })
            .or_else(|| err.code.clone())
            .filter(|s| !s.trim().is_empty())
    }
}
