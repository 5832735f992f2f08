//! Messaging provider abstraction.
//!
//! The only provider implemented is Sunshine Conversations (see the
//! `frontdesk-sunshine` crate), but jobs and handlers depend on the
//! [`ProviderClient`] trait so tests can substitute a recording fake.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::MessageContent;
use crate::webhook::event_types;

/// Webhook triggers this deployment subscribes to.
pub const WEBHOOK_TRIGGERS: [&str; 6] = [
    event_types::CONVERSATION_CREATE,
    event_types::CONVERSATION_MESSAGE,
    event_types::CONVERSATION_READ,
    event_types::DELIVERY_CHANNEL,
    event_types::DELIVERY_USER,
    event_types::DELIVERY_FAILURE,
];

/// Author of outbound traffic. Staff always speak as the business.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessAuthor {
    #[serde(rename = "type")]
    pub author_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl BusinessAuthor {
    pub fn new(display_name: Option<String>) -> Self {
        Self {
            author_type: "business".to_string(),
            display_name,
            avatar_url: None,
        }
    }
}

/// Body of `POST /v2/apps/{appId}/conversations/{conversationId}/messages`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub author: BusinessAuthor,
    pub content: MessageContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// A message as acknowledged by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostedMessage {
    pub id: String,
    #[serde(default)]
    pub received: Option<String>,
}

/// Conversation activity shown to the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityType {
    #[serde(rename = "typing:start")]
    TypingStart,
    #[serde(rename = "typing:stop")]
    TypingStop,
    #[serde(rename = "conversation:read")]
    ConversationRead,
}

/// Body of `POST /v2/apps/{appId}/conversations/{conversationId}/activity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub author: BusinessAuthor,
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
}

impl Activity {
    pub fn business(activity_type: ActivityType) -> Self {
        Self {
            author: BusinessAuthor::new(None),
            activity_type,
        }
    }
}

/// A webhook registered on an integration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationWebhook {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub target: String,
    pub triggers: Vec<String>,
    #[serde(default)]
    pub include_full_user: bool,
    #[serde(default)]
    pub include_full_source: bool,
    /// Only present in the response to integration creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

/// A provider integration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Integration {
    pub id: String,
    #[serde(rename = "type")]
    pub integration_type: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub webhooks: Vec<IntegrationWebhook>,
}

impl Integration {
    /// Secret of the first webhook, as returned on creation.
    pub fn webhook_secret(&self) -> Option<&str> {
        self.webhooks.iter().find_map(|w| w.secret.as_deref())
    }
}

/// Body of `POST /v2/apps/{appId}/integrations`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewIntegration {
    #[serde(rename = "type")]
    pub integration_type: String,
    pub display_name: String,
    pub webhooks: Vec<IntegrationWebhook>,
}

impl NewIntegration {
    /// A custom integration with one webhook subscribed to every trigger this
    /// service handles.
    pub fn custom_webhook(display_name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            integration_type: "custom".to_string(),
            display_name: display_name.into(),
            webhooks: vec![IntegrationWebhook {
                id: None,
                target: target.into(),
                triggers: WEBHOOK_TRIGGERS.iter().map(|t| t.to_string()).collect(),
                include_full_user: true,
                include_full_source: true,
                secret: None,
            }],
        }
    }
}

/// Outbound calls to the messaging provider.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// App the client is configured for.
    fn app_id(&self) -> &str;

    /// Post a business message into a provider conversation.
    async fn post_message(
        &self,
        app_id: &str,
        conversation_id: &str,
        message: &OutboundMessage,
    ) -> Result<PostedMessage>;

    /// Post a typing or read activity.
    async fn post_activity(
        &self,
        app_id: &str,
        conversation_id: &str,
        activity: &Activity,
    ) -> Result<()>;

    async fn list_integrations(&self, app_id: &str) -> Result<Vec<Integration>>;

    async fn create_integration(
        &self,
        app_id: &str,
        integration: &NewIntegration,
    ) -> Result<Integration>;

    async fn delete_integration(&self, app_id: &str, integration_id: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_outbound_message_shape() {
        let body = OutboundMessage {
            author: BusinessAuthor::new(Some("Ada".to_string())),
            content: MessageContent::text("hello"),
            metadata: None,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value,
            json!({
                "author": {"type": "business", "displayName": "Ada"},
                "content": {"type": "text", "text": "hello"}
            })
        );
    }

    #[test]
    fn test_activity_shape() {
        let value = serde_json::to_value(Activity::business(ActivityType::ConversationRead)).unwrap();
        assert_eq!(value["type"], "conversation:read");
        assert_eq!(value["author"]["type"], "business");
    }

    #[test]
    fn test_new_integration_triggers() {
        let integration =
            NewIntegration::custom_webhook("frontdesk-prod-web1", "https://x/webhooks/trigger");
        let value = serde_json::to_value(&integration).unwrap();
        assert_eq!(value["type"], "custom");
        assert_eq!(value["webhooks"][0]["triggers"].as_array().unwrap().len(), 6);
        assert_eq!(value["webhooks"][0]["includeFullUser"], true);
        assert!(value["webhooks"][0].get("secret").is_none());
    }

    #[test]
    fn test_integration_secret() {
        let integration: Integration = serde_json::from_value(json!({
            "id": "int_1",
            "type": "custom",
            "displayName": "frontdesk-dev-box",
            "webhooks": [{"id": "wh_1", "target": "https://x", "triggers": [], "secret": "s3cret"}]
        }))
        .unwrap();
        assert_eq!(integration.webhook_secret(), Some("s3cret"));
    }
}
