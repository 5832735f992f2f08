//! Shared fixtures for job tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};

use frontdesk_core::{
    Activity, Error, EventBus, Integration, NewIntegration, OutboundMessage, PostedMessage,
    ProviderClient, Result, WebhookEvent,
};
use frontdesk_db::Database;

pub const APP_ID: &str = "app-test";

/// A message as the fake provider received it.
#[derive(Debug, Clone)]
pub struct RecordedPost {
    pub conversation_id: String,
    pub body: OutboundMessage,
}

/// Provider double that records posts and hands out sequential ids.
#[derive(Default)]
pub struct RecordingProvider {
    posts: Mutex<Vec<RecordedPost>>,
    failure: Mutex<Option<String>>,
    next_id: AtomicUsize,
}

impl RecordingProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every following post fail with `reason`; `None` recovers.
    pub fn fail_with(&self, reason: Option<&str>) {
        *self.failure.lock().unwrap() = reason.map(String::from);
    }

    pub fn posts(&self) -> Vec<RecordedPost> {
        self.posts.lock().unwrap().clone()
    }

    pub fn post_count(&self) -> usize {
        self.posts.lock().unwrap().len()
    }
}

#[async_trait]
impl ProviderClient for RecordingProvider {
    fn app_id(&self) -> &str {
        APP_ID
    }

    async fn post_message(
        &self,
        _app_id: &str,
        conversation_id: &str,
        message: &OutboundMessage,
    ) -> Result<PostedMessage> {
        if let Some(reason) = self.failure.lock().unwrap().clone() {
            return Err(Error::Provider(reason));
        }
        self.posts.lock().unwrap().push(RecordedPost {
            conversation_id: conversation_id.to_string(),
            body: message.clone(),
        });
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(PostedMessage {
            id: format!("sun-{n}"),
            received: None,
        })
    }

    async fn post_activity(&self, _: &str, _: &str, _: &Activity) -> Result<()> {
        Ok(())
    }

    async fn list_integrations(&self, _: &str) -> Result<Vec<Integration>> {
        Ok(Vec::new())
    }

    async fn create_integration(&self, _: &str, _: &NewIntegration) -> Result<Integration> {
        Err(Error::Provider("not supported".to_string()))
    }

    async fn delete_integration(&self, _: &str, _: &str) -> Result<()> {
        Ok(())
    }
}

pub fn memory_db() -> Database {
    Database::in_memory(Arc::new(EventBus::new(32)))
}

pub fn event(id: &str, event_type: &str, payload: JsonValue) -> WebhookEvent {
    WebhookEvent {
        id: id.to_string(),
        event_type: event_type.to_string(),
        created_at: None,
        payload,
    }
}

pub fn conversation_create(id: &str, conversation: &str, user: &str, metadata: JsonValue) -> WebhookEvent {
    event(
        id,
        "conversation:create",
        json!({
            "conversation": {"id": conversation, "type": "personal", "metadata": metadata},
            "user": {"id": user, "profile": {"givenName": "Grace", "surname": "Hopper", "locale": "en-US"}},
            "source": {"type": "whatsapp"},
            "creationReason": "message"
        }),
    )
}

pub fn inbound_message(id: &str, conversation: &str, user: &str, message_id: &str, text: &str) -> WebhookEvent {
    inbound_content(
        id,
        conversation,
        user,
        message_id,
        json!({"type": "text", "text": text}),
    )
}

pub fn inbound_content(
    id: &str,
    conversation: &str,
    user: &str,
    message_id: &str,
    content: JsonValue,
) -> WebhookEvent {
    event(
        id,
        "conversation:message",
        json!({
            "conversation": {"id": conversation},
            "message": {
                "id": message_id,
                "author": {"type": "user", "userId": user},
                "content": content
            }
        }),
    )
}
