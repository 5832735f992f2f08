//! Server event types, envelope schema, and event bus for live updates.
//!
//! Repositories publish a [`ServerEvent`] after every successful write that
//! staff clients care about. The bus is a single `tokio::sync::broadcast`
//! channel: publishing never blocks, there is no replay, and subscribers that
//! fall behind receive `Lagged` and miss events.
//!
//! The bus carries every event to every subscriber. Per-subscriber filtering
//! happens downstream: [`SubscriptionFilter`] handles the static part
//! (event kind, conversation, action set) and the subscription gateway
//! re-checks visibility at delivery time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::{Conversation, Message, ReadReceipt};

// ============================================================================
// Actions
// ============================================================================

/// What happened to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageAction {
    Create,
    Update,
    Delete,
}

impl MessageAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageAction::Create => "create",
            MessageAction::Update => "update",
            MessageAction::Delete => "delete",
        }
    }

    /// Case-insensitive parse, used for query-string action filters.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" => Some(MessageAction::Create),
            "update" => Some(MessageAction::Update),
            "delete" => Some(MessageAction::Delete),
            _ => None,
        }
    }
}

/// What happened to a read receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReadReceiptAction {
    Create,
    Update,
}

impl ReadReceiptAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadReceiptAction::Create => "create",
            ReadReceiptAction::Update => "update",
        }
    }

    /// A receipt whose row has been written more than once is an update.
    pub fn for_receipt(receipt: &ReadReceipt) -> Self {
        if receipt.updated_at != receipt.created_at {
            ReadReceiptAction::Update
        } else {
            ReadReceiptAction::Create
        }
    }
}

/// What happened to a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationAction {
    /// `updatedAt` moved forward (new message, tag change, explicit touch).
    Touch,
}

// ============================================================================
// Server Event (domain payloads)
// ============================================================================

/// Event kind, the coarse routing key of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    Message,
    ReadReceipt,
    Conversation,
}

/// Domain event published by the storage layer.
///
/// Serialized with a `kind` tag, e.g.
/// `{"kind":"message","action":"CREATE","message":{...}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ServerEvent {
    Message {
        action: MessageAction,
        message: Message,
    },
    #[serde(rename_all = "camelCase")]
    ReadReceipt {
        action: ReadReceiptAction,
        read_receipt: ReadReceipt,
    },
    Conversation {
        action: ConversationAction,
        conversation: Conversation,
    },
}

impl ServerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ServerEvent::Message { .. } => EventKind::Message,
            ServerEvent::ReadReceipt { .. } => EventKind::ReadReceipt,
            ServerEvent::Conversation { .. } => EventKind::Conversation,
        }
    }

    /// Dot-namespaced event type (e.g. `"message.create"`), used as the SSE
    /// event name.
    pub fn namespaced_event_type(&self) -> &'static str {
        match self {
            ServerEvent::Message { action, .. } => match action {
                MessageAction::Create => "message.create",
                MessageAction::Update => "message.update",
                MessageAction::Delete => "message.delete",
            },
            ServerEvent::ReadReceipt { action, .. } => match action {
                ReadReceiptAction::Create => "read_receipt.create",
                ReadReceiptAction::Update => "read_receipt.update",
            },
            ServerEvent::Conversation { action, .. } => match action {
                ConversationAction::Touch => "conversation.touch",
            },
        }
    }

    /// Conversation whose visibility governs who may receive the event.
    pub fn conversation_id(&self) -> Uuid {
        match self {
            ServerEvent::Message { message, .. } => message.conversation_id,
            ServerEvent::ReadReceipt { read_receipt, .. } => read_receipt.conversation_id,
            ServerEvent::Conversation { conversation, .. } => conversation.id,
        }
    }

    /// Primary entity id.
    pub fn entity_id(&self) -> Uuid {
        match self {
            ServerEvent::Message { message, .. } => message.id,
            ServerEvent::ReadReceipt { read_receipt, .. } => read_receipt.id,
            ServerEvent::Conversation { conversation, .. } => conversation.id,
        }
    }
}

// ============================================================================
// Event Envelope
// ============================================================================

/// Versioned wrapper around a [`ServerEvent`].
///
/// ## Wire Format (SSE)
///
/// ```text
/// event: message.create
/// id: 019508a0-1234-7def-8000-abcdef123456
/// data: {"eventId":"...","eventType":"message.create","occurredAt":"...","payload":{...}}
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    /// Unique event identifier (UUIDv7 for temporal ordering).
    pub event_id: Uuid,
    pub event_type: String,
    pub occurred_at: DateTime<Utc>,
    pub conversation_id: Uuid,
    pub entity_id: Uuid,
    /// Payload schema version.
    pub payload_version: u32,
    pub payload: ServerEvent,
}

impl EventEnvelope {
    pub fn new(event: ServerEvent) -> Self {
        Self {
            event_id: crate::uuid_utils::new_v7(),
            event_type: event.namespaced_event_type().to_string(),
            occurred_at: Utc::now(),
            conversation_id: event.conversation_id(),
            entity_id: event.entity_id(),
            payload_version: 1,
            payload: event,
        }
    }
}

// ============================================================================
// Subscription filter
// ============================================================================

/// Static part of a live subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionFilter {
    pub kind: EventKind,
    pub conversation_id: Option<Uuid>,
    /// Message actions to forward; empty means all. Ignored for other kinds.
    pub actions: Vec<MessageAction>,
}

impl SubscriptionFilter {
    pub fn messages() -> Self {
        Self {
            kind: EventKind::Message,
            conversation_id: None,
            actions: Vec::new(),
        }
    }

    pub fn read_receipts() -> Self {
        Self {
            kind: EventKind::ReadReceipt,
            conversation_id: None,
            actions: Vec::new(),
        }
    }

    pub fn conversations() -> Self {
        Self {
            kind: EventKind::Conversation,
            conversation_id: None,
            actions: Vec::new(),
        }
    }

    pub fn with_conversation(mut self, conversation_id: Option<Uuid>) -> Self {
        self.conversation_id = conversation_id;
        self
    }

    pub fn with_actions(mut self, actions: Vec<MessageAction>) -> Self {
        self.actions = actions;
        self
    }

    /// Whether the event passes the kind, conversation and action filters.
    /// Visibility is checked separately.
    pub fn accepts(&self, event: &ServerEvent) -> bool {
        if event.kind() != self.kind {
            return false;
        }
        if let Some(id) = self.conversation_id {
            if event.conversation_id() != id {
                return false;
            }
        }
        match event {
            ServerEvent::Message { action, .. } => {
                self.actions.is_empty() || self.actions.contains(action)
            }
            _ => true,
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Broadcast-based event bus shared by repositories and the gateway.
pub struct EventBus {
    tx: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    ///
    /// Recommended: 256 for production, 32 for tests.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event to all subscribers. Dropped silently when nobody listens.
    pub fn emit(&self, event: ServerEvent) {
        let envelope = EventEnvelope::new(event);
        let subscriber_count = self.tx.receiver_count();
        tracing::debug!(
            event_type = %envelope.event_type,
            event_id = %envelope.event_id,
            conversation_id = %envelope.conversation_id,
            subscriber_count,
            "EventBus emit"
        );
        let _ = self.tx.send(envelope);
    }

    pub fn publish_message(&self, action: MessageAction, message: &Message) {
        self.emit(ServerEvent::Message {
            action,
            message: message.clone(),
        });
    }

    /// The action is derived from the row's timestamps.
    pub fn publish_read_receipt(&self, receipt: &ReadReceipt) {
        self.emit(ServerEvent::ReadReceipt {
            action: ReadReceiptAction::for_receipt(receipt),
            read_receipt: receipt.clone(),
        });
    }

    pub fn publish_conversation_touched(&self, conversation: &Conversation) {
        self.emit(ServerEvent::Conversation {
            action: ConversationAction::Touch,
            conversation: conversation.clone(),
        });
    }

    /// Subscribe to receive enveloped events. Each subscriber gets its own independent stream.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(crate::defaults::EVENT_BUS_CAPACITY)
    }
}

// ============================================================================
// Tests
// ============================================================================
