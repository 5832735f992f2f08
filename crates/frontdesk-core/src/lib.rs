//! # frontdesk-core
//!
//! Core types, rules, and abstractions for the frontdesk chat-operations
//! backend.
//!
//! This crate holds everything that does not touch I/O: the domain model,
//! the visibility rule engine, cursor pagination, the delivery state machine,
//! provider merge policies, the event bus, and the repository and provider
//! traits the other crates implement.

pub mod cursor;
pub mod defaults;
pub mod delivery;
pub mod error;
pub mod events;
pub mod merge;
pub mod models;
pub mod provider;
pub mod rules;
pub mod traits;
pub mod uuid_utils;
pub mod webhook;

// Re-export commonly used types at crate root
pub use cursor::{Cursor, Page, PageRequest, SortDirection};
pub use delivery::{send_eligibility, DeliveryTransition, SendEligibility, SkipReason};
pub use error::{Error, Result};
pub use events::{
    EventBus, EventEnvelope, EventKind, MessageAction, ReadReceiptAction, ServerEvent,
    SubscriptionFilter,
};
pub use merge::{CustomerProfile, ExternalConversation};
pub use models::*;
pub use provider::{
    Activity, ActivityType, Integration, NewIntegration, OutboundMessage, PostedMessage,
    ProviderClient,
};
pub use rules::{Visibility, VisibilityRule};
pub use traits::*;
pub use uuid_utils::{is_v7, new_v7};
pub use webhook::{WebhookBatch, WebhookEvent};
