//! Customer delivery state machine.
//!
//! ```text
//!   UNSENT ──accept──▶ SENT ──confirm──▶ DELIVERED
//!     │                 │
//!     └──reject/fail────┴──────────────▶ FAILED ──accept (resend)──▶ SENT
//! ```
//!
//! `FAILED → UNSENT` never happens automatically. Confirmation events that
//! repeat the current state are accepted so webhook replays stay idempotent.

use serde::Serialize;

use crate::models::{AuthorType, Conversation, ConversationType, DeliveryStatus, Message};

/// Something that happened to an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryTransition {
    /// The provider accepted the message.
    ProviderAccepted,
    /// The provider call failed.
    ProviderRejected,
    /// Provider reported delivery to the channel or the user.
    ConfirmedDelivered,
    /// Provider reported a delivery failure.
    ConfirmedFailed,
}

/// A transition that is not allowed from the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot apply {transition:?} to a message in state {from:?}")]
pub struct InvalidTransition {
    pub from: DeliveryStatus,
    pub transition: DeliveryTransition,
}

impl DeliveryStatus {
    /// Apply a transition, returning the new state.
    pub fn apply(
        self,
        transition: DeliveryTransition,
    ) -> std::result::Result<DeliveryStatus, InvalidTransition> {
        use DeliveryStatus::*;
        use DeliveryTransition::*;

        match (self, transition) {
            (Unsent | Failed, ProviderAccepted) => Ok(Sent),
            (Unsent | Failed, ProviderRejected) => Ok(Failed),
            (Unsent | Sent | Delivered, ConfirmedDelivered) => Ok(Delivered),
            (Unsent | Sent | Failed, ConfirmedFailed) => Ok(Failed),
            (from, transition) => Err(InvalidTransition { from, transition }),
        }
    }

    /// States from which a send may be attempted.
    pub fn is_sendable(&self) -> bool {
        matches!(self, DeliveryStatus::Unsent | DeliveryStatus::Failed)
    }
}

/// Why a message will not be sent to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotCustomerConversation,
    NoExternalConversation,
    AlreadySent,
    CustomerAuthored,
    StatusNotSendable,
}

/// Outcome of the send-eligibility check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendEligibility {
    Eligible,
    Skip(SkipReason),
}

/// Decide whether `message` should be posted to the provider.
///
/// Only messages not authored by the customer, not yet carrying a provider
/// id, in a sendable state, on a customer conversation linked to the provider
/// qualify. Everything else is skipped without error.
pub fn send_eligibility(conversation: &Conversation, message: &Message) -> SendEligibility {
    use SendEligibility::*;

    if conversation.conversation_type != ConversationType::Customer {
        return Skip(SkipReason::NotCustomerConversation);
    }
    if conversation.external_conversation_id.is_none() {
        return Skip(SkipReason::NoExternalConversation);
    }
    if message.external_message_id.is_some() {
        return Skip(SkipReason::AlreadySent);
    }
    if message.author_type == AuthorType::Customer {
        return Skip(SkipReason::CustomerAuthored);
    }
    if !message.customer_delivery_status.is_sendable() {
        return Skip(SkipReason::StatusNotSendable);
    }
    Eligible
}
