//! Merge policies for records mirrored from the messaging provider.
//!
//! Webhooks are delivered at least once and in no guaranteed order, so every
//! provider-sourced upsert goes through an explicit policy deciding which
//! fields the incoming data may set. Both storage backends follow these
//! functions; the Postgres backend renders the same rules as
//! `ON CONFLICT ... DO UPDATE` clauses.

use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::models::{Conversation, Customer};

// =============================================================================
// CONVERSATION
// =============================================================================

/// A provider conversation as described by a `conversation:create` webhook.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalConversation {
    pub external_conversation_id: String,
    pub customer_id: Uuid,
    pub source: Option<String>,
    pub metadata: JsonValue,
}

/// What to do with an incoming provider conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationMerge {
    /// No local row yet: insert as a CUSTOMER conversation.
    Create(ExternalConversation),
    /// Fill fields that are still null. Set fields stay untouched.
    Backfill {
        customer_id: Option<Uuid>,
        source: Option<String>,
    },
    Unchanged,
}

/// Decide how an incoming conversation merges into the existing row.
///
/// Metadata, external id, type and an already-set customer or source are
/// never overwritten; the first non-null customer and source win.
pub fn merge_external_conversation(
    existing: Option<&Conversation>,
    incoming: ExternalConversation,
) -> ConversationMerge {
    let Some(existing) = existing else {
        return ConversationMerge::Create(incoming);
    };

    let customer_id = match existing.customer_id {
        None => Some(incoming.customer_id),
        Some(_) => None,
    };
    let source = match existing.source {
        None => incoming.source,
        Some(_) => None,
    };

    if customer_id.is_none() && source.is_none() {
        ConversationMerge::Unchanged
    } else {
        ConversationMerge::Backfill {
            customer_id,
            source,
        }
    }
}

// =============================================================================
// CUSTOMER
// =============================================================================

/// A provider user as described by an inbound webhook.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerProfile {
    pub sunshine_user_id: String,
    pub external_id: Option<String>,
    pub display_name: Option<String>,
    pub locale: Option<String>,
    pub metadata: JsonValue,
}

/// What to do with an incoming provider user.
#[derive(Debug, Clone, PartialEq)]
pub enum CustomerMerge {
    Create(CustomerProfile),
    Update {
        external_id: Option<String>,
        display_name: Option<String>,
        locale: Option<String>,
    },
    Unchanged,
}

/// Decide how an incoming provider user merges into the existing customer.
///
/// The external id is set once. Display name and locale follow the provider
/// whenever it sends a new non-empty value. Metadata is only set on create.
pub fn merge_customer(existing: Option<&Customer>, incoming: CustomerProfile) -> CustomerMerge {
    let Some(existing) = existing else {
        return CustomerMerge::Create(incoming);
    };

    let external_id = match existing.external_id {
        None => incoming.external_id,
        Some(_) => None,
    };
    let display_name = incoming
        .display_name
        .filter(|n| !n.is_empty() && existing.display_name.as_ref() != Some(n));
    let locale = incoming
        .locale
        .filter(|l| !l.is_empty() && existing.locale.as_ref() != Some(l));

    if external_id.is_none() && display_name.is_none() && locale.is_none() {
        CustomerMerge::Unchanged
    } else {
        CustomerMerge::Update {
            external_id,
            display_name,
            locale,
        }
    }
}
