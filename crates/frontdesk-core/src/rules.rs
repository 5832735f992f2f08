//! Row-level visibility rules.
//!
//! A staff member's permission set is turned into a [`Visibility`]: a
//! disjunction of tagged [`VisibilityRule`]s. Storage backends render the
//! rules into their query language (SQL for Postgres, a per-row predicate for
//! the in-memory store) so that visibility is always applied inside the query
//! and never as a post-filter.
//!
//! Messages and read receipts inherit the visibility of their conversation.

use std::collections::BTreeSet;

use serde::Serialize;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Conversation, ConversationType, Permission, Staff};

/// A single visibility clause over conversations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "rule", content = "staffId", rename_all = "camelCase")]
pub enum VisibilityRule {
    /// Every conversation.
    Always,
    /// `type = PRIVATE` and the staff member is a member.
    StaffIsMember(Uuid),
    /// `type = PUBLIC` and no customer attached.
    PublicNonCustomer,
    /// `type = CUSTOMER` with a customer attached.
    CustomerWithPermission,
}

impl VisibilityRule {
    /// Evaluate the rule against a conversation and its member ids.
    pub fn matches(&self, conversation: &Conversation, members: &[Uuid]) -> bool {
        match self {
            VisibilityRule::Always => true,
            VisibilityRule::StaffIsMember(staff_id) => {
                conversation.conversation_type == ConversationType::Private
                    && members.contains(staff_id)
            }
            VisibilityRule::PublicNonCustomer => {
                conversation.conversation_type == ConversationType::Public
                    && conversation.customer_id.is_none()
            }
            VisibilityRule::CustomerWithPermission => {
                conversation.conversation_type == ConversationType::Customer
                    && conversation.customer_id.is_some()
            }
        }
    }
}

/// The full visibility scope of one staff member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Visibility {
    staff_id: Uuid,
    rules: Vec<VisibilityRule>,
}

impl Visibility {
    /// Build the scope for a staff member.
    ///
    /// Admins see everything. Everyone else sees private conversations they
    /// belong to and public staff conversations; customer conversations are
    /// added only with `chat:customer`.
    pub fn for_staff(staff: &Staff) -> Self {
        if staff.is_admin() {
            return Self {
                staff_id: staff.id,
                rules: vec![VisibilityRule::Always],
            };
        }

        let mut rules = vec![
            VisibilityRule::StaffIsMember(staff.id),
            VisibilityRule::PublicNonCustomer,
        ];
        if staff.has_permission(Permission::ChatCustomer) {
            rules.push(VisibilityRule::CustomerWithPermission);
        }
        Self {
            staff_id: staff.id,
            rules,
        }
    }

    /// Staff member this scope was built for.
    pub fn staff_id(&self) -> Uuid {
        self.staff_id
    }

    pub fn rules(&self) -> &[VisibilityRule] {
        &self.rules
    }

    /// True when no row filter needs to be applied.
    pub fn is_unrestricted(&self) -> bool {
        self.rules.contains(&VisibilityRule::Always)
    }

    /// Customers are visible exactly when customer conversations are.
    pub fn can_see_customers(&self) -> bool {
        self.is_unrestricted() || self.rules.contains(&VisibilityRule::CustomerWithPermission)
    }

    /// Evaluate the disjunction for one conversation.
    pub fn permits(&self, conversation: &Conversation, members: &[Uuid]) -> bool {
        self.rules.iter().any(|r| r.matches(conversation, members))
    }
}

/// Validate a staff-initiated conversation and compute its member set.
///
/// The creator is always a member; duplicates collapse. The resulting set
/// must contain at least two staff members.
pub fn conversation_members_for_create(
    creator: Uuid,
    conversation_type: ConversationType,
    requested: &[Uuid],
) -> Result<Vec<Uuid>> {
    if conversation_type == ConversationType::Customer {
        return Err(Error::Unprocessable(
            "Customer conversations can only be created by the messaging provider".to_string(),
        ));
    }

    let mut members: BTreeSet<Uuid> = requested.iter().copied().collect();
    members.insert(creator);
    if members.len() < 2 {
        return Err(Error::Unprocessable(
            "A conversation needs at least two members".to_string(),
        ));
    }
    Ok(members.into_iter().collect())
}
