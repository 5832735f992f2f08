//! SQL rendering of conversation visibility rules.
//!
//! Turns a [`Visibility`] into a parenthesised `OR` of clauses over a
//! conversation table alias, so the rules are applied inside every query that
//! reads conversations or their children.

use frontdesk_core::rules::{Visibility, VisibilityRule};

use crate::query::QueryParam;

/// Generates the visibility `WHERE` fragment for a conversation alias.
///
/// # Example
///
/// ```rust,ignore
/// let builder = VisibilityQueryBuilder::new(&scope, "c", 2);
/// let (sql, params) = builder.build();
/// // sql: "((c.conversation_type = 'PRIVATE' AND EXISTS (...cm.staff_id = $3)) OR (...))"
/// ```
pub struct VisibilityQueryBuilder<'a> {
    scope: &'a Visibility,
    alias: &'a str,
    param_offset: usize,
}

impl<'a> VisibilityQueryBuilder<'a> {
    /// `param_offset` is the number of parameters already in the query.
    pub fn new(scope: &'a Visibility, alias: &'a str, param_offset: usize) -> Self {
        Self {
            scope,
            alias,
            param_offset,
        }
    }

    pub fn build(&self) -> (String, Vec<QueryParam>) {
        let a = self.alias;
        let mut clauses = Vec::new();
        let mut params = Vec::new();
        let mut param_idx = self.param_offset;

        for rule in self.scope.rules() {
            match rule {
                VisibilityRule::Always => return ("TRUE".to_string(), Vec::new()),
                VisibilityRule::StaffIsMember(staff_id) => {
                    param_idx += 1;
                    clauses.push(format!(
                        "({a}.conversation_type = 'PRIVATE' AND EXISTS (SELECT 1 FROM conversation_member cm WHERE cm.conversation_id = {a}.id AND cm.staff_id = ${param_idx}))"
                    ));
                    params.push(QueryParam::Uuid(*staff_id));
                }
                VisibilityRule::PublicNonCustomer => clauses.push(format!(
                    "({a}.conversation_type = 'PUBLIC' AND {a}.customer_id IS NULL)"
                )),
                VisibilityRule::CustomerWithPermission => clauses.push(format!(
                    "({a}.conversation_type = 'CUSTOMER' AND {a}.customer_id IS NOT NULL)"
                )),
            }
        }

        if clauses.is_empty() {
            return ("FALSE".to_string(), Vec::new());
        }
        (format!("({})", clauses.join(" OR ")), params)
    }
}
