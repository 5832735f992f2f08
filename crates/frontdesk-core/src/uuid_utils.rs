//! UUID v7 utilities for time-ordered identifiers.
//!
//! Every entity id is a UUIDv7, so ids created later sort after ids created
//! earlier. Pagination uses the id as the tie-breaker of its sort key.

use uuid::Uuid;

use crate::error::{Error, Result};

/// Generate a new UUIDv7 identifier.
///
/// # Example
///
/// ```
/// use frontdesk_core::uuid_utils::new_v7;
///
/// let a = new_v7();
/// let b = new_v7();
/// assert!(b > a);
/// ```
#[inline]
pub fn new_v7() -> Uuid {
    Uuid::now_v7()
}

/// Check if a UUID is version 7.
#[inline]
pub fn is_v7(uuid: &Uuid) -> bool {
    uuid.get_version_num() == 7
}

/// Parse a caller-supplied id, naming the field in the error.
pub fn parse_id(field: &str, raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| Error::Unprocessable(format!("{field} must be a valid UUID")))
}

/// Parse a list of caller-supplied ids, failing on the first bad one.
pub fn parse_ids<'a, I>(field: &str, raw: I) -> Result<Vec<Uuid>>
where
    I: IntoIterator<Item = &'a str>,
{
    raw.into_iter().map(|s| parse_id(field, s)).collect()
}
