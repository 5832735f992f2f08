//! Cursor pagination over a `(sort key, id)` total order.
//!
//! The cursor is the id of the last row of the previous page. It is resolved
//! to that row's sort key and the next page continues strictly after
//! `(key, id)` in the listing order. Ties on the sort key are broken by id,
//! so pages never skip or repeat rows even when many rows share a timestamp.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::defaults::{PAGE_LIMIT, PAGE_LIMIT_MAX};

/// Caller-supplied pagination arguments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub limit: Option<i64>,
    pub after: Option<Uuid>,
}

impl PageRequest {
    pub fn new(limit: Option<i64>, after: Option<Uuid>) -> Self {
        Self { limit, after }
    }

    pub fn first(limit: i64) -> Self {
        Self::new(Some(limit), None)
    }

    /// Effective page size, clamped to `[0, PAGE_LIMIT_MAX]`.
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(PAGE_LIMIT).clamp(0, PAGE_LIMIT_MAX)
    }
}

/// Listing direction of the sort key. The id tie-breaker follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// SQL keyword.
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    /// Row comparison operator selecting rows strictly after a cursor.
    pub fn after_operator(&self) -> &'static str {
        match self {
            SortDirection::Asc => ">",
            SortDirection::Desc => "<",
        }
    }
}

/// Position of a row in a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor<K> {
    pub key: K,
    pub id: Uuid,
}

impl<K: Ord> Cursor<K> {
    pub fn new(key: K, id: Uuid) -> Self {
        Self { key, id }
    }

    /// Compare two positions in listing order: `Less` means `self` is listed
    /// first.
    pub fn compare(&self, other: &Self, direction: SortDirection) -> Ordering {
        let natural = self
            .key
            .cmp(&other.key)
            .then_with(|| self.id.cmp(&other.id));
        match direction {
            SortDirection::Asc => natural,
            SortDirection::Desc => natural.reverse(),
        }
    }

    /// True when `self` is listed strictly after `cursor`.
    pub fn is_after(&self, cursor: &Self, direction: SortDirection) -> bool {
        self.compare(cursor, direction) == Ordering::Greater
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_more: bool,
    pub next_cursor: Option<Uuid>,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            has_more: false,
            next_cursor: None,
        }
    }

    /// Build a page from rows fetched with `LIMIT limit + 1`. The extra row
    /// only signals that more rows exist and is discarded.
    ///
    /// `has_more` is only set when `next_cursor` is, so a zero limit yields
    /// an empty final page.
    pub fn from_overfetch<F>(mut rows: Vec<T>, limit: i64, id_of: F) -> Self
    where
        F: Fn(&T) -> Uuid,
    {
        let limit = limit.max(0) as usize;
        let has_more = limit > 0 && rows.len() > limit;
        rows.truncate(limit);
        let next_cursor = if has_more {
            rows.last().map(&id_of)
        } else {
            None
        };
        Self {
            items: rows,
            has_more,
            next_cursor,
        }
    }

    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            items: self.items.into_iter().map(f).collect(),
            has_more: self.has_more,
            next_cursor: self.next_cursor,
        }
    }
}

/// Paginate an in-memory candidate set.
///
/// `rows` must already be restricted to what the caller may see; the cursor
/// is resolved among them, so an unknown or invisible cursor yields an
/// empty page.
pub fn paginate<T, K, F>(
    mut rows: Vec<T>,
    request: &PageRequest,
    direction: SortDirection,
    position_of: F,
) -> Page<T>
where
    K: Ord,
    F: Fn(&T) -> Cursor<K>,
{
    rows.sort_by(|a, b| position_of(a).compare(&position_of(b), direction));

    let start = match request.after {
        None => 0,
        Some(after) => match rows.iter().position(|r| position_of(r).id == after) {
            Some(idx) => idx + 1,
            None => return Page::empty(),
        },
    };

    let limit = request.limit();
    let window: Vec<T> = rows
        .into_iter()
        .skip(start)
        .take(limit as usize + 1)
        .collect();
    Page::from_overfetch(window, limit, |r| position_of(r).id)
}
