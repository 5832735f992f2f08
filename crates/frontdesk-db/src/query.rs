//! Dynamic query assembly.
//!
//! Listing queries are assembled from fragments that each contribute SQL with
//! `$n` placeholders plus the parameters to bind, in order.

use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::Postgres;
use uuid::Uuid;

use frontdesk_core::cursor::SortDirection;

/// Type-safe parameter binding for SQL queries.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    Uuid(Uuid),
    UuidArray(Vec<Uuid>),
    Int(i64),
    String(String),
}

/// Bind every parameter, in order.
pub fn bind_params<'q>(
    mut q: Query<'q, Postgres, PgArguments>,
    params: &[QueryParam],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        q = match param {
            QueryParam::Uuid(id) => q.bind(*id),
            QueryParam::UuidArray(ids) => q.bind(ids.clone()),
            QueryParam::Int(val) => q.bind(*val),
            QueryParam::String(s) => q.bind(s.clone()),
        };
    }
    q
}

/// Accumulates `AND`-joined clauses and their parameters.
#[derive(Debug, Default)]
pub struct WhereBuilder {
    clauses: Vec<String>,
    params: Vec<QueryParam>,
    offset: usize,
}

impl WhereBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder for a fragment nested in a query that already binds `offset`
    /// parameters. `build` returns only the nested parameters.
    pub fn starting_at(offset: usize) -> Self {
        Self {
            offset,
            ..Self::default()
        }
    }

    /// Index the next pushed parameter will get.
    pub fn next_index(&self) -> usize {
        self.param_count() + 1
    }

    /// Add a clause that binds one parameter, written with `{}` where the
    /// placeholder goes.
    pub fn push_param(&mut self, template: &str, param: QueryParam) {
        let placeholder = format!("${}", self.next_index());
        self.clauses.push(template.replace("{}", &placeholder));
        self.params.push(param);
    }

    /// Add a fragment produced by a sub-builder that numbered its parameters
    /// starting after the current ones.
    pub fn push_fragment(&mut self, sql: String, params: Vec<QueryParam>) {
        self.clauses.push(sql);
        self.params.extend(params);
    }

    /// Add a clause with no parameters.
    pub fn push_raw(&mut self, sql: impl Into<String>) {
        self.clauses.push(sql.into());
    }

    /// Parameters in the enclosing query so far, including the offset.
    pub fn param_count(&self) -> usize {
        self.offset + self.params.len()
    }

    /// `(where_sql, params)`; `TRUE` when no clause was added.
    pub fn build(self) -> (String, Vec<QueryParam>) {
        let sql = if self.clauses.is_empty() {
            "TRUE".to_string()
        } else {
            self.clauses.join(" AND ")
        };
        (sql, self.params)
    }
}

/// Clause keeping only rows listed strictly after the cursor row, for an
/// order of `(key_column dir, id dir)`.
///
/// `cursor_sql` must select the cursor row's `(key, id)`. When it selects no
/// row the comparison is NULL and the page is empty.
pub fn after_cursor_clause(
    alias: &str,
    key_column: &str,
    direction: SortDirection,
    cursor_sql: &str,
) -> String {
    format!(
        "({alias}.{key_column}, {alias}.id) {op} ({cursor_sql})",
        op = direction.after_operator()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_where_builder_numbers_params() {
        let mut w = WhereBuilder::new();
        w.push_param("c.conversation_type = {}", QueryParam::String("PUBLIC".into()));
        w.push_raw("c.customer_id IS NULL");
        w.push_param("c.customer_id = {}", QueryParam::Uuid(Uuid::nil()));
        let (sql, params) = w.build();
        assert_eq!(
            sql,
            "c.conversation_type = $1 AND c.customer_id IS NULL AND c.customer_id = $2"
        );
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_nested_builder_continues_numbering() {
        let mut nested = WhereBuilder::starting_at(4);
        nested.push_param("cc.id = {}", QueryParam::Uuid(Uuid::nil()));
        assert_eq!(nested.param_count(), 5);
        let (sql, params) = nested.build();
        assert_eq!(sql, "cc.id = $5");
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_empty_where_is_true() {
        let (sql, params) = WhereBuilder::new().build();
        assert_eq!(sql, "TRUE");
        assert!(params.is_empty());
    }

    #[test]
    fn test_after_cursor_clause() {
        let sql = after_cursor_clause(
            "c",
            "updated_at",
            SortDirection::Desc,
            "SELECT cc.updated_at, cc.id FROM conversation cc WHERE cc.id = $3",
        );
        assert_eq!(
            sql,
            "(c.updated_at, c.id) < (SELECT cc.updated_at, cc.id FROM conversation cc WHERE cc.id = $3)"
        );
        let asc = after_cursor_clause("t", "name", SortDirection::Asc, "SELECT 1, 2");
        assert!(asc.contains(") > ("));
    }
}
