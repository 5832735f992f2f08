//! Tag repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use frontdesk_core::cursor::SortDirection;
use frontdesk_core::{new_v7, Error, Page, PageRequest, Result, Tag, TagRepository};

use crate::query::{after_cursor_clause, bind_params, QueryParam, WhereBuilder};

const TAG_COLUMNS: &str = "t.id, t.name, t.created_at";

/// PostgreSQL implementation of TagRepository.
pub struct PgTagRepository {
    pool: Pool<Postgres>,
}

impl PgTagRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(row: sqlx::postgres::PgRow) -> Tag {
        Tag {
            id: row.get("id"),
            name: row.get("name"),
            created_at: row.get("created_at"),
        }
    }
}

#[async_trait]
impl TagRepository for PgTagRepository {
    async fn list(&self, page: &PageRequest) -> Result<Page<Tag>> {
        let limit = page.limit();
        let mut w = WhereBuilder::new();
        if let Some(after) = page.after {
            let mut cw = WhereBuilder::starting_at(w.param_count());
            cw.push_param("tt.id = {}", QueryParam::Uuid(after));
            let (cursor_where, cursor_params) = cw.build();
            let cursor_sql = format!("SELECT tt.name, tt.id FROM tag tt WHERE {cursor_where}");
            w.push_fragment(
                after_cursor_clause("t", "name", SortDirection::Asc, &cursor_sql),
                cursor_params,
            );
        }
        let limit_idx = w.next_index();
        let (where_sql, mut params) = w.build();
        params.push(QueryParam::Int(limit + 1));

        let sql = format!(
            "SELECT {TAG_COLUMNS} FROM tag t
             WHERE {where_sql}
             ORDER BY t.name ASC, t.id ASC
             LIMIT ${limit_idx}"
        );
        let rows = bind_params(sqlx::query(&sql), &params)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let tags = rows.into_iter().map(Self::parse_row).collect();
        Ok(Page::from_overfetch(tags, limit, |t: &Tag| t.id))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Tag>> {
        let row = sqlx::query(&format!("SELECT {TAG_COLUMNS} FROM tag t WHERE t.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.map(Self::parse_row))
    }

    async fn find_or_create(&self, name: &str) -> Result<Tag> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Unprocessable("Tag name must not be empty".to_string()));
        }
        // The no-op update makes RETURNING yield the existing row on conflict.
        let row = sqlx::query(&format!(
            "INSERT INTO tag AS t (id, name, created_at) VALUES ($1, $2, $3)
             ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
             RETURNING {TAG_COLUMNS}"
        ))
        .bind(new_v7())
        .bind(name)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(Self::parse_row(row))
    }

    async fn tag(&self, conversation_id: Uuid, tag_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO conversation_tag (conversation_id, tag_id, created_at)
             VALUES ($1, $2, $3)
             ON CONFLICT DO NOTHING",
        )
        .bind(conversation_id)
        .bind(tag_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn untag(&self, conversation_id: Uuid, tag_id: Uuid) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM conversation_tag WHERE conversation_id = $1 AND tag_id = $2")
                .bind(conversation_id)
                .bind(tag_id)
                .execute(&self.pool)
                .await
                .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn for_conversation(&self, conversation_id: Uuid) -> Result<Vec<Tag>> {
        let rows = sqlx::query(&format!(
            "SELECT {TAG_COLUMNS} FROM tag t
             JOIN conversation_tag ct ON ct.tag_id = t.id
             WHERE ct.conversation_id = $1
             ORDER BY t.name ASC, t.id ASC"
        ))
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.into_iter().map(Self::parse_row).collect())
    }
}
