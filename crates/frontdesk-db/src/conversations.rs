//! Conversation repository implementation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use frontdesk_core::cursor::SortDirection;
use frontdesk_core::{
    new_v7, Conversation, ConversationFilter, ConversationRepository, ConversationType,
    CreateConversationRequest, Error, EventBus, ExternalConversation, Page, PageRequest, Result,
    Visibility,
};

use crate::query::{after_cursor_clause, bind_params, QueryParam, WhereBuilder};
use crate::visibility::VisibilityQueryBuilder;

pub(crate) const CONVERSATION_COLUMNS: &str = "c.id, c.conversation_type, c.customer_id, c.external_conversation_id, c.source, c.metadata, c.created_at, c.updated_at";

/// Parse a conversation row selected with [`CONVERSATION_COLUMNS`].
pub(crate) fn parse_conversation_row(row: &sqlx::postgres::PgRow) -> Result<Conversation> {
    Ok(Conversation {
        id: row.get("id"),
        conversation_type: ConversationType::parse(row.get("conversation_type"))?,
        customer_id: row.get("customer_id"),
        external_conversation_id: row.get("external_conversation_id"),
        source: row.get("source"),
        metadata: row.get("metadata"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// Add the listing filters for alias `a` to a where builder.
fn push_filter(w: &mut WhereBuilder, a: &str, scope: &Visibility, filter: &ConversationFilter) {
    let (vis_sql, vis_params) = VisibilityQueryBuilder::new(scope, a, w.param_count()).build();
    w.push_fragment(vis_sql, vis_params);

    if let Some(t) = filter.conversation_type {
        w.push_param(
            &format!("{a}.conversation_type = {{}}"),
            QueryParam::String(t.as_str().to_string()),
        );
    }
    if let Some(customer_id) = filter.customer_id {
        w.push_param(
            &format!("{a}.customer_id = {{}}"),
            QueryParam::Uuid(customer_id),
        );
    }
    if let Some(tag_id) = filter.tag_id {
        w.push_param(
            &format!("EXISTS (SELECT 1 FROM conversation_tag ct WHERE ct.conversation_id = {a}.id AND ct.tag_id = {{}})"),
            QueryParam::Uuid(tag_id),
        );
    }
}

/// PostgreSQL implementation of ConversationRepository.
pub struct PgConversationRepository {
    pool: Pool<Postgres>,
    events: Arc<EventBus>,
}

impl PgConversationRepository {
    pub fn new(pool: Pool<Postgres>, events: Arc<EventBus>) -> Self {
        Self { pool, events }
    }

    async fn fetch_one_where(&self, clause: &str, param: QueryParam) -> Result<Option<Conversation>> {
        let sql = format!("SELECT {CONVERSATION_COLUMNS} FROM conversation c WHERE {clause}");
        let row = bind_params(sqlx::query(&sql), &[param])
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        row.as_ref().map(parse_conversation_row).transpose()
    }
}

#[async_trait]
impl ConversationRepository for PgConversationRepository {
    async fn list(
        &self,
        scope: &Visibility,
        filter: &ConversationFilter,
        page: &PageRequest,
    ) -> Result<Page<Conversation>> {
        let limit = page.limit();
        let mut w = WhereBuilder::new();
        push_filter(&mut w, "c", scope, filter);

        if let Some(after) = page.after {
            // The cursor row must itself be listable under the same filter.
            let mut cw = WhereBuilder::starting_at(w.param_count());
            cw.push_param("cc.id = {}", QueryParam::Uuid(after));
            push_filter(&mut cw, "cc", scope, filter);
            let (cursor_where, cursor_params) = cw.build();
            let cursor_sql =
                format!("SELECT cc.updated_at, cc.id FROM conversation cc WHERE {cursor_where}");
            w.push_fragment(
                after_cursor_clause("c", "updated_at", SortDirection::Desc, &cursor_sql),
                cursor_params,
            );
        }

        let limit_idx = w.next_index();
        let (where_sql, mut params) = w.build();
        params.push(QueryParam::Int(limit + 1));

        let sql = format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversation c
             WHERE {where_sql}
             ORDER BY c.updated_at DESC, c.id DESC
             LIMIT ${limit_idx}"
        );
        let rows = bind_params(sqlx::query(&sql), &params)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let conversations = rows
            .iter()
            .map(parse_conversation_row)
            .collect::<Result<Vec<_>>>()?;
        Ok(Page::from_overfetch(conversations, limit, |c: &Conversation| c.id))
    }

    async fn get_visible(&self, scope: &Visibility, id: Uuid) -> Result<Option<Conversation>> {
        let (vis_sql, vis_params) = VisibilityQueryBuilder::new(scope, "c", 1).build();
        let sql = format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversation c WHERE c.id = $1 AND {vis_sql}"
        );
        let mut params = vec![QueryParam::Uuid(id)];
        params.extend(vis_params);
        let row = bind_params(sqlx::query(&sql), &params)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        row.as_ref().map(parse_conversation_row).transpose()
    }

    async fn get(&self, id: Uuid) -> Result<Option<Conversation>> {
        self.fetch_one_where("c.id = $1", QueryParam::Uuid(id)).await
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Conversation>> {
        self.fetch_one_where(
            "c.external_conversation_id = $1",
            QueryParam::String(external_id.to_string()),
        )
        .await
    }

    async fn create(&self, req: CreateConversationRequest) -> Result<Conversation> {
        let now = Utc::now();
        let id = new_v7();
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let row = sqlx::query(&format!(
            "INSERT INTO conversation AS c (id, conversation_type, metadata, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $4)
             RETURNING {CONVERSATION_COLUMNS}"
        ))
        .bind(id)
        .bind(req.conversation_type.as_str())
        .bind(&req.metadata)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?;

        sqlx::query(
            "INSERT INTO conversation_member (conversation_id, staff_id, created_at)
             SELECT $1, unnest($2::uuid[]), $3
             ON CONFLICT DO NOTHING",
        )
        .bind(id)
        .bind(&req.member_ids)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;
        parse_conversation_row(&row)
    }

    async fn upsert_external(&self, incoming: ExternalConversation) -> Result<Conversation> {
        let now = Utc::now();
        // Same rules as merge::merge_external_conversation: only still-null
        // customer and source are filled in on conflict.
        let row = sqlx::query(&format!(
            "INSERT INTO conversation AS c
                 (id, conversation_type, customer_id, external_conversation_id, source, metadata, created_at, updated_at)
             VALUES ($1, 'CUSTOMER', $2, $3, $4, $5, $6, $6)
             ON CONFLICT (external_conversation_id) DO UPDATE SET
                 customer_id = COALESCE(c.customer_id, EXCLUDED.customer_id),
                 source = COALESCE(c.source, EXCLUDED.source)
             RETURNING {CONVERSATION_COLUMNS}"
        ))
        .bind(new_v7())
        .bind(incoming.customer_id)
        .bind(&incoming.external_conversation_id)
        .bind(&incoming.source)
        .bind(&incoming.metadata)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        parse_conversation_row(&row)
    }

    async fn add_members(&self, conversation_id: Uuid, staff_ids: &[Uuid]) -> Result<()> {
        sqlx::query(
            "INSERT INTO conversation_member (conversation_id, staff_id, created_at)
             SELECT $1, unnest($2::uuid[]), $3
             ON CONFLICT DO NOTHING",
        )
        .bind(conversation_id)
        .bind(staff_ids)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn members(&self, conversation_id: Uuid) -> Result<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT staff_id FROM conversation_member WHERE conversation_id = $1 ORDER BY staff_id",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(ids)
    }

    async fn touch(&self, conversation_id: Uuid) -> Result<Conversation> {
        let row = sqlx::query(&format!(
            "UPDATE conversation c SET updated_at = $2 WHERE c.id = $1
             RETURNING {CONVERSATION_COLUMNS}"
        ))
        .bind(conversation_id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or_else(|| Error::NotFound(format!("conversation {conversation_id}")))?;

        let conversation = parse_conversation_row(&row)?;
        self.events.publish_conversation_touched(&conversation);
        Ok(conversation)
    }
}
