//! Message repository implementation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use frontdesk_core::cursor::SortDirection;
use frontdesk_core::{
    new_v7, AuthorType, CreateMessageRequest, DeliveryStatus, DeliveryUpdate, Error, EventBus,
    Message, MessageAction, MessageContent, MessageRepository, Page, PageRequest, Result,
    Visibility,
};

use crate::query::{after_cursor_clause, bind_params, QueryParam, WhereBuilder};
use crate::visibility::VisibilityQueryBuilder;

const MESSAGE_COLUMNS: &str = "m.id, m.conversation_id, m.author_type, m.author_id, m.content, m.external_message_id, m.customer_delivery_status, m.customer_delivery_error, m.metadata, m.created_at, m.updated_at";

/// PostgreSQL implementation of MessageRepository.
pub struct PgMessageRepository {
    pool: Pool<Postgres>,
    events: Arc<EventBus>,
}

impl PgMessageRepository {
    pub fn new(pool: Pool<Postgres>, events: Arc<EventBus>) -> Self {
        Self { pool, events }
    }

    fn parse_row(row: &sqlx::postgres::PgRow) -> Result<Message> {
        let content: serde_json::Value = row.get("content");
        Ok(Message {
            id: row.get("id"),
            conversation_id: row.get("conversation_id"),
            author_type: AuthorType::parse(row.get("author_type"))?,
            author_id: row.get("author_id"),
            content: MessageContent::from_json(content)?,
            external_message_id: row.get("external_message_id"),
            customer_delivery_status: DeliveryStatus::parse(row.get("customer_delivery_status"))?,
            customer_delivery_error: row.get("customer_delivery_error"),
            metadata: row.get("metadata"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    async fn fetch_one_where(&self, clause: &str, param: QueryParam) -> Result<Option<Message>> {
        let sql = format!("SELECT {MESSAGE_COLUMNS} FROM message m WHERE {clause}");
        let row = bind_params(sqlx::query(&sql), &[param])
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        row.as_ref().map(Self::parse_row).transpose()
    }
}

/// Visibility of the parent conversation plus an optional conversation
/// restriction, for message alias `m` joined to conversation alias `c`.
fn push_scope(
    w: &mut WhereBuilder,
    m: &str,
    c: &str,
    scope: &Visibility,
    conversation_id: Option<Uuid>,
) {
    let (vis_sql, vis_params) = VisibilityQueryBuilder::new(scope, c, w.param_count()).build();
    w.push_fragment(vis_sql, vis_params);
    if let Some(id) = conversation_id {
        w.push_param(&format!("{m}.conversation_id = {{}}"), QueryParam::Uuid(id));
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn list(
        &self,
        scope: &Visibility,
        conversation_id: Option<Uuid>,
        page: &PageRequest,
    ) -> Result<Page<Message>> {
        let limit = page.limit();
        let mut w = WhereBuilder::new();
        push_scope(&mut w, "m", "c", scope, conversation_id);

        if let Some(after) = page.after {
            let mut cw = WhereBuilder::starting_at(w.param_count());
            cw.push_param("mm.id = {}", QueryParam::Uuid(after));
            push_scope(&mut cw, "mm", "cc", scope, conversation_id);
            let (cursor_where, cursor_params) = cw.build();
            let cursor_sql = format!(
                "SELECT mm.created_at, mm.id FROM message mm
                 JOIN conversation cc ON cc.id = mm.conversation_id
                 WHERE {cursor_where}"
            );
            w.push_fragment(
                after_cursor_clause("m", "created_at", SortDirection::Desc, &cursor_sql),
                cursor_params,
            );
        }

        let limit_idx = w.next_index();
        let (where_sql, mut params) = w.build();
        params.push(QueryParam::Int(limit + 1));

        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM message m
             JOIN conversation c ON c.id = m.conversation_id
             WHERE {where_sql}
             ORDER BY m.created_at DESC, m.id DESC
             LIMIT ${limit_idx}"
        );
        let rows = bind_params(sqlx::query(&sql), &params)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let messages = rows
            .iter()
            .map(Self::parse_row)
            .collect::<Result<Vec<_>>>()?;
        Ok(Page::from_overfetch(messages, limit, |m: &Message| m.id))
    }

    async fn get_visible(&self, scope: &Visibility, id: Uuid) -> Result<Option<Message>> {
        let mut w = WhereBuilder::new();
        w.push_param("m.id = {}", QueryParam::Uuid(id));
        push_scope(&mut w, "m", "c", scope, None);
        let (where_sql, params) = w.build();

        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM message m
             JOIN conversation c ON c.id = m.conversation_id
             WHERE {where_sql}"
        );
        let row = bind_params(sqlx::query(&sql), &params)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        row.as_ref().map(Self::parse_row).transpose()
    }

    async fn get(&self, id: Uuid) -> Result<Option<Message>> {
        self.fetch_one_where("m.id = $1", QueryParam::Uuid(id)).await
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Message>> {
        self.fetch_one_where(
            "m.external_message_id = $1",
            QueryParam::String(external_id.to_string()),
        )
        .await
    }

    async fn create(&self, req: CreateMessageRequest) -> Result<Message> {
        let now = Utc::now();
        let content = serde_json::to_value(&req.content)?;

        let row = sqlx::query(&format!(
            "INSERT INTO message AS m
                 (id, conversation_id, author_type, author_id, content, external_message_id,
                  customer_delivery_status, metadata, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, 'UNSENT', $7, $8, $8)
             ON CONFLICT (external_message_id) DO NOTHING
             RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(new_v7())
        .bind(req.conversation_id)
        .bind(req.author_type.as_str())
        .bind(req.author_id)
        .bind(&content)
        .bind(&req.external_message_id)
        .bind(&req.metadata)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        match row {
            Some(row) => {
                let message = Self::parse_row(&row)?;
                self.events.publish_message(MessageAction::Create, &message);
                Ok(message)
            }
            None => {
                // Replay of an already stored provider message.
                let external_id = req.external_message_id.as_deref().unwrap_or_default();
                self.find_by_external_id(external_id).await?.ok_or_else(|| {
                    Error::Internal(format!("message {external_id} vanished after conflict"))
                })
            }
        }
    }

    async fn latest_in_conversation(&self, conversation_id: Uuid) -> Result<Option<Message>> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM message m
             WHERE m.conversation_id = $1
             ORDER BY m.created_at DESC, m.id DESC
             LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(conversation_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        row.as_ref().map(Self::parse_row).transpose()
    }

    async fn update_delivery(&self, id: Uuid, update: DeliveryUpdate) -> Result<Message> {
        let row = sqlx::query(&format!(
            "UPDATE message m SET
                 customer_delivery_status = $2,
                 external_message_id = COALESCE($3, m.external_message_id),
                 customer_delivery_error = $4,
                 updated_at = $5
             WHERE m.id = $1
             RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(id)
        .bind(update.status.as_str())
        .bind(&update.external_message_id)
        .bind(&update.error)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or_else(|| Error::NotFound(format!("message {id}")))?;

        let message = Self::parse_row(&row)?;
        self.events.publish_message(MessageAction::Update, &message);
        Ok(message)
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Message>> {
        let row = sqlx::query(&format!(
            "DELETE FROM message m WHERE m.id = $1 RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let message = Self::parse_row(&row)?;
        self.events.publish_message(MessageAction::Delete, &message);
        Ok(Some(message))
    }
}
