//! Read receipt repository implementation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use frontdesk_core::{
    new_v7, Error, EventBus, ReadReceipt, ReadReceiptRepository, ReaderType, Result,
    UpsertReadReceiptRequest, Visibility,
};

use crate::query::{bind_params, QueryParam};
use crate::visibility::VisibilityQueryBuilder;

const RECEIPT_COLUMNS: &str = "r.id, r.conversation_id, r.user_id, r.user_type, r.last_read_message_id, r.created_at, r.updated_at";

/// PostgreSQL implementation of ReadReceiptRepository.
pub struct PgReadReceiptRepository {
    pool: Pool<Postgres>,
    events: Arc<EventBus>,
}

impl PgReadReceiptRepository {
    pub fn new(pool: Pool<Postgres>, events: Arc<EventBus>) -> Self {
        Self { pool, events }
    }

    fn parse_row(row: &sqlx::postgres::PgRow) -> Result<ReadReceipt> {
        Ok(ReadReceipt {
            id: row.get("id"),
            conversation_id: row.get("conversation_id"),
            user_id: row.get("user_id"),
            user_type: ReaderType::parse(row.get("user_type"))?,
            last_read_message_id: row.get("last_read_message_id"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

#[async_trait]
impl ReadReceiptRepository for PgReadReceiptRepository {
    async fn upsert(&self, req: UpsertReadReceiptRequest) -> Result<ReadReceipt> {
        let row = sqlx::query(&format!(
            "INSERT INTO read_receipt AS r
                 (id, conversation_id, user_id, user_type, last_read_message_id, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $6)
             ON CONFLICT (user_id, user_type, conversation_id) DO UPDATE SET
                 last_read_message_id = EXCLUDED.last_read_message_id,
                 updated_at = EXCLUDED.updated_at
             RETURNING {RECEIPT_COLUMNS}"
        ))
        .bind(new_v7())
        .bind(req.conversation_id)
        .bind(req.user_id)
        .bind(req.user_type.as_str())
        .bind(req.last_read_message_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        let receipt = Self::parse_row(&row)?;
        self.events.publish_read_receipt(&receipt);
        Ok(receipt)
    }

    async fn list(&self, scope: &Visibility, conversation_id: Uuid) -> Result<Vec<ReadReceipt>> {
        let (vis_sql, vis_params) = VisibilityQueryBuilder::new(scope, "c", 1).build();
        let sql = format!(
            "SELECT {RECEIPT_COLUMNS} FROM read_receipt r
             JOIN conversation c ON c.id = r.conversation_id
             WHERE r.conversation_id = $1 AND {vis_sql}
             ORDER BY r.updated_at DESC, r.id DESC"
        );
        let mut params = vec![QueryParam::Uuid(conversation_id)];
        params.extend(vis_params);

        let rows = bind_params(sqlx::query(&sql), &params)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        rows.iter().map(Self::parse_row).collect()
    }
}
