//! Customer repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use frontdesk_core::cursor::SortDirection;
use frontdesk_core::{
    new_v7, Customer, CustomerProfile, CustomerRepository, Error, Page, PageRequest, Result,
};

use crate::query::{after_cursor_clause, bind_params, QueryParam, WhereBuilder};

const CUSTOMER_COLUMNS: &str =
    "c.id, c.external_id, c.sunshine_user_id, c.display_name, c.locale, c.metadata, c.created_at, c.updated_at";

/// PostgreSQL implementation of CustomerRepository.
pub struct PgCustomerRepository {
    pool: Pool<Postgres>,
}

impl PgCustomerRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(row: sqlx::postgres::PgRow) -> Customer {
        Customer {
            id: row.get("id"),
            external_id: row.get("external_id"),
            sunshine_user_id: row.get("sunshine_user_id"),
            display_name: row.get("display_name"),
            locale: row.get("locale"),
            metadata: row.get("metadata"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

#[async_trait]
impl CustomerRepository for PgCustomerRepository {
    async fn upsert_profile(&self, profile: CustomerProfile) -> Result<Customer> {
        let now = Utc::now();

        // Same rules as merge::merge_customer: external id is set once,
        // non-empty name and locale follow the provider, metadata only on insert.
        let row = sqlx::query(&format!(
            "INSERT INTO customer AS c
                 (id, external_id, sunshine_user_id, display_name, locale, metadata, created_at, updated_at)
             VALUES ($1, $2, $3, NULLIF($4, ''), NULLIF($5, ''), $6, $7, $7)
             ON CONFLICT (sunshine_user_id) DO UPDATE SET
                 external_id = COALESCE(c.external_id, EXCLUDED.external_id),
                 display_name = COALESCE(EXCLUDED.display_name, c.display_name),
                 locale = COALESCE(EXCLUDED.locale, c.locale),
                 updated_at = CASE
                     WHEN (c.external_id IS NULL AND EXCLUDED.external_id IS NOT NULL)
                       OR (EXCLUDED.display_name IS NOT NULL AND EXCLUDED.display_name IS DISTINCT FROM c.display_name)
                       OR (EXCLUDED.locale IS NOT NULL AND EXCLUDED.locale IS DISTINCT FROM c.locale)
                     THEN EXCLUDED.updated_at
                     ELSE c.updated_at
                 END
             RETURNING {CUSTOMER_COLUMNS}"
        ))
        .bind(new_v7())
        .bind(&profile.external_id)
        .bind(&profile.sunshine_user_id)
        .bind(&profile.display_name)
        .bind(&profile.locale)
        .bind(&profile.metadata)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(Self::parse_row(row))
    }

    async fn find_by_sunshine_user_id(&self, sunshine_user_id: &str) -> Result<Option<Customer>> {
        let row = sqlx::query(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customer c WHERE c.sunshine_user_id = $1"
        ))
        .bind(sunshine_user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row.map(Self::parse_row))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Customer>> {
        let row = sqlx::query(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customer c WHERE c.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row.map(Self::parse_row))
    }

    async fn list(&self, page: &PageRequest) -> Result<Page<Customer>> {
        let limit = page.limit();
        let mut w = WhereBuilder::new();
        if let Some(after) = page.after {
            let cursor_sql = format!(
                "SELECT cc.created_at, cc.id FROM customer cc WHERE cc.id = ${}",
                w.next_index()
            );
            w.push_fragment(
                after_cursor_clause("c", "created_at", SortDirection::Desc, &cursor_sql),
                vec![QueryParam::Uuid(after)],
            );
        }
        let limit_idx = w.next_index();
        let (where_sql, mut params) = w.build();
        params.push(QueryParam::Int(limit + 1));

        let sql = format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customer c
             WHERE {where_sql}
             ORDER BY c.created_at DESC, c.id DESC
             LIMIT ${limit_idx}"
        );
        let rows = bind_params(sqlx::query(&sql), &params)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let customers = rows.into_iter().map(Self::parse_row).collect();
        Ok(Page::from_overfetch(customers, limit, |c: &Customer| c.id))
    }
}
