//! Staff repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use frontdesk_core::{
    new_v7, Error, Permission, Result, Staff, StaffRepository, UpsertStaffRequest,
};

const STAFF_COLUMNS: &str = "id, external_id, display_name, permissions, created_at, updated_at";

/// PostgreSQL implementation of StaffRepository.
pub struct PgStaffRepository {
    pool: Pool<Postgres>,
}

impl PgStaffRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(row: sqlx::postgres::PgRow) -> Staff {
        let permissions: Vec<String> = row.get("permissions");
        Staff {
            id: row.get("id"),
            external_id: row.get("external_id"),
            display_name: row.get("display_name"),
            permissions: permissions
                .iter()
                .filter_map(|p| Permission::parse(p))
                .collect(),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

#[async_trait]
impl StaffRepository for PgStaffRepository {
    async fn upsert(&self, req: UpsertStaffRequest) -> Result<Staff> {
        let now = Utc::now();
        let permissions: Vec<String> = req
            .permissions
            .iter()
            .map(|p| p.as_str().to_string())
            .collect();

        let row = sqlx::query(&format!(
            "INSERT INTO staff (id, external_id, display_name, permissions, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $5)
             ON CONFLICT (external_id) DO UPDATE
                 SET display_name = EXCLUDED.display_name,
                     permissions = EXCLUDED.permissions,
                     updated_at = EXCLUDED.updated_at
             RETURNING {STAFF_COLUMNS}"
        ))
        .bind(new_v7())
        .bind(&req.external_id)
        .bind(&req.display_name)
        .bind(&permissions)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(Self::parse_row(row))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Staff>> {
        let row = sqlx::query(&format!("SELECT {STAFF_COLUMNS} FROM staff WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.map(Self::parse_row))
    }

    async fn existing_ids(&self, ids: &[Uuid]) -> Result<Vec<Uuid>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let found: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM staff WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(found)
    }
}
