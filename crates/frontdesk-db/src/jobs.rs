//! Job repository implementation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};
use tokio::sync::Notify;
use uuid::Uuid;

use frontdesk_core::{
    new_v7, Error, Job, JobRepository, JobStatus, QueueJobRequest, QueueStats, Result,
};

const JOB_COLUMNS: &str = "id, queue, kind, key, payload, status, attempts, max_attempts, error_message, run_after, created_at, started_at, completed_at";

/// PostgreSQL implementation of JobRepository.
pub struct PgJobRepository {
    pool: Pool<Postgres>,
    /// Woken on every queued job so idle workers skip their poll interval.
    notify: Arc<Notify>,
}

impl PgJobRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            pool,
            notify: Arc::new(Notify::new()),
        }
    }

    /// Create a repository sharing an existing notify handle.
    pub fn with_notify(pool: Pool<Postgres>, notify: Arc<Notify>) -> Self {
        Self { pool, notify }
    }

    fn parse_job_row(row: sqlx::postgres::PgRow) -> Result<Job> {
        Ok(Job {
            id: row.get("id"),
            queue: row.get("queue"),
            kind: row.get("kind"),
            key: row.get("key"),
            payload: row.get("payload"),
            status: JobStatus::parse(row.get("status"))?,
            attempts: row.get("attempts"),
            max_attempts: row.get("max_attempts"),
            error_message: row.get("error_message"),
            run_after: row.get("run_after"),
            created_at: row.get("created_at"),
            started_at: row.get("started_at"),
            completed_at: row.get("completed_at"),
        })
    }
}

#[async_trait]
impl JobRepository for PgJobRepository {
    async fn queue(&self, req: QueueJobRequest) -> Result<Job> {
        let now = Utc::now();
        let row = sqlx::query(&format!(
            "INSERT INTO job_queue (id, queue, kind, key, payload, status, attempts, max_attempts, run_after, created_at)
             VALUES ($1, $2, $3, $4, $5, 'pending', 0, $6, $7, $7)
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(new_v7())
        .bind(&req.queue)
        .bind(&req.kind)
        .bind(&req.key)
        .bind(&req.payload)
        .bind(req.max_attempts.max(1))
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        let job = Self::parse_job_row(row)?;
        self.notify.notify_waiters();
        Ok(job)
    }

    async fn claim_next(&self, queue: &str) -> Result<Option<Job>> {
        // FOR UPDATE SKIP LOCKED lets concurrent workers claim distinct rows.
        let row = sqlx::query(&format!(
            "UPDATE job_queue
             SET status = 'running', started_at = $2, attempts = attempts + 1
             WHERE id = (
                 SELECT id FROM job_queue
                 WHERE queue = $1 AND status = 'pending' AND run_after <= $2
                 ORDER BY run_after ASC, created_at ASC
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(queue)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_job_row).transpose()
    }

    async fn complete(&self, job_id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE job_queue
             SET status = 'completed', completed_at = $1, error_message = NULL
             WHERE id = $2",
        )
        .bind(Utc::now())
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn fail(
        &self,
        job_id: Uuid,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<JobStatus> {
        let result = match retry_at {
            Some(run_after) => {
                // Retry: back to pending, runnable once the backoff elapses.
                sqlx::query(
                    "UPDATE job_queue
                     SET status = 'pending', error_message = $1, run_after = $2, started_at = NULL
                     WHERE id = $3",
                )
                .bind(error)
                .bind(run_after)
                .bind(job_id)
                .execute(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    "UPDATE job_queue
                     SET status = 'failed', error_message = $1, completed_at = $2
                     WHERE id = $3",
                )
                .bind(error)
                .bind(Utc::now())
                .bind(job_id)
                .execute(&self.pool)
                .await
            }
        }
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("job {job_id}")));
        }
        Ok(if retry_at.is_some() {
            JobStatus::Pending
        } else {
            JobStatus::Failed
        })
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<Job>> {
        let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM job_queue WHERE id = $1"))
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        row.map(Self::parse_job_row).transpose()
    }

    async fn list_by_status(
        &self,
        queue: &str,
        status: JobStatus,
        limit: i64,
    ) -> Result<Vec<Job>> {
        let rows = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM job_queue
             WHERE queue = $1 AND status = $2
             ORDER BY created_at DESC, id DESC
             LIMIT $3"
        ))
        .bind(queue)
        .bind(status.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.into_iter().map(Self::parse_job_row).collect()
    }

    async fn stats(&self, queue: &str) -> Result<QueueStats> {
        let row = sqlx::query(
            "SELECT
                COUNT(*) FILTER (WHERE status = 'pending') as pending,
                COUNT(*) FILTER (WHERE status = 'running') as running,
                COUNT(*) FILTER (WHERE status = 'completed') as completed,
                COUNT(*) FILTER (WHERE status = 'failed') as failed
             FROM job_queue
             WHERE queue = $1",
        )
        .bind(queue)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(QueueStats {
            pending: row.get::<i64, _>("pending"),
            running: row.get::<i64, _>("running"),
            completed: row.get::<i64, _>("completed"),
            failed: row.get::<i64, _>("failed"),
        })
    }

    fn notifier(&self) -> Arc<Notify> {
        self.notify.clone()
    }
}
