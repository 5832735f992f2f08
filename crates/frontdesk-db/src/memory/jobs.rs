//! In-memory job queue and settings.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use uuid::Uuid;

use frontdesk_core::{
    new_v7, Error, Job, JobRepository, JobStatus, QueueJobRequest, QueueStats, Result,
    SettingsRepository,
};

use super::SharedState;

pub struct MemoryJobRepository {
    state: SharedState,
    notify: Arc<Notify>,
}

impl MemoryJobRepository {
    pub(crate) fn new(state: SharedState) -> Self {
        Self {
            state,
            notify: Arc::new(Notify::new()),
        }
    }
}

#[async_trait]
impl JobRepository for MemoryJobRepository {
    async fn queue(&self, req: QueueJobRequest) -> Result<Job> {
        let now = Utc::now();
        let job = Job {
            id: new_v7(),
            queue: req.queue,
            kind: req.kind,
            key: req.key,
            payload: req.payload,
            status: JobStatus::Pending,
            attempts: 0,
            max_attempts: req.max_attempts.max(1),
            error_message: None,
            run_after: now,
            created_at: now,
            started_at: None,
            completed_at: None,
        };
        self.state.write().await.jobs.insert(job.id, job.clone());
        self.notify.notify_waiters();
        Ok(job)
    }

    async fn claim_next(&self, queue: &str) -> Result<Option<Job>> {
        let now = Utc::now();
        let mut state = self.state.write().await;
        let next = state
            .jobs
            .values()
            .filter(|j| j.queue == queue && j.status == JobStatus::Pending && j.run_after <= now)
            .min_by(|a, b| {
                a.run_after
                    .cmp(&b.run_after)
                    .then(a.created_at.cmp(&b.created_at))
                    .then(a.id.cmp(&b.id))
            })
            .map(|j| j.id);

        let Some(job) = next.and_then(|id| state.jobs.get_mut(&id)) else {
            return Ok(None);
        };
        job.status = JobStatus::Running;
        job.started_at = Some(now);
        job.attempts += 1;
        Ok(Some(job.clone()))
    }

    async fn complete(&self, job_id: Uuid) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(job) = state.jobs.get_mut(&job_id) {
            job.status = JobStatus::Completed;
            job.completed_at = Some(Utc::now());
            job.error_message = None;
        }
        Ok(())
    }

    async fn fail(
        &self,
        job_id: Uuid,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<JobStatus> {
        let mut state = self.state.write().await;
        let job = state
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| Error::NotFound(format!("job {job_id}")))?;
        job.error_message = Some(error.to_string());
        match retry_at {
            Some(run_after) => {
                job.status = JobStatus::Pending;
                job.run_after = run_after;
                job.started_at = None;
            }
            None => {
                job.status = JobStatus::Failed;
                job.completed_at = Some(Utc::now());
            }
        }
        Ok(job.status)
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<Job>> {
        Ok(self.state.read().await.jobs.get(&job_id).cloned())
    }

    async fn list_by_status(
        &self,
        queue: &str,
        status: JobStatus,
        limit: i64,
    ) -> Result<Vec<Job>> {
        let state = self.state.read().await;
        let mut jobs: Vec<Job> = state
            .jobs
            .values()
            .filter(|j| j.queue == queue && j.status == status)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        jobs.truncate(limit.max(0) as usize);
        Ok(jobs)
    }

    async fn stats(&self, queue: &str) -> Result<QueueStats> {
        let state = self.state.read().await;
        let mut stats = QueueStats::default();
        for job in state.jobs.values().filter(|j| j.queue == queue) {
            match job.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Running => stats.running += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
            }
        }
        Ok(stats)
    }

    fn notifier(&self) -> Arc<Notify> {
        self.notify.clone()
    }
}

pub struct MemorySettingsRepository {
    state: SharedState,
}

impl MemorySettingsRepository {
    pub(crate) fn new(state: SharedState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl SettingsRepository for MemorySettingsRepository {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.state.read().await.settings.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.state
            .write()
            .await
            .settings
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
