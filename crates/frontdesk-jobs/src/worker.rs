//! Job worker and runner for processing background jobs.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, RwLock, Semaphore};
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use frontdesk_core::{defaults, Job, JobStatus, Result};
use frontdesk_db::Database;

use crate::handler::{JobContext, JobHandler, JobResult};
use crate::queue::RetryPolicy;

/// Configuration for the job worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Polling interval in milliseconds when no enqueue wakes the worker.
    pub poll_interval_ms: u64,
    /// Maximum number of concurrent jobs.
    pub max_concurrent_jobs: usize,
    /// Per-job execution limit in seconds.
    pub job_timeout_secs: u64,
    /// Whether to enable job processing.
    pub enabled: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: defaults::JOB_POLL_INTERVAL_MS,
            max_concurrent_jobs: defaults::JOB_MAX_CONCURRENT,
            job_timeout_secs: defaults::JOB_TIMEOUT_SECS,
            enabled: true,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `JOB_WORKER_ENABLED` | `true` | Enable/disable job processing |
    /// | `JOB_MAX_CONCURRENT` | `30` | Max concurrent jobs per worker |
    /// | `JOB_POLL_INTERVAL_MS` | `1000` | Polling interval when the queue is empty |
    pub fn from_env() -> Self {
        let enabled = std::env::var("JOB_WORKER_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let max_concurrent_jobs = std::env::var("JOB_MAX_CONCURRENT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::JOB_MAX_CONCURRENT)
            .max(1);

        let poll_interval_ms = std::env::var("JOB_POLL_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::JOB_POLL_INTERVAL_MS);

        Self {
            poll_interval_ms,
            max_concurrent_jobs,
            job_timeout_secs: defaults::JOB_TIMEOUT_SECS,
            enabled,
        }
    }

    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent_jobs = max.max(1);
        self
    }

    pub fn with_job_timeout(mut self, secs: u64) -> Self {
        self.job_timeout_secs = secs;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Event emitted by the job worker.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    JobStarted {
        job_id: Uuid,
        queue: String,
        kind: String,
    },
    JobCompleted {
        job_id: Uuid,
        queue: String,
        kind: String,
    },
    /// A run failed and the job was rescheduled.
    JobRetrying {
        job_id: Uuid,
        queue: String,
        kind: String,
        attempt: i32,
        error: String,
        run_after: DateTime<Utc>,
    },
    /// The job failed for good and stays behind as a dead letter.
    JobFailed {
        job_id: Uuid,
        queue: String,
        kind: String,
        error: String,
    },
    WorkerStarted,
    WorkerStopped,
}

impl WorkerEvent {
    /// Job the event is about, if any.
    pub fn job_id(&self) -> Option<Uuid> {
        match self {
            WorkerEvent::JobStarted { job_id, .. }
            | WorkerEvent::JobCompleted { job_id, .. }
            | WorkerEvent::JobRetrying { job_id, .. }
            | WorkerEvent::JobFailed { job_id, .. } => Some(*job_id),
            WorkerEvent::WorkerStarted | WorkerEvent::WorkerStopped => None,
        }
    }
}

/// Handle for controlling a running worker.
pub struct WorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<WorkerEvent>,
    task: tokio::task::JoinHandle<()>,
}

impl WorkerHandle {
    /// Signal the worker to shut down gracefully.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| frontdesk_core::Error::Internal("Failed to send shutdown signal".into()))?;
        Ok(())
    }

    /// Signal shutdown and wait until in-flight jobs have finished.
    pub async fn shutdown_and_wait(self) -> Result<()> {
        // The worker may already be gone; only the join matters then.
        let _ = self.shutdown_tx.send(()).await;
        self.task
            .await
            .map_err(|e| frontdesk_core::Error::Internal(format!("Worker task failed: {}", e)))
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_rx.resubscribe()
    }
}

type HandlerMap = HashMap<(String, String), Arc<dyn JobHandler>>;

/// Job worker that processes jobs from the queues its handlers consume.
pub struct JobWorker {
    db: Database,
    config: WorkerConfig,
    handlers: Arc<RwLock<HandlerMap>>,
    retry_policies: Arc<HashMap<String, RetryPolicy>>,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl JobWorker {
    /// Create a new job worker.
    pub fn new(db: Database, config: WorkerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(defaults::EVENT_BUS_CAPACITY);
        Self {
            db,
            config,
            handlers: Arc::new(RwLock::new(HashMap::new())),
            retry_policies: Arc::new(HashMap::new()),
            event_tx,
        }
    }

    /// Register a handler for its queue and kind.
    pub async fn register_handler<H: JobHandler + 'static>(&self, handler: H) {
        let key = (handler.queue().to_string(), handler.kind().to_string());
        debug!(queue = %key.0, kind = %key.1, "Registered job handler");
        self.handlers.write().await.insert(key, Arc::new(handler));
    }

    /// Start the worker and return a handle for control.
    pub fn start(self) -> WorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();

        let task = tokio::spawn(async move {
            self.run(&mut shutdown_rx).await;
        });

        WorkerHandle {
            shutdown_tx,
            event_rx,
            task,
        }
    }

    /// Run the worker loop.
    ///
    /// Holds one semaphore permit per running job. A job is claimed whenever
    /// a permit is free, so a slow job never holds back the rest of the pool.
    /// Waits only when every queue is empty, and then wakes on enqueue or
    /// after the poll interval.
    #[instrument(skip(self, shutdown_rx), fields(subsystem = "jobs", component = "worker"))]
    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!("Job worker is disabled, not starting");
            return;
        }

        let queues = self.queues().await;
        info!(
            queues = ?queues,
            poll_interval_ms = self.config.poll_interval_ms,
            max_concurrent = self.config.max_concurrent_jobs,
            "Job worker started"
        );

        let _ = self.event_tx.send(WorkerEvent::WorkerStarted);

        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        let notify = self.db.jobs.notifier();
        let permits = Arc::new(Semaphore::new(self.config.max_concurrent_jobs.max(1)));
        let mut tasks = JoinSet::new();
        let mut turn = 0usize;

        loop {
            while let Some(result) = tasks.try_join_next() {
                if let Err(e) = result {
                    error!(error = ?e, "Job task panicked");
                }
            }

            let permit = tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Job worker received shutdown signal");
                    break;
                }
                permit = permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            // Register interest before claiming so an enqueue racing with an
            // empty claim still wakes the idle wait below.
            let notified = notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.claim_next(&queues, &mut turn).await {
                Some(job) => {
                    let worker = self.clone_refs();
                    tasks.spawn(async move {
                        let _permit = permit;
                        worker.execute_job(job).await;
                    });
                }
                None => {
                    drop(permit);
                    tokio::select! {
                        _ = shutdown_rx.recv() => {
                            info!("Job worker received shutdown signal");
                            break;
                        }
                        _ = &mut notified => {}
                        _ = sleep(poll_interval) => {}
                    }
                }
            }
        }

        if !tasks.is_empty() {
            info!(in_flight = tasks.len(), "Waiting for in-flight jobs");
        }
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!(error = ?e, "Job task panicked");
            }
        }

        let _ = self.event_tx.send(WorkerEvent::WorkerStopped);
        info!("Job worker stopped");
    }

    async fn queues(&self) -> Vec<String> {
        let handlers = self.handlers.read().await;
        handlers
            .keys()
            .map(|(queue, _)| queue.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Claim one job, starting from the queue after the last one served so
    /// no queue starves another.
    async fn claim_next(&self, queues: &[String], turn: &mut usize) -> Option<Job> {
        for offset in 0..queues.len() {
            let index = (*turn + offset) % queues.len();
            let queue = &queues[index];
            match self.db.jobs.claim_next(queue).await {
                Ok(Some(job)) => {
                    *turn = index + 1;
                    return Some(job);
                }
                Ok(None) => {}
                Err(e) => error!(error = ?e, queue = %queue, "Failed to claim job"),
            }
        }
        None
    }

    fn clone_refs(&self) -> JobWorkerRef {
        JobWorkerRef {
            db: self.db.clone(),
            handlers: self.handlers.clone(),
            retry_policies: self.retry_policies.clone(),
            event_tx: self.event_tx.clone(),
            job_timeout: Duration::from_secs(self.config.job_timeout_secs),
        }
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_tx.subscribe()
    }
}

/// Lightweight reference bundle for executing a single job in a spawned task.
struct JobWorkerRef {
    db: Database,
    handlers: Arc<RwLock<HandlerMap>>,
    retry_policies: Arc<HashMap<String, RetryPolicy>>,
    event_tx: broadcast::Sender<WorkerEvent>,
    job_timeout: Duration,
}

impl JobWorkerRef {
    fn policy(&self, queue: &str) -> RetryPolicy {
        self.retry_policies
            .get(queue)
            .copied()
            .unwrap_or_else(|| RetryPolicy::for_queue(queue))
    }

    /// Execute a single claimed job.
    async fn execute_job(self, job: Job) {
        let start = Instant::now();
        let job_id = job.id;
        let queue = job.queue.clone();
        let kind = job.kind.clone();
        let attempt = job.attempts;
        let max_attempts = job.max_attempts;

        info!(job_id = %job_id, queue = %queue, kind = %kind, attempt, "Processing job");

        let _ = self.event_tx.send(WorkerEvent::JobStarted {
            job_id,
            queue: queue.clone(),
            kind: kind.clone(),
        });

        let handler = {
            let handlers = self.handlers.read().await;
            handlers.get(&(queue.clone(), kind.clone())).cloned()
        };

        let result = match handler {
            Some(handler) => {
                match tokio::time::timeout(self.job_timeout, handler.execute(JobContext::new(job)))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => {
                        warn!(
                            job_id = %job_id,
                            queue = %queue,
                            "Job exceeded timeout of {}s",
                            self.job_timeout.as_secs()
                        );
                        JobResult::Retry(format!(
                            "Job exceeded timeout of {}s",
                            self.job_timeout.as_secs()
                        ))
                    }
                }
            }
            None => {
                warn!(queue = %queue, kind = %kind, "No handler registered for job kind");
                JobResult::Failed(format!("No handler for job kind: {}/{}", queue, kind))
            }
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        match result {
            JobResult::Success(_) => {
                if let Err(e) = self.db.jobs.complete(job_id).await {
                    error!(error = ?e, job_id = %job_id, "Failed to mark job as completed");
                    return;
                }
                info!(job_id = %job_id, queue = %queue, kind = %kind, duration_ms, "Job completed");
                let _ = self
                    .event_tx
                    .send(WorkerEvent::JobCompleted { job_id, queue, kind });
            }
            JobResult::Failed(error) => {
                self.record_failure(job_id, queue, kind, attempt, error, None, duration_ms)
                    .await;
            }
            JobResult::Retry(error) => {
                let retry_at = self
                    .policy(&queue)
                    .next_run(attempt, max_attempts, Utc::now());
                self.record_failure(job_id, queue, kind, attempt, error, retry_at, duration_ms)
                    .await;
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn record_failure(
        &self,
        job_id: Uuid,
        queue: String,
        kind: String,
        attempt: i32,
        error: String,
        retry_at: Option<DateTime<Utc>>,
        duration_ms: u64,
    ) {
        let status = match self.db.jobs.fail(job_id, &error, retry_at).await {
            Ok(status) => status,
            Err(e) => {
                error!(error = ?e, job_id = %job_id, "Failed to record job failure");
                return;
            }
        };

        match (status, retry_at) {
            (JobStatus::Pending, Some(run_after)) => {
                warn!(
                    job_id = %job_id,
                    queue = %queue,
                    kind = %kind,
                    %error,
                    %run_after,
                    duration_ms,
                    "Job failed, retry scheduled"
                );
                let _ = self.event_tx.send(WorkerEvent::JobRetrying {
                    job_id,
                    queue,
                    kind,
                    attempt,
                    error,
                    run_after,
                });
            }
            _ => {
                warn!(
                    job_id = %job_id,
                    queue = %queue,
                    kind = %kind,
                    %error,
                    duration_ms,
                    "Job failed"
                );
                let _ = self.event_tx.send(WorkerEvent::JobFailed {
                    job_id,
                    queue,
                    kind,
                    error,
                });
            }
        }
    }
}

/// Builder for creating a job worker with handlers.
pub struct WorkerBuilder {
    db: Database,
    config: WorkerConfig,
    handlers: Vec<Box<dyn JobHandler>>,
    retry_policies: HashMap<String, RetryPolicy>,
}

impl WorkerBuilder {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            config: WorkerConfig::default(),
            handlers: Vec::new(),
            retry_policies: HashMap::new(),
        }
    }

    pub fn with_config(mut self, config: WorkerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_handler<H: JobHandler + 'static>(mut self, handler: H) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Override the retry policy of a queue.
    pub fn with_retry_policy(mut self, queue: impl Into<String>, policy: RetryPolicy) -> Self {
        self.retry_policies.insert(queue.into(), policy);
        self
    }

    /// Build and return the worker.
    pub async fn build(self) -> JobWorker {
        let mut worker = JobWorker::new(self.db, self.config);
        worker.retry_policies = Arc::new(self.retry_policies);

        {
            let mut handlers = worker.handlers.write().await;
            for handler in self.handlers {
                let key = (handler.queue().to_string(), handler.kind().to_string());
                handlers.insert(key, Arc::from(handler));
            }
        }

        worker
    }
}
