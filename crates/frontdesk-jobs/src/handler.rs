//! Job handler contract.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use frontdesk_core::{Error, Job, Result};

/// Context provided to job handlers.
pub struct JobContext {
    /// The job being processed.
    pub job: Job,
}

impl JobContext {
    pub fn new(job: Job) -> Self {
        Self { job }
    }

    /// Attempt number of this run, starting at 1.
    pub fn attempt(&self) -> i32 {
        self.job.attempts
    }

    /// Whether a failure of this run would still be retried.
    pub fn has_attempts_left(&self) -> bool {
        self.job.attempts < self.job.max_attempts
    }

    /// Deserialize the payload into the handler's own type.
    pub fn parse_payload<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.job.payload.clone()).map_err(|e| {
            Error::Job(format!(
                "invalid payload for {}/{} job {}: {}",
                self.job.queue, self.job.kind, self.job.id, e
            ))
        })
    }
}

/// Result of job execution.
#[derive(Debug)]
pub enum JobResult {
    /// Job completed successfully with optional result data.
    Success(Option<JsonValue>),
    /// Job failed and must not run again.
    Failed(String),
    /// Job failed; it runs again if the queue's retry policy allows.
    Retry(String),
}

impl JobResult {
    /// Map a handler error: input problems are permanent, everything else
    /// may succeed on a later attempt.
    pub fn from_error(err: &Error) -> Self {
        match err {
            Error::Unprocessable(_) | Error::Serialization(_) | Error::Job(_) => {
                JobResult::Failed(err.to_string())
            }
            _ => JobResult::Retry(err.to_string()),
        }
    }
}

/// Trait for job handlers.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Queue this handler consumes.
    fn queue(&self) -> &'static str;

    /// Job kind within the queue.
    fn kind(&self) -> &'static str;

    /// Execute the job.
    async fn execute(&self, ctx: JobContext) -> JobResult;
}
