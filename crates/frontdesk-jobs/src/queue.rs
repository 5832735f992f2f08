//! Queue names, retry policies and typed enqueue helpers.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use frontdesk_core::defaults;
use frontdesk_core::{Job, JobRepository, QueueJobRequest, Result, WebhookEvent};

/// How often and how fast a queue's failed jobs run again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first run.
    pub max_attempts: i32,
    /// Delay before the second attempt; doubles for each further attempt.
    pub backoff_base_secs: i64,
}

impl RetryPolicy {
    /// Single attempt; failed jobs stay behind as dead letters.
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff_base_secs: 0,
        }
    }

    /// Provider delivery: bounded attempts with exponential backoff.
    pub const fn delivery() -> Self {
        Self {
            max_attempts: defaults::DELIVERY_MAX_ATTEMPTS,
            backoff_base_secs: defaults::DELIVERY_BACKOFF_SECS,
        }
    }

    /// Inbound webhooks mutate state keyed by provider identity and are not
    /// retried.
    pub const fn webhook() -> Self {
        Self {
            max_attempts: defaults::WEBHOOK_MAX_ATTEMPTS,
            backoff_base_secs: 0,
        }
    }

    /// Policy of a named queue.
    pub fn for_queue(queue: &str) -> Self {
        match queue {
            defaults::MESSAGE_QUEUE => Self::delivery(),
            defaults::WEBHOOK_QUEUE => Self::webhook(),
            _ => Self::none(),
        }
    }

    pub fn with_backoff_base_secs(mut self, secs: i64) -> Self {
        self.backoff_base_secs = secs.max(0);
        self
    }

    /// Delay after the given failed attempt (1-based).
    pub fn backoff(&self, attempt: i32) -> Duration {
        let exponent = attempt.saturating_sub(1).clamp(0, 16) as u32;
        Duration::seconds(self.backoff_base_secs.saturating_mul(1i64 << exponent))
    }

    /// When a job that just failed its `attempt`-th run should run again;
    /// `None` once `max_attempts` runs are used up.
    pub fn next_run(
        &self,
        attempt: i32,
        max_attempts: i32,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        (attempt < max_attempts).then(|| now + self.backoff(attempt))
    }
}

/// Payload of a `messages/deliver` job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliverMessage {
    pub message_id: Uuid,
}

/// Queue delivery of a locally authored message to the provider.
pub async fn enqueue_delivery(jobs: &dyn JobRepository, message_id: Uuid) -> Result<Job> {
    let job = jobs
        .queue(QueueJobRequest {
            queue: defaults::MESSAGE_QUEUE.to_string(),
            kind: defaults::JOB_KIND_DELIVER.to_string(),
            key: Some(message_id.to_string()),
            payload: serde_json::to_value(DeliverMessage { message_id })?,
            max_attempts: RetryPolicy::delivery().max_attempts,
        })
        .await?;
    debug!(
        subsystem = "jobs",
        job_id = %job.id,
        message_id = %message_id,
        "Queued message delivery"
    );
    Ok(job)
}

/// Queue one inbound provider event for processing.
pub async fn enqueue_webhook(jobs: &dyn JobRepository, event: &WebhookEvent) -> Result<Job> {
    let job = jobs
        .queue(QueueJobRequest {
            queue: defaults::WEBHOOK_QUEUE.to_string(),
            kind: defaults::JOB_KIND_PROCESS.to_string(),
            key: Some(event.id.clone()),
            payload: serde_json::to_value(event)?,
            max_attempts: RetryPolicy::webhook().max_attempts,
        })
        .await?;
    debug!(
        subsystem = "jobs",
        job_id = %job.id,
        event_id = %event.id,
        event_type = %event.event_type,
        "Queued webhook event"
    );
    Ok(job)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_per_queue() {
        assert_eq!(RetryPolicy::for_queue("messages").max_attempts, 3);
        assert_eq!(RetryPolicy::for_queue("webhooks").max_attempts, 1);
        assert_eq!(RetryPolicy::for_queue("unknown"), RetryPolicy::none());
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::delivery();
        assert_eq!(policy.backoff(1), Duration::seconds(5));
        assert_eq!(policy.backoff(2), Duration::seconds(10));
        assert_eq!(policy.backoff(3), Duration::seconds(20));
    }

    #[test]
    fn test_next_run_stops_at_max_attempts() {
        let policy = RetryPolicy::delivery();
        let now = Utc::now();
        assert_eq!(policy.next_run(1, 3, now), Some(now + Duration::seconds(5)));
        assert_eq!(policy.next_run(2, 3, now), Some(now + Duration::seconds(10)));
        assert_eq!(policy.next_run(3, 3, now), None);
        assert_eq!(RetryPolicy::webhook().next_run(1, 1, now), None);
    }

    #[test]
    fn test_deliver_payload_shape() {
        let id = Uuid::nil();
        let value = serde_json::to_value(DeliverMessage { message_id: id }).unwrap();
        assert_eq!(value["messageId"], id.to_string());
    }
}
