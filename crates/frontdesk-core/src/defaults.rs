//! Centralized default constants for frontdesk.
//!
//! Single source of truth for shared default values. Crates reference these
//! instead of defining their own magic numbers.

// =============================================================================
// PAGINATION
// =============================================================================

/// Default page size when `limit` is not supplied.
pub const PAGE_LIMIT: i64 = 25;

/// Largest page a caller may request.
pub const PAGE_LIMIT_MAX: i64 = 100;

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 3000;

/// Deployment environment name when `ENVIRONMENT` is unset.
pub const ENVIRONMENT: &str = "development";

// =============================================================================
// EVENTS
// =============================================================================

/// Broadcast buffer capacity for the event bus.
pub const EVENT_BUS_CAPACITY: usize = 256;

/// Interval between SSE keep-alive comments, in seconds.
pub const SSE_KEEPALIVE_SECS: u64 = 15;

// =============================================================================
// JOB QUEUE
// =============================================================================

/// Queue carrying outbound message deliveries.
pub const MESSAGE_QUEUE: &str = "messages";

/// Queue carrying inbound provider webhook events.
pub const WEBHOOK_QUEUE: &str = "webhooks";

/// Job kind for message delivery.
pub const JOB_KIND_DELIVER: &str = "deliver";

/// Job kind for webhook processing.
pub const JOB_KIND_PROCESS: &str = "process";

/// Worker pool size per queue.
pub const JOB_MAX_CONCURRENT: usize = 30;

/// Polling interval when a queue is empty (milliseconds).
pub const JOB_POLL_INTERVAL_MS: u64 = 1_000;

/// Upper bound on a single job execution.
pub const JOB_TIMEOUT_SECS: u64 = 60;

/// Attempts for delivery jobs before the job is left failed.
pub const DELIVERY_MAX_ATTEMPTS: i32 = 3;

/// Base backoff for delivery retries; doubles per attempt.
pub const DELIVERY_BACKOFF_SECS: i64 = 5;

/// Webhook jobs run once; failures stay as dead-letter rows.
pub const WEBHOOK_MAX_ATTEMPTS: i32 = 1;

// =============================================================================
// MESSAGING PROVIDER
// =============================================================================

/// Sunshine Conversations API base URL.
pub const SUNSHINE_BASE_URL: &str = "https://api.smooch.io";

/// Outbound provider request timeout.
pub const SUNSHINE_TIMEOUT_SECS: u64 = 30;

/// Error recorded when a failure webhook carries no reason.
pub const DELIVERY_FAILURE_DEFAULT: &str = "Message could not be delivered to the customer";

/// Name prefix of the webhook integration owned by this deployment.
pub const INTEGRATION_NAME_PREFIX: &str = "frontdesk";

// =============================================================================
// SETTINGS KEYS
// =============================================================================

/// Settings key holding the inbound webhook secret.
pub const SETTING_WEBHOOK_SECRET: &str = "webhook_secret";

/// Settings key holding the provider integration id.
pub const SETTING_INTEGRATION_ID: &str = "webhook_integration_id";
