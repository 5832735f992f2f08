//! # frontdesk-jobs
//!
//! Background processing for frontdesk.
//!
//! This crate provides:
//! - A queue worker with bounded concurrency, enqueue wake-up and graceful
//!   shutdown
//! - Explicit per-queue retry policies (delivery retries with backoff,
//!   webhooks dead-letter after one attempt)
//! - Outbound delivery of staff messages driven by the delivery state machine
//! - The webhook dispatcher for inbound provider events
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use frontdesk_jobs::{DeliveryJobHandler, WebhookDispatcher, WebhookJobHandler, WorkerBuilder};
//!
//! let dispatcher = Arc::new(WebhookDispatcher::new(db.clone()));
//! let worker = WorkerBuilder::new(db.clone())
//!     .with_handler(DeliveryJobHandler::new(db.clone(), provider))
//!     .with_handler(WebhookJobHandler::new(dispatcher))
//!     .build()
//!     .await;
//!
//! let handle = worker.start();
//! // ...
//! handle.shutdown_and_wait().await?;
//! ```

pub mod delivery;
pub mod handler;
pub mod queue;
pub mod webhooks;
pub mod worker;

pub use delivery::{
    confirm_delivery, DeliveryConfirmation, DeliveryJobHandler, DeliveryOutcome, MessageDelivery,
};
pub use handler::{JobContext, JobHandler, JobResult};
pub use queue::{enqueue_delivery, enqueue_webhook, DeliverMessage, RetryPolicy};
pub use webhooks::{Dispatch, WebhookDispatcher, WebhookHandler, WebhookJobHandler};
pub use worker::{JobWorker, WorkerBuilder, WorkerConfig, WorkerEvent, WorkerHandle};
