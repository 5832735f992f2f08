//! frontdesk-api - HTTP API server for frontdesk

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use frontdesk_api::{app, ApiConfig, AppState};
use frontdesk_core::{EventBus, ProviderClient};
use frontdesk_db::Database;
use frontdesk_jobs::{
    DeliveryJobHandler, WebhookDispatcher, WebhookJobHandler, WorkerBuilder, WorkerConfig,
    WorkerEvent,
};
use frontdesk_sunshine::SunshineClient;

/// Log job outcomes from the worker's event channel.
async fn log_worker_events(mut rx: broadcast::Receiver<WorkerEvent>) {
    loop {
        match rx.recv().await {
            Ok(WorkerEvent::JobCompleted { job_id, queue, kind }) => {
                info!(subsystem = "jobs", job_id = %job_id, queue = %queue, kind = %kind, "Job completed");
            }
            Ok(WorkerEvent::JobRetrying {
                job_id,
                queue,
                attempt,
                error,
                ..
            }) => {
                warn!(subsystem = "jobs", job_id = %job_id, queue = %queue, attempt, error = %error, "Job will retry");
            }
            Ok(WorkerEvent::JobFailed {
                job_id,
                queue,
                kind,
                error,
            }) => {
                error!(subsystem = "jobs", job_id = %job_id, queue = %queue, kind = %kind, error = %error, "Job failed");
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(subsystem = "jobs", missed, "Worker event log lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with configurable output
    //
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
    //   RUST_LOG    - standard env filter (default: "frontdesk_api=debug,tower_http=debug")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "frontdesk_api=debug,frontdesk_jobs=info,frontdesk_db=info,tower_http=debug".into()
    });

    let registry = tracing_subscriber::registry().with(env_filter);

    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("frontdesk-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    let config = ApiConfig::from_env();
    let events = Arc::new(EventBus::new(config.event_bus_capacity));

    // Storage: Postgres when configured, otherwise an in-memory store
    let db = match std::env::var("DATABASE_URL").ok().filter(|u| !u.is_empty()) {
        Some(url) => {
            let db = Database::connect(&url, events.clone()).await?;
            db.migrate().await?;
            db
        }
        None => {
            warn!("DATABASE_URL not set, using the in-memory store");
            Database::in_memory(events.clone())
        }
    };
    info!(storage = db.backend_name(), "Storage ready");

    let provider: Option<Arc<dyn ProviderClient>> = match SunshineClient::from_env()? {
        Some(client) => {
            info!(app_id = %client.config().app_id, "Sunshine client configured");
            Some(Arc::new(client))
        }
        None => {
            warn!("Sunshine credentials not set, outbound delivery disabled");
            None
        }
    };

    if config.staff_auth_secret.is_none() {
        warn!("STAFF_AUTH_SECRET not set, staff routes will answer 503");
    }

    // Job worker: webhook processing always, delivery when a provider exists
    let worker_config = WorkerConfig::from_env();
    let mut builder = WorkerBuilder::new(db.clone())
        .with_config(worker_config)
        .with_handler(WebhookJobHandler::new(Arc::new(WebhookDispatcher::new(
            db.clone(),
        ))));
    if let Some(provider) = &provider {
        builder = builder.with_handler(DeliveryJobHandler::new(db.clone(), provider.clone()));
    }
    let worker = builder.build().await;
    tokio::spawn(log_worker_events(worker.events()));
    let worker_handle = worker.start();
    info!("Job worker started");

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let state = AppState::new(db, provider, config);
    let router = app(state);

    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Waiting for in-flight jobs");
    worker_handle.shutdown_and_wait().await?;
    Ok(())
}
