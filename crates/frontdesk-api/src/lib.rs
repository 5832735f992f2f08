//! # frontdesk-api
//!
//! HTTP surface of frontdesk:
//! - Staff query/mutation routes under `/api/v1`, scoped by the caller's
//!   visibility
//! - Live subscriptions over Server-Sent Events
//! - Provider webhook ingestion and integration management
//!
//! The binary in `main.rs` wires configuration, storage, the provider client
//! and the job worker around [`app`].

pub mod abilities;
pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod handlers;

use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use frontdesk_core::{Error, ProviderClient, Result, Staff};
use frontdesk_db::Database;

pub use abilities::Abilities;
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};

/// Largest accepted request body (provider batches included).
const BODY_LIMIT_BYTES: usize = 2 * 1024 * 1024;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    /// `None` when the provider is not configured.
    pub provider: Option<Arc<dyn ProviderClient>>,
    pub config: Arc<ApiConfig>,
}

impl AppState {
    pub fn new(db: Database, provider: Option<Arc<dyn ProviderClient>>, config: ApiConfig) -> Self {
        Self {
            db,
            provider,
            config: Arc::new(config),
        }
    }

    /// Operations scoped to `staff`.
    pub fn abilities(&self, staff: Staff) -> Abilities {
        Abilities::new(self.db.clone(), self.provider.clone(), staff)
    }

    /// Configured provider, or `Disabled`.
    pub fn provider(&self) -> Result<Arc<dyn ProviderClient>> {
        self.provider
            .clone()
            .ok_or_else(|| Error::Disabled("Messaging provider is not configured".to_string()))
    }
}

/// Generates time-ordered UUIDv7 request correlation ids.
#[derive(Clone, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

fn cors_layer(config: &ApiConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::HeaderName::from_static(auth::STAFF_ID_HEADER),
            header::HeaderName::from_static(auth::STAFF_NAME_HEADER),
            header::HeaderName::from_static(auth::STAFF_PERMISSIONS_HEADER),
            header::HeaderName::from_static(auth::STAFF_SIGNATURE_HEADER),
        ])
        .max_age(std::time::Duration::from_secs(3600))
}

/// Staff routes, relative to `/api/v1`.
fn api_routes() -> Router<AppState> {
    use handlers::{conversations, directory, messages};

    Router::new()
        .route("/me", get(handlers::current_staff))
        .route(
            "/conversations",
            get(conversations::list_conversations).post(conversations::create_conversation),
        )
        .route("/conversations/:id", get(conversations::get_conversation))
        .route("/conversations/:id/join", post(conversations::join_conversation))
        .route(
            "/conversations/:id/members",
            get(conversations::list_members).post(conversations::add_members),
        )
        .route("/conversations/:id/touch", post(conversations::touch_conversation))
        .route(
            "/conversations/:id/messages",
            get(messages::list_conversation_messages).post(messages::send_message),
        )
        .route(
            "/conversations/:id/tags",
            get(conversations::list_conversation_tags).post(conversations::tag_conversation),
        )
        .route(
            "/conversations/:id/tags/:tag_id",
            axum::routing::delete(conversations::untag_conversation),
        )
        .route(
            "/conversations/:id/read-receipts",
            get(conversations::list_read_receipts),
        )
        .route("/conversations/:id/read", post(conversations::mark_as_read))
        .route(
            "/conversations/:id/typing/start",
            post(conversations::start_typing),
        )
        .route("/conversations/:id/typing/stop", post(conversations::stop_typing))
        .route("/messages", get(messages::list_messages))
        .route(
            "/messages/:id",
            get(messages::get_message).delete(messages::delete_message),
        )
        .route("/customers", get(directory::list_customers))
        .route("/customers/:id", get(directory::get_customer))
        .route("/tags", get(directory::list_tags))
        .route("/subscriptions/messages", get(gateway::message_events))
        .route(
            "/subscriptions/read-receipts",
            get(gateway::read_receipt_events),
        )
}

/// Full application router with middleware.
pub fn app(state: AppState) -> Router {
    use handlers::webhooks;

    let cors = cors_layer(&state.config);
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", api_routes())
        .route(
            "/webhooks/trigger",
            post(webhooks::trigger).head(webhooks::trigger_head),
        )
        .route("/webhooks/connect", post(webhooks::connect))
        .route("/webhooks/integrations", get(webhooks::list_integrations))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
        .layer(CatchPanicLayer::new())
        .with_state(state)
}
