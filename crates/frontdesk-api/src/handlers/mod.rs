//! HTTP handlers.
//!
//! Staff-facing handlers are thin: they extract the authenticated staff
//! member, delegate to [`crate::abilities::Abilities`] and serialize the
//! result. Webhook handlers talk to the provider and the job queue directly.

pub mod conversations;
pub mod directory;
pub mod messages;
pub mod webhooks;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use frontdesk_core::PageRequest;

use crate::auth::AuthStaff;
use crate::AppState;

/// `limit` / `after` query parameters shared by every listing.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub after: Option<Uuid>,
}

impl From<PageQuery> for PageRequest {
    fn from(q: PageQuery) -> Self {
        PageRequest::new(q.limit, q.after)
    }
}

/// `GET /health`
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "storage": state.db.backend_name(),
        "provider": state.provider.is_some(),
    }))
}

/// `GET /api/v1/me`
pub async fn current_staff(AuthStaff(staff): AuthStaff) -> impl IntoResponse {
    Json(staff)
}
