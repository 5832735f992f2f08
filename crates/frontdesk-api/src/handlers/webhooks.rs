//! Provider webhook ingestion and integration management.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde_json::{json, Value as JsonValue};
use tracing::info;

use frontdesk_core::{defaults, Error, Integration, NewIntegration, WebhookBatch};
use frontdesk_jobs::enqueue_webhook;

use crate::auth::RequireAdmin;
use crate::error::ApiResult;
use crate::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Check `x-api-key` against the secret stored at registration.
async fn authenticate_webhook(state: &AppState, headers: &HeaderMap) -> ApiResult<()> {
    let expected = state
        .db
        .settings
        .get(defaults::SETTING_WEBHOOK_SECRET)
        .await?
        .ok_or_else(|| Error::Unauthorized("Webhook is not connected".to_string()))?;
    let provided = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Error::Unauthorized("Missing webhook key".to_string()))?;
    if !constant_time_eq(provided, &expected) {
        return Err(Error::Unauthorized("Invalid webhook key".to_string()).into());
    }
    Ok(())
}

/// `POST /webhooks/trigger`
///
/// Every event of the batch is queued on its own; processing happens in the
/// worker, so handler failures never reach the provider.
pub async fn trigger(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<JsonValue>> {
    authenticate_webhook(&state, &headers).await?;

    let batch: WebhookBatch = serde_json::from_slice(&body)
        .map_err(|e| Error::Unprocessable(format!("Invalid webhook body: {e}")))?;
    for event in &batch.events {
        enqueue_webhook(state.db.jobs.as_ref(), event).await?;
    }
    info!(
        subsystem = "api",
        component = "webhooks",
        app_id = %batch.app.id,
        webhook_id = %batch.webhook.id,
        events = batch.events.len(),
        "Webhook batch queued"
    );
    Ok(Json(json!({ "ok": true })))
}

/// `HEAD /webhooks/trigger`
pub async fn trigger_head() -> StatusCode {
    StatusCode::OK
}

/// `POST /webhooks/connect`
///
/// Replaces this deployment's integration with a fresh one and stores the
/// new webhook secret. Integrations of other deployments are left alone.
pub async fn connect(
    State(state): State<AppState>,
    RequireAdmin(staff): RequireAdmin,
) -> ApiResult<Json<JsonValue>> {
    let provider = state.provider()?;
    let target = state
        .config
        .webhook_target()
        .ok_or_else(|| Error::Disabled("PUBLIC_URL is not configured".to_string()))?;
    let name = state.config.integration_name();
    let app_id = provider.app_id();

    for existing in provider.list_integrations(app_id).await? {
        if existing.display_name.as_deref() == Some(name.as_str()) {
            provider.delete_integration(app_id, &existing.id).await?;
            info!(
                subsystem = "api",
                component = "webhooks",
                integration_id = %existing.id,
                "Previous integration deleted"
            );
        }
    }

    let created = provider
        .create_integration(app_id, &NewIntegration::custom_webhook(&name, &target))
        .await?;
    let secret = created.webhook_secret().ok_or_else(|| {
        Error::Provider("Integration was created without a webhook secret".to_string())
    })?;
    state
        .db
        .settings
        .set(defaults::SETTING_WEBHOOK_SECRET, secret)
        .await?;
    state
        .db
        .settings
        .set(defaults::SETTING_INTEGRATION_ID, &created.id)
        .await?;

    info!(
        subsystem = "api",
        component = "webhooks",
        integration_id = %created.id,
        staff_id = %staff.id,
        target = %target,
        "Webhook integration connected"
    );
    Ok(Json(json!({
        "integrationId": created.id,
        "displayName": name,
        "target": target,
    })))
}

/// `GET /webhooks/integrations`
pub async fn list_integrations(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> ApiResult<Json<Vec<Integration>>> {
    let provider = state.provider()?;
    Ok(Json(provider.list_integrations(provider.app_id()).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("abc123", "abc123"));
        assert!(!constant_time_eq("abc123", "abc124"));
        assert!(!constant_time_eq("abc", "abcd"));
        assert!(!constant_time_eq("", "a"));
    }
}
