//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use frontdesk_core::Error;

/// Error returned by every handler; wraps the core error taxonomy.
#[derive(Debug)]
pub struct ApiError(pub Error);

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.0.status_code();
        let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(
                subsystem = "api",
                status = code,
                error = %self.0,
                "Request failed"
            );
        }

        let body = Json(json!({
            "error": self.0.message(),
            "status": code,
            "type": self.0.type_name(),
        }));
        (status, body).into_response()
    }
}
