//! Error types for frontdesk.

use thiserror::Error;

/// Result type alias using frontdesk's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for frontdesk operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Missing or invalid credential
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not entitled. Also returned when the target is not
    /// visible to the caller, so existence is never leaked.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource absent at a layer where existence may be revealed
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed input or invariant violation
    #[error("Unprocessable: {0}")]
    Unprocessable(String),

    /// Feature not configured
    #[error("Disabled: {0}")]
    Disabled(String),

    /// Messaging provider call failed
    #[error("Provider error: {0}")]
    Provider(String),

    /// Job queue error
    #[error("Job error: {0}")]
    Job(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// HTTP status code this error surfaces as.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Unauthorized(_) => 401,
            Error::Forbidden(_) => 403,
            Error::NotFound(_) => 404,
            Error::Unprocessable(_) => 422,
            Error::Disabled(_) => 503,
            Error::Provider(_) => 502,
            Error::Database(_)
            | Error::Job(_)
            | Error::Serialization(_)
            | Error::Config(_)
            | Error::Internal(_) => 500,
        }
    }

    /// Stable error type name used in serialized error bodies.
    pub fn type_name(&self) -> &'static str {
        match self {
            Error::Unauthorized(_) => "UnauthorizedError",
            Error::Forbidden(_) => "ForbiddenError",
            Error::NotFound(_) => "NotFoundError",
            Error::Unprocessable(_) => "UnprocessableError",
            Error::Disabled(_) => "DisabledError",
            Error::Provider(_) => "ProviderError",
            Error::Database(_)
            | Error::Job(_)
            | Error::Serialization(_)
            | Error::Config(_)
            | Error::Internal(_) => "InternalError",
        }
    }

    /// Message without the variant prefix, suitable for API bodies.
    pub fn message(&self) -> String {
        match self {
            Error::Database(e) => e.to_string(),
            Error::Unauthorized(m)
            | Error::Forbidden(m)
            | Error::NotFound(m)
            | Error::Unprocessable(m)
            | Error::Disabled(m)
            | Error::Provider(m)
            | Error::Job(m)
            | Error::Serialization(m)
            | Error::Config(m)
            | Error::Internal(m) => m.clone(),
        }
    }

    /// Shorthand for the uniform "not visible or not allowed" error.
    pub fn forbidden() -> Self {
        Error::Forbidden("You are not allowed to perform this action".to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Provider(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_forbidden() {
        let err = Error::Forbidden("insufficient permissions".to_string());
        assert_eq!(err.to_string(), "Forbidden: insufficient permissions");
    }

    #[test]
    fn test_error_display_unprocessable() {
        let err = Error::Unprocessable("empty conversation".to_string());
        assert_eq!(err.to_string(), "Unprocessable: empty conversation");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::Unauthorized(String::new()).status_code(), 401);
        assert_eq!(Error::forbidden().status_code(), 403);
        assert_eq!(Error::NotFound(String::new()).status_code(), 404);
        assert_eq!(Error::Unprocessable(String::new()).status_code(), 422);
        assert_eq!(Error::Disabled(String::new()).status_code(), 503);
        assert_eq!(Error::Provider(String::new()).status_code(), 502);
        assert_eq!(Error::Internal(String::new()).status_code(), 500);
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Error::forbidden().type_name(), "ForbiddenError");
        assert_eq!(
            Error::Unprocessable(String::new()).type_name(),
            "UnprocessableError"
        );
        assert_eq!(Error::Job(String::new()).type_name(), "InternalError");
    }

    #[test]
    fn test_message_strips_prefix() {
        let err = Error::NotFound("message abc".to_string());
        assert_eq!(err.message(), "message abc");
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
