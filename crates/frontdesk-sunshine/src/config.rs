//! Client configuration.

use frontdesk_core::defaults;

/// Configuration for the Sunshine Conversations client.
#[derive(Debug, Clone)]
pub struct SunshineConfig {
    /// API root, without the `/v2` prefix.
    pub base_url: String,
    /// App every call is scoped to.
    pub app_id: String,
    /// API key id, used as the basic-auth user name.
    pub key_id: String,
    /// API key secret, used as the basic-auth password.
    pub key_secret: String,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl SunshineConfig {
    pub fn new(
        app_id: impl Into<String>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
    ) -> Self {
        Self {
            base_url: defaults::SUNSHINE_BASE_URL.to_string(),
            app_id: app_id.into(),
            key_id: key_id.into(),
            key_secret: key_secret.into(),
            timeout_seconds: defaults::SUNSHINE_TIMEOUT_SECS,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout_seconds(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    /// Create from environment variables.
    ///
    /// Returns `None` unless `SUNSHINE_APP_ID`, `SUNSHINE_KEY_ID` and
    /// `SUNSHINE_KEY_SECRET` are all set and non-empty. `SUNSHINE_BASE_URL` and
    /// `SUNSHINE_TIMEOUT_SECS` are optional.
    pub fn from_env() -> Option<Self> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        let mut config = Self::new(
            var("SUNSHINE_APP_ID")?,
            var("SUNSHINE_KEY_ID")?,
            var("SUNSHINE_KEY_SECRET")?,
        );
        if let Some(base_url) = var("SUNSHINE_BASE_URL") {
            config = config.with_base_url(base_url);
        }
        if let Some(timeout) = var("SUNSHINE_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            config = config.with_timeout_seconds(timeout);
        }
        Some(config)
    }
}
