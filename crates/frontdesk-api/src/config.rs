//! Server configuration.

use frontdesk_core::defaults;

/// Configuration for the HTTP server and its request-time collaborators.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    /// Deployment environment (`development`, `staging`, `production`, ...).
    pub environment: String,
    /// Host name of this deployment; part of the integration name.
    pub hostname: String,
    /// Externally reachable base URL, used as the webhook target.
    pub public_url: Option<String>,
    /// Shared secret of the SSO proxy. Staff authentication is disabled
    /// without it.
    pub staff_auth_secret: Option<String>,
    /// Origins allowed by CORS; empty allows none.
    pub allowed_origins: Vec<String>,
    pub event_bus_capacity: usize,
    pub sse_keepalive_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: defaults::SERVER_PORT,
            environment: defaults::ENVIRONMENT.to_string(),
            hostname: "localhost".to_string(),
            public_url: None,
            staff_auth_secret: None,
            allowed_origins: Vec::new(),
            event_bus_capacity: defaults::EVENT_BUS_CAPACITY,
            sse_keepalive_secs: defaults::SSE_KEEPALIVE_SECS,
        }
    }
}

impl ApiConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_staff_auth_secret(mut self, secret: impl Into<String>) -> Self {
        self.staff_auth_secret = Some(secret.into());
        self
    }

    pub fn with_public_url(mut self, url: impl Into<String>) -> Self {
        self.public_url = Some(url.into().trim_end_matches('/').to_string());
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    /// Create from environment variables.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `HOST` | `0.0.0.0` |
    /// | `PORT` | `3000` |
    /// | `ENVIRONMENT` | `development` |
    /// | `HOSTNAME` | `localhost` |
    /// | `PUBLIC_URL` | unset |
    /// | `STAFF_AUTH_SECRET` | unset (auth disabled) |
    /// | `ALLOWED_ORIGINS` | unset (comma list) |
    /// | `EVENT_BUS_CAPACITY` | `256` |
    /// | `SSE_KEEPALIVE_SECS` | `15` |
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(host) = var("HOST") {
            config.host = host;
        }
        if let Some(port) = var("PORT").and_then(|v| v.parse().ok()) {
            config.port = port;
        }
        if let Some(environment) = var("ENVIRONMENT") {
            config.environment = environment;
        }
        if let Some(hostname) = var("HOSTNAME") {
            config.hostname = hostname;
        }
        if let Some(url) = var("PUBLIC_URL") {
            config = config.with_public_url(url);
        }
        config.staff_auth_secret = var("STAFF_AUTH_SECRET");
        if let Some(origins) = var("ALLOWED_ORIGINS") {
            config.allowed_origins = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
        if let Some(capacity) = var("EVENT_BUS_CAPACITY").and_then(|v| v.parse().ok()) {
            config.event_bus_capacity = capacity;
        }
        if let Some(secs) = var("SSE_KEEPALIVE_SECS").and_then(|v| v.parse().ok()) {
            config.sse_keepalive_secs = secs;
        }
        config
    }

    /// Name of the provider integration owned by this deployment,
    /// `frontdesk-<environment>-<hostname>`.
    pub fn integration_name(&self) -> String {
        format!(
            "{}-{}-{}",
            defaults::INTEGRATION_NAME_PREFIX,
            self.environment,
            self.hostname
        )
    }

    /// Where the provider should post webhooks.
    pub fn webhook_target(&self) -> Option<String> {
        self.public_url
            .as_ref()
            .map(|base| format!("{base}/webhooks/trigger"))
    }
}
