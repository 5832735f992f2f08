//! HTTP client for the Sunshine Conversations v2 REST API.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use frontdesk_core::{
    Activity, Error, Integration, NewIntegration, OutboundMessage, PostedMessage,
    ProviderClient, Result,
};

use crate::config::SunshineConfig;
use crate::types::{ErrorResponse, IntegrationResponse, IntegrationsResponse, MessagesResponse};

/// Sunshine Conversations client authenticating with an app-scoped API key.
pub struct SunshineClient {
    client: Client,
    config: SunshineConfig,
}

impl SunshineClient {
    /// Create a new client with the given configuration.
    pub fn new(config: SunshineConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Provider(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            subsystem = "provider",
            component = "sunshine",
            app_id = %config.app_id,
            base_url = %config.base_url,
            "Initializing Sunshine Conversations client"
        );

        Ok(Self { client, config })
    }

    /// Create from environment variables; `None` when credentials are unset.
    pub fn from_env() -> Result<Option<Self>> {
        SunshineConfig::from_env().map(Self::new).transpose()
    }

    pub fn config(&self) -> &SunshineConfig {
        &self.config
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/v2{}", self.config.base_url, path))
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
    }

    /// Send the request and turn non-2xx responses into provider errors that
    /// carry the API's own error title.
    async fn send(&self, op: &'static str, request: RequestBuilder) -> Result<Response> {
        let start = Instant::now();
        let response = request
            .send()
            .await
            .map_err(|e| Error::Provider(format!("Sunshine request failed: {}", e)))?;
        let status = response.status();
        debug!(
            subsystem = "provider",
            component = "sunshine",
            op,
            status = status.as_u16(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Sunshine call complete"
        );

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorResponse>(&body)
            .ok()
            .and_then(|e| e.summary())
            .unwrap_or(body);
        warn!(
            subsystem = "provider",
            component = "sunshine",
            op,
            status = status.as_u16(),
            error = %detail,
            "Sunshine call rejected"
        );
        Err(Error::Provider(format!(
            "Sunshine returned {}: {}",
            status, detail
        )))
    }

    async fn json<T: DeserializeOwned>(response: Response) -> Result<T> {
        response
            .json()
            .await
            .map_err(|e| Error::Provider(format!("Failed to parse Sunshine response: {}", e)))
    }
}

#[async_trait]
impl ProviderClient for SunshineClient {
    fn app_id(&self) -> &str {
        &self.config.app_id
    }

    async fn post_message(
        &self,
        app_id: &str,
        conversation_id: &str,
        message: &OutboundMessage,
    ) -> Result<PostedMessage> {
        let path = format!("/apps/{app_id}/conversations/{conversation_id}/messages");
        let response = self
            .send("post_message", self.request(Method::POST, &path).json(message))
            .await?;
        let body: MessagesResponse = Self::json(response).await?;
        body.messages
            .into_iter()
            .next()
            .ok_or_else(|| Error::Provider("Sunshine accepted the message but returned none".into()))
    }

    async fn post_activity(
        &self,
        app_id: &str,
        conversation_id: &str,
        activity: &Activity,
    ) -> Result<()> {
        let path = format!("/apps/{app_id}/conversations/{conversation_id}/activity");
        self.send("post_activity", self.request(Method::POST, &path).json(activity))
            .await?;
        Ok(())
    }

    async fn list_integrations(&self, app_id: &str) -> Result<Vec<Integration>> {
        let path = format!("/apps/{app_id}/integrations");
        let response = self
            .send("list_integrations", self.request(Method::GET, &path))
            .await?;
        let body: IntegrationsResponse = Self::json(response).await?;
        Ok(body.integrations)
    }

    async fn create_integration(
        &self,
        app_id: &str,
        integration: &NewIntegration,
    ) -> Result<Integration> {
        let path = format!("/apps/{app_id}/integrations");
        let response = self
            .send(
                "create_integration",
                self.request(Method::POST, &path).json(integration),
            )
            .await?;
        let body: IntegrationResponse = Self::json(response).await?;
        info!(
            subsystem = "provider",
            component = "sunshine",
            integration_id = %body.integration.id,
            "Integration created"
        );
        Ok(body.integration)
    }

    async fn delete_integration(&self, app_id: &str, integration_id: &str) -> Result<()> {
        let path = format!("/apps/{app_id}/integrations/{integration_id}");
        self.send("delete_integration", self.request(Method::DELETE, &path))
            .await?;
        info!(
            subsystem = "provider",
            component = "sunshine",
            integration_id,
            "Integration deleted"
        );
        Ok(())
    }
}
