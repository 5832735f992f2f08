//! Response envelopes of the Sunshine Conversations v2 API.

use serde::Deserialize;

use frontdesk_core::{Integration, PostedMessage};

/// `POST .../messages` responds with the stored messages.
#[derive(Debug, Deserialize)]
pub struct MessagesResponse {
    pub messages: Vec<PostedMessage>,
}

#[derive(Debug, Deserialize)]
pub struct IntegrationsResponse {
    #[serde(default)]
    pub integrations: Vec<Integration>,
}

#[derive(Debug, Deserialize)]
pub struct IntegrationResponse {
    pub integration: Integration,
}

/// Error body: `{"errors":[{"code":"...","title":"..."}]}`.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl ErrorResponse {
    /// First human-readable error, falling back to the code.
    pub fn summary(&self) -> Option<String> {
        self.errors
            .iter()
            .find_map(|e| e.title.clone().or_else(|| e.code.clone()))
    }
}
