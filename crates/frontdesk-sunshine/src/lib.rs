//! # frontdesk-sunshine
//!
//! [`ProviderClient`](frontdesk_core::ProviderClient) implementation for
//! Sunshine Conversations (v2 REST API, HTTP basic auth with an app key).
//!
//! ## Example
//!
//! ```rust,ignore
//! use frontdesk_sunshine::{SunshineClient, SunshineConfig};
//!
//! let client = SunshineClient::new(SunshineConfig::new("app", "key-id", "key-secret"))?;
//! let integrations = client.list_integrations(client.app_id()).await?;
//! ```

pub mod client;
pub mod config;
pub mod types;

pub use client::SunshineClient;
pub use config::SunshineConfig;
