//! Webhook client delivering buffered expression runs.
//!
//! Expression runs are posted to `{proxy_url}/emotions` on a fixed
//! interval. Only the HTTP status of the response is checked.

use crate::config::ParticipantIdentity;
use crate::core::events::ExpressionEvent;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Webhook configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Base URL of the webhook proxy
    pub proxy_url: String,
    /// Bearer token (usually the meeting JWT)
    #[serde(default)]
    pub token: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

impl WebhookConfig {
    pub fn new(proxy_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            proxy_url: proxy_url.into(),
            token,
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Get the expressions endpoint URL.
    pub fn emotions_url(&self) -> String {
        format!("{}/emotions", self.proxy_url.trim_end_matches('/'))
    }
}

/// Webhook client error types.
#[derive(Debug)]
pub enum WebhookError {
    /// Configuration error
    Config(String),
    /// Network/HTTP error
    Network(String),
    /// Server returned an error response
    Server { status: u16, message: String },
}

impl std::fmt::Display for WebhookError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WebhookError::Config(msg) => write!(f, "Webhook config error: {msg}"),
            WebhookError::Network(msg) => write!(f, "Webhook network error: {msg}"),
            WebhookError::Server { status, message } => {
                write!(f, "Webhook server error ({status}): {message}")
            }
        }
    }
}

impl std::error::Error for WebhookError {}

/// Body posted to the webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub meeting_fqn: String,
    pub session_id: String,
    /// Submission time, milliseconds since the epoch
    pub submitted: i64,
    pub emotions: Vec<ExpressionEvent>,
    pub participant_id: String,
    pub participant_name: String,
}

impl WebhookPayload {
    pub fn new(
        identity: &ParticipantIdentity,
        session_id: &str,
        emotions: Vec<ExpressionEvent>,
    ) -> Self {
        Self {
            meeting_fqn: identity.meeting_fqn.clone(),
            session_id: session_id.to_string(),
            submitted: chrono::Utc::now().timestamp_millis(),
            emotions,
            participant_id: identity.participant_id.clone(),
            participant_name: identity.participant_name.clone(),
        }
    }
}

/// HTTP client for the expressions webhook.
pub struct WebhookClient {
    config: WebhookConfig,
    client: reqwest::Client,
}

impl WebhookClient {
    /// Create a new webhook client.
    pub fn new(config: WebhookConfig) -> Result<Self, WebhookError> {
        if config.proxy_url.trim().is_empty() {
            return Err(WebhookError::Config("proxy URL is empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| WebhookError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &WebhookConfig {
        &self.config
    }

    /// Post the payload. Any 2xx status counts as delivered.
    pub async fn send_expressions(&self, payload: &WebhookPayload) -> Result<(), WebhookError> {
        let mut request = self
            .client
            .post(self.config.emotions_url())
            .header("Content-Type", "application/json");

        if let Some(ref token) = self.config.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = request
            .json(payload)
            .send()
            .await
            .map_err(|e| WebhookError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(WebhookError::Server {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }
}
