//! HTTP relay transport.

use crate::{OutgoingMessage, Transport, TransportError, TransportResult};
use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Relay transport configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Base URL; messages are POSTed to `{relay_url}/messages`.
    pub relay_url: String,
    /// Bearer token, if the relay requires one.
    pub auth_token: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            relay_url: "http://127.0.0.1:8025".to_string(),
            auth_token: None,
            timeout_secs: 30,
        }
    }
}

/// Request payload for one message.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageRequest<'a> {
    message_id: &'a str,
    from: &'a str,
    to: &'a [String],
    /// Raw message, base64.
    data: String,
}

/// Response from the relay server.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageResponse {
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Map a non-success HTTP status to a transport error.
fn classify_status(status: StatusCode, body: String) -> TransportError {
    let detail = format!("HTTP {}: {}", status, body);
    if status.is_client_error()
        && status != StatusCode::REQUEST_TIMEOUT
        && status != StatusCode::TOO_MANY_REQUESTS
    {
        TransportError::Rejected(detail)
    } else {
        TransportError::Transient(detail)
    }
}

/// Delivers messages by POSTing them to a relay.
pub struct RelayTransport {
    config: RelayConfig,
    client: Client,
}

impl RelayTransport {
    pub fn new(config: RelayConfig) -> TransportResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!("{}/messages", self.config.relay_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Transport for RelayTransport {
    fn name(&self) -> &str {
        "relay"
    }

    async fn deliver(&self, message: &OutgoingMessage) -> TransportResult<()> {
        message.validate()?;

        let url = self.endpoint();
        let request = SendMessageRequest {
            message_id: &message.id,
            from: &message.sender,
            to: &message.recipients,
            data: base64::engine::general_purpose::STANDARD.encode(&message.body),
        };

        debug!(url = %url, message_id = %message.id, "Posting message to relay");

        let mut builder = self.client.post(&url).json(&request);
        if let Some(token) = &self.config.auth_token {
            builder = builder.bearer_auth(token);
        }
        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let result: SendMessageResponse = response.json().await?;
        if result.success {
            Ok(())
        } else {
            Err(TransportError::Transient(
                result.error.unwrap_or_else(|| "Unknown error".to_string()),
            ))
        }
    }
}
