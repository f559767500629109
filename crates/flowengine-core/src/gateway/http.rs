//! reqwest-backed gateway.
//!
//! One shared `Client` per gateway, built with the configured timeout.
//! Every call is a single attempt; there is no retry.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{Gateway, CHAT_COMPLETIONS_PATH, DEFAULT_BASE_URL, MODELS_PATH};
use crate::config::GatewayConfig;
use crate::credential::Credential;
use crate::error::NodeError;
use crate::executor::ChatRequest;

/// Gateway reached over HTTP.
pub struct HttpGateway {
    client: Client,
    base_url: String,
}

impl HttpGateway {
    /// Create a gateway for `base_url` (trailing slashes are trimmed) with a
    /// per-request timeout.
    pub fn new(base_url: Option<&str>, timeout: Duration) -> Result<Self, NodeError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(base_url, client))
    }

    /// Create a gateway that reuses an existing client.
    pub fn with_client(base_url: Option<&str>, client: Client) -> Self {
        let base_url = base_url
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();

        debug!(base_url = %base_url, "Initialized FlowEngine gateway");

        Self { client, base_url }
    }

    pub fn from_config(config: &GatewayConfig) -> Result<Self, NodeError> {
        Self::new(
            Some(config.base_url.as_str()),
            Duration::from_secs(config.timeout_seconds),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send the request and decode the body.
    ///
    /// Non-2xx statuses become [`NodeError::Transport`]. A success body that is
    /// not JSON is returned as a JSON string so callers see "no expected
    /// fields" rather than a transport failure.
    async fn send(&self, request: RequestBuilder) -> Result<Value, NodeError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.message())
                .unwrap_or(body);
            warn!(status = %status, "FlowEngine gateway returned an error status");
            return Err(NodeError::Transport(format!(
                "LLM API error ({status}): {message}"
            )));
        }

        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorResponse {
    Single(ErrorBody),
    Multiple(Vec<ErrorBody>),
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

impl ErrorResponse {
    fn message(self) -> String {
        match self {
            Self::Single(b) => b.error.message,
            Self::Multiple(v) => v
                .into_iter()
                .next()
                .map(|b| b.error.message)
                .unwrap_or_else(|| "Unknown error".into()),
        }
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn list_models(&self, credential: &Credential) -> Result<Value, NodeError> {
        let url = self.url(MODELS_PATH);
        debug!(url = %url, "Fetching model listing");

        let request = credential.authorize(self.client.get(&url))?;
        self.send(request).await
    }

    async fn chat_completion(
        &self,
        credential: &Credential,
        request: &ChatRequest,
    ) -> Result<Value, NodeError> {
        let url = self.url(CHAT_COMPLETIONS_PATH);
        debug!(
            model = %request.model,
            url = %url,
            msg_count = request.messages.len(),
            "Sending chat completion request"
        );

        let builder = credential
            .authorize(self.client.post(&url))?
            .header(CONTENT_TYPE, "application/json")
            .json(request);
        self.send(builder).await
    }
}
