//! Access to the FlowEngine gateway.
//!
//! Defines the `Gateway` trait: "perform this HTTP call and hand back parsed
//! JSON, or fail". The `http` module provides the reqwest implementation;
//! tests substitute an in-memory double.

pub mod http;

use async_trait::async_trait;
use serde_json::Value;

use crate::credential::Credential;
use crate::error::NodeError;
use crate::executor::ChatRequest;

/// Default gateway host.
pub const DEFAULT_BASE_URL: &str = "https://flowengine.cloud";

/// Model listing, also used for the credential connectivity test.
pub const MODELS_PATH: &str = "/api/v1/litellm/models";

/// OpenAI-style chat completions endpoint.
pub const CHAT_COMPLETIONS_PATH: &str = "/api/v1/litellm/v1/chat/completions";

/// The two calls the node makes against the gateway.
///
/// Implementations must attach the credential's bearer header and return
/// [`NodeError::Transport`] for network failures and non-2xx statuses.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// `GET /api/v1/litellm/models`.
    async fn list_models(&self, credential: &Credential) -> Result<Value, NodeError>;

    /// `POST /api/v1/litellm/v1/chat/completions`.
    async fn chat_completion(
        &self,
        credential: &Credential,
        request: &ChatRequest,
    ) -> Result<Value, NodeError>;
}
