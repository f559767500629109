//! Per-item chat completion execution.
//!
//! Every input item turns into exactly one request and exactly one output
//! record, in input order. Failures either become `success: false` records
//! (continue-on-failure) or abort the run with the failing item's index.

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::credential::Credential;
use crate::error::{ItemError, NodeError};
use crate::gateway::Gateway;

/// `maxTokens` value meaning "no limit"; never sent upstream.
pub const NO_TOKEN_LIMIT: i64 = -1;

// ── Item parameters ─────────────────────────────────────────────────

/// Generation options for one item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChatOptions {
    pub temperature: Option<f64>,
    pub max_tokens: Option<i64>,
    pub system_message: Option<String>,
}

/// Parameters of one input item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ItemParameters {
    /// Only used to filter the model list; never sent upstream.
    pub provider: Option<String>,
    pub model: String,
    pub message: String,
    pub options: ChatOptions,
}

impl ItemParameters {
    pub fn new(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }
}

// ── Request body ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: &str) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: &str) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// Body of `POST /chat/completions`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<i64>,
}

impl ChatRequest {
    /// Build the request body for one item.
    ///
    /// The system message is prepended only when non-empty; the user message
    /// is always last. `max_tokens` is dropped when it equals [`NO_TOKEN_LIMIT`].
    pub fn from_parameters(params: &ItemParameters) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = params.options.system_message.as_deref() {
            if !system.is_empty() {
                messages.push(ChatMessage::system(system));
            }
        }
        messages.push(ChatMessage::user(&params.message));

        Self {
            model: params.model.clone(),
            messages,
            temperature: params.options.temperature,
            max_tokens: params
                .options
                .max_tokens
                .filter(|&n| n != NO_TOKEN_LIMIT),
        }
    }
}

// ── Output records ──────────────────────────────────────────────────

/// Successful completion for one item.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    pub response: Value,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<Value>,
}

/// Result of one item, serialized as `{success: true, ...}` or
/// `{success: false, error}`.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Completion),
    Failure { error: String },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

impl Serialize for Outcome {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Tagged<'a, T: Serialize> {
            success: bool,
            #[serde(flatten)]
            body: &'a T,
        }

        #[derive(Serialize)]
        struct FailureBody<'a> {
            error: &'a str,
        }

        match self {
            Self::Success(completion) => Tagged {
                success: true,
                body: completion,
            }
            .serialize(serializer),
            Self::Failure { error } => Tagged {
                success: false,
                body: &FailureBody { error },
            }
            .serialize(serializer),
        }
    }
}

/// One output record, paired with the position of the input item.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputItem {
    pub json: Outcome,
    pub paired_item: usize,
}

// ── Response mapping ────────────────────────────────────────────────

/// Map a chat completion response to a [`Completion`].
///
/// `choices` must be a non-empty array whose first entry carries a
/// `message` object; anything else is [`NodeError::EmptyCompletion`].
pub fn parse_completion(model: &str, response: &Value) -> Result<Completion, NodeError> {
    let first = response
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .ok_or(NodeError::EmptyCompletion)?;

    let message = first
        .get("message")
        .filter(|m| m.is_object())
        .ok_or(NodeError::EmptyCompletion)?;

    Ok(Completion {
        response: message.get("content").cloned().unwrap_or(Value::Null),
        model: model.to_string(),
        usage: response.get("usage").cloned(),
        finish_reason: first.get("finish_reason").cloned(),
    })
}

// ── Execution ───────────────────────────────────────────────────────

/// How a run treats failures and how many items may be in flight.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionSettings {
    pub continue_on_fail: bool,
    /// Items sent concurrently. Results are always emitted in input order.
    pub concurrency: usize,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            continue_on_fail: false,
            concurrency: 1,
        }
    }
}

/// Run one item: a single linear attempt with no retry.
pub async fn execute_item(
    gateway: &dyn Gateway,
    credential: &Credential,
    params: &ItemParameters,
) -> Result<Completion, NodeError> {
    credential.api_key()?;

    let request = ChatRequest::from_parameters(params);
    let response = gateway.chat_completion(credential, &request).await?;
    let completion = parse_completion(&params.model, &response)?;

    debug!(
        model = %params.model,
        finish_reason = ?completion.finish_reason,
        "Received chat completion"
    );
    Ok(completion)
}

/// Execute every item and return one [`OutputItem`] per input, in order.
///
/// Without `continue_on_fail` the first failure (in input order) aborts the
/// run; requests still in flight are dropped and no partial output is returned.
pub async fn execute(
    gateway: &dyn Gateway,
    credential: &Credential,
    items: &[ItemParameters],
    settings: ExecutionSettings,
) -> Result<Vec<OutputItem>, ItemError> {
    info!(
        items = items.len(),
        concurrency = settings.concurrency,
        continue_on_fail = settings.continue_on_fail,
        "Executing chat completions"
    );

    let mut results = stream::iter(items.iter().enumerate())
        .map(|(index, params)| async move {
            (index, execute_item(gateway, credential, params).await)
        })
        .buffered(settings.concurrency.max(1));

    let mut output = Vec::with_capacity(items.len());
    while let Some((index, result)) = results.next().await {
        let json = match result {
            Ok(completion) => Outcome::Success(completion),
            Err(source) if settings.continue_on_fail => {
                warn!(item = index, error = %source, "Item failed, continuing");
                Outcome::Failure {
                    error: source.to_string(),
                }
            }
            Err(source) => {
                warn!(item = index, error = %source, "Item failed, aborting run");
                return Err(ItemError { index, source });
            }
        };
        output.push(OutputItem {
            json,
            paired_item: index,
        });
    }

    Ok(output)
}
