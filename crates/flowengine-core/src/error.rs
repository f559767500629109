//! Error taxonomy shared by the option loaders and the executor.

use thiserror::Error;

/// Why a single gateway interaction failed.
#[derive(Debug, Error)]
pub enum NodeError {
    /// No API key is configured.
    #[error(
        "FlowEngine Chat Model API key is required. Get your API key from flowengine.cloud/settings."
    )]
    MissingCredential,

    /// The gateway answered without any completion choices.
    #[error("No response from LLM API")]
    EmptyCompletion,

    /// Network failure, timeout, or a non-2xx status from the gateway.
    #[error("{0}")]
    Transport(String),

    /// The response JSON lacks the fields an option loader expects.
    #[error("Unexpected response shape: {0}")]
    UnexpectedShape(String),
}

impl From<reqwest::Error> for NodeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Transport(format!("Request to FlowEngine timed out: {err}"))
        } else {
            Self::Transport(format!("Request to FlowEngine failed: {err}"))
        }
    }
}

/// A failure that aborted an execution run, tagged with the item that caused it.
#[derive(Debug, Error)]
#[error("item {index}: {source}")]
pub struct ItemError {
    pub index: usize,
    #[source]
    pub source: NodeError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_human_readable() {
        assert_eq!(NodeError::EmptyCompletion.to_string(), "No response from LLM API");
        assert!(NodeError::MissingCredential
            .to_string()
            .contains("API key is required"));
        assert_eq!(
            NodeError::Transport("LLM API error (500): boom".into()).to_string(),
            "LLM API error (500): boom"
        );
    }

    #[test]
    fn test_item_error_carries_index() {
        let err = ItemError {
            index: 3,
            source: NodeError::EmptyCompletion,
        };
        assert_eq!(err.to_string(), "item 3: No response from LLM API");
    }
}
