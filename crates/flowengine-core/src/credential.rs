//! The FlowEngine API credential.
//!
//! Holds the API key and decorates outbound requests with bearer auth.
//! The connectivity test lives on [`ChatModelNode::test_credential`](crate::node::ChatModelNode::test_credential)
//! because it needs a gateway to talk to.

use std::fmt;

use reqwest::header::AUTHORIZATION;
use reqwest::RequestBuilder;

use crate::error::NodeError;

/// Where users obtain an API key.
pub const SETTINGS_URL: &str = "https://flowengine.cloud/settings";

/// API key credential. Read-only once constructed.
#[derive(Clone, Default)]
pub struct Credential {
    api_key: String,
}

impl Credential {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }

    /// A credential with no key, as seen before the user configured one.
    pub fn empty() -> Self {
        Self::default()
    }

    /// `true` when a non-empty key is set. No other validation happens locally.
    pub fn is_present(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// The key, or [`NodeError::MissingCredential`] when absent.
    pub fn api_key(&self) -> Result<&str, NodeError> {
        if self.is_present() {
            Ok(&self.api_key)
        } else {
            Err(NodeError::MissingCredential)
        }
    }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> Result<String, NodeError> {
        Ok(format!("Bearer {}", self.api_key()?))
    }

    /// Attach the bearer header to an outbound request.
    pub fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder, NodeError> {
        Ok(request.header(AUTHORIZATION, self.bearer()?))
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = if self.is_present() { "***" } else { "<unset>" };
        f.debug_struct("Credential").field("api_key", &key).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presence_check() {
        assert!(Credential::new("sk-123").is_present());
        assert!(!Credential::new("").is_present());
        assert!(!Credential::empty().is_present());
    }

    #[test]
    fn test_bearer_header() {
        let cred = Credential::new("sk-123");
        assert_eq!(cred.bearer().unwrap(), "Bearer sk-123");
        assert!(matches!(
            Credential::empty().bearer(),
            Err(NodeError::MissingCredential)
        ));
    }

    #[test]
    fn test_authorize_sets_header() {
        let client = reqwest::Client::new();
        let request = Credential::new("sk-abc")
            .authorize(client.get("http://localhost/models"))
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(
            request.headers()[AUTHORIZATION].to_str().unwrap(),
            "Bearer sk-abc"
        );
    }

    #[test]
    fn test_debug_redacts_key() {
        let rendered = format!("{:?}", Credential::new("sk-secret"));
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("***"));
    }
}
