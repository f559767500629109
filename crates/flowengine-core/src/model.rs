//! Model descriptors returned by the gateway's listing endpoint.

use serde::Deserialize;
use serde_json::Value;

use crate::error::NodeError;

/// Provider metadata attached to a listed model.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelInfo {
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub litellm_provider: Option<String>,
}

/// One entry of `GET /api/v1/litellm/models`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelDescriptor {
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub model_info: Option<ModelInfo>,
}

impl ModelDescriptor {
    /// `provider`, else `litellm_provider`. Empty strings count as unset.
    pub fn resolved_provider(&self) -> Option<&str> {
        let info = self.model_info.as_ref()?;
        non_empty(info.provider.as_deref()).or_else(|| non_empty(info.litellm_provider.as_deref()))
    }

    /// The model name, if present and non-empty.
    pub fn name(&self) -> Option<&str> {
        non_empty(self.model_name.as_deref())
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.is_empty())
}

/// Extract the descriptors from a listing response.
///
/// Fails with [`NodeError::UnexpectedShape`] when `data` is not an array.
/// Entries that do not decode are kept as empty descriptors so they are
/// skipped downstream instead of poisoning the whole list.
pub fn parse_listing(listing: &Value) -> Result<Vec<ModelDescriptor>, NodeError> {
    let entries = listing
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| NodeError::UnexpectedShape("`data` is not an array".into()))?;

    Ok(entries
        .iter()
        .map(|entry| ModelDescriptor::deserialize(entry).unwrap_or_default())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_provider_precedence() {
        let listing = json!({"data": [
            {"model_name": "a", "model_info": {"provider": "openai", "litellm_provider": "azure"}},
            {"model_name": "b", "model_info": {"litellm_provider": "anthropic"}},
            {"model_name": "c", "model_info": {"provider": "", "litellm_provider": "groq"}},
            {"model_name": "d"},
        ]});
        let models = parse_listing(&listing).unwrap();
        let providers: Vec<_> = models.iter().map(|m| m.resolved_provider()).collect();
        assert_eq!(
            providers,
            vec![Some("openai"), Some("anthropic"), Some("groq"), None]
        );
    }

    #[test]
    fn test_malformed_entry_becomes_empty() {
        let listing = json!({"data": [{"model_name": 42}, "junk", {"model_name": "ok"}]});
        let models = parse_listing(&listing).unwrap();
        assert_eq!(models.len(), 3);
        assert_eq!(models[0].name(), None);
        assert_eq!(models[1].name(), None);
        assert_eq!(models[2].name(), Some("ok"));
    }

    #[test]
    fn test_missing_data_is_unexpected_shape() {
        assert!(matches!(
            parse_listing(&json!({"models": []})),
            Err(NodeError::UnexpectedShape(_))
        ));
        assert!(matches!(
            parse_listing(&json!({"data": {"model_name": "x"}})),
            Err(NodeError::UnexpectedShape(_))
        ));
    }
}
