//! Configuration module for flowengine.
//!
//! Loads typed configuration from `~/.flowengine/config.json`.
//! All fields use `serde` defaults so a partial file is enough.

use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::credential::Credential;
use crate::executor::{ChatOptions, ExecutionSettings, NO_TOKEN_LIMIT};
use crate::gateway::DEFAULT_BASE_URL;

/// Upper bound for `maxTokens`.
pub const MAX_TOKENS_LIMIT: i64 = 32768;

/// Allowed sampling temperature range.
pub const TEMPERATURE_RANGE: std::ops::RangeInclusive<f64> = 0.0..=2.0;

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub credentials: CredentialsConfig,
    pub gateway: GatewayConfig,
    pub execution: ExecutionConfig,
    pub defaults: ChatDefaults,
}

impl Config {
    /// Load configuration from the default path (`~/.flowengine/config.json`).
    /// A missing file yields the defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Get the default config directory path.
    pub fn config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".flowengine")
    }

    /// Get the default config file path.
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.json")
    }

    /// Write the default config template to `path`.
    pub fn write_default_template(path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let template = serde_json::json!({
            "credentials": {
                "apiKey": "YOUR_FLOWENGINE_API_KEY"
            },
            "gateway": {
                "baseUrl": DEFAULT_BASE_URL,
                "timeoutSeconds": GatewayConfig::default().timeout_seconds
            },
            "execution": {
                "continueOnFail": false,
                "concurrency": 1
            },
            "defaults": {
                "model": "",
                "maxTokens": NO_TOKEN_LIMIT,
                "systemMessage": ""
            }
        });

        std::fs::write(path, serde_json::to_string_pretty(&template)?)?;
        Ok(())
    }

    /// The credential described by this config.
    pub fn credential(&self) -> Credential {
        Credential::new(self.credentials.api_key.clone())
    }

    /// Validate configuration and return every problem found.
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        let key = &self.credentials.api_key;
        if key.is_empty() || key.contains("YOUR_") {
            errors.push(
                "credentials.apiKey is missing or a placeholder. \
                 Get an API key from flowengine.cloud/settings."
                    .into(),
            );
        }

        if let Err(more) = self.validate_settings() {
            errors.extend(more);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Like [`validate`](Self::validate) but ignores the API key.
    ///
    /// A missing key is not fatal for listing or executing: the option
    /// loaders answer with a credentials-required entry and every item fails
    /// with a missing-credential record.
    pub fn validate_settings(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        let base = &self.gateway.base_url;
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            errors.push(format!(
                "gateway.baseUrl must start with http:// or https:// (got \"{}\").",
                base
            ));
        }

        if self.gateway.timeout_seconds == 0 {
            errors.push("gateway.timeoutSeconds must be greater than zero.".into());
        }

        if self.execution.concurrency == 0 {
            errors.push("execution.concurrency must be at least 1.".into());
        }

        if let Some(t) = self.defaults.temperature {
            if !TEMPERATURE_RANGE.contains(&t) {
                errors.push(format!("defaults.temperature must be within 0..=2 (got {}).", t));
            }
        }

        let max_tokens = self.defaults.max_tokens;
        if max_tokens != NO_TOKEN_LIMIT && !(0..=MAX_TOKENS_LIMIT).contains(&max_tokens) {
            errors.push(format!(
                "defaults.maxTokens must be -1 or within 0..={} (got {}).",
                MAX_TOKENS_LIMIT, max_tokens
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

// ── Credentials ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CredentialsConfig {
    pub api_key: String,
}

// ── Gateway ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GatewayConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            timeout_seconds: 60,
        }
    }
}

// ── Execution ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExecutionConfig {
    pub continue_on_fail: bool,
    pub concurrency: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            continue_on_fail: false,
            concurrency: 1,
        }
    }
}

impl ExecutionConfig {
    pub fn settings(&self) -> ExecutionSettings {
        ExecutionSettings {
            continue_on_fail: self.continue_on_fail,
            concurrency: self.concurrency,
        }
    }
}

// ── Chat defaults ───────────────────────────────────────────────────

/// Values used when a command does not specify them.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChatDefaults {
    pub model: String,
    pub temperature: Option<f64>,
    pub max_tokens: i64,
    pub system_message: String,
}

impl Default for ChatDefaults {
    fn default() -> Self {
        Self {
            model: String::new(),
            temperature: None,
            max_tokens: NO_TOKEN_LIMIT,
            system_message: String::new(),
        }
    }
}

impl ChatDefaults {
    pub fn options(&self) -> ChatOptions {
        ChatOptions {
            temperature: self.temperature,
            max_tokens: Some(self.max_tokens),
            system_message: Some(self.system_message.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.gateway.base_url, "https://flowengine.cloud");
        assert_eq!(config.gateway.timeout_seconds, 60);
        assert_eq!(config.execution.concurrency, 1);
        assert!(!config.execution.continue_on_fail);
        assert_eq!(config.defaults.max_tokens, -1);
        assert!(!config.credential().is_present());
    }

    #[test]
    fn test_deserialize_minimal_json() {
        let json = r#"{"credentials": {"apiKey": "fe-test"}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.credentials.api_key, "fe-test");
        assert_eq!(config.gateway.base_url, "https://flowengine.cloud");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_full_json() {
        let json = r#"{
            "credentials": {"apiKey": "fe-test"},
            "gateway": {"baseUrl": "http://localhost:4000", "timeoutSeconds": 5},
            "execution": {"continueOnFail": true, "concurrency": 4},
            "defaults": {"model": "gpt-4", "temperature": 0.2, "maxTokens": 512, "systemMessage": "be brief"}
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        let settings = config.execution.settings();
        assert!(settings.continue_on_fail);
        assert_eq!(settings.concurrency, 4);

        let options = config.defaults.options();
        assert_eq!(options.temperature, Some(0.2));
        assert_eq!(options.max_tokens, Some(512));
        assert_eq!(options.system_message.as_deref(), Some("be brief"));
    }

    #[test]
    fn test_validate_reports_every_problem() {
        let json = r#"{
            "credentials": {"apiKey": "YOUR_FLOWENGINE_API_KEY"},
            "gateway": {"baseUrl": "flowengine.cloud", "timeoutSeconds": 0},
            "execution": {"concurrency": 0},
            "defaults": {"temperature": 3.5, "maxTokens": 40000}
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 6);
    }

    #[test]
    fn test_missing_key_is_not_a_settings_problem() {
        let config = Config::default();
        assert!(config.validate_settings().is_ok());
        assert_eq!(config.validate().unwrap_err().len(), 1);

        let json = r#"{"gateway": {"timeoutSeconds": 0}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.validate_settings().unwrap_err().len(), 1);
    }

    #[test]
    fn test_template_round_trip() {
        let path = std::env::temp_dir()
            .join(format!("flowengine-config-{}", std::process::id()))
            .join("config.json");
        Config::write_default_template(&path).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.credentials.api_key, "YOUR_FLOWENGINE_API_KEY");
        assert_eq!(config.defaults.max_tokens, -1);
        assert!(config.validate().is_err());

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
