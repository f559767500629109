//! Provider and model option lists.
//!
//! The loaders never fail. Every error path returns one of the labelled
//! fallback lists below, and the swallowed error is logged.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::credential::Credential;
use crate::error::NodeError;
use crate::gateway::Gateway;
use crate::model::parse_listing;

/// Provider filter value meaning "no filter".
pub const ALL_PROVIDERS: &str = "all";

/// A selectable `{name, value}` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionEntry {
    pub name: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl OptionEntry {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            description: None,
        }
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// `true` for sentinel entries that do not name a real provider or model.
    pub fn is_placeholder(&self) -> bool {
        self.value.is_empty()
    }
}

// ── Fallbacks ───────────────────────────────────────────────────────

/// Shown instead of any list while no API key is configured.
pub fn credentials_required(what: &str) -> Vec<OptionEntry> {
    vec![OptionEntry::new("API Key Required", "").described(format!(
        "Set up FlowEngine Chat Model API credentials to load {what}"
    ))]
}

pub fn all_providers_only() -> Vec<OptionEntry> {
    vec![OptionEntry::new("All Providers", ALL_PROVIDERS)]
}

pub fn models_unavailable() -> Vec<OptionEntry> {
    vec![OptionEntry::new("Error Loading Models", "")
        .described("Failed to fetch available models from FlowEngine")]
}

// ── Shaping ─────────────────────────────────────────────────────────

/// Distinct providers, sorted, behind a leading "All Providers" entry.
pub fn provider_options(listing: &Value) -> Result<Vec<OptionEntry>, NodeError> {
    let models = parse_listing(listing)?;
    let providers: BTreeSet<&str> = models.iter().filter_map(|m| m.resolved_provider()).collect();

    let mut options = all_providers_only();
    options.extend(
        providers
            .into_iter()
            .map(|p| OptionEntry::new(capitalize(p), p)),
    );
    Ok(options)
}

/// Named models, optionally restricted to one provider, sorted by name.
///
/// `None`, `""` and `"all"` disable the filter; anything else must match the
/// resolved provider exactly.
pub fn model_options(listing: &Value, provider: Option<&str>) -> Result<Vec<OptionEntry>, NodeError> {
    let models = parse_listing(listing)?;
    let filter = provider.filter(|p| !p.is_empty() && *p != ALL_PROVIDERS);

    let mut options: Vec<OptionEntry> = models
        .iter()
        .filter(|m| filter.map_or(true, |f| m.resolved_provider() == Some(f)))
        .filter_map(|m| {
            let name = m.name()?;
            let entry = OptionEntry::new(name, name);
            Some(match m.resolved_provider() {
                Some(p) => entry.described(format!("Provider: {p}")),
                None => entry,
            })
        })
        .collect();

    options.sort_by(|a, b| compare_names(&a.name, &b.name));
    Ok(options)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Case-insensitive order with the raw strings as tie-break, close to a
/// locale collation for model ids.
fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

// ── Loaders ─────────────────────────────────────────────────────────

/// Provider options for the current credential. Never fails.
pub async fn load_providers(gateway: &dyn Gateway, credential: &Credential) -> Vec<OptionEntry> {
    if !credential.is_present() {
        return credentials_required("providers");
    }

    match gateway
        .list_models(credential)
        .await
        .and_then(|listing| provider_options(&listing))
    {
        Ok(options) => options,
        Err(e) => {
            warn!(error = %e, "Failed to load providers, falling back to All Providers");
            all_providers_only()
        }
    }
}

/// Model options for the current credential and provider filter. Never fails.
pub async fn load_models(
    gateway: &dyn Gateway,
    credential: &Credential,
    provider: Option<&str>,
) -> Vec<OptionEntry> {
    if !credential.is_present() {
        return credentials_required("models");
    }

    match gateway
        .list_models(credential)
        .await
        .and_then(|listing| model_options(&listing, provider))
    {
        Ok(options) => options,
        Err(e) => {
            warn!(error = %e, provider = ?provider, "Failed to load models");
            models_unavailable()
        }
    }
}
