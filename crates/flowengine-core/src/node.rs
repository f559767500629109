//! The FlowEngine Chat Model node: credential test, option loaders and the
//! executor behind one plain interface.

use tracing::info;

use crate::config::Config;
use crate::credential::Credential;
use crate::error::{ItemError, NodeError};
use crate::executor::{self, ExecutionSettings, ItemParameters, OutputItem};
use crate::gateway::http::HttpGateway;
use crate::gateway::Gateway;
use crate::model::parse_listing;
use crate::options::{self, OptionEntry};

pub struct ChatModelNode {
    gateway: Box<dyn Gateway>,
    credential: Credential,
}

impl ChatModelNode {
    pub fn new(gateway: Box<dyn Gateway>, credential: Credential) -> Self {
        Self {
            gateway,
            credential,
        }
    }

    /// Build a node talking HTTP to the configured gateway.
    pub fn from_config(config: &Config) -> Result<Self, NodeError> {
        let gateway = HttpGateway::from_config(&config.gateway)?;
        Ok(Self::new(Box::new(gateway), config.credential()))
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Connectivity test: succeeds iff the listing endpoint answers with a
    /// non-error status. Returns the number of listed models when the body
    /// has the expected shape.
    pub async fn test_credential(&self) -> Result<Option<usize>, NodeError> {
        let listing = self.gateway.list_models(&self.credential).await?;
        let count = parse_listing(&listing).ok().map(|models| models.len());
        info!(models = ?count, "FlowEngine credential verified");
        Ok(count)
    }

    pub async fn list_providers(&self) -> Vec<OptionEntry> {
        options::load_providers(self.gateway.as_ref(), &self.credential).await
    }

    pub async fn list_models(&self, provider: Option<&str>) -> Vec<OptionEntry> {
        options::load_models(self.gateway.as_ref(), &self.credential, provider).await
    }

    pub async fn execute(
        &self,
        items: &[ItemParameters],
        settings: ExecutionSettings,
    ) -> Result<Vec<OutputItem>, ItemError> {
        executor::execute(self.gateway.as_ref(), &self.credential, items, settings).await
    }
}
