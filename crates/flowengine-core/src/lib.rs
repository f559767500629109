//! flowengine-core: the FlowEngine chat model node.
//!
//! Calls a hosted LiteLLM-compatible gateway from batch workflows:
//!
//! - [`config`] — Typed configuration loading from JSON
//! - [`credential`] — API key holder and bearer auth
//! - [`gateway`] — `Gateway` trait and the reqwest implementation
//! - [`model`] — Descriptors from the model-listing endpoint
//! - [`options`] — Provider and model option loaders with fallbacks
//! - [`executor`] — Per-item request building and response mapping
//! - [`node`] — The node facade tying it all together
//!
//! # Quick Start
//!
//! ```no_run
//! use flowengine_core::config::Config;
//! use flowengine_core::executor::ItemParameters;
//! use flowengine_core::node::ChatModelNode;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::load()?;
//! let node = ChatModelNode::from_config(&config)?;
//!
//! let models = node.list_models(Some("openai")).await;
//! let items = vec![ItemParameters::new(&models[0].value, "Say hi")];
//! let output = node.execute(&items, config.execution.settings()).await?;
//! println!("{}", serde_json::to_string_pretty(&output)?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod credential;
pub mod error;
pub mod executor;
pub mod gateway;
pub mod model;
pub mod node;
pub mod options;
