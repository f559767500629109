//! flowengine CLI — call the FlowEngine chat model gateway from the shell.
//!
//! Usage:
//!   flowengine onboard                 — Create a default configuration
//!   flowengine status                  — Show current configuration
//!   flowengine test                    — Verify the API key against the gateway
//!   flowengine providers               — List providers
//!   flowengine models [--provider P]   — List models
//!   flowengine chat --message "..."    — Send one prompt
//!   flowengine run --input items.json  — Execute a batch of items

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};

use flowengine_core::config::{Config, MAX_TOKENS_LIMIT, TEMPERATURE_RANGE};
use flowengine_core::credential::SETTINGS_URL;
use flowengine_core::executor::{
    ChatOptions, ExecutionSettings, ItemParameters, Outcome, OutputItem, NO_TOKEN_LIMIT,
};
use flowengine_core::node::ChatModelNode;
use flowengine_core::options::OptionEntry;

#[derive(Parser)]
#[command(
    name = "flowengine",
    version,
    about = "Access 100+ AI models via the FlowEngine gateway"
)]
struct Cli {
    /// Config file (default: ~/.flowengine/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or reset the configuration file
    Onboard,

    /// Show configuration status
    Status,

    /// Verify the API key against the gateway
    Test,

    /// List providers available to the API key
    Providers,

    /// List models, optionally filtered by provider
    Models {
        /// Provider id, or "all"
        #[arg(short, long)]
        provider: Option<String>,
    },

    /// Send a single prompt
    Chat {
        /// The message/prompt to send
        #[arg(short, long)]
        message: String,

        /// Model to use (overrides config)
        #[arg(long)]
        model: Option<String>,

        /// Provider the model belongs to (informational)
        #[arg(short, long)]
        provider: Option<String>,

        /// Sampling temperature, 0 to 2
        #[arg(short, long)]
        temperature: Option<f64>,

        /// Maximum tokens to generate, -1 for no limit
        #[arg(long, allow_hyphen_values = true, value_parser = clap::value_parser!(i64).range(-1..=MAX_TOKENS_LIMIT))]
        max_tokens: Option<i64>,

        /// System message setting the assistant's behaviour
        #[arg(short, long)]
        system_message: Option<String>,

        /// Print the full output record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Execute a JSON array of items and print the output records
    Run {
        /// Input file, or "-" for stdin
        #[arg(short, long)]
        input: String,

        /// Turn item failures into error records instead of aborting
        #[arg(long)]
        continue_on_fail: bool,

        /// Items sent concurrently (overrides config)
        #[arg(long)]
        concurrency: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(Config::default_path);

    match cli.command {
        Commands::Onboard => cmd_onboard(&config_path)?,
        Commands::Status => cmd_status(&config_path)?,
        Commands::Test => cmd_test(&config_path).await?,
        Commands::Providers => {
            let node = build_node(&load_config(&config_path)?, false)?;
            print_options(&node.list_providers().await);
        }
        Commands::Models { provider } => {
            let node = build_node(&load_config(&config_path)?, false)?;
            print_options(&node.list_models(provider.as_deref()).await);
        }
        Commands::Chat {
            message,
            model,
            provider,
            temperature,
            max_tokens,
            system_message,
            json,
        } => {
            let config = load_config(&config_path)?;
            let defaults = config.defaults.options();
            let options = ChatOptions {
                temperature: temperature.or(defaults.temperature),
                max_tokens: max_tokens.or(defaults.max_tokens),
                system_message: system_message.or(defaults.system_message),
            };
            let item = ItemParameters {
                provider,
                model: model.unwrap_or_else(|| config.defaults.model.clone()),
                message,
                options,
            };
            cmd_chat(&config, item, json).await?
        }
        Commands::Run {
            input,
            continue_on_fail,
            concurrency,
        } => {
            let config = load_config(&config_path)?;
            let mut settings = config.execution.settings();
            settings.continue_on_fail |= continue_on_fail;
            if let Some(n) = concurrency {
                settings.concurrency = n;
            }
            cmd_run(&config, &input, settings).await?
        }
    }

    Ok(())
}

// ── Shared Setup ────────────────────────────────────────────────────

fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        Config::load_from(path)
    } else {
        Ok(Config::default())
    }
}

/// Build the node, surfacing configuration problems up front.
///
/// Unless `require_key` is set, a missing API key is left to the node: the
/// option loaders answer with a credentials-required entry and every item
/// fails with a missing-credential record.
fn build_node(config: &Config, require_key: bool) -> Result<ChatModelNode> {
    let checked = if require_key {
        config.validate()
    } else {
        config.validate_settings()
    };
    if let Err(errors) = checked {
        eprintln!("\n  \x1b[31m❌ Configuration errors:\x1b[0m");
        for e in &errors {
            eprintln!("     • {}", e);
        }
        eprintln!();
        anyhow::bail!("Fix the above {} error(s) in config.json", errors.len());
    }
    ChatModelNode::from_config(config).context("Failed to create FlowEngine gateway client")
}

fn check_item(item: &ItemParameters) -> Result<()> {
    if item.model.is_empty() {
        anyhow::bail!("No model given. Pass --model or set defaults.model in config.json");
    }
    if let Some(t) = item.options.temperature {
        if !TEMPERATURE_RANGE.contains(&t) {
            anyhow::bail!("Temperature must be between 0 and 2 (got {})", t);
        }
    }
    if let Some(n) = item.options.max_tokens {
        if !(NO_TOKEN_LIMIT..=MAX_TOKENS_LIMIT).contains(&n) {
            anyhow::bail!(
                "maxTokens must be -1 or within 0..={} (got {})",
                MAX_TOKENS_LIMIT,
                n
            );
        }
    }
    Ok(())
}

fn print_options(options: &[OptionEntry]) {
    println!();
    for option in options {
        if option.is_placeholder() {
            println!("  ⚠️  {}", option.name);
        } else {
            println!("  • {} \x1b[2m({})\x1b[0m", option.name, option.value);
        }
        if let Some(ref description) = option.description {
            println!("     {}", description);
        }
    }
    println!();
}

// ── Onboard Command ─────────────────────────────────────────────────

fn cmd_onboard(path: &Path) -> Result<()> {
    Config::write_default_template(path)?;
    println!();
    println!("  ✅ Configuration created at:");
    println!("     {}", path.display());
    println!();
    println!("  Next steps:");
    println!("  1. Get an API key from {}", SETTINGS_URL);
    println!("  2. Put it in credentials.apiKey");
    println!("  3. Run `flowengine test` to verify it");
    println!();
    Ok(())
}

// ── Status Command ──────────────────────────────────────────────────

fn cmd_status(path: &Path) -> Result<()> {
    println!();
    println!("  flowengine status");
    println!("  ─────────────────────────────────────");

    if path.exists() {
        println!("  Config:      {}", path.display());
    } else {
        println!("  Config:      ❌ Not found (run `flowengine onboard`)");
        return Ok(());
    }

    let config = Config::load_from(path)?;

    if config.credential().is_present() {
        println!("  API key:     ✅ configured");
    } else {
        println!("  API key:     ❌ missing");
    }
    println!("  Gateway:     {}", config.gateway.base_url);
    println!("  Timeout:     {}s", config.gateway.timeout_seconds);
    println!(
        "  Model:       {}",
        if config.defaults.model.is_empty() {
            "(none)"
        } else {
            &config.defaults.model
        }
    );
    println!(
        "  Execution:   concurrency {}, continue on fail: {}",
        config.execution.concurrency, config.execution.continue_on_fail
    );

    if let Err(errors) = config.validate() {
        println!();
        for e in &errors {
            println!("  ⚠️  {}", e);
        }
    }

    println!();
    Ok(())
}

// ── Test Command ────────────────────────────────────────────────────

async fn cmd_test(path: &Path) -> Result<()> {
    let config = load_config(path)?;
    let node = build_node(&config, true)?;

    match node.test_credential().await {
        Ok(Some(count)) => println!("  ✅ Connected to {} ({} models)", config.gateway.base_url, count),
        Ok(None) => println!("  ✅ Connected to {}", config.gateway.base_url),
        Err(e) => {
            eprintln!("  \x1b[31m❌ {}\x1b[0m", e);
            anyhow::bail!("Credential test failed");
        }
    }
    Ok(())
}

// ── Chat Command ────────────────────────────────────────────────────

async fn cmd_chat(config: &Config, item: ItemParameters, json: bool) -> Result<()> {
    check_item(&item)?;
    let node = build_node(config, false)?;

    let settings = ExecutionSettings {
        continue_on_fail: false,
        concurrency: 1,
    };
    let output = node.execute(std::slice::from_ref(&item), settings).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    for record in &output {
        match &record.json {
            Outcome::Success(completion) => match completion.response.as_str() {
                Some(text) => println!("{}", text),
                None => println!("{}", completion.response),
            },
            Outcome::Failure { error } => eprintln!("  \x1b[31mError: {}\x1b[0m", error),
        }
    }
    Ok(())
}

// ── Run Command ─────────────────────────────────────────────────────

async fn cmd_run(config: &Config, input: &str, settings: ExecutionSettings) -> Result<()> {
    let raw = if input == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read items from stdin")?;
        buf
    } else {
        std::fs::read_to_string(input).with_context(|| format!("Failed to read {}", input))?
    };

    let items: Vec<ItemParameters> =
        serde_json::from_str(&raw).context("Input must be a JSON array of item objects")?;
    tracing::debug!(items = items.len(), "Loaded batch input");

    let node = build_node(config, false)?;
    let output = run_batch(&node, &items, settings).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Execute a batch, rejecting items with out-of-range parameters.
///
/// With `continue_on_fail` a rejected item becomes a failure record at its
/// own index and the remaining items still run. Otherwise the first invalid
/// item aborts the batch before anything is sent.
async fn run_batch(
    node: &ChatModelNode,
    items: &[ItemParameters],
    settings: ExecutionSettings,
) -> Result<Vec<OutputItem>> {
    let mut accepted = Vec::with_capacity(items.len());
    let mut positions = Vec::with_capacity(items.len());
    let mut rejected = Vec::new();

    for (i, item) in items.iter().enumerate() {
        match check_item(item) {
            Ok(()) => {
                accepted.push(item.clone());
                positions.push(i);
            }
            Err(e) if settings.continue_on_fail => {
                tracing::warn!(index = i, error = %e, "Rejected invalid item");
                rejected.push(OutputItem {
                    json: Outcome::Failure {
                        error: e.to_string(),
                    },
                    paired_item: i,
                });
            }
            Err(e) => return Err(e.context(format!("Invalid item {}", i))),
        }
    }

    let mut output = match node.execute(&accepted, settings).await {
        Ok(output) => output,
        Err(mut e) => {
            e.index = positions[e.index];
            return Err(e.into());
        }
    };

    // Indices from the executor refer to `accepted`.
    for record in &mut output {
        record.paired_item = positions[record.paired_item];
    }
    output.extend(rejected);
    output.sort_by_key(|record| record.paired_item);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn item(model: &str) -> ItemParameters {
        ItemParameters::new(model, "hi")
    }

    fn continue_on_fail() -> ExecutionSettings {
        ExecutionSettings {
            continue_on_fail: true,
            concurrency: 1,
        }
    }

    fn config_for(server: &MockServer) -> Config {
        let mut config = Config::default();
        config.credentials.api_key = "sk-test".into();
        config.gateway.base_url = server.uri();
        config
    }

    async fn mount_completion(server: &MockServer, calls: u64) {
        Mock::given(method("POST"))
            .and(path("/api/v1/litellm/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "gpt-4",
                "choices": [{"message": {"role": "assistant", "content": "hello"}}]
            })))
            .expect(calls)
            .mount(server)
            .await;
    }

    #[test]
    fn test_check_item_max_tokens_range() {
        let mut ok = item("gpt-4");
        ok.options.max_tokens = Some(NO_TOKEN_LIMIT);
        assert!(check_item(&ok).is_ok());
        ok.options.max_tokens = Some(MAX_TOKENS_LIMIT);
        assert!(check_item(&ok).is_ok());

        let mut too_many = item("gpt-4");
        too_many.options.max_tokens = Some(50_000);
        let err = check_item(&too_many).unwrap_err();
        assert!(err.to_string().contains("maxTokens"));

        too_many.options.max_tokens = Some(-2);
        assert!(check_item(&too_many).is_err());
    }

    #[test]
    fn test_missing_key_only_blocks_credential_test() {
        let config = Config::default();
        assert!(build_node(&config, false).is_ok());
        assert!(build_node(&config, true).is_err());

        let mut broken = Config::default();
        broken.execution.concurrency = 0;
        assert!(build_node(&broken, false).is_err());
    }

    #[tokio::test]
    async fn test_providers_without_key_show_credentials_entry() {
        let node = build_node(&Config::default(), false).unwrap();
        let options = node.list_providers().await;
        assert_eq!(options.len(), 1);
        assert!(options[0].is_placeholder());
        assert_eq!(options[0].name, "API Key Required");
    }

    #[tokio::test]
    async fn test_run_without_key_fails_every_item() {
        let node = build_node(&Config::default(), false).unwrap();
        let items = vec![item("gpt-4"), item("claude-3")];

        let output = run_batch(&node, &items, continue_on_fail()).await.unwrap();
        assert_eq!(output.len(), 2);
        for (i, record) in output.iter().enumerate() {
            assert_eq!(record.paired_item, i);
            match &record.json {
                Outcome::Failure { error } => assert!(error.contains("API key is required")),
                other => panic!("unexpected outcome: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_run_rejects_invalid_item_in_place() {
        let server = MockServer::start().await;
        mount_completion(&server, 1).await;
        let node = build_node(&config_for(&server), false).unwrap();

        let items = vec![item(""), item("gpt-4")];
        let output = run_batch(&node, &items, continue_on_fail()).await.unwrap();

        assert_eq!(output.len(), 2);
        assert_eq!(output[0].paired_item, 0);
        match &output[0].json {
            Outcome::Failure { error } => assert!(error.contains("No model given")),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(output[1].paired_item, 1);
        match &output[1].json {
            Outcome::Success(completion) => assert_eq!(completion.response, json!("hello")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_aborts_on_invalid_item_without_continue() {
        let server = MockServer::start().await;
        mount_completion(&server, 0).await;
        let node = build_node(&config_for(&server), false).unwrap();

        let items = vec![item("gpt-4"), item("")];
        let settings = ExecutionSettings {
            continue_on_fail: false,
            concurrency: 1,
        };
        let err = run_batch(&node, &items, settings).await.unwrap_err();
        assert!(err.to_string().contains("Invalid item 1"));
    }
}
