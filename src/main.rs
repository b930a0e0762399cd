//! discord-tools CLI entry point.
//!
//! A minimal tool host: registers the Discord tools and runs a single call
//! from the command line, printing the JSON result to stdout.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::debug;

use discord_tools::config::{load_config_or_default, runtime_paths};
use discord_tools::credentials::{
    all_credential_specs, load_credentials, CredentialStore, JsonCredentialStore,
};
use discord_tools::logging::{self, LoggingGuard};
use discord_tools::tools::discord::{READ_HISTORY_TOOL, SEND_MESSAGE_TOOL};
use discord_tools::tools::registry::ToolRegistry;
use discord_tools::tools::register_discord_tools;

/// discord-tools: send and read Discord channel messages.
#[derive(Parser)]
#[command(name = "discord-tools", version, about)]
struct Cli {
    /// Config file (default: `~/.discord-tools/config.toml`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// `.env` file holding `DISCORD_BOT_TOKEN` (default: `~/.discord-tools/.env` if present).
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    /// JSON credentials file mapping credential ids to tokens.
    #[arg(long, global = true)]
    credentials: Option<PathBuf>,

    /// Also write JSON logs to this directory.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Send a message to a channel.
    Send {
        /// Channel ID.
        #[arg(long)]
        channel: String,
        /// Message text.
        #[arg(long)]
        content: String,
    },
    /// Read recent messages from a channel.
    History {
        /// Channel ID.
        #[arg(long)]
        channel: String,
        /// Number of messages (clamped to 1-100).
        #[arg(long, allow_hyphen_values = true)]
        limit: Option<i64>,
    },
    /// Print the tool definitions as JSON.
    Tools,
    /// Print the credential specs as JSON.
    Credentials,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let _logging_guard = init_logging(cli.log_dir.as_deref())?;

    let (name, input) = match &cli.command {
        Command::Credentials => {
            print_json(&serde_json::to_value(all_credential_specs())?)?;
            return Ok(ExitCode::SUCCESS);
        }
        Command::Tools => {
            let registry = build_registry(&cli)?;
            print_json(&serde_json::to_value(registry.definitions())?)?;
            return Ok(ExitCode::SUCCESS);
        }
        Command::Send { channel, content } => (
            SEND_MESSAGE_TOOL,
            json!({ "channel_id": channel, "content": content }),
        ),
        Command::History { channel, limit } => (
            READ_HISTORY_TOOL,
            json!({ "channel_id": channel, "limit": limit }),
        ),
    };

    let registry = build_registry(&cli)?;
    let result = registry
        .execute(name, &input)
        .await
        .with_context(|| format!("{name} failed"))?;
    print_json(&result.to_json())?;

    if result.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn init_logging(log_dir: Option<&Path>) -> anyhow::Result<Option<LoggingGuard>> {
    match log_dir {
        Some(dir) => Ok(Some(logging::init_production(dir)?)),
        None => {
            logging::init_cli()?;
            Ok(None)
        }
    }
}

/// Load config and credentials, then register the Discord tools.
fn build_registry(cli: &Cli) -> anyhow::Result<ToolRegistry> {
    let paths = runtime_paths()?;

    let config_path = cli.config.clone().unwrap_or(paths.config_toml);
    let config = load_config_or_default(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    let store = resolve_credential_store(cli, &paths.env_file)?;
    debug!(
        api_base = %config.discord.api_base,
        has_store = store.is_some(),
        "registering Discord tools"
    );

    let mut registry = ToolRegistry::new();
    register_discord_tools(&mut registry, config.discord.settings(), store)?;
    Ok(registry)
}

/// Pick the credential source: JSON file, then `.env` file, then none
/// (the tool falls back to the process environment).
fn resolve_credential_store(
    cli: &Cli,
    default_env_file: &Path,
) -> anyhow::Result<Option<Arc<dyn CredentialStore>>> {
    if let Some(path) = &cli.credentials {
        let store: Arc<dyn CredentialStore> = Arc::new(JsonCredentialStore::load(path)?);
        return Ok(Some(store));
    }

    let env_file = match &cli.env_file {
        Some(path) => Some(path.as_path()),
        None if default_env_file.exists() => Some(default_env_file),
        None => None,
    };

    match env_file {
        Some(path) => {
            let credentials: Arc<dyn CredentialStore> = Arc::new(
                load_credentials(path)
                    .with_context(|| format!("failed to load {}", path.display()))?,
            );
            Ok(Some(credentials))
        }
        None => Ok(None),
    }
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
