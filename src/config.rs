//! Configuration loading and validation.
//!
//! The config lives in `~/.discord-tools/config.toml` unless a path is given
//! explicitly. Every field has a default, so an absent file is equivalent to
//! an empty one.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use tracing::debug;

use crate::credentials::DISCORD_CREDENTIALS;
use crate::tools::discord::DiscordSettings;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Discord API client settings.
    #[serde(default)]
    pub discord: DiscordConfig,
}

/// Discord API client settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordConfig {
    /// Base URL of the Discord REST API, without a trailing slash.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// `User-Agent` header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Environment variable holding the bot token when no credential store
    /// is configured.
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            token_env: default_token_env(),
        }
    }
}

impl DiscordConfig {
    /// Convert into the runtime settings consumed by the Discord tool.
    pub fn settings(&self) -> DiscordSettings {
        DiscordSettings {
            api_base: self.api_base.trim_end_matches('/').to_owned(),
            timeout: Duration::from_secs(self.timeout_secs),
            user_agent: self.user_agent.clone(),
            token_env: self.token_env.clone(),
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        url::Url::parse(&self.api_base)
            .with_context(|| format!("invalid discord.api_base: {}", self.api_base))?;
        if self.timeout_secs == 0 {
            anyhow::bail!("discord.timeout_secs must be greater than zero");
        }
        if self.token_env.trim().is_empty() {
            anyhow::bail!("discord.token_env must not be empty");
        }
        Ok(())
    }
}

// Default value functions for serde

fn default_api_base() -> String {
    "https://discord.com/api/v10".to_owned()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    concat!("discord-tools/", env!("CARGO_PKG_VERSION")).to_owned()
}
fn default_token_env() -> String {
    DISCORD_CREDENTIALS.env_var.to_owned()
}

/// Parse and validate a config from a TOML string.
///
/// # Errors
///
/// Returns an error if the TOML is malformed or a value fails validation.
pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let config: Config = toml::from_str(contents).context("failed to parse config TOML")?;
    config.discord.validate()?;
    Ok(config)
}

/// Load the config from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed, or validated.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config at {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("failed to load config at {}", path.display()))
}

/// Load the config from a TOML file, falling back to defaults when the file
/// does not exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read, parsed, or
/// validated.
pub fn load_config_or_default(path: &Path) -> anyhow::Result<Config> {
    if !path.exists() {
        debug!(path = %path.display(), "no config file found, using defaults");
        return Ok(Config::default());
    }
    load_config(path)
}

/// Well-known runtime file locations under `~/.discord-tools/`.
#[derive(Debug, Clone)]
pub struct RuntimePaths {
    /// Root directory (`~/.discord-tools`).
    pub root: PathBuf,
    /// Human-owned config file.
    pub config_toml: PathBuf,
    /// Credentials `.env` file.
    pub env_file: PathBuf,
}

/// Resolve the runtime paths rooted at `~/.discord-tools/`.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn runtime_paths() -> anyhow::Result<RuntimePaths> {
    let home = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    let root = home.home_dir().join(".discord-tools");
    Ok(RuntimePaths {
        config_toml: root.join("config.toml"),
        env_file: root.join(".env"),
        root,
    })
}
