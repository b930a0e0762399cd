//! Tool surface exposed to agent hosts.
//!
//! A [`Tool`] publishes one or more [`ToolDefinition`]s and executes calls
//! by name, returning a [`ToolResult`]. Hosts collect tools in a
//! [`registry::ToolRegistry`] and dispatch through it.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::credentials::{CredentialError, CredentialStore};

pub mod discord;
pub mod registry;

use discord::{DiscordSettings, DiscordTool};
use registry::ToolRegistry;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// JSON Schema definition for a tool a host can call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name, unique within a registry.
    pub name: String,
    /// Description shown to the caller.
    pub description: String,
    /// JSON Schema object for the tool's parameters.
    pub input_schema: serde_json::Value,
}

/// Outcome of a tool call.
///
/// Serializes as `{"success": true, "data": ...}` or
/// `{"error": "...", "help": "..."}` (`help` only when present).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolResult {
    /// The upstream call succeeded; the payload is passed through unchanged.
    Success(serde_json::Value),
    /// The call failed with a human-readable message.
    Error {
        /// What went wrong.
        message: String,
        /// How to fix it, when there is an actionable hint.
        help: Option<String>,
    },
}

impl ToolResult {
    /// Error result without a help hint.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            help: None,
        }
    }

    /// Whether this is a [`ToolResult::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The error message, if this is an error result.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Error { message, .. } => Some(message),
        }
    }

    /// The success payload, if any.
    pub fn data(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Success(data) => Some(data),
            Self::Error { .. } => None,
        }
    }

    /// Render into the JSON mapping hosts expect.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }))
    }
}

impl Serialize for ToolResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Success(data) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("success", &true)?;
                map.serialize_entry("data", data)?;
                map.end()
            }
            Self::Error { message, help } => {
                let len = if help.is_some() { 2 } else { 1 };
                let mut map = serializer.serialize_map(Some(len))?;
                map.serialize_entry("error", message)?;
                if let Some(help) = help {
                    map.serialize_entry("help", help)?;
                }
                map.end()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures that cannot be expressed as a [`ToolResult`].
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// No registered tool has this name.
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    /// A tool with this name is already registered.
    #[error("tool already registered: {0}")]
    Duplicate(String),
    /// Arguments are missing or have the wrong type.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The credential store violated its contract.
    #[error(transparent)]
    Credential(#[from] CredentialError),
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A callable tool integration.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Definitions of every tool name this integration handles.
    fn definitions(&self) -> Vec<ToolDefinition>;

    /// Execute the tool `name` with JSON arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] for unknown names, malformed arguments, or a
    /// broken credential store. Operational failures are `Ok` error results.
    async fn execute(
        &self,
        name: &str,
        input: &serde_json::Value,
    ) -> Result<ToolResult, ToolError>;
}

/// Register the Discord tools with a registry.
///
/// `credentials` is optional; without it the bot token is read from the
/// environment variable named in `settings`.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built or a tool name is
/// already taken.
pub fn register_discord_tools(
    registry: &mut ToolRegistry,
    settings: DiscordSettings,
    credentials: Option<Arc<dyn CredentialStore>>,
) -> anyhow::Result<()> {
    let tool = DiscordTool::new(settings, credentials)
        .context("failed to build Discord HTTP client")?;
    registry.register(Arc::new(tool))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

/// Extract a required string argument.
fn required_str<'a>(input: &'a serde_json::Value, field: &str) -> Result<&'a str, ToolError> {
    input
        .get(field)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolError::InvalidInput(format!("missing required field: {field}")))
}

/// Extract an optional integer argument. `null` counts as absent.
fn optional_int(input: &serde_json::Value, field: &str) -> Result<Option<i64>, ToolError> {
    match input.get(field) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(value) => value
            .as_i64()
            .or_else(|| value.as_u64().map(|_| i64::MAX))
            .map(Some)
            .ok_or_else(|| ToolError::InvalidInput(format!("{field} must be an integer"))),
    }
}
