//! Discord tool: send channel messages and read channel history.
//!
//! Provides two tools backed by the Discord REST API:
//! - `discord_send_message`: `POST /channels/{id}/messages`
//! - `discord_read_history`: `GET /channels/{id}/messages?limit=N`
//!
//! Every call resolves the bot token afresh, performs a single request and
//! maps the response into a [`ToolResult`]. There are no retries; a 429 is
//! reported to the caller like any other failure.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::RequestBuilder;
use serde_json::json;
use tracing::{debug, instrument, warn};

use super::{optional_int, required_str, Tool, ToolDefinition, ToolError, ToolResult};
use crate::config::DiscordConfig;
use crate::credentials::{CredentialError, CredentialStore, DISCORD_CREDENTIALS};

/// Tool name for sending a message.
pub const SEND_MESSAGE_TOOL: &str = "discord_send_message";

/// Tool name for reading channel history.
pub const READ_HISTORY_TOOL: &str = "discord_read_history";

/// History limit used when the caller gives none.
pub const DEFAULT_HISTORY_LIMIT: i64 = 50;

/// Smallest history limit sent upstream.
pub const MIN_HISTORY_LIMIT: i64 = 1;

/// Largest history limit Discord accepts.
pub const MAX_HISTORY_LIMIT: i64 = 100;

/// Runtime settings for [`DiscordTool`].
#[derive(Debug, Clone)]
pub struct DiscordSettings {
    /// API base URL without a trailing slash.
    pub api_base: String,
    /// Request timeout.
    pub timeout: Duration,
    /// `User-Agent` header value.
    pub user_agent: String,
    /// Environment variable read when no credential store is configured.
    pub token_env: String,
}

impl Default for DiscordSettings {
    fn default() -> Self {
        DiscordConfig::default().settings()
    }
}

/// Result of header construction: ready-to-send headers, or the reason the
/// request must not be sent.
#[derive(Debug, Clone)]
pub enum AuthHeaders {
    /// Authenticated headers for a Discord API request.
    Ready(HeaderMap),
    /// No usable bot token.
    NotConfigured {
        /// What is wrong.
        error: String,
        /// How to fix it.
        help: String,
    },
}

/// Clamp a requested history limit into `[1, 100]`, defaulting to 50.
pub fn clamp_history_limit(limit: Option<i64>) -> i64 {
    limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(MIN_HISTORY_LIMIT, MAX_HISTORY_LIMIT)
}

/// Map a Discord HTTP response to a [`ToolResult`].
///
/// The well-known failure statuses map to fixed messages regardless of the
/// body. A body that is not JSON is treated as `{}`.
pub fn normalize_response(status: u16, raw_body: &[u8]) -> ToolResult {
    match status {
        401 => return ToolResult::error("Invalid Discord bot token"),
        403 => {
            return ToolResult::error("Forbidden - Bot lacks permissions or is not in the server")
        }
        404 => return ToolResult::error("Resource not found (check channel ID)"),
        429 => return ToolResult::error("Rate limited by Discord API"),
        _ => {}
    }

    let data: serde_json::Value = serde_json::from_slice(raw_body).unwrap_or_else(|_| json!({}));

    if status >= 400 {
        return ToolResult::error(format!("Discord API error (HTTP {status}): {data}"));
    }

    ToolResult::Success(data)
}

/// Discord bot integration.
pub struct DiscordTool {
    settings: DiscordSettings,
    credentials: Option<Arc<dyn CredentialStore>>,
    client: reqwest::Client,
}

impl std::fmt::Debug for DiscordTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordTool")
            .field("settings", &self.settings)
            .field("has_credential_store", &self.credentials.is_some())
            .finish()
    }
}

impl DiscordTool {
    /// Create a new `DiscordTool`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        settings: DiscordSettings,
        credentials: Option<Arc<dyn CredentialStore>>,
    ) -> Result<Self, reqwest::Error> {
        // One request per call: a 3xx is reported, never followed.
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            settings,
            credentials,
            client,
        })
    }

    /// Resolve the bot token from the credential store, or from the
    /// environment when no store is configured.
    ///
    /// A store that has no value yields `None`; the environment is only
    /// consulted when there is no store at all.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError`] if the store holds a non-string value or
    /// cannot be read.
    pub fn resolve_token(&self) -> Result<Option<String>, CredentialError> {
        match &self.credentials {
            Some(store) => store.get(DISCORD_CREDENTIALS.credential_id),
            None => Ok(std::env::var(&self.settings.token_env).ok()),
        }
    }

    /// Build authenticated request headers.
    ///
    /// # Errors
    ///
    /// Propagates [`CredentialError`] from [`Self::resolve_token`].
    pub fn build_auth_headers(&self) -> Result<AuthHeaders, CredentialError> {
        let Some(token) = self.resolve_token()?.filter(|t| !t.is_empty()) else {
            return Ok(self.not_configured("Discord credentials not configured"));
        };

        let Ok(mut authorization) = HeaderValue::from_str(&format!("Bot {token}")) else {
            return Ok(self.not_configured("Discord bot token contains invalid characters"));
        };
        authorization.set_sensitive(true);

        let user_agent = HeaderValue::from_str(&self.settings.user_agent).unwrap_or_else(|_| {
            warn!("configured user agent is not a valid header value, using default");
            HeaderValue::from_static(concat!("discord-tools/", env!("CARGO_PKG_VERSION")))
        });

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, authorization);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, user_agent);
        Ok(AuthHeaders::Ready(headers))
    }

    /// Send a text message to a channel.
    ///
    /// Empty content is rejected before any network activity.
    ///
    /// # Errors
    ///
    /// Only a broken credential store is an error; every other failure is an
    /// error-shaped [`ToolResult`].
    #[instrument(skip(self, content), fields(tool = SEND_MESSAGE_TOOL))]
    pub async fn send_message(
        &self,
        channel_id: &str,
        content: &str,
    ) -> Result<ToolResult, CredentialError> {
        if content.is_empty() {
            return Ok(ToolResult::error("Message content cannot be empty"));
        }

        let headers = match self.build_auth_headers()? {
            AuthHeaders::Ready(headers) => headers,
            AuthHeaders::NotConfigured { error, help } => {
                warn!(error = %error, "skipping Discord request");
                return Ok(ToolResult::Error {
                    message: error,
                    help: Some(help),
                });
            }
        };

        let request = self
            .client
            .post(self.messages_url(channel_id))
            .headers(headers)
            .json(&json!({ "content": content }));

        Ok(self.dispatch(request).await)
    }

    /// Read recent messages from a channel.
    ///
    /// `limit` defaults to 50 and is clamped into `[1, 100]`.
    ///
    /// # Errors
    ///
    /// Only a broken credential store is an error; every other failure is an
    /// error-shaped [`ToolResult`].
    #[instrument(skip(self), fields(tool = READ_HISTORY_TOOL))]
    pub async fn read_history(
        &self,
        channel_id: &str,
        limit: Option<i64>,
    ) -> Result<ToolResult, CredentialError> {
        let limit = clamp_history_limit(limit);

        let headers = match self.build_auth_headers()? {
            AuthHeaders::Ready(headers) => headers,
            AuthHeaders::NotConfigured { error, help } => {
                warn!(error = %error, "skipping Discord request");
                return Ok(ToolResult::Error {
                    message: error,
                    help: Some(help),
                });
            }
        };

        let request = self
            .client
            .get(self.messages_url(channel_id))
            .headers(headers)
            .query(&[("limit", limit)]);

        Ok(self.dispatch(request).await)
    }

    fn messages_url(&self, channel_id: &str) -> String {
        format!("{}/channels/{channel_id}/messages", self.settings.api_base)
    }

    /// The help text points at wherever the token was looked up.
    fn not_configured(&self, error: &str) -> AuthHeaders {
        let help = match &self.credentials {
            Some(store) => store.missing_help(&DISCORD_CREDENTIALS),
            None => format!("Set {} environment variable", self.settings.token_env),
        };
        AuthHeaders::NotConfigured {
            error: error.to_owned(),
            help,
        }
    }

    /// Send the request and normalize whatever comes back.
    async fn dispatch(&self, request: RequestBuilder) -> ToolResult {
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return transport_failure(&e),
        };

        let status = response.status().as_u16();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => return transport_failure(&e),
        };

        let result = normalize_response(status, &body);
        debug!(status, success = result.is_success(), "Discord API responded");
        result
    }
}

fn transport_failure(err: &reqwest::Error) -> ToolResult {
    if err.is_timeout() {
        warn!("Discord request timed out");
        return ToolResult::error("Request timed out");
    }
    warn!(error = %err, "Discord request failed");
    ToolResult::error(format!("Network error: {err}"))
}

#[async_trait]
impl Tool for DiscordTool {
    fn definitions(&self) -> Vec<ToolDefinition> {
        vec![
            ToolDefinition {
                name: SEND_MESSAGE_TOOL.to_owned(),
                description: "Send a message to a Discord channel.".to_owned(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "channel_id": {
                            "type": "string",
                            "description": "The ID of the channel to send the message to"
                        },
                        "content": {
                            "type": "string",
                            "description": "The message content (text)"
                        }
                    },
                    "required": ["channel_id", "content"]
                }),
            },
            ToolDefinition {
                name: READ_HISTORY_TOOL.to_owned(),
                description: "Read message history from a Discord channel.".to_owned(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "channel_id": {
                            "type": "string",
                            "description": "The ID of the channel to read from"
                        },
                        "limit": {
                            "type": "integer",
                            "description": "Maximum number of messages to return (1-100, default 50)",
                            "minimum": MIN_HISTORY_LIMIT,
                            "maximum": MAX_HISTORY_LIMIT,
                            "default": DEFAULT_HISTORY_LIMIT
                        }
                    },
                    "required": ["channel_id"]
                }),
            },
        ]
    }

    async fn execute(
        &self,
        name: &str,
        input: &serde_json::Value,
    ) -> Result<ToolResult, ToolError> {
        match name {
            SEND_MESSAGE_TOOL => {
                let channel_id = required_str(input, "channel_id")?;
                let content = required_str(input, "content")?;
                Ok(self.send_message(channel_id, content).await?)
            }
            READ_HISTORY_TOOL => {
                let channel_id = required_str(input, "channel_id")?;
                let limit = optional_int(input, "limit")?;
                Ok(self.read_history(channel_id, limit).await?)
            }
            other => Err(ToolError::UnknownTool(other.to_owned())),
        }
    }
}
