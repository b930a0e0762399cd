//! Credential stores and credential metadata.
//!
//! Tools never read secrets directly from files. They receive an optional
//! [`CredentialStore`] and ask it for a credential by id; when no store is
//! configured they fall back to an environment variable.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;
use tracing::debug;

// ---------------------------------------------------------------------------
// Credential metadata
// ---------------------------------------------------------------------------

/// Static description of a credential a tool integration needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialSpec {
    /// Identifier used to query a [`CredentialStore`].
    pub credential_id: &'static str,
    /// Key of the secret inside the stored credential.
    pub credential_key: &'static str,
    /// Environment variable used when no store is configured.
    pub env_var: &'static str,
    /// Tools that require this credential.
    pub tools: &'static [&'static str],
    /// Whether the tools are unusable without it.
    pub required: bool,
    /// Where to obtain the credential.
    pub help_url: &'static str,
    /// Human-readable description.
    pub description: &'static str,
}

/// Bot token for the Discord API.
pub const DISCORD_CREDENTIALS: CredentialSpec = CredentialSpec {
    credential_id: "discord",
    credential_key: "bot_token",
    env_var: "DISCORD_BOT_TOKEN",
    tools: &["discord_send_message", "discord_read_history"],
    required: true,
    help_url: "https://discord.com/developers/applications",
    description: "Bot Token for Discord API",
};

/// All credential specs known to this crate.
pub fn all_credential_specs() -> &'static [CredentialSpec] {
    &[DISCORD_CREDENTIALS]
}

/// Look up a credential spec by its id.
pub fn credential_spec(credential_id: &str) -> Option<&'static CredentialSpec> {
    all_credential_specs()
        .iter()
        .find(|spec| spec.credential_id == credential_id)
}

// ---------------------------------------------------------------------------
// CredentialStore
// ---------------------------------------------------------------------------

/// Errors raised by a credential store.
///
/// These indicate a broken collaborator, not a missing credential: a missing
/// credential is `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// The store holds a value for the id that is not a string.
    #[error("expected string from credentials.get('{credential_id}'), got {found}")]
    WrongType {
        /// The credential id that was queried.
        credential_id: String,
        /// The kind of value found instead.
        found: &'static str,
    },
    /// The store could not be read.
    #[error("credential store unavailable: {0}")]
    Unavailable(String),
}

/// Lookup capability for named credentials.
pub trait CredentialStore: Send + Sync {
    /// Return the secret for `credential_id`, or `None` if it is not set.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError`] when the store holds a malformed value or
    /// cannot be accessed.
    fn get(&self, credential_id: &str) -> Result<Option<String>, CredentialError>;

    /// Tell the user where to put `spec` when this store has no value for it.
    fn missing_help(&self, spec: &CredentialSpec) -> String {
        format!(
            "Add a '{}' credential to the configured credential store",
            spec.credential_id
        )
    }
}

// ---------------------------------------------------------------------------
// .env-backed credentials
// ---------------------------------------------------------------------------

/// Credentials loaded from a `.env` file.
#[derive(Clone, Default)]
pub struct Credentials {
    vars: BTreeMap<String, String>,
    source: Option<PathBuf>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("source", &self.source)
            .field("keys", &self.vars.keys().collect::<Vec<_>>())
            .field("values", &"[REDACTED]")
            .finish()
    }
}

impl Credentials {
    /// Build credentials from a key-value map.
    pub fn from_map(vars: BTreeMap<String, String>) -> Self {
        Self { vars, source: None }
    }

    /// Returns the raw value for a key, if present.
    pub fn var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }
}

impl CredentialStore for Credentials {
    /// Keys in a `.env` file are env var names, so a known credential id is
    /// translated through its [`CredentialSpec`] first.
    fn get(&self, credential_id: &str) -> Result<Option<String>, CredentialError> {
        let key = credential_spec(credential_id).map_or(credential_id, |spec| spec.env_var);
        Ok(self.var(key).map(str::to_owned))
    }

    fn missing_help(&self, spec: &CredentialSpec) -> String {
        match &self.source {
            Some(path) => format!("Set {} in {}", spec.env_var, path.display()),
            None => format!("Set {} in the credentials file", spec.env_var),
        }
    }
}

/// Load credentials from a `.env` file.
///
/// # Errors
///
/// Returns an error if the file does not exist, permissions are too broad,
/// or parsing fails.
pub fn load_credentials(path: &Path) -> anyhow::Result<Credentials> {
    if !path.exists() {
        return Err(anyhow::anyhow!(
            "credentials file does not exist: {}",
            path.display()
        ));
    }

    validate_private_permissions(path)?;

    let mut vars = BTreeMap::new();
    let iter = dotenvy::from_path_iter(path)
        .with_context(|| format!("failed to read credentials at {}", path.display()))?;

    for item in iter {
        let (key, value) = item.with_context(|| {
            format!(
                "failed to parse key-value entry in credentials file {}",
                path.display()
            )
        })?;
        vars.insert(key, value);
    }

    debug!(path = %path.display(), keys = vars.len(), "loaded .env credentials");
    Ok(Credentials {
        vars,
        source: Some(path.to_path_buf()),
    })
}

/// Restrict a credentials file to owner read/write where supported.
///
/// # Errors
///
/// Returns an error if permissions cannot be updated.
pub fn enforce_private_file_permissions(path: &Path) -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let perms = fs::Permissions::from_mode(0o600);
        fs::set_permissions(path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    #[cfg(not(unix))]
    let _ = path;

    Ok(())
}

#[cfg(unix)]
fn validate_private_permissions(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = fs::metadata(path)
        .with_context(|| format!("failed to inspect credentials file {}", path.display()))?;
    let mode = metadata.permissions().mode() & 0o777;

    if mode & 0o077 != 0 {
        return Err(anyhow::anyhow!(
            "credentials file {} must be 0600, found {:o}",
            path.display(),
            mode
        ));
    }

    Ok(())
}

#[cfg(not(unix))]
fn validate_private_permissions(_path: &Path) -> anyhow::Result<()> {
    Ok(())
}

// ---------------------------------------------------------------------------
// JSON-backed credentials
// ---------------------------------------------------------------------------

/// Credentials held as a JSON object of credential id to value.
///
/// This is the shape tool hosts hand over, so values are not guaranteed to
/// be strings; a non-string value surfaces as [`CredentialError::WrongType`]
/// at lookup time rather than at load time.
#[derive(Clone, Default)]
pub struct JsonCredentialStore {
    values: serde_json::Map<String, serde_json::Value>,
    source: Option<PathBuf>,
}

impl std::fmt::Debug for JsonCredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonCredentialStore")
            .field("keys", &self.values.keys().collect::<Vec<_>>())
            .field("values", &"[REDACTED]")
            .finish()
    }
}

impl JsonCredentialStore {
    /// Build a store from a JSON value, which must be an object.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` is not a JSON object.
    pub fn from_value(value: serde_json::Value) -> anyhow::Result<Self> {
        match value {
            serde_json::Value::Object(values) => Ok(Self {
                values,
                source: None,
            }),
            other => Err(anyhow::anyhow!(
                "credentials JSON must be an object, got {}",
                json_type_name(&other)
            )),
        }
    }

    /// Load a store from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// does not contain an object.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read credentials at {}", path.display()))?;
        let value: serde_json::Value = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse credentials at {}", path.display()))?;
        let mut store = Self::from_value(value)
            .with_context(|| format!("invalid credentials at {}", path.display()))?;
        store.source = Some(path.to_path_buf());
        Ok(store)
    }
}

impl CredentialStore for JsonCredentialStore {
    fn get(&self, credential_id: &str) -> Result<Option<String>, CredentialError> {
        match self.values.get(credential_id) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(CredentialError::WrongType {
                credential_id: credential_id.to_owned(),
                found: json_type_name(other),
            }),
        }
    }

    fn missing_help(&self, spec: &CredentialSpec) -> String {
        match &self.source {
            Some(path) => format!("Add a \"{}\" entry to {}", spec.credential_id, path.display()),
            None => format!(
                "Add a '{}' credential to the configured credential store",
                spec.credential_id
            ),
        }
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
