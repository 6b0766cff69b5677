//! Credential lookup for the mailbox connection.
//!
//! A credential may be configured in one of three places, consulted in order:
//!
//! 1. **Inline value** (`value`): handy for local experiments
//! 2. **File** (`file`): mounted secrets, `~` is expanded
//! 3. **Environment variable** (`env`): the usual production setup
//!
//! Resolved values are wrapped in [`SecretString`] so they never show up in
//! `Debug` output or logs.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No credential source configured for '{0}'")]
    NoSourceProvided(&'static str),

    #[error("Failed to read credential from '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },
}

pub type Result<T> = std::result::Result<T, SecretError>;

/// Where a single credential comes from. Empty strings count as unset.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SecretSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,
}

impl std::fmt::Debug for SecretSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretSource")
            .field("value", &self.value.as_ref().map(|_| "<redacted>"))
            .field("file", &self.file)
            .field("env", &self.env)
            .finish()
    }
}

impl SecretSource {
    pub fn from_env(name: impl Into<String>) -> Self {
        Self {
            env: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn is_configured(&self) -> bool {
        non_empty(&self.value).is_some()
            || non_empty(&self.file).is_some()
            || non_empty(&self.env).is_some()
    }

    /// Resolves the credential. `label` names it in the error when no source
    /// is configured at all.
    pub fn resolve(&self, label: &'static str) -> Result<SecretString> {
        if let Some(value) = non_empty(&self.value) {
            return Ok(SecretString::from(value.to_string()));
        }

        if let Some(path) = non_empty(&self.file) {
            let path = expand_home(path);
            let content = fs::read_to_string(&path)
                .map_err(|source| SecretError::FileRead { path, source })?;
            return Ok(SecretString::from(content.trim().to_string()));
        }

        if let Some(name) = non_empty(&self.env) {
            return match std::env::var(name) {
                Ok(value) => Ok(SecretString::from(value.trim().to_string())),
                Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                    name: name.to_string(),
                }),
                Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                    name: name.to_string(),
                }),
            };
        }

        Err(SecretError::NoSourceProvided(label))
    }

    /// Like [`resolve`](Self::resolve) but an unconfigured source yields `None`.
    pub fn resolve_optional(&self, label: &'static str) -> Result<Option<SecretString>> {
        match self.resolve(label) {
            Ok(secret) => Ok(Some(secret)),
            Err(SecretError::NoSourceProvided(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// Expands a leading `~` or `~/`. `~user` forms are left untouched.
fn expand_home(path: &str) -> PathBuf {
    if let Some(home) = dirs::home_dir() {
        if path == "~" {
            return home;
        }
        if let Some(rest) = path.strip_prefix("~/") {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
