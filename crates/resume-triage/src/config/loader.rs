use std::path::Path;

use crate::config::schema::{AuthConfig, TriageConfig};
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/triage-config-v1.json");

/// Source format of a config document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
}

impl ConfigFormat {
    /// `.yaml`/`.yml` select YAML; everything else is read as JSON.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("yaml") | Some("yml") => Self::Yaml,
            _ => Self::Json,
        }
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<TriageConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content, ConfigFormat::from_path(path))
}

pub fn load_config_from_str(
    content: &str,
    format: ConfigFormat,
) -> Result<TriageConfig, ConfigError> {
    let json_value: serde_json::Value = match format {
        ConfigFormat::Json => serde_json::from_str(content)?,
        ConfigFormat::Yaml => serde_yaml::from_str(content)?,
    };

    validate_schema(&json_value)?;

    let config: TriageConfig = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validation(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        message: message.into(),
    }
}

fn validate_config(config: &TriageConfig) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(validation(format!(
            "Unsupported config version: {}",
            config.version
        )));
    }

    if config.job.title.trim().is_empty() {
        return Err(validation("job.title must not be blank"));
    }

    if let Some(threshold) = config.job.threshold {
        if threshold > config.scoring.ceiling {
            return Err(validation(format!(
                "job.threshold {} exceeds scoring.ceiling {}",
                threshold, config.scoring.ceiling
            )));
        }
    }

    if let Some(fuzzy) = config.scoring.fuzzy_threshold {
        if !(fuzzy > 0.0 && fuzzy <= 1.0) {
            return Err(validation(format!(
                "scoring.fuzzy_threshold must be in (0, 1], got {}",
                fuzzy
            )));
        }
    }

    for pattern in config
        .downloads
        .include
        .iter()
        .chain(config.downloads.exclude.iter())
    {
        if let Err(e) = glob::Pattern::new(pattern) {
            return Err(ConfigError::InvalidPattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            });
        }
    }

    if let Some(mailbox) = &config.mailbox {
        if !mailbox.endpoint.starts_with("https://") && !mailbox.endpoint.starts_with("http://") {
            return Err(validation("mailbox.endpoint must be an http(s) URL"));
        }
        if crate::mailbox::user_from_endpoint(&mailbox.endpoint).is_none() {
            return Err(validation(
                "mailbox.endpoint must look like .../users/<address>/messages",
            ));
        }
        match &mailbox.auth {
            AuthConfig::Token { token } if !token.is_configured() => {
                return Err(validation("mailbox.auth.token has no source"));
            }
            AuthConfig::ClientCredentials { client_secret, .. }
                if !client_secret.is_configured() =>
            {
                return Err(validation("mailbox.auth.client_secret has no source"));
            }
            _ => {}
        }
    }

    Ok(())
}
