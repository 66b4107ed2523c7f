//! Provider API key loading

use crate::config::{SecretKeyNames, SecretsConfig};

/// API keys for both providers, loaded once at startup
#[derive(Clone)]
pub struct ApiKeys {
    pub openai: String,
    pub xai: String,
}

impl std::fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeys")
            .field("openai", &"<redacted>")
            .field("xai", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("Secret environment variable not set: {0}")]
    MissingVar(String),

    #[error("Failed to read secret file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Secret blob is not a JSON object: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Secret is missing key '{0}'")]
    MissingKey(String),
}

/// Load both API keys from the configured source
pub fn load_api_keys(config: &SecretsConfig) -> Result<ApiKeys, SecretError> {
    let keys = match config {
        SecretsConfig::Env { var, keys } => {
            let blob = std::env::var(var).map_err(|_| SecretError::MissingVar(var.clone()))?;
            tracing::debug!(var = %var, "Loading API keys from environment blob");
            parse_secret_blob(&blob, keys)?
        }
        SecretsConfig::File { path, keys } => {
            let blob = std::fs::read_to_string(path)?;
            tracing::debug!(path = %path, "Loading API keys from file");
            parse_secret_blob(&blob, keys)?
        }
        SecretsConfig::Vars { keys } => ApiKeys {
            openai: read_var(&keys.openai_key)?,
            xai: read_var(&keys.xai_key)?,
        },
    };

    tracing::info!("API keys loaded for openai and xai");
    Ok(keys)
}

/// Parse a JSON object blob holding both keys
///
/// Only the two named keys are read; other fields may hold any JSON value.
pub fn parse_secret_blob(blob: &str, names: &SecretKeyNames) -> Result<ApiKeys, SecretError> {
    let values: serde_json::Map<String, serde_json::Value> = serde_json::from_str(blob)?;

    let take = |name: &str| -> Result<String, SecretError> {
        values
            .get(name)
            .and_then(serde_json::Value::as_str)
            .filter(|v| !v.trim().is_empty())
            .map(str::to_string)
            .ok_or_else(|| SecretError::MissingKey(name.to_string()))
    };

    Ok(ApiKeys {
        openai: take(&names.openai_key)?,
        xai: take(&names.xai_key)?,
    })
}

fn read_var(name: &str) -> Result<String, SecretError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(SecretError::MissingVar(name.to_string())),
    }
}
