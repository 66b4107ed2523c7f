mod loader;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::backends::BackendId;
use crate::instructions::InstructionKey;

pub use loader::load_config;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub mode: ServeMode,
    #[serde(default)]
    pub default_backend: BackendId,
    #[serde(default)]
    pub fallback: FallbackConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub secrets: SecretsConfig,
    #[serde(default)]
    pub instructions: InstructionsConfig,
    #[serde(default)]
    pub streaming: StreamingConfig,
    #[serde(default)]
    pub cors: CorsConfig,
}

/// Gateway listen address
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8066,
            host: "0.0.0.0".to_string(),
        }
    }
}

/// Which response shape the gateway serves
///
/// - `Buffered`: one JSON document per request (`{"output_text": ...}`)
/// - `Streaming`: chunked `text/plain` body written as the provider emits tokens
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ServeMode {
    #[default]
    Buffered,
    Streaming,
}

impl ServeMode {
    pub fn is_streaming(&self) -> bool {
        matches!(self, ServeMode::Streaming)
    }
}

impl std::fmt::Display for ServeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServeMode::Buffered => write!(f, "buffered"),
            ServeMode::Streaming => write!(f, "streaming"),
        }
    }
}

/// Cross-backend fallback policy
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FallbackConfig {
    #[serde(default = "default_fallback_enabled")]
    pub enabled: bool,
}

fn default_fallback_enabled() -> bool {
    true
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: default_fallback_enabled(),
        }
    }
}

/// Both provider endpoints
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProvidersConfig {
    #[serde(default = "ProviderConfig::openai_default")]
    pub openai: ProviderConfig,
    #[serde(default = "ProviderConfig::xai_default")]
    pub xai: ProviderConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            openai: ProviderConfig::openai_default(),
            xai: ProviderConfig::xai_default(),
        }
    }
}

impl ProvidersConfig {
    pub fn get(&self, backend: BackendId) -> &ProviderConfig {
        match backend {
            BackendId::OpenAi => &self.openai,
            BackendId::Xai => &self.xai,
        }
    }
}

/// A single provider endpoint
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    /// API base URL including the version segment (e.g., "https://api.openai.com/v1")
    pub url: String,
    /// Model name sent with every request
    pub model: String,
    /// Per-call timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// TLS configuration options
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

/// TLS configuration for provider connections
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Accept invalid certificates (self-signed, expired)
    #[serde(default)]
    pub accept_invalid_certs: bool,
    /// Path to custom CA certificate (PEM format)
    pub ca_cert_path: Option<String>,
}

fn default_timeout() -> u64 {
    60
}

impl ProviderConfig {
    pub fn openai_default() -> Self {
        Self {
            url: "https://api.openai.com/v1".to_string(),
            model: "gpt-5-nano".to_string(),
            timeout_seconds: default_timeout(),
            tls: None,
        }
    }

    pub fn xai_default() -> Self {
        Self {
            url: "https://api.x.ai/v1".to_string(),
            model: "grok-4-1-fast-non-reasoning".to_string(),
            timeout_seconds: default_timeout(),
            tls: None,
        }
    }

    /// Returns the base URL with trailing slash stripped
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}

/// Where the provider API keys come from
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum SecretsConfig {
    /// JSON blob held in a single environment variable
    Env {
        #[serde(default = "default_secret_var")]
        var: String,
        #[serde(flatten)]
        keys: SecretKeyNames,
    },
    /// JSON blob stored in a file
    File {
        path: String,
        #[serde(flatten)]
        keys: SecretKeyNames,
    },
    /// Each key read from its own environment variable
    Vars {
        #[serde(flatten)]
        keys: SecretKeyNames,
    },
}

impl Default for SecretsConfig {
    fn default() -> Self {
        SecretsConfig::Env {
            var: default_secret_var(),
            keys: SecretKeyNames::default(),
        }
    }
}

impl SecretsConfig {
    pub fn key_names(&self) -> &SecretKeyNames {
        match self {
            SecretsConfig::Env { keys, .. }
            | SecretsConfig::File { keys, .. }
            | SecretsConfig::Vars { keys } => keys,
        }
    }
}

fn default_secret_var() -> String {
    "GATEWAY_API_KEYS".to_string()
}

/// Names of the API keys inside the secret blob
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SecretKeyNames {
    #[serde(default = "default_openai_key")]
    pub openai_key: String,
    #[serde(default = "default_xai_key")]
    pub xai_key: String,
}

fn default_openai_key() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_xai_key() -> String {
    "XAI_API_KEY".to_string()
}

impl Default for SecretKeyNames {
    fn default() -> Self {
        Self {
            openai_key: default_openai_key(),
            xai_key: default_xai_key(),
        }
    }
}

/// Stored instruction text
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InstructionsConfig {
    /// Key whose text is used for work-item requests in streaming mode
    #[serde(default)]
    pub work_item_key: Option<InstructionKey>,
    /// Inline entries
    #[serde(default)]
    pub entries: Vec<InstructionEntry>,
    /// Optional YAML file with more entries (same shape as `entries`)
    #[serde(default)]
    pub file: Option<String>,
}

/// A single stored instruction
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InstructionEntry {
    #[serde(flatten)]
    pub key: InstructionKey,
    pub text: String,
}

/// Streaming mode tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamingConfig {
    /// Longest wait for the next fragment before the provider is considered stalled
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u64,
}

fn default_idle_timeout() -> u64 {
    30
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            idle_timeout_seconds: default_idle_timeout(),
        }
    }
}

/// Cross-origin settings; an empty list allows any origin
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CorsConfig {
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        load_config(path)
    }

    /// Check values serde cannot check on its own
    pub fn validate(&self) -> Result<(), ConfigError> {
        for backend in BackendId::ALL {
            let provider = self.providers.get(backend);
            let parsed = url::Url::parse(provider.base_url()).map_err(|e| {
                ConfigError::Validation(format!("{} url '{}': {}", backend, provider.url, e))
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ConfigError::Validation(format!(
                    "{} url must be http or https, got '{}'",
                    backend,
                    parsed.scheme()
                )));
            }
            if provider.model.trim().is_empty() {
                return Err(ConfigError::Validation(format!("{} model is empty", backend)));
            }
            if provider.timeout_seconds == 0 {
                return Err(ConfigError::Validation(format!(
                    "{} timeout_seconds must be greater than 0",
                    backend
                )));
            }
        }

        if self.streaming.idle_timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "streaming.idle_timeout_seconds must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}
