//! Text-generation backends (OpenAI, xAI) behind one interface

mod node;
mod openai;
mod sse;
mod xai;

#[cfg(test)]
pub(crate) mod testing;

pub use node::build_node_client;
pub use openai::OpenAiBackend;
pub use xai::XaiBackend;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::ProvidersConfig;
use crate::secrets::ApiKeys;

/// Identifies one of the two providers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum BackendId {
    #[serde(rename = "openai")]
    OpenAi,
    #[default]
    #[serde(rename = "xai")]
    Xai,
}

impl BackendId {
    pub const ALL: [BackendId; 2] = [BackendId::OpenAi, BackendId::Xai];

    /// Wire name used in requests and config
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendId::OpenAi => "openai",
            BackendId::Xai => "xai",
        }
    }

    /// The other provider
    pub fn other(&self) -> BackendId {
        match self {
            BackendId::OpenAi => BackendId::Xai,
            BackendId::Xai => BackendId::OpenAi,
        }
    }

    /// Backends to try, in order, for a request preferring `self`
    pub fn attempt_order(&self, fallback: bool) -> Vec<BackendId> {
        if fallback {
            vec![*self, self.other()]
        } else {
            vec![*self]
        }
    }
}

impl std::fmt::Display for BackendId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BackendId {
    type Err = UnknownBackend;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" => Ok(BackendId::OpenAi),
            "xai" => Ok(BackendId::Xai),
            other => Err(UnknownBackend(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown backend '{0}', expected one of: openai, xai")]
pub struct UnknownBackend(pub String);

/// Failure of a single provider call, whatever the provider
#[derive(Debug, Clone, thiserror::Error)]
#[error("{backend} provider error: {cause}")]
pub struct ProviderError {
    pub backend: BackendId,
    pub cause: ProviderFailure,
}

impl ProviderError {
    pub fn new(backend: BackendId, cause: ProviderFailure) -> Self {
        Self { backend, cause }
    }
}

/// Why a provider call failed
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderFailure {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("rate limited")]
    RateLimited,

    #[error("authentication rejected (status {0})")]
    Auth(u16),

    #[error("status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("provider reported an error: {0}")]
    Reported(String),

    #[error("stream ended before the provider signalled completion")]
    Interrupted,

    #[error("no text in response")]
    Empty,
}

impl ProviderFailure {
    /// Classify a transport-level error from reqwest
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderFailure::Timeout
        } else if e.is_decode() {
            ProviderFailure::Malformed(e.to_string())
        } else {
            ProviderFailure::Network(e.to_string())
        }
    }

    /// Classify a non-success HTTP status
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        match status.as_u16() {
            429 => ProviderFailure::RateLimited,
            401 | 403 => ProviderFailure::Auth(status.as_u16()),
            code => ProviderFailure::Status {
                status: code,
                message: body.chars().take(200).collect(),
            },
        }
    }
}

/// Lazy, forward-only sequence of generated text fragments
pub type FragmentStream = BoxStream<'static, Result<String, ProviderError>>;

/// Uniform interface to a remote text-generation provider
#[async_trait]
pub trait TextBackend: Send + Sync {
    /// Which provider this is
    fn id(&self) -> BackendId;

    /// Generate the full text in one call
    async fn generate_complete(
        &self,
        prompt: &str,
        instruction: Option<&str>,
    ) -> Result<String, ProviderError>;

    /// Open a streaming session; fragments arrive as the provider emits them
    async fn generate_stream(
        &self,
        prompt: &str,
        instruction: Option<&str>,
    ) -> Result<FragmentStream, ProviderError>;
}

/// The two process-wide backend handles
#[derive(Clone)]
pub struct BackendPair {
    openai: Arc<dyn TextBackend>,
    xai: Arc<dyn TextBackend>,
}

impl BackendPair {
    pub fn new(openai: Arc<dyn TextBackend>, xai: Arc<dyn TextBackend>) -> Self {
        Self { openai, xai }
    }

    pub fn get(&self, id: BackendId) -> &Arc<dyn TextBackend> {
        match id {
            BackendId::OpenAi => &self.openai,
            BackendId::Xai => &self.xai,
        }
    }
}

/// Build both provider adapters from configuration and API keys
pub fn build_backends(
    providers: &ProvidersConfig,
    keys: &ApiKeys,
) -> Result<BackendPair, Box<dyn std::error::Error>> {
    let openai_client = build_node_client(&providers.openai)?;
    let xai_client = build_node_client(&providers.xai)?;

    let openai = OpenAiBackend::new(&providers.openai, keys.openai.clone(), openai_client);
    let xai = XaiBackend::new(&providers.xai, keys.xai.clone(), xai_client);

    tracing::info!(
        openai_url = %providers.openai.base_url(),
        openai_model = %providers.openai.model,
        xai_url = %providers.xai.base_url(),
        xai_model = %providers.xai.model,
        "Backends configured"
    );

    Ok(BackendPair::new(Arc::new(openai), Arc::new(xai)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_id_parse() {
        assert_eq!("openai".parse::<BackendId>().unwrap(), BackendId::OpenAi);
        assert_eq!("xai".parse::<BackendId>().unwrap(), BackendId::Xai);

        let err = "foo".parse::<BackendId>().unwrap_err();
        assert!(err.to_string().contains("foo"));
        assert!("OpenAI".parse::<BackendId>().is_err());
    }

    #[test]
    fn test_backend_id_default_and_other() {
        assert_eq!(BackendId::default(), BackendId::Xai);
        assert_eq!(BackendId::OpenAi.other(), BackendId::Xai);
        assert_eq!(BackendId::Xai.other(), BackendId::OpenAi);
    }

    #[test]
    fn test_attempt_order() {
        assert_eq!(
            BackendId::OpenAi.attempt_order(true),
            vec![BackendId::OpenAi, BackendId::Xai]
        );
        assert_eq!(BackendId::Xai.attempt_order(false), vec![BackendId::Xai]);
    }

    #[test]
    fn test_backend_id_serde() {
        assert_eq!(serde_json::to_string(&BackendId::OpenAi).unwrap(), "\"openai\"");
        let id: BackendId = serde_yaml::from_str("xai").unwrap();
        assert_eq!(id, BackendId::Xai);
    }

    #[test]
    fn test_failure_from_status() {
        use reqwest::StatusCode;

        assert_eq!(
            ProviderFailure::from_status(StatusCode::TOO_MANY_REQUESTS, "slow down"),
            ProviderFailure::RateLimited
        );
        assert_eq!(
            ProviderFailure::from_status(StatusCode::UNAUTHORIZED, ""),
            ProviderFailure::Auth(401)
        );
        match ProviderFailure::from_status(StatusCode::BAD_GATEWAY, &"x".repeat(1000)) {
            ProviderFailure::Status { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message.len(), 200);
            }
            other => panic!("unexpected failure: {:?}", other),
        }
    }

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::new(BackendId::OpenAi, ProviderFailure::RateLimited);
        assert_eq!(err.to_string(), "openai provider error: rate limited");
    }
}
