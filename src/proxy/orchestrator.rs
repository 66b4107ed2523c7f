//! Backend selection and cross-backend fallback

use crate::backends::{BackendId, BackendPair};

/// Outcome of one buffered generation
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationResult {
    Success { text: String, backend: BackendId },
    Failure { reason: FailureReason },
}

/// Why no text was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// OpenAI was the only backend attempted and it failed
    ProviderAError,
    /// xAI was the only backend attempted and it failed
    ProviderBError,
    /// Both backends were attempted and both failed
    BothFailed,
}

impl FailureReason {
    /// Reason to report after trying `attempted` in order
    pub fn after(attempted: &[BackendId]) -> Self {
        match attempted {
            [BackendId::OpenAi] => FailureReason::ProviderAError,
            [BackendId::Xai] => FailureReason::ProviderBError,
            _ => FailureReason::BothFailed,
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::ProviderAError => write!(f, "openai failed"),
            FailureReason::ProviderBError => write!(f, "xai failed"),
            FailureReason::BothFailed => write!(f, "both backends failed"),
        }
    }
}

/// Calls the preferred backend, then the other one if allowed
///
/// Holds no per-request state: there are no retry counters, no circuit
/// breaker and no backoff. Every request starts from the preferred backend.
#[derive(Clone)]
pub struct Orchestrator {
    backends: BackendPair,
    fallback: bool,
}

impl Orchestrator {
    pub fn new(backends: BackendPair, fallback: bool) -> Self {
        Self { backends, fallback }
    }

    pub async fn generate(
        &self,
        prompt: &str,
        instruction: Option<&str>,
        preferred: BackendId,
    ) -> GenerationResult {
        let order = preferred.attempt_order(self.fallback);

        for (attempt, id) in order.iter().enumerate() {
            match self.backends.get(*id).generate_complete(prompt, instruction).await {
                Ok(text) => {
                    if attempt > 0 {
                        tracing::info!(backend = %id, preferred = %preferred, "Fallback backend succeeded");
                    }
                    return GenerationResult::Success { text, backend: *id };
                }
                Err(e) => {
                    tracing::warn!(
                        backend = %e.backend,
                        cause = %e.cause,
                        attempt = attempt + 1,
                        of = order.len(),
                        "Backend generation failed"
                    );
                }
            }
        }

        let reason = FailureReason::after(&order);
        tracing::error!(reason = %reason, "No backend produced text");
        GenerationResult::Failure { reason }
    }
}
