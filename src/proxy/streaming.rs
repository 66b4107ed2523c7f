//! Streaming multiplexer: provider fragments to a chunked response body

use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use std::time::{Duration, Instant};
use tracing::Instrument;

use super::orchestrator::FailureReason;
use crate::backends::{
    BackendId, BackendPair, FragmentStream, ProviderError, ProviderFailure, TextBackend,
};

/// Opens a provider stream with pre-commit fallback
#[derive(Clone)]
pub struct StreamMultiplexer {
    backends: BackendPair,
    fallback: bool,
    idle_timeout: Duration,
}

/// A provider stream that has produced its first fragment
///
/// Once a stream is committed, headers go out and no other backend is tried.
pub struct CommittedStream {
    pub backend: BackendId,
    first: String,
    rest: FragmentStream,
    idle_timeout: Duration,
}

impl StreamMultiplexer {
    pub fn new(backends: BackendPair, fallback: bool, idle_timeout: Duration) -> Self {
        Self {
            backends,
            fallback,
            idle_timeout,
        }
    }

    /// Open the preferred backend and read its first fragment
    ///
    /// Any failure up to and including the first fragment moves on to the
    /// alternate backend, which is emitted from the start.
    pub async fn open(
        &self,
        prompt: &str,
        instruction: Option<&str>,
        preferred: BackendId,
    ) -> Result<CommittedStream, FailureReason> {
        let order = preferred.attempt_order(self.fallback);

        for (attempt, id) in order.iter().enumerate() {
            match self.first_fragment(*id, prompt, instruction).await {
                Ok((first, rest)) => {
                    tracing::debug!(
                        backend = %id,
                        attempt = attempt + 1,
                        first_len = first.len(),
                        "Stream committed"
                    );
                    return Ok(CommittedStream {
                        backend: *id,
                        first,
                        rest,
                        idle_timeout: self.idle_timeout,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        backend = %e.backend,
                        cause = %e.cause,
                        attempt = attempt + 1,
                        of = order.len(),
                        "Stream failed before first fragment"
                    );
                }
            }
        }

        let reason = FailureReason::after(&order);
        tracing::error!(reason = %reason, "No backend produced a stream");
        Err(reason)
    }

    async fn first_fragment(
        &self,
        id: BackendId,
        prompt: &str,
        instruction: Option<&str>,
    ) -> Result<(String, FragmentStream), ProviderError> {
        let opened = open_first_fragment(self.backends.get(id).as_ref(), prompt, instruction);

        match tokio::time::timeout(self.idle_timeout, opened).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::new(id, ProviderFailure::Timeout)),
        }
    }
}

async fn open_first_fragment(
    backend: &dyn TextBackend,
    prompt: &str,
    instruction: Option<&str>,
) -> Result<(String, FragmentStream), ProviderError> {
    let mut fragments = backend.generate_stream(prompt, instruction).await?;
    loop {
        match fragments.next().await {
            Some(Ok(text)) if text.is_empty() => continue,
            Some(Ok(text)) => return Ok((text, fragments)),
            Some(Err(e)) => return Err(e),
            None => return Err(ProviderError::new(backend.id(), ProviderFailure::Empty)),
        }
    }
}

/// Logs how a committed stream ended, including client disconnects
struct StreamGuard {
    backend: BackendId,
    fragments: usize,
    bytes: usize,
    started: Instant,
    finished: bool,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        if !self.finished {
            tracing::info!(
                backend = %self.backend,
                fragments = self.fragments,
                bytes = self.bytes,
                "Client disconnected, provider stream released"
            );
        }
    }
}

struct BodyState {
    pending_first: Option<String>,
    rest: FragmentStream,
    idle_timeout: Duration,
    guard: StreamGuard,
}

impl BodyState {
    fn emit(mut self, text: String) -> Option<(Result<Bytes, std::io::Error>, Option<BodyState>)> {
        self.guard.fragments += 1;
        self.guard.bytes += text.len();
        Some((Ok(Bytes::from(text)), Some(self)))
    }

    fn abort(mut self, error: std::io::Error) -> Option<(Result<Bytes, std::io::Error>, Option<BodyState>)> {
        self.guard.finished = true;
        Some((Err(error), None))
    }
}

impl CommittedStream {
    /// Pull-driven response body
    ///
    /// Each poll pulls at most one fragment from the provider. A failure after
    /// commit ends the body with an error so the chunked transfer is aborted
    /// rather than terminated cleanly. Dropping the body drops the provider
    /// stream.
    pub fn into_body_stream(self) -> BoxStream<'static, Result<Bytes, std::io::Error>> {
        let span = tracing::Span::current();
        let state = BodyState {
            pending_first: Some(self.first),
            rest: self.rest,
            idle_timeout: self.idle_timeout,
            guard: StreamGuard {
                backend: self.backend,
                fragments: 0,
                bytes: 0,
                started: Instant::now(),
                finished: false,
            },
        };

        stream::unfold(Some(state), move |state| {
            async move {
                let mut state = state?;

                if let Some(first) = state.pending_first.take() {
                    return state.emit(first);
                }

                match tokio::time::timeout(state.idle_timeout, state.rest.next()).await {
                    Ok(Some(Ok(text))) => state.emit(text),
                    Ok(None) => {
                        state.guard.finished = true;
                        tracing::info!(
                            backend = %state.guard.backend,
                            fragments = state.guard.fragments,
                            bytes = state.guard.bytes,
                            elapsed_ms = state.guard.started.elapsed().as_millis() as u64,
                            "Stream complete"
                        );
                        None
                    }
                    Ok(Some(Err(e))) => {
                        tracing::warn!(
                            backend = %e.backend,
                            cause = %e.cause,
                            fragments = state.guard.fragments,
                            "Stream failed after commit, truncating response"
                        );
                        state.abort(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
                    }
                    Err(_) => {
                        tracing::warn!(
                            backend = %state.guard.backend,
                            idle_timeout_secs = state.idle_timeout.as_secs(),
                            fragments = state.guard.fragments,
                            "Stream stalled after commit, truncating response"
                        );
                        state.abort(std::io::Error::new(
                            std::io::ErrorKind::TimedOut,
                            "provider stream idle timeout",
                        ))
                    }
                }
            }
            .instrument(span.clone())
        })
        .boxed()
    }
}
