//! Incremental server-sent events decoding for provider streams

use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::VecDeque;

use super::{BackendId, FragmentStream, ProviderError, ProviderFailure};

/// One dispatched SSE event
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

/// Line-oriented SSE decoder that tolerates events split across network chunks
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning every event completed by them
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buf.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = self.process_line(line.trim_end_matches(['\n', '\r'])) {
                events.push(event);
            }
        }
        events
    }

    /// Flush whatever is left once the body has ended
    pub fn finish(&mut self) -> Option<SseEvent> {
        if !self.buf.is_empty() {
            let rest = std::mem::take(&mut self.buf);
            let line = String::from_utf8_lossy(&rest);
            if let Some(event) = self.process_line(line.trim_end_matches(['\n', '\r'])) {
                return Some(event);
            }
        }
        self.dispatch()
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        // Comment / keep-alive
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if self.data.is_empty() {
            self.event = None;
            return None;
        }
        let data = self.data.join("\n");
        self.data.clear();
        Some(SseEvent {
            event: self.event.take(),
            data,
        })
    }
}

struct SseState<E> {
    body: BoxStream<'static, Result<Bytes, E>>,
    decoder: SseDecoder,
    pending: VecDeque<SseEvent>,
    done: bool,
}

/// Turn a byte stream into a stream of SSE events, pulling bytes only on demand
pub fn sse_events<E: Send + 'static>(
    body: BoxStream<'static, Result<Bytes, E>>,
) -> BoxStream<'static, Result<SseEvent, E>> {
    let state = SseState {
        body,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                return Some((Ok(event), state));
            }
            if state.done {
                return None;
            }
            match state.body.next().await {
                Some(Ok(chunk)) => {
                    tracing::trace!("Raw SSE chunk ({} bytes)", chunk.len());
                    let events = state.decoder.push(&chunk);
                    state.pending.extend(events);
                }
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(e), state));
                }
                None => {
                    state.done = true;
                    if let Some(event) = state.decoder.finish() {
                        state.pending.push_back(event);
                    }
                }
            }
        }
    })
    .boxed()
}

/// What a provider-specific SSE event means for the fragment stream
#[derive(Debug, PartialEq)]
pub enum StreamStep {
    Text(String),
    Skip,
    Done,
    Fail(ProviderFailure),
}

/// Map provider SSE events to text fragments
///
/// The stream ends when `classify` reports [`StreamStep::Done`]; a body that ends
/// before that is reported as [`ProviderFailure::Interrupted`]. After the first
/// error nothing more is pulled from the provider.
pub fn fragment_stream(
    backend: BackendId,
    events: BoxStream<'static, Result<SseEvent, reqwest::Error>>,
    classify: fn(&SseEvent) -> StreamStep,
) -> FragmentStream {
    stream::unfold(Some(events), move |events| async move {
        let mut events = events?;
        loop {
            match events.next().await {
                Some(Ok(event)) => match classify(&event) {
                    StreamStep::Text(text) if !text.is_empty() => {
                        return Some((Ok(text), Some(events)));
                    }
                    StreamStep::Text(_) | StreamStep::Skip => continue,
                    StreamStep::Done => return None,
                    StreamStep::Fail(cause) => {
                        return Some((Err(ProviderError::new(backend, cause)), None));
                    }
                },
                Some(Err(e)) => {
                    let cause = ProviderFailure::from_reqwest(&e);
                    return Some((Err(ProviderError::new(backend, cause)), None));
                }
                None => {
                    return Some((
                        Err(ProviderError::new(backend, ProviderFailure::Interrupted)),
                        None,
                    ));
                }
            }
        }
    })
    .boxed()
}
