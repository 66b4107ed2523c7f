//! xAI adapter (chat completions)

use async_trait::async_trait;
use futures::StreamExt;

use super::node::ProviderNode;
use super::sse::{fragment_stream, sse_events, SseEvent, StreamStep};
use super::{BackendId, FragmentStream, ProviderError, ProviderFailure, TextBackend};
use crate::api::xai::{ChatCompletionRequest, ChatCompletionResponse, StreamChunk};
use crate::config::ProviderConfig;

pub struct XaiBackend {
    node: ProviderNode,
}

impl XaiBackend {
    pub fn new(config: &ProviderConfig, api_key: String, http_client: reqwest::Client) -> Self {
        Self {
            node: ProviderNode::new(BackendId::Xai, config, api_key, http_client),
        }
    }
}

/// Interpret one `data:` line of a chat completion stream
fn classify_chunk(event: &SseEvent) -> StreamStep {
    if event.data == "[DONE]" {
        return StreamStep::Done;
    }

    let chunk: StreamChunk = match serde_json::from_str(&event.data) {
        Ok(chunk) => chunk,
        Err(e) => {
            tracing::debug!(error = %e, data = %event.data, "Unparseable xAI stream chunk");
            return StreamStep::Skip;
        }
    };

    if let Some(ref error) = chunk.error {
        return StreamStep::Fail(ProviderFailure::Reported(error.message.clone()));
    }

    match chunk.delta_text() {
        Some(text) => StreamStep::Text(text.to_string()),
        None => StreamStep::Skip,
    }
}

#[async_trait]
impl TextBackend for XaiBackend {
    fn id(&self) -> BackendId {
        BackendId::Xai
    }

    async fn generate_complete(
        &self,
        prompt: &str,
        instruction: Option<&str>,
    ) -> Result<String, ProviderError> {
        let body = ChatCompletionRequest::new(&self.node.model, prompt, instruction, false);
        let response = self.node.post_json("/chat/completions", &body, false).await?;

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| self.node.error(ProviderFailure::from_reqwest(&e)))?;

        match parsed.first_text() {
            Some(text) if !text.trim().is_empty() => Ok(text.to_string()),
            _ => {
                tracing::warn!(choices = parsed.choices.len(), "xAI response contained no text");
                Err(self.node.error(ProviderFailure::Empty))
            }
        }
    }

    async fn generate_stream(
        &self,
        prompt: &str,
        instruction: Option<&str>,
    ) -> Result<FragmentStream, ProviderError> {
        let body = ChatCompletionRequest::new(&self.node.model, prompt, instruction, true);
        let response = self.node.post_json("/chat/completions", &body, true).await?;

        let events = sse_events(response.bytes_stream().boxed());
        Ok(fragment_stream(BackendId::Xai, events, classify_chunk))
    }
}
