//! OpenAI adapter (Responses API)

use async_trait::async_trait;
use futures::StreamExt;

use super::node::ProviderNode;
use super::sse::{fragment_stream, sse_events, SseEvent, StreamStep};
use super::{BackendId, FragmentStream, ProviderError, ProviderFailure, TextBackend};
use crate::api::openai::{ResponsesRequest, ResponsesResponse, ResponsesStreamEvent};
use crate::config::ProviderConfig;

pub struct OpenAiBackend {
    node: ProviderNode,
}

impl OpenAiBackend {
    pub fn new(config: &ProviderConfig, api_key: String, http_client: reqwest::Client) -> Self {
        Self {
            node: ProviderNode::new(BackendId::OpenAi, config, api_key, http_client),
        }
    }

    fn request<'a>(
        &'a self,
        prompt: &'a str,
        instruction: Option<&'a str>,
        stream: bool,
    ) -> ResponsesRequest<'a> {
        ResponsesRequest {
            model: &self.node.model,
            input: prompt,
            instructions: instruction,
            stream,
        }
    }
}

/// Interpret one event of a Responses API stream
fn classify_event(event: &SseEvent) -> StreamStep {
    let parsed: ResponsesStreamEvent = match serde_json::from_str(&event.data) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::debug!(error = %e, data = %event.data, "Unparseable OpenAI stream event");
            return StreamStep::Skip;
        }
    };

    match parsed.event_type.as_str() {
        ResponsesStreamEvent::TEXT_DELTA => StreamStep::Text(parsed.delta.unwrap_or_default()),
        ResponsesStreamEvent::COMPLETED | ResponsesStreamEvent::INCOMPLETE => StreamStep::Done,
        ResponsesStreamEvent::FAILED | ResponsesStreamEvent::ERROR => {
            StreamStep::Fail(ProviderFailure::Reported(parsed.error_message()))
        }
        _ => StreamStep::Skip,
    }
}

#[async_trait]
impl TextBackend for OpenAiBackend {
    fn id(&self) -> BackendId {
        BackendId::OpenAi
    }

    async fn generate_complete(
        &self,
        prompt: &str,
        instruction: Option<&str>,
    ) -> Result<String, ProviderError> {
        let body = self.request(prompt, instruction, false);
        let response = self.node.post_json("/responses", &body, false).await?;

        let parsed: ResponsesResponse = response
            .json()
            .await
            .map_err(|e| self.node.error(ProviderFailure::from_reqwest(&e)))?;

        if let Some(error) = parsed.error.as_ref() {
            return Err(self.node.error(ProviderFailure::Reported(error.message.clone())));
        }

        let text = parsed.text();
        if text.trim().is_empty() {
            tracing::warn!(status = ?parsed.status, "OpenAI response contained no output text");
            return Err(self.node.error(ProviderFailure::Empty));
        }

        Ok(text)
    }

    async fn generate_stream(
        &self,
        prompt: &str,
        instruction: Option<&str>,
    ) -> Result<FragmentStream, ProviderError> {
        let body = self.request(prompt, instruction, true);
        let response = self.node.post_json("/responses", &body, true).await?;

        let events = sse_events(response.bytes_stream().boxed());
        Ok(fragment_stream(BackendId::OpenAi, events, classify_event))
    }
}
