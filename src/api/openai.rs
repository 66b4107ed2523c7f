//! OpenAI Responses API type definitions

use serde::{Deserialize, Serialize};

/// `POST /responses` request body
#[derive(Debug, Clone, Serialize)]
pub struct ResponsesRequest<'a> {
    pub model: &'a str,
    pub input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<&'a str>,
    pub stream: bool,
}

/// Response object (non-streaming body, and the `response` field of lifecycle events)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponsesResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub output: Vec<OutputItem>,
    /// Full output text, when the body carries it at the top level
    #[serde(default)]
    pub output_text: Option<String>,
    #[serde(default)]
    pub error: Option<ResponsesError>,
}

impl ResponsesResponse {
    /// Concatenate every `output_text` content part across message items
    pub fn text(&self) -> String {
        if let Some(ref text) = self.output_text {
            return text.clone();
        }

        self.output
            .iter()
            .filter(|item| item.item_type == "message")
            .flat_map(|item| item.content.iter())
            .filter(|part| part.content_type == "output_text")
            .filter_map(|part| part.text.as_deref())
            .collect()
    }
}

/// Output item (messages, reasoning, tool calls...)
#[derive(Debug, Clone, Deserialize)]
pub struct OutputItem {
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(default)]
    pub content: Vec<OutputContent>,
}

/// Content part of a message item
#[derive(Debug, Clone, Deserialize)]
pub struct OutputContent {
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(default)]
    pub text: Option<String>,
}

/// Error object
#[derive(Debug, Clone, Deserialize)]
pub struct ResponsesError {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}

/// A server-sent event from a streaming response
#[derive(Debug, Clone, Deserialize)]
pub struct ResponsesStreamEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub delta: Option<String>,
    #[serde(default)]
    pub response: Option<ResponsesResponse>,
    /// Set on top-level `error` events
    #[serde(default)]
    pub message: Option<String>,
}

impl ResponsesStreamEvent {
    pub const TEXT_DELTA: &'static str = "response.output_text.delta";
    pub const COMPLETED: &'static str = "response.completed";
    pub const INCOMPLETE: &'static str = "response.incomplete";
    pub const FAILED: &'static str = "response.failed";
    pub const ERROR: &'static str = "error";

    /// Best available error message for failure events
    pub fn error_message(&self) -> String {
        self.message
            .clone()
            .or_else(|| {
                self.response
                    .as_ref()
                    .and_then(|r| r.error.as_ref())
                    .map(|e| e.message.clone())
            })
            .unwrap_or_else(|| self.event_type.clone())
    }
}
