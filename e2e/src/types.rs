//! Shared types for the e2e test framework

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Which mock provider a response or request belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Xai,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::OpenAi => write!(f, "openai"),
            Provider::Xai => write!(f, "xai"),
        }
    }
}

/// A mock response a provider will serve for its next request
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub body: String,
    pub content_type: String,
}

impl MockResponse {
    /// Create a standard JSON response
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            content_type: "application/json".to_string(),
        }
    }

    /// Create an error response
    pub fn error(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            content_type: "application/json".to_string(),
        }
    }

    /// Create an event stream with one `data:` line per entry
    pub fn sse(events: &[String]) -> Self {
        Self {
            status: 200,
            body: events.iter().map(|e| format!("data: {}\n\n", e)).collect(),
            content_type: "text/event-stream".to_string(),
        }
    }
}

/// Shared state for the mock provider server
#[derive(Debug, Default)]
pub struct BackendState {
    /// Responses for the OpenAI endpoint, served in order
    pub openai_queue: VecDeque<MockResponse>,
    /// Responses for the xAI endpoint, served in order
    pub xai_queue: VecDeque<MockResponse>,
    /// All requests received by either provider (for inspection)
    pub received_requests: Vec<ReceivedRequest>,
}

impl BackendState {
    pub fn queue_mut(&mut self, provider: Provider) -> &mut VecDeque<MockResponse> {
        match provider {
            Provider::OpenAi => &mut self.openai_queue,
            Provider::Xai => &mut self.xai_queue,
        }
    }

    pub fn clear(&mut self) {
        self.openai_queue.clear();
        self.xai_queue.clear();
        self.received_requests.clear();
    }
}

/// A request received by a mock provider
#[derive(Debug, Clone)]
pub struct ReceivedRequest {
    pub provider: Provider,
    pub path: String,
    pub authorization: Option<String>,
    pub body: serde_json::Value,
}

pub type SharedBackendState = Arc<Mutex<BackendState>>;

/// Result of a buffered gateway request
#[derive(Debug)]
pub struct GatewayResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl GatewayResponse {
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.body.get(field)?.as_str()
    }
}

/// Result of a streaming gateway request
#[derive(Debug)]
pub struct StreamResponse {
    pub status: u16,
    pub content_type: String,
    /// Body chunks in arrival order
    pub chunks: Vec<String>,
    /// Set when the body ended with a transport error instead of a clean end
    pub aborted: bool,
}

impl StreamResponse {
    pub fn text(&self) -> String {
        self.chunks.concat()
    }

    pub fn json(&self) -> anyhow::Result<serde_json::Value> {
        let text = self.text();
        serde_json::from_str(&text)
            .map_err(|e| anyhow::anyhow!("Body is not JSON: {}: {}", e, text))
    }
}

/// Which gateway instance a test targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayMode {
    Buffered,
    Streaming,
}

impl GatewayMode {
    pub const ALL: [GatewayMode; 2] = [GatewayMode::Buffered, GatewayMode::Streaming];
}

impl std::fmt::Display for GatewayMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayMode::Buffered => write!(f, "buffered"),
            GatewayMode::Streaming => write!(f, "streaming"),
        }
    }
}

/// Outcome of a single test case
#[derive(Debug)]
pub struct TestResult {
    pub name: &'static str,
    pub mode: GatewayMode,
    /// `None` when the test passed
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl TestResult {
    pub fn passed(&self) -> bool {
        self.error.is_none()
    }
}
