//! Test doubles: a scripted in-memory backend and an HTTP mock provider

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::Response;
use axum::Router;
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::{BackendId, FragmentStream, ProviderError, ProviderFailure, TextBackend};

/// How a [`ScriptedBackend`] behaves when asked to stream
#[derive(Debug, Clone)]
pub enum StreamScript {
    /// Yield these fragments, then end normally
    Fragments(Vec<String>),
    /// Yield these fragments, then fail
    FailAfter(Vec<String>, ProviderFailure),
    /// Refuse to open the stream
    OpenFails(ProviderFailure),
    /// Yield these fragments, then never produce anything again
    Stall(Vec<String>),
    /// Yield numbered fragments forever
    Endless,
}

/// In-memory backend whose answers are fixed up front
pub struct ScriptedBackend {
    id: BackendId,
    complete: Result<String, ProviderFailure>,
    stream: StreamScript,
    pub complete_calls: AtomicUsize,
    pub stream_calls: AtomicUsize,
    /// Fragments handed out across all streams
    pub pulls: Arc<AtomicUsize>,
    /// Set once the last opened stream has been dropped
    pub released: Arc<AtomicBool>,
}

impl ScriptedBackend {
    pub fn new(id: BackendId, complete: Result<String, ProviderFailure>, stream: StreamScript) -> Self {
        Self {
            id,
            complete,
            stream,
            complete_calls: AtomicUsize::new(0),
            stream_calls: AtomicUsize::new(0),
            pulls: Arc::new(AtomicUsize::new(0)),
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Answers `text`, streamed word by word
    pub fn replying(id: BackendId, text: &str) -> Self {
        let fragments = text.split_inclusive(' ').map(str::to_string).collect();
        Self::new(id, Ok(text.to_string()), StreamScript::Fragments(fragments))
    }

    /// Fails every call with `failure`
    pub fn failing(id: BackendId, failure: ProviderFailure) -> Self {
        Self::new(id, Err(failure.clone()), StreamScript::OpenFails(failure))
    }

    pub fn with_stream(mut self, stream: StreamScript) -> Self {
        self.stream = stream;
        self
    }

    pub fn complete_calls(&self) -> usize {
        self.complete_calls.load(Ordering::SeqCst)
    }

    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }

    pub fn pulls(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

struct ReleaseGuard(Arc<AtomicBool>);

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

enum Step {
    Text(String),
    Fail(ProviderFailure),
    Stall,
}

#[async_trait]
impl TextBackend for ScriptedBackend {
    fn id(&self) -> BackendId {
        self.id
    }

    async fn generate_complete(
        &self,
        _prompt: &str,
        _instruction: Option<&str>,
    ) -> Result<String, ProviderError> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        self.complete
            .clone()
            .map_err(|cause| ProviderError::new(self.id, cause))
    }

    async fn generate_stream(
        &self,
        _prompt: &str,
        _instruction: Option<&str>,
    ) -> Result<FragmentStream, ProviderError> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);

        let steps: Box<dyn Iterator<Item = Step> + Send> = match self.stream.clone() {
            StreamScript::OpenFails(cause) => return Err(ProviderError::new(self.id, cause)),
            StreamScript::Fragments(fragments) => Box::new(fragments.into_iter().map(Step::Text)),
            StreamScript::FailAfter(fragments, cause) => Box::new(
                fragments
                    .into_iter()
                    .map(Step::Text)
                    .chain(std::iter::once(Step::Fail(cause))),
            ),
            StreamScript::Stall(fragments) => Box::new(
                fragments
                    .into_iter()
                    .map(Step::Text)
                    .chain(std::iter::once(Step::Stall)),
            ),
            StreamScript::Endless => Box::new((0..).map(|i| Step::Text(format!("tick{} ", i)))),
        };

        self.released.store(false, Ordering::SeqCst);
        let guard = ReleaseGuard(self.released.clone());
        let pulls = self.pulls.clone();
        let id = self.id;

        let stream = stream::unfold((steps, guard), move |(mut steps, guard)| {
            let pulls = pulls.clone();
            async move {
                match steps.next()? {
                    Step::Text(text) => {
                        pulls.fetch_add(1, Ordering::SeqCst);
                        Some((Ok(text), (steps, guard)))
                    }
                    Step::Fail(cause) => Some((Err(ProviderError::new(id, cause)), (steps, guard))),
                    Step::Stall => {
                        futures::future::pending::<()>().await;
                        None
                    }
                }
            }
        });

        Ok(stream.boxed())
    }
}

/// A request captured by [`MockProvider`]
#[derive(Debug, Clone)]
pub struct ReceivedRequest {
    pub path: String,
    pub authorization: Option<String>,
    pub body: serde_json::Value,
}

enum MockReply {
    Json { status: u16, body: String },
    Sse { body: String },
}

#[derive(Default)]
struct MockState {
    replies: Mutex<VecDeque<MockReply>>,
    received: Mutex<Vec<ReceivedRequest>>,
}

/// HTTP provider stand-in served from a local port
///
/// Replies are queued and handed out in order; an empty queue answers 500.
pub struct MockProvider {
    addr: SocketAddr,
    state: Arc<MockState>,
}

impl MockProvider {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let app = Router::new().fallback(mock_handler).with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock provider");
        let addr = listener.local_addr().expect("mock provider address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self { addr, state }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    pub fn reply_json(&self, status: u16, body: &str) {
        self.push(MockReply::Json {
            status,
            body: body.to_string(),
        });
    }

    /// Queue an event stream with one `data:` line per entry
    pub fn reply_sse(&self, events: &[&str]) {
        let body: String = events.iter().map(|e| format!("data: {}\n\n", e)).collect();
        self.push(MockReply::Sse { body });
    }

    /// Queue an event stream whose connection drops in the middle of an event
    pub fn reply_sse_unterminated(&self, events: &[&str]) {
        let mut body: String = events.iter().map(|e| format!("data: {}\n\n", e)).collect();
        body.push_str("data: {\"choi");
        self.push(MockReply::Sse { body });
    }

    pub fn received(&self) -> Vec<ReceivedRequest> {
        self.state.received.lock().unwrap().clone()
    }

    fn push(&self, reply: MockReply) {
        self.state.replies.lock().unwrap().push_back(reply);
    }
}

async fn mock_handler(
    State(state): State<Arc<MockState>>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.received.lock().unwrap().push(ReceivedRequest {
        path: uri.path().to_string(),
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null),
    });

    let reply = state.replies.lock().unwrap().pop_front();
    let (status, content_type, body) = match reply {
        Some(MockReply::Json { status, body }) => (status, "application/json", body),
        Some(MockReply::Sse { body }) => (200, "text/event-stream", body),
        None => (500, "application/json", r#"{"error":"no reply queued"}"#.to_string()),
    };

    Response::builder()
        .status(StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR))
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .unwrap()
}
