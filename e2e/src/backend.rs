//! Mock provider server that simulates the OpenAI and xAI APIs
//!
//! One server hosts both providers under different path prefixes. Tests
//! pre-configure responses via SharedBackendState before each request.

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::types::{BackendState, MockResponse, Provider, ReceivedRequest, SharedBackendState};

/// Served when a test did not queue anything for a provider
fn default_unqueued_response(provider: Provider) -> MockResponse {
    MockResponse::error(
        500,
        format!(r#"{{"error":{{"message":"no mock response queued for {}"}}}}"#, provider),
    )
}

async fn serve(state: SharedBackendState, provider: Provider, request: Request<Body>) -> Response {
    let path = request.uri().path().to_string();
    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let body_bytes = axum::body::to_bytes(request.into_body(), 10 * 1024 * 1024)
        .await
        .unwrap_or_default();
    let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap_or(serde_json::Value::Null);

    let mock_response = {
        let mut state = state.lock().unwrap();
        state.received_requests.push(ReceivedRequest {
            provider,
            path,
            authorization,
            body,
        });
        state
            .queue_mut(provider)
            .pop_front()
            .unwrap_or_else(|| default_unqueued_response(provider))
    };

    Response::builder()
        .status(mock_response.status)
        .header("Content-Type", &mock_response.content_type)
        .body(Body::from(mock_response.body))
        .unwrap()
        .into_response()
}

/// Handle POST /openai/v1/responses
async fn handle_openai(State(state): State<SharedBackendState>, request: Request<Body>) -> Response {
    serve(state, Provider::OpenAi, request).await
}

/// Handle POST /xai/v1/chat/completions
async fn handle_xai(State(state): State<SharedBackendState>, request: Request<Body>) -> Response {
    serve(state, Provider::Xai, request).await
}

/// Start the mock provider server and return the shared state handle
pub async fn start(port: u16) -> anyhow::Result<SharedBackendState> {
    let state: SharedBackendState = std::sync::Arc::new(std::sync::Mutex::new(BackendState::default()));

    let app = Router::new()
        .route("/openai/v1/responses", post(handle_openai))
        .route("/xai/v1/chat/completions", post(handle_xai))
        .with_state(state.clone());

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind mock providers to {}: {}", addr, e))?;

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Mock provider server failed");
    });

    // Brief pause to let the server start accepting connections
    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

    Ok(state)
}

/// Queue the next response for a provider
pub fn queue_response(state: &SharedBackendState, provider: Provider, response: MockResponse) {
    state.lock().unwrap().queue_mut(provider).push_back(response);
}

/// Get all requests received since last clear
pub fn drain_requests(state: &SharedBackendState) -> Vec<ReceivedRequest> {
    let mut s = state.lock().unwrap();
    s.received_requests.drain(..).collect()
}
