//! Common test helpers and provider payload builders

use serde_json::{json, Value};

use crate::types::MockResponse;

// ─── Provider response builders ───────────────────────────────────────────────

/// OpenAI Responses API body with a single output_text part
pub fn openai_text_response(text: &str) -> MockResponse {
    MockResponse::json(
        json!({
            "id": "resp_test001",
            "object": "response",
            "status": "completed",
            "model": "gpt-5-nano",
            "output": [{
                "type": "message",
                "id": "msg_test001",
                "role": "assistant",
                "content": [{"type": "output_text", "text": text, "annotations": []}]
            }]
        })
        .to_string(),
    )
}

/// xAI chat completion body
pub fn xai_text_response(text: &str) -> MockResponse {
    MockResponse::json(
        json!({
            "id": "chatcmpl-test001",
            "object": "chat.completion",
            "created": 1700000000,
            "model": "grok-4-1-fast-non-reasoning",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": text},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        })
        .to_string(),
    )
}

/// Rate limit rejection in the shape both providers use
pub fn rate_limited() -> MockResponse {
    MockResponse::error(
        429,
        r#"{"error":{"message":"Rate limit reached","type":"rate_limit_exceeded"}}"#,
    )
}

/// OpenAI stream of text deltas ending with response.completed
pub fn openai_stream(fragments: &[&str]) -> MockResponse {
    let mut events = vec![json!({"type": "response.created", "response": {"status": "in_progress"}}).to_string()];
    events.extend(
        fragments
            .iter()
            .map(|f| json!({"type": "response.output_text.delta", "delta": f}).to_string()),
    );
    events.push(json!({"type": "response.completed", "response": {"status": "completed"}}).to_string());
    MockResponse::sse(&events)
}

/// xAI stream of content deltas, optionally without the closing [DONE]
pub fn xai_stream(fragments: &[&str], terminated: bool) -> MockResponse {
    let mut events = vec![xai_chunk(json!({"role": "assistant"}))];
    events.extend(fragments.iter().map(|f| xai_chunk(json!({"content": f}))));
    if terminated {
        events.push("[DONE]".to_string());
    }
    MockResponse::sse(&events)
}

fn xai_chunk(delta: Value) -> String {
    json!({
        "id": "chatcmpl-test002",
        "object": "chat.completion.chunk",
        "created": 1700000000,
        "model": "grok-4-1-fast-non-reasoning",
        "choices": [{"index": 0, "delta": delta, "finish_reason": null}]
    })
    .to_string()
}

// ─── Assertion helpers ────────────────────────────────────────────────────────

/// Assert two strings are equal, with context on failure
pub fn assert_eq_str(actual: &str, expected: &str, label: &str) -> anyhow::Result<()> {
    if actual != expected {
        Err(anyhow::anyhow!("{label}: expected {:?} but got {:?}", expected, actual))
    } else {
        Ok(())
    }
}

/// Assert an HTTP status, with context on failure
pub fn assert_status(actual: u16, expected: u16, body: &dyn std::fmt::Debug) -> anyhow::Result<()> {
    if actual != expected {
        Err(anyhow::anyhow!("Expected status {expected}, got {actual}: {:?}", body))
    } else {
        Ok(())
    }
}

/// Assert condition is true, with message
pub fn assert_true(cond: bool, msg: &str) -> anyhow::Result<()> {
    if !cond {
        Err(anyhow::anyhow!("{}", msg))
    } else {
        Ok(())
    }
}
