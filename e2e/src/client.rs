//! HTTP client that simulates how the browser extension talks to the gateway

use futures::StreamExt;
use reqwest::Client;

use crate::types::{GatewayResponse, StreamResponse};

/// Build an HTTP client (no connection pooling for test isolation)
pub fn build_client() -> Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .pool_max_idle_per_host(0)
        .build()
        .expect("Failed to build reqwest client")
}

/// POST a raw body to the buffered gateway and parse the JSON reply
pub async fn send_comment_raw(
    client: &Client,
    gateway_addr: &str,
    body: impl Into<String>,
) -> anyhow::Result<GatewayResponse> {
    let url = format!("http://{gateway_addr}/");

    let resp = client
        .post(&url)
        .header("Content-Type", "application/json")
        .body(body.into())
        .send()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to send request to gateway: {}", e))?;

    let status = resp.status().as_u16();
    let body_text = resp
        .text()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read gateway response: {}", e))?;

    let body: serde_json::Value = serde_json::from_str(&body_text).map_err(|e| {
        let preview: String = body_text.chars().take(500).collect();
        anyhow::anyhow!("Gateway response is not valid JSON: {}: {}", e, preview)
    })?;

    Ok(GatewayResponse { status, body })
}

/// POST a JSON body to the buffered gateway
pub async fn send_comment(
    client: &Client,
    gateway_addr: &str,
    request_body: serde_json::Value,
) -> anyhow::Result<GatewayResponse> {
    send_comment_raw(client, gateway_addr, request_body.to_string()).await
}

/// POST to the streaming gateway and collect the body chunk by chunk
///
/// A body that ends with a read error is reported as `aborted` rather than
/// failing the call, so tests can check truncation.
pub async fn send_stream(
    client: &Client,
    gateway_addr: &str,
    body: impl Into<String>,
) -> anyhow::Result<StreamResponse> {
    let url = format!("http://{gateway_addr}/stream");

    let resp = client
        .post(&url)
        .header("Content-Type", "application/json")
        .body(body.into())
        .send()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to send streaming request to gateway: {}", e))?;

    let status = resp.status().as_u16();
    let content_type = resp
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let mut stream = resp.bytes_stream();
    let mut chunks = Vec::new();
    let mut aborted = false;

    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(bytes) => chunks.push(String::from_utf8_lossy(&bytes).to_string()),
            Err(_) => {
                aborted = true;
                break;
            }
        }
    }

    Ok(StreamResponse {
        status,
        content_type,
        chunks,
        aborted,
    })
}

/// Send a request with an arbitrary method, returning status and body text
pub async fn send_method(
    client: &Client,
    gateway_addr: &str,
    method: reqwest::Method,
    path: &str,
) -> anyhow::Result<(u16, String)> {
    let url = format!("http://{gateway_addr}{path}");

    let resp = client
        .request(method.clone(), &url)
        .send()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to {} {}: {}", method, url, e))?;

    let status = resp.status().as_u16();
    let body_text = resp.text().await.unwrap_or_default();

    Ok((status, body_text))
}
