//! Request handling for both serving modes

use axum::{
    body::{to_bytes, Body, Bytes},
    http::{header, Method, Request, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::time::Instant;
use tracing::Instrument;

use super::orchestrator::{FailureReason, GenerationResult};
use super::server::GatewayState;
use crate::api::{CommentRequest, CommentResponse, DetailBody, ErrorBody, StreamRequest};
use crate::backends::BackendId;
use crate::config::ServeMode;
use crate::instructions::InstructionError;
use crate::stats::{format_completion_log, format_request_log};

/// Largest request body accepted
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Message returned for every generation failure; details stay in the logs
const GENERIC_FAILURE: &str = "Failed to generate a response";

/// Errors surfaced at the HTTP boundary
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("generation failed: {0}")]
    Generation(FailureReason),

    #[error("instruction lookup failed: {0}")]
    Instruction(#[from] InstructionError),
}

impl GatewayError {
    fn invalid(message: impl Into<String>) -> Self {
        GatewayError::InvalidInput(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            GatewayError::Generation(_) | GatewayError::Instruction(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to show the client
    fn client_message(&self) -> String {
        match self {
            GatewayError::InvalidInput(message) => message.clone(),
            _ => GENERIC_FAILURE.to_string(),
        }
    }

    /// Render in the error envelope of the given mode
    ///
    /// Buffered mode answers `{"error": ...}`, streaming mode `{"detail": ...}`.
    pub fn into_response_for(self, mode: ServeMode) -> Response {
        let status = self.status();
        let error = self.client_message();
        match mode {
            ServeMode::Buffered => (status, Json(ErrorBody { error })).into_response(),
            ServeMode::Streaming => (status, Json(DetailBody { detail: error })).into_response(),
        }
    }
}

/// A validated generation request
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub instruction: Option<String>,
    pub preferred: BackendId,
}

/// Gateway request handler
pub struct GatewayHandler {
    state: GatewayState,
}

impl GatewayHandler {
    pub fn new(state: GatewayState) -> Self {
        Self { state }
    }

    fn mode(&self) -> ServeMode {
        self.state.config.mode
    }

    /// Handle an incoming request on any path
    pub async fn handle(&self, req: Request<Body>) -> Response {
        let method = req.method().clone();
        tracing::debug!(method = %method, path = %req.uri().path(), mode = %self.mode(), "Processing request");

        match method {
            Method::POST => {}
            Method::OPTIONS | Method::GET | Method::HEAD => return StatusCode::OK.into_response(),
            _ => return StatusCode::METHOD_NOT_ALLOWED.into_response(),
        }

        let request_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("request", request_id = %request_id, mode = %self.mode());

        async move {
            let body = match to_bytes(req.into_body(), MAX_BODY_BYTES).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read request body");
                    return GatewayError::invalid("Failed to read request body")
                        .into_response_for(self.mode());
                }
            };

            let result = match self.mode() {
                ServeMode::Buffered => self.handle_buffered(&body).await,
                ServeMode::Streaming => self.handle_streaming(&body).await,
            };

            result.unwrap_or_else(|e| {
                match e {
                    GatewayError::InvalidInput(ref message) => {
                        tracing::info!(reason = %message, "Rejected request")
                    }
                    ref other => tracing::error!(error = %other, "Request failed"),
                }
                e.into_response_for(self.mode())
            })
        }
        .instrument(span)
        .await
    }

    /// One backend call (with fallback), one JSON response
    async fn handle_buffered(&self, body: &Bytes) -> Result<Response, GatewayError> {
        let request = self.parse_buffered(body)?;
        tracing::info!(
            "{}",
            format_request_log(
                ServeMode::Buffered,
                request.preferred,
                &request.prompt,
                request.instruction.as_deref()
            )
        );

        let start = Instant::now();
        let result = self
            .state
            .orchestrator
            .generate(&request.prompt, request.instruction.as_deref(), request.preferred)
            .await;

        match result {
            GenerationResult::Success { text, backend } => {
                tracing::info!(
                    "{}",
                    format_completion_log(backend, text.chars().count(), start.elapsed().as_millis())
                );
                Ok(Json(CommentResponse { output_text: text }).into_response())
            }
            GenerationResult::Failure { reason } => Err(GatewayError::Generation(reason)),
        }
    }

    /// Stream fragments from the first backend that produces one
    async fn handle_streaming(&self, body: &Bytes) -> Result<Response, GatewayError> {
        let request = self.parse_streaming(body).await?;
        tracing::info!(
            "{}",
            format_request_log(
                ServeMode::Streaming,
                request.preferred,
                &request.prompt,
                request.instruction.as_deref()
            )
        );

        let committed = self
            .state
            .multiplexer
            .open(&request.prompt, request.instruction.as_deref(), request.preferred)
            .await
            .map_err(GatewayError::Generation)?;

        tracing::debug!(backend = %committed.backend, "Committing streaming response");

        Ok(Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .header(header::CACHE_CONTROL, "no-cache")
            .body(Body::from_stream(committed.into_body_stream()))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()))
    }

    fn parse_buffered(&self, body: &[u8]) -> Result<GenerationRequest, GatewayError> {
        let request: CommentRequest =
            serde_json::from_slice(body).map_err(|_| GatewayError::invalid("Invalid JSON body"))?;

        let prompt = required_text(request.input.as_deref())
            .ok_or_else(|| GatewayError::invalid("'input' is required"))?;

        Ok(GenerationRequest {
            prompt,
            instruction: optional_text(request.instruction.as_deref()),
            preferred: self.preferred_backend(request.api.as_deref())?,
        })
    }

    async fn parse_streaming(&self, body: &[u8]) -> Result<GenerationRequest, GatewayError> {
        let request: StreamRequest =
            serde_json::from_slice(body).map_err(|_| GatewayError::invalid("Invalid JSON body"))?;
        let preferred = self.preferred_backend(request.api.as_deref())?;

        if let Some(item) = request.item {
            if item.name.trim().is_empty() {
                return Err(GatewayError::invalid("'item.name' is required"));
            }
            let key = self
                .state
                .config
                .instructions
                .work_item_key
                .clone()
                .ok_or_else(|| GatewayError::invalid("Work items are not enabled"))?;
            let instruction = self.state.instructions.require(&key).await?;

            return Ok(GenerationRequest {
                prompt: item.to_prompt(),
                instruction: Some(instruction),
                preferred,
            });
        }

        let prompt = required_text(request.request.as_deref())
            .ok_or_else(|| GatewayError::invalid("'request' is required"))?;

        Ok(GenerationRequest {
            prompt,
            instruction: optional_text(request.instructions.as_deref()),
            preferred,
        })
    }

    fn preferred_backend(&self, api: Option<&str>) -> Result<BackendId, GatewayError> {
        match api {
            None => Ok(self.state.config.default_backend),
            Some(name) => name
                .parse()
                .map_err(|_| GatewayError::invalid("'api' must be one of: openai, xai")),
        }
    }
}

/// Trimmed text, or `None` if missing or blank
fn required_text(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

/// Instructions are passed through untrimmed unless blank
fn optional_text(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty()).map(str::to_string)
}
