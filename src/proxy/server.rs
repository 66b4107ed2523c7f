//! Gateway server: shared state, router and listener

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    routing::any,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handler::GatewayHandler;
use super::orchestrator::Orchestrator;
use super::streaming::StreamMultiplexer;
use crate::backends::BackendPair;
use crate::config::{AppConfig, CorsConfig};
use crate::instructions::InstructionStore;

/// Shared state for the gateway
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<AppConfig>,
    pub orchestrator: Orchestrator,
    pub multiplexer: StreamMultiplexer,
    pub instructions: Arc<dyn InstructionStore>,
}

impl GatewayState {
    pub fn new(
        config: AppConfig,
        backends: BackendPair,
        instructions: Arc<dyn InstructionStore>,
    ) -> Self {
        let fallback = config.fallback.enabled;
        let idle_timeout = Duration::from_secs(config.streaming.idle_timeout_seconds);

        Self {
            orchestrator: Orchestrator::new(backends.clone(), fallback),
            multiplexer: StreamMultiplexer::new(backends, fallback, idle_timeout),
            config: Arc::new(config),
            instructions,
        }
    }
}

/// Cross-origin layer; an empty origin list allows any origin
fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::POST, Method::OPTIONS, Method::GET])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

/// Build the router: every path and method goes to the gateway handler
pub fn build_router(state: GatewayState) -> Router {
    let cors = cors_layer(&state.config.cors);

    Router::new()
        .route("/", any(gateway_handler))
        .route("/*path", any(gateway_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the gateway server
pub async fn run_server(state: GatewayState) -> Result<(), Box<dyn std::error::Error>> {
    let config = state.config.clone();
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("commentary-gateway listening on {}", addr);
    tracing::info!(
        mode = %config.mode,
        default_backend = %config.default_backend,
        fallback = config.fallback.enabled,
        "Serving"
    );

    Ok(axum::serve(listener, app).await?)
}

async fn gateway_handler(
    State(state): State<GatewayState>,
    req: axum::extract::Request,
) -> axum::response::Response {
    let handler = GatewayHandler::new(state);
    handler.handle(req).await
}
