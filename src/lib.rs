//! commentary-gateway: AI commentary behind a dual-backend gateway
//!
//! Features:
//! - Buffered JSON or streamed plain-text responses
//! - OpenAI and xAI backends with cross-backend fallback
//! - Provider keys loaded from a JSON secret blob, never exposed to clients

pub mod api;
pub mod backends;
pub mod config;
pub mod instructions;
pub mod proxy;
pub mod secrets;
pub mod stats;

pub use config::AppConfig;
pub use proxy::{build_router, run_server, GatewayState};
