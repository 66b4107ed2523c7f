//! HTTP gateway: request handling, backend orchestration and streaming

mod handler;
mod orchestrator;
pub mod server;
mod streaming;

pub use handler::{GatewayError, GatewayHandler, GenerationRequest};
pub use orchestrator::{FailureReason, GenerationResult, Orchestrator};
pub use server::{build_router, run_server, GatewayState};
pub use streaming::{CommittedStream, StreamMultiplexer};
