//! Wire types: the gateway's own envelopes and both provider APIs

pub mod gateway;
pub mod openai;
pub mod xai;

pub use gateway::*;
