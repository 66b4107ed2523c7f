//! Compact request/response log lines

mod request_log;

pub use request_log::*;
