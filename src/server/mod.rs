//! Server module for the Pathprobe echo responder

pub mod config;
pub mod monitor;
pub mod responder;

pub use config::ServerConfig;
pub use monitor::{ServerCounters, ServerMonitor, ServerStats};
pub use responder::EchoResponder;
