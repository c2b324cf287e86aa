//! Server configuration module
//!
//! Provides CLI argument parsing and validation for the Pathprobe echo server.

use crate::client::logging::{is_valid_log_level, VALID_LOG_LEVELS};
use clap::Parser;
use tracing::debug;

#[derive(Parser, Debug, Clone)]
#[command(name = "pathprobe-server")]
#[command(about = "UDP echo responder for path quality measurements")]
pub struct ServerConfig {
    /// Bind address
    #[arg(long, default_value = "0.0.0.0")]
    pub bind: String,

    /// UDP port
    #[arg(long, default_value_t = 9999)]
    pub port: u16,

    /// Echo datagrams untouched instead of stamping processing time
    #[arg(long)]
    pub no_stamp: bool,

    /// Status line update interval in milliseconds
    #[arg(long, default_value_t = 500)]
    pub update_interval: u64,

    /// Disable the status line (useful for Docker/systemd/non-interactive environments)
    #[arg(long)]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Log format (text or json)
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub log_format: String,
}

impl ServerConfig {
    /// Returns the full bind address as a string (bind:port)
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn stamp_enabled(&self) -> bool {
        !self.no_stamp
    }

    /// Validates the configuration values
    pub fn validate(&self) -> Result<(), String> {
        debug!("Validating server configuration");

        if self.port == 0 {
            return Err("port must be > 0".into());
        }

        if self.update_interval == 0 {
            return Err("update_interval must be > 0".into());
        }

        if !is_valid_log_level(&self.log_level) {
            return Err(format!(
                "log_level must be one of: {}",
                VALID_LOG_LEVELS.join(", ")
            ));
        }

        Ok(())
    }

    /// Returns true if JSON format logging is enabled
    pub fn is_json_format(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}
