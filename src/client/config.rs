use crate::client::error::{ClientError, Result};
use crate::client::logging::{is_valid_log_level, VALID_LOG_LEVELS};
use crate::protocol::HeaderLayout;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

#[derive(Parser, Debug, Clone)]
#[command(name = "pathprobe-client")]
#[command(about = "Measure UDP loss, latency and jitter against an echo server")]
pub struct Config {
    /// Server host name or address
    #[arg(long, default_value = "localhost")]
    pub host: String,

    /// Server UDP port
    #[arg(long, default_value_t = 9999)]
    pub port: u16,

    /// Total datagram size in bytes, header included
    #[arg(long, default_value_t = 128)]
    pub packet_size: usize,

    /// Packets per second
    #[arg(long, default_value_t = 64)]
    pub rate: u32,

    /// Test duration in seconds
    #[arg(long, default_value_t = 30)]
    pub duration: u64,

    /// Send packets in back-to-back bursts instead of a steady stream
    #[arg(long)]
    pub burst: bool,

    /// Packets per burst (with --burst)
    #[arg(long, default_value_t = 10)]
    pub burst_size: u32,

    /// Round trips above this many milliseconds are counted as late
    #[arg(long, default_value_t = 100.0)]
    pub late_threshold: f64,

    /// Disable the late-packet check
    #[arg(long)]
    pub no_late: bool,

    /// Reserve header room for the server to stamp its processing time
    #[arg(long)]
    pub server_timing: bool,

    /// CSV output file (defaults to a timestamped name)
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Skip HTML report generation and browser launch
    #[arg(long)]
    pub no_plot: bool,

    /// Hide the live progress bar
    #[arg(long)]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    pub log_level: String,

    /// Log format (text or json)
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub log_format: String,
}

impl Config {
    /// Remote address in `host:port` form
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn header_layout(&self) -> HeaderLayout {
        HeaderLayout::from_server_timing(self.server_timing)
    }

    /// Late threshold in milliseconds, `None` when the check is disabled
    pub fn late_threshold_ms(&self) -> Option<f64> {
        if self.no_late {
            None
        } else {
            Some(self.late_threshold)
        }
    }

    pub fn test_duration(&self) -> Duration {
        Duration::from_secs(self.duration)
    }

    pub fn is_json_format(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }

    /// Validates the configuration values
    pub fn validate(&self) -> Result<()> {
        debug!("Validating configuration");
        let header = self.header_layout().header_size();
        if self.packet_size < header {
            return Err(ClientError::Config(format!(
                "packet-size must be at least {} bytes",
                header
            )));
        }
        if self.rate == 0 {
            return Err(ClientError::Config("rate must be > 0".into()));
        }
        if self.duration == 0 {
            return Err(ClientError::Config("duration must be > 0".into()));
        }
        if self.burst {
            if self.burst_size == 0 {
                return Err(ClientError::Config("burst-size must be > 0".into()));
            }
            if self.burst_size > self.rate {
                return Err(ClientError::Config(
                    "burst-size must not exceed rate".into(),
                ));
            }
        }
        if !self.no_late && (self.late_threshold.is_nan() || self.late_threshold < 0.0) {
            return Err(ClientError::Config(
                "late-threshold must be a non-negative number".into(),
            ));
        }
        if !is_valid_log_level(&self.log_level) {
            return Err(ClientError::Config(format!(
                "log-level must be one of: {}",
                VALID_LOG_LEVELS.join(", ")
            )));
        }
        debug!("Configuration validated successfully");
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 9999,
            packet_size: 128,
            rate: 64,
            duration: 30,
            burst: false,
            burst_size: 10,
            late_threshold: 100.0,
            no_late: false,
            server_timing: false,
            output: None,
            no_plot: false,
            quiet: false,
            log_level: "warn".to_string(),
            log_format: "text".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server_address(), "localhost:9999");
        assert_eq!(config.late_threshold_ms(), Some(100.0));
        assert_eq!(config.header_layout(), HeaderLayout::Basic);
    }

    #[test]
    fn test_cli_parsing() {
        let config = Config::try_parse_from([
            "client",
            "--host",
            "10.0.0.2",
            "--rate",
            "200",
            "--burst",
            "--burst-size",
            "20",
            "--server-timing",
            "--no-late",
        ])
        .unwrap();
        assert_eq!(config.server_address(), "10.0.0.2:9999");
        assert_eq!(config.rate, 200);
        assert!(config.burst);
        assert_eq!(config.header_layout(), HeaderLayout::Extended);
        assert_eq!(config.late_threshold_ms(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_packet_size_below_header() {
        let config = Config {
            packet_size: 15,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            packet_size: 16,
            server_timing: true,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_rate_and_duration() {
        assert!(Config {
            rate: 0,
            ..Config::default()
        }
        .validate()
        .is_err());
        assert!(Config {
            duration: 0,
            ..Config::default()
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_invalid_burst_size() {
        let config = Config {
            burst: true,
            burst_size: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            burst: true,
            burst_size: 100,
            rate: 64,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_late_threshold() {
        let config = Config {
            late_threshold: f64::NAN,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            late_threshold: -1.0,
            no_late: true,
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_log_level() {
        let config = Config {
            log_level: "loud".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
