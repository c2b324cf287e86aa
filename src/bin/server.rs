use anyhow::Result;
use clap::Parser;
use pathprobe::client::init_logging_with_config;
use pathprobe::server::{EchoResponder, ServerConfig, ServerMonitor};
use tracing::{error, info};

fn main() {
    let config = ServerConfig::parse();

    init_logging_with_config(&config.log_level, config.is_json_format());

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(config) {
        error!(error = %e, "Server failed");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(config: ServerConfig) -> Result<()> {
    let addr = config.address();

    let monitor = ServerMonitor::new(config.update_interval);
    let mut responder = EchoResponder::bind(&addr, config.stamp_enabled(), monitor.counters())?;

    info!(
        address = %responder.local_addr()?,
        stamping = config.stamp_enabled(),
        update_interval_ms = config.update_interval,
        quiet_mode = config.quiet,
        "Pathprobe UDP echo server listening"
    );

    if !config.quiet {
        monitor.start_display();
    } else {
        info!("Running in quiet mode (status line disabled)");
    }

    responder.serve_forever()
}
