use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use pathprobe::client::{
    default_output_path, generate_report, init_logging_with_config, open_in_browser,
    run_measurement, save_csv, Aggregator, Config, CsvColumns, MeasurementPlan, ProgressTracker,
    Reporter, SendSchedule, UdpNetworkSocket,
};
use std::sync::Arc;
use tracing::{error, info, warn};

fn main() {
    let config = Config::parse();

    init_logging_with_config(&config.log_level, config.is_json_format());

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(config) {
        error!(error = %e, "Client failed");
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(config: Config) -> Result<()> {
    let address = config.server_address();
    let socket = UdpNetworkSocket::connect_to(&address)
        .with_context(|| format!("Failed to connect to {}", address))?;
    info!(server = %address, local = ?socket.local_addr().ok(), "Socket ready");

    let plan = MeasurementPlan::from_config(&config);
    println!("{}", "Pathprobe UDP Path Quality Test".bold());
    match plan.schedule {
        SendSchedule::Steady { .. } => println!(
            "Server: {}  Rate: {} pps  Size: {} B  Duration: {}s",
            address, config.rate, config.packet_size, config.duration
        ),
        SendSchedule::Burst { size, .. } => println!(
            "Server: {}  Rate: {} pps in bursts of {}  Size: {} B  Duration: {}s",
            address, config.rate, size, config.packet_size, config.duration
        ),
    }
    println!();

    let aggregator = Arc::new(Aggregator::new(config.late_threshold_ms()));
    let progress = ProgressTracker::new(plan.duration, config.quiet)?;

    let result = {
        let counts = Arc::clone(&aggregator);
        run_measurement(
            Arc::new(socket),
            Arc::clone(&aggregator),
            &plan,
            |elapsed, snapshot| {
                if let Some(snapshot) = snapshot {
                    progress.println(&Reporter::colorize_window_line(&snapshot));
                }
                progress.update(elapsed, counts.sent_count(), counts.received_count());
            },
        )?
    };
    progress.finish();

    if result.send_errors > 0 {
        warn!(send_errors = result.send_errors, "Some probes failed to send");
    }

    Reporter.print_summary(&result.summary, &result.latencies_ms());

    let output = config.output.clone().unwrap_or_else(default_output_path);
    let columns = CsvColumns {
        server_timing: config.server_timing,
        late: !config.no_late,
    };
    save_csv(&output, &result.records, columns)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("\nResults saved to {}", output.display());

    if !config.no_plot {
        match generate_report(&output) {
            Ok(report) => {
                println!("Report written to {}", report.display());
                open_in_browser(&report);
            }
            Err(e) => warn!(error = %e, "Failed to generate HTML report"),
        }
    }

    Ok(())
}
