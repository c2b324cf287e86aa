//! Client module for the Pathprobe measurement tool

pub mod aggregator;
pub mod browser;
pub mod config;
pub mod constants;
pub mod error;
pub mod export;
pub mod logging;
pub mod measurement;
pub mod plot;
pub mod progress;
pub mod receiver;
pub mod reporter;
pub mod sender;
pub mod socket;
pub mod statistics;

pub use aggregator::{
    Aggregator, FinalSummary, LatencySummary, PacketRecord, RangeSummary, WindowSnapshot,
};
pub use browser::open_in_browser;
pub use config::Config;
pub use constants::*;
pub use error::{ClientError, Result};
pub use export::{default_output_path, save_csv, write_csv, CsvColumns};
pub use logging::{init_logging, init_logging_with_config};
pub use measurement::{run_measurement, MeasurementPlan, MeasurementResult};
pub use plot::{generate_report, render_report};
pub use progress::ProgressTracker;
pub use receiver::{CancelFlag, Receiver};
pub use reporter::Reporter;
pub use sender::{SendSchedule, Sender};
pub use socket::{NetworkSocket, UdpNetworkSocket};
pub use statistics::{percentile, SampleStats};
