//! Constants used throughout the client application

use std::time::Duration;

/// Minimum spacing between two window snapshots
pub const WINDOW_REPORT_INTERVAL: Duration = Duration::from_secs(5);

/// How often the sender checks whether a window report is due
pub const STATS_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// Window jitter above this many milliseconds is flagged as a spike
pub const SPIKE_JITTER_THRESHOLD_MS: f64 = 10.0;

/// Time allowed for in-flight echoes after the last send
pub const GRACE_PERIOD: Duration = Duration::from_millis(500);

/// Receiver read timeout, bounds how long cancellation goes unnoticed
pub const RECV_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Largest datagram the receiver will read
pub const MAX_DATAGRAM_SIZE: usize = 65_535;

/// Progress bar tick interval in milliseconds
pub const PROGRESS_TICK_INTERVAL_MS: u64 = 100;

/// Width of a latency distribution bucket in milliseconds
pub const DISTRIBUTION_BUCKET_MS: f64 = 10.0;

/// Number of latency distribution buckets before the overflow row
pub const DISTRIBUTION_BUCKETS: usize = 10;

/// Latency above this is drawn in red in the plot
pub const PLOT_SLOW_LATENCY_MS: f64 = 50.0;

/// Bucket width for the throughput-over-time series
pub const THROUGHPUT_BUCKET_MS: i64 = 500;

/// Smallest loss-over-time window, in packets
pub const MIN_LOSS_WINDOW: usize = 10;
