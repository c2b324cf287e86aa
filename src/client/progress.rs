use crate::client::constants::PROGRESS_TICK_INTERVAL_MS;
use crate::client::error::{ClientError, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Time-based progress bar for a fixed-duration test.
///
/// Window report lines are printed through the bar so the bar redraws
/// below them instead of being torn apart.
pub struct ProgressTracker {
    pb: ProgressBar,
}

impl ProgressTracker {
    /// Create a tracker for a test of `duration`; hidden when `quiet`
    pub fn new(duration: Duration, quiet: bool) -> Result<Self> {
        if quiet {
            return Ok(Self {
                pb: ProgressBar::hidden(),
            });
        }

        let pb = ProgressBar::new(duration.as_secs().max(1));
        pb.set_style(
            ProgressStyle::with_template(
                "{msg}\n{bar:40.cyan/blue} {pos:>4}/{len:4}s [{elapsed_precise}]",
            )
            .map_err(|e| ClientError::Report(format!("Failed to create progress style: {}", e)))?
            .progress_chars("█░"),
        );
        pb.enable_steady_tick(Duration::from_millis(PROGRESS_TICK_INTERVAL_MS));
        Ok(Self { pb })
    }

    /// Advance to `elapsed` and show live totals
    pub fn update(&self, elapsed: Duration, sent: u64, received: u64) {
        self.pb.set_position(elapsed.as_secs().min(self.pb.length().unwrap_or(u64::MAX)));
        self.pb
            .set_message(format!("Sent: {}  Received: {}", sent, received));
    }

    /// Print a line above the bar
    pub fn println(&self, line: &str) {
        if self.pb.is_hidden() {
            println!("{}", line);
        } else {
            self.pb.println(line);
        }
    }

    /// Finish the progress bar, leaving it visible
    pub fn finish(&self) {
        if let Some(len) = self.pb.length() {
            self.pb.set_position(len);
        }
        self.pb.finish();
    }
}
