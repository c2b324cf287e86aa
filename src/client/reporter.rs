use crate::client::aggregator::{FinalSummary, LatencySummary, WindowSnapshot};
use crate::client::constants::{DISTRIBUTION_BUCKETS, DISTRIBUTION_BUCKET_MS};
use colored::*;
use tracing::info;

/// Console rendering of window snapshots and the final summary
pub struct Reporter;

const HISTOGRAM_BAR_WIDTH: usize = 30;
const LABEL_WIDTH: usize = 12;

impl Reporter {
    /// One-line window report, e.g.
    /// `[5s] Win Loss: 0.0%  Late: 0  RTT: 12/15/21ms  Jitter: 2ms  Net: 15ms  Srv: 0ms`
    pub fn format_window_line(snapshot: &WindowSnapshot) -> String {
        let spike = if snapshot.spike { "  << spike" } else { "" };
        format!(
            "[{}s] Win Loss: {:.1}%  Late: {}  RTT: {:.0}/{:.0}/{:.0}ms  Jitter: {:.0}ms  Net: {:.0}ms  Srv: {:.0}ms{}",
            snapshot.elapsed.as_secs(),
            snapshot.loss_percent(),
            snapshot.late,
            snapshot.latency.min,
            snapshot.latency.avg,
            snapshot.latency.max,
            snapshot.latency.jitter,
            snapshot.avg_net_ms,
            snapshot.avg_server_ms,
            spike
        )
    }

    /// Window line with the spike marker highlighted
    pub fn colorize_window_line(snapshot: &WindowSnapshot) -> String {
        let line = Self::format_window_line(snapshot);
        if snapshot.spike {
            line.yellow().to_string()
        } else {
            line
        }
    }

    /// Plain-text summary lines
    pub fn summary_lines(summary: &FinalSummary) -> Vec<String> {
        let mut lines = vec![format!(
            "Packets: {} sent, {} received, {} lost ({:.2}%), {} late ({:.2}%)",
            summary.sent,
            summary.received,
            summary.lost,
            summary.loss_percent(),
            summary.late,
            summary.late_percent()
        )];

        lines.push(match summary.late_threshold_ms {
            Some(t) => format!("Late threshold: {:.0}ms", t),
            None => "Late threshold: disabled".to_string(),
        });

        match &summary.latency {
            Some(rtt) => {
                lines.push(Self::latency_line("RTT", rtt));
                lines.push(format!("Jitter: {:.0}ms average", rtt.jitter));
            }
            None => lines.push("RTT: no data (all packets lost)".to_string()),
        }

        if let Some(net) = &summary.net_latency {
            lines.push(Self::latency_line("Net+Client", net));
        }

        lines.push(match &summary.server_proc {
            Some(s) => format!(
                "Server proc: min={:.0}ms avg={:.0}ms max={:.0}ms",
                s.min, s.avg, s.max
            ),
            None => "Server proc: no data".to_string(),
        });
        lines
    }

    fn latency_line(label: &str, l: &LatencySummary) -> String {
        format!(
            "{}: min={:.0}ms avg={:.0}ms max={:.0}ms p50={:.0}ms p90={:.0}ms p99={:.0}ms",
            label, l.min, l.avg, l.max, l.p50, l.p90, l.p99
        )
    }

    /// Print the final summary and latency distribution
    pub fn print_summary(&self, summary: &FinalSummary, latencies_ms: &[f64]) {
        println!("\n{}", "--- Summary ---".cyan().bold());
        for line in Self::summary_lines(summary) {
            if line.contains("no data") {
                println!("{}", line.red());
            } else {
                println!("{}", line);
            }
        }

        if !latencies_ms.is_empty() {
            println!();
            self.print_distribution(latencies_ms);
        }

        info!(
            sent = summary.sent,
            received = summary.received,
            lost = summary.lost,
            loss_percent = summary.loss_percent(),
            "Results reported"
        );
    }

    /// Count latencies into fixed-width buckets plus a final overflow bucket
    pub fn bucket_counts(latencies_ms: &[f64]) -> Vec<usize> {
        let mut counts = vec![0usize; DISTRIBUTION_BUCKETS + 1];
        for &latency in latencies_ms {
            let idx = ((latency.max(0.0) / DISTRIBUTION_BUCKET_MS) as usize).min(DISTRIBUTION_BUCKETS);
            counts[idx] += 1;
        }
        counts
    }

    fn bucket_label(idx: usize) -> String {
        let lo = idx as f64 * DISTRIBUTION_BUCKET_MS;
        if idx == DISTRIBUTION_BUCKETS {
            format!(">={:.0} ms", lo)
        } else {
            format!("{:.0}-{:.0} ms", lo, lo + DISTRIBUTION_BUCKET_MS)
        }
    }

    /// Scale a bar to the largest bucket; non-empty buckets always get a sliver
    fn render_bar(count: usize, max_count: usize) -> String {
        if count == 0 || max_count == 0 {
            return String::new();
        }
        let len = count * HISTOGRAM_BAR_WIDTH / max_count;
        if len == 0 {
            "▏".to_string()
        } else {
            "█".repeat(len)
        }
    }

    pub fn print_distribution(&self, latencies_ms: &[f64]) {
        println!("Latency Distribution (packet count by range):");
        let counts = Self::bucket_counts(latencies_ms);
        let max_count = counts.iter().copied().max().unwrap_or(0);
        let total = latencies_ms.len();

        for (idx, &count) in counts.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let percentage = count as f64 / total as f64 * 100.0;
            let label = format!("{:>width$}", Self::bucket_label(idx), width = LABEL_WIDTH);
            let label = if idx == DISTRIBUTION_BUCKETS {
                label.red().bold()
            } else if percentage > 50.0 {
                label.green()
            } else {
                label.normal()
            };
            println!(
                "  {}:  {:30} {:5.1}% ({:>7} packets)",
                label,
                Self::render_bar(count, max_count),
                percentage,
                count
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::aggregator::RangeSummary;
    use crate::client::statistics::SampleStats;
    use std::time::Duration;

    fn summary_without_data() -> FinalSummary {
        FinalSummary {
            sent: 10,
            received: 0,
            lost: 10,
            late: 0,
            late_threshold_ms: Some(100.0),
            latency: None,
            net_latency: None,
            server_proc: None,
        }
    }

    #[test]
    fn test_window_line() {
        let snapshot = WindowSnapshot {
            elapsed: Duration::from_millis(10_400),
            sent: 320,
            received: 317,
            late: 2,
            latency: SampleStats {
                min: 11.2,
                avg: 15.0,
                max: 120.6,
                jitter: 12.4,
            },
            avg_net_ms: 14.0,
            avg_server_ms: 1.0,
            spike: true,
        };
        assert_eq!(
            Reporter::format_window_line(&snapshot),
            "[10s] Win Loss: 0.9%  Late: 2  RTT: 11/15/121ms  Jitter: 12ms  Net: 14ms  Srv: 1ms  << spike"
        );
    }

    #[test]
    fn test_summary_lines_no_data() {
        let lines = Reporter::summary_lines(&summary_without_data());
        assert_eq!(
            lines[0],
            "Packets: 10 sent, 0 received, 10 lost (100.00%), 0 late (0.00%)"
        );
        assert!(lines.contains(&"RTT: no data (all packets lost)".to_string()));
        assert!(lines.contains(&"Server proc: no data".to_string()));
    }

    #[test]
    fn test_summary_lines_with_data() {
        let rtt = LatencySummary {
            min: 10.0,
            avg: 30.0,
            max: 50.0,
            jitter: 12.0,
            p50: 30.0,
            p90: 46.0,
            p99: 49.6,
        };
        let summary = FinalSummary {
            sent: 5,
            received: 5,
            lost: 0,
            late: 0,
            late_threshold_ms: None,
            latency: Some(rtt),
            net_latency: Some(rtt),
            server_proc: Some(RangeSummary {
                min: 0.0,
                avg: 0.0,
                max: 1.0,
            }),
        };
        let lines = Reporter::summary_lines(&summary);
        assert!(lines.contains(&"Late threshold: disabled".to_string()));
        assert!(lines.contains(
            &"RTT: min=10ms avg=30ms max=50ms p50=30ms p90=46ms p99=50ms".to_string()
        ));
        assert!(lines.contains(&"Jitter: 12ms average".to_string()));
        assert!(lines.iter().any(|l| l.starts_with("Net+Client: ")));
        assert!(lines.contains(&"Server proc: min=0ms avg=0ms max=1ms".to_string()));
    }

    #[test]
    fn test_bucket_counts() {
        let counts = Reporter::bucket_counts(&[0.5, 9.9, 10.0, 45.0, 99.9, 100.0, 2_000.0]);
        assert_eq!(counts.len(), DISTRIBUTION_BUCKETS + 1);
        assert_eq!(counts[0], 2);
        assert_eq!(counts[1], 1);
        assert_eq!(counts[4], 1);
        assert_eq!(counts[9], 1);
        assert_eq!(counts[DISTRIBUTION_BUCKETS], 2);
    }

    #[test]
    fn test_bucket_labels_and_bars() {
        assert_eq!(Reporter::bucket_label(0), "0-10 ms");
        assert_eq!(Reporter::bucket_label(DISTRIBUTION_BUCKETS), ">=100 ms");
        assert_eq!(Reporter::render_bar(0, 10), "");
        assert_eq!(Reporter::render_bar(1, 1000), "▏");
        assert_eq!(Reporter::render_bar(10, 10).chars().count(), HISTOGRAM_BAR_WIDTH);
    }

    #[test]
    fn test_print_summary_handles_empty() {
        Reporter.print_summary(&summary_without_data(), &[]);
    }
}
