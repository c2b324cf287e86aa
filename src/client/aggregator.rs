//! Per-run accounting of probe sends and echoes.
//!
//! The sender and receiver threads share one [`Aggregator`]. Every public
//! operation is a single critical section over the whole state, so a window
//! snapshot can never observe half of an update. Nothing here performs I/O
//! while the lock is held.

use crate::client::constants::{SPIKE_JITTER_THRESHOLD_MS, WINDOW_REPORT_INTERVAL};
use crate::client::statistics::{mean, mean_abs_deviation, p50_p90_p99, SampleStats};
use crate::protocol::{unix_time_ns, SequenceNumber};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

const NS_PER_MS: f64 = 1_000_000.0;

/// Outcome of one probe. Created lost on send, resolved by the first echo.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacketRecord {
    pub sequence: SequenceNumber,
    pub sent_time_ns: i64,
    /// Zero until an echo arrives
    pub recv_time_ns: i64,
    pub latency_ms: f64,
    pub server_proc_ms: f64,
    pub net_latency_ms: f64,
    pub lost: bool,
    pub late: bool,
}

impl PacketRecord {
    fn sent(sequence: SequenceNumber, sent_time_ns: i64) -> Self {
        Self {
            sequence,
            sent_time_ns,
            recv_time_ns: 0,
            latency_ms: 0.0,
            server_proc_ms: 0.0,
            net_latency_ms: 0.0,
            lost: true,
            late: false,
        }
    }
}

/// Streaming min/max/sum over a value that is folded in one at a time
#[derive(Debug, Clone, Copy)]
struct RunningRange {
    count: u64,
    min: f64,
    max: f64,
    sum: f64,
}

impl RunningRange {
    fn new() -> Self {
        Self {
            count: 0,
            min: f64::MAX,
            max: f64::MIN,
            sum: 0.0,
        }
    }

    fn fold(&mut self, value: f64) {
        self.count += 1;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum += value;
    }

    fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    fn summary(&self) -> Option<RangeSummary> {
        (self.count > 0).then(|| RangeSummary {
            min: self.min,
            avg: self.avg(),
            max: self.max,
        })
    }
}

/// Live reporting window, reset on every snapshot
#[derive(Debug)]
struct Window {
    start_ns: i64,
    sent: u64,
    received: u64,
    late: u64,
    latencies: Vec<f64>,
    net_latencies: Vec<f64>,
    server_proc: Vec<f64>,
}

impl Window {
    fn starting_at(start_ns: i64) -> Self {
        Self {
            start_ns,
            sent: 0,
            received: 0,
            late: 0,
            latencies: Vec::new(),
            net_latencies: Vec::new(),
            server_proc: Vec::new(),
        }
    }
}

#[derive(Debug)]
struct AggregatorState {
    records: HashMap<SequenceNumber, PacketRecord>,
    sent: u64,
    received: u64,
    late: u64,
    latency: RunningRange,
    net_latency: RunningRange,
    /// Only echoes that carried a non-zero server stamp
    server_proc: RunningRange,
    window: Window,
    last_snapshot: Instant,
}

/// Statistics for one reporting window
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSnapshot {
    /// Time since the aggregator was created
    pub elapsed: Duration,
    pub sent: u64,
    pub received: u64,
    pub late: u64,
    pub latency: SampleStats,
    pub avg_net_ms: f64,
    pub avg_server_ms: f64,
    /// Window jitter exceeded the spike threshold
    pub spike: bool,
}

impl WindowSnapshot {
    pub fn loss_percent(&self) -> f64 {
        percent(self.sent.saturating_sub(self.received), self.sent)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencySummary {
    pub min: f64,
    pub avg: f64,
    pub max: f64,
    pub jitter: f64,
    pub p50: f64,
    pub p90: f64,
    pub p99: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeSummary {
    pub min: f64,
    pub avg: f64,
    pub max: f64,
}

/// Whole-run statistics. Latency fields are `None` when nothing was received.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalSummary {
    pub sent: u64,
    pub received: u64,
    pub lost: u64,
    pub late: u64,
    pub late_threshold_ms: Option<f64>,
    pub latency: Option<LatencySummary>,
    /// Present only when the server stamped its processing time
    pub net_latency: Option<LatencySummary>,
    pub server_proc: Option<RangeSummary>,
}

impl FinalSummary {
    pub fn loss_percent(&self) -> f64 {
        percent(self.lost, self.sent)
    }

    pub fn late_percent(&self) -> f64 {
        percent(self.late, self.sent)
    }

    pub fn has_data(&self) -> bool {
        self.latency.is_some()
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Thread-safe store of every probe's fate plus running aggregates.
#[derive(Debug)]
pub struct Aggregator {
    state: Mutex<AggregatorState>,
    late_threshold_ms: Option<f64>,
    report_interval: Duration,
    started: Instant,
}

impl Aggregator {
    /// Create an aggregator with the standard window report spacing
    pub fn new(late_threshold_ms: Option<f64>) -> Self {
        Self::with_report_interval(late_threshold_ms, WINDOW_REPORT_INTERVAL)
    }

    pub fn with_report_interval(late_threshold_ms: Option<f64>, report_interval: Duration) -> Self {
        let started = Instant::now();
        Self {
            state: Mutex::new(AggregatorState {
                records: HashMap::new(),
                sent: 0,
                received: 0,
                late: 0,
                latency: RunningRange::new(),
                net_latency: RunningRange::new(),
                server_proc: RunningRange::new(),
                window: Window::starting_at(unix_time_ns()),
                last_snapshot: started,
            }),
            late_threshold_ms,
            report_interval,
            started,
        }
    }

    pub fn late_threshold_ms(&self) -> Option<f64> {
        self.late_threshold_ms
    }

    fn lock(&self) -> MutexGuard<'_, AggregatorState> {
        // Poisoning is ignored; the state holds only plain values.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a probe before it is transmitted
    pub fn record_sent(&self, sequence: SequenceNumber, sent_time_ns: i64) {
        let mut state = self.lock();
        state.sent += 1;
        state.window.sent += 1;
        state
            .records
            .insert(sequence, PacketRecord::sent(sequence, sent_time_ns));
        trace!(sequence = sequence.0, "Probe recorded as sent");
    }

    /// Resolve a probe from its echo. Unknown or already resolved
    /// sequence numbers are ignored.
    pub fn record_received(&self, sequence: SequenceNumber, recv_time_ns: i64, server_proc_ns: i64) {
        let late_threshold = self.late_threshold_ms;
        let mut guard = self.lock();
        let state = &mut *guard;

        let Some(record) = state.records.get_mut(&sequence) else {
            debug!(sequence = sequence.0, "Echo for unknown sequence ignored");
            return;
        };
        if !record.lost {
            debug!(sequence = sequence.0, "Duplicate echo ignored");
            return;
        }

        record.recv_time_ns = recv_time_ns;
        record.latency_ms = (recv_time_ns - record.sent_time_ns) as f64 / NS_PER_MS;
        record.server_proc_ms = server_proc_ns as f64 / NS_PER_MS;
        record.net_latency_ms = (record.latency_ms - record.server_proc_ms).max(0.0);
        record.late = late_threshold.is_some_and(|t| record.latency_ms > t);
        record.lost = false;
        let record = *record;

        state.received += 1;
        if record.late {
            state.late += 1;
        }
        let stamped = server_proc_ns != 0;
        state.latency.fold(record.latency_ms);
        state.net_latency.fold(record.net_latency_ms);
        if stamped {
            state.server_proc.fold(record.server_proc_ms);
        }

        let window = &mut state.window;
        if record.sent_time_ns >= window.start_ns {
            window.received += 1;
            if record.late {
                window.late += 1;
            }
            window.latencies.push(record.latency_ms);
            window.net_latencies.push(record.net_latency_ms);
            if stamped {
                window.server_proc.push(record.server_proc_ms);
            }
        }
    }

    /// Capture and reset the current window.
    ///
    /// Returns `None` when called again before the report interval has
    /// passed since the previous snapshot (or since creation).
    pub fn window_snapshot(&self) -> Option<WindowSnapshot> {
        self.snapshot_at(Instant::now(), unix_time_ns())
    }

    fn snapshot_at(&self, now: Instant, now_ns: i64) -> Option<WindowSnapshot> {
        let mut state = self.lock();
        if now.saturating_duration_since(state.last_snapshot) < self.report_interval {
            return None;
        }
        state.last_snapshot = now;
        let window = std::mem::replace(&mut state.window, Window::starting_at(now_ns));
        drop(state);

        let latency = SampleStats::from_samples(&window.latencies);
        Some(WindowSnapshot {
            elapsed: now.saturating_duration_since(self.started),
            sent: window.sent,
            received: window.received,
            late: window.late,
            latency,
            avg_net_ms: mean(&window.net_latencies),
            avg_server_ms: mean(&window.server_proc),
            spike: latency.jitter > SPIKE_JITTER_THRESHOLD_MS,
        })
    }

    /// Whole-run statistics including exact percentiles
    pub fn final_summary(&self) -> FinalSummary {
        let state = self.lock();
        let received: Vec<&PacketRecord> = state.records.values().filter(|r| !r.lost).collect();

        let latency = (state.latency.count > 0).then(|| {
            let samples: Vec<f64> = received.iter().map(|r| r.latency_ms).collect();
            summarize(&state.latency, &samples)
        });
        let stamped = state.server_proc.count > 0;
        let net_latency = (stamped && state.net_latency.count > 0).then(|| {
            let samples: Vec<f64> = received.iter().map(|r| r.net_latency_ms).collect();
            summarize(&state.net_latency, &samples)
        });
        let server_proc = state.server_proc.summary();

        FinalSummary {
            sent: state.sent,
            received: state.received,
            lost: state.sent.saturating_sub(state.received),
            late: state.late,
            late_threshold_ms: self.late_threshold_ms,
            latency,
            net_latency,
            server_proc,
        }
    }

    /// Every record, in no particular order
    pub fn all_records(&self) -> Vec<PacketRecord> {
        self.lock().records.values().copied().collect()
    }

    pub fn sent_count(&self) -> u64 {
        self.lock().sent
    }

    pub fn received_count(&self) -> u64 {
        self.lock().received
    }
}

fn summarize(range: &RunningRange, samples: &[f64]) -> LatencySummary {
    let avg = range.avg();
    let (p50, p90, p99) = p50_p90_p99(samples);
    LatencySummary {
        min: range.min,
        avg,
        max: range.max,
        jitter: mean_abs_deviation(samples, avg),
        p50,
        p90,
        p99,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    const MS: i64 = 1_000_000;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    /// Sends `latencies.len()` probes and answers each with the given RTT
    fn answered(agg: &Aggregator, latencies: &[f64]) {
        let base = unix_time_ns();
        for (i, &lat) in latencies.iter().enumerate() {
            let seq = SequenceNumber(i as u64 + 1);
            let sent = base + i as i64 * MS;
            agg.record_sent(seq, sent);
            agg.record_received(seq, sent + (lat * NS_PER_MS) as i64, 0);
        }
    }

    #[test]
    fn test_sent_records_start_lost() {
        let agg = Aggregator::new(Some(100.0));
        agg.record_sent(SequenceNumber(1), 1_000);

        let records = agg.all_records();
        assert_eq!(records.len(), 1);
        assert!(records[0].lost);
        assert_eq!(records[0].recv_time_ns, 0);
    }

    #[test]
    fn test_all_unanswered_is_total_loss() {
        let agg = Aggregator::new(Some(100.0));
        for seq in 1..=10 {
            agg.record_sent(SequenceNumber(seq), unix_time_ns());
        }

        let summary = agg.final_summary();
        assert_eq!(summary.sent, 10);
        assert_eq!(summary.received, 0);
        assert_eq!(summary.lost, 10);
        assert_eq!(summary.loss_percent(), 100.0);
        assert!(!summary.has_data());
        assert!(summary.server_proc.is_none());
        assert!(agg.all_records().iter().all(|r| r.lost && r.recv_time_ns == 0));
    }

    #[test]
    fn test_five_answered_latencies() {
        let agg = Aggregator::new(None);
        answered(&agg, &[10.0, 20.0, 30.0, 40.0, 50.0]);

        let summary = agg.final_summary();
        assert_eq!(summary.received, 5);
        assert_eq!(summary.lost, 0);
        let latency = summary.latency.unwrap();
        assert!(approx(latency.avg, 30.0));
        assert!(approx(latency.min, 10.0));
        assert!(approx(latency.max, 50.0));
        assert!(approx(latency.jitter, 12.0));
        assert!(approx(latency.p50, 30.0));
        assert!(approx(latency.p90, 46.0));
    }

    #[test]
    fn test_duplicate_receive_is_ignored() {
        let agg = Aggregator::new(Some(100.0));
        agg.record_sent(SequenceNumber(1), 0);
        agg.record_received(SequenceNumber(1), 20 * MS, 0);
        let record_before = agg.all_records()[0];
        let summary_before = agg.final_summary();

        agg.record_received(SequenceNumber(1), 500 * MS, 3 * MS);

        assert_eq!(agg.all_records()[0], record_before);
        assert_eq!(agg.final_summary(), summary_before);
    }

    #[test]
    fn test_unknown_sequence_is_ignored() {
        let agg = Aggregator::new(Some(100.0));
        agg.record_received(SequenceNumber(42), 10 * MS, 0);

        let summary = agg.final_summary();
        assert_eq!(summary.received, 0);
        assert!(agg.all_records().is_empty());
    }

    #[test]
    fn test_late_threshold() {
        let agg = Aggregator::new(Some(25.0));
        answered(&agg, &[10.0, 20.0, 30.0, 40.0]);

        let summary = agg.final_summary();
        assert_eq!(summary.late, 2);
        assert_eq!(summary.received, 4);
        assert_eq!(summary.late_percent(), 50.0);
        assert_eq!(agg.all_records().iter().filter(|r| r.late).count(), 2);
    }

    #[test]
    fn test_late_check_disabled() {
        let agg = Aggregator::new(None);
        answered(&agg, &[1_000.0]);
        assert_eq!(agg.final_summary().late, 0);
        assert!(!agg.all_records()[0].late);
    }

    #[test]
    fn test_server_proc_and_net_latency() {
        let agg = Aggregator::new(None);
        agg.record_sent(SequenceNumber(1), 0);
        agg.record_sent(SequenceNumber(2), 0);
        agg.record_received(SequenceNumber(1), 30 * MS, 5 * MS);
        // Stamp larger than the round trip floors net latency at zero
        agg.record_received(SequenceNumber(2), 2 * MS, 4 * MS);

        let mut records = agg.all_records();
        records.sort_by_key(|r| r.sequence);
        assert!(approx(records[0].server_proc_ms, 5.0));
        assert!(approx(records[0].net_latency_ms, 25.0));
        assert_eq!(records[1].net_latency_ms, 0.0);

        let summary = agg.final_summary();
        let server = summary.server_proc.unwrap();
        assert!(approx(server.min, 4.0));
        assert!(approx(server.max, 5.0));
        assert!(approx(server.avg, 4.5));
        let net = summary.net_latency.unwrap();
        assert!(approx(net.max, 25.0));
        assert!(approx(net.min, 0.0));
    }

    #[test]
    fn test_unstamped_echoes_excluded_from_server_proc() {
        let agg = Aggregator::with_report_interval(None, Duration::ZERO);
        let base = unix_time_ns();
        for seq in 1..=3 {
            agg.record_sent(SequenceNumber(seq), base);
        }
        agg.record_received(SequenceNumber(1), base + 20 * MS, 2 * MS);
        agg.record_received(SequenceNumber(2), base + 20 * MS, 0);
        agg.record_received(SequenceNumber(3), base + 20 * MS, 4 * MS);

        let server = agg.final_summary().server_proc.unwrap();
        assert!(approx(server.min, 2.0));
        assert!(approx(server.avg, 3.0));
        assert!(approx(server.max, 4.0));

        let snapshot = agg.window_snapshot().unwrap();
        assert!(approx(snapshot.avg_server_ms, 3.0));
        assert_eq!(snapshot.received, 3);
    }

    #[test]
    fn test_no_server_stamp_means_no_server_summary() {
        let agg = Aggregator::new(None);
        answered(&agg, &[10.0, 20.0]);
        let summary = agg.final_summary();
        assert!(summary.server_proc.is_none());
        assert!(summary.net_latency.is_none());
    }

    #[test]
    fn test_window_snapshot_rate_limited() {
        let agg = Aggregator::new(None);
        assert!(agg.window_snapshot().is_none());

        let started = agg.lock().last_snapshot;
        assert!(agg
            .snapshot_at(started + Duration::from_secs(4), unix_time_ns())
            .is_none());
        assert!(agg
            .snapshot_at(started + WINDOW_REPORT_INTERVAL, unix_time_ns())
            .is_some());
        assert!(agg
            .snapshot_at(started + Duration::from_secs(7), unix_time_ns())
            .is_none());
        assert!(agg
            .snapshot_at(started + Duration::from_secs(10), unix_time_ns())
            .is_some());
    }

    #[test]
    fn test_window_snapshot_resets_counters() {
        let agg = Aggregator::with_report_interval(Some(15.0), Duration::ZERO);
        answered(&agg, &[10.0, 20.0]);
        agg.record_sent(SequenceNumber(3), unix_time_ns());

        let snapshot = agg.window_snapshot().unwrap();
        assert_eq!(snapshot.sent, 3);
        assert_eq!(snapshot.received, 2);
        assert_eq!(snapshot.late, 1);
        assert!(approx(snapshot.latency.avg, 15.0));
        assert!(approx(snapshot.latency.jitter, 5.0));
        assert!(approx(snapshot.loss_percent(), 100.0 / 3.0));
        assert!(!snapshot.spike);

        let empty = agg.window_snapshot().unwrap();
        assert_eq!(empty.sent, 0);
        assert_eq!(empty.received, 0);
        assert_eq!(empty.latency, SampleStats::default());
        assert_eq!(empty.loss_percent(), 0.0);

        // Lifetime totals are unaffected by window resets
        assert_eq!(agg.final_summary().sent, 3);
    }

    #[test]
    fn test_echo_for_previous_window_skips_window_buffers() {
        let agg = Aggregator::with_report_interval(None, Duration::ZERO);
        let old_send = unix_time_ns() - 10_000 * MS;
        agg.record_sent(SequenceNumber(1), old_send);
        agg.window_snapshot();

        agg.record_received(SequenceNumber(1), old_send + 40 * MS, 0);
        let snapshot = agg.window_snapshot().unwrap();
        assert_eq!(snapshot.received, 0);
        assert_eq!(agg.final_summary().received, 1);
    }

    #[test]
    fn test_window_spike_flag() {
        let agg = Aggregator::with_report_interval(None, Duration::ZERO);
        answered(&agg, &[5.0, 45.0]);
        let snapshot = agg.window_snapshot().unwrap();
        assert!(approx(snapshot.latency.jitter, 20.0));
        assert!(snapshot.spike);
    }

    #[test]
    fn test_concurrent_send_and_receive() {
        let agg = Arc::new(Aggregator::new(None));
        let total = 2_000u64;

        let sender = {
            let agg = Arc::clone(&agg);
            thread::spawn(move || {
                for seq in 1..=total {
                    agg.record_sent(SequenceNumber(seq), seq as i64 * MS);
                }
            })
        };
        sender.join().unwrap();

        let receivers: Vec<_> = (0..4)
            .map(|_| {
                let agg = Arc::clone(&agg);
                thread::spawn(move || {
                    for seq in 1..=total {
                        agg.record_received(SequenceNumber(seq), seq as i64 * MS + 3 * MS, 0);
                    }
                })
            })
            .collect();
        for handle in receivers {
            handle.join().unwrap();
        }

        let summary = agg.final_summary();
        assert_eq!(summary.sent, total);
        assert_eq!(summary.received, total);
        assert!(approx(summary.latency.unwrap().avg, 3.0));
    }
}
