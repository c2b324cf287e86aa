use crate::client::aggregator::{Aggregator, FinalSummary, PacketRecord, WindowSnapshot};
use crate::client::config::Config;
use crate::client::constants::GRACE_PERIOD;
use crate::client::error::{ClientError, Result};
use crate::client::receiver::{CancelFlag, Receiver};
use crate::client::sender::{SendSchedule, Sender};
use crate::client::socket::NetworkSocket;
use crate::protocol::HeaderLayout;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// What to send and for how long
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementPlan {
    pub layout: HeaderLayout,
    pub packet_size: usize,
    pub schedule: SendSchedule,
    pub duration: Duration,
    /// Wait for stragglers after the last send
    pub grace: Duration,
}

impl MeasurementPlan {
    pub fn from_config(config: &Config) -> Self {
        Self {
            layout: config.header_layout(),
            packet_size: config.packet_size,
            schedule: SendSchedule::from_config(config),
            duration: config.test_duration(),
            grace: GRACE_PERIOD,
        }
    }
}

/// Results of a finished run
#[derive(Debug, Clone)]
pub struct MeasurementResult {
    pub summary: FinalSummary,
    pub records: Vec<PacketRecord>,
    pub elapsed: Duration,
    pub send_errors: u64,
}

impl MeasurementResult {
    /// Round-trip times of every answered probe
    pub fn latencies_ms(&self) -> Vec<f64> {
        self.records
            .iter()
            .filter(|r| !r.lost)
            .map(|r| r.latency_ms)
            .collect()
    }
}

/// Run one test: a receiver thread plus the paced sender on the calling
/// thread, then a grace period before the receiver is cancelled.
///
/// `on_tick` is called periodically with the elapsed time and, when one is
/// due, the latest window snapshot.
pub fn run_measurement<S, F>(
    socket: Arc<S>,
    aggregator: Arc<Aggregator>,
    plan: &MeasurementPlan,
    mut on_tick: F,
) -> Result<MeasurementResult>
where
    S: NetworkSocket + 'static,
    F: FnMut(Duration, Option<WindowSnapshot>),
{
    let cancel = CancelFlag::new();
    let receiver = Receiver::new(
        Arc::clone(&socket),
        Arc::clone(&aggregator),
        plan.layout,
        cancel.clone(),
    )
    .spawn()?;

    let start = Instant::now();
    let mut sender = Sender::new(
        socket,
        Arc::clone(&aggregator),
        plan.layout,
        plan.packet_size,
        plan.schedule,
    );
    let sent = {
        let aggregator = Arc::clone(&aggregator);
        sender.run_until(start + plan.duration, || {
            on_tick(start.elapsed(), aggregator.window_snapshot())
        })
    };

    if sent.is_ok() {
        debug!(grace_ms = plan.grace.as_millis() as u64, "Waiting for in-flight echoes");
        thread::sleep(plan.grace);
    }
    cancel.cancel();
    let decoded = receiver
        .join()
        .map_err(|_| ClientError::Socket("Receiver thread panicked".into()))?;
    let sent = sent?;

    let elapsed = start.elapsed();
    let summary = aggregator.final_summary();
    info!(
        sent,
        decoded,
        received = summary.received,
        lost = summary.lost,
        elapsed_ms = elapsed.as_millis() as u64,
        "Measurement finished"
    );

    Ok(MeasurementResult {
        summary,
        records: aggregator.all_records(),
        elapsed,
        send_errors: sender.send_errors(),
    })
}
