//! Echo server activity counters and status line

use colored::*;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Time without datagrams before the status line reports IDLE
const IDLE_THRESHOLD: Duration = Duration::from_secs(2);

#[derive(Debug, Default)]
struct Counters {
    received: AtomicU64,
    echoed: AtomicU64,
    stamped: AtomicU64,
    errors: AtomicU64,
    clients: AtomicU64,
}

/// Tracks responder activity and optionally renders it on one status line.
///
/// The receive loop only touches relaxed atomics; the display runs on its
/// own thread.
pub struct ServerMonitor {
    counters: Arc<Counters>,
    start_time: Instant,
    update_interval: Duration,
}

impl ServerMonitor {
    pub fn new(update_interval_ms: u64) -> Self {
        Self {
            counters: Arc::default(),
            start_time: Instant::now(),
            update_interval: Duration::from_millis(update_interval_ms),
        }
    }

    /// Handle for the receive loop
    pub fn counters(&self) -> ServerCounters {
        ServerCounters(Arc::clone(&self.counters))
    }

    /// Start the background status line thread
    pub fn start_display(&self) {
        let counters = Arc::clone(&self.counters);
        let update_interval = self.update_interval;

        thread::spawn(move || {
            let mut last_received = 0u64;
            let mut last_activity = Instant::now();

            loop {
                thread::sleep(update_interval);
                let snapshot = ServerStats::load(&counters, Duration::ZERO);
                if snapshot.packets_received != last_received {
                    last_received = snapshot.packets_received;
                    last_activity = Instant::now();
                }
                let idle = last_activity.elapsed() >= IDLE_THRESHOLD;

                print!("\r{}", Self::status_line(&snapshot, idle));
                std::io::stdout().flush().ok();
            }
        });
    }

    fn status_line(stats: &ServerStats, idle: bool) -> String {
        let state = if idle {
            "IDLE  ".normal()
        } else {
            "ACTIVE".green().bold()
        };
        format!(
            "[{}] Clients: {} | Received: {} | Echoed: {} | Stamped: {} | Errors: {}",
            state,
            stats.clients,
            stats.packets_received,
            stats.packets_echoed,
            stats.packets_stamped,
            stats.errors
        )
    }

    pub fn stats(&self) -> ServerStats {
        ServerStats::load(&self.counters, self.start_time.elapsed())
    }
}

/// Cheap cloneable handle used by the responder
#[derive(Clone, Debug, Default)]
pub struct ServerCounters(Arc<Counters>);

impl ServerCounters {
    #[inline]
    pub fn increment_received(&self) {
        self.0.received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_echoed(&self) {
        self.0.echoed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_stamped(&self) {
        self.0.stamped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_error(&self) {
        self.0.errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_clients(&self) {
        self.0.clients.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> ServerStats {
        ServerStats::load(&self.0, Duration::ZERO)
    }
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerStats {
    pub packets_received: u64,
    pub packets_echoed: u64,
    pub packets_stamped: u64,
    pub errors: u64,
    pub clients: u64,
    pub elapsed: Duration,
}

impl ServerStats {
    fn load(counters: &Counters, elapsed: Duration) -> Self {
        Self {
            packets_received: counters.received.load(Ordering::Relaxed),
            packets_echoed: counters.echoed.load(Ordering::Relaxed),
            packets_stamped: counters.stamped.load(Ordering::Relaxed),
            errors: counters.errors.load(Ordering::Relaxed),
            clients: counters.clients.load(Ordering::Relaxed),
            elapsed,
        }
    }
}
