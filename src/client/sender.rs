use crate::client::aggregator::Aggregator;
use crate::client::config::Config;
use crate::client::constants::STATS_CHECK_INTERVAL;
use crate::client::error::Result;
use crate::client::socket::NetworkSocket;
use crate::protocol::{HeaderLayout, Packet, SequenceNumber};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const MIN_TICK: Duration = Duration::from_micros(1);

/// Pacing of probe transmissions
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SendSchedule {
    /// One packet every `interval`
    Steady { interval: Duration },
    /// `size` packets back-to-back every `interval`
    Burst { size: u32, interval: Duration },
}

impl SendSchedule {
    pub fn steady(rate: u32) -> Self {
        SendSchedule::Steady {
            interval: (Duration::from_secs(1) / rate.max(1)).max(MIN_TICK),
        }
    }

    /// Bursts of `size` packets, `rate / size` bursts per second
    pub fn burst(rate: u32, size: u32) -> Self {
        let size = size.max(1);
        SendSchedule::Burst {
            size,
            interval: Duration::from_secs_f64(size as f64 / rate.max(1) as f64).max(MIN_TICK),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        if config.burst {
            Self::burst(config.rate, config.burst_size)
        } else {
            Self::steady(config.rate)
        }
    }

    pub fn interval(&self) -> Duration {
        match *self {
            SendSchedule::Steady { interval } | SendSchedule::Burst { interval, .. } => interval,
        }
    }

    pub fn packets_per_tick(&self) -> u32 {
        match *self {
            SendSchedule::Steady { .. } => 1,
            SendSchedule::Burst { size, .. } => size,
        }
    }
}

/// Emits sequence-numbered probes at the scheduled rate
pub struct Sender<S: NetworkSocket> {
    socket: Arc<S>,
    aggregator: Arc<Aggregator>,
    layout: HeaderLayout,
    packet_size: usize,
    schedule: SendSchedule,
    next_sequence: SequenceNumber,
    send_errors: u64,
}

impl<S: NetworkSocket> Sender<S> {
    pub fn new(
        socket: Arc<S>,
        aggregator: Arc<Aggregator>,
        layout: HeaderLayout,
        packet_size: usize,
        schedule: SendSchedule,
    ) -> Self {
        Self {
            socket,
            aggregator,
            layout,
            packet_size,
            schedule,
            next_sequence: SequenceNumber::FIRST,
            send_errors: 0,
        }
    }

    /// Transmissions that failed at the socket
    pub fn send_errors(&self) -> u64 {
        self.send_errors
    }

    /// Stamp, record and transmit the next probe.
    ///
    /// The probe is registered with the aggregator before it hits the wire
    /// so an echo can never race ahead of its own send record. Socket
    /// failures are logged and the probe simply stays lost.
    pub fn send_one(&mut self) -> Result<SequenceNumber> {
        let sequence = self.next_sequence;
        let packet = Packet::now(sequence);
        let datagram = packet.encode(self.layout, self.packet_size)?;

        self.aggregator
            .record_sent(sequence, packet.send_timestamp_ns);
        self.next_sequence = sequence.next();

        match self.socket.send_datagram(&datagram) {
            Ok(bytes_sent) => debug!(sequence = sequence.0, bytes_sent, "Probe sent"),
            Err(e) => {
                self.send_errors += 1;
                warn!(sequence = sequence.0, error = %e, "Failed to send probe");
            }
        }
        Ok(sequence)
    }

    /// Send on schedule until `deadline`, calling `on_tick` roughly every
    /// stats check interval. Returns the number of probes sent.
    pub fn run_until<F: FnMut()>(&mut self, deadline: Instant, mut on_tick: F) -> Result<u64> {
        let interval = self.schedule.interval();
        let start = Instant::now();
        let mut next_send = start + interval;
        let mut next_check = start + STATS_CHECK_INTERVAL;
        let mut sent = 0u64;

        info!(
            interval_us = interval.as_micros() as u64,
            per_tick = self.schedule.packets_per_tick(),
            "Sender started"
        );

        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }

            if now >= next_send {
                for _ in 0..self.schedule.packets_per_tick() {
                    self.send_one()?;
                    sent += 1;
                }
                next_send = next_tick(next_send, interval, now);
            }

            if now >= next_check {
                on_tick();
                next_check = next_tick(next_check, STATS_CHECK_INTERVAL, now);
            }

            let wake = next_send.min(next_check).min(deadline);
            let now = Instant::now();
            if wake > now {
                thread::sleep(wake - now);
            }
        }

        info!(sent, send_errors = self.send_errors, "Sender finished");
        Ok(sent)
    }
}

/// Next tick on a fixed grid; ticks already missed are dropped
fn next_tick(previous: Instant, interval: Duration, now: Instant) -> Instant {
    let next = previous + interval;
    if next <= now {
        now + interval
    } else {
        next
    }
}
