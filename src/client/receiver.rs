use crate::client::aggregator::Aggregator;
use crate::client::constants::{MAX_DATAGRAM_SIZE, RECV_POLL_TIMEOUT};
use crate::client::error::Result;
use crate::client::socket::NetworkSocket;
use crate::protocol::{unix_time_ns, HeaderLayout, Packet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, trace};

/// One-shot stop signal for the receiver thread
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Matches echoes back to their probes until cancelled
pub struct Receiver<S: NetworkSocket> {
    socket: Arc<S>,
    aggregator: Arc<Aggregator>,
    layout: HeaderLayout,
    cancel: CancelFlag,
}

impl<S: NetworkSocket + 'static> Receiver<S> {
    /// `layout` is the header the probes were sent with; a server stamp is
    /// only trusted when that header reserves room for it.
    pub fn new(
        socket: Arc<S>,
        aggregator: Arc<Aggregator>,
        layout: HeaderLayout,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            socket,
            aggregator,
            layout,
            cancel,
        }
    }

    /// Run the receive loop on its own thread
    pub fn spawn(self) -> Result<JoinHandle<u64>> {
        self.socket.set_timeout(RECV_POLL_TIMEOUT)?;
        let handle = thread::Builder::new()
            .name("receiver".into())
            .spawn(move || self.run())?;
        Ok(handle)
    }

    /// Receive until cancelled. Timeouts, read errors and undecodable
    /// datagrams are skipped. Returns the number of datagrams decoded.
    pub fn run(self) -> u64 {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let mut decoded = 0u64;

        while !self.cancel.is_cancelled() {
            let len = match self.socket.recv_datagram(&mut buf) {
                Ok(len) => len,
                Err(e) => {
                    trace!(error = %e, "Receive poll returned no datagram");
                    continue;
                }
            };
            let recv_time_ns = unix_time_ns();

            match Packet::decode(&buf[..len]) {
                Some(packet) => {
                    decoded += 1;
                    debug!(sequence = packet.sequence.0, bytes = len, "Echo received");
                    let server_proc_ns = if self.layout.carries_server_proc() {
                        packet.server_proc_ns
                    } else {
                        0
                    };
                    self.aggregator
                        .record_received(packet.sequence, recv_time_ns, server_proc_ns);
                }
                None => debug!(bytes = len, "Undecodable datagram skipped"),
            }
        }

        info!(decoded, "Receiver stopped");
        decoded
    }
}
