//! Stateless UDP echo responder.

use crate::protocol::stamp_server_proc;
use crate::server::monitor::ServerCounters;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::net::{SocketAddr, UdpSocket};
use std::time::Instant;
use tracing::{debug, error, info};

const MAX_DATAGRAM_SIZE: usize = 65_535;

/// Reflects every datagram back to its sender, optionally stamping the
/// time spent handling it into the server processing field.
pub struct EchoResponder {
    socket: UdpSocket,
    stamp: bool,
    seen_clients: HashSet<SocketAddr>,
    counters: ServerCounters,
}

impl EchoResponder {
    pub fn bind(addr: &str, stamp: bool, counters: ServerCounters) -> Result<Self> {
        let socket = UdpSocket::bind(addr).map_err(|e| {
            if e.kind() == std::io::ErrorKind::AddrInUse {
                anyhow::anyhow!(
                    "Failed to bind to {}: Address already in use. Try a different port or ensure no other process is using it.",
                    addr
                )
            } else {
                anyhow::Error::new(e).context(format!("Failed to bind to {}", addr))
            }
        })?;
        Ok(Self {
            socket,
            stamp,
            seen_clients: HashSet::new(),
            counters,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr().context("Failed to read local address")
    }

    /// Number of distinct peers seen so far
    pub fn client_count(&self) -> usize {
        self.seen_clients.len()
    }

    /// Serve until the process exits. A failed read is logged and the
    /// loop moves on to the next datagram.
    pub fn serve_forever(&mut self) -> ! {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        loop {
            match self.socket.recv_from(&mut buf) {
                Ok((len, peer)) => {
                    let received_at = Instant::now();
                    self.handle_datagram(&mut buf[..len], peer, received_at);
                }
                Err(e) => {
                    self.counters.increment_error();
                    error!(error = %e, "Read error");
                }
            }
        }
    }

    /// Stamp (when enabled and the datagram has room) and reflect one
    /// datagram. Returns whether it was echoed.
    pub fn handle_datagram(&mut self, datagram: &mut [u8], peer: SocketAddr, received_at: Instant) -> bool {
        self.counters.increment_received();
        if self.seen_clients.insert(peer) {
            self.counters.increment_clients();
            info!(peer = %peer, "New client connected");
        }

        if self.stamp {
            let proc_ns = received_at.elapsed().as_nanos() as i64;
            if stamp_server_proc(datagram, proc_ns) {
                self.counters.increment_stamped();
            }
        }

        match self.socket.send_to(datagram, peer) {
            Ok(sent) => {
                self.counters.increment_echoed();
                debug!(peer = %peer, bytes = sent, "Datagram echoed");
                true
            }
            Err(e) => {
                self.counters.increment_error();
                error!(error = %e, peer = %peer, "Write error");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{HeaderLayout, Packet, SequenceNumber};
    use std::time::Duration;

    fn responder(stamp: bool) -> (EchoResponder, ServerCounters) {
        let counters = ServerCounters::default();
        let responder = EchoResponder::bind("127.0.0.1:0", stamp, counters.clone()).unwrap();
        (responder, counters)
    }

    fn peer() -> UdpSocket {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        socket
    }

    #[test]
    fn test_echo_with_stamp() {
        let (mut responder, counters) = responder(true);
        let client = peer();
        let mut datagram = Packet::new(SequenceNumber(5), 42)
            .encode(HeaderLayout::Extended, 48)
            .unwrap();

        let received_at = Instant::now() - Duration::from_millis(3);
        assert!(responder.handle_datagram(&mut datagram, client.local_addr().unwrap(), received_at));

        let mut buf = [0u8; 128];
        let (len, from) = client.recv_from(&mut buf).unwrap();
        assert_eq!(len, 48);
        assert_eq!(from, responder.local_addr().unwrap());

        let echo = Packet::decode(&buf[..len]).unwrap();
        assert_eq!(echo.sequence, SequenceNumber(5));
        assert_eq!(echo.send_timestamp_ns, 42);
        assert!(echo.server_proc_ns >= 3_000_000);
        assert_eq!(counters.stats().packets_stamped, 1);
    }

    #[test]
    fn test_short_datagram_echoed_unchanged() {
        let (mut responder, counters) = responder(true);
        let client = peer();
        let original = Packet::new(SequenceNumber(1), 7)
            .encode(HeaderLayout::Basic, 20)
            .unwrap();
        let mut datagram = original.clone();

        responder.handle_datagram(&mut datagram, client.local_addr().unwrap(), Instant::now());

        let mut buf = [0u8; 64];
        let len = client.recv(&mut buf).unwrap();
        assert_eq!(&buf[..len], original.as_slice());
        assert_eq!(counters.stats().packets_stamped, 0);
        assert_eq!(counters.stats().packets_echoed, 1);
    }

    #[test]
    fn test_stamping_disabled() {
        let (mut responder, _) = responder(false);
        let client = peer();
        let mut datagram = Packet::new(SequenceNumber(1), 7)
            .encode(HeaderLayout::Extended, 24)
            .unwrap();

        responder.handle_datagram(&mut datagram, client.local_addr().unwrap(), Instant::now());

        let mut buf = [0u8; 64];
        let len = client.recv(&mut buf).unwrap();
        assert_eq!(Packet::decode(&buf[..len]).unwrap().server_proc_ns, 0);
    }

    #[test]
    fn test_clients_tracked_once() {
        let (mut responder, counters) = responder(false);
        let a = peer();
        let b = peer();
        for client in [&a, &a, &b] {
            let mut datagram = vec![0u8; 16];
            responder.handle_datagram(&mut datagram, client.local_addr().unwrap(), Instant::now());
        }
        assert_eq!(responder.client_count(), 2);
        assert_eq!(counters.stats().clients, 2);
        assert_eq!(counters.stats().packets_received, 3);
    }

    #[test]
    fn test_bind_conflict_reports_address() {
        let (responder, _) = responder(false);
        let addr = responder.local_addr().unwrap().to_string();
        let err = EchoResponder::bind(&addr, false, ServerCounters::default())
            .err()
            .unwrap();
        assert!(err.to_string().contains(&addr));
    }
}
