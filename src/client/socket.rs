use crate::client::error::{ClientError, Result};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;
use tracing::{debug, warn};

/// Datagram transport shared by the sender and receiver threads
pub trait NetworkSocket: Send + Sync {
    /// Send one datagram to the connected peer
    fn send_datagram(&self, buf: &[u8]) -> Result<usize>;

    /// Receive one datagram into `buf`, returning its length
    fn recv_datagram(&self, buf: &mut [u8]) -> Result<usize>;

    /// Set the read timeout for the socket
    fn set_timeout(&self, timeout: Duration) -> Result<()>;
}

/// UDP-based implementation of NetworkSocket
#[derive(Debug)]
pub struct UdpNetworkSocket {
    socket: UdpSocket,
}

impl UdpNetworkSocket {
    /// Bind to a local address
    pub fn bind(addr: &str) -> Result<Self> {
        debug!(addr = addr, "Binding UDP socket");
        let socket = UdpSocket::bind(addr).map_err(|e| {
            warn!(error = %e, "Failed to bind socket");
            ClientError::Socket(format!("Failed to bind to {}: {}", addr, e))
        })?;
        Ok(Self { socket })
    }

    /// Bind an ephemeral local port of the right address family and
    /// connect it to `addr`
    pub fn connect_to(addr: &str) -> Result<Self> {
        let remote = resolve(addr)?;
        let local: SocketAddr = if remote.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = Self::bind(&local.to_string())?;
        socket.connect(&remote.to_string())?;
        Ok(socket)
    }

    /// Connect to a remote address
    pub fn connect(&self, addr: &str) -> Result<()> {
        debug!(addr = addr, "Connecting UDP socket");
        self.socket.connect(addr).map_err(|e| {
            warn!(error = %e, "Failed to connect socket");
            ClientError::Socket(format!("Failed to connect to {}: {}", addr, e))
        })?;
        debug!("Socket connected successfully");
        Ok(())
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}

fn resolve(addr: &str) -> Result<SocketAddr> {
    addr.to_socket_addrs()
        .map_err(|e| ClientError::Socket(format!("Failed to resolve {}: {}", addr, e)))?
        .next()
        .ok_or_else(|| ClientError::Socket(format!("No address found for {}", addr)))
}

impl NetworkSocket for UdpNetworkSocket {
    fn send_datagram(&self, buf: &[u8]) -> Result<usize> {
        Ok(self.socket.send(buf)?)
    }

    fn recv_datagram(&self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.socket.recv(buf)?)
    }

    fn set_timeout(&self, timeout: Duration) -> Result<()> {
        debug!(timeout_ms = timeout.as_millis(), "Setting socket timeout");
        self.socket.set_read_timeout(Some(timeout)).map_err(|e| {
            warn!(error = %e, "Failed to set timeout");
            ClientError::Socket(format!("Failed to set timeout: {}", e))
        })
    }
}


#[cfg(test)]
pub use tests::MockNetworkSocket;
