//! Probe packet wire format.
//!
//! ```text
//! ┌──────────────┬──────────────┬──────────────────┬──────────────┐
//! │   Sequence   │  Send time   │  Server proc     │   Padding    │
//! │  (8 bytes)   │  (8 bytes)   │  (8 bytes, opt.) │  (variable)  │
//! └──────────────┴──────────────┴──────────────────┴──────────────┘
//! ```
//!
//! All fields are big-endian. Timestamps are signed nanoseconds since the
//! UNIX epoch carried as their unsigned bit pattern.

use crate::protocol::error::{ProtocolError, Result};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Sequence number plus send timestamp
pub const BASE_HEADER_SIZE: usize = 16;

/// Base header plus the server processing duration field
pub const EXTENDED_HEADER_SIZE: usize = 24;

const SEQ_RANGE: std::ops::Range<usize> = 0..8;
const SEND_TS_RANGE: std::ops::Range<usize> = 8..16;
const SERVER_PROC_RANGE: std::ops::Range<usize> = 16..24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SequenceNumber(pub u64);

impl SequenceNumber {
    /// First sequence number of every run
    pub const FIRST: SequenceNumber = SequenceNumber(1);

    pub fn next(self) -> Self {
        SequenceNumber(self.0.wrapping_add(1))
    }
}

/// Which header fields a probe carries on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeaderLayout {
    /// Sequence number and send timestamp only
    #[default]
    Basic,
    /// Reserves room for the responder to stamp its processing time
    Extended,
}

impl HeaderLayout {
    pub fn from_server_timing(enabled: bool) -> Self {
        if enabled {
            HeaderLayout::Extended
        } else {
            HeaderLayout::Basic
        }
    }

    /// Whether the server processing field belongs to the header rather
    /// than the padding
    pub fn carries_server_proc(self) -> bool {
        self == HeaderLayout::Extended
    }

    /// Smallest datagram this layout can be encoded into
    pub fn header_size(self) -> usize {
        match self {
            HeaderLayout::Basic => BASE_HEADER_SIZE,
            HeaderLayout::Extended => EXTENDED_HEADER_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub sequence: SequenceNumber,
    pub send_timestamp_ns: i64,
    /// Zero unless the responder stamped it
    pub server_proc_ns: i64,
    /// Bytes of padding after the header; the content is never inspected
    pub payload_len: usize,
}

impl Packet {
    pub fn new(sequence: SequenceNumber, send_timestamp_ns: i64) -> Self {
        Self {
            sequence,
            send_timestamp_ns,
            server_proc_ns: 0,
            payload_len: 0,
        }
    }

    /// Create a packet stamped with the current wall-clock time
    pub fn now(sequence: SequenceNumber) -> Self {
        Self::new(sequence, unix_time_ns())
    }

    /// Serialize into a zero-padded datagram of exactly `total_size` bytes
    pub fn encode(&self, layout: HeaderLayout, total_size: usize) -> Result<Vec<u8>> {
        let required = layout.header_size();
        if total_size < required {
            return Err(ProtocolError::PacketTooSmall {
                required,
                actual: total_size,
            });
        }

        let mut buf = vec![0u8; total_size];
        buf[SEQ_RANGE].copy_from_slice(&self.sequence.0.to_be_bytes());
        buf[SEND_TS_RANGE].copy_from_slice(&(self.send_timestamp_ns as u64).to_be_bytes());
        if layout.carries_server_proc() {
            buf[SERVER_PROC_RANGE].copy_from_slice(&(self.server_proc_ns as u64).to_be_bytes());
        }
        Ok(buf)
    }

    /// Parse a datagram, or `None` if it cannot hold the base header.
    ///
    /// The server processing field is read only when the datagram is long
    /// enough to carry it.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < BASE_HEADER_SIZE {
            debug!(
                expected = BASE_HEADER_SIZE,
                actual = bytes.len(),
                "Datagram shorter than header"
            );
            return None;
        }

        let sequence = SequenceNumber(read_u64(&bytes[SEQ_RANGE]));
        let send_timestamp_ns = read_u64(&bytes[SEND_TS_RANGE]) as i64;
        let server_proc_ns = if bytes.len() >= EXTENDED_HEADER_SIZE {
            read_u64(&bytes[SERVER_PROC_RANGE]) as i64
        } else {
            0
        };

        Some(Packet {
            sequence,
            send_timestamp_ns,
            server_proc_ns,
            payload_len: bytes.len() - BASE_HEADER_SIZE,
        })
    }
}

/// Overwrite the server processing field of an encoded datagram in place.
///
/// Returns false (leaving the buffer untouched) when the datagram is too
/// short to carry the field.
pub fn stamp_server_proc(datagram: &mut [u8], proc_ns: i64) -> bool {
    if datagram.len() < EXTENDED_HEADER_SIZE {
        return false;
    }
    datagram[SERVER_PROC_RANGE].copy_from_slice(&(proc_ns as u64).to_be_bytes());
    true
}

/// Current wall-clock time in nanoseconds since the UNIX epoch
pub fn unix_time_ns() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or_default()
}

fn read_u64(field: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(field);
    u64::from_be_bytes(buf)
}
