//! Protocol module for Pathprobe

pub mod error;
pub mod message;

pub use error::{ProtocolError, Result as ProtocolResult};
pub use message::{
    stamp_server_proc, unix_time_ns, HeaderLayout, Packet, SequenceNumber, BASE_HEADER_SIZE,
    EXTENDED_HEADER_SIZE,
};
