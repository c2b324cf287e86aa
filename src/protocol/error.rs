use thiserror::Error;

/// Protocol-level errors for packet encoding
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Packet too small: header needs {required} bytes, got {actual}")]
    PacketTooSmall { required: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
