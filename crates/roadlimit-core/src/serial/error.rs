//! Serial link errors

use thiserror::Error;

/// Errors from the TTL display link
#[derive(Error, Debug)]
pub enum SerialError {
    #[error("serial port error: {0}")]
    Port(String),

    #[error("no serial port found")]
    NoPortFound,

    #[error("display value {0} outside 0-255")]
    ValueOutOfRange(u32),

    #[error("TTL device not connected")]
    NotConnected,

    #[error("expected to write 1 byte, wrote {0}")]
    ShortWrite(usize),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
