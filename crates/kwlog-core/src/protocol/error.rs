//! Protocol errors

use thiserror::Error;

/// Errors that can occur during protocol communication
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Serial port error: {0}")]
    SerialError(String),

    #[error("No K-line interface found")]
    NoDevice,

    #[error("Port not found: {0}")]
    PortNotFound(String),

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Response mismatch at offset {offset}: expected {expected:#04x}, got {actual:#04x}")]
    ResponseMismatch {
        offset: usize,
        expected: u8,
        actual: u8,
    },

    #[error("Short response: expected {expected} bytes, got {actual}")]
    ShortResponse { expected: usize, actual: usize },

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
