//! Error types for the device link

use thiserror::Error;
use tokio_util::codec::{AnyDelimiterCodecError, LinesCodecError};

/// Device link error types
#[derive(Debug, Error)]
pub enum LinkError {
    /// TCP connect failed
    #[error("Connection failed: {0}")]
    Connection(String),

    /// IO error on an established socket
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Connect or idle timeout
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Device sent a line longer than the configured maximum
    #[error("Line exceeds maximum length")]
    LineTooLong,

    /// Invalid link configuration
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Write attempted while no socket is connected
    #[error("Device not connected")]
    NotConnected,
}

/// Result type for link operations
pub type LinkResult<T> = Result<T, LinkError>;

impl From<LinesCodecError> for LinkError {
    fn from(err: LinesCodecError) -> Self {
        match err {
            LinesCodecError::MaxLineLengthExceeded => LinkError::LineTooLong,
            LinesCodecError::Io(e) => LinkError::Io(e),
        }
    }
}

impl From<AnyDelimiterCodecError> for LinkError {
    fn from(err: AnyDelimiterCodecError) -> Self {
        match err {
            AnyDelimiterCodecError::MaxChunkLengthExceeded => LinkError::LineTooLong,
            AnyDelimiterCodecError::Io(e) => LinkError::Io(e),
        }
    }
}
