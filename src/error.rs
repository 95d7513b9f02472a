//! Error types for oiswire.

use thiserror::Error;

/// Main error type for all oiswire operations.
///
/// Protocol-level faults (line noise, state violations, buffer overflow)
/// never surface as errors — `poll()` recovers locally and reports through
/// the log hook. `OisError` is returned only from registration and
/// configuration APIs and from transport implementations.
#[derive(Debug, Error)]
pub enum OisError {
    /// I/O error from the underlying transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Protocol error (invalid frame, bad handshake parameters, etc.).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A declared name exceeds `MAX_NAME_LENGTH` bytes.
    #[error("Name exceeds maximum length: {0} bytes")]
    NameTooLong(usize),

    /// A declared name contains a framing delimiter (`\n`, `\0` or `,`).
    #[error("Name contains a reserved delimiter: {0:?}")]
    InvalidName(String),

    /// A channel number is already registered in the same catalog list.
    #[error("Channel {0} is already registered")]
    DuplicateChannel(u16),
}

/// Result type alias using OisError.
pub type Result<T> = std::result::Result<T, OisError>;
