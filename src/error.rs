//! Error types for the WebSocket client.
//!
//! The first five variants mirror the failure kinds a caller can observe
//! through [`ClientEvent::Error`](crate::ClientEvent::Error); the rest carry
//! codec-level detail and are mostly seen in logs or in direct use of the
//! [`protocol`](crate::protocol) module.

use thiserror::Error;

/// Result type alias for WebSocket operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during WebSocket operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The stream to the endpoint could not be opened.
    #[error("Connect failed: {0}")]
    ConnectFailed(String),

    /// The upgrade response was not `101` or its headers were malformed.
    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),

    /// I/O error or end of stream inside the read loop.
    #[error("Read failed: {0}")]
    ReadFailed(String),

    /// I/O error while writing a frame.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Protocol violation detected.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// The endpoint URI could not be used.
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Outgoing payload does not fit the 16-bit extended length.
    #[error("Payload too large: {size} bytes (max: {max})")]
    PayloadTooLarge {
        /// Actual payload size.
        size: usize,
        /// Maximum supported size.
        max: usize,
    },

    /// Incoming frame uses the 64-bit length encoding.
    #[error("Unsupported frame length: {0} bytes")]
    UnsupportedLength(u64),

    /// Handshake response exceeded the configured maximum.
    #[error("Handshake too large: {size} bytes (max: {max})")]
    HandshakeTooLarge {
        /// Bytes received so far.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Reserved opcode used.
    #[error("Reserved opcode: {0:#x}")]
    ReservedOpcode(u8),

    /// Invalid UTF-8 in text frame.
    #[error("Invalid UTF-8 in text frame")]
    InvalidUtf8,

    /// Incomplete frame data.
    #[error("Incomplete frame: need {needed} more bytes")]
    IncompleteFrame {
        /// Number of additional bytes needed.
        needed: usize,
    },

    /// The peer closed the stream.
    #[error("Connection closed")]
    ConnectionClosed,

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),
}

impl Error {
    /// Whether the read loop can skip the offending frame and keep going.
    ///
    /// Only errors raised after the codec has already stepped over the whole
    /// frame are recoverable.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedLength(_)
                | Error::PayloadTooLarge { .. }
                | Error::ReservedOpcode(_)
                | Error::InvalidUtf8
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(_: std::str::Utf8Error) -> Self {
        Error::InvalidUtf8
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::InvalidEndpoint(err.to_string())
    }
}
