//! Error types for sockpipe.

use thiserror::Error;

/// Main error type for channel, decoder and configuration operations.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// I/O error during socket receive/send.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error while loading channel options.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid channel options.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Protocol violation (malformed or unexpected unit).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Declared payload length is above the configured maximum.
    #[error("Payload size {length} exceeds maximum {max}")]
    PayloadTooLarge { length: u64, max: u64 },

    /// The channel has been closed; no further I/O is permitted.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Outbound backpressure did not clear within the send timeout.
    #[error("Backpressure timeout")]
    BackpressureTimeout,
}

impl ChannelError {
    /// True for errors that mean the peer broke the wire protocol.
    #[inline]
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            ChannelError::Protocol(_) | ChannelError::PayloadTooLarge { .. }
        )
    }
}

/// Result type alias using ChannelError.
pub type Result<T> = std::result::Result<T, ChannelError>;
