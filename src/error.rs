//! Error types for tickwire.

use thiserror::Error;

/// Main error type for all tickwire operations.
#[derive(Debug, Error)]
pub enum TickwireError {
    /// I/O error during socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error (configuration loading only).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// Protocol error (malformed frame, impossible length, etc.).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// No message type is registered for this id.
    #[error("Unknown message ID: {0}")]
    UnknownMessageId(u16),

    /// The message type was never registered.
    #[error("Message type not registered: {0}")]
    UnregisteredMessage(&'static str),

    /// Registration collided with an existing id or type.
    #[error("Message ID already registered: {0}")]
    DuplicateMessageId(u16),

    /// The message type is already registered under another id.
    #[error("Message type already registered: {0}")]
    DuplicateMessageType(&'static str),

    /// Encoded frame does not fit the 16-bit length field.
    #[error("Frame size {size} exceeds maximum {max}")]
    FrameTooLarge {
        /// Total frame size including header.
        size: usize,
        /// Largest representable frame.
        max: usize,
    },

    /// `connect` called while a connection is established.
    #[error("Already connected")]
    AlreadyConnected,

    /// `connect` or `close` called while a connect is in flight.
    #[error("Connection attempt in progress")]
    AlreadyConnecting,

    /// Operation requires an established connection.
    #[error("Not connected")]
    NotConnected,

    /// Operation rejected because a close is pending.
    #[error("Connection is closing")]
    Closing,

    /// Background session is gone.
    #[error("Connection closed")]
    ConnectionClosed,
}

/// Result type alias using TickwireError.
pub type Result<T> = std::result::Result<T, TickwireError>;
