//! Error types for muxwire.

use thiserror::Error;

/// Main error type for all transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// I/O error during socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection establishment failed (unreachable, refused, timed out).
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// Listener could not bind the requested address.
    #[error("bind failed: {0}")]
    BindFailed(String),

    /// Peer spoke an incompatible protocol during the handshake.
    #[error("handshake mismatch: {0}")]
    HandshakeMismatch(String),

    /// Frame could not be decoded safely. Fatal to the connection: the byte
    /// stream cannot be resynchronized after a corrupt frame.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// Payload exceeds the configured maximum frame payload size.
    #[error("payload of {len} bytes exceeds maximum {max}")]
    PayloadTooLarge { len: usize, max: usize },

    /// Stream id 0 is reserved for control frames.
    #[error("stream id 0 is reserved")]
    InvalidStreamId,

    /// Operation issued against a connection that is no longer open.
    #[error("connection closed")]
    ConnectionClosed,

    /// Write queue is at capacity; the peer is not draining fast enough.
    #[error("write queue full")]
    Backpressure,

    /// Server-side send targeted a connection id that is not active.
    #[error("unknown connection id: {0}")]
    UnknownConnection(u64),

    /// Server-side send targeted a stream id with no known route.
    #[error("no route for stream id: {0}")]
    UnknownStream(u32),
}

/// Result type alias using TransportError.
pub type Result<T> = std::result::Result<T, TransportError>;
