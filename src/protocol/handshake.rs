//! Connection handshake preamble.
//!
//! Before any frames flow, both sides send an 8-byte hello:
//! ```text
//! ┌───────────┬───────────┬───────────┐
//! │ Magic     │ Version   │ Reserved  │
//! │ 4 bytes   │ uint16 BE │ uint16 BE │
//! └───────────┴───────────┴───────────┘
//! ```
//! The client sends first; the server queues its own hello on accept and
//! validates the client's as it arrives. A wrong magic or an unequal
//! version is a `HandshakeMismatch` and the attempt is abandoned; there is
//! no version negotiation.

use crate::error::{Result, TransportError};

/// Magic bytes identifying the protocol.
pub const HELLO_MAGIC: [u8; 4] = *b"MUXW";

/// Protocol version spoken by this crate.
pub const PROTOCOL_VERSION: u16 = 1;

/// Hello preamble size in bytes.
pub const HELLO_SIZE: usize = 8;

/// Encode the local hello preamble.
pub fn encode_hello() -> [u8; HELLO_SIZE] {
    let mut buf = [0u8; HELLO_SIZE];
    buf[0..4].copy_from_slice(&HELLO_MAGIC);
    buf[4..6].copy_from_slice(&PROTOCOL_VERSION.to_be_bytes());
    // bytes 6..8 reserved, zero
    buf
}

/// Decode and validate a peer hello.
///
/// Returns the peer's protocol version on success.
pub fn decode_hello(buf: &[u8; HELLO_SIZE]) -> Result<u16> {
    if buf[0..4] != HELLO_MAGIC {
        return Err(TransportError::HandshakeMismatch(format!(
            "bad magic {:02x?}",
            &buf[0..4]
        )));
    }

    let version = u16::from_be_bytes([buf[4], buf[5]]);
    if version != PROTOCOL_VERSION {
        return Err(TransportError::HandshakeMismatch(format!(
            "peer version {version}, local version {PROTOCOL_VERSION}"
        )));
    }

    Ok(version)
}
