//! Wire format encoding and decoding.
//!
//! Implements the 9-byte frame header:
//! ```text
//! ┌───────────┬───────┬───────────┐
//! │ Stream ID │ Flags │ Length    │
//! │ 4 bytes   │ 1 byte│ 4 bytes   │
//! │ uint32 BE │       │ uint32 BE │
//! └───────────┴───────┴───────────┘
//! ```
//!
//! All multi-byte integers are Big Endian. Field order and widths are the
//! wire contract; encode and decode must agree exactly.

use crate::error::{Result, TransportError};

/// Logical stream identifier, caller-assigned, unique within one connection.
pub type StreamId = u32;

/// Header size in bytes (fixed, exactly 9).
pub const HEADER_SIZE: usize = 9;

/// Stream id 0 is reserved for connection-level control frames.
pub const CONTROL_STREAM_ID: StreamId = 0;

/// Default maximum frame payload (16 MB).
pub const DEFAULT_MAX_FRAME_PAYLOAD: u32 = 16 * 1024 * 1024;

/// Frame type discriminant carried in the flags byte.
///
/// This is an enum, not a bitmask: any byte value outside the variants below
/// is a malformed frame and fatal to the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameFlags {
    /// Application payload for a stream.
    Data = 0,
    /// Marks a stream (or, on stream 0, the whole connection) closed.
    CloseStream = 1,
    /// Keepalive probe, consumed internally.
    Ping = 2,
}

impl FrameFlags {
    /// Raw wire value.
    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for FrameFlags {
    type Error = TransportError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(FrameFlags::Data),
            1 => Ok(FrameFlags::CloseStream),
            2 => Ok(FrameFlags::Ping),
            other => Err(TransportError::MalformedFrame(format!(
                "unrecognized flags value 0x{other:02x}"
            ))),
        }
    }
}

/// Decoded header in raw wire form.
///
/// Flags are kept as the raw byte here; [`Header::validate`] rejects
/// unrecognized values before a typed [`Frame`](super::Frame) is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Target stream (0 reserved for control frames).
    pub stream_id: StreamId,
    /// Raw flags byte (see [`FrameFlags`]).
    pub flags: u8,
    /// Payload length in bytes.
    pub length: u32,
}

impl Header {
    /// Create a new header.
    pub fn new(stream_id: StreamId, flags: FrameFlags, length: u32) -> Self {
        Self {
            stream_id,
            flags: flags.as_u8(),
            length,
        }
    }

    /// Encode the header to bytes (Big Endian).
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.stream_id.to_be_bytes());
        buf[4] = self.flags;
        buf[5..9].copy_from_slice(&self.length.to_be_bytes());
        buf
    }

    /// Decode a header from bytes (Big Endian).
    ///
    /// Returns `None` if fewer than [`HEADER_SIZE`] bytes are available.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            stream_id: u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]),
            flags: buf[4],
            length: u32::from_be_bytes([buf[5], buf[6], buf[7], buf[8]]),
        })
    }

    /// Validate the header for protocol compliance.
    ///
    /// Checks that the flags byte is a known discriminant, that the claimed
    /// payload length does not exceed `max_payload`, and that DATA frames do
    /// not target the reserved control stream.
    pub fn validate(&self, max_payload: u32) -> Result<FrameFlags> {
        let flags = FrameFlags::try_from(self.flags)?;

        if self.length > max_payload {
            return Err(TransportError::MalformedFrame(format!(
                "payload length {} exceeds maximum {max_payload}",
                self.length
            )));
        }

        if flags == FrameFlags::Data && self.stream_id == CONTROL_STREAM_ID {
            return Err(TransportError::MalformedFrame(
                "DATA frame on reserved stream 0".to_string(),
            ));
        }

        Ok(flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_encode_decode_roundtrip() {
        let original = Header::new(42, FrameFlags::Data, 100);
        let encoded = original.encode();
        let decoded = Header::decode(&encoded).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_header_big_endian_byte_order() {
        let header = Header {
            stream_id: 0x01020304,
            flags: 0x02,
            length: 0x05060708,
        };
        let bytes = header.encode();

        assert_eq!(&bytes[0..4], &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(bytes[4], 0x02);
        assert_eq!(&bytes[5..9], &[0x05, 0x06, 0x07, 0x08]);
    }

    #[test]
    fn test_header_size_is_exactly_nine() {
        assert_eq!(HEADER_SIZE, 9);
        let header = Header::new(1, FrameFlags::Data, 0);
        assert_eq!(header.encode().len(), 9);
    }

    #[test]
    fn test_decode_too_short_buffer() {
        let buf = [0u8; HEADER_SIZE - 1];
        assert!(Header::decode(&buf).is_none());
    }

    #[test]
    fn test_flags_roundtrip() {
        for flags in [FrameFlags::Data, FrameFlags::CloseStream, FrameFlags::Ping] {
            assert_eq!(FrameFlags::try_from(flags.as_u8()).unwrap(), flags);
        }
    }

    #[test]
    fn test_unrecognized_flags_rejected() {
        for value in [3u8, 0x10, 0x80, 0xFF] {
            let result = FrameFlags::try_from(value);
            assert!(matches!(result, Err(TransportError::MalformedFrame(_))));
        }
    }

    #[test]
    fn test_validate_oversized_length() {
        let header = Header::new(1, FrameFlags::Data, 1000);
        let result = header.validate(100);
        assert!(matches!(result, Err(TransportError::MalformedFrame(_))));
    }

    #[test]
    fn test_validate_data_on_control_stream() {
        let header = Header::new(CONTROL_STREAM_ID, FrameFlags::Data, 0);
        let result = header.validate(DEFAULT_MAX_FRAME_PAYLOAD);
        assert!(matches!(result, Err(TransportError::MalformedFrame(_))));
    }

    #[test]
    fn test_validate_control_frames_on_stream_zero() {
        let close = Header::new(CONTROL_STREAM_ID, FrameFlags::CloseStream, 0);
        assert_eq!(
            close.validate(DEFAULT_MAX_FRAME_PAYLOAD).unwrap(),
            FrameFlags::CloseStream
        );

        let ping = Header::new(CONTROL_STREAM_ID, FrameFlags::Ping, 0);
        assert_eq!(
            ping.validate(DEFAULT_MAX_FRAME_PAYLOAD).unwrap(),
            FrameFlags::Ping
        );
    }

    #[test]
    fn test_validate_max_values() {
        let header = Header::new(u32::MAX, FrameFlags::Data, u32::MAX);
        assert!(header.validate(u32::MAX).is_ok());
    }
}
