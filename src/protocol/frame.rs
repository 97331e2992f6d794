//! Typed frame representation.
//!
//! A [`Frame`] is one decoded (and validated) unit of the wire protocol.
//! Payloads use `bytes::Bytes` for zero-copy sharing between the read
//! buffer and the per-stream receive queues.

use bytes::Bytes;

use super::wire_format::{FrameFlags, Header, StreamId, CONTROL_STREAM_ID, HEADER_SIZE};

/// A complete, validated protocol frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Target stream.
    pub stream_id: StreamId,
    /// Frame type.
    pub flags: FrameFlags,
    /// Payload bytes (empty for control frames).
    pub payload: Bytes,
}

impl Frame {
    /// Create a DATA frame carrying `payload` on `stream_id`.
    pub fn data(stream_id: StreamId, payload: Bytes) -> Self {
        Self {
            stream_id,
            flags: FrameFlags::Data,
            payload,
        }
    }

    /// Create a CLOSE_STREAM frame for `stream_id`.
    ///
    /// On the reserved stream 0 this is the connection termination signal.
    pub fn close_stream(stream_id: StreamId) -> Self {
        Self {
            stream_id,
            flags: FrameFlags::CloseStream,
            payload: Bytes::new(),
        }
    }

    /// Create a PING frame on the control stream.
    pub fn ping() -> Self {
        Self {
            stream_id: CONTROL_STREAM_ID,
            flags: FrameFlags::Ping,
            payload: Bytes::new(),
        }
    }

    /// Assemble a frame from a validated header and its payload.
    pub(crate) fn from_parts(header: Header, flags: FrameFlags, payload: Bytes) -> Self {
        Self {
            stream_id: header.stream_id,
            flags,
            payload,
        }
    }

    /// Get the payload length.
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Check whether this frame targets the reserved control stream.
    #[inline]
    pub fn is_control(&self) -> bool {
        self.stream_id == CONTROL_STREAM_ID
    }

    /// Encode header and payload into a contiguous buffer.
    pub fn encode(&self) -> Bytes {
        let header = Header::new(self.stream_id, self.flags, self.payload.len() as u32);
        let mut buf = Vec::with_capacity(HEADER_SIZE + self.payload.len());
        buf.extend_from_slice(&header.encode());
        buf.extend_from_slice(&self.payload);
        Bytes::from(buf)
    }
}
