//! Frame buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management and a two-state
//! machine for fragmented input:
//! - `WaitingForHeader`: need at least 9 bytes
//! - `WaitingForPayload`: header parsed, need N more payload bytes
//!
//! A push that contains several complete frames yields all of them; a
//! trailing partial frame stays buffered for the next push. Validation
//! errors (oversized length, unknown flags) are fatal: the byte stream
//! cannot be resynchronized, so the owning connection must close.

use bytes::{Bytes, BytesMut};

use super::frame::Frame;
use super::wire_format::{FrameFlags, Header, DEFAULT_MAX_FRAME_PAYLOAD, HEADER_SIZE};
use crate::error::Result;

#[derive(Debug, Clone)]
enum State {
    WaitingForHeader,
    WaitingForPayload { header: Header, flags: FrameFlags },
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
pub struct FrameBuffer {
    buffer: BytesMut,
    state: State,
    max_payload: u32,
}

impl FrameBuffer {
    /// Create a frame buffer with the default payload limit.
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_FRAME_PAYLOAD)
    }

    /// Create a frame buffer with a custom payload limit.
    pub fn with_max_payload(max_payload: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            state: State::WaitingForHeader,
            max_payload,
        }
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// Returns the decoded frames in wire order; the vector is empty when
    /// more bytes are needed. Consumed bytes are removed from the buffer,
    /// partial trailing input is retained.
    ///
    /// # Errors
    ///
    /// `MalformedFrame` when a header fails validation. The buffer contents
    /// are unspecified afterwards; the connection must be torn down.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.try_extract_one()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    fn try_extract_one(&mut self) -> Result<Option<Frame>> {
        match &self.state {
            State::WaitingForHeader => {
                let Some(header) = Header::decode(&self.buffer) else {
                    return Ok(None);
                };
                let flags = header.validate(self.max_payload)?;

                let _ = self.buffer.split_to(HEADER_SIZE);

                if header.length == 0 {
                    return Ok(Some(Frame::from_parts(header, flags, Bytes::new())));
                }

                self.state = State::WaitingForPayload { header, flags };
                self.try_extract_one()
            }

            State::WaitingForPayload { header, flags } => {
                let needed = header.length as usize;
                if self.buffer.len() < needed {
                    return Ok(None);
                }

                let payload = self.buffer.split_to(needed).freeze();
                let (header, flags) = (*header, *flags);
                self.state = State::WaitingForHeader;

                Ok(Some(Frame::from_parts(header, flags, payload)))
            }
        }
    }

    /// Get the number of buffered, not yet consumed bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer holds no pending bytes.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match &self.state {
            State::WaitingForHeader => "WaitingForHeader",
            State::WaitingForPayload { .. } => "WaitingForPayload",
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
