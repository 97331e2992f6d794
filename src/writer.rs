//! Ordered write queue with whole-frame flush semantics.
//!
//! Queued frames are flushed with non-blocking writes. A partial write
//! leaves a cursor into the front frame so the remainder goes out first on
//! the next flush — a frame is either fully written to the socket or stays
//! at the head of the queue; it is never abandoned mid-frame.
//!
//! The queue carries a pending-frame limit as the basic backpressure
//! mechanism: once full, `push` reports `Backpressure` and the caller must
//! drain the connection before sending more.

use std::collections::VecDeque;
use std::io;

use bytes::Bytes;

use crate::error::{Result, TransportError};

/// Non-blocking write seam, implemented by the TCP transport.
///
/// Mirrors `TcpStream::try_write`: returns the number of bytes accepted or
/// `WouldBlock` when the socket cannot take more right now.
pub(crate) trait TryWrite {
    fn try_write(&self, buf: &[u8]) -> io::Result<usize>;
}

/// Outcome of a flush pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FlushState {
    /// Everything queued has been handed to the socket.
    Drained,
    /// The socket stopped accepting bytes; frames remain queued.
    Pending,
}

/// Ordered queue of encoded frames awaiting transmission.
#[derive(Debug)]
pub(crate) struct WriteQueue {
    chunks: VecDeque<Bytes>,
    /// Bytes of the front chunk already written.
    offset: usize,
    limit: usize,
}

impl WriteQueue {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            chunks: VecDeque::new(),
            offset: 0,
            limit,
        }
    }

    /// Queue an encoded frame, subject to the backpressure limit.
    pub(crate) fn push(&mut self, chunk: Bytes) -> Result<()> {
        if self.chunks.len() >= self.limit {
            return Err(TransportError::Backpressure);
        }
        self.chunks.push_back(chunk);
        Ok(())
    }

    /// Queue a control frame, bypassing the limit.
    ///
    /// Used for the handshake hello and the close termination signal, which
    /// must go out even when the queue is saturated.
    pub(crate) fn push_control(&mut self, chunk: Bytes) {
        self.chunks.push_back(chunk);
    }

    /// Write as much queued data as the socket accepts right now.
    ///
    /// `WouldBlock` is not an error; it ends the pass with `Pending`. A
    /// zero-length write is reported as `WriteZero`.
    pub(crate) fn flush<W: TryWrite>(&mut self, writer: &W) -> io::Result<FlushState> {
        while let Some(front) = self.chunks.front() {
            match writer.try_write(&front[self.offset..]) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "socket accepted zero bytes",
                    ));
                }
                Ok(n) => {
                    self.offset += n;
                    if self.offset == front.len() {
                        self.chunks.pop_front();
                        self.offset = 0;
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Ok(FlushState::Pending);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(FlushState::Drained)
    }

    /// Number of frames still queued.
    pub(crate) fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Check whether nothing is queued.
    pub(crate) fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}
