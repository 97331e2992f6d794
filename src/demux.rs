//! Stream demultiplexer.
//!
//! Routes decoded frames into per-stream receive state and hands completed
//! payloads back to the application in arrival order. The ready queue is a
//! single arrival-ordered sequence of `(stream_id, payload)` pairs: that
//! preserves both the cross-stream ordering (arrival order) and the
//! within-stream FIFO ordering the protocol guarantees.

use std::collections::{HashSet, VecDeque};

use bytes::Bytes;
use tracing::{trace, warn};

use crate::protocol::{Frame, FrameFlags, StreamId};

/// Per-connection demultiplexer for inbound frames.
#[derive(Debug, Default)]
pub struct StreamDemux {
    /// Payloads ready for the next `drain`, in ingest order.
    ready: VecDeque<(StreamId, Bytes)>,
    /// Streams the peer has closed.
    closed: HashSet<StreamId>,
    /// DATA frames dropped because their stream was already closed.
    dropped_frames: u64,
    /// PING frames consumed.
    pings_seen: u64,
}

impl StreamDemux {
    /// Create an empty demultiplexer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest one decoded frame.
    ///
    /// DATA payloads are queued for `drain`; DATA for a closed stream is a
    /// protocol violation by the peer, dropped and logged but not fatal.
    /// CLOSE_STREAM marks the stream closed. PING frames are consumed here
    /// and never surfaced.
    pub fn ingest(&mut self, frame: Frame) {
        match frame.flags {
            FrameFlags::Data => {
                if self.closed.contains(&frame.stream_id) {
                    warn!(
                        stream_id = frame.stream_id,
                        bytes = frame.payload.len(),
                        "dropping DATA frame for closed stream"
                    );
                    self.dropped_frames += 1;
                    return;
                }
                self.ready.push_back((frame.stream_id, frame.payload));
            }
            FrameFlags::CloseStream => {
                trace!(stream_id = frame.stream_id, "stream closed by peer");
                self.closed.insert(frame.stream_id);
            }
            FrameFlags::Ping => {
                trace!("ping received");
                self.pings_seen += 1;
            }
        }
    }

    /// Drain all queued payloads in ingest order, clearing the queue.
    ///
    /// An empty result means no data is currently available; that is not an
    /// error.
    pub fn drain(&mut self) -> Vec<(StreamId, Bytes)> {
        self.ready.drain(..).collect()
    }

    /// Number of payloads awaiting the next drain.
    pub fn pending(&self) -> usize {
        self.ready.len()
    }

    /// Check whether a stream has been closed by the peer.
    pub fn is_stream_closed(&self, stream_id: StreamId) -> bool {
        self.closed.contains(&stream_id)
    }

    /// DATA frames dropped due to closed streams.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    /// PING frames consumed so far.
    pub fn pings_seen(&self) -> u64 {
        self.pings_seen
    }
}
