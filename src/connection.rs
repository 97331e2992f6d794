//! Connection lifecycle and the poll-and-drain pump.
//!
//! A [`Connection`] exclusively owns one TCP socket, its read buffer, its
//! write queue, and the stream demultiplexer. The lifecycle is
//! `CONNECTING → OPEN → CLOSING → CLOSED`; once CLOSED, every operation
//! fails with `ConnectionClosed` and the connection cannot be revived —
//! callers construct a new one to retry.
//!
//! `recv()` is the engine: each call flushes pending writes, performs
//! non-blocking reads until the socket runs dry, feeds the frame codec,
//! ingests decoded frames into the demultiplexer, and returns whatever has
//! accumulated. It never waits for data; an empty batch is the normal "no
//! data yet" outcome.

use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{debug, trace, warn};

use crate::config::ConnectionConfig;
use crate::demux::StreamDemux;
use crate::error::{Result, TransportError};
use crate::protocol::{
    decode_hello, encode_hello, Frame, FrameBuffer, FrameFlags, StreamId, CONTROL_STREAM_ID,
    HELLO_SIZE,
};
use crate::transport::TcpTransport;
use crate::writer::WriteQueue;

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Handshake in progress (server-side accepts only; `connect` completes
    /// the handshake before returning).
    Connecting,
    /// Handshake complete; `send`/`recv` are live.
    Open,
    /// Close signal seen (local or remote); draining.
    Closing,
    /// Terminal. No operation may be issued.
    Closed,
}

/// Lightweight transfer counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectionStats {
    /// Frames decoded from the socket.
    pub frames_received: u64,
    /// Frames queued for transmission.
    pub frames_sent: u64,
    /// Raw bytes read from the socket.
    pub bytes_received: u64,
    /// Raw payload bytes accepted by `send`.
    pub bytes_sent: u64,
}

/// Server-side handshake progress.
struct HandshakeProgress {
    buf: [u8; HELLO_SIZE],
    filled: usize,
    started: Instant,
}

/// One multiplexed transport connection.
pub struct Connection {
    transport: TcpTransport,
    config: ConnectionConfig,
    state: ConnectionState,
    frame_buffer: FrameBuffer,
    demux: StreamDemux,
    write_queue: WriteQueue,
    read_buf: Vec<u8>,
    handshake: Option<HandshakeProgress>,
    last_activity: Instant,
    stats: ConnectionStats,
}

impl Connection {
    /// Connect to a server with the default configuration.
    pub async fn connect(addr: &str) -> Result<Self> {
        Self::connect_with_config(addr, ConnectionConfig::default()).await
    }

    /// Connect to a server at `addr` (`host:port`).
    ///
    /// Opens the socket and performs the hello exchange before returning.
    /// Fails with `ConnectFailed` when the peer is unreachable, refuses, or
    /// the handshake times out, and `HandshakeMismatch` when the peer
    /// speaks a different protocol version. A failed attempt cannot be
    /// retried; construct a new connection instead.
    pub async fn connect_with_config(addr: &str, config: ConnectionConfig) -> Result<Self> {
        let mut transport = TcpTransport::connect(addr)
            .await
            .map_err(|e| TransportError::ConnectFailed(format!("{addr}: {e}")))?;
        if config.nodelay {
            let _ = transport.set_nodelay(true);
        }

        let exchange = async {
            transport.write_all(&encode_hello()).await?;
            let mut buf = [0u8; HELLO_SIZE];
            transport.read_exact(&mut buf).await?;
            Ok::<_, std::io::Error>(buf)
        };

        let hello = match tokio::time::timeout(config.handshake_timeout, exchange).await {
            Ok(Ok(buf)) => buf,
            Ok(Err(e)) => {
                return Err(TransportError::ConnectFailed(format!(
                    "handshake I/O failed: {e}"
                )))
            }
            Err(_) => {
                return Err(TransportError::ConnectFailed(
                    "handshake timed out".to_string(),
                ))
            }
        };
        let version = decode_hello(&hello)?;
        debug!(addr, version, "connection established");

        Ok(Self::assemble(transport, config, ConnectionState::Open))
    }

    /// Adopt an accepted socket (server side).
    ///
    /// The connection starts in CONNECTING; the local hello is queued
    /// immediately and [`recv`](Self::recv) drives the rest of the
    /// handshake incrementally until the peer hello arrives.
    pub(crate) fn accept(stream: tokio::net::TcpStream, config: ConnectionConfig) -> Self {
        let transport = TcpTransport::new(stream);
        if config.nodelay {
            let _ = transport.set_nodelay(true);
        }

        let mut conn = Self::assemble(transport, config, ConnectionState::Connecting);
        conn.handshake = Some(HandshakeProgress {
            buf: [0u8; HELLO_SIZE],
            filled: 0,
            started: Instant::now(),
        });
        conn.write_queue
            .push_control(Bytes::copy_from_slice(&encode_hello()));
        conn
    }

    fn assemble(transport: TcpTransport, config: ConnectionConfig, state: ConnectionState) -> Self {
        Self {
            frame_buffer: FrameBuffer::with_max_payload(config.max_frame_payload),
            write_queue: WriteQueue::new(config.max_pending_frames),
            read_buf: vec![0u8; config.read_buffer_size],
            demux: StreamDemux::new(),
            handshake: None,
            last_activity: Instant::now(),
            stats: ConnectionStats::default(),
            transport,
            config,
            state,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Transfer counters for this connection.
    pub fn stats(&self) -> ConnectionStats {
        self.stats
    }

    /// Time since the last byte (or ping) arrived from the peer.
    pub fn idle_time(&self) -> Duration {
        self.last_activity.elapsed()
    }

    /// DATA frames discarded because their stream was already closed.
    pub fn dropped_frames(&self) -> u64 {
        self.demux.dropped_frames()
    }

    /// Queue `data` as one DATA frame on `stream_id`.
    ///
    /// Valid only while OPEN. Transmission is asynchronous relative to this
    /// call: the frame goes out during this call's opportunistic flush or a
    /// later `recv`/`close`. Payloads larger than `max_frame_payload` fail
    /// with `PayloadTooLarge` and leave the connection untouched; chunking
    /// is the caller's responsibility.
    pub fn send(&mut self, stream_id: StreamId, data: &[u8]) -> Result<()> {
        if self.state != ConnectionState::Open {
            return Err(TransportError::ConnectionClosed);
        }
        if stream_id == CONTROL_STREAM_ID {
            return Err(TransportError::InvalidStreamId);
        }
        let max = self.config.max_frame_payload as usize;
        if data.len() > max {
            return Err(TransportError::PayloadTooLarge {
                len: data.len(),
                max,
            });
        }

        let frame = Frame::data(stream_id, Bytes::copy_from_slice(data));
        self.write_queue.push(frame.encode())?;
        self.stats.frames_sent += 1;
        self.stats.bytes_sent += data.len() as u64;
        trace!(stream_id, bytes = data.len(), "frame queued");

        self.flush_writes()
    }

    /// Mark `stream_id` closed on the peer.
    ///
    /// Sends a CLOSE_STREAM frame; any DATA the peer receives for this
    /// stream afterwards is dropped on its side. The local side keeps
    /// delivering frames that were already in flight.
    pub fn close_stream(&mut self, stream_id: StreamId) -> Result<()> {
        if self.state != ConnectionState::Open {
            return Err(TransportError::ConnectionClosed);
        }
        if stream_id == CONTROL_STREAM_ID {
            return Err(TransportError::InvalidStreamId);
        }
        self.write_queue.push(Frame::close_stream(stream_id).encode())?;
        self.stats.frames_sent += 1;
        trace!(stream_id, "close_stream queued");
        self.flush_writes()
    }

    /// Queue a keepalive PING frame.
    pub fn ping(&mut self) -> Result<()> {
        if self.state != ConnectionState::Open {
            return Err(TransportError::ConnectionClosed);
        }
        self.write_queue.push(Frame::ping().encode())?;
        self.stats.frames_sent += 1;
        self.flush_writes()
    }

    /// One poll-and-drain cycle.
    ///
    /// Flushes pending writes, pumps the socket without blocking, and
    /// returns every payload the demultiplexer has accumulated, in arrival
    /// order. Never waits for data. I/O failures close the connection and
    /// surface as `ConnectionClosed`; an undecodable frame closes it and
    /// surfaces once as `MalformedFrame`.
    pub async fn recv(&mut self) -> Result<Vec<(StreamId, Bytes)>> {
        match self.state {
            ConnectionState::Closed => return Err(TransportError::ConnectionClosed),
            ConnectionState::Connecting => {
                if !self.drive_handshake()? {
                    return Ok(Vec::new());
                }
            }
            ConnectionState::Open | ConnectionState::Closing => {}
        }

        self.flush_writes()?;
        self.pump()?;

        let batch = self.demux.drain();
        if self.state == ConnectionState::Closing {
            // Remote termination: the final drain has been harvested.
            self.state = ConnectionState::Closed;
            debug!("connection closed by peer");
        }
        Ok(batch)
    }

    /// Close the connection. Idempotent; never an error.
    ///
    /// Flushes the write queue best-effort within `close_flush_timeout`,
    /// sends the termination signal (CLOSE_STREAM on stream 0), and shuts
    /// the socket down. Calling `close` on an already-CLOSED connection is
    /// a no-op.
    pub async fn close(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }
        self.state = ConnectionState::Closing;

        // Termination signal goes out behind any queued data.
        self.write_queue
            .push_control(Frame::close_stream(CONTROL_STREAM_ID).encode());

        let deadline = tokio::time::Instant::now() + self.config.close_flush_timeout;
        while !self.write_queue.is_empty() {
            match self.write_queue.flush(&self.transport) {
                Ok(crate::writer::FlushState::Drained) => break,
                Ok(crate::writer::FlushState::Pending) => {
                    if tokio::time::Instant::now() >= deadline {
                        warn!(
                            pending = self.write_queue.len(),
                            "close flush timed out, discarding queued frames"
                        );
                        break;
                    }
                    match tokio::time::timeout_at(deadline, self.transport.writable()).await {
                        Ok(Ok(())) => continue,
                        _ => break,
                    }
                }
                Err(e) => {
                    debug!(error = %e, "flush failed during close");
                    break;
                }
            }
        }

        let _ = self.transport.shutdown().await;
        self.state = ConnectionState::Closed;
        debug!("connection closed");
    }

    /// Drive the server-side handshake. Returns `Ok(true)` once OPEN.
    fn drive_handshake(&mut self) -> Result<bool> {
        if let Err(e) = self.write_queue.flush(&self.transport) {
            self.state = ConnectionState::Closed;
            warn!(error = %e, "handshake write failed");
            return Err(TransportError::ConnectionClosed);
        }

        let mut scratch = [0u8; 256];
        loop {
            match self.transport.try_read(&mut scratch) {
                Ok(0) => {
                    self.state = ConnectionState::Closed;
                    return Err(TransportError::ConnectionClosed);
                }
                Ok(n) => {
                    let take = {
                        let Some(hs) = self.handshake.as_mut() else {
                            self.state = ConnectionState::Closed;
                            return Err(TransportError::ConnectionClosed);
                        };
                        let take = (HELLO_SIZE - hs.filled).min(n);
                        hs.buf[hs.filled..hs.filled + take].copy_from_slice(&scratch[..take]);
                        hs.filled += take;
                        if hs.filled < HELLO_SIZE {
                            continue;
                        }
                        take
                    };

                    let hello = self.handshake.take().map(|hs| hs.buf).unwrap_or_default();
                    if let Err(e) = decode_hello(&hello) {
                        self.state = ConnectionState::Closed;
                        warn!(error = %e, "handshake rejected");
                        return Err(e);
                    }
                    self.state = ConnectionState::Open;
                    self.last_activity = Instant::now();
                    debug!("handshake accepted");

                    // Bytes trailing the hello are already frames.
                    if take < n {
                        match self.frame_buffer.push(&scratch[take..n]) {
                            Ok(frames) => {
                                for frame in frames {
                                    self.stats.frames_received += 1;
                                    self.handle_frame(frame);
                                }
                            }
                            Err(e) => {
                                self.state = ConnectionState::Closed;
                                warn!(error = %e, "malformed frame, closing connection");
                                return Err(e);
                            }
                        }
                    }
                    return Ok(true);
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => return Ok(false),
                Err(e) => {
                    self.state = ConnectionState::Closed;
                    warn!(error = %e, "handshake read failed");
                    return Err(TransportError::ConnectionClosed);
                }
            }
        }
    }

    /// Check whether a server-side handshake has outlived its deadline.
    pub(crate) fn handshake_expired(&self) -> bool {
        match (&self.state, &self.handshake) {
            (ConnectionState::Connecting, Some(hs)) => {
                hs.started.elapsed() > self.config.handshake_timeout
            }
            _ => false,
        }
    }

    /// Non-blocking read pump: drain the socket, decode, ingest.
    fn pump(&mut self) -> Result<()> {
        loop {
            match self.transport.try_read(&mut self.read_buf) {
                Ok(0) => {
                    // EOF: peer is gone. Deliver what we have, then close.
                    self.state = ConnectionState::Closing;
                    return Ok(());
                }
                Ok(n) => {
                    self.last_activity = Instant::now();
                    self.stats.bytes_received += n as u64;

                    let frames = match self.frame_buffer.push(&self.read_buf[..n]) {
                        Ok(frames) => frames,
                        Err(e) => {
                            // Cannot resynchronize after a corrupt frame.
                            self.state = ConnectionState::Closed;
                            warn!(error = %e, "malformed frame, closing connection");
                            return Err(e);
                        }
                    };
                    for frame in frames {
                        self.stats.frames_received += 1;
                        self.handle_frame(frame);
                    }
                    if self.state == ConnectionState::Closing {
                        return Ok(());
                    }
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) => {
                    self.state = ConnectionState::Closed;
                    warn!(error = %e, "read failed, closing connection");
                    return Err(TransportError::ConnectionClosed);
                }
            }
        }
    }

    fn handle_frame(&mut self, frame: Frame) {
        if frame.flags == FrameFlags::CloseStream && frame.is_control() {
            // Connection termination signal.
            trace!("termination signal received");
            self.state = ConnectionState::Closing;
            return;
        }
        self.demux.ingest(frame);
    }

    /// Flush queued writes; I/O failure closes the connection.
    fn flush_writes(&mut self) -> Result<()> {
        match self.write_queue.flush(&self.transport) {
            Ok(_) => Ok(()),
            Err(e) => {
                self.state = ConnectionState::Closed;
                warn!(error = %e, "write failed, closing connection");
                Err(TransportError::ConnectionClosed)
            }
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("state", &self.state)
            .field("peer", &self.transport.peer_addr().ok())
            .field("pending_writes", &self.write_queue.len())
            .field("pending_reads", &self.demux.pending())
            .finish()
    }
}
