//! Listener and connection set.
//!
//! A [`Server`] owns the listening socket and every accepted [`Connection`].
//! Its `recv()` is one housekeeping pass over the whole set: accept pending
//! sockets, drive in-progress handshakes, pump every live connection, and
//! sweep out the dead ones. The non-blocking contract matches the
//! connection-level `recv()` — one call, one poll-and-drain cycle.
//!
//! Outbound routing follows the explicit-destination rule: `send_to` names
//! the target connection, while the `send` convenience routes a stream id to
//! the connection that most recently produced it.

use std::collections::{BTreeMap, HashMap};

use bytes::Bytes;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::config::ConnectionConfig;
use crate::connection::{Connection, ConnectionState};
use crate::error::{Result, TransportError};
use crate::protocol::StreamId;
use crate::transport::try_accept;

/// Identifier assigned to each accepted connection, unique per server.
pub type ConnectionId = u64;

/// A bound listener multiplexing many connections behind one `recv()`.
pub struct Server {
    listener: TcpListener,
    config: ConnectionConfig,
    /// BTreeMap keeps the pump order stable (ids are assigned in accept
    /// order).
    connections: BTreeMap<ConnectionId, Connection>,
    /// Last connection to produce each inbound stream id.
    routes: HashMap<StreamId, ConnectionId>,
    next_id: ConnectionId,
}

impl Server {
    /// Bind `addr` (`host:port`) with the default configuration.
    pub async fn listen(addr: &str) -> Result<Self> {
        Self::listen_with_config(addr, ConnectionConfig::default()).await
    }

    /// Bind `addr` and begin accepting connections.
    ///
    /// Fails with `BindFailed` when the address is unavailable.
    pub async fn listen_with_config(addr: &str, config: ConnectionConfig) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| TransportError::BindFailed(format!("{addr}: {e}")))?;
        info!(addr, "listening");

        Ok(Self {
            listener,
            config,
            connections: BTreeMap::new(),
            routes: HashMap::new(),
            next_id: 1,
        })
    }

    /// Local address of the listening socket.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Number of currently owned connections (including handshaking ones).
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Aggregate poll-and-drain across all connections.
    ///
    /// Equivalent to [`recv_from`](Self::recv_from) with the connection ids
    /// stripped.
    pub async fn recv(&mut self) -> Result<Vec<(StreamId, Bytes)>> {
        Ok(self
            .recv_from()
            .await?
            .into_iter()
            .map(|(_, stream_id, payload)| (stream_id, payload))
            .collect())
    }

    /// Aggregate poll-and-drain, reporting the originating connection.
    ///
    /// Performs one housekeeping pass: accepts pending sockets, drives
    /// handshakes, pumps every connection, and removes CLOSED ones (their
    /// undelivered buffers are discarded). Arrival order is preserved per
    /// connection. Never blocks waiting for data.
    pub async fn recv_from(&mut self) -> Result<Vec<(ConnectionId, StreamId, Bytes)>> {
        self.accept_pending().await;

        let mut out = Vec::new();
        let mut dead = Vec::new();

        for (&id, conn) in self.connections.iter_mut() {
            if conn.handshake_expired() {
                warn!(conn_id = id, "handshake timed out, dropping connection");
                dead.push(id);
                continue;
            }

            match conn.recv().await {
                Ok(batch) => {
                    for (stream_id, payload) in batch {
                        out.push((id, stream_id, payload));
                    }
                }
                Err(e) => {
                    warn!(conn_id = id, error = %e, "connection failed");
                    dead.push(id);
                }
            }

            if conn.state() == ConnectionState::Closed {
                dead.push(id);
            }
        }

        for id in dead {
            if self.connections.remove(&id).is_some() {
                debug!(conn_id = id, "connection removed");
            }
        }
        self.routes
            .retain(|_, conn_id| self.connections.contains_key(conn_id));
        for (conn_id, stream_id, _) in &out {
            self.routes.insert(*stream_id, *conn_id);
        }

        Ok(out)
    }

    /// Send on `stream_id`, routed to the connection that last produced it.
    ///
    /// Fails with `UnknownStream` when no connection has produced this
    /// stream id yet; use [`send_to`](Self::send_to) to target explicitly.
    pub fn send(&mut self, stream_id: StreamId, data: &[u8]) -> Result<()> {
        let conn_id = *self
            .routes
            .get(&stream_id)
            .ok_or(TransportError::UnknownStream(stream_id))?;
        self.send_to(conn_id, stream_id, data)
    }

    /// Send on `stream_id` of a specific connection.
    pub fn send_to(&mut self, conn_id: ConnectionId, stream_id: StreamId, data: &[u8]) -> Result<()> {
        let conn = self
            .connections
            .get_mut(&conn_id)
            .ok_or(TransportError::UnknownConnection(conn_id))?;
        conn.send(stream_id, data)
    }

    /// Close every owned connection. Idempotent.
    pub async fn close(&mut self) {
        for (id, conn) in self.connections.iter_mut() {
            debug!(conn_id = id, "closing connection");
            conn.close().await;
        }
        self.connections.clear();
        self.routes.clear();
    }

    /// Accept every connection currently queued on the listener.
    async fn accept_pending(&mut self) {
        while let Some(result) = try_accept(&self.listener).await {
            match result {
                Ok((stream, peer)) => {
                    if self.connections.len() >= self.config.max_connections {
                        warn!(%peer, "connection limit reached, rejecting");
                        drop(stream);
                        continue;
                    }
                    let id = self.next_id;
                    self.next_id += 1;
                    debug!(conn_id = id, %peer, "connection accepted");
                    self.connections
                        .insert(id, Connection::accept(stream, self.config.clone()));
                }
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    break;
                }
            }
        }
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("local_addr", &self.listener.local_addr().ok())
            .field("connections", &self.connections.len())
            .finish()
    }
}
