//! # muxwire
//!
//! Multiplexed logical byte-streams over a single TCP connection.
//!
//! Frames carry a stream id, a type flag, and a length-prefixed payload;
//! independent streams share one socket and one handshake. The public
//! surface is five operations: `connect`, `listen`, `send`, `recv`,
//! `close`.
//!
//! `recv()` is deliberately non-blocking: each call performs one
//! poll-and-drain cycle — flush pending writes, read whatever the socket
//! holds, decode, demultiplex — and returns the accumulated
//! `(stream_id, payload)` batch, which may be empty. Callers provide their
//! own scheduling loop.
//!
//! ## Example
//!
//! ```ignore
//! use muxwire::{Connection, Server};
//!
//! #[tokio::main]
//! async fn main() -> muxwire::Result<()> {
//!     let mut server = Server::listen("127.0.0.1:8080").await?;
//!
//!     // The server completes handshakes inside recv(), so the client
//!     // connects from its own task while the server loop runs.
//!     tokio::spawn(async {
//!         let mut client = Connection::connect("127.0.0.1:8080").await?;
//!         client.send(1, b"hello")?;
//!         muxwire::Result::Ok(())
//!     });
//!
//!     loop {
//!         let batch = server.recv().await?;
//!         for (stream_id, payload) in batch {
//!             println!("stream {stream_id}: {payload:?}");
//!         }
//!     }
//! }
//! ```

pub mod config;
pub mod demux;
pub mod error;
pub mod protocol;
pub mod transport;

mod connection;
mod server;
mod writer;

pub use config::ConnectionConfig;
pub use connection::{Connection, ConnectionState, ConnectionStats};
pub use error::{Result, TransportError};
pub use protocol::StreamId;
pub use server::{ConnectionId, Server};
