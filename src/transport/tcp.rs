//! TCP socket wrapper.
//!
//! Exposes the split personality the connection needs: awaitable I/O for
//! connection establishment (handshake, shutdown) and strictly non-blocking
//! `try_read`/`try_write` for the steady-state poll-and-drain cycle.

use std::io;
use std::net::SocketAddr;
use std::task::Poll;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::writer::TryWrite;

/// A connected TCP socket.
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    /// Wrap an already-connected stream (server accept path).
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }

    /// Open a client connection to `addr` (`host:port`).
    pub async fn connect(addr: &str) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self { stream })
    }

    /// Set TCP_NODELAY.
    pub fn set_nodelay(&self, nodelay: bool) -> io::Result<()> {
        self.stream.set_nodelay(nodelay)
    }

    /// Non-blocking read; `WouldBlock` when no bytes are ready.
    pub fn try_read(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.try_read(buf)
    }

    /// Wait until the socket is writable.
    pub async fn writable(&self) -> io::Result<()> {
        self.stream.writable().await
    }

    /// Blocking write of the whole buffer (handshake path only).
    pub async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.stream.write_all(buf).await
    }

    /// Blocking read filling the whole buffer (handshake path only).
    pub async fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.stream.read_exact(buf).await.map(|_| ())
    }

    /// Shut down the write half, signalling EOF to the peer.
    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.stream.shutdown().await
    }

    /// Peer address of the connected socket.
    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.stream.peer_addr()
    }

    /// Local address of the connected socket.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.stream.local_addr()
    }
}

impl TryWrite for TcpTransport {
    fn try_write(&self, buf: &[u8]) -> io::Result<usize> {
        self.stream.try_write(buf)
    }
}

/// Accept one pending connection without waiting.
///
/// Polls the listener exactly once: `None` when no connection is currently
/// queued. Used by the server's housekeeping pass to keep `recv()`
/// non-blocking.
pub async fn try_accept(listener: &TcpListener) -> Option<io::Result<(TcpStream, SocketAddr)>> {
    std::future::poll_fn(|cx| match listener.poll_accept(cx) {
        Poll::Ready(result) => Poll::Ready(Some(result)),
        Poll::Pending => Poll::Ready(None),
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_try_accept_none_when_idle() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        assert!(try_accept(&listener).await.is_none());
    }

    #[tokio::test]
    async fn test_try_accept_picks_up_pending_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = TcpStream::connect(addr).await.unwrap();

        // The connection is queued; a single poll should surface it.
        let mut accepted = None;
        for _ in 0..50 {
            if let Some(result) = try_accept(&listener).await {
                accepted = Some(result.unwrap());
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        let (stream, peer) = accepted.expect("connection never surfaced");
        assert_eq!(peer, client.local_addr().unwrap());
        drop(stream);
    }

    #[tokio::test]
    async fn test_try_read_would_block_when_empty() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = TcpTransport::connect(&addr.to_string()).await.unwrap();
        let (_server, _) = listener.accept().await.unwrap();

        let mut buf = [0u8; 16];
        let result = client.try_read(&mut buf);
        match result {
            Err(e) => assert_eq!(e.kind(), io::ErrorKind::WouldBlock),
            Ok(n) => panic!("expected WouldBlock, read {n} bytes"),
        }
    }

    #[tokio::test]
    async fn test_write_then_try_read() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let mut client = TcpTransport::connect(&addr.to_string()).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        let server = TcpTransport::new(server);

        client.write_all(b"ping").await.unwrap();

        let mut buf = [0u8; 16];
        let mut got = 0;
        for _ in 0..100 {
            match server.try_read(&mut buf[got..]) {
                Ok(n) => {
                    got += n;
                    if got >= 4 {
                        break;
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    tokio::time::sleep(std::time::Duration::from_millis(2)).await;
                }
                Err(e) => panic!("read failed: {e}"),
            }
        }
        assert_eq!(&buf[..4], b"ping");
    }
}
