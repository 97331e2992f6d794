//! Connection and server configuration.

use std::time::Duration;

use crate::protocol::DEFAULT_MAX_FRAME_PAYLOAD;

/// Default read buffer size for socket pumps (64 KB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 64 * 1024;

/// Default maximum frames queued for write before backpressure kicks in.
pub const DEFAULT_MAX_PENDING_FRAMES: usize = 1024;

/// Default handshake timeout.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default close flush timeout (best-effort drain of the write queue).
pub const DEFAULT_CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Default maximum concurrent connections per server.
pub const DEFAULT_MAX_CONNECTIONS: usize = 1024;

/// Tunables shared by connections and servers.
///
/// The defaults are safe for local and LAN use; tighten `max_frame_payload`
/// when the peer is untrusted.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Maximum accepted frame payload length, enforced on both encode and
    /// decode paths. Bounds allocation from untrusted input.
    pub max_frame_payload: u32,
    /// Scratch buffer size for each non-blocking read.
    pub read_buffer_size: usize,
    /// Maximum frames held in the write queue before `send` reports
    /// `Backpressure`.
    pub max_pending_frames: usize,
    /// How long a handshake may take before the attempt is abandoned.
    pub handshake_timeout: Duration,
    /// How long `close` may spend flushing queued frames.
    pub close_flush_timeout: Duration,
    /// Server-side cap on concurrently accepted connections.
    pub max_connections: usize,
    /// Set TCP_NODELAY on sockets.
    pub nodelay: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_frame_payload: DEFAULT_MAX_FRAME_PAYLOAD,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            max_pending_frames: DEFAULT_MAX_PENDING_FRAMES,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            close_flush_timeout: DEFAULT_CLOSE_FLUSH_TIMEOUT,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            nodelay: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = ConnectionConfig::default();
        assert_eq!(config.max_frame_payload, DEFAULT_MAX_FRAME_PAYLOAD);
        assert_eq!(config.read_buffer_size, DEFAULT_READ_BUFFER_SIZE);
        assert_eq!(config.max_pending_frames, DEFAULT_MAX_PENDING_FRAMES);
        assert_eq!(config.handshake_timeout, DEFAULT_HANDSHAKE_TIMEOUT);
        assert_eq!(config.close_flush_timeout, DEFAULT_CLOSE_FLUSH_TIMEOUT);
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert!(config.nodelay);
    }

    #[test]
    fn test_config_is_cloneable() {
        let config = ConnectionConfig {
            max_frame_payload: 100,
            ..Default::default()
        };
        let clone = config.clone();
        assert_eq!(clone.max_frame_payload, 100);
    }
}
