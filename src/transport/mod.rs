//! Physical transport layer.
//!
//! One module per socket flavor; currently TCP only.

pub mod tcp;

pub use tcp::{try_accept, TcpTransport};
