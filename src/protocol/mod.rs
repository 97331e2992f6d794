//! Wire protocol: header layout, frame types, incremental decoding, and the
//! connection handshake preamble.

pub mod frame;
pub mod frame_buffer;
pub mod handshake;
pub mod wire_format;

pub use frame::Frame;
pub use frame_buffer::FrameBuffer;
pub use handshake::{decode_hello, encode_hello, HELLO_SIZE, PROTOCOL_VERSION};
pub use wire_format::{
    FrameFlags, Header, StreamId, CONTROL_STREAM_ID, DEFAULT_MAX_FRAME_PAYLOAD, HEADER_SIZE,
};
