//! Wire framing and receive-side reassembly for the wormhole transport.
//!
//! Every frame on the wire is a fixed 16-byte header (three identity
//! constants plus a little-endian payload length) followed by exactly that
//! many body bytes. [`Assembly`] turns a stream of raw read chunks back into
//! payloads, buffering partial frames in a bounded [`RingBuffer`] that is
//! cleared, never grown.
//!
//! Nothing in this crate touches a socket; the peer crate feeds it chunks
//! and ships what it returns.

pub mod assembly;
pub mod codec;
pub mod error;
pub mod ring;

pub use assembly::{Assembly, Phase};
pub use codec::{PacketHeader, COMMAND_ID, HEADER_SIZE, PROTOCOL_VERSION, SERVICE_ID};
pub use error::{FrameError, Result};
pub use ring::{RingBuffer, DEFAULT_CAPACITY};
