//! Sender and receiver roles for the wormhole loopback transport.
//!
//! The [`Sender`] (client role) connects to `127.0.0.1` on the wormhole
//! port and streams length-prefixed frames outward; the [`Receiver`]
//! (server role) listens there, reassembles frames out of arbitrarily
//! fragmented reads, and hands each completed payload to a
//! [`FrameConsumer`].
//!
//! Faults never surface as errors past these types: connect failures, write
//! timeouts, malformed streams, and backpressure overruns all degrade to
//! "log, drop, carry on". Callers that need to know consult the observers
//! ([`Sender::is_connected`], [`Receiver::is_listening`]) and restart roles
//! themselves; there is no automatic reconnection.

pub mod config;
pub mod consumer;
pub mod error;
pub mod receiver;
pub mod sender;

pub use config::{
    WormholeConfig, DEFAULT_MAX_INFLIGHT_SENDS, DEFAULT_PORT, DEFAULT_WRITE_TIMEOUT,
};
pub use consumer::FrameConsumer;
pub use error::{PeerError, Result};
pub use receiver::Receiver;
pub use sender::Sender;
