//! Loopback TCP frame transport for same-host processes.
//!
//! wormhole moves opaque byte frames between processes over 127.0.0.1 using a
//! fixed-identity, length-prefixed wire header. Transport faults never reach
//! the caller: a frame that cannot be delivered is dropped and the roles keep
//! running.
//!
//! # Crate Structure
//!
//! - [`frame`] — Wire header codec, bounded receive buffer, frame reassembly
//! - [`peer`] — Sender and receiver roles over loopback TCP

/// Re-export frame types.
pub mod frame {
    pub use wormhole_frame::*;
}

/// Re-export peer types.
pub mod peer {
    pub use wormhole_peer::*;
}
