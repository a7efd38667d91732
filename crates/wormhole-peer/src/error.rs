use std::io;
use std::time::Duration;

use wormhole_frame::FrameError;

/// Errors internal to the sender and receiver roles.
///
/// None of these cross the public boundary: role entry points log them and
/// degrade to a disconnect or a dropped payload. They exist so the internal
/// plumbing can use `?` and so log lines carry real causes.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Establishing the outbound loopback connection failed.
    #[error("connect to 127.0.0.1:{port} failed: {source}")]
    Connect { port: u16, source: io::Error },

    /// Binding the listening socket failed.
    #[error("bind on 127.0.0.1:{port} failed: {source}")]
    Bind { port: u16, source: io::Error },

    /// A socket operation failed.
    #[error("socket I/O error: {0}")]
    Io(#[from] io::Error),

    /// An outbound write exceeded the configured timeout.
    #[error("write timed out after {0:?}")]
    WriteTimeout(Duration),

    /// Frame encoding failed.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
}

pub type Result<T> = std::result::Result<T, PeerError>;
