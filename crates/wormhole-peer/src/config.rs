use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use wormhole_frame::DEFAULT_CAPACITY;

/// Default TCP port both roles use on the loopback interface.
pub const DEFAULT_PORT: u16 = 8999;

/// Default cap on sends queued for the writer but not yet on the wire.
pub const DEFAULT_MAX_INFLIGHT_SENDS: usize = 1000;

/// Default timeout applied to each outbound write.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Tunables shared by the two roles.
///
/// Defaults: port 8999, a 15 MiB receive buffer, a 1000-send backpressure
/// cap, and 5 s per write.
#[derive(Debug, Clone)]
pub struct WormholeConfig {
    /// Loopback TCP port (IPv4 only).
    pub port: u16,
    /// Receive buffer capacity in bytes.
    pub recv_buffer_capacity: usize,
    /// Maximum sends queued on the writer before new sends are dropped.
    pub max_inflight_sends: usize,
    /// Timeout applied to each outbound write (header and body separately).
    pub write_timeout: Duration,
}

impl Default for WormholeConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            recv_buffer_capacity: DEFAULT_CAPACITY,
            max_inflight_sends: DEFAULT_MAX_INFLIGHT_SENDS,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

impl WormholeConfig {
    /// Override the loopback port. Port 0 lets the receiver pick a free one.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Override the receive buffer capacity.
    pub fn with_recv_buffer_capacity(mut self, capacity: usize) -> Self {
        self.recv_buffer_capacity = capacity;
        self
    }

    /// Override the backpressure cap.
    pub fn with_max_inflight_sends(mut self, cap: usize) -> Self {
        self.max_inflight_sends = cap;
        self
    }

    /// Override the per-write timeout.
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub(crate) fn socket_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, self.port))
    }
}
