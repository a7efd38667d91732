use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use wormhole_frame::PacketHeader;

use crate::config::WormholeConfig;
use crate::error::{PeerError, Result};

/// Client role: connects outward and streams frames to the receiver.
///
/// [`Sender::send`] never blocks and never fails visibly. A payload is
/// dropped when the link is down (a connect attempt is triggered in its
/// place), still being established, or when the outbound queue is at the
/// backpressure cap. Faults of any kind tear the link down; reconnecting is
/// the caller's move, via [`Sender::start`] or the next `send`.
///
/// All methods must be called from within a Tokio runtime.
pub struct Sender {
    config: WormholeConfig,
    link: Arc<Mutex<Link>>,
    /// Bumped on every connect attempt and every stop; tasks belonging to a
    /// superseded link see a newer value and leave the state alone.
    generation: Arc<AtomicU64>,
}

enum Link {
    Disconnected,
    Connecting,
    Connected { queue: mpsc::Sender<Bytes> },
}

impl Sender {
    pub fn new(config: WormholeConfig) -> Self {
        Self {
            config,
            link: Arc::new(Mutex::new(Link::Disconnected)),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Begin connecting if the link is down. Idempotent.
    pub fn start(&self) {
        self.connect_if_down();
    }

    /// Drop the link and return to disconnected. Idempotent.
    ///
    /// Payloads already queued may still reach the wire; the writer drains
    /// its queue before the socket is shut down.
    pub fn stop(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let mut link = lock(&self.link);
        if !matches!(*link, Link::Disconnected) {
            info!("sender stopped");
        }
        *link = Link::Disconnected;
    }

    /// Queue one payload for transmission. Fire and forget.
    pub fn send(&self, payload: Bytes) {
        let queue = {
            let link = lock(&self.link);
            match &*link {
                Link::Connected { queue } => Some(queue.clone()),
                Link::Connecting => {
                    debug!("link not yet up, payload dropped");
                    return;
                }
                Link::Disconnected => None,
            }
        };

        match queue {
            Some(queue) => match queue.try_send(payload) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    debug!(
                        cap = self.config.max_inflight_sends,
                        "outbound queue full, payload dropped"
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    // Writer died between the peek above and this enqueue.
                    debug!("link lost, payload dropped");
                    self.connect_if_down();
                }
            },
            None => {
                debug!("link down, payload dropped, connect triggered");
                self.connect_if_down();
            }
        }
    }

    /// Whether the link is currently established.
    pub fn is_connected(&self) -> bool {
        matches!(*lock(&self.link), Link::Connected { .. })
    }

    fn connect_if_down(&self) {
        let generation = {
            let mut link = lock(&self.link);
            if !matches!(*link, Link::Disconnected) {
                return;
            }
            *link = Link::Connecting;
            self.generation.fetch_add(1, Ordering::SeqCst) + 1
        };
        debug!(port = self.config.port, "connecting");
        tokio::spawn(establish(
            self.config.clone(),
            generation,
            Arc::clone(&self.link),
            Arc::clone(&self.generation),
        ));
    }
}

impl Drop for Sender {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|err| err.into_inner())
}

/// Set the link back to disconnected, unless a newer link owns the state.
fn reset_link(link: &Mutex<Link>, live: &AtomicU64, generation: u64) -> bool {
    let mut guard = lock(link);
    if live.load(Ordering::SeqCst) == generation && !matches!(*guard, Link::Disconnected) {
        *guard = Link::Disconnected;
        true
    } else {
        false
    }
}

async fn establish(
    config: WormholeConfig,
    generation: u64,
    link: Arc<Mutex<Link>>,
    live: Arc<AtomicU64>,
) {
    let addr = config.socket_addr();
    let stream = match TcpStream::connect(addr).await {
        Ok(stream) => stream,
        Err(source) => {
            let err = PeerError::Connect {
                port: config.port,
                source,
            };
            warn!(error = %err, "link not established");
            reset_link(&link, &live, generation);
            return;
        }
    };
    if let Err(err) = stream.set_nodelay(true) {
        debug!(error = %err, "set_nodelay failed");
    }

    let (read_half, write_half) = stream.into_split();
    let (queue_tx, queue_rx) = mpsc::channel(config.max_inflight_sends);

    let installed = {
        let mut guard = lock(&link);
        if live.load(Ordering::SeqCst) == generation && matches!(*guard, Link::Connecting) {
            *guard = Link::Connected { queue: queue_tx };
            true
        } else {
            false
        }
    };
    if !installed {
        debug!("link superseded before establishment");
        return;
    }
    info!(%addr, "link established");

    tokio::spawn(writer_loop(
        write_half,
        queue_rx,
        config.write_timeout,
        generation,
        Arc::clone(&link),
        Arc::clone(&live),
    ));
    tokio::spawn(reader_loop(read_half, generation, link, live));
}

/// Serializing context for outbound writes: everything queued goes out in
/// order, one payload at a time.
async fn writer_loop(
    mut write_half: OwnedWriteHalf,
    mut queue: mpsc::Receiver<Bytes>,
    write_timeout: Duration,
    generation: u64,
    link: Arc<Mutex<Link>>,
    live: Arc<AtomicU64>,
) {
    while let Some(payload) = queue.recv().await {
        match transmit(&mut write_half, &payload, write_timeout).await {
            Ok(()) => {}
            Err(err @ PeerError::Frame(_)) => {
                // Unencodable payload; the link itself is fine.
                warn!(error = %err, "payload dropped");
            }
            Err(err) => {
                warn!(error = %err, "outbound write failed");
                break;
            }
        }
    }
    let _ = write_half.shutdown().await;
    if reset_link(&link, &live, generation) {
        info!("link closed");
    }
}

/// Header and body go out as two ordered writes, each under the timeout.
async fn transmit(
    write_half: &mut OwnedWriteHalf,
    payload: &Bytes,
    write_timeout: Duration,
) -> Result<()> {
    let header = PacketHeader::for_payload(payload.len())?;
    write_with_timeout(write_half, &header.encode(), write_timeout).await?;
    write_with_timeout(write_half, payload, write_timeout).await?;
    Ok(())
}

async fn write_with_timeout(
    write_half: &mut OwnedWriteHalf,
    bytes: &[u8],
    write_timeout: Duration,
) -> Result<()> {
    match timeout(write_timeout, write_half.write_all(bytes)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(PeerError::Io(err)),
        Err(_) => Err(PeerError::WriteTimeout(write_timeout)),
    }
}

/// The receiver never sends application data back; this read exists only to
/// notice the peer going away.
async fn reader_loop(
    mut read_half: OwnedReadHalf,
    generation: u64,
    link: Arc<Mutex<Link>>,
    live: Arc<AtomicU64>,
) {
    let mut scratch = [0u8; 1024];
    loop {
        match read_half.read(&mut scratch).await {
            Ok(0) => {
                debug!("peer closed the link");
                break;
            }
            Ok(n) => debug!(len = n, "unexpected inbound bytes discarded"),
            Err(err) => {
                debug!(error = %err, "link read failed");
                break;
            }
        }
    }
    if reset_link(&link, &live, generation) {
        info!("link closed");
    }
}
