use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::{Bytes, BytesMut};
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use wormhole_frame::Assembly;

use crate::config::WormholeConfig;
use crate::consumer::FrameConsumer;
use crate::error::{PeerError, Result};

const READ_CHUNK: usize = 64 * 1024;
const EVENT_QUEUE_DEPTH: usize = 1024;

/// One socket read per `Chunk`. Read boundaries are load-bearing: the
/// assembly layer classifies a chunk as a header by its exact length.
enum SocketEvent {
    Opened(u64),
    Chunk(u64, Bytes),
    Closed(u64),
}

/// Server role: accepts loopback connections and reassembles inbound frames.
///
/// All reassembly state and the consumer callback live on a single assembly
/// task; the accept loop and the per-connection read loops only forward
/// [`SocketEvent`]s to it. That task is the serializing context: no lock
/// guards the buffer because only one task ever touches it.
pub struct Receiver {
    config: WormholeConfig,
    listening: Mutex<Option<Listening>>,
}

struct Listening {
    local_addr: SocketAddr,
    shutdown: CancellationToken,
}

impl Receiver {
    pub fn new(config: WormholeConfig) -> Self {
        Self {
            config,
            listening: Mutex::new(None),
        }
    }

    /// Bind the loopback port and start accepting connections. Idempotent.
    ///
    /// Binding failure is not an error here; it is logged and the receiver
    /// stays stopped, per the drop-and-continue policy. Callers that care
    /// check [`Receiver::is_listening`] afterwards.
    pub async fn start(&self, consumer: Arc<dyn FrameConsumer>) {
        if self.is_listening() {
            debug!("receiver already listening");
            return;
        }

        let (listener, local_addr) = match bind_listener(&self.config).await {
            Ok(bound) => bound,
            Err(err) => {
                warn!(error = %err, "receiver not started");
                return;
            }
        };

        let shutdown = CancellationToken::new();
        {
            let mut listening = lock(&self.listening);
            if listening.is_some() {
                // Lost a start race; the other listener stays, ours drops.
                debug!("receiver already listening");
                return;
            }
            *listening = Some(Listening {
                local_addr,
                shutdown: shutdown.clone(),
            });
        }
        info!(%local_addr, "receiver listening");

        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        tokio::spawn(assembly_loop(
            events_rx,
            self.config.recv_buffer_capacity,
            consumer,
        ));
        tokio::spawn(accept_loop(listener, events_tx, shutdown));
    }

    /// Tear down the listener, every connection, and the receive buffer.
    /// Idempotent.
    pub fn stop(&self) {
        match lock(&self.listening).take() {
            Some(listening) => {
                listening.shutdown.cancel();
                info!("receiver stopped");
            }
            None => debug!("receiver already stopped"),
        }
    }

    pub fn is_listening(&self) -> bool {
        lock(&self.listening).is_some()
    }

    /// Bound address while listening. With port 0 this is how the kernel's
    /// pick becomes known.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        lock(&self.listening).as_ref().map(|l| l.local_addr)
    }
}

impl Drop for Receiver {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|err| err.into_inner())
}

async fn bind_listener(config: &WormholeConfig) -> Result<(TcpListener, SocketAddr)> {
    let listener = TcpListener::bind(config.socket_addr())
        .await
        .map_err(|source| PeerError::Bind {
            port: config.port,
            source,
        })?;
    let local_addr = listener.local_addr()?;
    Ok((listener, local_addr))
}

async fn accept_loop(
    listener: TcpListener,
    events: mpsc::Sender<SocketEvent>,
    shutdown: CancellationToken,
) {
    let mut next_conn_id: u64 = 0;
    loop {
        let accepted = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => accepted,
        };
        match accepted {
            Ok((stream, peer)) => {
                next_conn_id += 1;
                let conn_id = next_conn_id;
                info!(conn_id, %peer, "connection accepted");
                if events.send(SocketEvent::Opened(conn_id)).await.is_err() {
                    break;
                }
                tokio::spawn(read_loop(stream, conn_id, events.clone(), shutdown.clone()));
            }
            Err(err) => {
                warn!(error = %err, "accept failed");
            }
        }
    }
    debug!("accept loop stopped");
}

/// Indefinite read loop for one connection. Each successful read becomes
/// exactly one `Chunk` event.
async fn read_loop(
    mut stream: TcpStream,
    conn_id: u64,
    events: mpsc::Sender<SocketEvent>,
    shutdown: CancellationToken,
) {
    if let Err(err) = stream.set_nodelay(true) {
        debug!(conn_id, error = %err, "set_nodelay failed");
    }
    let mut buf = BytesMut::with_capacity(READ_CHUNK);
    loop {
        // `split` hands the filled bytes to the previous event; make sure
        // the next read never sees zero spare capacity.
        buf.reserve(READ_CHUNK);
        let read = tokio::select! {
            _ = shutdown.cancelled() => break,
            read = stream.read_buf(&mut buf) => read,
        };
        match read {
            Ok(0) => {
                debug!(conn_id, "peer closed connection");
                break;
            }
            Ok(_) => {
                let chunk = buf.split().freeze();
                if events
                    .send(SocketEvent::Chunk(conn_id, chunk))
                    .await
                    .is_err()
                {
                    break;
                }
            }
            Err(err) => {
                debug!(conn_id, error = %err, "read failed");
                break;
            }
        }
    }
    let _ = events.send(SocketEvent::Closed(conn_id)).await;
}

/// The serializing context: sole owner of the assembly state, sole caller
/// of the consumer.
async fn assembly_loop(
    mut events: mpsc::Receiver<SocketEvent>,
    capacity: usize,
    consumer: Arc<dyn FrameConsumer>,
) {
    let mut assembly = Assembly::with_capacity(capacity);
    while let Some(event) = events.recv().await {
        match event {
            SocketEvent::Opened(conn_id) => {
                debug!(conn_id, "connection joined assembly");
                assembly.connection_opened();
            }
            SocketEvent::Chunk(_, chunk) => {
                if let Some(payload) = assembly.push_chunk(&chunk) {
                    consumer.on_frame(payload);
                }
            }
            SocketEvent::Closed(conn_id) => {
                debug!(conn_id, "connection left assembly");
                assembly.connection_closed();
            }
        }
    }
    // Every event sender is gone; the role is stopping.
    assembly.cleanup();
    debug!("assembly loop stopped");
}
