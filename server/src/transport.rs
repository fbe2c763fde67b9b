//! Connection multiplexer the server loop sits on top of
//!
//! The loop only sees [`NetEvent`]s from [`Transport::poll`] and appends to
//! per-connection outbound queues with [`Transport::send`]. The TCP
//! implementation runs an accept task plus a reader and a writer task per
//! connection; everything they observe funnels through one channel that
//! `poll` drains.

use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Opaque connection identity, only ever used as a key
pub type ConnectionId = u64;

const READ_BUFFER_SIZE: usize = 1024;
/// Sends a connection's writer may fall behind by before the peer is dropped
pub const OUTBOUND_QUEUE_LIMIT: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetEvent {
    Opened(ConnectionId),
    /// Bytes that arrived since the last `Received` for this connection
    Received(ConnectionId, Vec<u8>),
    Closed(ConnectionId),
}

impl NetEvent {
    pub fn connection(&self) -> ConnectionId {
        match self {
            Self::Opened(id) | Self::Received(id, _) | Self::Closed(id) => *id,
        }
    }
}

pub trait Transport {
    /// Waits up to `max_wait` for at least one event and returns every event ready.
    ///
    /// An empty result means the wait elapsed with nothing to report.
    fn poll(&mut self, max_wait: Duration) -> impl Future<Output = Vec<NetEvent>> + Send;

    /// Terminates a connection. No events for `id` are reported after this returns.
    fn close(&mut self, id: ConnectionId);

    /// Appends bytes to the connection's outbound queue.
    ///
    /// Returns false when the queue is full, meaning the peer has stopped
    /// reading; the caller should close the connection.
    fn send(&mut self, id: ConnectionId, bytes: Vec<u8>) -> bool;
}

/// What the background tasks report to `poll`
enum TaskEvent {
    Opened {
        id: ConnectionId,
        addr: SocketAddr,
        outbound: mpsc::Sender<Vec<u8>>,
        shutdown: oneshot::Sender<()>,
    },
    Received(ConnectionId, Vec<u8>),
    Closed(ConnectionId),
}

struct Connection {
    addr: SocketAddr,
    outbound: mpsc::Sender<Vec<u8>>,
    /// Dropping this stops the reader task
    _shutdown: oneshot::Sender<()>,
}

pub struct TcpTransport {
    local_addr: SocketAddr,
    events: mpsc::UnboundedReceiver<TaskEvent>,
    connections: HashMap<ConnectionId, Connection>,
    acceptor: JoinHandle<()>,
}

impl TcpTransport {
    pub async fn bind(addr: &str) -> Result<Self, std::io::Error> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on {}", local_addr);

        let (events_tx, events) = mpsc::unbounded_channel();
        let acceptor = tokio::spawn(accept_loop(listener, events_tx));

        Ok(Self {
            local_addr,
            events,
            connections: HashMap::new(),
            acceptor,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Filters task events down to what the server loop should see
    fn admit(&mut self, event: TaskEvent, out: &mut Vec<NetEvent>) {
        match event {
            TaskEvent::Opened {
                id,
                addr,
                outbound,
                shutdown,
            } => {
                self.connections.insert(
                    id,
                    Connection {
                        addr,
                        outbound,
                        _shutdown: shutdown,
                    },
                );
                out.push(NetEvent::Opened(id));
            }
            // Connections the server already closed are forgotten
            TaskEvent::Received(id, bytes) => {
                if self.connections.contains_key(&id) {
                    out.push(NetEvent::Received(id, bytes));
                }
            }
            TaskEvent::Closed(id) => {
                if let Some(connection) = self.connections.remove(&id) {
                    info!("Connection {} from {} closed by peer", id, connection.addr);
                    out.push(NetEvent::Closed(id));
                }
            }
        }
    }
}

impl Transport for TcpTransport {
    async fn poll(&mut self, max_wait: Duration) -> Vec<NetEvent> {
        let mut ready = Vec::new();

        match tokio::time::timeout(max_wait, self.events.recv()).await {
            Ok(Some(event)) => self.admit(event, &mut ready),
            Ok(None) => {
                // Acceptor is gone; behave like an idle multiplexer
                tokio::time::sleep(max_wait).await;
                return ready;
            }
            Err(_) => return ready,
        }

        while let Ok(event) = self.events.try_recv() {
            self.admit(event, &mut ready);
        }
        ready
    }

    fn close(&mut self, id: ConnectionId) {
        if let Some(connection) = self.connections.remove(&id) {
            info!("Closing connection {} from {}", id, connection.addr);
        }
    }

    fn send(&mut self, id: ConnectionId, bytes: Vec<u8>) -> bool {
        let Some(connection) = self.connections.get(&id) else {
            debug!("Dropping {} bytes for unknown connection {}", bytes.len(), id);
            return true;
        };

        match connection.outbound.try_send(bytes) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(
                    "Outbound queue for connection {} from {} is full",
                    id, connection.addr
                );
                false
            }
            // The peer is gone; its reader reports the close
            Err(TrySendError::Closed(_)) => {
                debug!("Writer for connection {} already finished", id);
                true
            }
        }
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.acceptor.abort();
    }
}

async fn accept_loop(listener: TcpListener, events: mpsc::UnboundedSender<TaskEvent>) {
    let mut next_id: ConnectionId = 1;

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let id = next_id;
                next_id += 1;

                if let Err(e) = stream.set_nodelay(true) {
                    debug!("Failed to set TCP_NODELAY for {}: {}", addr, e);
                }
                info!("Accepted connection {} from {}", id, addr);

                let (read_half, write_half) = stream.into_split();
                let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_LIMIT);
                let (shutdown_tx, shutdown_rx) = oneshot::channel();

                // Opened must be queued before the reader can report anything
                let opened = TaskEvent::Opened {
                    id,
                    addr,
                    outbound: outbound_tx,
                    shutdown: shutdown_tx,
                };
                if events.send(opened).is_err() {
                    break;
                }

                tokio::spawn(read_loop(id, read_half, shutdown_rx, events.clone()));
                tokio::spawn(write_loop(id, write_half, outbound_rx));
            }
            Err(e) => {
                error!("Error accepting connection: {}", e);
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
    }
}

async fn read_loop(
    id: ConnectionId,
    mut read_half: OwnedReadHalf,
    mut shutdown: oneshot::Receiver<()>,
    events: mpsc::UnboundedSender<TaskEvent>,
) {
    let mut buffer = [0u8; READ_BUFFER_SIZE];

    loop {
        tokio::select! {
            // Fires when the transport drops the sender on close
            _ = &mut shutdown => return,
            result = read_half.read(&mut buffer) => match result {
                Ok(0) => break,
                Ok(len) => {
                    if events.send(TaskEvent::Received(id, buffer[..len].to_vec())).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    debug!("Read error on connection {}: {}", id, e);
                    break;
                }
            },
        }
    }

    let _ = events.send(TaskEvent::Closed(id));
}

async fn write_loop(
    id: ConnectionId,
    mut write_half: OwnedWriteHalf,
    mut outbound: mpsc::Receiver<Vec<u8>>,
) {
    while let Some(bytes) = outbound.recv().await {
        if let Err(e) = write_half.write_all(&bytes).await {
            debug!("Write error on connection {}: {}", id, e);
            return;
        }
    }
    let _ = write_half.shutdown().await;
}
