//! Server loop coordinating connections, per-tick aggregation and broadcast

use crate::broadcast::{broadcast, render_payload};
use crate::config::{PayloadFormat, ServerConfig};
use crate::game::GameState;
use crate::reassembler::Reassembler;
use crate::scheduler::TickScheduler;
use crate::session::SessionTable;
use crate::transport::{ConnectionId, NetEvent, TcpTransport, Transport};
use crate::utils::hex_dump;
use log::{debug, info, log_enabled, trace, warn, Level};
use shared::{EncodeError, StatusSnapshot};
use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;
use tokio::time::Instant;

const STATS_INTERVAL_TICKS: u32 = 100;

#[derive(Debug)]
pub enum ServerError {
    /// An event named a connection the session table does not know
    UnknownConnection(ConnectionId),
    /// An open event for a connection that is already live
    DuplicateConnection(ConnectionId),
    Encode(EncodeError),
    Serialize(bincode::Error),
    Io(std::io::Error),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownConnection(id) => write!(f, "event for unknown connection {id}"),
            Self::DuplicateConnection(id) => write!(f, "connection {id} opened twice"),
            Self::Encode(e) => write!(f, "failed to encode status: {e}"),
            Self::Serialize(e) => write!(f, "failed to serialize status: {e}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for ServerError {}

impl From<EncodeError> for ServerError {
    fn from(e: EncodeError) -> Self {
        Self::Encode(e)
    }
}

impl From<bincode::Error> for ServerError {
    fn from(e: bincode::Error) -> Self {
        Self::Serialize(e)
    }
}

impl From<std::io::Error> for ServerError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Authoritative tick-driven server over some [`Transport`]
pub struct Server<T> {
    transport: T,
    sessions: SessionTable,
    game: GameState,
    reassembler: Reassembler,
    scheduler: TickScheduler,
    payload_format: PayloadFormat,
    /// Connections closed by the server while handling the current batch
    dropped: HashSet<ConnectionId>,
}

impl Server<TcpTransport> {
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let transport = TcpTransport::bind(&config.address).await?;
        Ok(Self::new(transport, &config))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }
}

impl<T: Transport + Send> Server<T> {
    pub fn new(transport: T, config: &ServerConfig) -> Self {
        Self {
            transport,
            sessions: SessionTable::new(),
            game: GameState::new(),
            reassembler: Reassembler::new(config.max_inbound_bytes),
            scheduler: TickScheduler::from_rate(config.tick_rate, Instant::now()),
            payload_format: config.payload_format,
            dropped: HashSet::new(),
        }
    }

    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    pub fn game(&self) -> &GameState {
        &self.game
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Applies one transport event to the session table.
    ///
    /// A malformed client is closed and removed here; only table invariant
    /// violations are returned as errors.
    pub fn handle_event(&mut self, event: NetEvent) -> Result<(), ServerError> {
        if self.dropped.contains(&event.connection()) {
            return Ok(());
        }

        match event {
            NetEvent::Opened(id) => {
                if !self.sessions.open(id) {
                    return Err(ServerError::DuplicateConnection(id));
                }
            }
            NetEvent::Closed(id) => {
                self.sessions
                    .close(id)
                    .ok_or(ServerError::UnknownConnection(id))?;
            }
            NetEvent::Received(id, bytes) => {
                if log_enabled!(Level::Trace) {
                    trace!("Connection {} got bytes:\n{}", id, hex_dump(&bytes));
                }

                let session = self
                    .sessions
                    .get_mut(id)
                    .ok_or(ServerError::UnknownConnection(id))?;

                if let Err(e) = self.reassembler.feed(session, &bytes) {
                    warn!("Dropping {} (connection {}): {}", session.name, id, e);
                    self.transport.close(id);
                    self.sessions.close(id);
                    self.dropped.insert(id);
                }
            }
        }
        Ok(())
    }

    /// Dispatches transport events until the current tick's deadline passes
    pub async fn drain_until_deadline(&mut self) -> Result<(), ServerError> {
        while let Some(remaining) = self.scheduler.remaining(Instant::now()) {
            let events = self.transport.poll(remaining).await;
            for event in events {
                self.handle_event(event)?;
            }
            self.dropped.clear();
        }
        Ok(())
    }

    /// Aggregates the tick, queues the status for every session and hands
    /// the queued bytes to the transport
    pub fn run_tick(&mut self) -> Result<StatusSnapshot, ServerError> {
        let snapshot = self.game.aggregate(&mut self.sessions);
        let payload = render_payload(&snapshot, self.payload_format)?;

        if log_enabled!(Level::Debug) {
            debug!("Tick {}: {}", snapshot.tick, snapshot.to_text());
        }

        broadcast(&mut self.sessions, &payload)?;
        self.flush();

        if snapshot.tick % STATS_INTERVAL_TICKS == 0 {
            debug!(
                "Tick {}: {} sessions, {} byte payload",
                snapshot.tick,
                self.sessions.len(),
                payload.len()
            );
        }
        Ok(snapshot)
    }

    /// Hands queued bytes to the transport, dropping peers that stopped reading
    fn flush(&mut self) {
        let mut stalled = Vec::new();
        for session in self.sessions.iter_mut() {
            if !session.outbound.is_empty() {
                let bytes = std::mem::take(&mut session.outbound);
                if !self.transport.send(session.id, bytes) {
                    stalled.push(session.id);
                }
            }
        }

        for id in stalled {
            if let Some(session) = self.sessions.close(id) {
                warn!("Dropping {} (connection {}): not reading", session.name, id);
            }
            self.transport.close(id);
        }
    }

    /// Runs the drain / aggregate / broadcast cycle until a fatal error
    pub async fn run(&mut self) -> Result<(), ServerError> {
        info!("Server started, tick period {:?}", self.scheduler.period());

        loop {
            self.drain_until_deadline().await?;
            self.run_tick()?;
        }
    }
}
