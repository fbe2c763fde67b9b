//! Per-connection player state and the table that owns it
//!
//! A [`Session`] lives exactly as long as its transport connection: it is
//! created on the open event and dropped on the close event (or when the
//! server closes the connection itself). The [`SessionTable`] also owns the
//! counter used to name players, so two servers in one process never share it.

use crate::transport::ConnectionId;
use crate::utils::random_color;
use log::info;
use shared::{Position, Rgba};
use std::collections::HashMap;

/// Server-side state for one connected player
#[derive(Debug)]
pub struct Session {
    pub id: ConnectionId,
    /// Display name, `Player{n}`
    pub name: String,
    /// Last position reported by the client
    pub position: Position,
    /// Assigned once at connect time
    pub color: Rgba,
    /// Presses received but not yet folded into the aggregate this tick
    pub pending_presses: u32,
    /// Running score, one point lost per press
    pub total: i32,
    /// Received bytes not yet forming a complete frame
    pub inbound: Vec<u8>,
    /// Encoded bytes waiting to be handed to the transport
    pub outbound: Vec<u8>,
}

impl Session {
    pub fn new(id: ConnectionId, name: String, color: Rgba) -> Self {
        Self {
            id,
            name,
            position: Position::default(),
            color,
            pending_presses: 0,
            total: 0,
            inbound: Vec::new(),
            outbound: Vec::new(),
        }
    }

    /// Folds one decoded client report into this session
    pub fn apply_report(&mut self, presses: u8, position: Position) {
        self.pending_presses = self.pending_presses.saturating_add(u32::from(presses));
        self.position = position;
    }
}

/// All live sessions, keyed by connection identity
pub struct SessionTable {
    sessions: HashMap<ConnectionId, Session>,
    /// Number given to the next player name
    next_player_number: u32,
}

impl SessionTable {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            next_player_number: 1,
        }
    }

    /// Creates a session for a newly opened connection.
    ///
    /// Returns false without touching the table if `id` is already present.
    pub fn open(&mut self, id: ConnectionId) -> bool {
        self.open_with_color(id, random_color())
    }

    pub fn open_with_color(&mut self, id: ConnectionId, color: Rgba) -> bool {
        if self.sessions.contains_key(&id) {
            return false;
        }

        let name = format!("Player{}", self.next_player_number);
        self.next_player_number += 1;

        info!("{} joined on connection {}", name, id);
        self.sessions.insert(id, Session::new(id, name, color));
        true
    }

    /// Drops the session for `id`, returning it if it was present
    pub fn close(&mut self, id: ConnectionId) -> Option<Session> {
        let session = self.sessions.remove(&id)?;
        info!("{} left (connection {})", session.name, id);
        Some(session)
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn get_mut(&mut self, id: ConnectionId) -> Option<&mut Session> {
        self.sessions.get_mut(&id)
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.sessions.contains_key(&id)
    }

    /// Iteration order is unspecified
    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Session> {
        self.sessions.values_mut()
    }

    pub fn ids(&self) -> Vec<ConnectionId> {
        self.sessions.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_session_creation() {
        let session = Session::new(7, "Player1".to_string(), [1, 2, 3, 255]);

        assert_eq!(session.id, 7);
        assert_eq!(session.pending_presses, 0);
        assert_eq!(session.total, 0);
        assert_eq!(session.position, Position::default());
        assert!(session.inbound.is_empty());
        assert!(session.outbound.is_empty());
    }

    #[test]
    fn test_apply_report_accumulates_presses() {
        let mut session = Session::new(1, "Player1".to_string(), [0, 0, 0, 255]);

        session.apply_report(3, Position::new(1.0, 2.0));
        session.apply_report(4, Position::new(-1.0, 0.5));

        assert_eq!(session.pending_presses, 7);
        assert_approx_eq!(session.position.x, -1.0);
        assert_approx_eq!(session.position.y, 0.5);
    }

    #[test]
    fn test_open_assigns_sequential_names() {
        let mut table = SessionTable::new();

        assert!(table.open(10));
        assert!(table.open(20));

        assert_eq!(table.get(10).unwrap().name, "Player1");
        assert_eq!(table.get(20).unwrap().name, "Player2");
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_open_assigns_opaque_alpha() {
        let mut table = SessionTable::new();
        for id in 0..16 {
            table.open(id);
        }
        assert!(table.iter().all(|s| s.color[3] == 255));
    }

    #[test]
    fn test_open_duplicate_rejected() {
        let mut table = SessionTable::new();

        assert!(table.open_with_color(1, [9, 9, 9, 255]));
        assert!(!table.open_with_color(1, [0, 0, 0, 255]));

        assert_eq!(table.len(), 1);
        assert_eq!(table.get(1).unwrap().color, [9, 9, 9, 255]);
    }

    #[test]
    fn test_names_keep_counting_after_close() {
        let mut table = SessionTable::new();
        table.open(1);
        table.close(1);
        table.open(1);

        assert_eq!(table.get(1).unwrap().name, "Player2");
    }

    #[test]
    fn test_tables_do_not_share_counter() {
        let mut a = SessionTable::new();
        let mut b = SessionTable::new();
        a.open(1);
        a.open(2);
        b.open(1);

        assert_eq!(b.get(1).unwrap().name, "Player1");
    }

    #[test]
    fn test_close() {
        let mut table = SessionTable::new();
        table.open(5);

        let removed = table.close(5);
        assert_eq!(removed.map(|s| s.id), Some(5));
        assert!(table.is_empty());
        assert!(table.close(5).is_none());
        assert!(!table.contains(5));
    }
}
