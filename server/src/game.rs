//! Per-tick aggregation of player input into the shared status
//!
//! Presses buffered since the last tick are scored and tested against the
//! key regions, producing the [`StatusSnapshot`] every client receives.

use crate::session::SessionTable;
use log::debug;
use shared::{default_keyboard, first_hit, KeyRegion, PlayerStatus, StatusSnapshot};

/// Authoritative per-tick aggregation over all sessions
#[derive(Debug, Clone)]
pub struct GameState {
    pub tick: u32,
    /// Checked in order; the first region containing a press wins
    pub regions: Vec<KeyRegion>,
}

impl GameState {
    pub fn new() -> Self {
        Self::with_regions(default_keyboard())
    }

    pub fn with_regions(regions: Vec<KeyRegion>) -> Self {
        Self { tick: 0, regions }
    }

    /// Consumes every pending press and builds this tick's status.
    ///
    /// Each press costs its player one point and, if the player's position is
    /// inside a key, records that key as hit. Player order in the snapshot is
    /// the table's iteration order.
    pub fn aggregate(&mut self, sessions: &mut SessionTable) -> StatusSnapshot {
        self.tick = self.tick.wrapping_add(1);

        let mut hits = Vec::new();
        let mut players = Vec::with_capacity(sessions.len());
        let mut sum: i32 = 0;

        for session in sessions.iter_mut() {
            let hit = first_hit(&self.regions, session.position);

            while session.pending_presses > 0 {
                session.pending_presses -= 1;
                session.total = session.total.saturating_sub(1);
                if let Some(index) = hit {
                    hits.push(index as u32);
                }
            }

            sum = sum.saturating_add(session.total);
            players.push(PlayerStatus {
                name: session.name.clone(),
                total: session.total,
                position: session.position,
                color: session.color,
            });
        }

        if !hits.is_empty() {
            debug!("Tick {}: {} key hits", self.tick, hits.len());
        }

        StatusSnapshot {
            tick: self.tick,
            players,
            sum,
            hits,
        }
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ConnectionId;
    use shared::Position;

    fn table_with(presses: &[(ConnectionId, u32, Position)]) -> SessionTable {
        let mut table = SessionTable::new();
        for (id, count, position) in presses {
            table.open_with_color(*id, [10, 20, 30, 255]);
            let session = table.get_mut(*id).unwrap();
            session.pending_presses = *count;
            session.position = *position;
        }
        table
    }

    #[test]
    fn test_presses_drained_and_scored() {
        let mut table = table_with(&[(1, 3, Position::new(1.0, 0.0))]);
        let mut game = GameState::new();

        let snapshot = game.aggregate(&mut table);

        assert_eq!(table.get(1).unwrap().pending_presses, 0);
        assert_eq!(table.get(1).unwrap().total, -3);
        assert_eq!(snapshot.sum, -3);
        assert_eq!(snapshot.hits, vec![4, 4, 4]);
        assert_eq!(snapshot.players[0].position, Position::new(1.0, 0.0));
    }

    #[test]
    fn test_totals_accumulate_across_ticks() {
        let mut table = table_with(&[(1, 2, Position::default())]);
        let mut game = GameState::new();

        game.aggregate(&mut table);
        table.get_mut(1).unwrap().pending_presses = 5;
        let snapshot = game.aggregate(&mut table);

        assert_eq!(snapshot.tick, 2);
        assert_eq!(snapshot.sum, -7);
    }

    #[test]
    fn test_overlapping_regions_first_wins() {
        let first = KeyRegion::from_corners(Position::new(0.0, 0.0), Position::new(2.0, 2.0));
        let second = KeyRegion::from_corners(Position::new(-1.0, -1.0), Position::new(3.0, 3.0));
        let mut game = GameState::with_regions(vec![first, second]);
        let mut table = table_with(&[(1, 4, Position::new(1.0, 1.0))]);

        let snapshot = game.aggregate(&mut table);

        assert_eq!(snapshot.hits, vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_press_outside_regions_records_nothing() {
        let mut table = table_with(&[(1, 2, Position::new(100.0, 100.0))]);
        let mut game = GameState::new();

        let snapshot = game.aggregate(&mut table);

        assert!(snapshot.hits.is_empty());
        assert_eq!(snapshot.sum, -2);
        assert_eq!(table.get(1).unwrap().pending_presses, 0);
    }

    #[test]
    fn test_multiple_players() {
        let mut table = table_with(&[
            (1, 1, Position::new(-15.0, 0.0)),
            (2, 2, Position::new(15.0, 0.0)),
            (3, 0, Position::new(0.0, 0.0)),
        ]);
        let mut game = GameState::new();

        let mut snapshot = game.aggregate(&mut table);
        snapshot.hits.sort_unstable();

        assert_eq!(snapshot.players.len(), 3);
        assert_eq!(snapshot.sum, -3);
        assert_eq!(snapshot.hits, vec![0, 7, 7]);
    }

    #[test]
    fn test_empty_table() {
        let mut table = SessionTable::new();
        let mut game = GameState::new();

        let snapshot = game.aggregate(&mut table);

        assert!(snapshot.players.is_empty());
        assert_eq!(snapshot.sum, 0);
        assert_eq!(snapshot.to_text(), " = 0 | hits: -");
    }
}
