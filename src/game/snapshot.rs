//! Presentation Snapshot
//!
//! Read-only copy of everything a renderer polls once per frame.

use serde::{Serialize, Deserialize};
use uuid::Uuid;

use crate::game::config::Difficulty;
use crate::game::obstacle::ObstacleKind;
use crate::game::state::{MatchPhase, MatchState};
use crate::game::tile::{Position, Tile};

/// Point-in-time view of a match.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    /// Match identifier
    pub match_id: Uuid,
    /// Difficulty
    pub difficulty: Difficulty,
    /// Level (gravity rule)
    pub level: u8,
    /// Phase at capture time
    pub phase: MatchPhase,
    /// Board columns
    pub cols: usize,
    /// Board rows
    pub rows: usize,
    /// Every tile with its flags, row by row
    pub tiles: Vec<Tile>,
    /// Pending first selection
    pub selected: Option<Position>,
    /// Total points
    pub score: u32,
    /// Current combo
    pub combo: u32,
    /// Current multiplier
    pub multiplier: f64,
    /// Countdown seconds remaining
    pub time_left: u32,
    /// Seconds since start
    pub elapsed: u32,
    /// Failed attempts since the last reset
    pub mismatch_count: u32,
    /// Effects in flight, for indicators
    pub active_effects: Vec<ObstacleKind>,
    /// Hex SHA-256 of the board
    pub board_hash: String,
}

impl MatchSnapshot {
    /// Capture a snapshot.
    pub fn capture(state: &MatchState) -> Self {
        Self {
            match_id: state.match_id,
            difficulty: state.config.difficulty(),
            level: state.config.level,
            phase: state.phase,
            cols: state.board.cols(),
            rows: state.board.rows(),
            tiles: state.board.tiles().cloned().collect(),
            selected: state
                .selection()
                .and_then(|id| state.board.tile(id))
                .map(Tile::position),
            score: state.score.score(),
            combo: state.score.combo(),
            multiplier: state.score.multiplier(),
            time_left: state.time_left,
            elapsed: state.elapsed,
            mismatch_count: state.board.mismatch_count(),
            active_effects: state.active_effects(),
            board_hash: hex::encode(state.board.compute_hash()),
        }
    }

    /// Tile at a cell.
    pub fn tile_at(&self, x: usize, y: usize) -> Option<&Tile> {
        if x >= self.cols || y >= self.rows {
            return None;
        }
        self.tiles.get(y * self.cols + x)
    }

    /// Number of tiles still showing.
    pub fn visible_count(&self) -> usize {
        self.tiles.iter().filter(|t| t.visible).count()
    }
}
