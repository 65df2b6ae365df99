//! Player Input
//!
//! Commands arriving from the input layer, and the validation errors a
//! selection can fail with. A rejected selection changes nothing.

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::game::tile::{Position, TileId};

// =============================================================================
// INPUT TYPES
// =============================================================================

/// "Player selected tile (x, y)". Coordinates are raw and may be out of range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectTile {
    /// Column
    pub x: i32,
    /// Row
    pub y: i32,
}

impl SelectTile {
    /// Create a selection.
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<Position> for SelectTile {
    fn from(pos: Position) -> Self {
        Self::new(pos.x as i32, pos.y as i32)
    }
}

/// Everything the input layer can send to a running match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerCommand {
    /// Pick a tile
    Select(SelectTile),
    /// Ask for a connectable pair
    Hint,
    /// Regenerate the board and start over
    Restart,
    /// Give up
    Quit,
}

/// Result of an accepted selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Selection {
    /// First tile of a pair; waiting for the second
    First(TileId),
    /// Both tiles chosen; the pair should be attempted
    Pair(TileId, TileId),
}

// =============================================================================
// ERRORS
// =============================================================================

/// Selection rejected before reaching the path finder.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    /// Coordinates outside the board.
    #[error("({x}, {y}) is outside the board")]
    OutOfBounds {
        /// Column requested
        x: i32,
        /// Row requested
        y: i32,
    },

    /// Tile already matched or blown away.
    #[error("tile at {0} is hidden")]
    TileHidden(Position),

    /// Tile locked by an obstacle.
    #[error("tile at {0} is locked")]
    TileLocked(Position),

    /// Same tile picked twice.
    #[error("tile at {0} is already selected")]
    SameTile(Position),

    /// Match already over.
    #[error("match is over")]
    MatchOver,
}
