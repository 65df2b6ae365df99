//! Tiles
//!
//! A tile is an identity object: it keeps its `TileId` and kind for the whole
//! life of a board while shuffles and gravity move it between cells.

use std::fmt;

use serde::{Serialize, Deserialize};

/// Animal identity shared by the two tiles of a pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AnimalId(pub u16);

impl fmt::Display for AnimalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A{:02}", self.0)
    }
}

/// Stable tile handle; index into the board's tile arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TileId(pub u16);

impl TileId {
    /// Arena index.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Grid coordinate: `x` is the column, `y` the row (0 = top).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Column
    pub x: usize,
    /// Row
    pub y: usize,
}

impl Position {
    /// Create a position.
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Temporary status set by obstacle effects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TileFlag {
    /// Tile cannot be selected
    Locked,
    /// Tile is blown off the board until the fuse runs out
    Bombed,
    /// Tile carries the golden fish
    Golden,
    /// Tile is marked by acid rain
    Acidified,
}

/// A single cell of the board.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    /// Stable identity
    pub id: TileId,
    /// Current column
    pub x: usize,
    /// Current row
    pub y: usize,
    kind: AnimalId,
    /// Still on the board (false once matched or while bombed)
    pub visible: bool,
    /// Set by tile locking
    pub locked: bool,
    /// Set by a time bomb
    pub bombed: bool,
    /// Set by the golden fish
    pub golden: bool,
    /// Set by acid rain
    pub acidified: bool,
}

impl Tile {
    /// Create a visible tile with no flags.
    pub fn new(id: TileId, x: usize, y: usize, kind: AnimalId) -> Self {
        Self {
            id,
            x,
            y,
            kind,
            visible: true,
            locked: false,
            bombed: false,
            golden: false,
            acidified: false,
        }
    }

    /// Animal identity; fixed for the tile's lifetime.
    #[inline]
    pub fn kind(&self) -> AnimalId {
        self.kind
    }

    /// Current position.
    #[inline]
    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }

    /// Matched and gone for good (a bombed tile comes back).
    #[inline]
    pub fn is_removed(&self) -> bool {
        !self.visible && !self.bombed
    }

    /// Still part of the puzzle, visible or not.
    #[inline]
    pub fn in_play(&self) -> bool {
        !self.is_removed()
    }

    /// Can the player pick this tile right now?
    #[inline]
    pub fn is_selectable(&self) -> bool {
        self.visible && !self.locked
    }

    /// Read one effect flag.
    pub fn flag(&self, flag: TileFlag) -> bool {
        match flag {
            TileFlag::Locked => self.locked,
            TileFlag::Bombed => self.bombed,
            TileFlag::Golden => self.golden,
            TileFlag::Acidified => self.acidified,
        }
    }

    /// Write one effect flag. Bombing also hides the tile; defusing shows it.
    pub fn set_flag(&mut self, flag: TileFlag, on: bool) {
        match flag {
            TileFlag::Locked => self.locked = on,
            TileFlag::Bombed => {
                self.bombed = on;
                self.visible = !on;
            }
            TileFlag::Golden => self.golden = on,
            TileFlag::Acidified => self.acidified = on,
        }
    }
}
