//! Board
//!
//! Owns every tile of a level and the grid that places them. Tiles live in an
//! arena indexed by `TileId`; the grid maps each cell to the tile currently in
//! it. Shuffles and gravity rewrite the grid and the tiles' coordinates, never
//! the tiles themselves, so effect handles stay valid across them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::debug;

use crate::core::hash::{StateHash, compute_board_hash};
use crate::core::rng::DeterministicRng;
use crate::game::config::{ConfigError, Difficulty, DifficultyConfig, validate_dimensions};
use crate::game::tile::{AnimalId, Position, Tile, TileId};

// =============================================================================
// SHUFFLE MODE / GRAVITY
// =============================================================================

/// How a shuffle rearranges the board.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShuffleMode {
    /// Normal/Advanced: only visible tiles move, laid out pair by pair
    Paired,
    /// Lunatic: every tile, hidden or not, goes anywhere
    Scatter,
}

impl ShuffleMode {
    /// Mode used by the mismatch-limit shuffle for a difficulty.
    pub fn for_difficulty(difficulty: Difficulty) -> Self {
        match difficulty {
            Difficulty::Normal | Difficulty::Advanced => ShuffleMode::Paired,
            Difficulty::Lunatic => ShuffleMode::Scatter,
        }
    }
}

/// Direction remaining tiles slide after a match on higher levels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gravity {
    /// Columns compact toward row 0
    Up,
    /// Columns compact toward the last row
    Down,
    /// Rows compact toward column 0
    Left,
    /// Rows compact toward the last column
    Right,
}

impl Gravity {
    /// Gravity rule for a level (level 1 has none).
    pub fn for_level(level: u8) -> Option<Self> {
        match level {
            2 => Some(Gravity::Up),
            3 => Some(Gravity::Down),
            4 => Some(Gravity::Left),
            5 => Some(Gravity::Right),
            _ => None,
        }
    }

    /// Does this gravity act on columns (as opposed to rows)?
    pub fn is_vertical(self) -> bool {
        matches!(self, Gravity::Up | Gravity::Down)
    }
}

/// Shuffle found the board in a state no valid pairing exists for.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ShuffleError {
    /// Odd number of visible tiles with no bomb pending.
    #[error("odd number of visible tiles ({0}); cannot form pairs")]
    OddVisibleCount(usize),

    /// A kind with an unpaired tile not explained by a pending bomb.
    #[error("kind {kind} has {count} tiles in play; cannot form pairs")]
    UnpairedKind {
        /// Offending kind
        kind: AnimalId,
        /// Visible plus bombed tiles of that kind
        count: usize,
    },
}

// =============================================================================
// BOARD
// =============================================================================

/// The playing grid.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Board {
    cols: usize,
    rows: usize,
    difficulty: Difficulty,
    /// Tile arena, indexed by `TileId`
    tiles: Vec<Tile>,
    /// Row-major cell -> tile
    grid: Vec<TileId>,
    mismatch_count: u32,
}

impl Board {
    /// Generate a shuffled board of random pairs.
    ///
    /// Draws `cols * rows / 2` animals with replacement from `pool`, adds
    /// each twice and permutes the positions.
    pub fn generate(
        cols: usize,
        rows: usize,
        difficulty: Difficulty,
        pool: &[AnimalId],
        rng: &mut DeterministicRng,
    ) -> Result<Self, ConfigError> {
        validate_dimensions(cols, rows)?;
        if pool.is_empty() {
            return Err(ConfigError::EmptyAnimalPool);
        }

        let pair_count = cols * rows / 2;
        let mut kinds = Vec::with_capacity(pair_count * 2);
        for _ in 0..pair_count {
            let kind = pool[rng.next_index(pool.len())];
            kinds.push(kind);
            kinds.push(kind);
        }
        rng.shuffle(&mut kinds);

        debug!(cols, rows, %difficulty, pairs = pair_count, "board generated");
        Ok(Self::build(cols, rows, difficulty, &kinds))
    }

    /// Generate a board from a difficulty table.
    pub fn from_config(config: &DifficultyConfig, rng: &mut DeterministicRng) -> Result<Self, ConfigError> {
        Self::generate(
            config.board_cols,
            config.board_rows,
            config.difficulty,
            &config.animal_pool,
            rng,
        )
    }

    /// Build a board from an explicit row-major layout.
    ///
    /// Unlike `generate`, kinds are not required to pair up, so puzzle
    /// fixtures of any shape can be expressed.
    pub fn from_layout(
        cols: usize,
        rows: usize,
        difficulty: Difficulty,
        kinds: &[AnimalId],
    ) -> Result<Self, ConfigError> {
        if cols == 0 || rows == 0 {
            return Err(ConfigError::EmptyBoard { cols, rows });
        }
        if kinds.len() != cols * rows {
            return Err(ConfigError::LayoutMismatch { expected: cols * rows, actual: kinds.len() });
        }
        Ok(Self::build(cols, rows, difficulty, kinds))
    }

    fn build(cols: usize, rows: usize, difficulty: Difficulty, kinds: &[AnimalId]) -> Self {
        let tiles: Vec<Tile> = kinds
            .iter()
            .enumerate()
            .map(|(idx, kind)| Tile::new(TileId(idx as u16), idx % cols, idx / cols, *kind))
            .collect();
        let grid = tiles.iter().map(|tile| tile.id).collect();

        Self {
            cols,
            rows,
            difficulty,
            tiles,
            grid,
            mismatch_count: 0,
        }
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Difficulty the board was built for.
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// Failed match attempts so far.
    pub fn mismatch_count(&self) -> u32 {
        self.mismatch_count
    }

    /// Count one failed attempt; returns the new total.
    pub fn record_mismatch(&mut self) -> u32 {
        self.mismatch_count += 1;
        self.mismatch_count
    }

    /// Clear the failed attempt counter.
    pub fn reset_mismatches(&mut self) {
        self.mismatch_count = 0;
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    #[inline]
    fn cell_index(&self, x: usize, y: usize) -> Option<usize> {
        if x < self.cols && y < self.rows {
            Some(y * self.cols + x)
        } else {
            None
        }
    }

    /// Convert signed coordinates into a position on this board.
    pub fn position(&self, x: i32, y: i32) -> Option<Position> {
        if x < 0 || y < 0 {
            return None;
        }
        let (x, y) = (x as usize, y as usize);
        self.cell_index(x, y).map(|_| Position::new(x, y))
    }

    /// Tile currently at a cell.
    pub fn tile_id_at(&self, x: usize, y: usize) -> Option<TileId> {
        self.cell_index(x, y).map(|idx| self.grid[idx])
    }

    /// Tile currently at a cell.
    pub fn tile_at(&self, x: usize, y: usize) -> Option<&Tile> {
        self.tile_id_at(x, y).map(|id| &self.tiles[id.index()])
    }

    /// Tile by identity.
    pub fn tile(&self, id: TileId) -> Option<&Tile> {
        self.tiles.get(id.index())
    }

    /// Tile by identity, for flag mutation.
    pub fn tile_mut(&mut self, id: TileId) -> Option<&mut Tile> {
        self.tiles.get_mut(id.index())
    }

    /// Is the cell passable for a connecting path (its tile is not visible)?
    #[inline]
    pub fn is_open(&self, x: usize, y: usize) -> bool {
        self.tile_at(x, y).is_some_and(|tile| !tile.visible)
    }

    /// All tiles in grid order (row by row).
    pub fn tiles(&self) -> impl Iterator<Item = &Tile> + '_ {
        self.grid.iter().map(move |id| &self.tiles[id.index()])
    }

    /// All tile ids in grid order.
    pub fn tile_ids(&self) -> Vec<TileId> {
        self.grid.clone()
    }

    /// Visible tile ids in grid order.
    pub fn visible_tiles(&self) -> Vec<TileId> {
        self.tiles().filter(|tile| tile.visible).map(|tile| tile.id).collect()
    }

    /// Number of visible tiles.
    pub fn visible_count(&self) -> usize {
        self.tiles.iter().filter(|tile| tile.visible).count()
    }

    /// Multiset of kinds over all tiles, hidden included.
    pub fn kind_counts(&self) -> BTreeMap<AnimalId, usize> {
        let mut counts = BTreeMap::new();
        for tile in &self.tiles {
            *counts.entry(tile.kind()).or_insert(0) += 1;
        }
        counts
    }

    /// Level cleared: nothing visible and no bombed tile waiting to return.
    pub fn is_complete(&self) -> bool {
        self.tiles.iter().all(Tile::is_removed)
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    fn place(&mut self, id: TileId, pos: Position) {
        let idx = pos.y * self.cols + pos.x;
        self.grid[idx] = id;
        let tile = &mut self.tiles[id.index()];
        tile.x = pos.x;
        tile.y = pos.y;
    }

    /// Hide both tiles if they are distinct, visible and of the same kind.
    ///
    /// Anything else counts as a mismatch.
    pub fn remove_if_match(&mut self, a: TileId, b: TileId) -> bool {
        let matched = a != b
            && match (self.tile(a), self.tile(b)) {
                (Some(t1), Some(t2)) => t1.visible && t2.visible && t1.kind() == t2.kind(),
                _ => false,
            };

        if matched {
            self.tiles[a.index()].visible = false;
            self.tiles[b.index()].visible = false;
        } else {
            self.mismatch_count += 1;
        }
        matched
    }

    /// Rearrange the board.
    pub fn shuffle(&mut self, mode: ShuffleMode, rng: &mut DeterministicRng) -> Result<(), ShuffleError> {
        match mode {
            ShuffleMode::Scatter => {
                self.shuffle_scatter(rng);
                Ok(())
            }
            ShuffleMode::Paired => self.shuffle_paired(rng),
        }
    }

    fn shuffle_scatter(&mut self, rng: &mut DeterministicRng) {
        let mut ids = self.grid.clone();
        rng.shuffle(&mut ids);
        for (idx, id) in ids.into_iter().enumerate() {
            self.place(id, Position::new(idx % self.cols, idx / self.cols));
        }
        debug!(tiles = self.tiles.len(), "board scattered");
    }

    fn shuffle_paired(&mut self, rng: &mut DeterministicRng) -> Result<(), ShuffleError> {
        let visible = self.visible_tiles();
        let bombed: Vec<AnimalId> = self.tiles.iter().filter(|t| t.bombed).map(Tile::kind).collect();

        if bombed.is_empty() && visible.len() % 2 != 0 {
            return Err(ShuffleError::OddVisibleCount(visible.len()));
        }

        let mut groups: BTreeMap<AnimalId, Vec<TileId>> = BTreeMap::new();
        for id in &visible {
            groups.entry(self.tiles[id.index()].kind()).or_default().push(*id);
        }

        let mut pairs: Vec<[TileId; 2]> = Vec::with_capacity(visible.len() / 2);
        let mut pinned: Vec<TileId> = Vec::new();
        for (kind, ids) in &groups {
            if ids.len() % 2 != 0 {
                // Partner may be blown away by a bomb; it keeps its place then
                let in_play = ids.len() + bombed.iter().filter(|k| *k == kind).count();
                if in_play % 2 != 0 {
                    return Err(ShuffleError::UnpairedKind { kind: *kind, count: in_play });
                }
                pinned.push(ids[ids.len() - 1]);
            }
            pairs.extend(ids.chunks_exact(2).map(|pair| [pair[0], pair[1]]));
        }

        rng.shuffle(&mut pairs);

        let slots: Vec<Position> = visible
            .iter()
            .filter(|id| !pinned.contains(*id))
            .map(|id| self.tiles[id.index()].position())
            .collect();
        let order: Vec<TileId> = pairs.iter().flatten().copied().collect();
        for (id, slot) in order.into_iter().zip(slots) {
            self.place(id, slot);
        }

        debug!(pairs = pairs.len(), pinned = pinned.len(), "board shuffled pairwise");
        Ok(())
    }

    /// Compact the given columns (vertical gravity) or rows (horizontal)
    /// so that tiles still in play slide toward the gravity side.
    ///
    /// Relative order along each line is kept.
    pub fn settle(&mut self, gravity: Gravity, lines: &[usize]) {
        let mut lines = lines.to_vec();
        lines.sort_unstable();
        lines.dedup();

        for line in lines {
            let cells: Vec<Position> = if gravity.is_vertical() {
                if line >= self.cols {
                    continue;
                }
                (0..self.rows).map(|y| Position::new(line, y)).collect()
            } else {
                if line >= self.rows {
                    continue;
                }
                (0..self.cols).map(|x| Position::new(x, line)).collect()
            };

            let (in_play, removed): (Vec<TileId>, Vec<TileId>) = cells
                .iter()
                .map(|pos| self.grid[pos.y * self.cols + pos.x])
                .partition(|id| self.tiles[id.index()].in_play());

            let ordered: Vec<TileId> = match gravity {
                Gravity::Up | Gravity::Left => in_play.into_iter().chain(removed).collect(),
                Gravity::Down | Gravity::Right => removed.into_iter().chain(in_play).collect(),
            };

            for (id, pos) in ordered.into_iter().zip(cells) {
                self.place(id, pos);
            }
        }
    }

    /// Fingerprint of layout and every tile flag.
    pub fn compute_hash(&self) -> StateHash {
        compute_board_hash(self.cols, self.rows, |hasher| {
            for tile in self.tiles() {
                hasher.update_u16(tile.id.0);
                hasher.update_u16(tile.kind().0);
                hasher.update_bool(tile.visible);
                hasher.update_bool(tile.locked);
                hasher.update_bool(tile.bombed);
                hasher.update_bool(tile.golden);
                hasher.update_bool(tile.acidified);
            }
        })
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for y in 0..self.rows {
            for x in 0..self.cols {
                if x > 0 {
                    f.write_str(" ")?;
                }
                match self.tile_at(x, y) {
                    Some(tile) if tile.visible => write!(f, "[{}]", tile.kind())?,
                    _ => f.write_str("[ X ]")?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
