//! Connecting Paths
//!
//! Two tiles connect when a route through empty cells joins them with at most
//! two changes of direction: a straight line, an L, or a Z/U shape.
//!
//! The search is a breadth-first walk over `(cell, heading, turns)` states, so
//! the first route that reaches the target is the shortest one within the turn
//! budget. Neighbours are always tried in the order up, down, left, right,
//! which fixes the tie-break between equally short routes.
//!
//! Everything here is a pure query over `&Board`; failed attempts are counted
//! by the caller.

use std::collections::{BTreeMap, VecDeque};

use serde::{Serialize, Deserialize};

use crate::game::board::Board;
use crate::game::config::Difficulty;
use crate::game::tile::{AnimalId, Position, TileId};

/// Maximum changes of direction along a connecting path.
pub const MAX_TURNS: u8 = 2;

const HEADINGS: usize = 4;
const TURN_STATES: usize = MAX_TURNS as usize + 1;
const STATES_PER_CELL: usize = HEADINGS * TURN_STATES;

// =============================================================================
// DIRECTION
// =============================================================================

/// Heading of one path step. Row 0 is the top of the board.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Toward row 0
    Up,
    /// Toward the last row
    Down,
    /// Toward column 0
    Left,
    /// Toward the last column
    Right,
}

impl Direction {
    /// Neighbour expansion order.
    pub const ORDER: [Direction; 4] = [Direction::Up, Direction::Down, Direction::Left, Direction::Right];

    #[inline]
    fn index(self) -> usize {
        self as usize
    }

    /// One step from `pos`, or `None` off the board.
    #[inline]
    fn step(self, pos: Position, cols: usize, rows: usize) -> Option<Position> {
        match self {
            Direction::Up if pos.y > 0 => Some(Position::new(pos.x, pos.y - 1)),
            Direction::Down if pos.y + 1 < rows => Some(Position::new(pos.x, pos.y + 1)),
            Direction::Left if pos.x > 0 => Some(Position::new(pos.x - 1, pos.y)),
            Direction::Right if pos.x + 1 < cols => Some(Position::new(pos.x + 1, pos.y)),
            _ => None,
        }
    }
}

// =============================================================================
// MATCH RESULT
// =============================================================================

/// Outcome of a move attempt.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Pair connected (and, when returned by a move, removed)
    pub matched: bool,
    /// Cells from the first tile to the second inclusive; empty on a miss
    pub path: Vec<Position>,
}

impl MatchResult {
    /// Failed attempt.
    pub fn miss() -> Self {
        Self::default()
    }

    /// Successful attempt along `path`.
    pub fn hit(path: Vec<Position>) -> Self {
        Self { matched: true, path }
    }

    /// Changes of direction along the path.
    pub fn turns(&self) -> usize {
        count_turns(&self.path)
    }
}

/// Changes of direction along a cell sequence.
pub fn count_turns(path: &[Position]) -> usize {
    let headings: Vec<(bool, bool)> = path
        .windows(2)
        .map(|step| (step[0].x == step[1].x, step[0].y == step[1].y))
        .collect();
    headings.windows(2).filter(|pair| pair[0] != pair[1]).count()
}

// =============================================================================
// SEARCH
// =============================================================================

/// Shortest connecting path between two tiles, endpoints included.
///
/// `None` if the tiles differ in kind, are the same tile, either one is
/// hidden, or no route within `MAX_TURNS` exists.
pub fn find_path(board: &Board, from: TileId, to: TileId) -> Option<Vec<Position>> {
    if from == to {
        return None;
    }
    let (a, b) = (board.tile(from)?, board.tile(to)?);
    if a.kind() != b.kind() || !a.visible || !b.visible {
        return None;
    }

    let (cols, rows) = (board.cols(), board.rows());
    let start = a.position();
    let goal = b.position();

    let state_index = |pos: Position, heading: Direction, turns: u8| {
        (pos.y * cols + pos.x) * STATES_PER_CELL + heading.index() * TURN_STATES + turns as usize
    };
    let state_position = |idx: usize| {
        let cell = idx / STATES_PER_CELL;
        Position::new(cell % cols, cell / cols)
    };

    let total_states = cols * rows * STATES_PER_CELL;
    let mut seen = vec![false; total_states];
    // Predecessor state; `None` means the step came straight from `start`
    let mut parent: Vec<Option<usize>> = vec![None; total_states];
    let mut queue: VecDeque<(Position, Direction, u8)> = VecDeque::new();

    let passable = |pos: Position| pos == goal || board.is_open(pos.x, pos.y);

    for heading in Direction::ORDER {
        if let Some(next) = heading.step(start, cols, rows).filter(|p| passable(*p)) {
            let idx = state_index(next, heading, 0);
            seen[idx] = true;
            queue.push_back((next, heading, 0));
        }
    }

    while let Some((pos, heading, turns)) = queue.pop_front() {
        let current = state_index(pos, heading, turns);

        if pos == goal {
            let mut path = vec![goal];
            let mut cursor = parent[current];
            while let Some(prev) = cursor {
                path.push(state_position(prev));
                cursor = parent[prev];
            }
            path.push(start);
            path.reverse();
            return Some(path);
        }

        for next_heading in Direction::ORDER {
            let next_turns = turns + u8::from(next_heading != heading);
            if next_turns > MAX_TURNS {
                continue;
            }
            let Some(next) = next_heading.step(pos, cols, rows) else {
                continue;
            };
            if !passable(next) {
                continue;
            }
            let idx = state_index(next, next_heading, next_turns);
            if seen[idx] {
                continue;
            }
            seen[idx] = true;
            parent[idx] = Some(current);
            queue.push_back((next, next_heading, next_turns));
        }
    }

    None
}

/// Can the two tiles be removed together right now?
pub fn is_connectable(board: &Board, from: TileId, to: TileId) -> MatchResult {
    match find_path(board, from, to) {
        Some(path) => MatchResult::hit(path),
        None => MatchResult::miss(),
    }
}

/// Visible tiles grouped by kind, each group in grid order.
fn visible_by_kind(board: &Board) -> BTreeMap<AnimalId, Vec<TileId>> {
    let mut groups: BTreeMap<AnimalId, Vec<TileId>> = BTreeMap::new();
    for tile in board.tiles().filter(|t| t.visible) {
        groups.entry(tile.kind()).or_default().push(tile.id);
    }
    groups
}

/// Every connectable unordered pair of visible tiles.
///
/// Quadratic in the visible tile count times the search cost; meant for
/// periodic or on-demand use, not per frame.
pub fn possible_matches(board: &Board) -> Vec<(TileId, TileId)> {
    let mut found = Vec::new();
    for ids in visible_by_kind(board).values() {
        for (i, first) in ids.iter().enumerate() {
            for second in &ids[i + 1..] {
                if find_path(board, *first, *second).is_some() {
                    found.push((*first, *second));
                }
            }
        }
    }
    found
}

/// First connectable pair, if any.
pub fn hint(board: &Board) -> Option<(TileId, TileId)> {
    visible_by_kind(board).values().find_map(|ids| {
        ids.iter().enumerate().find_map(|(i, first)| {
            ids[i + 1..]
                .iter()
                .find(|second| find_path(board, *first, **second).is_some())
                .map(|second| (*first, *second))
        })
    })
}

/// Has the board reached the difficulty's mismatch limit?
pub fn mismatch_limit_reached(board: &Board, difficulty: Difficulty) -> bool {
    limit_reached(board, difficulty.mismatch_limit())
}

/// Has the board reached an explicit mismatch limit?
pub fn limit_reached(board: &Board, limit: u32) -> bool {
    board.mismatch_count() >= limit
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rng::DeterministicRng;
    use proptest::prelude::*;

    fn layout(cols: usize, rows: usize, ids: &[u16]) -> Board {
        let kinds: Vec<AnimalId> = ids.iter().map(|id| AnimalId(*id)).collect();
        Board::from_layout(cols, rows, Difficulty::Normal, &kinds).unwrap()
    }

    fn hide(board: &mut Board, cells: &[(usize, usize)]) {
        for (x, y) in cells {
            let id = board.tile_id_at(*x, *y).unwrap();
            board.tile_mut(id).unwrap().visible = false;
        }
    }

    fn id_at(board: &Board, x: usize, y: usize) -> TileId {
        board.tile_id_at(x, y).unwrap()
    }

    fn p(x: usize, y: usize) -> Position {
        Position::new(x, y)
    }

    #[test]
    fn test_adjacent_pair_direct_path() {
        let mut board = layout(4, 2, &[1, 2, 2, 3, 3, 4, 4, 1]);
        hide(&mut board, &[(0, 0), (3, 0), (0, 1), (3, 1)]);

        let result = is_connectable(&board, id_at(&board, 1, 0), id_at(&board, 2, 0));
        assert!(result.matched);
        assert_eq!(result.path, vec![p(1, 0), p(2, 0)]);
        assert_eq!(result.turns(), 0);
    }

    #[test]
    fn test_three_by_three_corners() {
        let mut board = layout(3, 3, &[5; 9]);
        let others: Vec<(usize, usize)> = (0..3)
            .flat_map(|y| (0..3).map(move |x| (x, y)))
            .filter(|cell| *cell != (0, 0) && *cell != (2, 2))
            .collect();
        hide(&mut board, &others);

        let result = is_connectable(&board, id_at(&board, 0, 0), id_at(&board, 2, 2));
        assert!(result.matched);
        assert_eq!(result.path.len(), 5);
        assert_eq!(result.path.first(), Some(&p(0, 0)));
        assert_eq!(result.path.last(), Some(&p(2, 2)));
        assert!(result.turns() <= 2);
        // Down first: the route goes through the (0, 2) corner
        assert_eq!(result.path, vec![p(0, 0), p(0, 1), p(0, 2), p(1, 2), p(2, 2)]);
    }

    #[test]
    fn test_two_turn_route() {
        // A . B C
        // D . . A
        // F G H E
        let mut board = layout(4, 3, &[1, 0, 2, 3, 4, 0, 0, 1, 6, 7, 8, 5]);
        hide(&mut board, &[(1, 0), (1, 1), (2, 1)]);

        let result = is_connectable(&board, id_at(&board, 0, 0), id_at(&board, 3, 1));
        assert!(result.matched);
        assert_eq!(result.path, vec![p(0, 0), p(1, 0), p(1, 1), p(2, 1), p(3, 1)]);
        assert_eq!(result.turns(), 2);
    }

    #[test]
    fn test_route_needing_three_turns_is_rejected() {
        // A . B C
        // D . . E
        // F G . A
        let mut board = layout(4, 3, &[1, 0, 2, 3, 4, 0, 0, 5, 6, 7, 0, 1]);
        hide(&mut board, &[(1, 0), (1, 1), (2, 1), (2, 2)]);

        let result = is_connectable(&board, id_at(&board, 0, 0), id_at(&board, 3, 2));
        assert!(!result.matched);
        assert!(result.path.is_empty());
    }

    #[test]
    fn test_fast_failures() {
        let mut board = layout(2, 2, &[1, 1, 2, 1]);
        let (a, b, c, d) = (id_at(&board, 0, 0), id_at(&board, 1, 0), id_at(&board, 0, 1), id_at(&board, 1, 1));

        // Different kinds
        assert!(!is_connectable(&board, a, c).matched);
        // Same tile
        assert!(!is_connectable(&board, a, a).matched);
        // Hidden endpoint
        hide(&mut board, &[(1, 0)]);
        assert!(!is_connectable(&board, a, b).matched);
        // Queries never count mismatches
        assert!(is_connectable(&board, b, d).path.is_empty());
        assert_eq!(board.mismatch_count(), 0);
    }

    #[test]
    fn test_possible_matches_and_hint() {
        let board = layout(2, 2, &[1, 1, 2, 2]);
        let pairs = possible_matches(&board);
        assert_eq!(pairs.len(), 2);
        assert!(pairs.contains(&(id_at(&board, 0, 0), id_at(&board, 1, 0))));
        assert_eq!(hint(&board), Some((id_at(&board, 0, 0), id_at(&board, 1, 0))));

        // 1 2 1 in a single row: the 2 blocks the only route
        let blocked = layout(3, 1, &[1, 2, 1]);
        assert!(possible_matches(&blocked).is_empty());
        assert_eq!(hint(&blocked), None);
    }

    #[test]
    fn test_mismatch_limits() {
        let mut board = layout(2, 1, &[1, 1]);
        board.record_mismatch();
        board.record_mismatch();
        assert!(!mismatch_limit_reached(&board, Difficulty::Normal));
        assert!(!mismatch_limit_reached(&board, Difficulty::Advanced));
        assert!(mismatch_limit_reached(&board, Difficulty::Lunatic));

        board.record_mismatch();
        assert!(mismatch_limit_reached(&board, Difficulty::Normal));
        assert!(mismatch_limit_reached(&board, Difficulty::Advanced));
    }

    #[test]
    fn test_count_turns() {
        assert_eq!(count_turns(&[p(0, 0), p(1, 0), p(2, 0)]), 0);
        assert_eq!(count_turns(&[p(0, 0), p(1, 0), p(1, 1)]), 1);
        assert_eq!(count_turns(&[]), 0);
    }

    proptest! {
        #[test]
        fn prop_connectivity_is_symmetric(seed in any::<u64>(), hidden in 0usize..30) {
            let mut rng = DeterministicRng::new(seed);
            let pool: Vec<AnimalId> = (1..=4).map(AnimalId).collect();
            let mut board = Board::generate(6, 5, Difficulty::Normal, &pool, &mut rng).unwrap();
            let ids = board.tile_ids();
            for id in rng.sample(&ids, hidden) {
                board.tile_mut(id).unwrap().visible = false;
            }

            for (i, a) in ids.iter().enumerate() {
                for b in &ids[i + 1..] {
                    let forward = is_connectable(&board, *a, *b);
                    let backward = is_connectable(&board, *b, *a);
                    prop_assert_eq!(forward.matched, backward.matched);
                    prop_assert_eq!(forward.path.len(), backward.path.len());
                    if forward.matched {
                        prop_assert!(forward.turns() <= MAX_TURNS as usize);
                        let interior = &forward.path[1..forward.path.len() - 1];
                        prop_assert!(interior.iter().all(|cell| board.is_open(cell.x, cell.y)));
                    }
                }
            }
        }
    }
}
