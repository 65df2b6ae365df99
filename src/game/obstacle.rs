//! Obstacle Effects
//!
//! The six timed perturbations and their per-difficulty tables. Each effect
//! is split into a synchronous start step that flags tiles and returns a
//! `Disturbance`, and a restore step that clears exactly what the start step
//! set. The async scheduler sleeps between the two without holding the lock.

use std::fmt;
use std::time::Duration;

use serde::{Serialize, Deserialize};
use tracing::{debug, info};

use crate::core::rng::DeterministicRng;
use crate::game::board::{ShuffleError, ShuffleMode};
use crate::game::config::{Difficulty, MAX_EFFECT_DELAY_SECS};
use crate::game::events::{GameEvent, ShuffleReason};
use crate::game::path::limit_reached;
use crate::game::state::MatchState;
use crate::game::tile::{TileFlag, TileId};

/// Seconds added to the countdown when a golden fish appears.
pub const GOLDEN_TIME_BONUS: u32 = 30;

/// Bomb fuse range in whole seconds (inclusive).
pub const FUSE_SECS: (u32, u32) = (15, 20);

/// Acid rain duration range in whole seconds (inclusive).
pub const ACID_SECS: (u32, u32) = (10, 15);

/// Jitter applied to every scheduling delay.
pub const DELAY_JITTER: (f64, f64) = (0.9, 1.1);

// =============================================================================
// OBSTACLE KIND
// =============================================================================

/// Obstacle effect variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ObstacleKind {
    /// Immediate paired shuffle
    Tornado,
    /// A few tiles cannot be selected for a while
    TileLocking,
    /// Tiles are blown off the board until the fuse runs out
    TimeBomb,
    /// One tile turns golden and the clock gains time
    GoldenFish,
    /// A share of the board is marked by acid
    AcidRain,
    /// Shuffle if the mismatch limit is reached
    ForcedShuffle,
}

impl ObstacleKind {
    /// All kinds, in scheduling pick order.
    pub const ALL: [ObstacleKind; 6] = [
        ObstacleKind::Tornado,
        ObstacleKind::TileLocking,
        ObstacleKind::TimeBomb,
        ObstacleKind::GoldenFish,
        ObstacleKind::AcidRain,
        ObstacleKind::ForcedShuffle,
    ];

    /// Base scheduling delay in seconds before jitter.
    pub fn base_delay_secs(self, difficulty: Difficulty) -> f64 {
        use Difficulty::*;
        match (self, difficulty) {
            (ObstacleKind::Tornado, Normal) => 15.0,
            (ObstacleKind::Tornado, Advanced) => 10.0,
            (ObstacleKind::Tornado, Lunatic) => 5.0,
            (ObstacleKind::TileLocking, Normal) => 30.0,
            (ObstacleKind::TileLocking, Advanced) => 25.0,
            (ObstacleKind::TileLocking, Lunatic) => 20.0,
            (ObstacleKind::TimeBomb, Normal) => 20.0,
            (ObstacleKind::TimeBomb, Advanced) => 18.0,
            (ObstacleKind::TimeBomb, Lunatic) => 15.0,
            (ObstacleKind::GoldenFish, Normal) => 32.0,
            (ObstacleKind::GoldenFish, Advanced | Lunatic) => 28.0,
            (ObstacleKind::AcidRain, Normal) => 10.0,
            (ObstacleKind::AcidRain, Advanced) => 8.0,
            (ObstacleKind::AcidRain, Lunatic) => 6.0,
            (ObstacleKind::ForcedShuffle, Normal) => 15.0,
            (ObstacleKind::ForcedShuffle, Advanced) => 12.0,
            (ObstacleKind::ForcedShuffle, Lunatic) => 8.0,
        }
    }

    /// Display name.
    pub fn name(self) -> &'static str {
        match self {
            ObstacleKind::Tornado => "tornado",
            ObstacleKind::TileLocking => "tile_locking",
            ObstacleKind::TimeBomb => "time_bomb",
            ObstacleKind::GoldenFish => "golden_fish",
            ObstacleKind::AcidRain => "acid_rain",
            ObstacleKind::ForcedShuffle => "forced_shuffle",
        }
    }
}

impl fmt::Display for ObstacleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// INTENSITY TABLES
// =============================================================================

/// Tiles locked by one tile-locking effect.
pub fn lock_count(difficulty: Difficulty, rng: &mut DeterministicRng) -> usize {
    match difficulty {
        Difficulty::Normal => rng.next_int_range(3, 4) as usize,
        Difficulty::Advanced | Difficulty::Lunatic => rng.next_int_range(2, 3) as usize,
    }
}

/// How long locked tiles stay locked.
pub fn unlock_delay(difficulty: Difficulty) -> Duration {
    Duration::from_secs(match difficulty {
        Difficulty::Normal => 30,
        Difficulty::Advanced => 25,
        Difficulty::Lunatic => 20,
    })
}

/// Bombs planted by one time-bomb effect.
pub fn bomb_count(difficulty: Difficulty, rng: &mut DeterministicRng) -> u32 {
    match difficulty {
        Difficulty::Normal => rng.next_int_range(1, 2),
        Difficulty::Advanced => rng.next_int_range(2, 3),
        Difficulty::Lunatic => rng.next_int_range(3, 5),
    }
}

/// How long the golden fish stays on the board.
pub fn golden_duration(difficulty: Difficulty) -> Duration {
    Duration::from_secs(match difficulty {
        Difficulty::Normal => 32,
        Difficulty::Advanced | Difficulty::Lunatic => 28,
    })
}

/// Share of all tiles hit by acid rain.
pub fn acid_fraction(difficulty: Difficulty, rng: &mut DeterministicRng) -> f64 {
    match difficulty {
        Difficulty::Normal => rng.next_f64_range(0.10, 0.15),
        Difficulty::Advanced => 0.20,
        Difficulty::Lunatic => 0.30,
    }
}

/// Base delay scaled by a uniform draw from `DELAY_JITTER`.
///
/// Never longer than the jittered `MAX_EFFECT_DELAY_SECS`; a base that is not
/// a positive number waits the maximum.
pub fn jittered_delay(base_secs: f64, rng: &mut DeterministicRng) -> Duration {
    let longest = MAX_EFFECT_DELAY_SECS * DELAY_JITTER.1;
    let secs = base_secs * rng.next_f64_range(DELAY_JITTER.0, DELAY_JITTER.1);
    Duration::try_from_secs_f64(secs.min(longest))
        .ok()
        .filter(|delay| !delay.is_zero())
        .unwrap_or(Duration::from_secs_f64(longest))
}

fn whole_secs(range: (u32, u32), rng: &mut DeterministicRng) -> Duration {
    Duration::from_secs(u64::from(rng.next_int_range(range.0, range.1)))
}

// =============================================================================
// DISTURBANCE
// =============================================================================

/// Tiles flagged by a start step, to be cleared after `hold`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Disturbance {
    /// Effect that set the flag
    pub kind: ObstacleKind,
    /// Flag to clear on restore
    pub flag: TileFlag,
    /// Exactly the tiles the start step flagged
    pub tiles: Vec<TileId>,
    /// Wait before restoring
    pub hold: Duration,
    /// Board generation the tiles belong to
    pub board_epoch: u32,
}

/// Lock a few random tiles.
pub fn lock_tiles(state: &mut MatchState) -> Option<Disturbance> {
    let difficulty = state.config.difficulty();
    let count = lock_count(difficulty, &mut state.rng);
    let candidates = state.board.tile_ids();
    if candidates.len() < count {
        return None;
    }
    let tiles = state.rng.sample(&candidates, count);
    flag_tiles(state, ObstacleKind::TileLocking, TileFlag::Locked, tiles, unlock_delay(difficulty))
}

/// Blow a random visible tile and its visible neighbours off the board.
pub fn plant_bomb(state: &mut MatchState) -> Option<Disturbance> {
    let visible = state.board.visible_tiles();
    let centre = *state.rng.choose(&visible)?;
    let pos = state.board.tile(centre)?.position();

    let mut tiles = vec![centre];
    for (dx, dy) in [(-1i32, 0i32), (1, 0), (0, -1), (0, 1)] {
        let neighbour = state
            .board
            .position(pos.x as i32 + dx, pos.y as i32 + dy)
            .and_then(|p| state.board.tile_at(p.x, p.y))
            .filter(|tile| tile.visible)
            .map(|tile| tile.id);
        tiles.extend(neighbour);
    }

    let fuse = whole_secs(FUSE_SECS, &mut state.rng);
    debug!(centre = %pos, tiles = tiles.len(), fuse_secs = fuse.as_secs(), "bomb planted");
    flag_tiles(state, ObstacleKind::TimeBomb, TileFlag::Bombed, tiles, fuse)
}

/// Gild a random visible tile and grant the golden fish time bonus.
pub fn release_golden_fish(state: &mut MatchState) -> Option<Disturbance> {
    let visible = state.board.visible_tiles();
    let tile = *state.rng.choose(&visible)?;
    state.add_time(GOLDEN_TIME_BONUS);
    state.push_event(GameEvent::golden_fish_bonus(state.elapsed, GOLDEN_TIME_BONUS));
    let hold = golden_duration(state.config.difficulty());
    flag_tiles(state, ObstacleKind::GoldenFish, TileFlag::Golden, vec![tile], hold)
}

/// Acidify a share of all tiles.
pub fn acid_rain(state: &mut MatchState) -> Option<Disturbance> {
    let fraction = acid_fraction(state.config.difficulty(), &mut state.rng);
    let candidates = state.board.tile_ids();
    let count = (fraction * candidates.len() as f64).floor() as usize;
    if count == 0 {
        return None;
    }
    let tiles = state.rng.sample(&candidates, count);
    let hold = whole_secs(ACID_SECS, &mut state.rng);
    flag_tiles(state, ObstacleKind::AcidRain, TileFlag::Acidified, tiles, hold)
}

fn flag_tiles(
    state: &mut MatchState,
    kind: ObstacleKind,
    flag: TileFlag,
    tiles: Vec<TileId>,
    hold: Duration,
) -> Option<Disturbance> {
    for id in &tiles {
        if let Some(tile) = state.board.tile_mut(*id) {
            tile.set_flag(flag, true);
        }
    }
    Some(Disturbance {
        kind,
        flag,
        tiles,
        hold,
        board_epoch: state.board_epoch(),
    })
}

/// Clear the flag on exactly the tiles the start step touched.
///
/// A no-op if the board was regenerated since.
pub fn restore(state: &mut MatchState, disturbance: &Disturbance) {
    if disturbance.board_epoch != state.board_epoch() {
        debug!(effect = %disturbance.kind, "board replaced; nothing to restore");
        return;
    }
    for id in &disturbance.tiles {
        if let Some(tile) = state.board.tile_mut(*id) {
            tile.set_flag(disturbance.flag, false);
        }
    }
    debug!(effect = %disturbance.kind, tiles = disturbance.tiles.len(), "effect restored");
}

// =============================================================================
// SHUFFLES
// =============================================================================

/// Paired shuffle, whatever the board looks like.
pub fn tornado(state: &mut MatchState) -> Result<(), ShuffleError> {
    info!("tornado shakes the board");
    state.shuffle_board(ShuffleMode::Paired, ShuffleReason::Tornado)
}

/// Difficulty shuffle if the mismatch limit is reached; returns whether it ran.
pub fn forced_shuffle(state: &mut MatchState) -> Result<bool, ShuffleError> {
    if !limit_reached(&state.board, state.config.rules.mismatch_limit) {
        return Ok(false);
    }
    let mode = ShuffleMode::for_difficulty(state.config.difficulty());
    state.shuffle_board(mode, ShuffleReason::ForcedShuffle)?;
    state.board.reset_mismatches();
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::board::Board;
    use crate::game::config::MatchConfig;
    use crate::game::tile::AnimalId;
    use uuid::Uuid;

    fn state_with(difficulty: Difficulty, cols: usize, rows: usize, ids: &[u16]) -> MatchState {
        let kinds: Vec<AnimalId> = ids.iter().map(|id| AnimalId(*id)).collect();
        let board = Board::from_layout(cols, rows, difficulty, &kinds).unwrap();
        MatchState::from_board(Uuid::nil(), MatchConfig::new(difficulty), board, DeterministicRng::new(11))
    }

    fn generated(difficulty: Difficulty) -> MatchState {
        MatchState::new(Uuid::from_u128(42), MatchConfig::new(difficulty)).unwrap()
    }

    #[test]
    fn test_delay_table() {
        assert_eq!(ObstacleKind::Tornado.base_delay_secs(Difficulty::Lunatic), 5.0);
        assert_eq!(ObstacleKind::GoldenFish.base_delay_secs(Difficulty::Advanced), 28.0);
        assert_eq!(ObstacleKind::ForcedShuffle.base_delay_secs(Difficulty::Normal), 15.0);
    }

    #[test]
    fn test_intensity_ranges() {
        let mut rng = DeterministicRng::new(5);
        for _ in 0..200 {
            assert!((3..=4).contains(&lock_count(Difficulty::Normal, &mut rng)));
            assert!((2..=3).contains(&lock_count(Difficulty::Lunatic, &mut rng)));
            assert!((3..=5).contains(&bomb_count(Difficulty::Lunatic, &mut rng)));
            let acid = acid_fraction(Difficulty::Normal, &mut rng);
            assert!((0.10..=0.15).contains(&acid));
            let delay = jittered_delay(10.0, &mut rng).as_secs_f64();
            assert!((9.0..=11.0).contains(&delay));
        }
        assert_eq!(acid_fraction(Difficulty::Advanced, &mut rng), 0.20);
    }

    #[test]
    fn test_jittered_delay_is_bounded() {
        let mut rng = DeterministicRng::new(17);
        let longest = Duration::from_secs_f64(MAX_EFFECT_DELAY_SECS * DELAY_JITTER.1);
        for base in [1e30, f64::INFINITY, f64::NAN, -5.0, 0.0] {
            let delay = jittered_delay(base, &mut rng);
            assert!(delay > Duration::ZERO && delay <= longest, "{base} -> {delay:?}");
        }
    }

    #[test]
    fn test_lock_and_restore_exact_tiles() {
        let mut state = generated(Difficulty::Normal);
        let before = state.board.compute_hash();

        let disturbance = lock_tiles(&mut state).unwrap();
        assert!((3..=4).contains(&disturbance.tiles.len()));
        assert_eq!(disturbance.hold, Duration::from_secs(30));
        let locked = state.board.tiles().filter(|t| t.locked).count();
        assert_eq!(locked, disturbance.tiles.len());

        restore(&mut state, &disturbance);
        assert!(state.board.tiles().all(|t| !t.locked));
        assert_eq!(state.board.compute_hash(), before);
    }

    #[test]
    fn test_bomb_hits_centre_and_visible_neighbours() {
        // Single visible pair in the middle of a 3x3
        let mut state = state_with(Difficulty::Normal, 3, 3, &[0, 0, 0, 0, 1, 1, 0, 0, 0]);
        for (x, y) in [(0, 0), (1, 0), (2, 0), (0, 1), (0, 2), (1, 2), (2, 2)] {
            let id = state.board.tile_id_at(x, y).unwrap();
            state.board.tile_mut(id).unwrap().visible = false;
        }

        let disturbance = plant_bomb(&mut state).unwrap();
        assert_eq!(disturbance.tiles.len(), 2);
        assert!((15..=20).contains(&disturbance.hold.as_secs()));
        assert_eq!(state.board.visible_count(), 0);
        assert!(!state.board.is_complete());

        restore(&mut state, &disturbance);
        assert_eq!(state.board.visible_count(), 2);
        assert!(state.board.tiles().all(|t| !t.bombed));
        // Tiles matched before the bomb stay gone
        assert!(state.board.tile_at(0, 0).unwrap().is_removed());
    }

    #[test]
    fn test_bomb_needs_a_visible_tile() {
        let mut state = state_with(Difficulty::Normal, 2, 1, &[1, 1]);
        let ids = state.board.tile_ids();
        assert!(state.board.remove_if_match(ids[0], ids[1]));
        assert_eq!(plant_bomb(&mut state), None);
    }

    #[test]
    fn test_golden_fish_grants_time() {
        let mut state = generated(Difficulty::Advanced);
        let before = state.time_left;

        let disturbance = release_golden_fish(&mut state).unwrap();
        assert_eq!(state.time_left, before + GOLDEN_TIME_BONUS);
        assert_eq!(disturbance.hold, Duration::from_secs(28));
        assert_eq!(state.board.tiles().filter(|t| t.golden).count(), 1);

        restore(&mut state, &disturbance);
        assert!(state.board.tiles().all(|t| !t.golden));
    }

    #[test]
    fn test_acid_rain_share() {
        let mut state = generated(Difficulty::Lunatic);
        let disturbance = acid_rain(&mut state).unwrap();
        // floor(0.30 * 192)
        assert_eq!(disturbance.tiles.len(), 57);
        assert!((10..=15).contains(&disturbance.hold.as_secs()));

        restore(&mut state, &disturbance);
        assert!(state.board.tiles().all(|t| !t.acidified));
    }

    #[test]
    fn test_restore_skips_replaced_board() {
        let mut state = generated(Difficulty::Normal);
        let disturbance = acid_rain(&mut state).unwrap();
        state.restart().unwrap();
        restore(&mut state, &disturbance);
        assert!(state.board.tiles().all(|t| !t.acidified));
        assert_ne!(disturbance.board_epoch, state.board_epoch());
    }

    #[test]
    fn test_forced_shuffle_only_at_limit() {
        let mut state = generated(Difficulty::Normal);
        assert!(!forced_shuffle(&mut state).unwrap());

        for _ in 0..3 {
            state.board.record_mismatch();
        }
        let counts = state.board.kind_counts();
        assert!(forced_shuffle(&mut state).unwrap());
        assert_eq!(state.board.mismatch_count(), 0);
        assert_eq!(state.board.kind_counts(), counts);
    }
}
