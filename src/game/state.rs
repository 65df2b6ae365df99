//! Match State
//!
//! The single mutable record of a running match: board, score, clock,
//! selection, active effects and the pending event log. The countdown, the
//! input loop and every obstacle task share one `MatchState` behind a
//! `SharedMatch` lock and only mutate it through the methods below.
//! Uses BTreeMap for deterministic iteration order.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Deserialize};
use tokio::sync::RwLock;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::core::rng::DeterministicRng;
use crate::game::board::{Board, Gravity, ShuffleError, ShuffleMode};
use crate::game::config::{ConfigError, MatchConfig};
use crate::game::events::{GameEvent, GameEventData, ShuffleReason};
use crate::game::input::{SelectTile, Selection, SelectionError};
use crate::game::obstacle::ObstacleKind;
use crate::game::path::{self, MatchResult, find_path, limit_reached};
use crate::game::score::ScoreTracker;
use crate::game::snapshot::MatchSnapshot;
use crate::game::tile::TileId;

/// Match state shared between the countdown, input and effect tasks.
pub type SharedMatch = Arc<RwLock<MatchState>>;

// =============================================================================
// MATCH PHASE
// =============================================================================

/// Match lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchPhase {
    /// Countdown running, moves accepted
    Running,
    /// Board cleared
    Won,
    /// Countdown reached zero
    TimedOut,
    /// Player quit or the input closed
    Abandoned,
    /// A board invariant broke
    Faulted,
}

impl MatchPhase {
    /// Terminal phase?
    pub fn is_over(self) -> bool {
        !matches!(self, MatchPhase::Running)
    }
}

impl fmt::Display for MatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MatchPhase::Running => "running",
            MatchPhase::Won => "won",
            MatchPhase::TimedOut => "timed_out",
            MatchPhase::Abandoned => "abandoned",
            MatchPhase::Faulted => "faulted",
        };
        f.write_str(name)
    }
}

/// Handle of one in-flight obstacle effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EffectId(pub u32);

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// MATCH STATE
// =============================================================================

/// Complete state of a match.
#[derive(Clone, Debug)]
pub struct MatchState {
    /// Match identifier
    pub match_id: Uuid,

    /// Rules for this match
    pub config: MatchConfig,

    /// The grid
    pub board: Board,

    /// Combo and score bookkeeping
    pub score: ScoreTracker,

    /// Countdown seconds remaining
    pub time_left: u32,

    /// Seconds since start (or last restart)
    pub elapsed: u32,

    /// Current phase
    pub phase: MatchPhase,

    /// Source of every random choice in the match
    pub rng: DeterministicRng,

    /// First tile of a pending pair
    selection: Option<TileId>,

    /// In-flight effects (BTreeMap for deterministic iteration)
    active_effects: BTreeMap<EffectId, ObstacleKind>,

    next_effect_id: u32,

    /// Bumped whenever the board is replaced
    board_epoch: u32,

    /// Events not yet drained
    pending_events: Vec<GameEvent>,

    /// Invariant violation that ended the match
    fault: Option<ShuffleError>,
}

impl MatchState {
    /// Create a match with a generated board.
    ///
    /// The RNG seed is derived from the match id and difficulty.
    pub fn new(match_id: Uuid, config: MatchConfig) -> Result<Self, ConfigError> {
        config.rules.validate()?;
        let mut rng = DeterministicRng::for_match(match_id.as_bytes(), config.difficulty());
        let board = Board::from_config(&config.rules, &mut rng)?;
        info!(
            %match_id,
            difficulty = %config.difficulty(),
            level = config.level,
            cols = board.cols(),
            rows = board.rows(),
            "match created"
        );
        Ok(Self::from_board(match_id, config, board, rng))
    }

    /// Create a match around an existing board.
    pub fn from_board(match_id: Uuid, config: MatchConfig, board: Board, rng: DeterministicRng) -> Self {
        let time_left = config.rules.base_time_secs;
        Self {
            match_id,
            config,
            board,
            score: ScoreTracker::new(),
            time_left,
            elapsed: 0,
            phase: MatchPhase::Running,
            rng,
            selection: None,
            active_effects: BTreeMap::new(),
            next_effect_id: 0,
            board_epoch: 0,
            pending_events: Vec::new(),
            fault: None,
        }
    }

    /// Wrap in a shared handle.
    pub fn into_shared(self) -> SharedMatch {
        Arc::new(RwLock::new(self))
    }

    /// Board generation counter.
    pub fn board_epoch(&self) -> u32 {
        self.board_epoch
    }

    /// Pending first tile, if any.
    pub fn selection(&self) -> Option<TileId> {
        self.selection
    }

    /// Invariant violation that ended the match.
    pub fn fault(&self) -> Option<&ShuffleError> {
        self.fault.as_ref()
    }

    /// Kinds of the effects currently in flight.
    pub fn active_effects(&self) -> Vec<ObstacleKind> {
        self.active_effects.values().copied().collect()
    }

    // =========================================================================
    // Moves
    // =========================================================================

    /// Validate a selection and pair it with the pending one.
    ///
    /// A rejected selection leaves the state untouched.
    pub fn select_tile(&mut self, select: SelectTile) -> Result<Selection, SelectionError> {
        if self.phase.is_over() {
            return Err(SelectionError::MatchOver);
        }
        let out_of_bounds = SelectionError::OutOfBounds { x: select.x, y: select.y };
        let pos = self.board.position(select.x, select.y).ok_or(out_of_bounds.clone())?;
        let tile = self.board.tile_at(pos.x, pos.y).ok_or(out_of_bounds)?;
        if !tile.visible {
            return Err(SelectionError::TileHidden(pos));
        }
        if tile.locked {
            return Err(SelectionError::TileLocked(pos));
        }
        let id = tile.id;

        // A pending tile an effect has since hidden or locked no longer counts
        let pending = self
            .selection
            .filter(|first| self.board.tile(*first).is_some_and(|t| t.is_selectable()));

        match pending {
            Some(first) if first == id => Err(SelectionError::SameTile(pos)),
            Some(first) => {
                self.selection = None;
                Ok(Selection::Pair(first, id))
            }
            None => {
                self.selection = Some(id);
                Ok(Selection::First(id))
            }
        }
    }

    /// Try to remove a pair, then apply scoring, gravity and the shuffle policy.
    ///
    /// A failed path is counted as a mismatch here. A shuffle error faults the
    /// match and is returned.
    pub fn attempt_match(&mut self, a: TileId, b: TileId) -> Result<MatchResult, ShuffleError> {
        if self.phase.is_over() {
            return Ok(MatchResult::miss());
        }

        let result = match find_path(&self.board, a, b) {
            Some(path) => {
                self.board.remove_if_match(a, b);
                self.score.register_move(true);
                let points = self.score.add_score();
                let bonus = self.score.apply_time_bonus();
                self.add_time(bonus);

                let (first, second) = (path[0], path[path.len() - 1]);
                debug!(%first, %second, points, combo = self.score.combo(), bonus, "tiles matched");
                self.push_event(GameEvent::tiles_matched(
                    self.elapsed,
                    first,
                    second,
                    points,
                    self.score.combo(),
                    bonus,
                ));

                if let Some(gravity) = Gravity::for_level(self.config.level) {
                    let lines = if gravity.is_vertical() {
                        [first.x, second.x]
                    } else {
                        [first.y, second.y]
                    };
                    self.board.settle(gravity, &lines);
                    self.push_event(GameEvent::new(self.elapsed, GameEventData::BoardSettled { gravity }));
                }

                MatchResult::hit(path)
            }
            None => {
                let count = self.board.record_mismatch();
                self.score.register_move(false);
                debug!(mismatch_count = count, "no connecting path");
                self.push_event(GameEvent::mismatch(self.elapsed, count));
                MatchResult::miss()
            }
        };

        if self.board.is_complete() {
            if self.config.on_final_level() {
                self.finish(MatchPhase::Won);
            } else {
                info!(level = self.config.level, score = self.score.score(), "level cleared");
                self.push_event(GameEvent::new(self.elapsed, GameEventData::LevelCleared { level: self.config.level }));
            }
            return Ok(result);
        }

        if let Err(err) = self.apply_shuffle_policy() {
            self.record_fault(err.clone());
            return Err(err);
        }
        Ok(result)
    }

    /// Shuffle when no pair connects, or when the mismatch limit is reached.
    fn apply_shuffle_policy(&mut self) -> Result<(), ShuffleError> {
        if self.board.visible_count() == 0 {
            return Ok(());
        }
        if path::hint(&self.board).is_none() {
            self.shuffle_board(ShuffleMode::Paired, ShuffleReason::NoMoves)?;
        } else if limit_reached(&self.board, self.config.rules.mismatch_limit) {
            let mode = ShuffleMode::for_difficulty(self.config.difficulty());
            self.shuffle_board(mode, ShuffleReason::MismatchLimit)?;
            self.board.reset_mismatches();
        }
        Ok(())
    }

    /// Shuffle the board and log why.
    pub fn shuffle_board(&mut self, mode: ShuffleMode, reason: ShuffleReason) -> Result<(), ShuffleError> {
        self.board.shuffle(mode, &mut self.rng)?;
        self.selection = None;
        info!(?mode, ?reason, "board shuffled");
        self.push_event(GameEvent::board_shuffled(self.elapsed, mode, reason));
        Ok(())
    }

    /// First connectable pair, announced as an event.
    pub fn hint(&mut self) -> Option<(TileId, TileId)> {
        let (a, b) = path::hint(&self.board)?;
        let first = self.board.tile(a)?.position();
        let second = self.board.tile(b)?.position();
        debug!(%first, %second, "hint");
        self.push_event(GameEvent::new(self.elapsed, GameEventData::HintAvailable { first, second }));
        Some((a, b))
    }

    // =========================================================================
    // Clock
    // =========================================================================

    /// Add seconds to the countdown.
    pub fn add_time(&mut self, secs: u32) {
        self.time_left = self.time_left.saturating_add(secs);
    }

    /// Advance the countdown one second; returns the resulting phase.
    pub fn tick_second(&mut self) -> MatchPhase {
        if self.phase.is_over() {
            return self.phase;
        }
        self.elapsed += 1;
        self.time_left = self.time_left.saturating_sub(1);

        let interval = self.config.hint_interval_secs;
        if interval > 0 && self.elapsed % interval == 0 {
            self.hint();
        }
        if self.time_left > 0 && self.time_left % 60 == 0 {
            info!(time_left = self.time_left, score = self.score.score(), "countdown");
        }
        if self.time_left == 0 {
            self.finish(MatchPhase::TimedOut);
        }
        self.phase
    }

    /// Board cleared below the final level and waiting for `advance_level`.
    pub fn level_cleared(&self) -> bool {
        !self.phase.is_over() && self.board.is_complete()
    }

    /// Deal a fresh board one level up.
    ///
    /// Score and combo carry over; the countdown refills to the base time.
    pub fn advance_level(&mut self) -> Result<u8, ConfigError> {
        self.board = Board::from_config(&self.config.rules, &mut self.rng)?;
        self.board_epoch += 1;
        self.config.level += 1;
        self.time_left = self.config.rules.base_time_secs;
        self.selection = None;
        let level = self.config.level;
        info!(match_id = %self.match_id, level, epoch = self.board_epoch, "level started");
        self.push_event(GameEvent::new(self.elapsed, GameEventData::LevelStarted { level }));
        Ok(level)
    }

    /// Regenerate the board at the current level and reset score and clock.
    pub fn restart(&mut self) -> Result<(), ConfigError> {
        self.board = Board::from_config(&self.config.rules, &mut self.rng)?;
        self.board_epoch += 1;
        self.score.reset();
        self.time_left = self.config.rules.base_time_secs;
        self.elapsed = 0;
        self.selection = None;
        self.phase = MatchPhase::Running;
        info!(match_id = %self.match_id, epoch = self.board_epoch, "match restarted");
        self.push_event(GameEvent::new(0, GameEventData::Restarted));
        Ok(())
    }

    /// Enter a terminal phase (first call wins).
    pub fn finish(&mut self, phase: MatchPhase) {
        if self.phase.is_over() || !phase.is_over() {
            return;
        }
        self.phase = phase;
        info!(
            match_id = %self.match_id,
            %phase,
            score = self.score.score(),
            elapsed = self.elapsed,
            "match ended"
        );
        self.push_event(GameEvent::match_ended(self.elapsed, phase, self.score.score()));
    }

    /// End the match on a broken board invariant.
    pub fn record_fault(&mut self, err: ShuffleError) {
        error!(%err, "board invariant violated");
        self.fault = Some(err);
        self.finish(MatchPhase::Faulted);
    }

    // =========================================================================
    // Effects
    // =========================================================================

    /// Register an effect as in flight.
    pub fn begin_effect(&mut self, kind: ObstacleKind) -> EffectId {
        let effect_id = EffectId(self.next_effect_id);
        self.next_effect_id += 1;
        self.active_effects.insert(effect_id, kind);
        info!(effect = %kind, id = %effect_id, "effect triggered");
        self.push_event(GameEvent::new(self.elapsed, GameEventData::EffectStarted { effect_id, kind }));
        effect_id
    }

    /// Retire an effect.
    pub fn finish_effect(&mut self, effect_id: EffectId) {
        if let Some(kind) = self.active_effects.remove(&effect_id) {
            debug!(effect = %kind, id = %effect_id, "effect finished");
            self.push_event(GameEvent::new(self.elapsed, GameEventData::EffectEnded { effect_id, kind }));
        }
    }

    // =========================================================================
    // Events / presentation
    // =========================================================================

    /// Queue an event.
    pub fn push_event(&mut self, event: GameEvent) {
        self.pending_events.push(event);
    }

    /// Drain queued events.
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Read-only copy for presentation.
    pub fn snapshot(&self) -> MatchSnapshot {
        MatchSnapshot::capture(self)
    }
}
