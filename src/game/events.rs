//! Game Events
//!
//! Events generated during a match, drained by the presentation layer and
//! written to the log.

use serde::{Serialize, Deserialize};

use crate::game::board::{Gravity, ShuffleMode};
use crate::game::obstacle::ObstacleKind;
use crate::game::state::{EffectId, MatchPhase};
use crate::game::tile::Position;

/// Why the board was shuffled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShuffleReason {
    /// No connectable pair left
    NoMoves,
    /// Too many failed attempts
    MismatchLimit,
    /// Tornado effect
    Tornado,
    /// Forced-shuffle effect
    ForcedShuffle,
}

/// Game event data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GameEventData {
    /// Pair removed
    TilesMatched {
        first: Position,
        second: Position,
        points: u32,
        combo: u32,
        time_bonus: u32,
    },

    /// Attempt failed
    Mismatch {
        mismatch_count: u32,
    },

    /// Board rearranged
    BoardShuffled {
        mode: ShuffleMode,
        reason: ShuffleReason,
    },

    /// Level gravity compacted the board
    BoardSettled {
        gravity: Gravity,
    },

    /// Obstacle effect began
    EffectStarted {
        effect_id: EffectId,
        kind: ObstacleKind,
    },

    /// Obstacle effect finished and restored its tiles
    EffectEnded {
        effect_id: EffectId,
        kind: ObstacleKind,
    },

    /// Golden fish added time
    GoldenFishBonus {
        seconds: u32,
    },

    /// A connectable pair exists here
    HintAvailable {
        first: Position,
        second: Position,
    },

    /// Board regenerated and score reset
    Restarted,

    /// Board cleared below the final level
    LevelCleared {
        level: u8,
    },

    /// Fresh board dealt for the next level
    LevelStarted {
        level: u8,
    },

    /// Match reached a terminal phase
    MatchEnded {
        phase: MatchPhase,
        score: u32,
        elapsed_secs: u32,
    },
}

/// A game event with the countdown second it happened at.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Seconds elapsed since match start
    pub second: u32,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(second: u32, data: GameEventData) -> Self {
        Self { second, data }
    }

    /// Create tiles matched event.
    pub fn tiles_matched(second: u32, first: Position, second_tile: Position, points: u32, combo: u32, time_bonus: u32) -> Self {
        Self::new(
            second,
            GameEventData::TilesMatched {
                first,
                second: second_tile,
                points,
                combo,
                time_bonus,
            },
        )
    }

    /// Create mismatch event.
    pub fn mismatch(second: u32, mismatch_count: u32) -> Self {
        Self::new(second, GameEventData::Mismatch { mismatch_count })
    }

    /// Create board shuffled event.
    pub fn board_shuffled(second: u32, mode: ShuffleMode, reason: ShuffleReason) -> Self {
        Self::new(second, GameEventData::BoardShuffled { mode, reason })
    }

    /// Create golden fish bonus event.
    pub fn golden_fish_bonus(second: u32, seconds: u32) -> Self {
        Self::new(second, GameEventData::GoldenFishBonus { seconds })
    }

    /// Create match ended event.
    pub fn match_ended(second: u32, phase: MatchPhase, score: u32) -> Self {
        Self::new(
            second,
            GameEventData::MatchEnded {
                phase,
                score,
                elapsed_secs: second,
            },
        )
    }

    /// Is this the terminal event?
    pub fn is_terminal(&self) -> bool {
        matches!(self.data, GameEventData::MatchEnded { .. })
    }
}
