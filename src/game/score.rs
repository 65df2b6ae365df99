//! Score Tracking
//!
//! Combo, score and time-bonus bookkeeping. Has no board access; the match
//! feeds it one `register_move` per attempt.

use serde::{Serialize, Deserialize};

/// Points for a match below combo 3.
pub const BASE_POINTS: u32 = 15;

/// Combo ceiling.
pub const MAX_COMBO: u32 = 10;

/// Seconds granted per match at combo 3, 4, 5, 6, 7 and 8+.
pub const TIME_BONUS_TABLE: [u32; 6] = [12, 15, 17, 20, 25, 30];

/// Combo/score/time-bonus state for one match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreTracker {
    /// Total points
    score: u32,
    /// Consecutive successful matches, starting at 1
    combo: u32,
    /// Seconds granted by combos so far
    time_added: u32,
}

impl ScoreTracker {
    /// Fresh tracker: score 0, combo 1.
    pub fn new() -> Self {
        Self {
            score: 0,
            combo: 1,
            time_added: 0,
        }
    }

    /// Advance the combo on a match, drop it back to 1 on a miss.
    pub fn register_move(&mut self, matched: bool) {
        self.combo = if matched {
            (self.combo + 1).min(MAX_COMBO)
        } else {
            1
        };
    }

    /// Award points for the current combo; returns the points added.
    ///
    /// `15 * (1 + 0.5 * (combo - 2))` floored, which is `15 * combo / 2` in
    /// integers.
    pub fn add_score(&mut self) -> u32 {
        let points = if self.combo >= 3 {
            BASE_POINTS * self.combo / 2
        } else {
            BASE_POINTS
        };
        self.score += points;
        points
    }

    /// Grant the combo's time bonus; returns the seconds added by this call.
    pub fn apply_time_bonus(&mut self) -> u32 {
        if self.combo < 3 {
            return 0;
        }
        let idx = ((self.combo - 3) as usize).min(TIME_BONUS_TABLE.len() - 1);
        let bonus = TIME_BONUS_TABLE[idx];
        self.time_added += bonus;
        bonus
    }

    /// Back to a fresh tracker.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Current score multiplier.
    pub fn multiplier(&self) -> f64 {
        if self.combo >= 3 {
            1.0 + 0.5 * f64::from(self.combo - 2)
        } else {
            1.0
        }
    }

    /// Total points.
    pub fn score(&self) -> u32 {
        self.score
    }

    /// Current combo.
    pub fn combo(&self) -> u32 {
        self.combo
    }

    /// Seconds granted so far.
    pub fn time_added(&self) -> u32 {
        self.time_added
    }
}

impl Default for ScoreTracker {
    fn default() -> Self {
        Self::new()
    }
}
