//! Difficulty Tables and Match Configuration
//!
//! Every per-difficulty number the rules use is a closed lookup table here.
//! A `DifficultyConfig` is the input table handed to a match at start;
//! it can be built from the tables or parsed from JSON.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::game::obstacle::ObstacleKind;
use crate::game::tile::AnimalId;

/// Largest board the path search is sized for.
pub const MAX_BOARD_COLS: usize = 16;
/// Row counterpart of `MAX_BOARD_COLS`.
pub const MAX_BOARD_ROWS: usize = 12;

/// Seconds between automatic hints.
pub const DEFAULT_HINT_INTERVAL_SECS: u32 = 25;

/// Capacity of the player command channel.
pub const DEFAULT_COMMAND_BUFFER: usize = 32;

/// Highest level; levels 2 and up add gravity.
pub const LEVEL_MAX: u8 = 5;

/// Longest base delay an effect table may ask for, in seconds.
pub const MAX_EFFECT_DELAY_SECS: f64 = 600.0;

// =============================================================================
// DIFFICULTY
// =============================================================================

/// Game difficulty.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Difficulty {
    /// 16x9 board, 240 seconds
    #[default]
    Normal = 0,
    /// 16x9 board, 300 seconds, faster obstacles
    Advanced = 1,
    /// 16x12 board, 360 seconds, full scatter shuffles
    Lunatic = 2,
}

impl Difficulty {
    /// All difficulties in ascending order.
    pub const ALL: [Difficulty; 3] = [Difficulty::Normal, Difficulty::Advanced, Difficulty::Lunatic];

    /// Board dimensions as (cols, rows).
    pub fn board_size(self) -> (usize, usize) {
        match self {
            Difficulty::Normal => (16, 9),
            Difficulty::Advanced => (16, 9),
            Difficulty::Lunatic => (16, 12),
        }
    }

    /// Countdown seconds at match start.
    pub fn base_time_secs(self) -> u32 {
        match self {
            Difficulty::Normal => 240,
            Difficulty::Advanced => 300,
            Difficulty::Lunatic => 360,
        }
    }

    /// Failed attempts tolerated before a forced shuffle.
    pub fn mismatch_limit(self) -> u32 {
        match self {
            Difficulty::Normal => 3,
            Difficulty::Advanced => 3,
            Difficulty::Lunatic => 2,
        }
    }

    /// Number of distinct animals in the default pool.
    pub fn animal_variety(self) -> u16 {
        match self {
            Difficulty::Normal => 16,
            Difficulty::Advanced => 21,
            Difficulty::Lunatic => 24,
        }
    }

    /// Default animal pool: ids `1..=variety`.
    pub fn default_animal_pool(self) -> Vec<AnimalId> {
        (1..=self.animal_variety()).map(AnimalId).collect()
    }

    /// Display name.
    pub fn name(self) -> &'static str {
        match self {
            Difficulty::Normal => "Normal",
            Difficulty::Advanced => "Advanced",
            Difficulty::Lunatic => "Lunatic",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Difficulty {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(Difficulty::Normal),
            "advanced" => Ok(Difficulty::Advanced),
            "lunatic" => Ok(Difficulty::Lunatic),
            _ => Err(ConfigError::UnknownDifficulty(s.to_string())),
        }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Configuration rejected before a board is created.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Board would have an odd number of cells.
    #[error("board {cols}x{rows} has an odd number of tiles")]
    OddTileCount {
        /// Columns requested
        cols: usize,
        /// Rows requested
        rows: usize,
    },

    /// Board would have no cells.
    #[error("board {cols}x{rows} has no tiles")]
    EmptyBoard {
        /// Columns requested
        cols: usize,
        /// Rows requested
        rows: usize,
    },

    /// Board larger than the supported maximum.
    #[error("board {cols}x{rows} exceeds {MAX_BOARD_COLS}x{MAX_BOARD_ROWS}")]
    BoardTooLarge {
        /// Columns requested
        cols: usize,
        /// Rows requested
        rows: usize,
    },

    /// No animals to draw tiles from.
    #[error("animal pool is empty")]
    EmptyAnimalPool,

    /// Unrecognised difficulty name.
    #[error("unknown difficulty: {0}")]
    UnknownDifficulty(String),

    /// Layout length does not match the board size.
    #[error("layout has {actual} tiles, expected {expected}")]
    LayoutMismatch {
        /// cols * rows
        expected: usize,
        /// Tiles supplied
        actual: usize,
    },

    /// Effect delay outside `(0, MAX_EFFECT_DELAY_SECS]`.
    #[error("invalid delay {delay} for {kind:?}")]
    InvalidEffectDelay {
        /// Offending effect
        kind: ObstacleKind,
        /// Offending value
        delay: f64,
    },

    /// Malformed JSON configuration.
    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// DIFFICULTY CONFIG
// =============================================================================

/// Per-match rule table, supplied at match start.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DifficultyConfig {
    /// Which difficulty's effect intensities apply
    pub difficulty: Difficulty,
    /// Board columns
    pub board_cols: usize,
    /// Board rows
    pub board_rows: usize,
    /// Countdown seconds at start
    pub base_time_secs: u32,
    /// Failed attempts before a forced shuffle
    pub mismatch_limit: u32,
    /// Animals tiles are drawn from (with replacement)
    pub animal_pool: Vec<AnimalId>,
    /// Base scheduling delay per effect, seconds. Missing entries use the table.
    #[serde(default)]
    pub effect_delays: BTreeMap<ObstacleKind, f64>,
}

impl DifficultyConfig {
    /// Build the closed-table configuration for a difficulty.
    pub fn for_difficulty(difficulty: Difficulty) -> Self {
        let (board_cols, board_rows) = difficulty.board_size();
        let effect_delays = ObstacleKind::ALL
            .iter()
            .map(|kind| (*kind, kind.base_delay_secs(difficulty)))
            .collect();

        Self {
            difficulty,
            board_cols,
            board_rows,
            base_time_secs: difficulty.base_time_secs(),
            mismatch_limit: difficulty.mismatch_limit(),
            animal_pool: difficulty.default_animal_pool(),
            effect_delays,
        }
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Base delay for an effect, falling back to the difficulty table.
    pub fn effect_delay_secs(&self, kind: ObstacleKind) -> f64 {
        self.effect_delays
            .get(&kind)
            .copied()
            .unwrap_or_else(|| kind.base_delay_secs(self.difficulty))
    }

    /// Check every constraint a board build depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_dimensions(self.board_cols, self.board_rows)?;

        if self.animal_pool.is_empty() {
            return Err(ConfigError::EmptyAnimalPool);
        }

        for (kind, delay) in &self.effect_delays {
            if !(*delay > 0.0 && *delay <= MAX_EFFECT_DELAY_SECS) {
                return Err(ConfigError::InvalidEffectDelay { kind: *kind, delay: *delay });
            }
        }

        Ok(())
    }
}

impl Default for DifficultyConfig {
    fn default() -> Self {
        Self::for_difficulty(Difficulty::Normal)
    }
}

/// Reject empty, odd or oversized boards.
pub fn validate_dimensions(cols: usize, rows: usize) -> Result<(), ConfigError> {
    let total = cols * rows;
    if total == 0 {
        return Err(ConfigError::EmptyBoard { cols, rows });
    }
    if total % 2 != 0 {
        return Err(ConfigError::OddTileCount { cols, rows });
    }
    if cols > MAX_BOARD_COLS || rows > MAX_BOARD_ROWS {
        return Err(ConfigError::BoardTooLarge { cols, rows });
    }
    Ok(())
}

// =============================================================================
// MATCH CONFIG
// =============================================================================

/// Configuration for one match.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Difficulty rule table
    pub rules: DifficultyConfig,
    /// Current level, 1 to `final_level`; levels 2-5 add gravity after each match
    pub level: u8,
    /// Clearing this level wins the match
    pub final_level: u8,
    /// Seconds between automatic hints (0 disables)
    pub hint_interval_secs: u32,
    /// Player command channel capacity
    pub command_buffer: usize,
    /// Whether the obstacle scheduler runs
    pub obstacles_enabled: bool,
}

impl MatchConfig {
    /// Table defaults for a difficulty, level 1.
    pub fn new(difficulty: Difficulty) -> Self {
        Self {
            rules: DifficultyConfig::for_difficulty(difficulty),
            level: 1,
            final_level: LEVEL_MAX,
            hint_interval_secs: DEFAULT_HINT_INTERVAL_SECS,
            command_buffer: DEFAULT_COMMAND_BUFFER,
            obstacles_enabled: true,
        }
    }

    /// Same configuration at another level.
    pub fn with_level(mut self, level: u8) -> Self {
        self.level = level;
        self
    }

    /// Same configuration ending at another level.
    pub fn with_final_level(mut self, final_level: u8) -> Self {
        self.final_level = final_level;
        self
    }

    /// Whether clearing the current board ends the match.
    pub fn on_final_level(&self) -> bool {
        self.level >= self.final_level
    }

    /// Difficulty shortcut.
    pub fn difficulty(&self) -> Difficulty {
        self.rules.difficulty
    }
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self::new(Difficulty::Normal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_difficulty_tables() {
        assert_eq!(Difficulty::Normal.board_size(), (16, 9));
        assert_eq!(Difficulty::Lunatic.board_size(), (16, 12));
        assert_eq!(Difficulty::Advanced.base_time_secs(), 300);
        assert_eq!(Difficulty::Lunatic.mismatch_limit(), 2);
        assert_eq!(Difficulty::default(), Difficulty::Normal);
    }

    #[test]
    fn test_difficulty_parse() {
        assert_eq!("lunatic".parse::<Difficulty>().unwrap(), Difficulty::Lunatic);
        assert_eq!(" Advanced ".parse::<Difficulty>().unwrap(), Difficulty::Advanced);
        assert!(matches!(
            "extreme".parse::<Difficulty>(),
            Err(ConfigError::UnknownDifficulty(_))
        ));
    }

    #[test]
    fn test_table_configs_validate() {
        for difficulty in Difficulty::ALL {
            let config = DifficultyConfig::for_difficulty(difficulty);
            config.validate().unwrap();
            assert_eq!(config.effect_delays.len(), ObstacleKind::ALL.len());
        }
    }

    #[test]
    fn test_dimension_errors() {
        assert!(matches!(validate_dimensions(3, 3), Err(ConfigError::OddTileCount { .. })));
        assert!(matches!(validate_dimensions(0, 4), Err(ConfigError::EmptyBoard { .. })));
        assert!(matches!(validate_dimensions(18, 2), Err(ConfigError::BoardTooLarge { .. })));
        assert!(validate_dimensions(4, 3).is_ok());
    }

    #[test]
    fn test_json_round_trip_and_fallback() {
        let mut config = DifficultyConfig::for_difficulty(Difficulty::Advanced);
        config.effect_delays.remove(&ObstacleKind::Tornado);
        let json = serde_json::to_string(&config).unwrap();

        let parsed = DifficultyConfig::from_json(&json).unwrap();
        assert_eq!(parsed, config);
        assert_eq!(parsed.effect_delay_secs(ObstacleKind::Tornado), 10.0);
    }

    #[test]
    fn test_json_rejects_bad_values() {
        let mut config = DifficultyConfig::default();
        config.animal_pool.clear();
        let json = serde_json::to_string(&config).unwrap();
        assert!(matches!(DifficultyConfig::from_json(&json), Err(ConfigError::EmptyAnimalPool)));

        let mut config = DifficultyConfig::default();
        config.effect_delays.insert(ObstacleKind::AcidRain, -1.0);
        let json = serde_json::to_string(&config).unwrap();
        assert!(matches!(
            DifficultyConfig::from_json(&json),
            Err(ConfigError::InvalidEffectDelay { kind: ObstacleKind::AcidRain, .. })
        ));

        assert!(matches!(DifficultyConfig::from_json("{"), Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_json_rejects_unbounded_delay() {
        let mut config = DifficultyConfig::default();
        config.effect_delays.insert(ObstacleKind::Tornado, 1e30);
        let json = serde_json::to_string(&config).unwrap();
        assert!(matches!(
            DifficultyConfig::from_json(&json),
            Err(ConfigError::InvalidEffectDelay { kind: ObstacleKind::Tornado, .. })
        ));

        config.effect_delays.insert(ObstacleKind::Tornado, MAX_EFFECT_DELAY_SECS);
        let json = serde_json::to_string(&config).unwrap();
        assert!(DifficultyConfig::from_json(&json).is_ok());
    }

    #[test]
    fn test_levels() {
        let config = MatchConfig::default();
        assert_eq!((config.level, config.final_level), (1, LEVEL_MAX));
        assert_eq!(config.command_buffer, DEFAULT_COMMAND_BUFFER);
        assert!(!config.on_final_level());
        assert!(config.clone().with_level(LEVEL_MAX).on_final_level());
        assert!(config.with_final_level(1).on_final_level());
    }
}
