//! Game Logic Module
//!
//! All rules code. Synchronous and deterministic given the match RNG.
//!
//! ## Module Structure
//!
//! - `config`: Difficulty tables and match configuration
//! - `tile`: Tiles, ids and effect flags
//! - `board`: Grid generation, removal, shuffles and gravity
//! - `path`: Two-turn connecting paths, pair discovery, hints
//! - `score`: Combo, score and time bonus
//! - `obstacle`: Obstacle tables and effect start/restore steps
//! - `input`: Player commands and selection errors
//! - `state`: The shared match state
//! - `snapshot`: Read-only view for presentation
//! - `events`: Game events for presentation and logs

pub mod config;
pub mod tile;
pub mod board;
pub mod path;
pub mod score;
pub mod obstacle;
pub mod input;
pub mod state;
pub mod snapshot;
pub mod events;

// Re-export key types
pub use config::{ConfigError, Difficulty, DifficultyConfig, MatchConfig};
pub use tile::{AnimalId, Position, Tile, TileFlag, TileId};
pub use board::{Board, Gravity, ShuffleError, ShuffleMode};
pub use path::{MatchResult, hint, is_connectable, mismatch_limit_reached, possible_matches};
pub use score::ScoreTracker;
pub use obstacle::ObstacleKind;
pub use input::{PlayerCommand, SelectTile, Selection, SelectionError};
pub use state::{MatchPhase, MatchState, SharedMatch};
pub use snapshot::MatchSnapshot;
pub use events::GameEvent;
