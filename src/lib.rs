//! # Matching Animals
//!
//! Tile-matching connection puzzle engine: pairs of identical tiles are removed
//! when a path with at most two turns joins them, while timed obstacle effects
//! keep disturbing the board.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    MATCHING ANIMALS                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── rng.rs      - Deterministic Xorshift128+ PRNG           │
//! │  └── hash.rs     - Board fingerprints                        │
//! │                                                              │
//! │  game/           - Rules (synchronous)                       │
//! │  ├── config.rs   - Difficulty tables, match config           │
//! │  ├── tile.rs     - Tiles and effect flags                    │
//! │  ├── board.rs    - Generation, shuffles, gravity             │
//! │  ├── path.rs     - Two-turn path search, hints               │
//! │  ├── score.rs    - Combo, score, time bonus                  │
//! │  ├── obstacle.rs - Effect tables, start/restore steps        │
//! │  ├── state.rs    - Shared match state                        │
//! │  └── snapshot.rs - Read-only presentation view               │
//! │                                                              │
//! │  runtime/        - Async (tokio)                             │
//! │  ├── scheduler.rs- Obstacle control loop and effect tasks    │
//! │  └── session.rs  - Countdown, input loop, termination        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism
//!
//! The `core/` and `game/` modules take every random choice from the match's
//! seeded Xorshift128+ and iterate with BTreeMap. Given the same seed and the
//! same sequence of calls, a board evolves identically. Only the interleaving
//! of runtime tasks depends on wall-clock timing.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod runtime;

// Re-export commonly used types
pub use core::rng::DeterministicRng;
pub use game::board::Board;
pub use game::config::{Difficulty, DifficultyConfig, MatchConfig};
pub use game::input::{PlayerCommand, SelectTile};
pub use game::score::ScoreTracker;
pub use game::state::{MatchPhase, MatchState};
pub use runtime::{MatchReport, MatchSession, ObstacleScheduler};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
