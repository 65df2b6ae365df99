//! Async Runtime
//!
//! The tokio side of a match: the obstacle scheduler and the session that
//! drives countdown, input and termination. Non-deterministic timing lives
//! here; every rule it applies comes from `game/`.

pub mod scheduler;
pub mod session;

pub use scheduler::{ObstacleScheduler, SchedulerError, SchedulerState, run_effect};
pub use session::{MatchReport, MatchSession, SessionError};
