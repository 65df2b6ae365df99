//! Match Session
//!
//! Runs one match end to end: a countdown task ticking once per second, the
//! obstacle scheduler, and the input loop consuming `PlayerCommand`s from a
//! bounded channel. The input loop owns termination; when it ends, the
//! countdown and the scheduler are told to stop.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinError;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::core::hash::StateHash;
use crate::game::board::ShuffleError;
use crate::game::config::{ConfigError, Difficulty, MatchConfig};
use crate::game::events::GameEvent;
use crate::game::input::{PlayerCommand, Selection};
use crate::game::snapshot::MatchSnapshot;
use crate::game::state::{MatchPhase, MatchState, SharedMatch};
use crate::runtime::scheduler::{ObstacleScheduler, SchedulerError};

/// Session errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Match could not be created or restarted.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A shuffle found the board broken; the match was faulted.
    #[error("board invariant violated: {0}")]
    Shuffle(#[from] ShuffleError),

    /// Obstacle scheduler failure.
    #[error("scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// Countdown task failure.
    #[error("task failed: {0}")]
    Task(#[from] JoinError),

    /// `run` called twice.
    #[error("session has already run")]
    AlreadyRan,
}

/// Summary of a finished match.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchReport {
    /// Match identifier
    pub match_id: Uuid,
    /// Difficulty played
    pub difficulty: Difficulty,
    /// Last level reached
    pub level: u8,
    /// Terminal phase
    pub outcome: MatchPhase,
    /// Final score
    pub score: u32,
    /// Seconds played
    pub elapsed_secs: u32,
    /// Countdown left at the end
    pub time_left: u32,
    /// Fingerprint of the final board
    pub board_hash: StateHash,
    /// Generator state at the end of the match
    pub rng_state: [u64; 2],
    /// Wall-clock start
    pub started_at: DateTime<Utc>,
    /// Wall-clock end
    pub ended_at: DateTime<Utc>,
}

impl MatchReport {
    /// Hex board fingerprint, for logs.
    pub fn board_hash_hex(&self) -> String {
        hex::encode(self.board_hash)
    }
}

/// Orchestrates one match.
pub struct MatchSession {
    match_id: Uuid,
    shared: SharedMatch,
    scheduler: ObstacleScheduler,
    obstacles_enabled: bool,
    ran: bool,
}

impl MatchSession {
    /// New match with a random id.
    pub fn new(config: MatchConfig) -> Result<Self, SessionError> {
        Self::with_id(Uuid::new_v4(), config)
    }

    /// New match with a given id (the id seeds the board).
    pub fn with_id(match_id: Uuid, config: MatchConfig) -> Result<Self, SessionError> {
        Ok(Self::from_state(MatchState::new(match_id, config)?))
    }

    /// Session around a prepared state.
    pub fn from_state(state: MatchState) -> Self {
        let match_id = state.match_id;
        let obstacles_enabled = state.config.obstacles_enabled;
        let shared = state.into_shared();
        Self {
            match_id,
            scheduler: ObstacleScheduler::new(shared.clone()),
            shared,
            obstacles_enabled,
            ran: false,
        }
    }

    /// Match identifier.
    pub fn match_id(&self) -> Uuid {
        self.match_id
    }

    /// Shared state handle, for observers.
    pub fn shared(&self) -> SharedMatch {
        self.shared.clone()
    }

    /// Current presentation snapshot.
    pub async fn snapshot(&self) -> MatchSnapshot {
        self.shared.read().await.snapshot()
    }

    /// Take the events queued since the last drain.
    pub async fn drain_events(&self) -> Vec<GameEvent> {
        drain_events(&self.shared).await
    }

    /// Play the match until it ends.
    ///
    /// A cleared board deals the next level until the final one is cleared.
    /// The match also ends on an expired countdown, `Quit`, or a closed
    /// command channel. Effects still in flight keep running; use `settle`
    /// to wait for them.
    #[instrument(skip_all, fields(match_id = %self.match_id))]
    pub async fn run(&mut self, mut commands: mpsc::Receiver<PlayerCommand>) -> Result<MatchReport, SessionError> {
        if self.ran {
            return Err(SessionError::AlreadyRan);
        }
        self.ran = true;

        let started_at = Utc::now();
        let (running_tx, running_rx) = watch::channel(true);
        if self.obstacles_enabled {
            self.scheduler.start()?;
        }
        let mut countdown = tokio::spawn(run_countdown(self.shared.clone(), running_rx));
        let mut countdown_done = false;
        info!("match started");

        let outcome: Result<(), SessionError> = loop {
            tokio::select! {
                done = &mut countdown => {
                    countdown_done = true;
                    break done.map_err(SessionError::from);
                }
                command = commands.recv() => {
                    let over = match command {
                        Some(command) => self.handle_command(command).await,
                        None => {
                            info!("input closed");
                            self.shared.write().await.finish(MatchPhase::Abandoned);
                            Ok(true)
                        }
                    };
                    match over {
                        Ok(false) => {}
                        Ok(true) => break Ok(()),
                        Err(err) => break Err(err),
                    }
                }
            }
        };

        running_tx.send_replace(false);
        self.scheduler.stop();
        if !countdown_done {
            countdown.await?;
        }
        outcome?;

        let state = self.shared.read().await;
        if let Some(err) = state.fault() {
            return Err(SessionError::Shuffle(err.clone()));
        }

        let report = MatchReport {
            match_id: self.match_id,
            difficulty: state.config.difficulty(),
            level: state.config.level,
            outcome: state.phase,
            score: state.score.score(),
            elapsed_secs: state.elapsed,
            time_left: state.time_left,
            board_hash: state.board.compute_hash(),
            rng_state: state.rng.state(),
            started_at,
            ended_at: Utc::now(),
        };
        info!(
            outcome = %report.outcome,
            level = report.level,
            score = report.score,
            elapsed = report.elapsed_secs,
            "match finished"
        );
        Ok(report)
    }

    /// Wait for in-flight effects to restore; returns how many were launched.
    pub async fn settle(&mut self) -> Result<usize, SessionError> {
        Ok(self.scheduler.join().await?)
    }

    /// Apply one command; returns whether the match is over.
    async fn handle_command(&self, command: PlayerCommand) -> Result<bool, SessionError> {
        let mut state = self.shared.write().await;
        match command {
            PlayerCommand::Select(select) => match state.select_tile(select) {
                Ok(Selection::First(id)) => debug!(tile = id.0, "first tile selected"),
                Ok(Selection::Pair(a, b)) => match state.attempt_match(a, b) {
                    Ok(result) if result.matched => debug!(turns = result.turns(), "pair removed"),
                    Ok(_) => debug!(mismatches = state.board.mismatch_count(), "pair rejected"),
                    Err(err) => warn!(%err, "move ended the match"),
                },
                Err(err) => warn!(%err, "selection rejected"),
            },
            PlayerCommand::Hint => {
                if state.hint().is_none() {
                    debug!("no connectable pair");
                }
            }
            PlayerCommand::Restart => state.restart()?,
            PlayerCommand::Quit => {
                info!("player quit");
                state.finish(MatchPhase::Abandoned);
            }
        }
        if state.level_cleared() {
            state.advance_level()?;
        }
        Ok(state.phase.is_over())
    }
}

/// Take the events queued on a shared match.
pub async fn drain_events(shared: &SharedMatch) -> Vec<GameEvent> {
    shared.write().await.take_events()
}

/// One `tick_second` per second until the match ends or `running` drops.
async fn run_countdown(shared: SharedMatch, mut running: watch::Receiver<bool>) {
    let mut ticker = interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = running.wait_for(|running| !*running) => break,
        }
        if shared.write().await.tick_second().is_over() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rng::DeterministicRng;
    use crate::game::board::{Board, Gravity};
    use crate::game::events::GameEventData;
    use crate::game::input::SelectTile;
    use crate::game::tile::{AnimalId, Tile};

    fn quiet_config() -> MatchConfig {
        let mut config = MatchConfig::default();
        config.obstacles_enabled = false;
        config
    }

    fn session_with(cols: usize, rows: usize, ids: &[u16], config: MatchConfig) -> MatchSession {
        let kinds: Vec<AnimalId> = ids.iter().map(|id| AnimalId(*id)).collect();
        let board = Board::from_layout(cols, rows, config.difficulty(), &kinds).unwrap();
        MatchSession::from_state(MatchState::from_board(Uuid::nil(), config, board, DeterministicRng::new(8)))
    }

    fn select(x: i32, y: i32) -> PlayerCommand {
        PlayerCommand::Select(SelectTile::new(x, y))
    }

    #[tokio::test(start_paused = true)]
    async fn test_clearing_the_board_wins() {
        let mut session = session_with(4, 1, &[1, 1, 2, 2], quiet_config().with_final_level(1));
        let (tx, rx) = mpsc::channel(8);
        for command in [select(0, 0), select(1, 0), select(2, 0), select(3, 0)] {
            tx.send(command).await.unwrap();
        }

        let report = session.run(rx).await.unwrap();
        assert_eq!(report.outcome, MatchPhase::Won);
        assert_eq!(report.score, 37);
        assert_eq!(report.time_left, 240 + 12);
        assert_eq!(report.board_hash_hex().len(), 64);
        assert_eq!(report.rng_state, session.shared().read().await.rng.state());
        assert!(report.ended_at >= report.started_at);
        drop(tx);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleared_board_advances_level() {
        let mut session = session_with(2, 1, &[1, 1], quiet_config());
        let shared = session.shared();
        let (tx, rx) = mpsc::channel(8);
        let run = tokio::spawn(async move {
            let report = session.run(rx).await;
            (session, report)
        });

        // Level 1: clearing the only pair deals a full level 2 board
        tx.send(select(0, 0)).await.unwrap();
        tx.send(select(1, 0)).await.unwrap();
        while shared.read().await.config.level < 2 {
            tokio::task::yield_now().await;
        }
        let events = drain_events(&shared).await;
        assert!(events.iter().any(|e| e.data == GameEventData::LevelCleared { level: 1 }));
        assert!(events.iter().any(|e| e.data == GameEventData::LevelStarted { level: 2 }));

        // Level 2 adds upward gravity after a match
        let (pa, pb) = {
            let mut state = shared.write().await;
            assert_eq!(state.phase, MatchPhase::Running);
            assert_eq!(state.board.visible_count(), 144);
            let (a, b) = state.hint().unwrap();
            (state.board.tile(a).unwrap().position(), state.board.tile(b).unwrap().position())
        };
        tx.send(PlayerCommand::Select(pa.into())).await.unwrap();
        tx.send(PlayerCommand::Select(pb.into())).await.unwrap();
        tx.send(PlayerCommand::Quit).await.unwrap();

        let (session, report) = run.await.unwrap();
        let report = report.unwrap();
        assert_eq!(report.level, 2);
        assert_eq!(report.outcome, MatchPhase::Abandoned);
        let events = session.drain_events().await;
        assert!(events.iter().any(|e| e.data == GameEventData::BoardSettled { gravity: Gravity::Up }));
        assert!(events.last().is_some_and(GameEvent::is_terminal));
        assert!(session.drain_events().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_times_out() {
        let mut config = quiet_config();
        config.rules.base_time_secs = 5;
        let mut session = session_with(4, 1, &[1, 2, 2, 1], config);
        let (_tx, rx) = mpsc::channel(8);

        let report = session.run(rx).await.unwrap();
        assert_eq!(report.outcome, MatchPhase::TimedOut);
        assert_eq!(report.elapsed_secs, 5);
        assert_eq!(report.time_left, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quit_and_closed_input_abandon() {
        let mut session = session_with(2, 1, &[1, 1], quiet_config());
        let (tx, rx) = mpsc::channel(8);
        tx.send(PlayerCommand::Quit).await.unwrap();
        assert_eq!(session.run(rx).await.unwrap().outcome, MatchPhase::Abandoned);
        assert!(matches!(session.run(mpsc::channel(1).1).await, Err(SessionError::AlreadyRan)));

        let mut session = session_with(2, 1, &[1, 1], quiet_config());
        let (tx, rx) = mpsc::channel(8);
        drop(tx);
        assert_eq!(session.run(rx).await.unwrap().outcome, MatchPhase::Abandoned);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_selections_are_ignored() {
        let mut session = session_with(2, 1, &[1, 1], quiet_config());
        let (tx, rx) = mpsc::channel(8);
        for command in [select(-1, 0), select(5, 5), select(0, 0), select(0, 0), PlayerCommand::Hint, PlayerCommand::Quit] {
            tx.send(command).await.unwrap();
        }

        let report = session.run(rx).await.unwrap();
        assert_eq!(report.score, 0);
        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.mismatch_count, 0);
        assert_eq!(snapshot.visible_count(), 2);
        assert_eq!(snapshot.combo, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_command_resets() {
        let mut session = MatchSession::with_id(Uuid::from_u128(5), quiet_config()).unwrap();
        let (tx, rx) = mpsc::channel(8);
        let shared = session.shared();
        let (a, b) = shared.write().await.hint().unwrap();
        let (pa, pb) = {
            let state = shared.read().await;
            (state.board.tile(a).unwrap().position(), state.board.tile(b).unwrap().position())
        };
        tx.send(PlayerCommand::Select(pa.into())).await.unwrap();
        tx.send(PlayerCommand::Select(pb.into())).await.unwrap();
        tx.send(PlayerCommand::Restart).await.unwrap();
        tx.send(PlayerCommand::Quit).await.unwrap();

        let report = session.run(rx).await.unwrap();
        assert_eq!(report.score, 0);
        assert_eq!(report.outcome, MatchPhase::Abandoned);
        assert_eq!(session.snapshot().await.visible_count(), 144);
    }

    #[tokio::test(start_paused = true)]
    async fn test_obstacles_settle_after_timeout() {
        let mut config = MatchConfig::new(Difficulty::Lunatic);
        config.rules.base_time_secs = 90;
        let mut session = MatchSession::with_id(Uuid::from_u128(77), config).unwrap();
        let (_tx, rx) = mpsc::channel(8);

        let report = session.run(rx).await.unwrap();
        assert_eq!(report.outcome, MatchPhase::TimedOut);
        assert!(report.elapsed_secs >= 90);

        let launched = session.settle().await.unwrap();
        assert!(launched > 0);
        let snapshot = session.snapshot().await;
        assert!(snapshot.active_effects.is_empty());
        assert!(snapshot.tiles.iter().all(|t: &Tile| t.visible && !t.locked && !t.bombed && !t.golden && !t.acidified));
    }
}
