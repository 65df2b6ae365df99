//! Obstacle Scheduler
//!
//! Keeps perturbing the board while a match runs. A control loop picks a
//! random effect, sleeps its jittered delay and launches it as its own task
//! without waiting for it. Effects sleep between their start and restore
//! steps with the match lock released.
//!
//! `stop` flips a watch flag the control loop selects on, so the loop exits
//! at its current sleep. Effects already launched always run their restore.

use std::fmt;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use crate::game::obstacle::{self, Disturbance, ObstacleKind};
use crate::game::state::SharedMatch;

/// Scheduler lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    /// Not started yet
    Idle,
    /// Control loop launching effects
    Running,
    /// No further launches
    Stopped,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SchedulerState::Idle => "idle",
            SchedulerState::Running => "running",
            SchedulerState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Scheduler errors.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// `start` called twice, or after `stop`.
    #[error("scheduler is {0}, expected idle")]
    NotIdle(SchedulerState),

    /// Control loop panicked.
    #[error("scheduler task failed: {0}")]
    Task(#[from] JoinError),
}

/// Launches obstacle effects against a shared match.
pub struct ObstacleScheduler {
    shared: SharedMatch,
    state: SchedulerState,
    running_tx: watch::Sender<bool>,
    control: Option<JoinHandle<usize>>,
}

impl ObstacleScheduler {
    /// Create an idle scheduler.
    pub fn new(shared: SharedMatch) -> Self {
        let (running_tx, _) = watch::channel(false);
        Self {
            shared,
            state: SchedulerState::Idle,
            running_tx,
            control: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Spawn the control loop.
    pub fn start(&mut self) -> Result<(), SchedulerError> {
        if self.state != SchedulerState::Idle {
            return Err(SchedulerError::NotIdle(self.state));
        }
        self.running_tx.send_replace(true);
        let running = self.running_tx.subscribe();
        self.control = Some(tokio::spawn(control_loop(self.shared.clone(), running)));
        self.state = SchedulerState::Running;
        info!("obstacle scheduler started");
        Ok(())
    }

    /// Stop launching effects. In-flight effects keep running.
    pub fn stop(&mut self) {
        if self.state == SchedulerState::Stopped {
            return;
        }
        self.running_tx.send_replace(false);
        self.state = SchedulerState::Stopped;
        info!("obstacle scheduler stopped");
    }

    /// Wait for the control loop and every effect it launched.
    ///
    /// Returns how many effects were launched.
    pub async fn join(&mut self) -> Result<usize, SchedulerError> {
        match self.control.take() {
            Some(handle) => Ok(handle.await?),
            None => Ok(0),
        }
    }
}

#[instrument(skip_all)]
async fn control_loop(shared: SharedMatch, mut running: watch::Receiver<bool>) -> usize {
    let mut effects = JoinSet::new();
    let mut launched = 0;

    loop {
        let (kind, delay) = {
            let mut state = shared.write().await;
            if state.phase.is_over() {
                break;
            }
            let Some(kind) = state.rng.choose(&ObstacleKind::ALL).copied() else {
                break;
            };
            let base = state.config.rules.effect_delay_secs(kind);
            (kind, obstacle::jittered_delay(base, &mut state.rng))
        };
        debug!(effect = %kind, delay_secs = delay.as_secs_f64(), "effect scheduled");

        tokio::select! {
            _ = sleep(delay) => {}
            _ = running.wait_for(|running| !*running) => break,
        }
        let stopped = !*running.borrow();
        if stopped || shared.read().await.phase.is_over() {
            break;
        }

        effects.spawn(run_effect(shared.clone(), kind));
        launched += 1;
        while let Some(done) = effects.try_join_next() {
            report(done);
        }
    }

    debug!(in_flight = effects.len(), "control loop exiting");
    while let Some(done) = effects.join_next().await {
        report(done);
    }
    launched
}

fn report(done: Result<(), JoinError>) {
    if let Err(err) = done {
        warn!(%err, "effect task failed");
    }
}

/// Run one effect from start to restore.
///
/// Nothing starts once the match is over, but a started effect always
/// restores the tiles it flagged.
#[instrument(skip(shared))]
pub async fn run_effect(shared: SharedMatch, kind: ObstacleKind) {
    let effect_id = {
        let mut state = shared.write().await;
        if state.phase.is_over() {
            return;
        }
        state.begin_effect(kind)
    };

    match kind {
        ObstacleKind::Tornado => {
            let mut state = shared.write().await;
            if let Err(err) = obstacle::tornado(&mut state) {
                state.record_fault(err);
            }
        }
        ObstacleKind::ForcedShuffle => {
            let mut state = shared.write().await;
            match obstacle::forced_shuffle(&mut state) {
                Ok(ran) => debug!(ran, "forced shuffle checked"),
                Err(err) => state.record_fault(err),
            }
        }
        ObstacleKind::TimeBomb => {
            let bombs = {
                let mut state = shared.write().await;
                let difficulty = state.config.difficulty();
                obstacle::bomb_count(difficulty, &mut state.rng)
            };
            // One bomb at a time, each with its own fuse
            for _ in 0..bombs {
                let planted = {
                    let mut state = shared.write().await;
                    if state.phase.is_over() {
                        None
                    } else {
                        obstacle::plant_bomb(&mut state)
                    }
                };
                let Some(disturbance) = planted else { break };
                hold_then_restore(&shared, disturbance).await;
            }
        }
        ObstacleKind::TileLocking | ObstacleKind::GoldenFish | ObstacleKind::AcidRain => {
            let started = {
                let mut state = shared.write().await;
                match kind {
                    ObstacleKind::TileLocking => obstacle::lock_tiles(&mut state),
                    ObstacleKind::GoldenFish => obstacle::release_golden_fish(&mut state),
                    _ => obstacle::acid_rain(&mut state),
                }
            };
            if let Some(disturbance) = started {
                hold_then_restore(&shared, disturbance).await;
            }
        }
    }

    shared.write().await.finish_effect(effect_id);
}

async fn hold_then_restore(shared: &SharedMatch, disturbance: Disturbance) {
    sleep(disturbance.hold).await;
    obstacle::restore(&mut *shared.write().await, &disturbance);
}
