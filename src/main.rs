//! Matching Animals
//!
//! Runs one timed match with a bot that plays hinted pairs, and logs the
//! result.
//!
//! Usage: `matching-animals [normal|advanced|lunatic] [rules.json]`

use std::time::Duration;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use matching_animals::{
    VERSION,
    game::{
        config::{Difficulty, DifficultyConfig, MatchConfig},
        events::GameEvent,
        input::{PlayerCommand, SelectTile},
        path,
        state::SharedMatch,
    },
    runtime::{MatchSession, session::drain_events},
};

/// Pause between bot moves.
const BOT_THINK_TIME: Duration = Duration::from_millis(1500);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    info!("Matching Animals v{}", VERSION);

    let mut args = std::env::args().skip(1);
    let difficulty: Difficulty = match args.next() {
        Some(name) => name.parse()?,
        None => Difficulty::default(),
    };

    let mut config = MatchConfig::new(difficulty);
    if let Some(path) = args.next() {
        let json = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
        config.rules = DifficultyConfig::from_json(&json).with_context(|| format!("parsing {path}"))?;
    }

    let (cols, rows) = (config.rules.board_cols, config.rules.board_rows);
    info!("Difficulty: {} ({}x{}, {} s)", config.difficulty(), cols, rows, config.rules.base_time_secs);

    let (tx, rx) = mpsc::channel(config.command_buffer);
    let mut session = MatchSession::new(config)?;
    info!("Match ID: {}", session.match_id());

    let bot = tokio::spawn(run_bot(session.shared(), tx));

    let report = session.run(rx).await?;
    bot.abort();
    log_events(session.drain_events().await);

    info!("=== Match Results ===");
    info!("Outcome: {} (level {})", report.outcome, report.level);
    info!("Score: {}", report.score);
    info!("Played: {} s ({} s left)", report.elapsed_secs, report.time_left);
    info!("Final Board Hash: {}", report.board_hash_hex());
    info!("Wall clock: {} -> {}", report.started_at.to_rfc3339(), report.ended_at.to_rfc3339());

    let launched = session.settle().await?;
    log_events(session.drain_events().await);
    info!("Obstacle effects launched: {}", launched);
    Ok(())
}

fn log_events(events: Vec<GameEvent>) {
    for event in events {
        info!(second = event.second, event = ?event.data, "game event");
    }
}

/// Plays the first connectable pair every `BOT_THINK_TIME`; asks for a hint
/// when nothing connects.
async fn run_bot(shared: SharedMatch, tx: mpsc::Sender<PlayerCommand>) {
    loop {
        tokio::time::sleep(BOT_THINK_TIME).await;
        log_events(drain_events(&shared).await);

        let pair = {
            let state = shared.read().await;
            if state.phase.is_over() {
                return;
            }
            path::hint(&state.board).and_then(|(a, b)| {
                let first = state.board.tile(a)?.position();
                let second = state.board.tile(b)?.position();
                Some((first, second))
            })
        };

        let commands: Vec<PlayerCommand> = match pair {
            Some((first, second)) => vec![
                PlayerCommand::Select(SelectTile::from(first)),
                PlayerCommand::Select(SelectTile::from(second)),
            ],
            None => vec![PlayerCommand::Hint],
        };
        for command in commands {
            if tx.send(command).await.is_err() {
                warn!("session stopped listening");
                return;
            }
        }
    }
}
