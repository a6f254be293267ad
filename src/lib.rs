//! Tournament bracket engine.
//!
//! Builds single elimination, round robin and (winners-only) double elimination
//! brackets from a team list, records scores and winners, and carries each winner
//! into the next round. All state lives in a [`BracketStore`]; an external
//! synchronizer mirrors it through the change outbox in [`sync`].

pub mod bracket;
pub mod config;
pub mod error;
pub mod snapshot;
pub mod store;
pub mod store_commands;
pub mod sync;
pub mod types;

pub use bracket::{generate, generate_with};
pub use error::{BracketError, Result};
pub use store::{BracketState, BracketStore};
pub use sync::BracketChange;
pub use types::*;

use config::{load_config, load_env_file, log_config_warnings, resolve_repo_path};
use snapshot::{load_snapshot, save_snapshot};
use store_commands::{bracket_drain_changes, bracket_state, shared_store};

use std::fs;
use tracing::info;
use tracing_subscriber::EnvFilter;

// ── Entry point ────────────────────────────────────────────────────────

/// Load config, restore or build the bracket, log it, and write the snapshot back.
/// Prints the flat match records as JSON for a synchronizer to pick up.
pub fn run() -> Result<()> {
    load_env_file();
    let config = load_config()?;

    // Initialize tracing with daily rolling file output
    let logs_dir = resolve_repo_path(&config.logs_dir);
    fs::create_dir_all(&logs_dir).ok();
    let file_appender = tracing_appender::rolling::daily(&logs_dir, "bracket.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();
    info!("Bracket engine starting");
    log_config_warnings(&config);

    let snapshot_path = resolve_repo_path(&config.snapshot_path);
    let store = match load_snapshot(&snapshot_path)? {
        Some(state) => {
            if state.settings != config.settings {
                info!("snapshot settings differ from config; keeping the snapshot");
            }
            BracketStore::from_state(state)
        }
        None => BracketStore::new(config.settings.clone())?,
    };
    let store = shared_store(store);

    let state = bracket_state(&store)?;
    for round in &state.rounds {
        let decided = round.matches.iter().filter(|m| m.winner_index.is_some()).count();
        info!(
            round = round.index,
            name = %round.name,
            matches = round.matches.len(),
            decided,
            "round"
        );
    }
    let pending = bracket_drain_changes(&store)?;
    info!(bracket_id = state.bracket_id, changes = pending.len(), "bracket ready");

    save_snapshot(&snapshot_path, &state)?;
    let payload = serde_json::to_string_pretty(&sync::match_records(&state))?;
    println!("{payload}");
    Ok(())
}
