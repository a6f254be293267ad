use std::sync::{Arc, Mutex};

use crate::error::{BracketError, Result};
use crate::store::{BracketState, BracketStore};
use crate::sync::BracketChange;
use crate::types::{Schedule, SettingsPatch, SharedBracketStore, Team, TeamUpdate};

// ── Helpers ─────────────────────────────────────────────────────────────

pub fn shared_store(store: BracketStore) -> SharedBracketStore {
    Arc::new(Mutex::new(store))
}

/// Lock the store, then call `f` with the live `BracketStore`. Every command runs
/// under the same lock, so each update sees the latest committed state.
fn with_store<F, R>(store: &SharedBracketStore, f: F) -> Result<R>
where
    F: FnOnce(&mut BracketStore) -> Result<R>,
{
    let mut guard = store
        .lock()
        .map_err(|e| BracketError::LockPoisoned(e.to_string()))?;
    f(&mut guard)
}

/// Run a mutation and hand back the state it produced.
fn mutate<F>(store: &SharedBracketStore, f: F) -> Result<BracketState>
where
    F: FnOnce(&mut BracketStore) -> Result<()>,
{
    with_store(store, |guard| {
        f(guard)?;
        Ok(guard.state().clone())
    })
}

// ── Commands ────────────────────────────────────────────────────────────

pub fn bracket_state(store: &SharedBracketStore) -> Result<BracketState> {
    with_store(store, |guard| Ok(guard.state().clone()))
}

pub fn bracket_set_winner(
    store: &SharedBracketStore,
    match_id: &str,
    winner_index: usize,
) -> Result<BracketState> {
    mutate(store, |guard| guard.set_winner(match_id, winner_index))
}

pub fn bracket_set_team_score(
    store: &SharedBracketStore,
    match_id: &str,
    team_index: usize,
    score: u32,
) -> Result<BracketState> {
    mutate(store, |guard| guard.set_team_score(match_id, team_index, score))
}

pub fn bracket_set_schedule(
    store: &SharedBracketStore,
    match_id: &str,
    schedule: Schedule,
) -> Result<BracketState> {
    mutate(store, |guard| guard.set_schedule(match_id, schedule))
}

pub fn bracket_set_settings(store: &SharedBracketStore, patch: SettingsPatch) -> Result<BracketState> {
    mutate(store, |guard| guard.set_settings(patch).map(|_| ()))
}

pub fn bracket_add_team(store: &SharedBracketStore, team: Team) -> Result<BracketState> {
    mutate(store, |guard| guard.add_team(team))
}

pub fn bracket_remove_team(store: &SharedBracketStore, team_id: &str) -> Result<BracketState> {
    mutate(store, |guard| guard.remove_team(team_id).map(|_| ()))
}

pub fn bracket_update_team(
    store: &SharedBracketStore,
    team_id: &str,
    update: TeamUpdate,
) -> Result<BracketState> {
    mutate(store, |guard| guard.update_team(team_id, update))
}

pub fn bracket_generate(store: &SharedBracketStore) -> Result<BracketState> {
    mutate(store, |guard| guard.generate_bracket())
}

pub fn bracket_reset(store: &SharedBracketStore) -> Result<BracketState> {
    mutate(store, |guard| guard.reset_bracket())
}

pub fn bracket_drain_changes(store: &SharedBracketStore) -> Result<Vec<BracketChange>> {
    with_store(store, |guard| Ok(guard.drain_changes()))
}
