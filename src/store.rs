use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::bracket::{check_team_count, generate_with};
use crate::error::{BracketError, Result};
use crate::sync::BracketChange;
use crate::types::{
  Entrant, Match, MatchId, Round, Schedule, Settings, SettingsPatch, Team, TeamUpdate,
  BYE_ID_PREFIX,
};

/// Everything the presentation and sync layers read. Serializable as a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BracketState {
  /// Bumped on every regeneration so a synchronizer can tell brackets apart.
  pub bracket_id: u64,
  pub settings: Settings,
  pub teams: Vec<Team>,
  pub rounds: Vec<Round>,
}

/// Owns the live bracket. All mutation goes through the methods below; each one
/// validates first and commits as a whole or not at all.
#[derive(Debug, Clone)]
pub struct BracketStore {
  state: BracketState,
  changes: Vec<BracketChange>,
}

impl BracketStore {
  /// Default-named roster of `settings.num_teams` teams and a fresh bracket.
  pub fn new(settings: Settings) -> Result<Self> {
    let teams = default_roster(settings.num_teams);
    Self::with_teams(settings, teams)
  }

  pub fn with_teams(mut settings: Settings, teams: Vec<Team>) -> Result<Self> {
    for team in &teams {
      check_team_id(&team.id)?;
    }
    settings.num_teams = teams.len();
    let mut store = BracketStore {
      state: BracketState {
        bracket_id: 0,
        settings,
        teams,
        rounds: Vec::new(),
      },
      changes: Vec::new(),
    };
    store.transact(|state, changes| state.regenerate(changes))?;
    Ok(store)
  }

  /// Resume from a previously saved state without regenerating anything.
  pub fn from_state(state: BracketState) -> Self {
    BracketStore {
      state,
      changes: Vec::new(),
    }
  }

  pub fn state(&self) -> &BracketState {
    &self.state
  }

  pub fn into_state(self) -> BracketState {
    self.state
  }

  pub fn bracket_id(&self) -> u64 {
    self.state.bracket_id
  }

  pub fn rounds(&self) -> &[Round] {
    &self.state.rounds
  }

  pub fn teams(&self) -> &[Team] {
    &self.state.teams
  }

  pub fn settings(&self) -> &Settings {
    &self.state.settings
  }

  pub fn get_match(&self, match_id: &str) -> Option<&Match> {
    let id = match_id.parse::<MatchId>().ok()?;
    self.state.match_at(id)
  }

  /// Winner of the final, once an elimination bracket is decided.
  pub fn champion(&self) -> Option<&Team> {
    if !self.state.settings.bracket_type.is_elimination() {
      return None;
    }
    let last = self.state.rounds.last()?;
    if last.matches.len() != 1 {
      return None;
    }
    last.matches[0].winner().and_then(Entrant::as_team)
  }

  /// Hand pending change events to a synchronizer.
  pub fn drain_changes(&mut self) -> Vec<BracketChange> {
    std::mem::take(&mut self.changes)
  }

  pub fn pending_changes(&self) -> &[BracketChange] {
    &self.changes
  }

  pub fn set_winner(&mut self, match_id: &str, winner_index: usize) -> Result<()> {
    let id = match_id.parse::<MatchId>()?;
    self.transact(|state, changes| state.set_winner(id, winner_index, changes))
  }

  /// Record a score. Never decides the match; winners are always picked explicitly.
  pub fn set_team_score(&mut self, match_id: &str, team_index: usize, score: u32) -> Result<()> {
    let id = match_id.parse::<MatchId>()?;
    self.transact(|state, changes| {
      let bracket_id = state.bracket_id;
      let m = state.match_at_mut(id)?;
      check_slot_index(&m.id, team_index)?;
      let team = match m.teams[team_index].as_mut() {
        Some(Entrant::Team(team)) => team,
        Some(Entrant::Bye { .. }) => {
          return Err(BracketError::invalid_slot(&m.id, team_index, "a bye has no score"));
        }
        None => return Err(BracketError::invalid_slot(&m.id, team_index, "slot is empty")),
      };
      if team.score == Some(score) {
        return Ok(());
      }
      team.score = Some(score);
      changes.push(BracketChange::ScoreSet {
        bracket_id,
        match_id: m.id.clone(),
        slot: team_index,
        team_id: team.id.clone(),
        score,
      });
      Ok(())
    })
  }

  pub fn set_schedule(&mut self, match_id: &str, schedule: Schedule) -> Result<()> {
    let id = match_id.parse::<MatchId>()?;
    self.transact(|state, changes| {
      let bracket_id = state.bracket_id;
      let m = state.match_at_mut(id)?;
      m.schedule = Some(schedule.clone());
      changes.push(BracketChange::ScheduleSet {
        bracket_id,
        match_id: m.id.clone(),
        schedule,
      });
      Ok(())
    })
  }

  /// Merge `patch` into the settings. Returns `true` when the bracket was regenerated,
  /// which discards every recorded score and winner.
  pub fn set_settings(&mut self, patch: SettingsPatch) -> Result<bool> {
    if let Some(count) = patch.num_teams {
      check_team_count(count)?;
    }
    self.transact(|state, changes| {
      let before = state.settings.clone();
      let settings = &mut state.settings;
      if let Some(title) = patch.title {
        settings.title = title;
      }
      if let Some(count) = patch.num_teams {
        settings.num_teams = count;
      }
      if let Some(bracket_type) = patch.bracket_type {
        settings.bracket_type = bracket_type;
      }
      if let Some(method) = patch.round_robin_method {
        settings.round_robin_method = method;
      }
      if let Some(auto_advance) = patch.auto_advance_byes {
        settings.auto_advance_byes = auto_advance;
      }
      if *settings == before {
        return Ok(false);
      }
      let settings = settings.clone();
      changes.push(BracketChange::SettingsChanged {
        settings: settings.clone(),
      });

      let shape_changed = settings.num_teams != before.num_teams
        || settings.bracket_type != before.bracket_type
        || (!settings.bracket_type.is_elimination()
          && settings.round_robin_method != before.round_robin_method);
      if !shape_changed {
        return Ok(false);
      }

      state.resize_roster(settings.num_teams, changes);
      state.regenerate(changes)?;
      Ok(true)
    })
  }

  /// Append a team to the roster. The bracket keeps its shape until regenerated.
  pub fn add_team(&mut self, team: Team) -> Result<()> {
    self.transact(|state, changes| {
      check_team_id(&team.id)?;
      if state.teams.iter().any(|existing| existing.id == team.id) {
        return Err(BracketError::DuplicateTeam(team.id));
      }
      let team = Team {
        score: None,
        ..team
      };
      debug!(team_id = %team.id, "team added");
      state.teams.push(team.clone());
      changes.push(BracketChange::TeamAdded { team });
      Ok(())
    })
  }

  /// Remove a team from the roster. Matches it already occupies are left untouched.
  pub fn remove_team(&mut self, team_id: &str) -> Result<Team> {
    self.transact(|state, changes| {
      let position = state
        .teams
        .iter()
        .position(|team| team.id == team_id)
        .ok_or_else(|| BracketError::TeamNotFound(team_id.to_string()))?;
      let team = state.teams.remove(position);
      debug!(team_id = %team.id, "team removed");
      changes.push(BracketChange::TeamRemoved {
        team_id: team.id.clone(),
      });
      Ok(team)
    })
  }

  /// Edit display data. Slots holding the team pick up the new data and keep their score.
  pub fn update_team(&mut self, team_id: &str, update: TeamUpdate) -> Result<()> {
    self.transact(|state, changes| {
      let team = state
        .teams
        .iter_mut()
        .find(|team| team.id == team_id)
        .ok_or_else(|| BracketError::TeamNotFound(team_id.to_string()))?;
      if let Some(name) = update.name {
        team.name = name;
      }
      if let Some(logo) = update.logo {
        team.logo = Some(logo);
      }
      if let Some(country_code) = update.country_code {
        team.country_code = Some(country_code);
      }
      if let Some(roster) = update.roster {
        team.roster = roster;
      }
      let updated = team.clone();

      for m in state.rounds.iter_mut().flat_map(|round| round.matches.iter_mut()) {
        for slot in m.teams.iter_mut() {
          if let Some(Entrant::Team(existing)) = slot {
            if existing.id == updated.id {
              *existing = Team {
                score: existing.score,
                ..updated.clone()
              };
            }
          }
        }
      }
      changes.push(BracketChange::TeamUpdated { team: updated });
      Ok(())
    })
  }

  /// Rebuild the bracket from the current roster. Destructive.
  pub fn generate_bracket(&mut self) -> Result<()> {
    self.transact(|state, changes| {
      state.settings.num_teams = state.teams.len();
      state.regenerate(changes)
    })
  }

  /// Fresh default-named roster and bracket from the current settings.
  pub fn reset_bracket(&mut self) -> Result<()> {
    self.transact(|state, changes| {
      state.teams = default_roster(state.settings.num_teams);
      state.regenerate(changes)
    })
  }

  /// Apply `f` to a copy of the state and commit it only on success.
  fn transact<F, R>(&mut self, f: F) -> Result<R>
  where
    F: FnOnce(&mut BracketState, &mut Vec<BracketChange>) -> Result<R>,
  {
    let mut next = self.state.clone();
    let mut changes = Vec::new();
    let out = f(&mut next, &mut changes)?;
    self.state = next;
    self.changes.extend(changes);
    Ok(out)
  }
}

impl BracketState {
  fn match_at(&self, id: MatchId) -> Option<&Match> {
    self.rounds.get(id.round_index)?.matches.get(id.match_index)
  }

  fn match_at_mut(&mut self, id: MatchId) -> Result<&mut Match> {
    self
      .rounds
      .get_mut(id.round_index)
      .and_then(|round| round.matches.get_mut(id.match_index))
      .ok_or_else(|| BracketError::MatchNotFound(id.to_string()))
  }

  /// Where the winner of `id` goes, if anywhere.
  fn next_slot(&self, id: MatchId) -> Result<Option<(MatchId, usize)>> {
    if !self.settings.bracket_type.is_elimination() || id.round_index + 1 >= self.rounds.len() {
      return Ok(None);
    }
    let (next, slot) = id.next();
    if self.match_at(next).is_none() {
      error!(from = %id, to = %next, "propagation target out of range");
      debug_assert!(false, "propagation target {next} missing for {id}");
      return Err(BracketError::InconsistentPropagation(format!(
        "{id} feeds {next}, which does not exist"
      )));
    }
    Ok(Some((next, slot)))
  }

  fn set_winner(&mut self, id: MatchId, winner_index: usize, changes: &mut Vec<BracketChange>) -> Result<()> {
    let bracket_id = self.bracket_id;
    let m = self.match_at_mut(id)?;
    check_slot_index(&m.id, winner_index)?;
    let winner = match m.teams[winner_index].as_ref() {
      Some(Entrant::Team(team)) => team.clone(),
      Some(Entrant::Bye { .. }) => {
        return Err(BracketError::invalid_slot(&m.id, winner_index, "a bye cannot win"));
      }
      None => return Err(BracketError::invalid_slot(&m.id, winner_index, "slot is empty")),
    };
    if m.winner_index == Some(winner_index) {
      return Ok(());
    }

    if let Some(previous) = m.winner_index {
      info!(match_id = %id, previous, winner_index, "winner re-selected");
      self.clear_downstream(id, changes)?;
    }

    let m = self.match_at_mut(id)?;
    m.winner_index = Some(winner_index);
    changes.push(BracketChange::WinnerSet {
      bracket_id,
      match_id: m.id.clone(),
      winner_index,
      team_id: winner.id.clone(),
    });
    self.propagate(id, &winner, changes)
  }

  /// Carry `winner` into the next round. No-op for the final and for round robin.
  fn propagate(&mut self, id: MatchId, winner: &Team, changes: &mut Vec<BracketChange>) -> Result<()> {
    let Some((next, slot)) = self.next_slot(id)? else {
      return Ok(());
    };
    let bracket_id = self.bracket_id;
    let target = self.match_at_mut(next)?;
    target.teams[slot] = Some(Entrant::Team(winner.carried_forward()));
    changes.push(BracketChange::SlotFilled {
      bracket_id,
      match_id: target.id.clone(),
      slot,
      team_id: winner.id.clone(),
    });
    Ok(())
  }

  /// Undo the decision of `id` and everything it fed further down the bracket.
  fn clear_downstream(&mut self, id: MatchId, changes: &mut Vec<BracketChange>) -> Result<()> {
    let bracket_id = self.bracket_id;
    let mut current = id;
    loop {
      let Some((next, slot)) = self.next_slot(current)? else {
        return Ok(());
      };
      let target = self.match_at_mut(next)?;
      if target.teams[slot].take().is_some() {
        changes.push(BracketChange::SlotCleared {
          bracket_id,
          match_id: target.id.clone(),
          slot,
        });
      }
      if target.winner_index.take().is_none() {
        return Ok(());
      }
      changes.push(BracketChange::WinnerCleared {
        bracket_id,
        match_id: target.id.clone(),
      });
      current = next;
    }
  }

  fn resize_roster(&mut self, count: usize, changes: &mut Vec<BracketChange>) {
    if count < self.teams.len() {
      for team in self.teams.drain(count..) {
        changes.push(BracketChange::TeamRemoved { team_id: team.id });
      }
      return;
    }
    let mut number = self.teams.len() + 1;
    while self.teams.len() < count {
      let team = Team::placeholder(number);
      number += 1;
      if self.teams.iter().any(|existing| existing.id == team.id) {
        continue;
      }
      self.teams.push(team.clone());
      changes.push(BracketChange::TeamAdded { team });
    }
  }

  fn regenerate(&mut self, changes: &mut Vec<BracketChange>) -> Result<()> {
    let rounds = generate_with(
      &self.teams,
      self.settings.bracket_type,
      self.settings.round_robin_method,
    )?;
    let discarded = self
      .rounds
      .iter()
      .flat_map(|round| round.matches.iter())
      .filter(|m| m.winner_index.is_some())
      .count();
    self.rounds = rounds;
    self.bracket_id += 1;
    if discarded > 0 {
      warn!(
        bracket_id = self.bracket_id,
        discarded_results = discarded,
        "bracket regenerated; previous scores and winners discarded"
      );
    } else {
      info!(bracket_id = self.bracket_id, teams = self.teams.len(), "bracket generated");
    }
    changes.push(BracketChange::BracketRegenerated {
      bracket_id: self.bracket_id,
      bracket_type: self.settings.bracket_type,
      team_count: self.teams.len(),
      round_count: self.rounds.len(),
    });
    if self.settings.auto_advance_byes {
      self.advance_byes(changes)?;
    }
    Ok(())
  }

  /// Decide every first-round match that pairs a team with a bye.
  fn advance_byes(&mut self, changes: &mut Vec<BracketChange>) -> Result<()> {
    let Some(first) = self.rounds.first() else {
      return Ok(());
    };
    let walkovers = first
      .matches
      .iter()
      .filter(|m| m.winner_index.is_none())
      .filter_map(|m| match &m.teams {
        [Some(Entrant::Team(_)), Some(Entrant::Bye { .. })] => Some((m.match_id(), 0)),
        [Some(Entrant::Bye { .. }), Some(Entrant::Team(_))] => Some((m.match_id(), 1)),
        _ => None,
      })
      .collect::<Vec<_>>();
    for (id, slot) in walkovers {
      debug!(match_id = %id, slot, "bye auto-advanced");
      self.set_winner(id, slot, changes)?;
    }
    Ok(())
  }
}

fn check_slot_index(match_id: &str, slot: usize) -> Result<()> {
  if slot > 1 {
    return Err(BracketError::invalid_slot(match_id, slot, "slot must be 0 or 1"));
  }
  Ok(())
}

fn check_team_id(team_id: &str) -> Result<()> {
  if team_id.starts_with(BYE_ID_PREFIX) {
    return Err(BracketError::ReservedTeamId(team_id.to_string()));
  }
  Ok(())
}

fn default_roster(count: usize) -> Vec<Team> {
  (1..=count).map(Team::placeholder).collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::{BracketType, MatchState, RoundRobinMethod};
  use chrono::{TimeZone, Utc};

  fn settings(num_teams: usize) -> Settings {
    Settings {
      num_teams,
      ..Settings::default()
    }
  }

  fn lettered(names: &[&str]) -> Vec<Team> {
    names.iter().map(|name| Team::new(name.to_lowercase(), *name)).collect()
  }

  fn slot_id(store: &BracketStore, match_id: &str, slot: usize) -> Option<String> {
    store.get_match(match_id).unwrap().teams[slot]
      .as_ref()
      .map(|e| e.id().to_string())
  }

  #[test]
  fn test_set_winner_propagates_to_next_round() {
    let mut store = BracketStore::with_teams(Settings::default(), lettered(&["A", "B", "C", "D"])).unwrap();
    store.set_winner("r0-m0", 0).unwrap();
    assert_eq!(store.get_match("r0-m0").unwrap().winner_index, Some(0));
    let final_match = store.get_match("r1-m0").unwrap();
    let carried = final_match.teams[0].as_ref().and_then(Entrant::as_team).unwrap();
    assert_eq!(carried.id, "a");
    assert_eq!(carried.score, None);
    assert!(final_match.teams[1].is_none());
    assert_eq!(final_match.state(), MatchState::Unfilled);
  }

  #[test]
  fn test_winner_score_is_not_carried() {
    let mut store = BracketStore::with_teams(Settings::default(), lettered(&["A", "B", "C", "D"])).unwrap();
    store.set_team_score("r0-m1", 1, 11).unwrap();
    store.set_winner("r0-m1", 1).unwrap();
    let carried = store.get_match("r1-m0").unwrap().teams[1].clone().unwrap();
    assert_eq!(carried.id(), "d");
    assert_eq!(carried.score(), None);
    assert_eq!(store.get_match("r0-m1").unwrap().teams[1].as_ref().unwrap().score(), Some(11));
  }

  #[test]
  fn test_set_team_score_leaves_winner_alone() {
    let mut store = BracketStore::with_teams(Settings::default(), lettered(&["A", "B", "C", "D"])).unwrap();
    store.set_team_score("r0-m0", 1, 7).unwrap();
    let m = store.get_match("r0-m0").unwrap();
    assert_eq!(m.teams[1].as_ref().unwrap().score(), Some(7));
    assert_eq!(m.winner_index, None);
    assert_eq!(m.leading_index(), None);
  }

  #[test]
  fn test_set_winner_validates_slot() {
    let mut store = BracketStore::with_teams(Settings::default(), lettered(&["A", "B", "C", "D"])).unwrap();
    assert!(matches!(store.set_winner("r0-m0", 2), Err(BracketError::InvalidSlot { slot: 2, .. })));
    assert!(matches!(store.set_winner("r1-m0", 0), Err(BracketError::InvalidSlot { .. })));
    assert!(matches!(store.set_winner("r5-m0", 0), Err(BracketError::MatchNotFound(_))));
    assert!(matches!(store.set_winner("final", 0), Err(BracketError::MatchNotFound(_))));
    assert!(matches!(store.set_team_score("r1-m0", 0, 3), Err(BracketError::InvalidSlot { .. })));
    assert!(matches!(store.set_team_score("r0-m9", 0, 3), Err(BracketError::MatchNotFound(_))));
  }

  #[test]
  fn test_failed_operation_leaves_state_untouched() {
    let mut store = BracketStore::with_teams(Settings::default(), lettered(&["A", "B", "C", "D"])).unwrap();
    store.drain_changes();
    let before = store.state().clone();
    assert!(store.set_winner("r1-m0", 1).is_err());
    assert!(store.set_settings(SettingsPatch { num_teams: Some(1), ..SettingsPatch::default() }).is_err());
    assert_eq!(store.state(), &before);
    assert!(store.pending_changes().is_empty());
  }

  #[test]
  fn test_set_winner_is_idempotent() {
    let mut store = BracketStore::with_teams(Settings::default(), lettered(&["A", "B", "C", "D"])).unwrap();
    store.set_winner("r0-m0", 0).unwrap();
    store.drain_changes();
    let before = store.state().clone();
    store.set_winner("r0-m0", 0).unwrap();
    assert_eq!(store.state(), &before);
    assert!(store.drain_changes().is_empty());
  }

  #[test]
  fn test_reselecting_winner_overwrites_downstream() {
    let mut store = BracketStore::with_teams(Settings::default(), lettered(&["A", "B", "C", "D"])).unwrap();
    store.set_winner("r0-m0", 0).unwrap();
    store.set_winner("r0-m0", 1).unwrap();
    assert_eq!(store.get_match("r0-m0").unwrap().winner_index, Some(1));
    assert_eq!(slot_id(&store, "r1-m0", 0).as_deref(), Some("b"));
    let final_ids = store.rounds()[1].matches[0]
      .teams
      .iter()
      .flatten()
      .map(|e| e.id().to_string())
      .collect::<Vec<_>>();
    assert_eq!(final_ids, ["b"]);
  }

  #[test]
  fn test_reselecting_clears_decisions_built_on_old_winner() {
    let mut store = BracketStore::new(settings(8)).unwrap();
    store.set_winner("r0-m0", 0).unwrap();
    store.set_winner("r0-m1", 0).unwrap();
    store.set_winner("r1-m0", 0).unwrap();
    assert_eq!(slot_id(&store, "r2-m0", 0).as_deref(), Some("team-1"));

    store.drain_changes();
    store.set_winner("r0-m0", 1).unwrap();

    let semi = store.get_match("r1-m0").unwrap();
    assert_eq!(semi.winner_index, None);
    assert_eq!(semi.teams[0].as_ref().map(Entrant::id), Some("team-2"));
    assert_eq!(semi.teams[1].as_ref().map(Entrant::id), Some("team-3"));
    assert_eq!(semi.state(), MatchState::Ready);
    assert!(store.get_match("r2-m0").unwrap().teams[0].is_none());

    let changes = store.drain_changes();
    assert!(changes.contains(&BracketChange::WinnerCleared {
      bracket_id: store.bracket_id(),
      match_id: "r1-m0".to_string(),
    }));
    assert!(changes.contains(&BracketChange::SlotCleared {
      bracket_id: store.bracket_id(),
      match_id: "r2-m0".to_string(),
      slot: 0,
    }));
  }

  #[test]
  fn test_byes_auto_advance_after_generation() {
    let store = BracketStore::with_teams(Settings::default(), lettered(&["A", "B", "C"])).unwrap();
    let walkover = store.get_match("r0-m1").unwrap();
    assert_eq!(walkover.winner_index, Some(0));
    assert_eq!(slot_id(&store, "r1-m0", 1).as_deref(), Some("c"));
    assert!(store.get_match("r1-m0").unwrap().teams[0].is_none());
  }

  #[test]
  fn test_bye_cannot_be_selected_or_scored() {
    let no_auto = Settings {
      auto_advance_byes: false,
      ..Settings::default()
    };
    let mut store = BracketStore::with_teams(no_auto, lettered(&["A", "B", "C"])).unwrap();
    assert_eq!(store.get_match("r0-m1").unwrap().winner_index, None);
    assert!(matches!(store.set_winner("r0-m1", 1), Err(BracketError::InvalidSlot { .. })));
    assert!(matches!(store.set_team_score("r0-m1", 1, 2), Err(BracketError::InvalidSlot { .. })));
    store.set_winner("r0-m1", 0).unwrap();
    assert_eq!(slot_id(&store, "r1-m0", 1).as_deref(), Some("c"));
  }

  #[test]
  fn test_shrinking_team_count_regenerates() {
    let mut store = BracketStore::new(settings(8)).unwrap();
    store.set_winner("r0-m0", 0).unwrap();
    store.set_team_score("r0-m1", 0, 3).unwrap();
    let first_id = store.bracket_id();

    let regenerated = store
      .set_settings(SettingsPatch { num_teams: Some(4), ..SettingsPatch::default() })
      .unwrap();
    assert!(regenerated);
    assert_eq!(store.bracket_id(), first_id + 1);
    let ids = store.teams().iter().map(|t| t.id.as_str()).collect::<Vec<_>>();
    assert_eq!(ids, ["team-1", "team-2", "team-3", "team-4"]);
    assert_eq!(store.rounds().len(), 2);
    for m in &store.rounds()[0].matches {
      assert!(m.teams.iter().all(|slot| matches!(slot, Some(Entrant::Team(t)) if t.score.is_none())));
      assert_eq!(m.winner_index, None);
    }
    assert!(store.rounds()[1].matches[0].teams.iter().all(Option::is_none));
  }

  #[test]
  fn test_growing_team_count_appends_placeholders() {
    let mut store = BracketStore::with_teams(Settings::default(), lettered(&["A", "B", "C", "D"])).unwrap();
    store
      .set_settings(SettingsPatch { num_teams: Some(6), ..SettingsPatch::default() })
      .unwrap();
    let ids = store.teams().iter().map(|t| t.id.as_str()).collect::<Vec<_>>();
    assert_eq!(ids, ["a", "b", "c", "d", "team-5", "team-6"]);
    assert_eq!(store.rounds().len(), 3);
  }

  #[test]
  fn test_title_change_keeps_bracket() {
    let mut store = BracketStore::new(settings(4)).unwrap();
    store.set_winner("r0-m0", 1).unwrap();
    let id = store.bracket_id();
    let regenerated = store
      .set_settings(SettingsPatch { title: Some("Spring Cup".to_string()), ..SettingsPatch::default() })
      .unwrap();
    assert!(!regenerated);
    assert_eq!(store.settings().title, "Spring Cup");
    assert_eq!(store.bracket_id(), id);
    assert_eq!(store.get_match("r0-m0").unwrap().winner_index, Some(1));
  }

  #[test]
  fn test_switching_to_round_robin() {
    let mut store = BracketStore::new(settings(4)).unwrap();
    store
      .set_settings(SettingsPatch { bracket_type: Some(BracketType::RoundRobin), ..SettingsPatch::default() })
      .unwrap();
    assert_eq!(store.rounds().len(), 3);
    store.set_winner("r0-m0", 1).unwrap();
    assert_eq!(store.get_match("r0-m0").unwrap().winner_index, Some(1));
    // Round robin rounds are independent; nothing is carried forward.
    assert!(store.rounds()[1].matches.iter().all(|m| m.winner_index.is_none()));
    assert!(store.champion().is_none());

    let regenerated = store
      .set_settings(SettingsPatch { round_robin_method: Some(RoundRobinMethod::Greedy), ..SettingsPatch::default() })
      .unwrap();
    assert!(regenerated);
  }

  #[test]
  fn test_roster_edits_do_not_change_shape() {
    let mut store = BracketStore::with_teams(Settings::default(), lettered(&["A", "B", "C", "D"])).unwrap();
    store.set_team_score("r0-m0", 0, 5).unwrap();
    let rounds_before = store.rounds().to_vec();

    store.add_team(Team::new("e", "E")).unwrap();
    assert!(matches!(store.add_team(Team::new("e", "E again")), Err(BracketError::DuplicateTeam(_))));
    let removed = store.remove_team("b").unwrap();
    assert_eq!(removed.name, "B");
    assert!(matches!(store.remove_team("b"), Err(BracketError::TeamNotFound(_))));
    assert_eq!(store.rounds(), rounds_before.as_slice());

    store
      .update_team("a", TeamUpdate { name: Some("Alpha".to_string()), ..TeamUpdate::default() })
      .unwrap();
    let slot = store.get_match("r0-m0").unwrap().teams[0].clone().unwrap();
    assert_eq!(slot.name(), "Alpha");
    assert_eq!(slot.score(), Some(5));
    assert_eq!(store.rounds().len(), rounds_before.len());
    assert!(matches!(
      store.update_team("zz", TeamUpdate::default()),
      Err(BracketError::TeamNotFound(_))
    ));
  }

  #[test]
  fn test_bye_ids_are_reserved() {
    let mut store = BracketStore::with_teams(Settings::default(), lettered(&["A", "B", "C"])).unwrap();
    assert!(matches!(
      store.add_team(Team::new("bye-1", "Impostor")),
      Err(BracketError::ReservedTeamId(_))
    ));
    assert_eq!(store.teams().len(), 3);
    store.generate_bracket().unwrap();
    assert!(store.get_match("r0-m1").unwrap().teams[1].as_ref().unwrap().is_bye());

    let roster = vec![Team::new("a", "A"), Team::new("bye-1", "B")];
    assert!(matches!(
      BracketStore::with_teams(Settings::default(), roster),
      Err(BracketError::ReservedTeamId(_))
    ));
  }

  #[test]
  #[cfg_attr(debug_assertions, should_panic(expected = "propagation target"))]
  fn test_missing_propagation_target_is_a_logic_fault() {
    let mut state = BracketStore::new(settings(4)).unwrap().into_state();
    state.rounds[1].matches.clear();
    let mut store = BracketStore::from_state(state);
    let result = store.set_winner("r0-m0", 0);
    assert!(matches!(result, Err(BracketError::InconsistentPropagation(_))));
  }

  #[test]
  fn test_generate_bracket_uses_current_roster() {
    let mut store = BracketStore::with_teams(Settings::default(), lettered(&["A", "B", "C", "D"])).unwrap();
    store.add_team(Team::new("e", "E")).unwrap();
    store.generate_bracket().unwrap();
    assert_eq!(store.settings().num_teams, 5);
    assert_eq!(store.rounds().len(), 3);
    assert_eq!(store.rounds()[0].matches.len(), 4);
  }

  #[test]
  fn test_reset_bracket_restores_default_names() {
    let mut store = BracketStore::with_teams(Settings::default(), lettered(&["A", "B", "C", "D"])).unwrap();
    store.set_winner("r0-m0", 0).unwrap();
    store.reset_bracket().unwrap();
    let names = store.teams().iter().map(|t| t.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, ["Team 1", "Team 2", "Team 3", "Team 4"]);
    assert!(store.rounds().iter().flat_map(|r| r.matches.iter()).all(|m| m.winner_index.is_none()));
  }

  #[test]
  fn test_champion_after_final() {
    let mut store = BracketStore::with_teams(Settings::default(), lettered(&["A", "B", "C"])).unwrap();
    assert!(store.champion().is_none());
    store.set_winner("r0-m0", 1).unwrap();
    assert_eq!(store.get_match("r1-m0").unwrap().state(), MatchState::Ready);
    store.set_winner("r1-m0", 1).unwrap();
    assert_eq!(store.champion().map(|t| t.id.as_str()), Some("c"));
  }

  #[test]
  fn test_schedule_is_recorded() {
    let mut store = BracketStore::new(settings(4)).unwrap();
    let schedule = Schedule {
      start_time: Some(Utc.with_ymd_and_hms(2026, 5, 2, 14, 30, 0).unwrap()),
      court: Some("Court 2".to_string()),
    };
    store.set_schedule("r1-m0", schedule.clone()).unwrap();
    assert_eq!(store.get_match("r1-m0").unwrap().schedule, Some(schedule));
    assert!(store.set_schedule("r3-m0", Schedule::default()).is_err());
  }

  #[test]
  fn test_changes_describe_each_mutation() {
    let mut store = BracketStore::with_teams(Settings::default(), lettered(&["A", "B", "C", "D"])).unwrap();
    let initial = store.drain_changes();
    assert!(matches!(initial.as_slice(), [BracketChange::BracketRegenerated { team_count: 4, round_count: 2, .. }]));

    store.set_team_score("r0-m0", 0, 2).unwrap();
    store.set_winner("r0-m0", 0).unwrap();
    let id = store.bracket_id();
    assert_eq!(
      store.drain_changes(),
      vec![
        BracketChange::ScoreSet { bracket_id: id, match_id: "r0-m0".into(), slot: 0, team_id: "a".into(), score: 2 },
        BracketChange::WinnerSet { bracket_id: id, match_id: "r0-m0".into(), winner_index: 0, team_id: "a".into() },
        BracketChange::SlotFilled { bracket_id: id, match_id: "r1-m0".into(), slot: 0, team_id: "a".into() },
      ]
    );
    assert!(store.drain_changes().is_empty());
  }
}
