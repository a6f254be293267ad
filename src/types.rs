use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    str::FromStr,
    sync::{Arc, Mutex},
};

use crate::error::BracketError;
use crate::store::BracketStore;

// ── Constants ──────────────────────────────────────────────────────────

pub const BYE_ID_PREFIX: &str = "bye-";
pub const BYE_NAME: &str = "Bye";
pub const TEAM_ID_PREFIX: &str = "team-";
pub const DEFAULT_TITLE: &str = "Tournament";
pub const DEFAULT_NUM_TEAMS: usize = 8;
pub const MIN_TEAMS: usize = 2;

// ── Shared state type aliases ──────────────────────────────────────────

pub type SharedBracketStore = Arc<Mutex<BracketStore>>;

// ── Teams ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: String,
    pub name: String,
    /// Absent until the team has a recorded score in its current match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roster: Vec<String>,
}

impl Team {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Team {
            id: id.into(),
            name: name.into(),
            score: None,
            logo: None,
            country_code: None,
            roster: Vec::new(),
        }
    }

    /// Default-named team used when seeding or growing a roster ("team-3" / "Team 3").
    pub fn placeholder(number: usize) -> Self {
        Team::new(format!("{TEAM_ID_PREFIX}{number}"), format!("Team {number}"))
    }

    /// Copy carried into the next round. Scores never travel across rounds.
    pub fn carried_forward(&self) -> Self {
        Team {
            score: None,
            ..self.clone()
        }
    }
}

/// Optional edits for a roster entry. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TeamUpdate {
    pub name: Option<String>,
    pub logo: Option<String>,
    pub country_code: Option<String>,
    pub roster: Option<Vec<String>>,
}

/// What can occupy a match slot. Byes are their own variant so they can never be
/// mistaken for a real opponent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Entrant {
    Team(Team),
    Bye { id: String },
}

impl Entrant {
    pub fn bye(number: usize) -> Self {
        Entrant::Bye {
            id: format!("{BYE_ID_PREFIX}{number}"),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Entrant::Team(team) => &team.id,
            Entrant::Bye { id } => id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Entrant::Team(team) => &team.name,
            Entrant::Bye { .. } => BYE_NAME,
        }
    }

    pub fn is_bye(&self) -> bool {
        matches!(self, Entrant::Bye { .. })
    }

    pub fn as_team(&self) -> Option<&Team> {
        match self {
            Entrant::Team(team) => Some(team),
            Entrant::Bye { .. } => None,
        }
    }

    pub fn score(&self) -> Option<u32> {
        self.as_team().and_then(|team| team.score)
    }
}

// ── Matches and rounds ─────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub court: Option<String>,
}

/// Position of a match inside a bracket. Displays as `r{round}-m{match}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MatchId {
    pub round_index: usize,
    pub match_index: usize,
}

impl MatchId {
    pub fn new(round_index: usize, match_index: usize) -> Self {
        MatchId {
            round_index,
            match_index,
        }
    }

    /// Slot this match's winner occupies in the following round.
    pub fn next(&self) -> (MatchId, usize) {
        (
            MatchId::new(self.round_index + 1, self.match_index / 2),
            self.match_index % 2,
        )
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}-m{}", self.round_index, self.match_index)
    }
}

impl FromStr for MatchId {
    type Err = BracketError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let not_found = || BracketError::MatchNotFound(raw.to_string());
        let (round, index) = raw.trim().split_once('-').ok_or_else(not_found)?;
        let round = round
            .strip_prefix('r')
            .and_then(|value| value.parse::<usize>().ok())
            .ok_or_else(not_found)?;
        let index = index
            .strip_prefix('m')
            .and_then(|value| value.parse::<usize>().ok())
            .ok_or_else(not_found)?;
        Ok(MatchId::new(round, index))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchState {
    /// At least one slot still waits on an earlier round.
    Unfilled,
    Ready,
    Decided,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: String,
    pub round_index: usize,
    pub match_index: usize,
    pub teams: [Option<Entrant>; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Schedule>,
}

impl Match {
    pub fn new(round_index: usize, match_index: usize, teams: [Option<Entrant>; 2]) -> Self {
        Match {
            id: MatchId::new(round_index, match_index).to_string(),
            round_index,
            match_index,
            teams,
            winner_index: None,
            schedule: None,
        }
    }

    pub fn match_id(&self) -> MatchId {
        MatchId::new(self.round_index, self.match_index)
    }

    pub fn state(&self) -> MatchState {
        if self.winner_index.is_some() {
            MatchState::Decided
        } else if self.teams.iter().all(Option::is_some) {
            MatchState::Ready
        } else {
            MatchState::Unfilled
        }
    }

    pub fn winner(&self) -> Option<&Entrant> {
        self.winner_index
            .and_then(|index| self.teams.get(index))
            .and_then(Option::as_ref)
    }

    /// Slot with the strictly higher score when both real teams have one.
    /// Preview surfaces use this; recorded winners are always chosen explicitly.
    pub fn leading_index(&self) -> Option<usize> {
        let a = self.teams[0].as_ref()?.score()?;
        let b = self.teams[1].as_ref()?.score()?;
        match a.cmp(&b) {
            std::cmp::Ordering::Greater => Some(0),
            std::cmp::Ordering::Less => Some(1),
            std::cmp::Ordering::Equal => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Round {
    pub index: usize,
    pub name: String,
    pub matches: Vec<Match>,
}

// ── Settings ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BracketType {
    #[default]
    SingleElimination,
    /// Winners bracket only. No losers bracket or grand final is produced.
    DoubleElimination,
    RoundRobin,
}

impl BracketType {
    pub fn is_elimination(&self) -> bool {
        !matches!(self, BracketType::RoundRobin)
    }

    /// Capability flag: whether generation produces a losers bracket and grand final.
    pub fn has_losers_bracket(&self) -> bool {
        false
    }
}

impl FromStr for BracketType {
    type Err = BracketError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "single" | "single-elimination" | "single_elimination" => Ok(BracketType::SingleElimination),
            "double" | "double-elimination" | "double_elimination" => Ok(BracketType::DoubleElimination),
            "round-robin" | "round_robin" | "roundrobin" => Ok(BracketType::RoundRobin),
            other => Err(BracketError::Config(format!("unknown bracket type: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoundRobinMethod {
    /// Rotating-table schedule: n-1 rounds (n even) or n rounds (n odd), every round full.
    #[default]
    Circle,
    /// First-fit distribution. Can need overflow rounds for some team counts.
    Greedy,
}

impl FromStr for RoundRobinMethod {
    type Err = BracketError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "circle" => Ok(RoundRobinMethod::Circle),
            "greedy" => Ok(RoundRobinMethod::Greedy),
            other => Err(BracketError::Config(format!("unknown round robin method: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub title: String,
    pub num_teams: usize,
    pub bracket_type: BracketType,
    pub round_robin_method: RoundRobinMethod,
    pub auto_advance_byes: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            title: DEFAULT_TITLE.to_string(),
            num_teams: DEFAULT_NUM_TEAMS,
            bracket_type: BracketType::SingleElimination,
            round_robin_method: RoundRobinMethod::Circle,
            auto_advance_byes: true,
        }
    }
}

/// Partial settings update. Only `Some` fields are merged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsPatch {
    pub title: Option<String>,
    pub num_teams: Option<usize>,
    pub bracket_type: Option<BracketType>,
    pub round_robin_method: Option<RoundRobinMethod>,
    pub auto_advance_byes: Option<bool>,
}
