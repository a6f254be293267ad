//! Data an external synchronizer needs to mirror the bracket into a remote store.
//!
//! The store never performs I/O itself. Every successful mutation appends
//! [`BracketChange`] events to an outbox, and [`match_records`] / [`team_records`]
//! project the whole state into flat rows for a full resync.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::BracketState;
use crate::types::{BracketType, Entrant, Schedule, Settings, Team};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BracketChange {
    /// Destructive: every prior score and winner of the previous bracket is gone.
    #[serde(rename_all = "camelCase")]
    BracketRegenerated {
        bracket_id: u64,
        bracket_type: BracketType,
        team_count: usize,
        round_count: usize,
    },
    #[serde(rename_all = "camelCase")]
    WinnerSet {
        bracket_id: u64,
        match_id: String,
        winner_index: usize,
        team_id: String,
    },
    #[serde(rename_all = "camelCase")]
    WinnerCleared { bracket_id: u64, match_id: String },
    #[serde(rename_all = "camelCase")]
    SlotFilled {
        bracket_id: u64,
        match_id: String,
        slot: usize,
        team_id: String,
    },
    #[serde(rename_all = "camelCase")]
    SlotCleared {
        bracket_id: u64,
        match_id: String,
        slot: usize,
    },
    #[serde(rename_all = "camelCase")]
    ScoreSet {
        bracket_id: u64,
        match_id: String,
        slot: usize,
        team_id: String,
        score: u32,
    },
    #[serde(rename_all = "camelCase")]
    ScheduleSet {
        bracket_id: u64,
        match_id: String,
        schedule: Schedule,
    },
    TeamAdded { team: Team },
    #[serde(rename_all = "camelCase")]
    TeamRemoved { team_id: String },
    TeamUpdated { team: Team },
    SettingsChanged { settings: Settings },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotRecord {
    pub team_id: Option<String>,
    pub bye: bool,
    pub score: Option<u32>,
}

/// Flat persisted shape of one match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    pub bracket_id: u64,
    pub round_index: usize,
    pub round_name: String,
    pub match_id: String,
    pub match_index: usize,
    pub slots: [SlotRecord; 2],
    pub winner_slot: Option<usize>,
    pub start_time: Option<DateTime<Utc>>,
    pub court: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamRecord {
    pub bracket_id: u64,
    pub position: usize,
    pub id: String,
    pub name: String,
    pub logo: Option<String>,
    pub country_code: Option<String>,
    pub roster: Vec<String>,
}

pub fn match_records(state: &BracketState) -> Vec<MatchRecord> {
    state
        .rounds
        .iter()
        .flat_map(|round| {
            round.matches.iter().map(move |m| {
                let schedule = m.schedule.clone().unwrap_or_default();
                MatchRecord {
                    bracket_id: state.bracket_id,
                    round_index: round.index,
                    round_name: round.name.clone(),
                    match_id: m.id.clone(),
                    match_index: m.match_index,
                    slots: [slot_record(m.teams[0].as_ref()), slot_record(m.teams[1].as_ref())],
                    winner_slot: m.winner_index,
                    start_time: schedule.start_time,
                    court: schedule.court,
                }
            })
        })
        .collect()
}

pub fn team_records(state: &BracketState) -> Vec<TeamRecord> {
    state
        .teams
        .iter()
        .enumerate()
        .map(|(position, team)| TeamRecord {
            bracket_id: state.bracket_id,
            position,
            id: team.id.clone(),
            name: team.name.clone(),
            logo: team.logo.clone(),
            country_code: team.country_code.clone(),
            roster: team.roster.clone(),
        })
        .collect()
}

fn slot_record(entrant: Option<&Entrant>) -> SlotRecord {
    match entrant {
        Some(Entrant::Team(team)) => SlotRecord {
            team_id: Some(team.id.clone()),
            bye: false,
            score: team.score,
        },
        Some(Entrant::Bye { .. }) => SlotRecord {
            team_id: None,
            bye: true,
            score: None,
        },
        None => SlotRecord {
            team_id: None,
            bye: false,
            score: None,
        },
    }
}
