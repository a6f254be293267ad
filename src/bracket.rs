use std::collections::HashSet;

use tracing::{debug, warn};

use crate::error::{BracketError, Result};
use crate::types::{BracketType, Entrant, Match, Round, RoundRobinMethod, Team, MIN_TEAMS};

/// Build the round structure for `teams`. Deterministic and never mutates its input.
pub fn generate(teams: &[Team], bracket_type: BracketType) -> Result<Vec<Round>> {
  generate_with(teams, bracket_type, RoundRobinMethod::default())
}

pub fn generate_with(
  teams: &[Team],
  bracket_type: BracketType,
  method: RoundRobinMethod,
) -> Result<Vec<Round>> {
  match bracket_type {
    BracketType::SingleElimination => single_elimination(teams),
    BracketType::DoubleElimination => double_elimination(teams),
    BracketType::RoundRobin => round_robin(teams, method),
  }
}

pub fn single_elimination(teams: &[Team]) -> Result<Vec<Round>> {
  check_team_count(teams.len())?;
  let entrants = pad_with_byes(teams);
  check_unique_ids(&entrants)?;

  let bracket_size = entrants.len();
  let num_rounds = round_count(teams.len());
  let mut rounds = Vec::with_capacity(num_rounds);

  let first = entrants
    .chunks(2)
    .enumerate()
    .map(|(index, pair)| Match::new(0, index, [pair.first().cloned(), pair.get(1).cloned()]))
    .collect::<Vec<_>>();
  rounds.push(Round {
    index: 0,
    name: round_name(bracket_size, 0),
    matches: first,
  });

  for round in 1..num_rounds {
    let prev_count = rounds[round - 1].matches.len();
    let count = prev_count.div_ceil(2);
    let matches = (0..count).map(|index| Match::new(round, index, [None, None])).collect();
    rounds.push(Round {
      index: round,
      name: round_name(bracket_size >> round, round),
      matches,
    });
  }

  debug!(
    teams = teams.len(),
    bracket_size,
    rounds = rounds.len(),
    "generated single elimination bracket"
  );
  Ok(rounds)
}

/// Winners bracket only: the output is the single elimination bracket for `teams`.
/// `BracketType::has_losers_bracket` reports this limitation to callers.
pub fn double_elimination(teams: &[Team]) -> Result<Vec<Round>> {
  let rounds = single_elimination(teams)?;
  warn!(
    teams = teams.len(),
    "double elimination generates the winners bracket only; no losers bracket or grand final"
  );
  Ok(rounds)
}

pub fn round_robin(teams: &[Team], method: RoundRobinMethod) -> Result<Vec<Round>> {
  check_team_count(teams.len())?;
  let entrants = teams.iter().cloned().map(Entrant::Team).collect::<Vec<_>>();
  check_unique_ids(&entrants)?;

  let schedule = match method {
    RoundRobinMethod::Circle => circle_schedule(teams.len()),
    RoundRobinMethod::Greedy => greedy_schedule(teams.len()),
  };

  let rounds = schedule
    .into_iter()
    .enumerate()
    .map(|(round, pairs)| Round {
      index: round,
      name: format!("Round {}", round + 1),
      matches: pairs
        .into_iter()
        .enumerate()
        .map(|(index, (a, b))| {
          Match::new(round, index, [Some(entrants[a].clone()), Some(entrants[b].clone())])
        })
        .collect(),
    })
    .collect::<Vec<_>>();

  debug!(teams = teams.len(), rounds = rounds.len(), ?method, "generated round robin schedule");
  Ok(rounds)
}

/// Name of an elimination round keyed by how many teams enter it.
/// `round_index` is zero-based and only used by the generic fallback.
pub fn round_name(teams_entering: usize, round_index: usize) -> String {
  match teams_entering {
    2 => "Final".to_string(),
    4 => "Semifinals".to_string(),
    8 => "Quarterfinals".to_string(),
    16 => "Round of 16".to_string(),
    32 => "Round of 32".to_string(),
    _ => format!("Round {}", round_index + 1),
  }
}

/// `ceil(log2(n))` for an elimination bracket of `n` teams.
pub fn round_count(team_count: usize) -> usize {
  next_power_of_two(team_count).trailing_zeros() as usize
}

/// Validate a requested team count that may arrive as an arbitrary number.
pub fn team_count_from(raw: f64) -> Result<usize> {
  if !raw.is_finite() || raw < 0.0 || raw.fract() != 0.0 {
    return Err(BracketError::InvalidBracketSize(format!(
      "team count must be a non-negative integer, got {raw}"
    )));
  }
  let count = raw as usize;
  check_team_count(count)?;
  Ok(count)
}

pub(crate) fn check_team_count(count: usize) -> Result<()> {
  if count < MIN_TEAMS {
    return Err(BracketError::InvalidBracketSize(format!(
      "a bracket needs at least {MIN_TEAMS} teams, got {count}"
    )));
  }
  Ok(())
}

/// Fill the field to the next power of two. Real teams keep their order; the
/// trailing real teams each receive a bye partner so no match is bye against bye.
fn pad_with_byes(teams: &[Team]) -> Vec<Entrant> {
  let bracket_size = next_power_of_two(teams.len());
  let byes = bracket_size - teams.len();
  let full_matches = bracket_size / 2 - byes;

  let mut entrants = Vec::with_capacity(bracket_size);
  let (paired, bye_partners) = teams.split_at(full_matches * 2);
  entrants.extend(paired.iter().cloned().map(Entrant::Team));
  for (number, team) in bye_partners.iter().enumerate() {
    entrants.push(Entrant::Team(team.clone()));
    entrants.push(Entrant::bye(number + 1));
  }
  entrants
}

fn check_unique_ids(entrants: &[Entrant]) -> Result<()> {
  let mut seen = HashSet::new();
  for entrant in entrants {
    if !seen.insert(entrant.id()) {
      return Err(BracketError::DuplicateTeam(entrant.id().to_string()));
    }
  }
  Ok(())
}

fn circle_schedule(team_count: usize) -> Vec<Vec<(usize, usize)>> {
  let mut order = (0..team_count).map(Some).collect::<Vec<_>>();
  if order.len() % 2 == 1 {
    order.push(None);
  }
  let size = order.len();
  let mut rounds = Vec::with_capacity(size - 1);
  for _ in 0..(size - 1) {
    let mut pairs = Vec::with_capacity(size / 2);
    for i in 0..(size / 2) {
      if let (Some(a), Some(b)) = (order[i], order[size - 1 - i]) {
        pairs.push((a.min(b), a.max(b)));
      }
    }
    rounds.push(pairs);
    order[1..].rotate_right(1);
  }
  rounds
}

fn greedy_schedule(team_count: usize) -> Vec<Vec<(usize, usize)>> {
  let mut pending = Vec::with_capacity(team_count * (team_count - 1) / 2);
  for a in 0..team_count {
    for b in (a + 1)..team_count {
      pending.push((a, b));
    }
  }
  let target_rounds = if team_count % 2 == 0 { team_count - 1 } else { team_count };
  let quota = team_count / 2;

  let mut used = vec![false; pending.len()];
  let mut remaining = pending.len();
  let mut rounds = Vec::new();
  while remaining > 0 {
    let mut busy = vec![false; team_count];
    let mut pairs = Vec::with_capacity(quota);
    for (idx, &(a, b)) in pending.iter().enumerate() {
      if pairs.len() >= quota {
        break;
      }
      if used[idx] || busy[a] || busy[b] {
        continue;
      }
      used[idx] = true;
      busy[a] = true;
      busy[b] = true;
      pairs.push((a, b));
    }
    if pairs.is_empty() {
      break;
    }
    remaining -= pairs.len();
    rounds.push(pairs);
  }

  if rounds.len() > target_rounds {
    warn!(
      teams = team_count,
      rounds = rounds.len(),
      target_rounds,
      "greedy round robin needed overflow rounds"
    );
  }
  rounds
}

fn next_power_of_two(n: usize) -> usize {
  let value = n.max(1);
  if value.is_power_of_two() {
    return value;
  }
  value.next_power_of_two()
}
