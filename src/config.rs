use serde::{Deserialize, Serialize};
use std::{
  env, fs,
  path::{Path, PathBuf},
};

use crate::bracket::team_count_from;
use crate::error::{BracketError, Result};
use crate::types::{BracketType, RoundRobinMethod, Settings};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
  pub settings: Settings,
  pub snapshot_path: String,
  pub logs_dir: String,
}

impl Default for AppConfig {
  fn default() -> Self {
    AppConfig {
      settings: Settings::default(),
      snapshot_path: "data/bracket.json".to_string(),
      logs_dir: "logs".to_string(),
    }
  }
}

pub fn repo_root() -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

pub fn resolve_repo_path(raw: &str) -> PathBuf {
  let path = PathBuf::from(raw);
  if path.is_absolute() {
    path
  } else {
    repo_root().join(path)
  }
}

pub fn config_path() -> PathBuf {
  match env_default("BRACKET_CONFIG_PATH") {
    Some(raw) => resolve_repo_path(&raw),
    None => repo_root().join("config.json"),
  }
}

pub fn env_default(key: &str) -> Option<String> {
  env::var(key)
    .ok()
    .map(|value| value.trim().to_string())
    .filter(|value| !value.is_empty())
}

pub fn flag_true(raw: &str) -> bool {
  let value = raw.trim().to_ascii_lowercase();
  matches!(value.as_str(), "1" | "true" | "yes" | "on")
}

/// Layer `BRACKET_*` environment variables over the file config.
pub fn apply_env_overrides(config: AppConfig) -> Result<AppConfig> {
  apply_overrides(config, env_default)
}

fn apply_overrides<F>(mut config: AppConfig, lookup: F) -> Result<AppConfig>
where
  F: Fn(&str) -> Option<String>,
{
  if let Some(value) = lookup("BRACKET_TITLE") {
    config.settings.title = value;
  }
  if let Some(value) = lookup("BRACKET_NUM_TEAMS") {
    let raw = value
      .parse::<f64>()
      .map_err(|e| BracketError::Config(format!("BRACKET_NUM_TEAMS={value}: {e}")))?;
    config.settings.num_teams = team_count_from(raw)?;
  }
  if let Some(value) = lookup("BRACKET_TYPE") {
    config.settings.bracket_type = value.parse::<BracketType>()?;
  }
  if let Some(value) = lookup("BRACKET_ROUND_ROBIN_METHOD") {
    config.settings.round_robin_method = value.parse::<RoundRobinMethod>()?;
  }
  if let Some(value) = lookup("BRACKET_AUTO_ADVANCE_BYES") {
    config.settings.auto_advance_byes = flag_true(&value);
  }
  if let Some(value) = lookup("BRACKET_SNAPSHOT_PATH") {
    config.snapshot_path = value;
  }
  if let Some(value) = lookup("BRACKET_LOGS_DIR") {
    config.logs_dir = value;
  }
  Ok(config)
}

pub fn load_config() -> Result<AppConfig> {
  let path = config_path();
  if let Err(e) = write_default_config(&path) {
    tracing::warn!("could not write default config: {e}");
  }
  let config = load_config_from(&path)?;
  apply_env_overrides(config)
}

/// Seed `path` with the default config so operators have a file to edit.
/// Returns false when a config already exists.
pub fn write_default_config(path: &Path) -> Result<bool> {
  if path.exists() {
    return Ok(false);
  }
  save_config(path, &AppConfig::default())?;
  tracing::info!("wrote default config to {}", path.display());
  Ok(true)
}

/// Read a config file without environment overrides. A missing file yields defaults.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
  if !path.is_file() {
    return Ok(AppConfig::default());
  }
  let data = fs::read_to_string(path)
    .map_err(|e| BracketError::Config(format!("read config {}: {e}", path.display())))?;
  let config = serde_json::from_str::<AppConfig>(&data)
    .map_err(|e| BracketError::Config(format!("parse config {}: {e}", path.display())))?;
  if config.settings.num_teams < crate::types::MIN_TEAMS {
    return Err(BracketError::InvalidBracketSize(format!(
      "config {} asks for {} teams",
      path.display(),
      config.settings.num_teams
    )));
  }
  Ok(config)
}

pub fn save_config(path: &Path, config: &AppConfig) -> Result<()> {
  let payload = serde_json::to_string_pretty(config)?;
  fs::write(path, payload)
    .map_err(|e| BracketError::Config(format!("write config {}: {e}", path.display())))?;
  Ok(())
}

/// Load `.env` from the crate root without overriding variables already set.
pub fn load_env_file() {
  let env_path = repo_root().join(".env");
  if !env_path.is_file() {
    return;
  }
  let contents = match fs::read_to_string(&env_path) {
    Ok(data) => data,
    Err(_) => return,
  };
  for line in contents.lines() {
    if let Some((key, value)) = parse_env_line(line) {
      if env::var_os(&key).is_none() {
        env::set_var(key, value);
      }
    }
  }
}

pub fn parse_env_line(line: &str) -> Option<(String, String)> {
  let trimmed = line.trim();
  if trimmed.is_empty() || trimmed.starts_with('#') {
    return None;
  }
  let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
  let (key, raw_value) = trimmed.split_once('=')?;
  let key = key.trim();
  if key.is_empty() {
    return None;
  }
  let mut value = raw_value.trim();
  if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
    value = &value[1..value.len() - 1];
  } else if value.starts_with('\'') && value.ends_with('\'') && value.len() >= 2 {
    value = &value[1..value.len() - 1];
  } else if let Some(idx) = value.find('#') {
    value = value[..idx].trim_end();
  }
  Some((key.to_string(), value.to_string()))
}

pub fn log_config_warnings(config: &AppConfig) {
  if config.settings.bracket_type == BracketType::DoubleElimination {
    tracing::warn!("double elimination is configured; only the winners bracket will be generated");
  }
  if !config.settings.bracket_type.is_elimination()
    && config.settings.round_robin_method == RoundRobinMethod::Greedy
  {
    tracing::warn!("greedy round robin can need more rounds than the circle method");
  }
}
