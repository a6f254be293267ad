use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use tracing::{debug, info};

use crate::error::{BracketError, Result};
use crate::store::BracketState;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
  pub version: u32,
  pub saved_at: DateTime<Utc>,
  pub state: BracketState,
}

/// Write `state` as pretty JSON. Goes through a temp file so a crash never leaves a
/// half-written snapshot behind.
pub fn save_snapshot(path: &Path, state: &BracketState) -> Result<()> {
  if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
    fs::create_dir_all(parent)
      .map_err(|e| BracketError::Config(format!("create snapshot dir {}: {e}", parent.display())))?;
  }
  let snapshot = Snapshot {
    version: SNAPSHOT_VERSION,
    saved_at: Utc::now(),
    state: state.clone(),
  };
  let payload = serde_json::to_string_pretty(&snapshot)?;
  let tmp = path.with_extension("json.tmp");
  fs::write(&tmp, payload)
    .map_err(|e| BracketError::Config(format!("write snapshot {}: {e}", tmp.display())))?;
  fs::rename(&tmp, path)
    .map_err(|e| BracketError::Config(format!("replace snapshot {}: {e}", path.display())))?;
  info!(path = %path.display(), bracket_id = state.bracket_id, "snapshot saved");
  Ok(())
}

/// `Ok(None)` when no snapshot exists yet.
pub fn load_snapshot(path: &Path) -> Result<Option<BracketState>> {
  if !path.is_file() {
    debug!(path = %path.display(), "no snapshot found");
    return Ok(None);
  }
  let data = fs::read_to_string(path)
    .map_err(|e| BracketError::Config(format!("read snapshot {}: {e}", path.display())))?;
  let snapshot = serde_json::from_str::<Snapshot>(&data)
    .map_err(|e| BracketError::Config(format!("parse snapshot {}: {e}", path.display())))?;
  if snapshot.version != SNAPSHOT_VERSION {
    return Err(BracketError::Config(format!(
      "snapshot {} has version {}, expected {SNAPSHOT_VERSION}",
      path.display(),
      snapshot.version
    )));
  }
  info!(
    path = %path.display(),
    bracket_id = snapshot.state.bracket_id,
    saved_at = %snapshot.saved_at,
    "snapshot loaded"
  );
  Ok(Some(snapshot.state))
}
