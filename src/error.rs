//! Error types for bracket generation and state updates.

use thiserror::Error;

/// Result type alias for bracket operations
pub type Result<T> = std::result::Result<T, BracketError>;

#[derive(Error, Debug)]
pub enum BracketError {
    /// Team count below two, or a requested size that is negative or fractional
    #[error("invalid bracket size: {0}")]
    InvalidBracketSize(String),

    #[error("match {0} not found")]
    MatchNotFound(String),

    /// Slot index outside {0, 1}, or a slot that cannot take the requested action
    #[error("invalid slot {slot} in match {match_id}: {reason}")]
    InvalidSlot {
        match_id: String,
        slot: usize,
        reason: String,
    },

    #[error("team {0} not found")]
    TeamNotFound(String),

    #[error("team {0} already exists")]
    DuplicateTeam(String),

    /// Team id collides with the ids generated for byes
    #[error("team id {0} is reserved for byes")]
    ReservedTeamId(String),

    /// Internal invariant violation while carrying a winner forward. Indicates a logic bug.
    #[error("inconsistent propagation: {0}")]
    InconsistentPropagation(String),

    #[error("bracket store lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BracketError {
    pub(crate) fn invalid_slot(match_id: &str, slot: usize, reason: impl Into<String>) -> Self {
        BracketError::InvalidSlot {
            match_id: match_id.to_string(),
            slot,
            reason: reason.into(),
        }
    }
}
