//! Error taxonomy for bounty operations

use thiserror::Error;

/// Errors surfaced by store, ledger and award operations.
#[derive(Debug, Error)]
pub enum BountyError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Ledger transfer failed: {0}")]
    Ledger(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl BountyError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        BountyError::NotFound(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        BountyError::InvalidState(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        BountyError::Unauthorized(msg.into())
    }
}

impl From<rusqlite::Error> for BountyError {
    fn from(e: rusqlite::Error) -> Self {
        BountyError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for BountyError {
    fn from(e: serde_json::Error) -> Self {
        BountyError::Database(format!("metadata encoding: {}", e))
    }
}

pub type Result<T, E = BountyError> = std::result::Result<T, E>;
