//! Error types shared across the DataShed crates.

use chrono::{DateTime, Utc};

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, DatashedError>;

/// All errors the notification service can surface.
#[derive(Debug, thiserror::Error)]
pub enum DatashedError {
    /// Activity or preference store unreachable. Fatal for a whole
    /// notification run: no emails are sent when this is raised.
    #[error("store unavailable: {0}")]
    Store(String),

    /// Mail transport rejected or unreachable. Scoped to a single
    /// recipient; the run continues for everyone else.
    #[error("mail dispatch failed: {0}")]
    Dispatch(String),

    /// Attempt to move a notified-checkpoint backwards.
    #[error("checkpoint rewind: {attempted} is behind {current}")]
    InvalidCheckpoint {
        current: DateTime<Utc>,
        attempted: DateTime<Utc>,
    },

    /// Unknown user id passed to a per-user operation.
    #[error("no such user: {0}")]
    UnknownUser(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DatashedError {
    /// Whether this error aborts the whole run rather than one user.
    pub fn is_fatal_for_run(&self) -> bool {
        matches!(self, DatashedError::Store(_) | DatashedError::Config(_))
    }
}
