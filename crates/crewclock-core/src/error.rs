//! Core error types for crewclock-core.
//!
//! Two families matter to callers: [`TransitionError`] values are expected,
//! user-facing outcomes of the session state machine and are never retried
//! internally; everything else is an unexpected failure surfaced whole.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for crewclock-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Precondition violations from the session state machine
    #[error("{0}")]
    Transition(#[from] TransitionError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Expected precondition violations. These are returned to the member who
/// issued the command; the presentation layer decides how to phrase them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// Registration attempted for an id that already exists
    #[error("'{0}' is already registered")]
    AlreadyExists(String),

    /// Check-in attempted for a user that never registered
    #[error("'{0}' is not registered")]
    NotRegistered(String),

    /// Check-in attempted while a timesheet is already open
    #[error("'{0}' is already checked in")]
    AlreadyCheckedIn(String),

    /// Operation requires an open timesheet
    #[error("'{0}' is not checked in")]
    NotCheckedIn(String),

    /// Focus session start attempted while one is already open
    #[error("'{0}' already has an active focus session")]
    FocusSessionAlreadyActive(String),

    /// Operation requires an open focus session
    #[error("'{0}' has no active focus session")]
    NoActiveFocusSession(String),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    Query(#[from] rusqlite::Error),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// An invariant-bearing lookup found more rows than the invariant allows
    #[error("Integrity violation: {0}")]
    Integrity(String),

    /// Conditional close/resolve matched no open row
    #[error("{entity} {id} is not open")]
    NotOpen { entity: &'static str, id: i64 },
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Data directory could not be resolved or created
    #[error("Cannot prepare data directory: {0}")]
    DataDir(#[from] std::io::Error),

    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(DatabaseError::Query(err))
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
