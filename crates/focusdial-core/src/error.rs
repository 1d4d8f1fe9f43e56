//! Core error types for focusdial-core.
//!
//! Command rejections ([`EngineError`]) are returned synchronously to the
//! caller. Adapter and persistence failures never revert a transition; the
//! engine reports them on its event stream and keeps going.

use std::path::PathBuf;
use thiserror::Error;

use crate::timer::EnginePhase;

/// Core error type for focusdial-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Engine command rejected
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Status mirror or notification failure
    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    /// Persistence collaborator failure
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Commands the engine accepts. Used to describe rejected transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Pause,
    Resume,
    Stop,
    StartBreak,
    EndBreakEarly,
    ConfirmCompletion,
    CancelCompletion,
    Abandon,
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Command::Start => "start",
            Command::Pause => "pause",
            Command::Resume => "resume",
            Command::Stop => "stop",
            Command::StartBreak => "start_break",
            Command::EndBreakEarly => "end_break_early",
            Command::ConfirmCompletion => "confirm_completion",
            Command::CancelCompletion => "cancel_completion",
            Command::Abandon => "abandon",
        };
        f.write_str(name)
    }
}

/// Synchronous command rejections. The engine state is unchanged when one of
/// these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A requested duration was zero or negative
    #[error("Invalid duration: {seconds}s (must be greater than zero)")]
    InvalidDuration { seconds: i64 },

    /// The command has no transition from the current phase
    #[error("Cannot {command} while {phase}")]
    InvalidTransition { command: Command, phase: EnginePhase },
}

/// Best-effort mirror failures. Logged and emitted, never fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// Local notification could not be scheduled or cancelled
    #[error("Notification scheduling failed: {0}")]
    Notification(String),

    /// Live status surface rejected an update
    #[error("Status mirror failed: {0}")]
    StatusMirror(String),
}

impl AdapterError {
    /// Short adapter name used in events and logs.
    pub fn adapter(&self) -> &'static str {
        match self {
            AdapterError::Notification(_) => "notification",
            AdapterError::StatusMirror(_) => "status_mirror",
        }
    }
}

/// Persistence and reward-store failures.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Underlying database failure
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// Store is temporarily unavailable
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Referenced entity does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The reward catalog has nothing to draw from
    #[error("Reward catalog is empty")]
    EmptyCatalog,
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
    QueryFailed(String),

    /// Stored row could not be decoded
    #[error("Corrupt row in {table}: {message}")]
    CorruptRow { table: &'static str, message: String },

    /// Connection mutex poisoned by a panicking holder
    #[error("Database connection poisoned")]
    Poisoned,

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => {
                if e.code == rusqlite::ErrorCode::DatabaseLocked
                    || e.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for PersistenceError {
    fn from(err: rusqlite::Error) -> Self {
        PersistenceError::Database(err.into())
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
