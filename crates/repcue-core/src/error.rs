//! Core error types for repcue-core.
//!
//! This module defines the error hierarchy using thiserror. Playback
//! rejections live in [`WorkoutError`]; storage and configuration failures
//! have their own enums and are folded into [`CoreError`].

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for repcue-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Playback errors
    #[error("Workout error: {0}")]
    Workout(#[from] WorkoutError),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
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

    /// A stored record could not be decoded
    #[error("Corrupt record for '{key}': {message}")]
    CorruptRecord { key: String, message: String },

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

    /// Unknown dotted key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Could not locate the data directory
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Rejections raised by the playback scheduler.
///
/// None of these leave the execution state modified.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkoutError {
    /// Start coordinates do not name an exercise of the session
    #[error(
        "Invalid start position: block {block_index}, repetition {block_repetition}, exercise {exercise_index}"
    )]
    InvalidStartPosition {
        block_index: usize,
        block_repetition: u32,
        exercise_index: usize,
    },

    /// Another run is already active
    #[error("Workout for session '{session_id}' is already active")]
    AlreadyActive { session_id: String },

    /// No active run to operate on
    #[error("No active workout")]
    NoActiveWorkout,

    /// Resume requested for a run that is not paused
    #[error("Workout is not paused")]
    NotPaused,

    /// Pause requested for a run that is already paused
    #[error("Workout is already paused")]
    AlreadyPaused,

    /// Manual completion requested for an action that does not accept it
    #[error("Action at index {queue_index} cannot be completed manually")]
    NotCompletable { queue_index: usize },

    /// The run already reached the end of its queue
    #[error("Workout already completed")]
    Completed,

    /// No paused record exists for the session
    #[error("No paused workout for session '{session_id}'")]
    PausedWorkoutNotFound { session_id: String },

    /// The stored record no longer matches its session definition
    #[error("Workout record for session '{session_id}' is stale: {reason}")]
    StaleResume { session_id: String, reason: String },

    #[error("Session '{session_id}' not found")]
    SessionNotFound { session_id: String },
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => {
                if e.code == rusqlite::ErrorCode::DatabaseLocked {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
