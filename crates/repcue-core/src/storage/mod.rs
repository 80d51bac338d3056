mod config;
pub mod database;
mod memory;
pub mod migrations;

pub use config::{Config, CueConfig, PlaybackConfig, VoiceSettings};
pub use database::{Database, Outcome, OutcomeRecord, SessionSummary};
pub use memory::{MemorySessions, MemoryStore};

use std::path::PathBuf;

use crate::error::{ConfigError, Result};
use crate::workout::{ExecutionState, Session};

/// Key-value persistence for execution records, keyed by session id.
///
/// A record with `is_paused == false` is the active run; there is at most
/// one. Paused records are kept one per session.
pub trait ExecutionStore {
    /// Insert or replace the record for `state.session_id`.
    ///
    /// Saving a running record displaces any other running record.
    fn save(&mut self, state: &ExecutionState) -> Result<()>;

    /// The record for `session_id`, running or paused.
    fn load(&self, session_id: &str) -> Result<Option<ExecutionState>>;

    /// Delete the record for `session_id`. Missing records are not an error.
    fn remove(&mut self, session_id: &str) -> Result<()>;

    /// The running record, if any.
    fn active(&self) -> Result<Option<ExecutionState>>;

    /// Every paused record.
    fn paused(&self) -> Result<Vec<ExecutionState>>;

    /// Append a finished run to the workout log, where the store keeps one.
    fn record_outcome(&mut self, _state: &ExecutionState, _outcome: Outcome, _ended_at_ms: u64) -> Result<()> {
        Ok(())
    }
}

/// Read-only access to workout definitions.
pub trait SessionSource {
    fn find_session(&self, id: &str) -> Result<Option<Session>>;
}

/// Returns `~/.config/repcue[-dev]/` based on REPCUE_ENV.
///
/// Set REPCUE_ENV=dev to use the development data directory, or
/// REPCUE_HOME to point somewhere else entirely.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("REPCUE_HOME") {
        Some(home) => PathBuf::from(home),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("REPCUE_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("repcue-dev")
            } else {
                base_dir.join("repcue")
            }
        }
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
