//! SQLite-based storage.
//!
//! Provides persistent storage for:
//! - Workout session definitions (stored as JSON)
//! - Execution records (one running, any number paused)
//! - A log of finished runs

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::{data_dir, migrations, ExecutionStore, SessionSource};
use crate::error::{DatabaseError, Result};
use crate::events::timestamp;
use crate::workout::{ExecutionState, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Completed,
    Abandoned,
}

impl Outcome {
    fn as_str(&self) -> &'static str {
        match self {
            Outcome::Completed => "completed",
            Outcome::Abandoned => "abandoned",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub id: i64,
    pub session_id: String,
    pub outcome: Outcome,
    pub actions_done: u64,
    pub actions_total: u64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub name: String,
    pub updated_at: DateTime<Utc>,
}

/// SQLite database for definitions and execution state.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `~/.config/repcue/repcue.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("repcue.db");
        Self::open_at(&path)
    }

    /// Open (or create) a database file at `path`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database (for tests).
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        migrations::migrate(&conn)?;
        Ok(Self { conn })
    }

    /// Insert or replace a session definition.
    ///
    /// # Errors
    /// Returns an error if the session is invalid or the write fails.
    pub fn upsert_session(&self, session: &Session) -> Result<()> {
        session.validate()?;
        let definition = serde_json::to_string(session)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO sessions (id, name, definition, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![session.id, session.name, definition, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, updated_at FROM sessions ORDER BY name, id")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut sessions = Vec::new();
        for row in rows {
            let (id, name, updated_at) = row?;
            sessions.push(SessionSummary {
                id,
                name,
                updated_at: parse_time(&updated_at),
            });
        }
        Ok(sessions)
    }

    /// Delete a session definition. Returns whether a row was removed.
    pub fn delete_session(&self, id: &str) -> Result<bool> {
        let n = self
            .conn
            .execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        Ok(n > 0)
    }

    /// Append a finished run to the workout log. Returns the log row id.
    pub fn append_log(
        &self,
        state: &ExecutionState,
        outcome: Outcome,
        ended_at_ms: u64,
    ) -> Result<i64> {
        let actions_done = state.queue_index.min(state.queue_len) as i64;
        self.conn.execute(
            "INSERT INTO workout_log
                (session_id, outcome, actions_done, actions_total, started_at, ended_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                state.session_id,
                outcome.as_str(),
                actions_done,
                state.queue_len as i64,
                timestamp(state.started_at_epoch_ms).to_rfc3339(),
                timestamp(ended_at_ms).to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent finished runs first.
    pub fn history(&self, limit: usize) -> Result<Vec<OutcomeRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, session_id, outcome, actions_done, actions_total, started_at, ended_at
             FROM workout_log
             ORDER BY ended_at DESC, id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, u64>(3)?,
                row.get::<_, u64>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, session_id, outcome, actions_done, actions_total, started_at, ended_at) = row?;
            records.push(OutcomeRecord {
                id,
                session_id,
                outcome: if outcome == "completed" {
                    Outcome::Completed
                } else {
                    Outcome::Abandoned
                },
                actions_done,
                actions_total,
                started_at: parse_time(&started_at),
                ended_at: parse_time(&ended_at),
            });
        }
        Ok(records)
    }

    fn decode_state(key: &str, json: &str) -> Result<ExecutionState> {
        serde_json::from_str(json).map_err(|e| {
            DatabaseError::CorruptRecord {
                key: key.to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }
}

impl ExecutionStore for Database {
    fn save(&mut self, state: &ExecutionState) -> Result<()> {
        let json = serde_json::to_string(state)?;
        let tx = self.conn.transaction()?;
        if !state.is_paused {
            tx.execute(
                "DELETE FROM executions WHERE is_paused = 0 AND session_id != ?1",
                params![state.session_id],
            )?;
        }
        tx.execute(
            "INSERT OR REPLACE INTO executions (session_id, is_paused, state, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                state.session_id,
                state.is_paused,
                json,
                Utc::now().to_rfc3339()
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn load(&self, session_id: &str) -> Result<Option<ExecutionState>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT state FROM executions WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .optional()?;
        json.map(|j| Self::decode_state(session_id, &j)).transpose()
    }

    fn record_outcome(&mut self, state: &ExecutionState, outcome: Outcome, ended_at_ms: u64) -> Result<()> {
        self.append_log(state, outcome, ended_at_ms).map(|_| ())
    }

    fn remove(&mut self, session_id: &str) -> Result<()> {
        self.conn.execute(
            "DELETE FROM executions WHERE session_id = ?1",
            params![session_id],
        )?;
        Ok(())
    }

    fn active(&self) -> Result<Option<ExecutionState>> {
        let row: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT session_id, state FROM executions WHERE is_paused = 0",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        row.map(|(id, j)| Self::decode_state(&id, &j)).transpose()
    }

    fn paused(&self) -> Result<Vec<ExecutionState>> {
        let mut stmt = self.conn.prepare(
            "SELECT session_id, state FROM executions WHERE is_paused = 1 ORDER BY session_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut states = Vec::new();
        for row in rows {
            let (id, json) = row?;
            states.push(Self::decode_state(&id, &json)?);
        }
        Ok(states)
    }
}

impl SessionSource for Database {
    fn find_session(&self, id: &str) -> Result<Option<Session>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT definition FROM sessions WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        match json {
            Some(j) => serde_json::from_str(&j).map(Some).map_err(|e| {
                DatabaseError::CorruptRecord {
                    key: id.to_string(),
                    message: e.to_string(),
                }
                .into()
            }),
            None => Ok(None),
        }
    }
}

fn parse_time(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workout::{Block, Exercise};

    fn session() -> Session {
        let mut block = Block::new("b1", "Core");
        block.exercises.push(Exercise::timed("e1", "Plank", 30));
        let mut session = Session::new("s1", "Core");
        session.blocks.push(block);
        session
    }

    fn record(id: &str, paused: bool) -> ExecutionState {
        ExecutionState {
            session_id: id.into(),
            queue_index: 1,
            is_paused: paused,
            paused_at_epoch_ms: paused.then_some(2_000),
            timer_remaining_sec: Some(12),
            timer_start_epoch_ms: Some(1_000),
            timer_duration_sec: Some(30),
            started_at_epoch_ms: 500,
            paused_total_ms: 0,
            queue_fingerprint: "abc".into(),
            queue_len: 3,
        }
    }

    #[test]
    fn session_roundtrip() {
        let db = Database::open_memory().unwrap();
        db.upsert_session(&session()).unwrap();
        let loaded = db.find_session("s1").unwrap().unwrap();
        assert_eq!(loaded, session());
        assert_eq!(db.list_sessions().unwrap().len(), 1);
        assert!(db.delete_session("s1").unwrap());
        assert!(db.find_session("s1").unwrap().is_none());
    }

    #[test]
    fn invalid_session_is_not_stored() {
        let db = Database::open_memory().unwrap();
        let mut bad = session();
        bad.blocks[0].repetitions = 0;
        assert!(db.upsert_session(&bad).is_err());
        assert!(db.list_sessions().unwrap().is_empty());
    }

    #[test]
    fn execution_records_roundtrip() {
        let mut db = Database::open_memory().unwrap();
        db.save(&record("s1", false)).unwrap();
        db.save(&record("s2", true)).unwrap();
        assert_eq!(db.active().unwrap().unwrap(), record("s1", false));
        assert_eq!(db.load("s2").unwrap().unwrap(), record("s2", true));
        assert_eq!(db.paused().unwrap().len(), 1);

        db.remove("s1").unwrap();
        assert!(db.active().unwrap().is_none());
        assert!(db.load("s1").unwrap().is_none());
    }

    #[test]
    fn saving_running_record_displaces_previous() {
        let mut db = Database::open_memory().unwrap();
        db.save(&record("s1", false)).unwrap();
        db.save(&record("s2", false)).unwrap();
        assert_eq!(db.active().unwrap().unwrap().session_id, "s2");
        assert!(db.load("s1").unwrap().is_none());
    }

    #[test]
    fn pausing_moves_record_between_collections() {
        let mut db = Database::open_memory().unwrap();
        db.save(&record("s1", false)).unwrap();
        db.save(&record("s1", true)).unwrap();
        assert!(db.active().unwrap().is_none());
        assert_eq!(db.paused().unwrap()[0].session_id, "s1");
    }

    #[test]
    fn history_is_newest_first() {
        let db = Database::open_memory().unwrap();
        let mut state = record("s1", false);
        db.append_log(&state, Outcome::Abandoned, 10_000).unwrap();
        state.queue_index = 3;
        db.append_log(&state, Outcome::Completed, 20_000).unwrap();

        let history = db.history(10).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].outcome, Outcome::Completed);
        assert_eq!(history[0].actions_done, 3);
        assert_eq!(history[1].outcome, Outcome::Abandoned);
        assert_eq!(history[1].actions_done, 1);
    }

    #[test]
    fn store_trait_appends_to_log() {
        let mut db = Database::open_memory().unwrap();
        let state = record("s1", false);
        ExecutionStore::record_outcome(&mut db, &state, Outcome::Completed, 5_000).unwrap();
        assert_eq!(db.history(1).unwrap()[0].session_id, "s1");
    }
}
