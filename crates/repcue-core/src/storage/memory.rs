//! In-process stores, used by tests and embedders without a database.

use std::collections::HashMap;

use super::{ExecutionStore, SessionSource};
use crate::error::Result;
use crate::workout::{ExecutionState, Session};

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    records: HashMap<String, ExecutionState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl ExecutionStore for MemoryStore {
    fn save(&mut self, state: &ExecutionState) -> Result<()> {
        if !state.is_paused {
            self.records
                .retain(|id, r| r.is_paused || *id == state.session_id);
        }
        self.records.insert(state.session_id.clone(), state.clone());
        Ok(())
    }

    fn load(&self, session_id: &str) -> Result<Option<ExecutionState>> {
        Ok(self.records.get(session_id).cloned())
    }

    fn remove(&mut self, session_id: &str) -> Result<()> {
        self.records.remove(session_id);
        Ok(())
    }

    fn active(&self) -> Result<Option<ExecutionState>> {
        Ok(self.records.values().find(|r| !r.is_paused).cloned())
    }

    fn paused(&self) -> Result<Vec<ExecutionState>> {
        let mut paused: Vec<_> = self.records.values().filter(|r| r.is_paused).cloned().collect();
        paused.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        Ok(paused)
    }
}

/// Session definitions held in a map.
#[derive(Debug, Default, Clone)]
pub struct MemorySessions {
    sessions: HashMap<String, Session>,
}

impl MemorySessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, session: Session) {
        self.sessions.insert(session.id.clone(), session);
    }

    pub fn remove(&mut self, id: &str) -> Option<Session> {
        self.sessions.remove(id)
    }
}

impl FromIterator<Session> for MemorySessions {
    fn from_iter<I: IntoIterator<Item = Session>>(iter: I) -> Self {
        let mut sessions = Self::new();
        for session in iter {
            sessions.insert(session);
        }
        sessions
    }
}

impl SessionSource for MemorySessions {
    fn find_session(&self, id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.get(id).cloned())
    }
}
