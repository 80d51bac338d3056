use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workout::{Action, PlaybackPhase};

/// Every state change of a run produces an Event.
/// The host drains them from the player; the cue emitter consumes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    WorkoutStarted {
        session_id: String,
        queue_index: usize,
        queue_len: usize,
        at: DateTime<Utc>,
    },
    /// The cursor entered a new action.
    ActionStarted {
        session_id: String,
        queue_index: usize,
        action: Action,
        at: DateTime<Utc>,
    },
    WorkoutPaused {
        session_id: String,
        queue_index: usize,
        remaining_sec: Option<u32>,
        at: DateTime<Utc>,
    },
    WorkoutResumed {
        session_id: String,
        queue_index: usize,
        remaining_sec: Option<u32>,
        paused_ms: u64,
        at: DateTime<Utc>,
    },
    /// The cursor moved past the last action.
    WorkoutCompleted {
        session_id: String,
        queue_len: usize,
        elapsed_ms: u64,
        at: DateTime<Utc>,
    },
    WorkoutAbandoned {
        session_id: String,
        queue_index: usize,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        session_id: String,
        state: PlaybackPhase,
        queue_index: usize,
        queue_len: usize,
        action: Option<Action>,
        remaining_sec: Option<u32>,
        elapsed_sec: u64,
        progress_pct: f64,
        at: DateTime<Utc>,
    },
}

impl Event {
    pub fn session_id(&self) -> &str {
        match self {
            Event::WorkoutStarted { session_id, .. }
            | Event::ActionStarted { session_id, .. }
            | Event::WorkoutPaused { session_id, .. }
            | Event::WorkoutResumed { session_id, .. }
            | Event::WorkoutCompleted { session_id, .. }
            | Event::WorkoutAbandoned { session_id, .. }
            | Event::StateSnapshot { session_id, .. } => session_id,
        }
    }
}

/// Convert an epoch-millisecond instant into an event timestamp.
pub fn timestamp(epoch_ms: u64) -> DateTime<Utc> {
    i64::try_from(epoch_ms)
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let event = Event::WorkoutAbandoned {
            session_id: "s1".into(),
            queue_index: 3,
            at: timestamp(0),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "WorkoutAbandoned");
        assert_eq!(json["queue_index"], 3);
    }

    #[test]
    fn timestamp_from_epoch_ms() {
        let at = timestamp(1_700_000_000_123);
        assert_eq!(at.timestamp_millis(), 1_700_000_000_123);
    }
}
