//! Exactly-once cue delivery.
//!
//! Each action instance is identified by a [`CueKey`]. The emitter keeps a
//! table of keys it has already queued, so observing the same state any
//! number of times yields one announcement. Queued cues are delivered in
//! FIFO order once their due time passes; a later cue never overtakes an
//! earlier one.

use std::collections::{HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::sink::CueSink;
use super::text::{cue_text, COMPLETION_TEXT};
use crate::events::Event;
use crate::storage::CueConfig;
use crate::workout::{Action, ActionKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CueKind {
    Exercise,
    PauseBetweenExercises,
    PauseBetweenRepetitions,
    PauseBeforeBlock,
    Completed,
}

impl From<ActionKind> for CueKind {
    fn from(kind: ActionKind) -> Self {
        match kind {
            ActionKind::Exercise => CueKind::Exercise,
            ActionKind::PauseBetweenExercises => CueKind::PauseBetweenExercises,
            ActionKind::PauseBetweenRepetitions => CueKind::PauseBetweenRepetitions,
            ActionKind::PauseBeforeBlock => CueKind::PauseBeforeBlock,
        }
    }
}

/// Identity of one announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CueKey {
    pub kind: CueKind,
    pub block_index: usize,
    pub block_repetition: u32,
    pub exercise_index: usize,
    pub queue_index: usize,
}

impl CueKey {
    pub fn for_action(queue_index: usize, action: &Action) -> Self {
        Self {
            kind: action.kind().into(),
            block_index: action.block_index(),
            block_repetition: action.block_repetition(),
            exercise_index: action.exercise_index(),
            queue_index,
        }
    }

    /// The terminal cue sits one past the last action.
    pub fn completion(queue_len: usize) -> Self {
        Self {
            kind: CueKind::Completed,
            block_index: 0,
            block_repetition: 0,
            exercise_index: 0,
            queue_index: queue_len,
        }
    }
}

/// Cue text for `action` unless its identity equals `previous`.
pub fn cue_for(previous: Option<&CueKey>, queue_index: usize, action: &Action) -> Option<String> {
    let key = CueKey::for_action(queue_index, action);
    if previous == Some(&key) {
        return None;
    }
    Some(cue_text(action))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCue {
    pub key: CueKey,
    pub text: String,
    pub due_at_ms: u64,
}

#[derive(Debug, Default)]
pub struct CueEmitter {
    enabled: bool,
    delay_ms: u64,
    emitted: HashSet<CueKey>,
    last: Option<CueKey>,
    pending: VecDeque<PendingCue>,
    delivered: u64,
    failed: u64,
}

impl CueEmitter {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            enabled: true,
            delay_ms,
            ..Self::default()
        }
    }

    pub fn from_config(config: &CueConfig) -> Self {
        Self {
            enabled: config.enabled,
            delay_ms: config.delay_ms,
            ..Self::default()
        }
    }

    pub fn last_key(&self) -> Option<&CueKey> {
        self.last.as_ref()
    }

    pub fn pending(&self) -> impl Iterator<Item = &PendingCue> {
        self.pending.iter()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    pub fn failed(&self) -> u64 {
        self.failed
    }

    /// Queue the cue for entering `action`. Returns false if already seen.
    pub fn observe(&mut self, queue_index: usize, action: &Action, now_ms: u64) -> bool {
        let key = CueKey::for_action(queue_index, action);
        if self.emitted.contains(&key) {
            return false;
        }
        match cue_for(self.last.as_ref(), queue_index, action) {
            Some(text) => self.enqueue(key, text, now_ms),
            None => false,
        }
    }

    /// Queue the terminal cue. Fires once per run.
    pub fn observe_completion(&mut self, queue_len: usize, now_ms: u64) -> bool {
        let key = CueKey::completion(queue_len);
        if self.emitted.iter().any(|k| k.kind == CueKind::Completed) {
            return false;
        }
        self.enqueue(key, COMPLETION_TEXT.to_string(), now_ms)
    }

    /// Consume one event from the player's stream.
    pub fn handle(&mut self, event: &Event) -> bool {
        match event {
            Event::ActionStarted {
                queue_index,
                action,
                at,
                ..
            } => self.observe(*queue_index, action, epoch_ms(at)),
            Event::WorkoutCompleted { queue_len, at, .. } => {
                self.observe_completion(*queue_len, epoch_ms(at))
            }
            _ => false,
        }
    }

    /// Deliver every cue due at `now_ms`, in order. Returns how many were delivered.
    pub fn drain(&mut self, now_ms: u64, sink: &mut dyn CueSink) -> usize {
        let mut count = 0;
        while self
            .pending
            .front()
            .is_some_and(|cue| cue.due_at_ms <= now_ms)
        {
            if let Some(cue) = self.pending.pop_front() {
                self.deliver(&cue, sink);
                count += 1;
            }
        }
        count
    }

    /// Deliver everything still pending regardless of due time.
    pub fn flush(&mut self, sink: &mut dyn CueSink) -> usize {
        let mut count = 0;
        while let Some(cue) = self.pending.pop_front() {
            self.deliver(&cue, sink);
            count += 1;
        }
        count
    }

    /// Forget all keys and drop pending cues, for a new run.
    pub fn reset(&mut self) {
        self.emitted.clear();
        self.pending.clear();
        self.last = None;
    }

    fn enqueue(&mut self, key: CueKey, text: String, now_ms: u64) -> bool {
        if !self.emitted.insert(key) {
            return false;
        }
        self.last = Some(key);
        if !self.enabled {
            return true;
        }
        let floor = self.pending.back().map(|c| c.due_at_ms).unwrap_or(0);
        let due_at_ms = now_ms.saturating_add(self.delay_ms).max(floor);
        debug!(queue_index = key.queue_index, due_at_ms, "cue queued");
        self.pending.push_back(PendingCue {
            key,
            text,
            due_at_ms,
        });
        true
    }

    fn deliver(&mut self, cue: &PendingCue, sink: &mut dyn CueSink) {
        match sink.announce(&cue.text) {
            Ok(()) => self.delivered += 1,
            Err(e) => {
                self.failed += 1;
                warn!(queue_index = cue.key.queue_index, error = %e, "cue delivery failed");
            }
        }
    }
}

fn epoch_ms(at: &chrono::DateTime<chrono::Utc>) -> u64 {
    u64::try_from(at.timestamp_millis()).unwrap_or(0)
}
