use serde::{Deserialize, Serialize};

use super::queue::{Action, Queue};

/// Where a run begins, in session coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartPosition {
    pub block_index: usize,
    /// 1-indexed.
    pub block_repetition: u32,
    pub exercise_index: usize,
}

impl StartPosition {
    pub fn new(block_index: usize, block_repetition: u32, exercise_index: usize) -> Self {
        Self {
            block_index,
            block_repetition,
            exercise_index,
        }
    }

    pub fn is_beginning(&self) -> bool {
        *self == Self::default()
    }
}

impl Default for StartPosition {
    fn default() -> Self {
        Self::new(0, 1, 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackPhase {
    /// Rep-based exercise waiting for the user to confirm.
    AwaitingCompletion,
    /// A countdown (timed exercise or pause) is live.
    Running,
    Paused,
    Completed,
}

/// Cursor and timer record of one run.
///
/// This is the only mutable playback state. It is plain data so any
/// [`ExecutionStore`](crate::storage::ExecutionStore) can persist it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionState {
    pub session_id: String,
    pub queue_index: usize,
    pub is_paused: bool,
    pub paused_at_epoch_ms: Option<u64>,
    /// Last computed countdown value; refreshed on every tick.
    pub timer_remaining_sec: Option<u32>,
    /// Anchor of the live countdown, shifted forward by resume.
    pub timer_start_epoch_ms: Option<u64>,
    /// Full length of the live countdown.
    #[serde(default)]
    pub timer_duration_sec: Option<u32>,
    pub started_at_epoch_ms: u64,
    /// Time spent paused over the whole run.
    #[serde(default)]
    pub paused_total_ms: u64,
    pub queue_fingerprint: String,
    pub queue_len: usize,
}

impl ExecutionState {
    pub(crate) fn fresh(queue: &Queue, queue_index: usize, now_ms: u64) -> Self {
        Self {
            session_id: queue.session_id().to_string(),
            queue_index,
            is_paused: false,
            paused_at_epoch_ms: None,
            timer_remaining_sec: None,
            timer_start_epoch_ms: None,
            timer_duration_sec: None,
            started_at_epoch_ms: now_ms,
            paused_total_ms: 0,
            queue_fingerprint: queue.fingerprint().to_string(),
            queue_len: queue.len(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.queue_index >= self.queue_len
    }

    pub fn has_timer(&self) -> bool {
        self.timer_start_epoch_ms.is_some()
    }

    pub fn phase(&self) -> PlaybackPhase {
        if self.is_completed() {
            PlaybackPhase::Completed
        } else if self.is_paused {
            PlaybackPhase::Paused
        } else if self.has_timer() {
            PlaybackPhase::Running
        } else {
            PlaybackPhase::AwaitingCompletion
        }
    }

    pub fn current_action<'q>(&self, queue: &'q Queue) -> Option<&'q Action> {
        queue.get(self.queue_index)
    }

    /// True when this record was produced from an identical queue.
    pub fn matches(&self, queue: &Queue) -> bool {
        self.session_id == queue.session_id()
            && self.queue_fingerprint == queue.fingerprint()
            && self.queue_len == queue.len()
    }

    /// Countdown seconds left as of `now_ms`, without mutating the record.
    ///
    /// While paused the value frozen at pause time is returned.
    pub fn remaining_sec_at(&self, now_ms: u64) -> Option<u32> {
        if self.is_paused {
            return self.timer_remaining_sec;
        }
        match (self.timer_start_epoch_ms, self.timer_duration_sec) {
            (Some(start), Some(duration)) => Some(remaining_sec(duration, start, now_ms)),
            _ => self.timer_remaining_sec,
        }
    }

    /// Wall-clock time of the run, excluding pauses.
    pub fn elapsed_ms_at(&self, now_ms: u64) -> u64 {
        let until = self.paused_at_epoch_ms.unwrap_or(now_ms);
        until
            .saturating_sub(self.started_at_epoch_ms)
            .saturating_sub(self.paused_total_ms)
    }
}

/// Seconds left of a `duration_sec` countdown anchored at `start_ms`.
///
/// Always derived from the anchor, never decremented, so missed ticks cannot drift.
pub(crate) fn remaining_sec(duration_sec: u32, start_ms: u64, now_ms: u64) -> u32 {
    let elapsed_sec = now_ms.saturating_sub(start_ms) / 1000;
    u64::from(duration_sec).saturating_sub(elapsed_sec) as u32
}
