//! Playback transforms.
//!
//! The engine is a wall-clock-based state machine over [`ExecutionState`].
//! It does not use internal threads - the caller passes `now` (epoch ms)
//! and is responsible for calling `tick()` periodically.
//!
//! ## State Transitions
//!
//! ```text
//! AwaitingCompletion --complete--> next action
//! Running --countdown reaches 0--> next action
//! (AwaitingCompletion | Running) <--pause/resume--> Paused
//! last action --advance--> Completed
//! ```
//!
//! Countdowns are anchored to `timer_start_epoch_ms` and recomputed from the
//! original duration on every tick, so repeated or missed ticks never drift.

use tracing::debug;

use super::queue::Queue;
use super::state::{remaining_sec, ExecutionState, StartPosition};
use crate::error::WorkoutError;

/// Result of a transform that may move the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Cursor unchanged.
    Stayed,
    /// Cursor moved forward; every index in `from+1..=to` was entered.
    Advanced { from: usize, to: usize },
    /// Cursor moved past the last action.
    Completed { from: usize },
}

impl Transition {
    pub fn moved(&self) -> bool {
        !matches!(self, Transition::Stayed)
    }

    fn then(self, next: Transition) -> Transition {
        match (self, next) {
            (Transition::Stayed, n) => n,
            (s, Transition::Stayed) => s,
            (Transition::Advanced { from, .. }, Transition::Advanced { to, .. }) => {
                Transition::Advanced { from, to }
            }
            (Transition::Advanced { from, .. }, Transition::Completed { .. })
            | (Transition::Completed { from }, _) => Transition::Completed { from },
        }
    }
}

/// Resolve a start position to a queue index.
///
/// # Errors
/// `InvalidStartPosition` when the coordinates do not name an exercise.
pub fn resolve_start(queue: &Queue, position: StartPosition) -> Result<usize, WorkoutError> {
    if position.is_beginning() {
        return Ok(0);
    }
    queue
        .position_of(
            position.block_index,
            position.block_repetition,
            position.exercise_index,
        )
        .ok_or(WorkoutError::InvalidStartPosition {
            block_index: position.block_index,
            block_repetition: position.block_repetition,
            exercise_index: position.exercise_index,
        })
}

impl ExecutionState {
    /// Begin a run at `position`. An empty queue yields a completed state.
    ///
    /// # Errors
    /// `InvalidStartPosition` when the coordinates do not name an exercise.
    pub fn start(
        queue: &Queue,
        position: StartPosition,
        now_ms: u64,
    ) -> Result<Self, WorkoutError> {
        let index = resolve_start(queue, position)?;
        Self::start_at_index(queue, index, now_ms)
    }

    /// Begin a run at a raw queue index.
    ///
    /// # Errors
    /// `InvalidStartPosition` when `index` is past the end of a non-empty queue.
    pub fn start_at_index(queue: &Queue, index: usize, now_ms: u64) -> Result<Self, WorkoutError> {
        if index > 0 && index >= queue.len() {
            let action = queue.actions().last();
            return Err(WorkoutError::InvalidStartPosition {
                block_index: action.map(|a| a.block_index()).unwrap_or(0),
                block_repetition: action.map(|a| a.block_repetition()).unwrap_or(1),
                exercise_index: index,
            });
        }
        let mut state = Self::fresh(queue, index, now_ms);
        state.arm(queue, now_ms);
        Ok(state)
    }

    /// Refresh the countdown and advance when it has run out.
    ///
    /// Calling this again with the same `now_ms` is a no-op: the next action's
    /// countdown is anchored at `now_ms` and therefore shows its full duration.
    /// Zero-length countdowns are passed through in the same call.
    pub fn tick(&mut self, queue: &Queue, now_ms: u64) -> Transition {
        let mut transition = Transition::Stayed;
        loop {
            if self.is_paused || self.is_completed() {
                return transition;
            }
            let (Some(start), Some(duration)) = (self.timer_start_epoch_ms, self.timer_duration_sec)
            else {
                return transition;
            };
            let remaining = remaining_sec(duration, start, now_ms);
            self.timer_remaining_sec = Some(remaining);
            if remaining > 0 {
                return transition;
            }
            transition = transition.then(self.advance(queue, now_ms));
        }
    }

    /// Move to the next action and arm its countdown.
    pub fn advance(&mut self, queue: &Queue, now_ms: u64) -> Transition {
        if self.is_completed() {
            return Transition::Stayed;
        }
        let from = self.queue_index;
        self.clear_timer();
        self.queue_index += 1;
        if self.queue_index >= queue.len() {
            self.queue_index = queue.len();
            debug!(session_id = %self.session_id, from, "queue exhausted");
            return Transition::Completed { from };
        }
        self.arm(queue, now_ms);
        debug!(session_id = %self.session_id, from, to = self.queue_index, "advanced");
        Transition::Advanced {
            from,
            to: self.queue_index,
        }
    }

    /// Finish the current rep-based exercise.
    ///
    /// # Errors
    /// Rejected while paused, after completion, or on any countdown action.
    pub fn complete_current(&mut self, queue: &Queue, now_ms: u64) -> Result<Transition, WorkoutError> {
        self.ensure_playing()?;
        let awaits = self
            .current_action(queue)
            .map(|a| a.awaits_confirmation())
            .unwrap_or(false);
        if !awaits {
            return Err(WorkoutError::NotCompletable {
                queue_index: self.queue_index,
            });
        }
        Ok(self.advance(queue, now_ms))
    }

    /// End the current action early, whatever its kind.
    ///
    /// # Errors
    /// Rejected while paused or after completion.
    pub fn skip_current(&mut self, queue: &Queue, now_ms: u64) -> Result<Transition, WorkoutError> {
        self.ensure_playing()?;
        Ok(self.advance(queue, now_ms))
    }

    /// Freeze the run. The countdown value at `now_ms` is kept as-is.
    ///
    /// # Errors
    /// `AlreadyPaused` or `Completed`.
    pub fn pause(&mut self, now_ms: u64) -> Result<(), WorkoutError> {
        self.ensure_playing()?;
        if let (Some(start), Some(duration)) = (self.timer_start_epoch_ms, self.timer_duration_sec) {
            self.timer_remaining_sec = Some(remaining_sec(duration, start, now_ms));
        }
        self.is_paused = true;
        self.paused_at_epoch_ms = Some(now_ms);
        Ok(())
    }

    /// Unfreeze the run. Time spent paused does not count against the countdown.
    ///
    /// # Errors
    /// `NotPaused` when the run is playing.
    pub fn resume(&mut self, now_ms: u64) -> Result<(), WorkoutError> {
        if !self.is_paused {
            return Err(WorkoutError::NotPaused);
        }
        let paused_for = self
            .paused_at_epoch_ms
            .map(|at| now_ms.saturating_sub(at))
            .unwrap_or(0);
        if let Some(start) = self.timer_start_epoch_ms {
            self.timer_start_epoch_ms = Some(start.saturating_add(paused_for));
        }
        self.paused_total_ms = self.paused_total_ms.saturating_add(paused_for);
        self.is_paused = false;
        self.paused_at_epoch_ms = None;
        Ok(())
    }

    fn ensure_playing(&self) -> Result<(), WorkoutError> {
        if self.is_completed() {
            return Err(WorkoutError::Completed);
        }
        if self.is_paused {
            return Err(WorkoutError::AlreadyPaused);
        }
        Ok(())
    }

    fn arm(&mut self, queue: &Queue, now_ms: u64) {
        if let Some(duration) = self.current_action(queue).and_then(|a| a.countdown_sec()) {
            self.timer_start_epoch_ms = Some(now_ms);
            self.timer_remaining_sec = Some(duration);
            self.timer_duration_sec = Some(duration);
        }
    }

    fn clear_timer(&mut self) {
        self.timer_start_epoch_ms = None;
        self.timer_remaining_sec = None;
        self.timer_duration_sec = None;
    }
}
