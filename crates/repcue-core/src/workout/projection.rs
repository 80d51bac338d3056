//! Read-only view of a run for display.
//!
//! Everything here is recomputed from `(session, queue, state)`; nothing is stored.

use serde::Serialize;

use super::definition::{Block, Exercise, Session};
use super::queue::{Action, Queue};
use super::state::ExecutionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayPhase {
    Exercise,
    BetweenExercises,
    BetweenRepetitions,
    BetweenBlocks,
    Completed,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkoutView {
    pub phase: DisplayPhase,
    pub queue_index: usize,
    pub queue_len: usize,
    pub is_paused: bool,
    pub current_block: Option<Block>,
    pub current_exercise: Option<Exercise>,
    pub next_block: Option<Block>,
    pub next_exercise: Option<Exercise>,
    /// 1-indexed repetition of the current block.
    pub block_repetition: Option<u32>,
    pub remaining_sec: Option<u32>,
    pub elapsed_sec: u64,
    pub progress_pct: f64,
}

pub fn project(session: &Session, queue: &Queue, state: &ExecutionState, now_ms: u64) -> WorkoutView {
    let action = state.current_action(queue);
    let phase = match action {
        None => DisplayPhase::Completed,
        Some(Action::Exercise { .. }) => DisplayPhase::Exercise,
        Some(Action::PauseBetweenExercises { .. }) => DisplayPhase::BetweenExercises,
        Some(Action::PauseBetweenRepetitions { .. }) => DisplayPhase::BetweenRepetitions,
        Some(Action::PauseBeforeBlock { .. }) => DisplayPhase::BetweenBlocks,
    };

    let (current_exercise, next_exercise) = match action {
        Some(Action::Exercise { exercise, .. }) => (
            Some(exercise.clone()),
            following_exercise(queue, state.queue_index),
        ),
        Some(pause) => (None, Some(pause.exercise().clone())),
        None => (None, None),
    };

    // A pause before a block already points at the next block.
    let current_block = match action {
        Some(Action::PauseBeforeBlock { .. }) => state
            .queue_index
            .checked_sub(1)
            .and_then(|i| queue.get(i))
            .and_then(|a| session.blocks.get(a.block_index())),
        Some(a) => session.blocks.get(a.block_index()),
        None => None,
    }
    .cloned();

    let next_block = queue
        .actions()
        .iter()
        .skip(state.queue_index)
        .find_map(|a| match a {
            Action::PauseBeforeBlock { block_index, .. } => session.blocks.get(*block_index),
            _ => None,
        })
        .cloned();

    WorkoutView {
        phase,
        queue_index: state.queue_index,
        queue_len: queue.len(),
        is_paused: state.is_paused,
        current_block,
        current_exercise,
        next_block,
        next_exercise,
        block_repetition: action.map(Action::block_repetition),
        remaining_sec: state.remaining_sec_at(now_ms),
        elapsed_sec: state.elapsed_ms_at(now_ms) / 1000,
        progress_pct: progress_pct(queue, state, now_ms),
    }
}

fn following_exercise(queue: &Queue, index: usize) -> Option<Exercise> {
    queue
        .actions()
        .iter()
        .skip(index + 1)
        .find_map(|a| match a {
            Action::Exercise { exercise, .. } => Some(exercise.clone()),
            _ => None,
        })
}

/// 0.0 .. 100.0, weighted by action count so rep-based exercises still move the bar.
pub fn progress_pct(queue: &Queue, state: &ExecutionState, now_ms: u64) -> f64 {
    if queue.is_empty() || state.is_completed() {
        return 100.0;
    }
    let step = 100.0 / queue.len() as f64;
    let within = match (state.timer_duration_sec, state.remaining_sec_at(now_ms)) {
        (Some(total), Some(left)) if total > 0 => 1.0 - f64::from(left) / f64::from(total),
        _ => 0.0,
    };
    (step * (state.queue_index as f64 + within)).min(100.0)
}
