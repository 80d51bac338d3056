//! Queue builder.
//!
//! Flattens a [`Session`] tree into the ordered list of [`Action`]s the
//! player walks through. The result is a pure function of the block and
//! exercise structure, so a run snapshots it once and indexes into it.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::definition::{Block, Exercise, ExerciseKind, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Exercise,
    PauseBetweenExercises,
    PauseBetweenRepetitions,
    PauseBeforeBlock,
}

/// Name and id of the block a `PauseBeforeBlock` leads into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRef {
    pub id: String,
    pub name: String,
}

impl From<&Block> for BlockRef {
    fn from(block: &Block) -> Self {
        Self {
            id: block.id.clone(),
            name: block.name.clone(),
        }
    }
}

/// One step of a flattened workout.
///
/// Pause variants carry the coordinates of the exercise that follows them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Exercise {
        block_index: usize,
        /// 1-indexed.
        block_repetition: u32,
        exercise_index: usize,
        exercise: Exercise,
    },
    PauseBetweenExercises {
        block_index: usize,
        block_repetition: u32,
        exercise_index: usize,
        duration_sec: u32,
        next_exercise: Exercise,
    },
    PauseBetweenRepetitions {
        block_index: usize,
        /// The repetition about to start.
        block_repetition: u32,
        total_repetitions: u32,
        exercise_index: usize,
        duration_sec: u32,
        next_exercise: Exercise,
    },
    PauseBeforeBlock {
        block_index: usize,
        block_repetition: u32,
        exercise_index: usize,
        duration_sec: u32,
        next_block: BlockRef,
        next_exercise: Exercise,
    },
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Exercise { .. } => ActionKind::Exercise,
            Action::PauseBetweenExercises { .. } => ActionKind::PauseBetweenExercises,
            Action::PauseBetweenRepetitions { .. } => ActionKind::PauseBetweenRepetitions,
            Action::PauseBeforeBlock { .. } => ActionKind::PauseBeforeBlock,
        }
    }

    pub fn block_index(&self) -> usize {
        match self {
            Action::Exercise { block_index, .. }
            | Action::PauseBetweenExercises { block_index, .. }
            | Action::PauseBetweenRepetitions { block_index, .. }
            | Action::PauseBeforeBlock { block_index, .. } => *block_index,
        }
    }

    pub fn block_repetition(&self) -> u32 {
        match self {
            Action::Exercise { block_repetition, .. }
            | Action::PauseBetweenExercises { block_repetition, .. }
            | Action::PauseBetweenRepetitions { block_repetition, .. }
            | Action::PauseBeforeBlock { block_repetition, .. } => *block_repetition,
        }
    }

    pub fn exercise_index(&self) -> usize {
        match self {
            Action::Exercise { exercise_index, .. }
            | Action::PauseBetweenExercises { exercise_index, .. }
            | Action::PauseBetweenRepetitions { exercise_index, .. }
            | Action::PauseBeforeBlock { exercise_index, .. } => *exercise_index,
        }
    }

    pub fn is_pause(&self) -> bool {
        !matches!(self, Action::Exercise { .. })
    }

    /// The exercise being performed, or the one a pause leads into.
    pub fn exercise(&self) -> &Exercise {
        match self {
            Action::Exercise { exercise, .. } => exercise,
            Action::PauseBetweenExercises { next_exercise, .. }
            | Action::PauseBetweenRepetitions { next_exercise, .. }
            | Action::PauseBeforeBlock { next_exercise, .. } => next_exercise,
        }
    }

    /// Countdown length in seconds, `None` for rep-based exercises.
    pub fn countdown_sec(&self) -> Option<u32> {
        match self {
            Action::Exercise { exercise, .. } => match exercise.kind {
                ExerciseKind::Duration => Some(exercise.value),
                ExerciseKind::Reps => None,
            },
            Action::PauseBetweenExercises { duration_sec, .. }
            | Action::PauseBetweenRepetitions { duration_sec, .. }
            | Action::PauseBeforeBlock { duration_sec, .. } => Some(*duration_sec),
        }
    }

    /// True for rep-based exercises, the only actions the user completes by hand.
    pub fn awaits_confirmation(&self) -> bool {
        self.countdown_sec().is_none()
    }
}

/// Expand a session into its flat action sequence.
pub fn build_queue(session: &Session) -> Vec<Action> {
    let blocks: Vec<(usize, &Block)> = session
        .blocks
        .iter()
        .enumerate()
        .filter(|(_, b)| !b.is_empty())
        .collect();

    let mut actions = Vec::new();
    for (pos, &(block_index, block)) in blocks.iter().enumerate() {
        let last_exercise = block.exercises.len() - 1;
        for repetition in 1..=block.repetitions {
            for (exercise_index, exercise) in block.exercises.iter().enumerate() {
                actions.push(Action::Exercise {
                    block_index,
                    block_repetition: repetition,
                    exercise_index,
                    exercise: exercise.clone(),
                });
                if exercise_index < last_exercise {
                    actions.push(Action::PauseBetweenExercises {
                        block_index,
                        block_repetition: repetition,
                        exercise_index: exercise_index + 1,
                        duration_sec: block.pause_between_exercises,
                        next_exercise: block.exercises[exercise_index + 1].clone(),
                    });
                }
            }
            if repetition < block.repetitions {
                actions.push(Action::PauseBetweenRepetitions {
                    block_index,
                    block_repetition: repetition + 1,
                    total_repetitions: block.repetitions,
                    exercise_index: 0,
                    duration_sec: block.pause_between_repetitions,
                    next_exercise: block.exercises[0].clone(),
                });
            }
        }
        if let Some(&(next_index, next_block)) = blocks.get(pos + 1) {
            actions.push(Action::PauseBeforeBlock {
                block_index: next_index,
                block_repetition: 1,
                exercise_index: 0,
                duration_sec: block.pause_before_next_block,
                next_block: BlockRef::from(next_block),
                next_exercise: next_block.exercises[0].clone(),
            });
        }
    }
    actions
}

/// Immutable action sequence for one session, with a structural fingerprint.
#[derive(Debug, Clone, Serialize)]
pub struct Queue {
    session_id: String,
    fingerprint: String,
    actions: Vec<Action>,
}

impl Queue {
    pub fn build(session: &Session) -> Self {
        let actions = build_queue(session);
        let fingerprint = fingerprint(&actions);
        Self {
            session_id: session.id.clone(),
            fingerprint,
            actions,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Hex SHA-256 over kinds, coordinates, countdowns and exercise ids.
    ///
    /// Display names are not covered; renaming an exercise keeps paused runs resumable.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn get(&self, index: usize) -> Option<&Action> {
        self.actions.get(index)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Index of the exercise at the given coordinates.
    ///
    /// Pauses share coordinates with the exercise that follows them, so only
    /// `Exercise` actions are considered.
    pub fn position_of(
        &self,
        block_index: usize,
        block_repetition: u32,
        exercise_index: usize,
    ) -> Option<usize> {
        self.actions.iter().position(|a| {
            a.kind() == ActionKind::Exercise
                && a.block_index() == block_index
                && a.block_repetition() == block_repetition
                && a.exercise_index() == exercise_index
        })
    }

    /// Sum of all countdowns in seconds. Rep-based exercises count as zero.
    pub fn total_duration_sec(&self) -> u64 {
        self.actions
            .iter()
            .filter_map(Action::countdown_sec)
            .map(u64::from)
            .sum()
    }

    /// Countdown seconds of the actions before `index`.
    pub fn cumulative_sec(&self, index: usize) -> u64 {
        self.actions
            .iter()
            .take(index)
            .filter_map(Action::countdown_sec)
            .map(u64::from)
            .sum()
    }

    pub fn count(&self, kind: ActionKind) -> usize {
        self.actions.iter().filter(|a| a.kind() == kind).count()
    }
}

fn fingerprint(actions: &[Action]) -> String {
    let mut hasher = Sha256::new();
    for action in actions {
        let line = format!(
            "{:?}|{}|{}|{}|{}|{}\n",
            action.kind(),
            action.block_index(),
            action.block_repetition(),
            action.exercise_index(),
            action.countdown_sec().map(i64::from).unwrap_or(-1),
            action.exercise().id,
        );
        hasher.update(line.as_bytes());
        if let Action::Exercise { exercise, .. } = action {
            hasher.update(exercise.value.to_le_bytes());
        }
    }
    hex::encode(hasher.finalize())
}

/// Memoizes queues per session so repeated lookups share one snapshot.
///
/// An entry is reused only while the session's blocks are unchanged.
#[derive(Debug, Default)]
pub struct QueueCache {
    entries: HashMap<String, (Vec<Block>, Arc<Queue>)>,
}

impl QueueCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_build(&mut self, session: &Session) -> Arc<Queue> {
        if let Some((blocks, queue)) = self.entries.get(&session.id) {
            if *blocks == session.blocks {
                return Arc::clone(queue);
            }
        }
        let queue = Arc::new(Queue::build(session));
        self.entries.insert(
            session.id.clone(),
            (session.blocks.clone(), Arc::clone(&queue)),
        );
        queue
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
