//! Workout definitions, the flattened action queue, and playback.

mod definition;
mod engine;
mod player;
mod projection;
mod queue;
mod state;

pub use definition::{Block, Exercise, ExerciseKind, Session};
pub use engine::{resolve_start, Transition};
pub use player::{PlayerKey, WorkoutPlayer};
pub use projection::{progress_pct, project, DisplayPhase, WorkoutView};
pub use queue::{build_queue, Action, ActionKind, BlockRef, Queue, QueueCache};
pub use state::{ExecutionState, PlaybackPhase, StartPosition};
