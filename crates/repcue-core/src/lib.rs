//! # Repcue Core Library
//!
//! This library provides the execution engine for guided workouts. It follows
//! the same CLI-first approach as the rest of the project: every operation is
//! available through the standalone `repcue` binary, which is a thin layer
//! over this crate.
//!
//! ## Architecture
//!
//! - **Workout**: Session definitions are flattened into an immutable queue of
//!   exercises and pauses. A wall-clock-anchored state machine walks the queue
//!   and requires the caller to periodically invoke `tick()`
//! - **Cues**: Spoken announcements derived from transitions, delivered exactly
//!   once per action through a pluggable sink
//! - **Storage**: SQLite persistence for definitions and execution records,
//!   TOML-based configuration
//!
//! ## Key Components
//!
//! - [`WorkoutPlayer`]: Single owner of the running workout
//! - [`Queue`]: Flattened, fingerprinted action sequence
//! - [`CueEmitter`]: Deduplicating cue scheduler
//! - [`Database`]: Definition and execution persistence
//! - [`Config`]: Application configuration management

pub mod clock;
pub mod cue;
pub mod error;
pub mod events;
pub mod storage;
pub mod workout;

pub use clock::{Clock, ManualClock, SystemClock};
pub use cue::{CueEmitter, CueKey, CueKind, CueSink, MemorySink, NullSink, TracingSink};
pub use error::{ConfigError, CoreError, DatabaseError, ValidationError, WorkoutError};
pub use events::Event;
pub use storage::{Config, Database, ExecutionStore, MemorySessions, MemoryStore, SessionSource};
pub use workout::{
    Action, ActionKind, Block, ExecutionState, Exercise, ExerciseKind, PlaybackPhase, PlayerKey,
    Queue, Session, StartPosition, Transition, WorkoutPlayer,
};
