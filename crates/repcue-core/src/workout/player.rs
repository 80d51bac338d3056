//! Playback scheduler.
//!
//! [`WorkoutPlayer`] is the single owner of execution state. It holds the
//! running [`ExecutionState`] together with the queue snapshot it indexes,
//! persists every change through an [`ExecutionStore`], and publishes each
//! transition as an [`Event`]. Other components only read from it.
//!
//! ## Usage
//!
//! ```ignore
//! let mut player = WorkoutPlayer::new(store, Arc::new(SystemClock));
//! player.start(&session, StartPosition::default())?;
//! // In a loop:
//! player.tick()?;
//! for event in player.drain_events() {
//!     cues.handle(&event);
//! }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use super::definition::Session;
use super::engine::Transition;
use super::projection::{progress_pct, project, WorkoutView};
use super::queue::{Queue, QueueCache};
use super::state::{ExecutionState, StartPosition};
use crate::clock::Clock;
use crate::error::{CoreError, Result, WorkoutError};
use crate::events::{timestamp, Event};
use crate::storage::{ExecutionStore, Outcome, SessionSource};

/// Keyboard input the host forwards to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerKey {
    /// Spacebar: finish the current rep-based exercise.
    Confirm,
    /// Pause the running workout, or resume the one this player paused.
    Pause,
}

struct Run {
    state: ExecutionState,
    queue: Arc<Queue>,
}

pub struct WorkoutPlayer<S: ExecutionStore> {
    store: S,
    clock: Arc<dyn Clock>,
    active: Option<Run>,
    /// Queue snapshots of runs paused by this player, by session id.
    snapshots: HashMap<String, Arc<Queue>>,
    /// Session most recently paused by this player, resumable by key.
    last_paused: Option<String>,
    cache: QueueCache,
    events: Vec<Event>,
    record_history: bool,
}

impl<S: ExecutionStore> WorkoutPlayer<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            active: None,
            snapshots: HashMap::new(),
            last_paused: None,
            cache: QueueCache::new(),
            events: Vec::new(),
            record_history: true,
        }
    }

    /// Toggle appending finished runs to the store's workout log.
    pub fn with_history(mut self, record: bool) -> Self {
        self.record_history = record;
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn active(&self) -> Option<&ExecutionState> {
        self.active.as_ref().map(|r| &r.state)
    }

    pub fn queue(&self) -> Option<&Queue> {
        self.active.as_ref().map(|r| r.queue.as_ref())
    }

    pub fn paused(&self) -> Result<Vec<ExecutionState>> {
        self.store.paused()
    }

    /// Session of the run this player paused last, while it stays paused.
    pub fn last_paused(&self) -> Option<&str> {
        self.last_paused.as_deref()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Take every event published since the last call, oldest first.
    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Build a full state snapshot event for the running workout.
    pub fn snapshot(&self) -> Option<Event> {
        let run = self.active.as_ref()?;
        let now = self.clock.now_ms();
        let state = &run.state;
        Some(Event::StateSnapshot {
            session_id: state.session_id.clone(),
            state: state.phase(),
            queue_index: state.queue_index,
            queue_len: run.queue.len(),
            action: state.current_action(&run.queue).cloned(),
            remaining_sec: state.remaining_sec_at(now),
            elapsed_sec: state.elapsed_ms_at(now) / 1000,
            progress_pct: progress_pct(&run.queue, state, now),
            at: timestamp(now),
        })
    }

    /// Display projection of the running workout against its definition.
    pub fn view(&self, session: &Session) -> Option<WorkoutView> {
        let run = self.active.as_ref()?;
        Some(project(session, &run.queue, &run.state, self.clock.now_ms()))
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Reload the running workout recorded in the store, if any.
    ///
    /// # Errors
    /// `StaleResume` when the recorded run no longer matches its session.
    pub fn restore(&mut self, sessions: &dyn SessionSource) -> Result<Option<&ExecutionState>> {
        if self.active.is_none() {
            if let Some(state) = self.store.active()? {
                let queue = verified_queue(&self.snapshots, &mut self.cache, &state, sessions)?;
                self.active = Some(Run { state, queue });
            }
        }
        Ok(self.active())
    }

    /// Start a run of `session` at `position`.
    ///
    /// An empty session completes immediately and nothing is stored.
    /// Any paused record of the same session is superseded.
    ///
    /// # Errors
    /// `AlreadyActive` while another run is playing or recorded as running,
    /// validation errors for a malformed session, `InvalidStartPosition` for
    /// bad coordinates.
    pub fn start(&mut self, session: &Session, position: StartPosition) -> Result<ExecutionState> {
        if let Some(session_id) = self.running_session()? {
            return Err(WorkoutError::AlreadyActive { session_id }.into());
        }
        session.validate()?;
        let queue = self.cache.get_or_build(session);
        let now = self.clock.now_ms();
        let state = ExecutionState::start(&queue, position, now)?;

        if self.store.load(&session.id)?.is_some() {
            info!(session_id = %session.id, "discarding paused run superseded by new start");
            self.store.remove(&session.id)?;
        }
        self.snapshots.remove(&session.id);
        self.forget_paused(&session.id);

        info!(
            session_id = %session.id,
            queue_index = state.queue_index,
            queue_len = queue.len(),
            "workout started"
        );
        self.events.push(Event::WorkoutStarted {
            session_id: session.id.clone(),
            queue_index: state.queue_index,
            queue_len: queue.len(),
            at: timestamp(now),
        });

        if state.is_completed() {
            self.events.push(Event::WorkoutCompleted {
                session_id: session.id.clone(),
                queue_len: 0,
                elapsed_ms: 0,
                at: timestamp(now),
            });
            return Ok(state);
        }

        self.push_action_started(&state, &queue, state.queue_index, now);
        self.store.save(&state)?;
        self.active = Some(Run {
            state: state.clone(),
            queue,
        });
        Ok(state)
    }

    /// Start a run by session id.
    ///
    /// # Errors
    /// `SessionNotFound`, otherwise as [`WorkoutPlayer::start`].
    pub fn start_by_id(
        &mut self,
        session_id: &str,
        sessions: &dyn SessionSource,
        position: StartPosition,
    ) -> Result<ExecutionState> {
        let session = sessions
            .find_session(session_id)?
            .ok_or_else(|| WorkoutError::SessionNotFound {
                session_id: session_id.to_string(),
            })?;
        self.start(&session, position)
    }

    /// Refresh the countdown; advance when it has run out.
    ///
    /// A no-op without a running workout or while paused.
    pub fn tick(&mut self) -> Result<Transition> {
        let now = self.clock.now_ms();
        let Some(run) = self.active.as_mut() else {
            return Ok(Transition::Stayed);
        };
        let transition = run.state.tick(&run.queue, now);
        self.apply(transition, now)?;
        Ok(transition)
    }

    /// Finish the current rep-based exercise.
    ///
    /// # Errors
    /// `NoActiveWorkout`, or `NotCompletable` for countdown actions.
    pub fn complete_current(&mut self) -> Result<Transition> {
        let now = self.clock.now_ms();
        let run = self.active.as_mut().ok_or(WorkoutError::NoActiveWorkout)?;
        let transition = run.state.complete_current(&run.queue, now)?;
        self.apply(transition, now)?;
        Ok(transition)
    }

    /// End the current action early, whatever its kind.
    ///
    /// # Errors
    /// `NoActiveWorkout` without a running workout.
    pub fn skip_current(&mut self) -> Result<Transition> {
        let now = self.clock.now_ms();
        let run = self.active.as_mut().ok_or(WorkoutError::NoActiveWorkout)?;
        let transition = run.state.skip_current(&run.queue, now)?;
        info!(session_id = %run.state.session_id, "action skipped");
        self.apply(transition, now)?;
        Ok(transition)
    }

    /// Forward a key press. Returns whether it had an effect.
    ///
    /// Pause toggles: with nothing running it resumes the run this player
    /// paused last. Keys that do not apply to the current action are ignored.
    pub fn handle_key(&mut self, key: PlayerKey) -> Result<bool> {
        let outcome = match key {
            PlayerKey::Confirm => self.complete_current().map(|_| ()),
            PlayerKey::Pause if self.active.is_some() => self.pause().map(|_| ()),
            PlayerKey::Pause => self.resume_last_paused().map(|_| ()),
        };
        match outcome {
            Ok(()) => Ok(true),
            Err(CoreError::Workout(
                WorkoutError::NoActiveWorkout
                | WorkoutError::NotCompletable { .. }
                | WorkoutError::AlreadyPaused
                | WorkoutError::PausedWorkoutNotFound { .. }
                | WorkoutError::Completed,
            )) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Move the running workout into the paused collection.
    ///
    /// # Errors
    /// `NoActiveWorkout` without a running workout.
    pub fn pause(&mut self) -> Result<ExecutionState> {
        let now = self.clock.now_ms();
        let mut run = self.active.take().ok_or(WorkoutError::NoActiveWorkout)?;
        let playing = run.state.clone();
        let paused = run.state.pause(now).map_err(CoreError::from).and_then(|()| self.store.save(&run.state));
        if let Err(e) = paused {
            run.state = playing;
            self.active = Some(run);
            return Err(e);
        }

        info!(session_id = %run.state.session_id, queue_index = run.state.queue_index, "workout paused");
        self.events.push(Event::WorkoutPaused {
            session_id: run.state.session_id.clone(),
            queue_index: run.state.queue_index,
            remaining_sec: run.state.timer_remaining_sec,
            at: timestamp(now),
        });
        let state = run.state.clone();
        self.last_paused = Some(run.state.session_id.clone());
        self.snapshots.insert(run.state.session_id, run.queue);
        Ok(state)
    }

    /// Reinstate a paused workout as the running one.
    ///
    /// The queue snapshot taken at pause time is reused when this player
    /// paused the run; otherwise the queue is rebuilt from `sessions` and must
    /// match the record exactly.
    ///
    /// # Errors
    /// `AlreadyActive`/`NotPaused` when a run is playing,
    /// `PausedWorkoutNotFound`, or `StaleResume` when the record is orphaned.
    /// A stale record is left in the store for the caller to remove.
    pub fn resume(&mut self, session_id: &str, sessions: &dyn SessionSource) -> Result<ExecutionState> {
        let state = self.paused_record(session_id)?;
        let queue = verified_queue(&self.snapshots, &mut self.cache, &state, sessions)?;
        self.reinstate(state, queue)
    }

    /// Discard the running workout.
    ///
    /// A running record left in the store is discarded even when it was never
    /// restored, so records gone stale can still be cleared.
    ///
    /// # Errors
    /// `NoActiveWorkout` without a running workout.
    pub fn abandon(&mut self) -> Result<()> {
        let state = match self.active.take() {
            Some(run) => run.state,
            None => self.store.active()?.ok_or(WorkoutError::NoActiveWorkout)?,
        };
        self.snapshots.remove(&state.session_id);
        self.forget_paused(&state.session_id);
        self.discard(state, Outcome::Abandoned)
    }

    /// Discard a paused workout, including stale ones.
    ///
    /// # Errors
    /// `PausedWorkoutNotFound` when no paused record exists.
    pub fn abandon_paused(&mut self, session_id: &str) -> Result<()> {
        let state = self
            .store
            .load(session_id)?
            .filter(|s| s.is_paused)
            .ok_or_else(|| WorkoutError::PausedWorkoutNotFound {
                session_id: session_id.to_string(),
            })?;
        self.snapshots.remove(session_id);
        self.forget_paused(session_id);
        self.discard(state, Outcome::Abandoned)
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Session of the run playing here, or recorded as running in the store.
    fn running_session(&self) -> Result<Option<String>> {
        if let Some(run) = &self.active {
            return Ok(Some(run.state.session_id.clone()));
        }
        Ok(self.store.active()?.map(|s| s.session_id))
    }

    fn forget_paused(&mut self, session_id: &str) {
        if self.last_paused.as_deref() == Some(session_id) {
            self.last_paused = None;
        }
    }

    fn paused_record(&self, session_id: &str) -> Result<ExecutionState> {
        if let Some(running) = self.running_session()? {
            return Err(if running == session_id {
                WorkoutError::NotPaused
            } else {
                WorkoutError::AlreadyActive { session_id: running }
            }
            .into());
        }
        self.store
            .load(session_id)?
            .filter(|s| s.is_paused)
            .ok_or_else(|| {
                WorkoutError::PausedWorkoutNotFound {
                    session_id: session_id.to_string(),
                }
                .into()
            })
    }

    /// Resume the run this player paused last from its own queue snapshot.
    fn resume_last_paused(&mut self) -> Result<ExecutionState> {
        let session_id = self.last_paused.clone().ok_or(WorkoutError::NoActiveWorkout)?;
        let state = match self.paused_record(&session_id) {
            Err(e @ CoreError::Workout(WorkoutError::PausedWorkoutNotFound { .. })) => {
                self.last_paused = None;
                return Err(e);
            }
            record => record?,
        };
        let queue = match self.snapshots.get(&session_id) {
            Some(snapshot) if state.matches(snapshot) => Arc::clone(snapshot),
            _ => {
                return Err(WorkoutError::StaleResume {
                    session_id,
                    reason: "paused record no longer matches its queue".to_string(),
                }
                .into())
            }
        };
        self.reinstate(state, queue)
    }

    fn reinstate(&mut self, mut state: ExecutionState, queue: Arc<Queue>) -> Result<ExecutionState> {
        let now = self.clock.now_ms();
        let paused_ms = state
            .paused_at_epoch_ms
            .map(|at| now.saturating_sub(at))
            .unwrap_or(0);
        state.resume(now)?;
        self.store.save(&state)?;
        self.snapshots.remove(&state.session_id);
        self.forget_paused(&state.session_id);

        info!(session_id = %state.session_id, paused_ms, "workout resumed");
        self.events.push(Event::WorkoutResumed {
            session_id: state.session_id.clone(),
            queue_index: state.queue_index,
            remaining_sec: state.remaining_sec_at(now),
            paused_ms,
            at: timestamp(now),
        });
        self.active = Some(Run {
            state: state.clone(),
            queue,
        });
        Ok(state)
    }

    /// Publish and persist the effect of a transform on the running workout.
    fn apply(&mut self, transition: Transition, now: u64) -> Result<()> {
        let Some(run) = self.active.take() else {
            return Ok(());
        };
        match transition {
            Transition::Stayed => {
                self.active = Some(run);
            }
            Transition::Advanced { from, to } => {
                for index in from + 1..=to {
                    self.push_action_started(&run.state, &run.queue, index, now);
                }
                let saved = self.store.save(&run.state);
                self.active = Some(run);
                saved?;
            }
            Transition::Completed { from } => {
                for index in from + 1..run.queue.len() {
                    self.push_action_started(&run.state, &run.queue, index, now);
                }
                let elapsed_ms = run.state.elapsed_ms_at(now);
                info!(session_id = %run.state.session_id, elapsed_ms, "workout completed");
                self.events.push(Event::WorkoutCompleted {
                    session_id: run.state.session_id.clone(),
                    queue_len: run.queue.len(),
                    elapsed_ms,
                    at: timestamp(now),
                });
                if let Err(e) = self.store.remove(&run.state.session_id) {
                    warn!(session_id = %run.state.session_id, error = %e, "failed to clear completed run");
                }
                self.log_outcome(&run.state, Outcome::Completed, now);
            }
        }
        Ok(())
    }

    fn discard(&mut self, state: ExecutionState, outcome: Outcome) -> Result<()> {
        let now = self.clock.now_ms();
        self.store.remove(&state.session_id)?;
        info!(session_id = %state.session_id, queue_index = state.queue_index, "workout abandoned");
        self.events.push(Event::WorkoutAbandoned {
            session_id: state.session_id.clone(),
            queue_index: state.queue_index,
            at: timestamp(now),
        });
        self.log_outcome(&state, outcome, now);
        Ok(())
    }

    fn log_outcome(&mut self, state: &ExecutionState, outcome: Outcome, now: u64) {
        if !self.record_history {
            return;
        }
        if let Err(e) = self.store.record_outcome(state, outcome, now) {
            warn!(session_id = %state.session_id, error = %e, "failed to record workout outcome");
        }
    }

    fn push_action_started(&mut self, state: &ExecutionState, queue: &Queue, index: usize, now: u64) {
        if let Some(action) = queue.get(index) {
            self.events.push(Event::ActionStarted {
                session_id: state.session_id.clone(),
                queue_index: index,
                action: action.clone(),
                at: timestamp(now),
            });
        }
    }
}

/// Stores that also hold the session definitions, such as [`crate::storage::Database`].
impl<S: ExecutionStore + SessionSource> WorkoutPlayer<S> {
    /// [`WorkoutPlayer::restore`] against the store's own definitions.
    pub fn restore_saved(&mut self) -> Result<Option<&ExecutionState>> {
        if self.active.is_none() {
            if let Some(state) = self.store.active()? {
                let queue = verified_queue(&self.snapshots, &mut self.cache, &state, &self.store)?;
                self.active = Some(Run { state, queue });
            }
        }
        Ok(self.active())
    }

    /// [`WorkoutPlayer::start_by_id`] against the store's own definitions.
    pub fn start_saved(&mut self, session_id: &str, position: StartPosition) -> Result<ExecutionState> {
        let session = self
            .store
            .find_session(session_id)?
            .ok_or_else(|| WorkoutError::SessionNotFound {
                session_id: session_id.to_string(),
            })?;
        self.start(&session, position)
    }

    /// [`WorkoutPlayer::resume`] against the store's own definitions.
    pub fn resume_saved(&mut self, session_id: &str) -> Result<ExecutionState> {
        let state = self.paused_record(session_id)?;
        let queue = verified_queue(&self.snapshots, &mut self.cache, &state, &self.store)?;
        self.reinstate(state, queue)
    }
}

/// Queue for `state`: the in-process snapshot if it still matches, otherwise
/// rebuilt from the current definition and checked against the record.
fn verified_queue(
    snapshots: &HashMap<String, Arc<Queue>>,
    cache: &mut QueueCache,
    state: &ExecutionState,
    sessions: &dyn SessionSource,
) -> Result<Arc<Queue>> {
    if let Some(snapshot) = snapshots.get(&state.session_id) {
        if state.matches(snapshot) {
            return Ok(Arc::clone(snapshot));
        }
    }
    let stale = |reason: &str| WorkoutError::StaleResume {
        session_id: state.session_id.clone(),
        reason: reason.to_string(),
    };
    let session = sessions
        .find_session(&state.session_id)?
        .ok_or_else(|| stale("session no longer exists"))?;
    let queue = cache.get_or_build(&session);
    if !state.matches(&queue) || state.queue_index > queue.len() {
        warn!(session_id = %state.session_id, "execution record does not match session definition");
        return Err(stale("session definition changed since the run started").into());
    }
    Ok(queue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::{MemorySessions, MemoryStore};
    use crate::workout::{Block, Exercise};

    const T0: u64 = 1_700_000_000_000;

    fn core() -> Session {
        let mut block = Block::new("b1", "Core");
        block.pause_between_exercises = 5;
        block.exercises = vec![
            Exercise::timed("e1", "Plank", 30),
            Exercise::reps("e2", "Crunch", 15),
        ];
        let mut session = Session::new("core", "Core");
        session.blocks.push(block);
        session
    }

    fn player() -> (WorkoutPlayer<MemoryStore>, ManualClock) {
        let clock = ManualClock::new(T0);
        let player = WorkoutPlayer::new(MemoryStore::new(), Arc::new(clock.clone()));
        (player, clock)
    }

    #[test]
    fn start_persists_active_record_and_publishes() {
        let (mut player, _clock) = player();
        player.start(&core(), StartPosition::default()).unwrap();
        assert_eq!(player.store().active().unwrap().unwrap().session_id, "core");
        let events = player.drain_events();
        assert!(matches!(events[0], Event::WorkoutStarted { queue_len: 3, .. }));
        assert!(matches!(events[1], Event::ActionStarted { queue_index: 0, .. }));
        assert!(player.drain_events().is_empty());
    }

    #[test]
    fn second_start_is_rejected() {
        let (mut player, _clock) = player();
        player.start(&core(), StartPosition::default()).unwrap();
        let err = player.start(&core(), StartPosition::default()).unwrap_err();
        assert!(matches!(err, CoreError::Workout(WorkoutError::AlreadyActive { .. })));
    }

    #[test]
    fn start_is_rejected_while_store_holds_a_running_record() {
        let (mut player, clock) = player();
        player.start(&core(), StartPosition::default()).unwrap();

        let mut other = core();
        other.id = "other".into();
        let mut restarted = WorkoutPlayer::new(player.into_store(), Arc::new(clock));
        let err = restarted.start(&other, StartPosition::default()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Workout(WorkoutError::AlreadyActive { ref session_id }) if session_id == "core"
        ));
        assert!(restarted.store().load("core").unwrap().is_some());
        assert!(restarted.drain_events().is_empty());
    }

    #[test]
    fn resume_is_rejected_while_store_holds_a_running_record() {
        let (mut player, clock) = player();
        let mut other = core();
        other.id = "other".into();
        player.start(&other, StartPosition::default()).unwrap();
        player.pause().unwrap();
        player.start(&core(), StartPosition::default()).unwrap();

        let sessions: MemorySessions = [core(), other].into_iter().collect();
        let mut restarted = WorkoutPlayer::new(player.into_store(), Arc::new(clock));
        let err = restarted.resume("other", &sessions).unwrap_err();
        assert!(matches!(err, CoreError::Workout(WorkoutError::AlreadyActive { .. })));
        assert!(restarted.store().active().unwrap().is_some());
        assert!(restarted.store().load("other").unwrap().unwrap().is_paused);
    }

    #[test]
    fn empty_session_completes_without_storing() {
        let (mut player, _clock) = player();
        let state = player.start(&Session::new("empty", "Empty"), StartPosition::default()).unwrap();
        assert!(state.is_completed());
        assert!(player.active().is_none());
        assert!(player.store().is_empty());
        let events = player.drain_events();
        assert!(matches!(events.last(), Some(Event::WorkoutCompleted { .. })));
    }

    #[test]
    fn tick_drives_through_countdowns() {
        let (mut player, clock) = player();
        player.start(&core(), StartPosition::default()).unwrap();
        player.drain_events();

        clock.advance_secs(30);
        assert_eq!(player.tick().unwrap(), Transition::Advanced { from: 0, to: 1 });
        clock.advance_secs(5);
        player.tick().unwrap();
        assert_eq!(player.active().unwrap().queue_index, 2);
        assert!(player.tick().unwrap() == Transition::Stayed);

        assert!(player.handle_key(PlayerKey::Confirm).unwrap());
        assert!(player.active().is_none());
        assert!(player.store().load("core").unwrap().is_none());
        let events = player.drain_events();
        assert!(matches!(events.last(), Some(Event::WorkoutCompleted { queue_len: 3, .. })));
    }

    /// Store whose `remove` always fails; keeps the logged outcomes.
    #[derive(Default)]
    struct StickyStore {
        inner: MemoryStore,
        outcomes: Vec<Outcome>,
    }

    impl ExecutionStore for StickyStore {
        fn save(&mut self, state: &ExecutionState) -> Result<()> {
            self.inner.save(state)
        }
        fn load(&self, session_id: &str) -> Result<Option<ExecutionState>> {
            self.inner.load(session_id)
        }
        fn remove(&mut self, _session_id: &str) -> Result<()> {
            Err(crate::error::DatabaseError::QueryFailed("disk I/O error".into()).into())
        }
        fn active(&self) -> Result<Option<ExecutionState>> {
            self.inner.active()
        }
        fn paused(&self) -> Result<Vec<ExecutionState>> {
            self.inner.paused()
        }
        fn record_outcome(&mut self, _state: &ExecutionState, outcome: Outcome, _ended_at_ms: u64) -> Result<()> {
            self.outcomes.push(outcome);
            Ok(())
        }
    }

    #[test]
    fn completion_is_logged_when_clearing_the_record_fails() {
        let clock = ManualClock::new(T0);
        let mut player = WorkoutPlayer::new(StickyStore::default(), Arc::new(clock.clone()));
        player.start(&core(), StartPosition::default()).unwrap();
        clock.advance_secs(30);
        player.tick().unwrap();
        clock.advance_secs(5);
        player.tick().unwrap();

        assert!(player.handle_key(PlayerKey::Confirm).unwrap());
        assert!(player.active().is_none());
        assert_eq!(player.store().outcomes, vec![Outcome::Completed]);
        let events = player.drain_events();
        assert!(matches!(events.last(), Some(Event::WorkoutCompleted { .. })));
    }

    #[test]
    fn confirm_is_ignored_during_countdown_and_pause() {
        let (mut player, _clock) = player();
        player.start(&core(), StartPosition::default()).unwrap();
        assert!(!player.handle_key(PlayerKey::Confirm).unwrap());
        assert_eq!(player.active().unwrap().queue_index, 0);

        assert!(player.handle_key(PlayerKey::Pause).unwrap());
        assert!(!player.handle_key(PlayerKey::Confirm).unwrap());
    }

    #[test]
    fn pause_key_toggles() {
        let (mut player, clock) = player();
        player.start(&core(), StartPosition::default()).unwrap();
        clock.advance_secs(10);

        assert!(player.handle_key(PlayerKey::Pause).unwrap());
        assert!(player.active().is_none());
        assert_eq!(player.last_paused(), Some("core"));

        clock.advance_secs(60);
        assert!(player.handle_key(PlayerKey::Pause).unwrap());
        let state = player.active().unwrap();
        assert!(!state.is_paused);
        assert_eq!(state.timer_remaining_sec, Some(20));
        assert!(player.last_paused().is_none());
        assert!(player.paused().unwrap().is_empty());

        let events = player.drain_events();
        assert!(matches!(events[events.len() - 2], Event::WorkoutPaused { .. }));
        assert!(matches!(events[events.len() - 1], Event::WorkoutResumed { paused_ms: 60_000, .. }));
    }

    #[test]
    fn pause_key_without_paused_run_is_ignored() {
        let (mut player, _clock) = player();
        assert!(!player.handle_key(PlayerKey::Pause).unwrap());

        player.start(&core(), StartPosition::default()).unwrap();
        player.pause().unwrap();
        player.abandon_paused("core").unwrap();
        assert!(!player.handle_key(PlayerKey::Pause).unwrap());

        // paused record removed behind the player's back
        player.start(&core(), StartPosition::default()).unwrap();
        player.pause().unwrap();
        player.store_mut().remove("core").unwrap();
        assert!(!player.handle_key(PlayerKey::Pause).unwrap());
        assert!(player.last_paused().is_none());
    }

    #[test]
    fn pause_and_resume_keep_remaining_time() {
        let (mut player, clock) = player();
        let sessions: MemorySessions = [core()].into_iter().collect();
        player.start(&core(), StartPosition::default()).unwrap();

        clock.advance_secs(10);
        player.tick().unwrap();
        let paused = player.pause().unwrap();
        assert_eq!(paused.timer_remaining_sec, Some(20));
        assert!(player.active().is_none());
        assert_eq!(player.paused().unwrap().len(), 1);

        clock.advance_secs(600);
        let resumed = player.resume("core", &sessions).unwrap();
        assert_eq!(resumed.timer_remaining_sec, Some(20));
        player.tick().unwrap();
        assert_eq!(player.active().unwrap().timer_remaining_sec, Some(20));
        assert!(player.paused().unwrap().is_empty());
    }

    #[test]
    fn resume_uses_snapshot_even_if_session_was_edited() {
        let (mut player, _clock) = player();
        player.start(&core(), StartPosition::default()).unwrap();
        player.pause().unwrap();

        let mut edited = core();
        edited.blocks[0].exercises.push(Exercise::reps("e3", "Sit-up", 10));
        let sessions: MemorySessions = [edited].into_iter().collect();

        player.resume("core", &sessions).unwrap();
        assert_eq!(player.queue().unwrap().len(), 3);
    }

    #[test]
    fn resume_after_restart_detects_stale_definition() {
        let (mut player, clock) = player();
        player.start(&core(), StartPosition::default()).unwrap();
        player.pause().unwrap();
        let store = player.into_store();

        let mut edited = core();
        edited.blocks[0].exercises[0].value = 45;
        let sessions: MemorySessions = [edited].into_iter().collect();

        let mut restarted = WorkoutPlayer::new(store, Arc::new(clock));
        let err = restarted.resume("core", &sessions).unwrap_err();
        assert!(matches!(err, CoreError::Workout(WorkoutError::StaleResume { .. })));
        assert!(restarted.store().load("core").unwrap().is_some());

        restarted.abandon_paused("core").unwrap();
        assert!(restarted.store().load("core").unwrap().is_none());
    }

    #[test]
    fn resume_of_deleted_session_fails_closed() {
        let (mut player, clock) = player();
        player.start(&core(), StartPosition::default()).unwrap();
        player.pause().unwrap();
        let mut restarted = WorkoutPlayer::new(player.into_store(), Arc::new(clock));
        let err = restarted.resume("core", &MemorySessions::new()).unwrap_err();
        assert!(err.to_string().contains("no longer exists"));
        assert!(restarted.active().is_none());
    }

    #[test]
    fn restore_reloads_running_workout() {
        let (mut player, clock) = player();
        player.start(&core(), StartPosition::default()).unwrap();
        let sessions: MemorySessions = [core()].into_iter().collect();

        let mut restarted = WorkoutPlayer::new(player.into_store(), Arc::new(clock.clone()));
        assert!(restarted.restore(&sessions).unwrap().is_some());
        clock.advance_secs(12);
        restarted.tick().unwrap();
        assert_eq!(restarted.active().unwrap().timer_remaining_sec, Some(18));
    }

    #[test]
    fn abandon_removes_everything() {
        let (mut player, clock) = player();
        player.start(&core(), StartPosition::default()).unwrap();
        clock.advance_secs(3);
        player.tick().unwrap();
        player.abandon().unwrap();
        assert!(player.active().is_none());
        assert!(player.store().load("core").unwrap().is_none());
        assert_eq!(player.tick().unwrap(), Transition::Stayed);
        assert!(matches!(
            player.abandon().unwrap_err(),
            CoreError::Workout(WorkoutError::NoActiveWorkout)
        ));
    }

    #[test]
    fn abandon_clears_stale_running_record() {
        let (mut player, clock) = player();
        player.start(&core(), StartPosition::default()).unwrap();
        let mut restarted = WorkoutPlayer::new(player.into_store(), Arc::new(clock));
        assert!(restarted.restore(&MemorySessions::new()).is_err());
        restarted.abandon().unwrap();
        assert!(restarted.store().is_empty());
    }

    #[test]
    fn new_start_supersedes_paused_record() {
        let (mut player, _clock) = player();
        player.start(&core(), StartPosition::default()).unwrap();
        player.pause().unwrap();
        player.start(&core(), StartPosition::new(0, 1, 1)).unwrap();
        assert!(player.paused().unwrap().is_empty());
        assert_eq!(player.active().unwrap().queue_index, 2);
    }

    #[test]
    fn view_follows_the_run() {
        let (mut player, clock) = player();
        assert!(player.view(&core()).is_none());
        player.start(&core(), StartPosition::default()).unwrap();
        clock.advance_secs(30);
        player.tick().unwrap();
        let view = player.view(&core()).unwrap();
        assert_eq!(view.queue_index, 1);
        assert_eq!(view.next_exercise.unwrap().name, "Crunch");
    }

    #[test]
    fn snapshot_reports_progress() {
        let (mut player, clock) = player();
        player.start(&core(), StartPosition::default()).unwrap();
        clock.advance_secs(15);
        match player.snapshot().unwrap() {
            Event::StateSnapshot {
                remaining_sec,
                elapsed_sec,
                progress_pct,
                ..
            } => {
                assert_eq!(remaining_sec, Some(15));
                assert_eq!(elapsed_sec, 15);
                assert!((progress_pct - 100.0 / 6.0).abs() < 1e-9);
            }
            other => panic!("Expected StateSnapshot, got {other:?}"),
        }
    }
}
