//! Integration tests for guided playback.
//!
//! Drives a two-block session through the player with a manual clock and
//! feeds the event stream into a cue emitter, checking what a listener hears.

use std::sync::Arc;

use repcue_core::workout::{Action, Block, Exercise, Session, StartPosition, Transition};
use repcue_core::{Clock, CueEmitter, Event, ManualClock, MemorySink, MemoryStore, PlayerKey, WorkoutPlayer};

const T0: u64 = 1_750_000_000_000;
const CUE_DELAY_MS: u64 = 100;

fn session() -> Session {
    let mut upper = Block::new("upper", "Upper body");
    upper.repetitions = 2;
    upper.pause_between_repetitions = 10;
    upper.pause_between_exercises = 5;
    upper.pause_before_next_block = 20;
    upper.exercises = vec![
        Exercise::reps("pushup", "Push-up", 10),
        Exercise::timed("plank", "Plank", 20),
    ];

    let mut legs = Block::new("legs", "Legs");
    legs.exercises = vec![Exercise::reps("squat", "Squat", 15).with_member("Alex")];

    let mut session = Session::new("full", "Full body");
    session.blocks = vec![upper, legs];
    session
}

struct Harness {
    player: WorkoutPlayer<MemoryStore>,
    clock: ManualClock,
    cues: CueEmitter,
    sink: MemorySink,
}

impl Harness {
    fn new() -> Self {
        let clock = ManualClock::new(T0);
        Self {
            player: WorkoutPlayer::new(MemoryStore::new(), Arc::new(clock.clone())),
            clock,
            cues: CueEmitter::new(CUE_DELAY_MS),
            sink: MemorySink::new(),
        }
    }

    /// Route pending events to the emitter and let due cues play out.
    fn pump(&mut self) -> Vec<Event> {
        let events = self.player.drain_events();
        for event in &events {
            self.cues.handle(event);
        }
        self.clock.advance_ms(CUE_DELAY_MS);
        self.cues.drain(self.clock.now_ms(), &mut self.sink);
        events
    }

    fn wait(&mut self, secs: u64) -> Transition {
        self.clock.advance_secs(secs);
        let transition = self.player.tick().unwrap();
        self.pump();
        transition
    }

    fn confirm(&mut self) {
        assert!(self.player.handle_key(PlayerKey::Confirm).unwrap());
        self.pump();
    }

    fn index(&self) -> usize {
        self.player.active().map(|s| s.queue_index).unwrap_or(usize::MAX)
    }
}

#[test]
fn test_full_session_announces_every_action_once() {
    let mut h = Harness::new();
    h.player.start(&session(), StartPosition::default()).unwrap();
    assert_eq!(h.player.queue().unwrap().len(), 9);
    h.pump();

    h.confirm(); // push-up, round 1
    assert_eq!(h.index(), 1);
    h.wait(5); // pause before plank
    assert_eq!(h.index(), 2);
    // the clock moved by the cue delay since the plank started
    h.wait(20);
    assert_eq!(h.index(), 3);
    h.wait(10); // pause between rounds
    assert_eq!(h.index(), 4);
    h.confirm(); // push-up, round 2
    h.wait(5);
    h.wait(20); // plank, round 2
    assert_eq!(h.index(), 7);
    h.wait(20); // pause before legs
    assert_eq!(h.index(), 8);
    h.confirm(); // squat

    assert!(h.player.active().is_none());
    let heard = h.sink.announced();
    assert_eq!(
        heard,
        vec![
            "Do Push-up 10 times, then confirm completion.",
            "Pause for 5 seconds before Plank. Get ready.",
            "Do Plank for 20 seconds.",
            "Well done, pause for 10 seconds, then repetition 2 of 2 starting with Push-up.",
            "Do Push-up 10 times, then confirm completion.",
            "Pause for 5 seconds before Plank. Get ready.",
            "Do Plank for 20 seconds.",
            "Great block, pause for 20 seconds, then next block Legs starting with Squat.",
            "Do Squat 15 times for Alex, then confirm completion.",
            "Workout complete.",
        ]
    );
    assert_eq!(h.cues.delivered(), 10);
    assert_eq!(h.cues.failed(), 0);
}

#[test]
fn test_repeated_ticks_do_not_repeat_cues() {
    let mut h = Harness::new();
    h.player.start(&session(), StartPosition::new(0, 1, 1)).unwrap();
    h.pump();
    for _ in 0..5 {
        assert_eq!(h.player.tick().unwrap(), Transition::Stayed);
        h.pump();
    }
    assert_eq!(h.sink.announced().len(), 1);

    // replaying the same events is absorbed by the emitter
    h.clock.advance_secs(20);
    h.player.tick().unwrap();
    let events = h.pump();
    for event in &events {
        assert!(!h.cues.handle(event));
    }
    assert_eq!(h.sink.announced().len(), 2);
}

#[test]
fn test_long_suspension_advances_one_step() {
    let mut h = Harness::new();
    h.player.start(&session(), StartPosition::new(0, 1, 1)).unwrap();
    h.pump();

    // host asleep for ten minutes
    h.clock.advance_secs(600);
    assert_eq!(h.player.tick().unwrap(), Transition::Advanced { from: 2, to: 3 });
    assert_eq!(h.player.active().unwrap().timer_remaining_sec, Some(10));
    assert_eq!(h.player.tick().unwrap(), Transition::Stayed);
}

#[test]
fn test_pause_mid_countdown_and_resume() {
    let mut h = Harness::new();
    let sessions = [session()].into_iter().collect::<repcue_core::MemorySessions>();
    h.player.start(&session(), StartPosition::new(0, 1, 1)).unwrap();
    h.pump();

    h.wait(8);
    assert!(h.player.handle_key(PlayerKey::Pause).unwrap());
    let events = h.pump();
    assert!(matches!(events[0], Event::WorkoutPaused { remaining_sec: Some(12), .. }));

    h.clock.advance_secs(300);
    h.player.resume("full", &sessions).unwrap();
    h.pump();

    h.wait(11);
    assert_eq!(h.index(), 2);
    h.wait(1);
    assert_eq!(h.index(), 3);
    assert_eq!(h.sink.announced().len(), 2);
}

#[test]
fn test_start_position_is_reported_in_events() {
    let mut h = Harness::new();
    h.player.start(&session(), StartPosition::new(0, 2, 0)).unwrap();
    let events = h.pump();
    match &events[1] {
        Event::ActionStarted { queue_index, action, .. } => {
            assert_eq!(*queue_index, 4);
            assert!(matches!(action, Action::Exercise { block_repetition: 2, .. }));
        }
        other => panic!("Expected ActionStarted, got {other:?}"),
    }
}

#[test]
fn test_disabled_cues_stay_silent() {
    let mut h = Harness::new();
    let mut config = repcue_core::storage::CueConfig::default();
    config.enabled = false;
    h.cues = CueEmitter::from_config(&config);
    h.player.start(&session(), StartPosition::default()).unwrap();
    h.pump();
    h.confirm();
    assert!(h.sink.announced().is_empty());
}
