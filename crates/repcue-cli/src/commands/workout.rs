use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use clap::Subcommand;
use repcue_core::cue::{CueSink, CueSinkError};
use repcue_core::workout::StartPosition;
use repcue_core::{
    Config, CueEmitter, Database, Event, PlayerKey, SessionSource, SystemClock, TracingSink, WorkoutPlayer,
};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use super::CliResult;

#[derive(Subcommand)]
pub enum WorkoutAction {
    /// Start a session
    Start {
        /// Session ID
        session_id: String,
        /// Block to start in (0-based)
        #[arg(long, default_value = "0")]
        block: usize,
        /// Repetition of that block (1-based)
        #[arg(long, default_value = "1")]
        repetition: u32,
        /// Exercise within the block (0-based)
        #[arg(long, default_value = "0")]
        exercise: usize,
    },
    /// Print the running workout as JSON
    Status {
        /// Print the display view (current and next block/exercise) instead
        #[arg(long)]
        view: bool,
    },
    /// Confirm the current rep-based exercise
    Done,
    /// Skip the current action
    Skip,
    /// Pause the running workout
    Pause,
    /// Resume a paused workout
    Resume {
        /// Session ID
        session_id: String,
    },
    /// Abandon the running workout, or a paused one
    Abandon {
        /// Abandon the paused workout of this session instead
        #[arg(long)]
        paused: Option<String>,
    },
    /// List paused workouts
    Paused,
    /// Play interactively: Enter confirms, "s" skips, "p" pauses or resumes, "q" quits
    Play {
        /// Start this session first; otherwise continue the running workout
        session_id: Option<String>,
        /// Send cues to the log instead of stdout
        #[arg(long)]
        quiet: bool,
    },
}

/// Writes cues as plain lines, to stdout unless given another writer.
struct StdoutSink<W: Write = std::io::Stdout> {
    out: W,
    prefix: &'static str,
}

impl<W: Write> CueSink for StdoutSink<W> {
    fn announce(&mut self, text: &str) -> Result<(), CueSinkError> {
        writeln!(self.out, "{}{text}", self.prefix).map_err(|e| CueSinkError::new("console", e.to_string()))
    }
}

fn open_player(config: &Config) -> CliResult<WorkoutPlayer<Database>> {
    let db = Database::open()?;
    Ok(WorkoutPlayer::new(db, Arc::new(SystemClock)).with_history(config.playback.record_history))
}

/// Deliver the cues for `events` on stderr.
fn announce(events: &[Event], config: &Config) {
    let mut cues = CueEmitter::from_config(&config.cues);
    for event in events {
        cues.handle(event);
    }
    cues.flush(&mut StdoutSink {
        out: std::io::stderr(),
        prefix: "cue: ",
    });
}

/// Print one JSON document: the running state, or the last event when
/// nothing is running.
fn report(player: &WorkoutPlayer<Database>, events: &[Event]) -> CliResult {
    let out = match (player.snapshot(), events.last()) {
        (Some(snapshot), _) => serde_json::to_value(&snapshot)?,
        (None, Some(last)) => serde_json::to_value(last)?,
        (None, None) => json!({ "type": "Idle" }),
    };
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

/// Print the display projection of the running workout.
fn print_view(player: &WorkoutPlayer<Database>) -> CliResult {
    let Some(state) = player.active() else {
        return report(player, &[]);
    };
    let session = player
        .store()
        .find_session(&state.session_id)?
        .ok_or_else(|| format!("session not found: {}", state.session_id))?;
    if let Some(view) = player.view(&session) {
        println!("{}", serde_json::to_string_pretty(&view)?);
    }
    Ok(())
}

pub fn run(action: WorkoutAction) -> CliResult {
    let config = Config::load()?;
    let mut player = open_player(&config)?;

    match action {
        WorkoutAction::Start {
            session_id,
            block,
            repetition,
            exercise,
        } => {
            player.restore_saved()?;
            let position = StartPosition::new(block, repetition, exercise);
            player.start_saved(&session_id, position)?;
        }
        WorkoutAction::Status { view } => {
            player.restore_saved()?;
            player.tick()?;
            if view {
                announce(&player.drain_events(), &config);
                return print_view(&player);
            }
        }
        WorkoutAction::Done => {
            player.restore_saved()?;
            player.tick()?;
            player.complete_current()?;
        }
        WorkoutAction::Skip => {
            player.restore_saved()?;
            player.tick()?;
            player.skip_current()?;
        }
        WorkoutAction::Pause => {
            player.restore_saved()?;
            player.tick()?;
            player.pause()?;
        }
        WorkoutAction::Resume { session_id } => {
            player.restore_saved()?;
            player.resume_saved(&session_id)?;
        }
        WorkoutAction::Abandon { paused } => match paused {
            Some(session_id) => player.abandon_paused(&session_id)?,
            None => player.abandon()?,
        },
        WorkoutAction::Paused => {
            let paused: Vec<_> = player
                .paused()?
                .into_iter()
                .map(|s| {
                    json!({
                        "session_id": s.session_id,
                        "queue_index": s.queue_index,
                        "queue_len": s.queue_len,
                        "remaining_sec": s.timer_remaining_sec,
                        "paused_at": s.paused_at_epoch_ms.map(repcue_core::events::timestamp),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&paused)?);
            return Ok(());
        }
        WorkoutAction::Play { session_id, quiet } => {
            player.restore_saved()?;
            if let Some(id) = session_id {
                player.start_saved(&id, StartPosition::default())?;
            }
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_io()
                .enable_time()
                .build()?;
            let sink: Box<dyn CueSink> = if quiet {
                Box::new(TracingSink::with_voice(config.cues.voice()))
            } else {
                Box::new(StdoutSink {
                    out: std::io::stdout(),
                    prefix: "",
                })
            };
            return runtime.block_on(play(player, sink, &config));
        }
    }

    let events = player.drain_events();
    announce(&events, &config);
    report(&player, &events)
}

/// Interactive loop: ticks on an interval, reads commands from stdin.
///
/// Closing stdin leaves the run stored, running or paused, so it can be
/// picked up later.
async fn play(mut player: WorkoutPlayer<Database>, mut sink: Box<dyn CueSink>, config: &Config) -> CliResult {
    if player.active().is_none() {
        return Err("no running workout; pass a session id to start one".into());
    }

    let mut cues = CueEmitter::from_config(&config.cues);
    let mut ticker = tokio::time::interval(Duration::from_millis(config.playback.tick_interval_ms.max(50)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut shown = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                player.tick()?;
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("stdin closed, leaving workout stored");
                    break;
                };
                let paused = player.active().is_none();
                match line.trim() {
                    "p" | "pause" | "resume" => {
                        player.handle_key(PlayerKey::Pause)?;
                    }
                    "q" | "quit" => match player.last_paused().filter(|_| paused).map(str::to_string) {
                        Some(session_id) => player.abandon_paused(&session_id)?,
                        None => player.abandon()?,
                    },
                    _ if paused => println!("(paused; \"p\" resumes)"),
                    "" | "done" => {
                        if !player.handle_key(PlayerKey::Confirm)? {
                            println!("(countdown running; \"s\" skips)");
                        }
                    }
                    "s" | "skip" => {
                        player.skip_current()?;
                    }
                    other => warn!(input = other, "unknown command"),
                }
            }
        }

        for event in player.drain_events() {
            match &event {
                Event::WorkoutPaused { .. } => println!("paused; \"p\" resumes"),
                Event::WorkoutResumed { .. } => println!("resumed"),
                _ => {}
            }
            cues.handle(&event);
        }
        cues.drain(player.now_ms(), sink.as_mut());

        let Some(state) = player.active() else {
            if player.last_paused().is_some() {
                continue;
            }
            cues.flush(sink.as_mut());
            break;
        };
        let line = (state.queue_index, state.timer_remaining_sec);
        if shown != Some(line) {
            shown = Some(line);
            if let Some(remaining) = state.timer_remaining_sec {
                println!("[{}/{}] {remaining}s", state.queue_index + 1, state.queue_len);
            }
        }
    }
    Ok(())
}
