use crate::workout::{Action, Exercise, ExerciseKind};

pub const COMPLETION_TEXT: &str = "Workout complete.";

/// Announcement for entering `action`.
pub fn cue_text(action: &Action) -> String {
    match action {
        Action::Exercise { exercise, .. } => exercise_text(exercise),
        Action::PauseBetweenExercises {
            duration_sec,
            next_exercise,
            ..
        } => format!(
            "Pause for {} before {}. Get ready.",
            seconds(*duration_sec),
            next_exercise.name
        ),
        Action::PauseBetweenRepetitions {
            duration_sec,
            block_repetition,
            total_repetitions,
            next_exercise,
            ..
        } => format!(
            "Well done, pause for {}, then repetition {} of {} starting with {}.",
            seconds(*duration_sec),
            block_repetition,
            total_repetitions,
            next_exercise.name
        ),
        Action::PauseBeforeBlock {
            duration_sec,
            next_block,
            next_exercise,
            ..
        } => format!(
            "Great block, pause for {}, then next block {} starting with {}.",
            seconds(*duration_sec),
            next_block.name,
            next_exercise.name
        ),
    }
}

fn exercise_text(exercise: &Exercise) -> String {
    let member = exercise
        .member
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(|m| format!(" for {m}"))
        .unwrap_or_default();
    match exercise.kind {
        ExerciseKind::Duration => format!(
            "Do {} for {}{}.",
            exercise.name,
            seconds(exercise.value),
            member
        ),
        ExerciseKind::Reps => format!(
            "Do {} {}{}, then confirm completion.",
            exercise.name,
            plural(exercise.value, "time"),
            member
        ),
    }
}

fn seconds(n: u32) -> String {
    plural(n, "second")
}

fn plural(n: u32, unit: &str) -> String {
    if n == 1 {
        format!("{n} {unit}")
    } else {
        format!("{n} {unit}s")
    }
}
