use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseKind {
    /// `value` is a repetition count; the user confirms completion.
    Reps,
    /// `value` is a duration in seconds; a countdown ends the exercise.
    Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    pub id: String,
    pub name: String,
    pub kind: ExerciseKind,
    pub value: u32,
    /// Limb or side the exercise targets ("left leg", "each side").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member: Option<String>,
}

impl Exercise {
    pub fn reps(id: impl Into<String>, name: impl Into<String>, count: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: ExerciseKind::Reps,
            value: count,
            member: None,
        }
    }

    pub fn timed(id: impl Into<String>, name: impl Into<String>, secs: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: ExerciseKind::Duration,
            value: secs,
            member: None,
        }
    }

    pub fn with_member(mut self, member: impl Into<String>) -> Self {
        self.member = Some(member.into());
        self
    }

    pub fn is_timed(&self) -> bool {
        self.kind == ExerciseKind::Duration
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: String,
    pub name: String,
    #[serde(default = "default_repetitions")]
    pub repetitions: u32,
    /// Seconds of rest between two repetitions of this block.
    #[serde(default)]
    pub pause_between_repetitions: u32,
    /// Seconds of rest between two exercises of one repetition.
    #[serde(default)]
    pub pause_between_exercises: u32,
    /// Seconds of rest after this block, before the next one starts.
    #[serde(default)]
    pub pause_before_next_block: u32,
    #[serde(default)]
    pub exercises: Vec<Exercise>,
}

fn default_repetitions() -> u32 {
    1
}

impl Block {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            repetitions: 1,
            pause_between_repetitions: 0,
            pause_between_exercises: 0,
            pause_before_next_block: 0,
            exercises: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.exercises.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub blocks: Vec<Block>,
    /// Planned duration in minutes, informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_min: Option<u32>,
    /// Epoch milliseconds.
    #[serde(default)]
    pub created_at: i64,
    /// Epoch milliseconds.
    #[serde(default)]
    pub updated_at: i64,
}

impl Session {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            blocks: Vec::new(),
            duration_min: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    /// True when no block holds an exercise; such a session plays as already completed.
    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(Block::is_empty)
    }

    pub fn exercise_count(&self) -> usize {
        self.blocks.iter().map(|b| b.exercises.len()).sum()
    }

    /// Check the structural rules the queue builder relies on.
    ///
    /// # Errors
    /// Returns the first offending field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(invalid("session.id", "must not be empty"));
        }
        for (bi, block) in self.blocks.iter().enumerate() {
            if block.id.trim().is_empty() {
                return Err(invalid(&format!("blocks[{bi}].id"), "must not be empty"));
            }
            if block.repetitions == 0 {
                return Err(invalid(
                    &format!("blocks[{bi}].repetitions"),
                    "must be at least 1",
                ));
            }
            for (ei, exercise) in block.exercises.iter().enumerate() {
                if exercise.id.trim().is_empty() {
                    return Err(invalid(
                        &format!("blocks[{bi}].exercises[{ei}].id"),
                        "must not be empty",
                    ));
                }
                if exercise.value == 0 {
                    return Err(invalid(
                        &format!("blocks[{bi}].exercises[{ei}].value"),
                        "must be a positive integer",
                    ));
                }
                if exercise.name.trim().is_empty() {
                    return Err(invalid(
                        &format!("blocks[{bi}].exercises[{ei}].name"),
                        "must not be empty",
                    ));
                }
            }
        }
        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_camel_case_with_defaults() {
        let json = r#"{
            "id": "s1",
            "name": "Legs",
            "blocks": [{
                "id": "b1",
                "name": "Warm up",
                "pauseBetweenExercises": 5,
                "exercises": [{"id": "e1", "name": "Squat", "kind": "reps", "value": 10}]
            }]
        }"#;
        let session: Session = serde_json::from_str(json).unwrap();
        let block = &session.blocks[0];
        assert_eq!(block.repetitions, 1);
        assert_eq!(block.pause_between_exercises, 5);
        assert_eq!(block.pause_before_next_block, 0);
        assert_eq!(block.exercises[0].kind, ExerciseKind::Reps);
        assert!(block.exercises[0].member.is_none());
    }

    #[test]
    fn validate_rejects_zero_repetitions() {
        let mut session = Session::new("s1", "Bad");
        let mut block = Block::new("b1", "Block");
        block.repetitions = 0;
        session.blocks.push(block);
        let err = session.validate().unwrap_err();
        assert!(err.to_string().contains("repetitions"));
    }

    #[test]
    fn validate_rejects_zero_value() {
        let mut session = Session::new("s1", "Bad");
        let mut block = Block::new("b1", "Block");
        block.exercises.push(Exercise::timed("e1", "Plank", 0));
        session.blocks.push(block);
        assert!(session.validate().is_err());
    }

    #[test]
    fn validate_rejects_blank_block_and_exercise_ids() {
        let mut session = Session::new("s1", "Bad");
        session.blocks.push(Block::new(" ", "Block"));
        let err = session.validate().unwrap_err();
        assert!(err.to_string().contains("blocks[0].id"));

        session.blocks[0].id = "b1".into();
        session.blocks[0].exercises.push(Exercise::reps("", "Squat", 10));
        let err = session.validate().unwrap_err();
        assert!(err.to_string().contains("blocks[0].exercises[0].id"));
    }

    #[test]
    fn empty_blocks_make_an_empty_session() {
        let mut session = Session::new("s1", "Nothing");
        session.blocks.push(Block::new("b1", "A"));
        session.blocks.push(Block::new("b2", "B"));
        assert!(session.is_empty());
        assert!(session.validate().is_ok());
    }
}
