use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::info;

use crate::storage::VoiceSettings;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cue sink '{sink}' failed: {message}")]
pub struct CueSinkError {
    pub sink: String,
    pub message: String,
}

impl CueSinkError {
    pub fn new(sink: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            sink: sink.into(),
            message: message.into(),
        }
    }
}

/// Destination for cue text (speech synthesis, notifications, a terminal).
///
/// Delivery is fire-and-forget: the emitter logs errors and moves on.
pub trait CueSink {
    fn announce(&mut self, text: &str) -> Result<(), CueSinkError>;
}

/// Discards every cue.
#[derive(Debug, Default)]
pub struct NullSink;

impl CueSink for NullSink {
    fn announce(&mut self, _text: &str) -> Result<(), CueSinkError> {
        Ok(())
    }
}

/// Writes cues to the log at info level, tagged with the voice they are
/// meant to be spoken in when one is set.
#[derive(Debug, Clone, Default)]
pub struct TracingSink {
    voice: Option<VoiceSettings>,
}

impl TracingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_voice(voice: VoiceSettings) -> Self {
        Self { voice: Some(voice) }
    }

    pub fn voice(&self) -> Option<&VoiceSettings> {
        self.voice.as_ref()
    }
}

impl CueSink for TracingSink {
    fn announce(&mut self, text: &str) -> Result<(), CueSinkError> {
        match &self.voice {
            Some(voice) => info!(
                target: "repcue::cue",
                rate = voice.rate,
                pitch = voice.pitch,
                volume = voice.volume,
                language = %voice.language,
                "{text}"
            ),
            None => info!(target: "repcue::cue", "{text}"),
        }
        Ok(())
    }
}

/// Collects cues in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    announced: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn announced(&self) -> Vec<String> {
        self.announced
            .lock()
            .map(|v| v.clone())
            .unwrap_or_default()
    }
}

impl CueSink for MemorySink {
    fn announce(&mut self, text: &str) -> Result<(), CueSinkError> {
        self.announced
            .lock()
            .map_err(|e| CueSinkError::new("memory", e.to_string()))?
            .push(text.to_string());
        Ok(())
    }
}

impl<S: CueSink + ?Sized> CueSink for Box<S> {
    fn announce(&mut self, text: &str) -> Result<(), CueSinkError> {
        (**self).announce(text)
    }
}
