mod emitter;
mod sink;
mod text;

pub use emitter::{cue_for, CueEmitter, CueKey, CueKind, PendingCue};
pub use sink::{CueSink, CueSinkError, MemorySink, NullSink, TracingSink};
pub use text::{cue_text, COMPLETION_TEXT};
