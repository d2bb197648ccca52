//! Word-level transcript timing.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A single transcribed word, clip-relative, in seconds.
///
/// Word sequences are ordered with monotonically non-decreasing start times
/// and are immutable once produced by transcription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Word {
    /// Word text as produced by transcription
    pub text: String,

    /// Start time in seconds, relative to the clip start
    pub start_seconds: f64,

    /// End time in seconds, relative to the clip start
    pub end_seconds: f64,

    /// Transcription confidence in [0, 1], opaque pass-through
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    1.0
}

impl Word {
    /// Create a word with full confidence.
    pub fn new(text: impl Into<String>, start_seconds: f64, end_seconds: f64) -> Self {
        Self {
            text: text.into(),
            start_seconds,
            end_seconds,
            confidence: default_confidence(),
        }
    }

    pub fn duration_seconds(&self) -> f64 {
        (self.end_seconds - self.start_seconds).max(0.0)
    }
}

/// A word resolved to frame indices at a fixed frame rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WordTiming {
    /// Word text as produced by transcription
    pub text: String,

    /// First frame of the word, inclusive
    pub start_frame: u32,

    /// Last frame of the word, inclusive
    pub end_frame: u32,

    /// Transcription confidence in [0, 1], opaque pass-through
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

impl WordTiming {
    pub fn new(text: impl Into<String>, start_frame: u32, end_frame: u32) -> Self {
        Self {
            text: text.into(),
            start_frame,
            end_frame,
            confidence: default_confidence(),
        }
    }

    /// Whether the inclusive frame span contains the given frame.
    pub fn contains_frame(&self, frame: u32) -> bool {
        frame >= self.start_frame && frame <= self.end_frame
    }

    pub fn duration_frames(&self) -> u32 {
        self.end_frame.saturating_sub(self.start_frame)
    }
}
