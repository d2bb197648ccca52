//! Error types for composition.

use thiserror::Error;

/// Result type for composition operations.
pub type ComposeResult<T> = Result<T, ComposeError>;

/// Errors raised while assembling or validating a render plan.
///
/// Per-frame evaluation never fails for in-range data; everything here is a
/// configuration problem caught at assembly time.
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("Invalid switching timeline: {0}")]
    InvalidSwitchingTimeline(String),

    #[error("Unknown video source: {0}")]
    UnknownVideoSource(String),

    #[error("Invalid clip window: {0}")]
    InvalidClipWindow(String),

    #[error("Invalid multicam configuration: {0}")]
    InvalidMulticamConfig(String),
}

impl ComposeError {
    /// Create a switching timeline error.
    pub fn invalid_timeline(message: impl Into<String>) -> Self {
        Self::InvalidSwitchingTimeline(message.into())
    }

    /// Create a clip window error.
    pub fn invalid_window(message: impl Into<String>) -> Self {
        Self::InvalidClipWindow(message.into())
    }

    /// Create a multicam configuration error.
    pub fn invalid_multicam(message: impl Into<String>) -> Self {
        Self::InvalidMulticamConfig(message.into())
    }
}
