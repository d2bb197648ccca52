//! Shared data models for ClipCast.
//!
//! This crate provides Serde-serializable types for:
//! - Word-level transcript timing (seconds and frames)
//! - Caption styles and animation kinds
//! - Multicam sources, switching timelines and layout modes
//! - Render plans handed to the external renderer
//! - Posts and the publish status state machine

pub mod aspect;
pub mod caption;
pub mod multicam;
pub mod plan;
pub mod post;
pub mod word;

// Re-export common types
pub use aspect::{AspectRatio, AspectRatioParseError};
pub use caption::{CaptionAnimation, CaptionPosition, CaptionStyle};
pub use multicam::{
    MulticamConfig, MulticamLayoutMode, PipCorner, PipSettings, SourceId, SwitchingInterval,
    TransitionStyle, VideoSource,
};
pub use plan::{AudioSource, Background, RenderPlan, RenderRequest, Track, TrackKind};
pub use post::{
    Destination, FailureKind, Post, PostContent, PostId, PostStatus, PostStatusView, StatusKind,
};
pub use word::{Word, WordTiming};
