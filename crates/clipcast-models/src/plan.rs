//! Render plan handed to the external renderer.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{CaptionStyle, MulticamConfig, WordTiming};

/// Clip background behind all video layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Background {
    Color { value: String },
    Image { url: String },
    Video { url: String },
}

impl Default for Background {
    fn default() -> Self {
        Background::Color {
            value: "#000000".to_string(),
        }
    }
}

/// Kind of an overlay track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    Overlay,
    Audio,
    Text,
}

/// One overlay track layered above the camera sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Track {
    /// Track ID, unique within the plan
    pub id: String,

    /// Track kind
    pub kind: TrackKind,

    /// Media URL for overlay/audio tracks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Literal content for text tracks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// First frame the track is mounted, inclusive
    #[serde(default)]
    pub start_frame: u32,

    /// End frame, exclusive
    pub end_frame: u32,

    /// Volume multiplier for audio tracks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

/// Master audio for the clip, trimmed in source frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AudioSource {
    /// Audio URL
    pub url: String,

    /// Trim start in source frames
    pub start_frame: u32,

    /// Trim end in source frames, exclusive
    pub end_frame: u32,
}

/// The full frame-indexed instruction set for the renderer.
///
/// Everything the renderer needs to draw any frame of the clip: resolved
/// word timings, caption style, canvas, background, overlay tracks and the
/// optional multicam configuration. Assembled and validated by
/// `clipcast-compose`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RenderPlan {
    /// Frame-resolved transcript words
    pub words: Vec<WordTiming>,

    /// Caption style
    pub caption_style: CaptionStyle,

    /// Background layer
    #[serde(default)]
    pub background: Background,

    /// Total clip length in frames
    pub duration_in_frames: u32,

    /// Output frame rate
    pub fps: f64,

    /// Canvas width in pixels
    pub width: u32,

    /// Canvas height in pixels
    pub height: u32,

    /// Overlay tracks
    #[serde(default)]
    pub tracks: Vec<Track>,

    /// Multicam configuration, absent for single-camera clips
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multicam: Option<MulticamConfig>,
}

/// A render plan plus its audio, the unit submitted to the render service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RenderRequest {
    pub plan: RenderPlan,
    pub audio: AudioSource,
}
