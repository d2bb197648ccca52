//! Caption style and animation kind definitions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Caption animation kinds.
///
/// Product-level names map onto these: "word_by_word" is `Fade`,
/// "bounce" is `Pop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaptionAnimation {
    /// Opacity ramp in and out around the cue span
    Fade,
    /// Damped-spring scale on cue entrance
    Pop,
    /// Left-to-right reveal across the cue
    Typewriter,
    /// Cue-level fade plus per-word highlight
    #[default]
    Karaoke,
}

impl CaptionAnimation {
    pub const ALL: &'static [CaptionAnimation] = &[
        CaptionAnimation::Fade,
        CaptionAnimation::Pop,
        CaptionAnimation::Typewriter,
        CaptionAnimation::Karaoke,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CaptionAnimation::Fade => "fade",
            CaptionAnimation::Pop => "pop",
            CaptionAnimation::Typewriter => "typewriter",
            CaptionAnimation::Karaoke => "karaoke",
        }
    }
}

impl fmt::Display for CaptionAnimation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CaptionAnimation {
    type Err = CaptionAnimationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fade" | "word_by_word" => Ok(CaptionAnimation::Fade),
            "pop" | "bounce" => Ok(CaptionAnimation::Pop),
            "typewriter" => Ok(CaptionAnimation::Typewriter),
            "karaoke" => Ok(CaptionAnimation::Karaoke),
            _ => Err(CaptionAnimationParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown caption animation: {0}")]
pub struct CaptionAnimationParseError(String);

/// Vertical caption placement, passed through to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaptionPosition {
    Top,
    Middle,
    #[default]
    Bottom,
}

/// Caption rendering style.
///
/// Font, color and position fields are opaque to the composition core and
/// forwarded to the renderer untouched; only `animation`, `words_per_group`
/// and the highlight settings affect computed frame state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CaptionStyle {
    /// Animation kind
    #[serde(default)]
    pub animation: CaptionAnimation,

    /// Words shown together as one cue (clamped to >= 1)
    #[serde(default = "default_words_per_group")]
    pub words_per_group: u32,

    /// Font family name
    #[serde(default = "default_font_family")]
    pub font_family: String,

    /// Font size in canvas pixels
    #[serde(default = "default_font_size")]
    pub font_size: u32,

    /// Base text color, hex
    #[serde(default = "default_color")]
    pub color: String,

    /// Highlight color for the active karaoke word
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight_color: Option<String>,

    /// Scale multiplier the active karaoke word ramps toward
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight_scale: Option<f64>,

    /// Vertical placement
    #[serde(default)]
    pub position: CaptionPosition,
}

fn default_words_per_group() -> u32 {
    3
}

fn default_font_family() -> String {
    "Inter".to_string()
}

fn default_font_size() -> u32 {
    64
}

fn default_color() -> String {
    "#FFFFFF".to_string()
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            animation: CaptionAnimation::default(),
            words_per_group: default_words_per_group(),
            font_family: default_font_family(),
            font_size: default_font_size(),
            color: default_color(),
            highlight_color: None,
            highlight_scale: None,
            position: CaptionPosition::default(),
        }
    }
}

impl CaptionStyle {
    /// Cue size with the >= 1 invariant applied.
    pub fn group_size(&self) -> usize {
        self.words_per_group.max(1) as usize
    }

    pub fn with_animation(mut self, animation: CaptionAnimation) -> Self {
        self.animation = animation;
        self
    }

    pub fn with_words_per_group(mut self, words_per_group: u32) -> Self {
        self.words_per_group = words_per_group;
        self
    }

    pub fn with_highlight(mut self, color: impl Into<String>, scale: Option<f64>) -> Self {
        self.highlight_color = Some(color.into());
        self.highlight_scale = scale;
        self
    }
}
