//! Multicam sources, switching timeline and layout configuration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a camera source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct SourceId(pub String);

impl SourceId {
    /// Generate a new random source ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One camera or screen feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoSource {
    /// Unique source ID
    pub id: SourceId,

    /// Human-readable label ("Host cam", "Guest cam")
    pub label: String,

    /// Audio sync offset in milliseconds; positive means the feed lags
    /// the master audio track
    #[serde(default)]
    pub sync_offset_ms: i64,

    /// Horizontal crop bias in percent added to the centered position
    #[serde(default)]
    pub crop_offset_x: f64,

    /// Vertical crop bias in percent added to the centered position
    #[serde(default)]
    pub crop_offset_y: f64,

    /// Native frame width in pixels
    pub width: u32,

    /// Native frame height in pixels
    pub height: u32,
}

impl VideoSource {
    pub fn new(label: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            id: SourceId::new(),
            label: label.into(),
            sync_offset_ms: 0,
            crop_offset_x: 0.0,
            crop_offset_y: 0.0,
            width,
            height,
        }
    }

    pub fn aspect(&self) -> f64 {
        self.width as f64 / self.height.max(1) as f64
    }
}

/// One entry of the camera switching timeline.
///
/// Intervals must tile `[0, duration_in_frames)` with no gaps or overlaps;
/// the render plan assembler rejects timelines that do not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SwitchingInterval {
    /// First frame of the interval, inclusive
    pub start_frame: u32,

    /// End frame of the interval, exclusive
    pub end_frame: u32,

    /// Source active during the interval
    pub video_source_id: SourceId,
}

impl SwitchingInterval {
    pub fn new(start_frame: u32, end_frame: u32, video_source_id: SourceId) -> Self {
        Self {
            start_frame,
            end_frame,
            video_source_id,
        }
    }

    /// Half-open containment: `start_frame <= frame < end_frame`.
    pub fn contains_frame(&self, frame: u32) -> bool {
        frame >= self.start_frame && frame < self.end_frame
    }

    pub fn duration_frames(&self) -> u32 {
        self.end_frame.saturating_sub(self.start_frame)
    }
}

/// Multicam layout modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "kebab-case")]
pub enum MulticamLayoutMode {
    /// Only the switched-to source, full frame
    #[default]
    ActiveSpeaker,
    /// Every source, equal partitions along the longer canvas axis
    SideBySide,
    /// Every source, near-square grid
    Grid,
    /// One configured source regardless of switching
    Solo,
}

impl MulticamLayoutMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MulticamLayoutMode::ActiveSpeaker => "active-speaker",
            MulticamLayoutMode::SideBySide => "side-by-side",
            MulticamLayoutMode::Grid => "grid",
            MulticamLayoutMode::Solo => "solo",
        }
    }
}

impl fmt::Display for MulticamLayoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Transition between switching intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransitionStyle {
    /// Hard cut at the interval boundary
    #[default]
    Cut,
    /// Opacity blend across the first frames of the new interval
    Crossfade,
}

/// Corner for picture-in-picture insets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum PipCorner {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
}

/// Picture-in-picture settings for the active-speaker layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PipSettings {
    /// Whether inactive sources render as insets
    #[serde(default)]
    pub enabled: bool,

    /// Corner the insets stack from
    #[serde(default)]
    pub corner: PipCorner,

    /// Inset size as a fraction of the canvas, in (0, 0.5]
    #[serde(default = "default_pip_size")]
    pub size: f64,
}

fn default_pip_size() -> f64 {
    0.28
}

impl Default for PipSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            corner: PipCorner::default(),
            size: default_pip_size(),
        }
    }
}

/// Full multicam configuration for one clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MulticamConfig {
    /// Ordered camera sources
    pub sources: Vec<VideoSource>,

    /// Switching timeline tiling the clip duration
    pub switching: Vec<SwitchingInterval>,

    /// Layout mode
    #[serde(default)]
    pub layout_mode: MulticamLayoutMode,

    /// Transition style at interval boundaries
    #[serde(default)]
    pub transition_style: TransitionStyle,

    /// Crossfade length in frames
    #[serde(default = "default_transition_frames")]
    pub transition_duration_frames: u32,

    /// Picture-in-picture settings (active-speaker only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pip: Option<PipSettings>,

    /// Source pinned by the solo layout
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solo_source_id: Option<SourceId>,
}

fn default_transition_frames() -> u32 {
    8
}

impl MulticamConfig {
    pub fn new(sources: Vec<VideoSource>, switching: Vec<SwitchingInterval>) -> Self {
        Self {
            sources,
            switching,
            layout_mode: MulticamLayoutMode::default(),
            transition_style: TransitionStyle::default(),
            transition_duration_frames: default_transition_frames(),
            pip: None,
            solo_source_id: None,
        }
    }

    pub fn with_layout_mode(mut self, mode: MulticamLayoutMode) -> Self {
        self.layout_mode = mode;
        self
    }

    pub fn with_transition(mut self, style: TransitionStyle, duration_frames: u32) -> Self {
        self.transition_style = style;
        self.transition_duration_frames = duration_frames;
        self
    }

    pub fn with_pip(mut self, pip: PipSettings) -> Self {
        self.pip = Some(pip);
        self
    }

    pub fn with_solo_source(mut self, id: SourceId) -> Self {
        self.solo_source_id = Some(id);
        self
    }

    /// Look up a source by ID.
    pub fn source(&self, id: &SourceId) -> Option<&VideoSource> {
        self.sources.iter().find(|s| &s.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_containment_half_open() {
        let interval = SwitchingInterval::new(30, 60, SourceId::from_string("cam-a"));
        assert!(interval.contains_frame(30));
        assert!(interval.contains_frame(59));
        assert!(!interval.contains_frame(60));
        assert!(!interval.contains_frame(29));
    }

    #[test]
    fn test_layout_mode_serde_names() {
        let json = serde_json::to_string(&MulticamLayoutMode::ActiveSpeaker).unwrap();
        assert_eq!(json, "\"active-speaker\"");
        let mode: MulticamLayoutMode = serde_json::from_str("\"side-by-side\"").unwrap();
        assert_eq!(mode, MulticamLayoutMode::SideBySide);
    }

    #[test]
    fn test_source_lookup() {
        let source = VideoSource::new("Host cam", 1920, 1080);
        let id = source.id.clone();
        let config = MulticamConfig::new(vec![source], vec![]);
        assert!(config.source(&id).is_some());
        assert!(config.source(&SourceId::from_string("missing")).is_none());
    }
}
