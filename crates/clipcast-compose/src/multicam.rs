//! Multicam layout evaluation.
//!
//! Validates a switching timeline against the clip duration, then projects
//! per-source screen rectangles, crop windows, z-order and crossfade opacity
//! for any frame. Construction performs all validation; `state_at` cannot
//! fail and is a pure function of the stored configuration and the frame.

use serde::Serialize;

use clipcast_models::{
    MulticamConfig, MulticamLayoutMode, PipCorner, PipSettings, SourceId, SwitchingInterval,
    TransitionStyle, VideoSource,
};

use crate::error::{ComposeError, ComposeResult};

// z-order bands: an outgoing source fades under the incoming one, and
// picture-in-picture insets sit above both.
const Z_OUTGOING: i32 = 0;
const Z_ACTIVE: i32 = 1;
const Z_PIP_BASE: i32 = 10;

// Inset margin as a fraction of the shorter canvas edge.
const PIP_MARGIN_FRACTION: f64 = 0.04;

/// Crop alignment as object-position percentages, 50/50 is centered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ObjectPosition {
    pub x_pct: f64,
    pub y_pct: f64,
}

/// Pixel window into the source frame selected by the cover-fit crop.
///
/// Dimensions are even so downstream encoders never see odd extents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CropWindow {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Per-source state at one frame, consumed directly by the renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceFrameState {
    /// Source this state applies to
    pub source_id: SourceId,

    /// Whether the source is mounted at all this frame
    pub visible: bool,

    /// Opacity in [0, 1]; crossfades blend between 0 and 1
    pub opacity: f64,

    /// Screen rectangle on the output canvas
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,

    /// Stacking order; higher renders on top
    pub z_index: i32,

    /// Source-space crop window
    pub crop: CropWindow,

    /// Crop alignment for renderers that position by percentage
    pub object_position: ObjectPosition,
}

/// A validated multicam configuration bound to an output canvas.
#[derive(Debug, Clone)]
pub struct MulticamTimeline {
    config: MulticamConfig,
    canvas_width: u32,
    canvas_height: u32,
    duration_in_frames: u32,
}

impl MulticamTimeline {
    /// Validate and bind a configuration to the output canvas.
    ///
    /// A malformed switching timeline is a configuration error and is
    /// rejected here, before any frame is ever evaluated.
    pub fn new(
        config: MulticamConfig,
        canvas_width: u32,
        canvas_height: u32,
        duration_in_frames: u32,
    ) -> ComposeResult<Self> {
        validate(&config, canvas_width, canvas_height, duration_in_frames)?;
        Ok(Self {
            config,
            canvas_width,
            canvas_height,
            duration_in_frames,
        })
    }

    pub fn config(&self) -> &MulticamConfig {
        &self.config
    }

    pub fn duration_in_frames(&self) -> u32 {
        self.duration_in_frames
    }

    /// The switching interval covering `frame`, clamped into the clip span.
    pub fn interval_at(&self, frame: u32) -> &SwitchingInterval {
        let frame = frame.min(self.duration_in_frames - 1);
        self.config
            .switching
            .iter()
            .find(|interval| interval.contains_frame(frame))
            .unwrap_or_else(|| &self.config.switching[self.config.switching.len() - 1])
    }

    /// The source switched to at `frame`.
    pub fn active_source_id(&self, frame: u32) -> &SourceId {
        &self.interval_at(frame).video_source_id
    }

    /// Per-source layout states at `frame`, in source order.
    ///
    /// Every configured source gets an entry; hidden sources carry a zero
    /// screen rectangle and zero opacity.
    pub fn state_at(&self, frame: u32) -> Vec<SourceFrameState> {
        let frame = frame.min(self.duration_in_frames - 1);
        match self.config.layout_mode {
            MulticamLayoutMode::ActiveSpeaker => self.active_speaker_states(frame),
            MulticamLayoutMode::SideBySide => self.partitioned_states(split_rects(
                self.canvas_width,
                self.canvas_height,
                self.config.sources.len() as u32,
            )),
            MulticamLayoutMode::Grid => self.partitioned_states(grid_rects(
                self.canvas_width,
                self.canvas_height,
                self.config.sources.len() as u32,
            )),
            MulticamLayoutMode::Solo => self.solo_states(),
        }
    }

    fn active_speaker_states(&self, frame: u32) -> Vec<SourceFrameState> {
        let index = self.interval_index_at(frame);
        let interval = &self.config.switching[index];
        let active_id = &interval.video_source_id;

        // During the first transition_duration_frames of an interval the
        // previous source stays mounted underneath and the two blend.
        let fade = self.crossfade_at(frame, index);

        let pip = self
            .config
            .pip
            .as_ref()
            .filter(|pip| pip.enabled)
            .cloned();

        let mut inset_index = 0u32;
        self.config
            .sources
            .iter()
            .map(|source| {
                if &source.id == active_id {
                    let opacity = fade.as_ref().map(|f| f.progress).unwrap_or(1.0);
                    self.fullscreen(source, opacity, Z_ACTIVE)
                } else if fade.as_ref().is_some_and(|f| f.outgoing_id == source.id) {
                    let progress = fade.as_ref().map(|f| f.progress).unwrap_or(0.0);
                    self.fullscreen(source, 1.0 - progress, Z_OUTGOING)
                } else if let Some(pip) = &pip {
                    let state = self.inset(source, pip, inset_index);
                    inset_index += 1;
                    state
                } else {
                    self.hidden(source)
                }
            })
            .collect()
    }

    fn partitioned_states(&self, rects: Vec<Rect>) -> Vec<SourceFrameState> {
        self.config
            .sources
            .iter()
            .zip(rects)
            .map(|(source, rect)| self.placed(source, rect, 1.0, Z_ACTIVE))
            .collect()
    }

    fn solo_states(&self) -> Vec<SourceFrameState> {
        // Validation guarantees the pinned source exists.
        let solo_id = self.config.solo_source_id.as_ref();
        self.config
            .sources
            .iter()
            .map(|source| {
                if Some(&source.id) == solo_id {
                    self.fullscreen(source, 1.0, Z_ACTIVE)
                } else {
                    self.hidden(source)
                }
            })
            .collect()
    }

    fn interval_index_at(&self, frame: u32) -> usize {
        self.config
            .switching
            .iter()
            .position(|interval| interval.contains_frame(frame))
            .unwrap_or(self.config.switching.len() - 1)
    }

    fn crossfade_at(&self, frame: u32, interval_index: usize) -> Option<Crossfade> {
        if self.config.transition_style != TransitionStyle::Crossfade {
            return None;
        }
        let duration = self.config.transition_duration_frames;
        if duration == 0 || interval_index == 0 {
            return None;
        }

        let interval = &self.config.switching[interval_index];
        let offset = frame - interval.start_frame;
        if offset >= duration {
            return None;
        }

        let outgoing = &self.config.switching[interval_index - 1].video_source_id;
        if outgoing == &interval.video_source_id {
            return None;
        }

        Some(Crossfade {
            outgoing_id: outgoing.clone(),
            progress: offset as f64 / duration as f64,
        })
    }

    fn fullscreen(&self, source: &VideoSource, opacity: f64, z_index: i32) -> SourceFrameState {
        self.placed(
            source,
            Rect {
                x: 0,
                y: 0,
                width: self.canvas_width,
                height: self.canvas_height,
            },
            opacity,
            z_index,
        )
    }

    fn inset(&self, source: &VideoSource, pip: &PipSettings, index: u32) -> SourceFrameState {
        let width = (self.canvas_width as f64 * pip.size).round() as u32;
        let height = (self.canvas_height as f64 * pip.size).round() as u32;
        let margin = (self.canvas_width.min(self.canvas_height) as f64 * PIP_MARGIN_FRACTION)
            .round() as u32;
        let step = index * (height + margin);

        let x = match pip.corner {
            PipCorner::TopLeft | PipCorner::BottomLeft => margin,
            PipCorner::TopRight | PipCorner::BottomRight => {
                self.canvas_width.saturating_sub(width + margin)
            }
        };
        let y = match pip.corner {
            PipCorner::TopLeft | PipCorner::TopRight => margin + step,
            PipCorner::BottomLeft | PipCorner::BottomRight => {
                self.canvas_height.saturating_sub(height + margin + step)
            }
        };

        self.placed(
            source,
            Rect {
                x,
                y,
                width,
                height,
            },
            1.0,
            Z_PIP_BASE + index as i32,
        )
    }

    fn placed(
        &self,
        source: &VideoSource,
        rect: Rect,
        opacity: f64,
        z_index: i32,
    ) -> SourceFrameState {
        let (crop, object_position) = crop_for(source, rect.width, rect.height);
        SourceFrameState {
            source_id: source.id.clone(),
            visible: true,
            opacity,
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            z_index,
            crop,
            object_position,
        }
    }

    fn hidden(&self, source: &VideoSource) -> SourceFrameState {
        let (_, object_position) = crop_for(source, source.width, source.height);
        SourceFrameState {
            source_id: source.id.clone(),
            visible: false,
            opacity: 0.0,
            x: 0,
            y: 0,
            width: 0,
            height: 0,
            z_index: 0,
            crop: CropWindow {
                x: 0,
                y: 0,
                width: even_dim(source.width as f64, source.width),
                height: even_dim(source.height as f64, source.height),
            },
            object_position,
        }
    }
}

struct Crossfade {
    outgoing_id: SourceId,
    progress: f64,
}

#[derive(Debug, Clone, Copy)]
struct Rect {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

/// Cover-fit crop of a source into a destination rectangle.
///
/// The window matches the destination aspect, biased away from center by the
/// source's crop offsets and clamped so it never leaves the source frame.
fn crop_for(source: &VideoSource, dest_width: u32, dest_height: u32) -> (CropWindow, ObjectPosition) {
    let src_w = source.width as f64;
    let src_h = source.height as f64;

    let scale = (dest_width as f64 / src_w).max(dest_height as f64 / src_h);
    let visible_w = if scale > 0.0 { (dest_width as f64 / scale).min(src_w) } else { src_w };
    let visible_h = if scale > 0.0 { (dest_height as f64 / scale).min(src_h) } else { src_h };

    let x_pct = (50.0 + source.crop_offset_x).clamp(0.0, 100.0);
    let y_pct = (50.0 + source.crop_offset_y).clamp(0.0, 100.0);

    let width = even_dim(visible_w, source.width);
    let height = even_dim(visible_h, source.height);

    let x = ((src_w - visible_w) * x_pct / 100.0).round() as u32;
    let y = ((src_h - visible_h) * y_pct / 100.0).round() as u32;

    (
        CropWindow {
            x: x.min(source.width.saturating_sub(width)),
            y: y.min(source.height.saturating_sub(height)),
            width,
            height,
        },
        ObjectPosition { x_pct, y_pct },
    )
}

/// Round toward an even pixel count, staying within `max`.
fn even_dim(value: f64, max: u32) -> u32 {
    let v = (value.round() as u32).min(max);
    let even = v & !1;
    if even == 0 {
        max.min(2)
    } else {
        even
    }
}

/// Equal bands along the longer canvas axis; the last band absorbs the
/// integer remainder so the bands tile the canvas exactly.
fn split_rects(canvas_width: u32, canvas_height: u32, count: u32) -> Vec<Rect> {
    if canvas_height >= canvas_width {
        let step = canvas_height / count;
        (0..count)
            .map(|k| Rect {
                x: 0,
                y: k * step,
                width: canvas_width,
                height: if k == count - 1 { canvas_height - k * step } else { step },
            })
            .collect()
    } else {
        let step = canvas_width / count;
        (0..count)
            .map(|k| Rect {
                x: k * step,
                y: 0,
                width: if k == count - 1 { canvas_width - k * step } else { step },
                height: canvas_height,
            })
            .collect()
    }
}

/// Near-square grid, row-major; the last column and row absorb remainders.
fn grid_rects(canvas_width: u32, canvas_height: u32, count: u32) -> Vec<Rect> {
    let cols = (count as f64).sqrt().ceil() as u32;
    let rows = count.div_ceil(cols);
    let cell_w = canvas_width / cols;
    let cell_h = canvas_height / rows;

    (0..count)
        .map(|k| {
            let col = k % cols;
            let row = k / cols;
            Rect {
                x: col * cell_w,
                y: row * cell_h,
                width: if col == cols - 1 { canvas_width - col * cell_w } else { cell_w },
                height: if row == rows - 1 { canvas_height - row * cell_h } else { cell_h },
            }
        })
        .collect()
}

fn validate(
    config: &MulticamConfig,
    canvas_width: u32,
    canvas_height: u32,
    duration_in_frames: u32,
) -> ComposeResult<()> {
    if duration_in_frames == 0 {
        return Err(ComposeError::invalid_timeline(
            "clip duration must be at least one frame",
        ));
    }
    if canvas_width == 0 || canvas_height == 0 {
        return Err(ComposeError::invalid_multicam(
            "output canvas dimensions must be positive",
        ));
    }
    if config.sources.is_empty() {
        return Err(ComposeError::invalid_multicam(
            "multicam requires at least one video source",
        ));
    }
    for source in &config.sources {
        if source.width == 0 || source.height == 0 {
            return Err(ComposeError::invalid_multicam(format!(
                "source {} has empty dimensions",
                source.id
            )));
        }
    }

    if config.switching.is_empty() {
        return Err(ComposeError::invalid_timeline("switching timeline is empty"));
    }
    let mut expected = 0u32;
    for interval in &config.switching {
        if interval.start_frame != expected {
            return Err(ComposeError::invalid_timeline(format!(
                "interval starts at frame {} but frame {} is next uncovered",
                interval.start_frame, expected
            )));
        }
        if interval.end_frame <= interval.start_frame {
            return Err(ComposeError::invalid_timeline(format!(
                "empty interval at frame {}",
                interval.start_frame
            )));
        }
        if config.source(&interval.video_source_id).is_none() {
            return Err(ComposeError::UnknownVideoSource(
                interval.video_source_id.to_string(),
            ));
        }
        expected = interval.end_frame;
    }
    if expected != duration_in_frames {
        return Err(ComposeError::invalid_timeline(format!(
            "timeline covers frames [0, {}) but the clip spans [0, {})",
            expected, duration_in_frames
        )));
    }

    if let Some(pip) = &config.pip {
        if pip.enabled && !(pip.size > 0.0 && pip.size <= 0.5) {
            return Err(ComposeError::invalid_multicam(format!(
                "pip size {} is outside (0, 0.5]",
                pip.size
            )));
        }
    }

    if config.layout_mode == MulticamLayoutMode::Solo {
        match &config.solo_source_id {
            None => {
                return Err(ComposeError::invalid_multicam(
                    "solo layout requires solo_source_id",
                ))
            }
            Some(id) if config.source(id).is_none() => {
                return Err(ComposeError::UnknownVideoSource(id.to_string()));
            }
            _ => {}
        }
    }

    Ok(())
}
