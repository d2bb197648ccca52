//! Render plan assembly.
//!
//! Composes the timing normalizer, caption grouping and multicam validation
//! into the full instruction set submitted to the render service. This is
//! the single place configuration errors are rejected; a plan that assembles
//! successfully renders without further validation.

use serde::{Deserialize, Serialize};
use tracing::debug;

use clipcast_models::{
    AspectRatio, AudioSource, Background, CaptionStyle, MulticamConfig, RenderPlan, RenderRequest,
    Track, Word,
};

use crate::error::{ComposeError, ComposeResult};
use crate::multicam::MulticamTimeline;
use crate::timing::{seconds_to_frames, to_frames};

/// Longest edge of the output canvas in pixels.
const OUTPUT_LONG_EDGE: u32 = 1920;

/// Everything needed to assemble one clip's render plan.
///
/// The clip window is in source-recording seconds; words are clip-relative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionRequest {
    /// Transcript words, clip-relative seconds
    pub words: Vec<Word>,

    /// Caption style
    #[serde(default)]
    pub caption_style: CaptionStyle,

    /// Clip start in the source recording, seconds
    pub clip_start_seconds: f64,

    /// Clip end in the source recording, seconds
    pub clip_end_seconds: f64,

    /// Output frame rate
    #[serde(default = "default_fps")]
    pub fps: f64,

    /// Output aspect ratio
    #[serde(default)]
    pub format: AspectRatio,

    /// Master audio URL, trimmed to the clip window
    pub audio_url: String,

    /// Background layer
    #[serde(default)]
    pub background: Background,

    /// Overlay tracks, clip-relative frames
    #[serde(default)]
    pub tracks: Vec<Track>,

    /// Multicam configuration, absent for single-camera clips
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub multicam: Option<MulticamConfig>,
}

fn default_fps() -> f64 {
    30.0
}

/// Output canvas size for a format: the longer edge is 1920 and both
/// dimensions are even.
pub fn output_resolution(format: AspectRatio) -> (u32, u32) {
    let ratio = format.as_f64();
    if format.is_portrait() {
        let width = (OUTPUT_LONG_EDGE as f64 * ratio).round() as u32;
        (even(width), OUTPUT_LONG_EDGE)
    } else {
        let height = (OUTPUT_LONG_EDGE as f64 / ratio).round() as u32;
        (OUTPUT_LONG_EDGE, even(height))
    }
}

fn even(value: u32) -> u32 {
    value & !1
}

/// Assemble and validate the full render request for one clip.
///
/// Rejects inverted or empty clip windows, non-positive frame rates and
/// malformed multicam timelines. Overlay tracks overrunning the clip are
/// clamped, not rejected.
pub fn assemble_render_plan(request: CompositionRequest) -> ComposeResult<RenderRequest> {
    if !(request.fps > 0.0) {
        return Err(ComposeError::invalid_window(format!(
            "fps must be positive, got {}",
            request.fps
        )));
    }
    if request.clip_start_seconds < 0.0 {
        return Err(ComposeError::invalid_window(format!(
            "clip start must be non-negative, got {}",
            request.clip_start_seconds
        )));
    }
    if !(request.clip_end_seconds > request.clip_start_seconds) {
        return Err(ComposeError::invalid_window(format!(
            "clip window [{}, {}] is empty or inverted",
            request.clip_start_seconds, request.clip_end_seconds
        )));
    }

    let duration_in_frames = seconds_to_frames(
        request.clip_end_seconds - request.clip_start_seconds,
        request.fps,
    );
    if duration_in_frames == 0 {
        return Err(ComposeError::invalid_window(format!(
            "clip window [{}, {}] is shorter than one frame at {} fps",
            request.clip_start_seconds, request.clip_end_seconds, request.fps
        )));
    }

    let (width, height) = output_resolution(request.format);

    // Words arrive clip-relative, so the normalizer window starts at zero.
    let clip_seconds = request.clip_end_seconds - request.clip_start_seconds;
    let words = to_frames(&request.words, 0.0, clip_seconds, request.fps);

    if let Some(config) = &request.multicam {
        MulticamTimeline::new(config.clone(), width, height, duration_in_frames)?;
    }

    let tracks = request
        .tracks
        .into_iter()
        .map(|track| clamp_track(track, duration_in_frames))
        .collect();

    let audio = AudioSource {
        url: request.audio_url,
        start_frame: seconds_to_frames(request.clip_start_seconds, request.fps),
        end_frame: seconds_to_frames(request.clip_end_seconds, request.fps),
    };

    Ok(RenderRequest {
        plan: RenderPlan {
            words,
            caption_style: request.caption_style,
            background: request.background,
            duration_in_frames,
            fps: request.fps,
            width,
            height,
            tracks,
            multicam: request.multicam,
        },
        audio,
    })
}

fn clamp_track(mut track: Track, duration_in_frames: u32) -> Track {
    if track.end_frame > duration_in_frames {
        debug!(
            track_id = %track.id,
            end_frame = track.end_frame,
            duration_in_frames,
            "Clamping track to clip duration"
        );
        track.end_frame = duration_in_frames;
    }
    if track.start_frame > track.end_frame {
        track.start_frame = track.end_frame;
    }
    track
}
