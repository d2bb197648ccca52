//! Pure composition for ClipCast.
//!
//! Deterministic functions that turn word-level transcript timestamps and
//! multicam configuration into frame-accurate render state:
//! - Timing normalization (seconds to frame indices)
//! - Caption grouping and per-frame animation state
//! - Multicam layout, cropping and transitions
//! - Render plan assembly and validation
//!
//! Every `state_at(frame)` function is a pure projection of its inputs:
//! repeated calls for the same frame return identical output, so a renderer
//! can evaluate frames in any order, concurrently, with no shared state.

pub mod captions;
pub mod error;
pub mod multicam;
pub mod plan;
pub mod timing;

pub use captions::{CaptionFrameState, CaptionTrack, Cue, WordState, CUE_MARGIN_FRAMES};
pub use error::{ComposeError, ComposeResult};
pub use multicam::{CropWindow, MulticamTimeline, ObjectPosition, SourceFrameState};
pub use plan::{assemble_render_plan, output_resolution, CompositionRequest};
pub use timing::{seconds_to_frames, to_frames};
