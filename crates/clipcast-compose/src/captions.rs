//! Caption grouping and per-frame animation state.
//!
//! Words partition into fixed-size cues by position. At a queried frame the
//! active word selects the visible cue, and the configured animation kind
//! determines opacity, scale, reveal and per-word highlight, all computed
//! purely from the frame index and the cue's word spans.

use serde::Serialize;

use clipcast_models::{CaptionAnimation, CaptionStyle, WordTiming};

/// Frames of entrance/exit easing on each side of a cue's span.
pub const CUE_MARGIN_FRAMES: u32 = 5;

/// Typewriter reveal budget per word in the cue.
pub const TYPEWRITER_FRAMES_PER_WORD: u32 = 3;

// Damped-spring shape for the pop entrance, tuned to overshoot to roughly
// 1.2x before settling.
const POP_DAMPING: f64 = 0.28;
const POP_FREQUENCY: f64 = 0.55;

/// A contiguous run of words shown together as one caption unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Cue {
    /// Position of the cue in the track
    pub index: usize,

    /// Index of the cue's first word in the full word sequence
    pub first_word: usize,

    /// Number of words in the cue (1..=words_per_group)
    pub word_count: usize,

    /// Min start frame of the cue's words
    pub start_frame: u32,

    /// Max end frame of the cue's words
    pub end_frame: u32,
}

impl Cue {
    /// First frame the cue renders, including the entrance margin.
    pub fn visible_from(&self) -> u32 {
        self.start_frame.saturating_sub(CUE_MARGIN_FRAMES)
    }

    /// Last frame the cue renders, including the exit margin.
    pub fn visible_until(&self) -> u32 {
        self.end_frame + CUE_MARGIN_FRAMES
    }

    /// Absolute indices of the cue's words.
    pub fn word_range(&self) -> std::ops::Range<usize> {
        self.first_word..self.first_word + self.word_count
    }
}

/// Partition words into cues of at most `group_size` in original order.
///
/// Boundaries are fixed by position, never by timing gaps; every word lands
/// in exactly one cue.
pub fn build_cues(words: &[WordTiming], group_size: usize) -> Vec<Cue> {
    let group_size = group_size.max(1);

    words
        .chunks(group_size)
        .enumerate()
        .map(|(index, chunk)| Cue {
            index,
            first_word: index * group_size,
            word_count: chunk.len(),
            start_frame: chunk.iter().map(|w| w.start_frame).min().unwrap_or(0),
            end_frame: chunk.iter().map(|w| w.end_frame).max().unwrap_or(0),
        })
        .collect()
}

/// Visual state of one word within the rendered cue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WordState {
    /// Absolute index into the word sequence
    pub word_index: usize,

    /// Whether the karaoke highlight applies at this frame
    pub highlighted: bool,

    /// Per-word scale multiplier
    pub scale: f64,
}

/// Everything the renderer needs to draw captions at one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptionFrameState {
    /// Index of the rendered cue
    pub cue_index: usize,

    /// Absolute index of the cue's first word
    pub first_word_index: usize,

    /// Absolute index of the active word, if one is speaking or upcoming
    pub active_word_index: Option<usize>,

    /// Cue-level opacity in [0, 1]
    pub opacity: f64,

    /// Cue-level scale multiplier
    pub scale: f64,

    /// Typewriter reveal fraction in [0, 1]; 1.0 for other styles
    pub reveal: f64,

    /// Per-word states, one per word in the cue
    pub words: Vec<WordState>,
}

/// A word sequence grouped into cues under one caption style.
///
/// Construction precomputes the partition; `state_at` is a pure projection
/// of the stored inputs and the queried frame.
#[derive(Debug, Clone)]
pub struct CaptionTrack {
    words: Vec<WordTiming>,
    style: CaptionStyle,
    cues: Vec<Cue>,
    group_size: usize,
}

impl CaptionTrack {
    pub fn new(words: Vec<WordTiming>, style: CaptionStyle) -> Self {
        let group_size = style.group_size();
        let cues = build_cues(&words, group_size);
        Self {
            words,
            style,
            cues,
            group_size,
        }
    }

    pub fn words(&self) -> &[WordTiming] {
        &self.words
    }

    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    /// The active word at `frame`: the word whose span contains the frame
    /// (the later word wins a shared boundary frame), else the first
    /// not-yet-started word, else `None` past the end.
    pub fn active_word_index(&self, frame: u32) -> Option<usize> {
        if let Some(index) = self.words.iter().rposition(|w| w.contains_frame(frame)) {
            return Some(index);
        }
        self.words.iter().position(|w| w.start_frame > frame)
    }

    /// Caption state at `frame`, or `None` when nothing is rendered.
    pub fn state_at(&self, frame: u32) -> Option<CaptionFrameState> {
        if self.words.is_empty() {
            return None;
        }

        let active = self.active_word_index(frame);
        let candidate = match active {
            Some(word_index) => word_index / self.group_size,
            // Past the final word: only the last cue's exit margin remains.
            None => self.cues.len().saturating_sub(1),
        };

        let cue = self.select_visible_cue(frame, candidate)?;
        Some(self.animate(frame, cue, active))
    }

    /// Pick the cue rendered at `frame`, honoring the 5-frame margins.
    ///
    /// When the candidate cue has not entered its window yet, the previous
    /// cue may still be inside its exit margin; in the dead zone between the
    /// two, nothing renders and silence never shows a stale group.
    fn select_visible_cue(&self, frame: u32, candidate: usize) -> Option<&Cue> {
        let cue = self.cues.get(candidate)?;

        if frame >= cue.visible_from() && frame <= cue.visible_until() {
            return Some(cue);
        }

        if frame < cue.visible_from() && candidate > 0 {
            let previous = &self.cues[candidate - 1];
            if frame <= previous.visible_until() {
                return Some(previous);
            }
        }

        None
    }

    fn animate(&self, frame: u32, cue: &Cue, active: Option<usize>) -> CaptionFrameState {
        // Active word only counts for this cue if it actually belongs to it;
        // during another cue's entrance gap the exiting cue has none.
        let active_in_cue = active.filter(|index| cue.word_range().contains(index));

        let (opacity, scale, reveal) = match self.style.animation {
            CaptionAnimation::Fade | CaptionAnimation::Karaoke => {
                (edge_opacity(frame, cue), 1.0, 1.0)
            }
            CaptionAnimation::Pop => (exit_opacity(frame, cue), pop_scale(frame, cue), 1.0),
            CaptionAnimation::Typewriter => {
                (exit_opacity(frame, cue), 1.0, typewriter_reveal(frame, cue))
            }
        };

        let words = cue
            .word_range()
            .map(|word_index| self.word_state(frame, word_index, active_in_cue))
            .collect();

        CaptionFrameState {
            cue_index: cue.index,
            first_word_index: cue.first_word,
            active_word_index: active_in_cue,
            opacity,
            scale,
            reveal,
            words,
        }
    }

    fn word_state(&self, frame: u32, word_index: usize, active: Option<usize>) -> WordState {
        let word = &self.words[word_index];
        let highlighted = self.style.animation == CaptionAnimation::Karaoke
            && active == Some(word_index)
            && word.contains_frame(frame);

        let scale = match (highlighted, self.style.highlight_scale) {
            (true, Some(target)) => 1.0 + (target - 1.0) * word_progress(frame, word),
            _ => 1.0,
        };

        WordState {
            word_index,
            highlighted,
            scale,
        }
    }
}

/// Fraction of the word's own span elapsed at `frame`.
fn word_progress(frame: u32, word: &WordTiming) -> f64 {
    let span = word.duration_frames();
    if span == 0 {
        return 1.0;
    }
    ((frame.saturating_sub(word.start_frame)) as f64 / span as f64).clamp(0.0, 1.0)
}

/// Opacity ramping 0 to 1 over the entrance margin and 1 to 0 over the exit.
fn edge_opacity(frame: u32, cue: &Cue) -> f64 {
    let margin = CUE_MARGIN_FRAMES as f64;
    let frame = frame as f64;
    let start = cue.start_frame as f64;
    let end = cue.end_frame as f64;

    if frame < start {
        ((frame - (start - margin)) / margin).clamp(0.0, 1.0)
    } else if frame > end {
        (1.0 - (frame - end) / margin).clamp(0.0, 1.0)
    } else {
        1.0
    }
}

/// Full opacity through the cue, fading only over the exit margin.
fn exit_opacity(frame: u32, cue: &Cue) -> f64 {
    if frame > cue.end_frame {
        (1.0 - (frame - cue.end_frame) as f64 / CUE_MARGIN_FRAMES as f64).clamp(0.0, 1.0)
    } else {
        1.0
    }
}

/// Damped-spring scale from cue appearance: overshoots, then settles at 1.
fn pop_scale(frame: u32, cue: &Cue) -> f64 {
    let t = frame.saturating_sub(cue.visible_from()) as f64;
    (1.0 - (-POP_DAMPING * t).exp() * (POP_FREQUENCY * t).cos()).max(0.0)
}

/// Left-to-right reveal, linear over 3 frames per word in the cue.
fn typewriter_reveal(frame: u32, cue: &Cue) -> f64 {
    let budget = (TYPEWRITER_FRAMES_PER_WORD as usize * cue.word_count) as f64;
    let t = frame.saturating_sub(cue.visible_from()) as f64;
    (t / budget).clamp(0.0, 1.0)
}
