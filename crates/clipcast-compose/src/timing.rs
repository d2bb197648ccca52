//! Timing normalization from seconds to frame indices.

use clipcast_models::{Word, WordTiming};

/// Convert a duration in seconds to a frame count at `fps`.
pub fn seconds_to_frames(seconds: f64, fps: f64) -> u32 {
    (seconds * fps).round().max(0.0) as u32
}

/// Resolve words to frame indices within the clip window.
///
/// Each word maps to `round((t - clip_start) * fps)` clamped to
/// `[0, round((clip_end - clip_start) * fps)]`; words fully outside the
/// window are dropped. Every word is computed independently from the inputs
/// alone, so repeated calls are bit-identical and order survives.
pub fn to_frames(
    words: &[Word],
    clip_start_seconds: f64,
    clip_end_seconds: f64,
    fps: f64,
) -> Vec<WordTiming> {
    let total = seconds_to_frames(clip_end_seconds - clip_start_seconds, fps) as i64;

    words
        .iter()
        .filter_map(|word| {
            let start = ((word.start_seconds - clip_start_seconds) * fps).round() as i64;
            let end = ((word.end_seconds - clip_start_seconds) * fps).round() as i64;

            if end < 0 || start > total {
                return None;
            }

            let start_frame = start.clamp(0, total) as u32;
            let end_frame = (end.clamp(0, total) as u32).max(start_frame);

            Some(WordTiming {
                text: word.text.clone(),
                start_frame,
                end_frame,
                confidence: word.confidence,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn half_second_words(texts: &[&str]) -> Vec<Word> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Word::new(*t, i as f64 * 0.5, (i + 1) as f64 * 0.5))
            .collect()
    }

    #[test]
    fn words_resolve_to_fifteen_frame_spans() {
        let words = half_second_words(&["one", "two", "three", "four", "five"]);
        let timings = to_frames(&words, 0.0, 2.5, 30.0);

        assert_eq!(timings.len(), 5);
        assert_eq!(timings[0].start_frame, 0);
        assert_eq!(timings[0].end_frame, 15);
        assert_eq!(timings[3].start_frame, 45);
        assert_eq!(timings[3].end_frame, 60);
        assert_eq!(timings[4].end_frame, 75);
    }

    #[test]
    fn window_offset_shifts_frames() {
        let words = vec![Word::new("hello", 12.2, 12.6)];
        let timings = to_frames(&words, 12.0, 30.5, 30.0);

        assert_eq!(timings[0].start_frame, 6);
        assert_eq!(timings[0].end_frame, 18);
    }

    #[test]
    fn words_outside_window_dropped() {
        let words = vec![
            Word::new("before", 0.0, 0.9),
            Word::new("inside", 1.2, 1.8),
            Word::new("after", 3.1, 3.6),
        ];
        let timings = to_frames(&words, 1.0, 3.0, 30.0);

        assert_eq!(timings.len(), 1);
        assert_eq!(timings[0].text, "inside");
    }

    #[test]
    fn straddling_words_clamp_to_window() {
        let words = vec![
            Word::new("head", 0.8, 1.4),
            Word::new("tail", 2.8, 3.4),
        ];
        let timings = to_frames(&words, 1.0, 3.0, 30.0);

        assert_eq!(timings.len(), 2);
        assert_eq!(timings[0].start_frame, 0);
        assert_eq!(timings[0].end_frame, 12);
        assert_eq!(timings[1].start_frame, 54);
        assert_eq!(timings[1].end_frame, 60);
    }

    #[test]
    fn repeated_calls_are_identical() {
        let words = half_second_words(&["a", "b", "c"]);
        let first = to_frames(&words, 0.25, 1.75, 29.97);
        let second = to_frames(&words, 0.25, 1.75, 29.97);
        assert_eq!(first, second);
    }

    #[test]
    fn ordering_and_span_invariants_hold() {
        let words = half_second_words(&["a", "b", "c", "d"]);
        let timings = to_frames(&words, 0.1, 1.9, 24.0);

        for pair in timings.windows(2) {
            assert!(pair[0].start_frame <= pair[1].start_frame);
        }
        for timing in &timings {
            assert!(timing.start_frame <= timing.end_frame);
        }
    }
}
