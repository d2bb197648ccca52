//! Composition pipeline integration tests.
//!
//! Assemble render plans from raw transcript and multicam input, then drive
//! per-frame caption and layout state from the assembled plan the way the
//! renderer does.

use clipcast_compose::{
    assemble_render_plan, CaptionTrack, ComposeError, CompositionRequest, MulticamTimeline,
};
use clipcast_models::{
    AspectRatio, Background, CaptionAnimation, CaptionStyle, MulticamConfig, RenderRequest,
    SourceId, SwitchingInterval, TransitionStyle, VideoSource, Word,
};

/// "one two three four five", half a second per word, clip-relative.
fn spoken_words() -> Vec<Word> {
    ["one", "two", "three", "four", "five"]
        .iter()
        .enumerate()
        .map(|(i, t)| Word::new(*t, i as f64 * 0.5, (i as f64 + 1.0) * 0.5))
        .collect()
}

/// A 2.5s portrait clip cut from minute 10 of an episode.
fn clip_request() -> CompositionRequest {
    CompositionRequest {
        words: spoken_words(),
        caption_style: CaptionStyle::default()
            .with_animation(CaptionAnimation::Karaoke)
            .with_words_per_group(2),
        clip_start_seconds: 10.0,
        clip_end_seconds: 12.5,
        fps: 30.0,
        format: AspectRatio::PORTRAIT,
        audio_url: "https://cdn.example.com/episode.mp3".to_string(),
        background: Background::default(),
        tracks: Vec::new(),
        multicam: None,
    }
}

fn two_cams() -> Vec<VideoSource> {
    let mut host = VideoSource::new("Host cam", 1920, 1080);
    host.id = SourceId::from_string("host");
    let mut guest = VideoSource::new("Guest cam", 1920, 1080);
    guest.id = SourceId::from_string("guest");
    vec![host, guest]
}

#[test]
fn caption_playback_follows_the_assembled_plan() {
    let rendered = assemble_render_plan(clip_request()).unwrap();
    let plan = rendered.plan;
    assert_eq!(plan.duration_in_frames, 75);

    let track = CaptionTrack::new(plan.words, plan.caption_style);
    let spans: Vec<_> = track
        .cues()
        .iter()
        .map(|cue| (cue.start_frame, cue.end_frame))
        .collect();
    assert_eq!(spans, vec![(0, 30), (30, 60), (60, 75)]);

    // Mid-clip: the second cue renders and "four" carries the highlight
    let state = track.state_at(45).expect("cue visible");
    assert_eq!(state.cue_index, 1);
    assert_eq!(state.active_word_index, Some(3));
    assert!(state.words.iter().any(|w| w.word_index == 3 && w.highlighted));

    // The last cue fades through its exit margin, then nothing renders
    assert!(track.state_at(80).is_some());
    assert!(track.state_at(81).is_none());
}

#[test]
fn multicam_layout_follows_the_assembled_plan() {
    let mut request = clip_request();
    request.multicam = Some(
        MulticamConfig::new(
            two_cams(),
            vec![
                SwitchingInterval::new(0, 40, SourceId::from_string("host")),
                SwitchingInterval::new(40, 75, SourceId::from_string("guest")),
            ],
        )
        .with_transition(TransitionStyle::Crossfade, 8),
    );

    let plan = assemble_render_plan(request).unwrap().plan;
    let timeline = MulticamTimeline::new(
        plan.multicam.expect("multicam embedded"),
        plan.width,
        plan.height,
        plan.duration_in_frames,
    )
    .unwrap();

    let of = |states: &[clipcast_compose::SourceFrameState], id: &str| {
        states
            .iter()
            .find(|s| s.source_id.as_str() == id)
            .cloned()
            .expect("source state present")
    };

    // Before the switch the host fills the canvas alone
    let before = timeline.state_at(39);
    assert_eq!(of(&before, "host").opacity, 1.0);
    assert_eq!(
        (of(&before, "host").width, of(&before, "host").height),
        (1080, 1920)
    );
    assert!(!of(&before, "guest").visible);

    // Two frames into the 8-frame blend both sources render
    let blending = timeline.state_at(42);
    assert!((of(&blending, "guest").opacity - 0.25).abs() < 1e-9);
    assert!((of(&blending, "host").opacity - 0.75).abs() < 1e-9);
    assert!(of(&blending, "guest").z_index > of(&blending, "host").z_index);

    // Blend over: the host unmounts
    let settled = timeline.state_at(48);
    assert!(!of(&settled, "host").visible);
    assert_eq!(of(&settled, "guest").opacity, 1.0);
}

#[test]
fn silence_between_cues_blanks_the_canvas() {
    let mut request = clip_request();
    request.words = vec![Word::new("welcome", 0.0, 0.4), Word::new("back", 2.0, 2.4)];
    request.caption_style = CaptionStyle::default().with_words_per_group(1);

    let plan = assemble_render_plan(request).unwrap().plan;
    let track = CaptionTrack::new(plan.words, plan.caption_style);

    // "welcome" spans [0, 12] and holds through its exit margin
    let fading = track.state_at(17).expect("first cue still fading");
    assert_eq!(fading.cue_index, 0);
    assert!(fading.active_word_index.is_none());

    // The gap between the cues renders no captions at all
    for frame in [18, 30, 45, 54] {
        assert!(track.state_at(frame).is_none(), "frame {} should be blank", frame);
    }

    // "back" enters through its margin at frame 55
    assert_eq!(track.state_at(55).expect("second cue entering").cue_index, 1);
}

#[test]
fn switching_gaps_never_reach_the_renderer() {
    // Covers [0, 60) of the 75-frame clip
    let mut request = clip_request();
    request.multicam = Some(MulticamConfig::new(
        two_cams(),
        vec![
            SwitchingInterval::new(0, 40, SourceId::from_string("host")),
            SwitchingInterval::new(40, 60, SourceId::from_string("guest")),
        ],
    ));
    assert!(matches!(
        assemble_render_plan(request),
        Err(ComposeError::InvalidSwitchingTimeline(_))
    ));

    // Switching to a source that is not configured
    let mut request = clip_request();
    request.multicam = Some(MulticamConfig::new(
        two_cams(),
        vec![SwitchingInterval::new(0, 75, SourceId::from_string("producer"))],
    ));
    assert!(matches!(
        assemble_render_plan(request),
        Err(ComposeError::UnknownVideoSource(_))
    ));
}

#[test]
fn plan_survives_the_render_service_wire_format() {
    let rendered = assemble_render_plan(clip_request()).unwrap();

    let body = serde_json::to_value(&rendered).unwrap();
    assert_eq!(body["plan"]["duration_in_frames"], 75);
    assert_eq!(body["plan"]["width"], 1080);
    assert_eq!(body["plan"]["words"][3]["start_frame"], 45);
    assert_eq!(body["audio"]["start_frame"], 300);
    assert_eq!(body["audio"]["end_frame"], 375);
    assert!(body["plan"].get("multicam").is_none());

    let decoded: RenderRequest = serde_json::from_value(body).unwrap();
    assert_eq!(decoded, rendered);
}

#[test]
fn project_clips_parse_with_defaults_and_assemble() {
    // The shape stored per clip in a project file: only the required fields
    let raw = serde_json::json!({
        "words": [
            { "text": "hello", "start_seconds": 0.0, "end_seconds": 0.5 },
            { "text": "there", "start_seconds": 0.5, "end_seconds": 1.0 }
        ],
        "clip_start_seconds": 42.0,
        "clip_end_seconds": 44.0,
        "audio_url": "https://cdn.example.com/episode.mp3"
    });

    let request: CompositionRequest = serde_json::from_value(raw).unwrap();
    assert_eq!(request.fps, 30.0);
    assert_eq!(request.format, AspectRatio::PORTRAIT);

    let plan = assemble_render_plan(request).unwrap().plan;
    assert_eq!(plan.duration_in_frames, 60);
    assert_eq!((plan.width, plan.height), (1080, 1920));
    assert_eq!(plan.words.len(), 2);
}

#[test]
fn frame_state_is_identical_in_any_evaluation_order() {
    let mut request = clip_request();
    request.multicam = Some(
        MulticamConfig::new(
            two_cams(),
            vec![
                SwitchingInterval::new(0, 40, SourceId::from_string("host")),
                SwitchingInterval::new(40, 75, SourceId::from_string("guest")),
            ],
        )
        .with_transition(TransitionStyle::Crossfade, 8),
    );

    let plan = assemble_render_plan(request).unwrap().plan;
    let duration = plan.duration_in_frames;
    let timeline =
        MulticamTimeline::new(plan.multicam.clone().expect("multicam"), plan.width, plan.height, duration)
            .unwrap();
    let track = CaptionTrack::new(plan.words, plan.caption_style);

    let forward: Vec<_> = (0..duration)
        .map(|frame| (track.state_at(frame), timeline.state_at(frame)))
        .collect();
    let mut backward: Vec<_> = (0..duration)
        .rev()
        .map(|frame| (track.state_at(frame), timeline.state_at(frame)))
        .collect();
    backward.reverse();

    assert_eq!(forward, backward);
}
