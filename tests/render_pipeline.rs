use promoreel::{
    CODEC_PREFERENCES, CancelToken, CaptureProbe, CodecChoice, ImmediateClock, InMemorySink,
    PromoreelResult, RenderPhase, RenderSession, StyleConfig, parse_script, render_single_frame,
};

/// Pretends capture is available so the pipeline can run without ffmpeg.
struct StubProbe;

impl CaptureProbe for StubProbe {
    fn supported(&self) -> bool {
        true
    }

    fn negotiate(&self) -> PromoreelResult<CodecChoice> {
        Ok(CODEC_PREFERENCES[0])
    }
}

fn font_available() -> bool {
    promoreel::TextShaper::new(None).is_ok()
}

#[test]
fn script_to_sink_renders_every_frame_in_order() {
    let _ = tracing_subscriber::fmt::try_init();
    if !font_available() {
        eprintln!("skipping: no system font available");
        return;
    }

    let scenes = parse_script(
        "Meet Promo | launch videos from plain text\n\
         Type a script | one line becomes one scene\n\
         Export | share a clip in seconds",
    );
    let style = StyleConfig {
        scene_duration_seconds: 0.2,
        ..StyleConfig::default()
    };
    let mut session = RenderSession::new(scenes, style).unwrap();
    let mut sink = InMemorySink::new();

    let timeline = session
        .run(&StubProbe, &mut sink, &mut ImmediateClock, &CancelToken::new())
        .unwrap();

    assert_eq!(session.phase(), RenderPhase::Completed);
    assert_eq!(timeline.scene_count, 3);
    assert_eq!(timeline.frames_per_scene, 6);
    assert_eq!(timeline.total_frames, 18);
    assert_eq!(sink.frames.len(), 19);

    let cfg = sink.config().unwrap();
    assert_eq!((cfg.width, cfg.height, cfg.fps), (1280, 720, 30));
    assert_eq!(cfg.codec.name, CODEC_PREFERENCES[0].name);

    for (i, (idx, frame)) in sink.frames.iter().enumerate() {
        assert_eq!(*idx, i as u64);
        assert_eq!((frame.width, frame.height), (1280, 720));
        assert_eq!(frame.data.len(), 1280 * 720 * 4);
        assert!(frame.premultiplied);
    }

    // Text is fully faded at a scene boundary and visible mid-scene, and the
    // gradient angle keeps moving, so neighbouring scenes never repeat pixels.
    let boundary = &sink.frames[6].1.data;
    let mid_scene = &sink.frames[9].1.data;
    assert_ne!(boundary, mid_scene);
    assert_ne!(
        sink.frames.first().unwrap().1.data,
        sink.frames.last().unwrap().1.data
    );
}

#[test]
fn the_same_frame_renders_to_identical_pixels() {
    if !font_available() {
        eprintln!("skipping: no system font available");
        return;
    }

    let scenes = parse_script("Launch day | everything in one take");
    let style = StyleConfig::default();

    let first = render_single_frame(&scenes, &style, 45).unwrap();
    let again = render_single_frame(&scenes, &style, 45).unwrap();

    assert_eq!(first.data, again.data);
}

#[test]
fn style_overrides_change_the_rendered_pixels() {
    if !font_available() {
        eprintln!("skipping: no system font available");
        return;
    }

    let scenes = parse_script("Launch day | everything in one take");
    let base = StyleConfig::default();
    let themed = StyleConfig {
        background_start: "#102030".parse().unwrap(),
        background_end: "#405060".parse().unwrap(),
        ..StyleConfig::default()
    };

    let plain = render_single_frame(&scenes, &base, 10).unwrap();
    let tinted = render_single_frame(&scenes, &themed, 10).unwrap();

    assert_ne!(plain.data, tinted.data);
}
