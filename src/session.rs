use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use crate::{
    encode_ffmpeg::{self, CaptureSession, CodecChoice, VideoArtifact},
    error::{PromoreelError, PromoreelResult},
    paint::ScenePainter,
    render::{FrameRGBA, Surface},
    script::Scene,
    sink::{FrameSink, SinkConfig},
    style::{FPS, FRAME_HEIGHT, FRAME_WIDTH, StyleConfig},
    timeline::Timeline,
};

/// Lifecycle of one render session. A session is single-use: it either
/// completes or fails, and a new request needs a new session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderPhase {
    Idle,
    Rendering,
    Completed,
    Failed,
}

/// Cooperative cancellation flag. Clones share the flag, so one handle can
/// cancel a render driven from another thread.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Paces the render loop. One `tick` blocks until the next frame should be
/// painted.
pub trait FrameClock {
    fn tick(&mut self);
}

/// Runs the loop as fast as frames can be painted.
#[derive(Debug, Default)]
pub struct ImmediateClock;

impl FrameClock for ImmediateClock {
    fn tick(&mut self) {}
}

/// Real-time pacing at a fixed frame rate, for renders that should advance
/// at presentation speed.
#[derive(Debug)]
pub struct PacedClock {
    period: Duration,
    next_deadline: Option<Instant>,
}

impl PacedClock {
    pub fn new(fps: u32) -> Self {
        Self {
            period: Duration::from_secs_f64(1.0 / f64::from(fps.max(1))),
            next_deadline: None,
        }
    }
}

impl FrameClock for PacedClock {
    fn tick(&mut self) {
        let now = Instant::now();
        match self.next_deadline {
            Some(deadline) => {
                if deadline > now {
                    std::thread::sleep(deadline - now);
                }
                self.next_deadline = Some(deadline.max(now) + self.period);
            }
            None => {
                self.next_deadline = Some(now + self.period);
            }
        }
    }
}

/// Capture capability checks, split out so the guard sequence can be
/// exercised without a real encoder install.
pub trait CaptureProbe {
    /// Is any encoder available at all?
    fn supported(&self) -> bool;
    /// Pick the codec this capture will record with.
    fn negotiate(&self) -> PromoreelResult<CodecChoice>;
}

/// Probes the system ffmpeg.
#[derive(Debug, Default)]
pub struct FfmpegProbe;

impl CaptureProbe for FfmpegProbe {
    fn supported(&self) -> bool {
        encode_ffmpeg::is_ffmpeg_on_path()
    }

    fn negotiate(&self) -> PromoreelResult<CodecChoice> {
        encode_ffmpeg::negotiate_codec()
    }
}

/// Drives one render from guard checks through frame pumping to completion.
///
/// `run` walks every timeline frame in order, paints it, and hands it to the
/// sink. All preconditions are checked before the first frame: capture
/// support, the surface, a non-empty script, the codec, and the text shaper,
/// in that order, so the first missing requirement is the one reported.
pub struct RenderSession {
    scenes: Vec<Scene>,
    style: StyleConfig,
    phase: RenderPhase,
}

impl RenderSession {
    pub fn new(scenes: Vec<Scene>, style: StyleConfig) -> PromoreelResult<Self> {
        style.validate()?;
        Ok(Self {
            scenes,
            style,
            phase: RenderPhase::Idle,
        })
    }

    pub fn phase(&self) -> RenderPhase {
        self.phase
    }

    #[tracing::instrument(skip(self, probe, sink, clock, cancel))]
    pub fn run(
        &mut self,
        probe: &dyn CaptureProbe,
        sink: &mut dyn FrameSink,
        clock: &mut dyn FrameClock,
        cancel: &CancelToken,
    ) -> PromoreelResult<Timeline> {
        if self.phase != RenderPhase::Idle {
            return Err(PromoreelError::validation("render session already used"));
        }
        match self.drive(probe, sink, clock, cancel) {
            Ok(timeline) => {
                self.phase = RenderPhase::Completed;
                Ok(timeline)
            }
            Err(e) => {
                self.phase = RenderPhase::Failed;
                Err(e)
            }
        }
    }

    fn drive(
        &mut self,
        probe: &dyn CaptureProbe,
        sink: &mut dyn FrameSink,
        clock: &mut dyn FrameClock,
        cancel: &CancelToken,
    ) -> PromoreelResult<Timeline> {
        if !probe.supported() {
            return Err(PromoreelError::capture_unsupported(
                "ffmpeg was not found on PATH",
            ));
        }
        let mut surface = Surface::new(FRAME_WIDTH, FRAME_HEIGHT)?;
        if self.scenes.is_empty() {
            return Err(PromoreelError::NoScenes);
        }
        let timeline = Timeline::new(self.scenes.len(), self.style.scene_duration_seconds)?;
        let codec = probe.negotiate()?;
        let mut painter = ScenePainter::new(self.style.clone())?;

        self.phase = RenderPhase::Rendering;

        sink.begin(SinkConfig {
            width: surface.width(),
            height: surface.height(),
            fps: FPS,
            codec,
        })?;

        let scene_count = self.scenes.len();
        for frame in 0..=timeline.total_frames {
            if cancel.is_cancelled() {
                return Err(PromoreelError::Cancelled);
            }
            clock.tick();

            let sample = timeline.sample(frame);
            painter.paint(
                &mut surface,
                &self.scenes[sample.scene_index],
                &sample,
                scene_count,
            )?;
            sink.push_frame(frame, &surface.to_frame())?;
        }

        sink.end()?;
        Ok(timeline)
    }
}

/// Options for a full script-to-video render.
#[derive(Debug, Default)]
pub struct RenderOpts {
    /// Pace frames at presentation speed instead of rendering flat out.
    pub paced: bool,
    pub cancel: CancelToken,
}

/// Front door: scenes in, finished video artifact out.
///
/// The artifact's backing file lives in the system temp directory; call
/// [`VideoArtifact::persist`] to move it somewhere durable.
#[tracing::instrument(skip(scenes, style))]
pub fn render_video(
    scenes: Vec<Scene>,
    style: StyleConfig,
    opts: RenderOpts,
) -> PromoreelResult<VideoArtifact> {
    let mut session = RenderSession::new(scenes, style)?;
    let mut capture = CaptureSession::new();
    let mut clock: Box<dyn FrameClock> = if opts.paced {
        Box::new(PacedClock::new(FPS))
    } else {
        Box::new(ImmediateClock)
    };

    session.run(&FfmpegProbe, &mut capture, clock.as_mut(), &opts.cancel)?;
    capture
        .take_artifact()
        .ok_or_else(|| PromoreelError::encode("capture session produced no artifact"))
}

/// Render exactly one frame of the script, for previews and thumbnails.
pub fn render_single_frame(
    scenes: &[Scene],
    style: &StyleConfig,
    frame: u64,
) -> PromoreelResult<FrameRGBA> {
    if scenes.is_empty() {
        return Err(PromoreelError::NoScenes);
    }
    let timeline = Timeline::new(scenes.len(), style.scene_duration_seconds)?;
    if frame > timeline.total_frames {
        return Err(PromoreelError::validation(format!(
            "frame {frame} is out of range; the timeline ends at frame {}",
            timeline.total_frames
        )));
    }

    let mut surface = Surface::new(FRAME_WIDTH, FRAME_HEIGHT)?;
    let mut painter = ScenePainter::new(style.clone())?;
    let sample = timeline.sample(frame);
    painter.paint(&mut surface, &scenes[sample.scene_index], &sample, scenes.len())?;
    Ok(surface.to_frame())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode_ffmpeg::CODEC_PREFERENCES;
    use crate::script::parse_script;
    use crate::sink::InMemorySink;

    struct StubProbe {
        supported: bool,
        codec_ok: bool,
    }

    impl CaptureProbe for StubProbe {
        fn supported(&self) -> bool {
            self.supported
        }

        fn negotiate(&self) -> PromoreelResult<CodecChoice> {
            if self.codec_ok {
                Ok(CODEC_PREFERENCES[0])
            } else {
                Err(PromoreelError::no_supported_codec("stubbed out"))
            }
        }
    }

    fn ok_probe() -> StubProbe {
        StubProbe {
            supported: true,
            codec_ok: true,
        }
    }

    fn font_available() -> bool {
        crate::layout::TextShaper::new(None).is_ok()
    }

    /// Two scenes, 0.1s each: 3 frames per scene, 7 pushed frames total.
    fn short_script() -> (Vec<Scene>, StyleConfig) {
        let scenes = parse_script("Launch | ship it fast\nScale | grow without fear");
        let style = StyleConfig {
            scene_duration_seconds: 0.1,
            ..StyleConfig::default()
        };
        (scenes, style)
    }

    #[derive(Default)]
    struct CountingClock {
        ticks: u64,
    }

    impl FrameClock for CountingClock {
        fn tick(&mut self) {
            self.ticks += 1;
        }
    }

    struct CancellingClock {
        after: u64,
        ticks: u64,
        token: CancelToken,
    }

    impl FrameClock for CancellingClock {
        fn tick(&mut self) {
            self.ticks += 1;
            if self.ticks >= self.after {
                self.token.cancel();
            }
        }
    }

    #[test]
    fn empty_script_fails_with_no_scenes_before_any_capture() {
        let mut session = RenderSession::new(Vec::new(), StyleConfig::default()).unwrap();
        let mut sink = InMemorySink::new();

        let err = session
            .run(
                &ok_probe(),
                &mut sink,
                &mut ImmediateClock,
                &CancelToken::new(),
            )
            .unwrap_err();

        assert!(matches!(err, PromoreelError::NoScenes));
        assert_eq!(session.phase(), RenderPhase::Failed);
        assert!(sink.config().is_none());
        assert!(sink.frames.is_empty());
    }

    #[test]
    fn missing_encoder_is_reported_ahead_of_an_empty_script() {
        let probe = StubProbe {
            supported: false,
            codec_ok: false,
        };
        let mut session = RenderSession::new(Vec::new(), StyleConfig::default()).unwrap();
        let mut sink = InMemorySink::new();

        let err = session
            .run(&probe, &mut sink, &mut ImmediateClock, &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, PromoreelError::CaptureUnsupported(_)));
    }

    #[test]
    fn codec_failure_happens_before_any_frame_is_painted() {
        let probe = StubProbe {
            supported: true,
            codec_ok: false,
        };
        let (scenes, style) = short_script();
        let mut session = RenderSession::new(scenes, style).unwrap();
        let mut sink = InMemorySink::new();

        let err = session
            .run(&probe, &mut sink, &mut ImmediateClock, &CancelToken::new())
            .unwrap_err();

        assert!(matches!(err, PromoreelError::NoSupportedCodec(_)));
        assert_eq!(session.phase(), RenderPhase::Failed);
        assert!(sink.config().is_none());
        assert!(sink.frames.is_empty());
    }

    #[test]
    fn renders_every_timeline_frame_inclusive_into_the_sink() {
        if !font_available() {
            eprintln!("skipping: no system font available");
            return;
        }

        let (scenes, style) = short_script();
        let mut session = RenderSession::new(scenes, style).unwrap();
        let mut sink = InMemorySink::new();
        let mut clock = CountingClock::default();

        let timeline = session
            .run(&ok_probe(), &mut sink, &mut clock, &CancelToken::new())
            .unwrap();

        assert_eq!(session.phase(), RenderPhase::Completed);
        assert_eq!(timeline.total_frames, 6);
        assert_eq!(sink.frames.len(), 7);
        assert_eq!(clock.ticks, 7);

        let cfg = sink.config().unwrap();
        assert_eq!((cfg.width, cfg.height, cfg.fps), (1280, 720, 30));

        for (i, (idx, frame)) in sink.frames.iter().enumerate() {
            assert_eq!(*idx, i as u64);
            assert_eq!((frame.width, frame.height), (1280, 720));
        }
        // The progress bar alone guarantees the first and last frames differ.
        assert_ne!(
            sink.frames.first().unwrap().1.data,
            sink.frames.last().unwrap().1.data
        );

        let err = session
            .run(
                &ok_probe(),
                &mut sink,
                &mut ImmediateClock,
                &CancelToken::new(),
            )
            .unwrap_err();
        assert!(matches!(err, PromoreelError::Validation(_)));
    }

    #[test]
    fn cancellation_mid_run_stops_the_frame_pump() {
        if !font_available() {
            eprintln!("skipping: no system font available");
            return;
        }

        let (scenes, style) = short_script();
        let mut session = RenderSession::new(scenes, style).unwrap();
        let mut sink = InMemorySink::new();
        let token = CancelToken::new();
        let mut clock = CancellingClock {
            after: 3,
            ticks: 0,
            token: token.clone(),
        };

        let err = session
            .run(&ok_probe(), &mut sink, &mut clock, &token)
            .unwrap_err();

        assert!(matches!(err, PromoreelError::Cancelled));
        assert_eq!(session.phase(), RenderPhase::Failed);
        assert_eq!(sink.frames.len(), 3);
    }

    #[test]
    fn single_frame_rendering_validates_its_inputs() {
        let style = StyleConfig::default();
        assert!(matches!(
            render_single_frame(&[], &style, 0),
            Err(PromoreelError::NoScenes)
        ));

        let scenes = parse_script("Hello");
        // One 4s scene ends at frame 120; 121 is past the end.
        assert!(matches!(
            render_single_frame(&scenes, &style, 121),
            Err(PromoreelError::Validation(_))
        ));

        if !font_available() {
            eprintln!("skipping: no system font available");
            return;
        }
        let frame = render_single_frame(&scenes, &style, 0).unwrap();
        assert_eq!((frame.width, frame.height), (1280, 720));
        assert_eq!(frame.data.len(), 1280 * 720 * 4);
        assert!(frame.premultiplied);
    }

    #[test]
    fn cancel_token_clones_share_the_flag() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn paced_clock_waits_out_the_frame_period() {
        let mut clock = PacedClock::new(100);
        let start = Instant::now();
        clock.tick();
        clock.tick();
        assert!(start.elapsed() >= Duration::from_millis(10));
    }
}
