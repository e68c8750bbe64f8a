#![forbid(unsafe_code)]

pub mod color;
pub mod encode_ffmpeg;
pub mod error;
pub mod layout;
pub mod paint;
pub mod render;
pub mod script;
pub mod session;
pub mod sink;
pub mod style;
pub mod timeline;

pub use color::Rgba8;
pub use encode_ffmpeg::{
    CODEC_PREFERENCES, CaptureSession, CaptureSupport, CodecChoice, Container, VideoArtifact,
    is_ffmpeg_on_path, negotiate_codec, probe_support,
};
pub use error::{PromoreelError, PromoreelResult};
pub use layout::{TextShaper, wrap_text};
pub use paint::ScenePainter;
pub use render::{FrameRGBA, Surface};
pub use script::{Scene, parse_script};
pub use session::{
    CancelToken, CaptureProbe, FfmpegProbe, FrameClock, ImmediateClock, PacedClock, RenderOpts,
    RenderPhase, RenderSession, render_single_frame, render_video,
};
pub use sink::{FrameSink, InMemorySink, SinkConfig};
pub use style::{BITRATE_BPS, DEFAULT_BASENAME, FPS, FRAME_HEIGHT, FRAME_WIDTH, StyleConfig};
pub use timeline::{FrameSample, Timeline};
