use crate::encode_ffmpeg::CodecChoice;
use crate::error::PromoreelResult;
use crate::render::FrameRGBA;

/// Configuration handed to a [`FrameSink`] before the first frame.
#[derive(Debug, Clone, Copy)]
pub struct SinkConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Codec negotiated before the render loop started.
    pub codec: CodecChoice,
}

/// Sink contract for consuming rendered frames in timeline order.
///
/// Ordering contract: `push_frame` is called exactly once per frame index, in
/// strictly increasing order from zero through the final frame inclusive.
pub trait FrameSink {
    fn begin(&mut self, cfg: SinkConfig) -> PromoreelResult<()>;
    fn push_frame(&mut self, idx: u64, frame: &FrameRGBA) -> PromoreelResult<()>;
    fn end(&mut self) -> PromoreelResult<()>;
}

/// In-memory sink for tests and embedders that want raw frames.
#[derive(Debug, Default)]
pub struct InMemorySink {
    cfg: Option<SinkConfig>,
    /// Frames in timeline order.
    pub frames: Vec<(u64, FrameRGBA)>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(&self) -> Option<SinkConfig> {
        self.cfg
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> PromoreelResult<()> {
        self.cfg = Some(cfg);
        self.frames.clear();
        Ok(())
    }

    fn push_frame(&mut self, idx: u64, frame: &FrameRGBA) -> PromoreelResult<()> {
        self.frames.push((idx, frame.clone()));
        Ok(())
    }

    fn end(&mut self) -> PromoreelResult<()> {
        Ok(())
    }
}
