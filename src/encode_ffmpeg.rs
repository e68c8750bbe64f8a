use std::{
    path::{Path, PathBuf},
    process::{Child, ChildStderr, ChildStdin, Command, Stdio},
    thread::JoinHandle,
};

use crate::{
    error::{PromoreelError, PromoreelResult},
    render::FrameRGBA,
    sink::{FrameSink, SinkConfig},
    style::BITRATE_BPS,
};

/// Output container for an encoded video.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Container {
    Webm,
    Mp4,
}

impl Container {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Webm => "webm",
            Self::Mp4 => "mp4",
        }
    }

    fn muxer(self) -> &'static str {
        match self {
            Self::Webm => "webm",
            Self::Mp4 => "mp4",
        }
    }
}

/// One encoder the capture pipeline knows how to drive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CodecChoice {
    /// Short label for logs and artifact metadata, e.g. "vp9".
    pub name: &'static str,
    /// ffmpeg encoder id, e.g. "libvpx-vp9".
    pub encoder: &'static str,
    pub container: Container,
}

/// Codecs in negotiation order: WebM first, MP4 as the fallback family.
pub const CODEC_PREFERENCES: [CodecChoice; 4] = [
    CodecChoice {
        name: "vp9",
        encoder: "libvpx-vp9",
        container: Container::Webm,
    },
    CodecChoice {
        name: "vp8",
        encoder: "libvpx",
        container: Container::Webm,
    },
    CodecChoice {
        name: "h264",
        encoder: "libx264",
        container: Container::Mp4,
    },
    CodecChoice {
        name: "mpeg4",
        encoder: "mpeg4",
        container: Container::Mp4,
    },
];

pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// What the current host can capture with, reported without failing.
#[derive(Clone, Copy, Debug)]
pub struct CaptureSupport {
    pub ffmpeg: bool,
    pub codec: Option<CodecChoice>,
}

pub fn probe_support() -> CaptureSupport {
    if !is_ffmpeg_on_path() {
        return CaptureSupport {
            ffmpeg: false,
            codec: None,
        };
    }
    CaptureSupport {
        ffmpeg: true,
        codec: negotiate_codec().ok(),
    }
}

/// Pick the first preferred codec the installed ffmpeg can encode with.
pub fn negotiate_codec() -> PromoreelResult<CodecChoice> {
    let listing = encoder_listing()?;
    choose_codec(&listing).ok_or_else(|| {
        PromoreelError::no_supported_codec(
            "ffmpeg has none of the supported encoders (libvpx-vp9, libvpx, libx264, mpeg4)",
        )
    })
}

fn encoder_listing() -> PromoreelResult<String> {
    let output = Command::new("ffmpeg")
        .args(["-hide_banner", "-encoders"])
        .stderr(Stdio::null())
        .output()
        .map_err(|e| PromoreelError::no_supported_codec(format!("could not list encoders: {e}")))?;
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn choose_codec(listing: &str) -> Option<CodecChoice> {
    let available = parse_encoder_list(listing);
    CODEC_PREFERENCES
        .iter()
        .copied()
        .find(|choice| available.iter().any(|name| name == choice.encoder))
}

/// Names of the video encoders in `ffmpeg -encoders` output.
///
/// The listing opens with a flag legend, then a `------` separator, then one
/// encoder per line as `<flags> <name> <description>` where a leading `V`
/// flag marks video encoders.
fn parse_encoder_list(listing: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut past_separator = false;

    for line in listing.lines() {
        let trimmed = line.trim();
        if !past_separator {
            past_separator = trimmed.starts_with("------");
            continue;
        }

        let mut fields = trimmed.split_whitespace();
        let (Some(flags), Some(name)) = (fields.next(), fields.next()) else {
            continue;
        };
        if flags.starts_with('V') {
            names.push(name.to_owned());
        }
    }
    names
}

/// Everything the spawned encoder needs to know about the incoming stream.
#[derive(Clone, Debug)]
pub struct EncodeConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub codec: CodecChoice,
    pub bitrate_bps: u32,
}

impl EncodeConfig {
    pub fn validate(&self) -> PromoreelResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(PromoreelError::validation(
                "encode width/height must be non-zero",
            ));
        }
        if self.fps == 0 {
            return Err(PromoreelError::validation("encode fps must be non-zero"));
        }
        if !self.width.is_multiple_of(2) || !self.height.is_multiple_of(2) {
            // yuv420p output needs even dimensions.
            return Err(PromoreelError::validation(
                "encode width/height must be even (required for yuv420p output)",
            ));
        }
        if self.bitrate_bps == 0 {
            return Err(PromoreelError::validation("encode bitrate must be non-zero"));
        }
        Ok(())
    }
}

/// Streams raw frames into a spawned ffmpeg and collects the muxed container
/// bytes off its stdout, chunk by chunk, as they are produced.
///
/// Implements [`FrameSink`]: `begin` spawns the encoder, `end` finalizes it
/// and stores the finished [`VideoArtifact`] for [`take_artifact`].
///
/// [`take_artifact`]: CaptureSession::take_artifact
pub struct CaptureSession {
    bitrate_bps: u32,
    active: Option<ActiveCapture>,
    artifact: Option<VideoArtifact>,
}

struct ActiveCapture {
    cfg: EncodeConfig,
    child: Child,
    stdin: Option<ChildStdin>,
    stderr: Option<ChildStderr>,
    collector: Option<JoinHandle<std::io::Result<Vec<Vec<u8>>>>>,
    scratch: Vec<u8>,
    frames_pushed: u64,
}

impl CaptureSession {
    pub fn new() -> Self {
        Self {
            bitrate_bps: BITRATE_BPS,
            active: None,
            artifact: None,
        }
    }

    /// The finished video, once `end` has run.
    pub fn take_artifact(&mut self) -> Option<VideoArtifact> {
        self.artifact.take()
    }

    /// Kill the encoder and discard any collected output.
    pub fn abort(&mut self) {
        if let Some(mut active) = self.active.take() {
            drop(active.stdin.take());
            let _ = active.child.kill();
            let _ = active.child.wait();
            if let Some(handle) = active.collector.take() {
                let _ = handle.join();
            }
        }
    }

    fn start(&mut self, cfg: EncodeConfig) -> PromoreelResult<()> {
        cfg.validate()?;
        if self.active.is_some() {
            return Err(PromoreelError::encode("capture session already recording"));
        }

        // System ffmpeg over pipes keeps the build free of native FFmpeg
        // headers and libraries.
        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        cmd.args([
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
            "-r",
            &cfg.fps.to_string(),
            "-i",
            "pipe:0",
            "-an",
            "-c:v",
            cfg.codec.encoder,
            "-b:v",
            &format!("{}k", cfg.bitrate_bps / 1000),
            "-pix_fmt",
            "yuv420p",
        ]);
        if cfg.codec.container == Container::Mp4 {
            // mp4 over a non-seekable pipe needs a fragmented layout.
            cmd.args(["-movflags", "+frag_keyframe+empty_moov"]);
        }
        cmd.args(["-f", cfg.codec.container.muxer(), "pipe:1"]);

        let mut child = cmd.spawn().map_err(|e| {
            PromoreelError::encode(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| PromoreelError::encode("failed to open ffmpeg stdin"))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| PromoreelError::encode("failed to open ffmpeg stdout"))?;
        let stderr = child.stderr.take();

        // Drain the container stream as it is produced so ffmpeg never
        // blocks on a full stdout pipe.
        let collector = std::thread::spawn(move || -> std::io::Result<Vec<Vec<u8>>> {
            use std::io::Read as _;
            let mut chunks = Vec::new();
            let mut buf = vec![0u8; 64 * 1024];
            loop {
                let n = stdout.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                chunks.push(buf[..n].to_vec());
            }
            Ok(chunks)
        });

        self.active = Some(ActiveCapture {
            scratch: vec![0u8; (cfg.width * cfg.height * 4) as usize],
            cfg,
            child,
            stdin: Some(stdin),
            stderr,
            collector: Some(collector),
            frames_pushed: 0,
        });
        Ok(())
    }

    fn push(&mut self, frame: &FrameRGBA) -> PromoreelResult<()> {
        let Some(active) = self.active.as_mut() else {
            return Err(PromoreelError::encode("capture session is not recording"));
        };

        if frame.width != active.cfg.width || frame.height != active.cfg.height {
            return Err(PromoreelError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, active.cfg.width, active.cfg.height
            )));
        }
        if frame.data.len() != active.scratch.len() {
            return Err(PromoreelError::validation(
                "frame.data size mismatch with width*height*4",
            ));
        }

        flatten_to_opaque_rgba8(
            &mut active.scratch,
            &frame.data,
            frame.premultiplied,
            [0, 0, 0, 255],
        )?;

        let Some(stdin) = active.stdin.as_mut() else {
            return Err(PromoreelError::encode("capture session already finalized"));
        };

        use std::io::Write as _;
        stdin.write_all(&active.scratch).map_err(|e| {
            PromoreelError::encode(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;
        active.frames_pushed += 1;
        Ok(())
    }

    /// Close the frame stream, wait for the encoder, and assemble the
    /// collected chunks into a temp-file-backed artifact.
    fn finalize(&mut self) -> PromoreelResult<VideoArtifact> {
        let Some(mut active) = self.active.take() else {
            return Err(PromoreelError::encode("capture session is not recording"));
        };

        drop(active.stdin.take());

        let mut stderr_text = String::new();
        if let Some(mut stderr) = active.stderr.take() {
            use std::io::Read as _;
            let _ = stderr.read_to_string(&mut stderr_text);
        }

        let status = active
            .child
            .wait()
            .map_err(|e| PromoreelError::encode(format!("failed to wait for ffmpeg: {e}")))?;

        let chunks = match active.collector.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| PromoreelError::encode("video collector thread panicked"))?
                .map_err(|e| PromoreelError::encode(format!("read encoded stream: {e}")))?,
            None => Vec::new(),
        };

        if !status.success() {
            return Err(PromoreelError::encode(format!(
                "ffmpeg exited with status {status}: {}",
                stderr_text.trim()
            )));
        }

        let byte_len: usize = chunks.iter().map(Vec::len).sum();
        if byte_len == 0 {
            return Err(PromoreelError::encode(format!(
                "encoder produced no data after {} frames",
                active.frames_pushed
            )));
        }

        let path = scratch_artifact_path(active.cfg.codec.container.extension());
        let mut guard = TempFileGuard(Some(path.clone()));
        write_chunks(&path, &chunks)?;
        guard.0.take();

        Ok(VideoArtifact {
            path,
            codec: active.cfg.codec,
            byte_len: byte_len as u64,
            owned: true,
        })
    }
}

impl Default for CaptureSession {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.abort();
    }
}

impl FrameSink for CaptureSession {
    fn begin(&mut self, cfg: SinkConfig) -> PromoreelResult<()> {
        self.start(EncodeConfig {
            width: cfg.width,
            height: cfg.height,
            fps: cfg.fps,
            codec: cfg.codec,
            bitrate_bps: self.bitrate_bps,
        })
    }

    fn push_frame(&mut self, _idx: u64, frame: &FrameRGBA) -> PromoreelResult<()> {
        self.push(frame)
    }

    fn end(&mut self) -> PromoreelResult<()> {
        let artifact = self.finalize()?;
        self.artifact = Some(artifact);
        Ok(())
    }
}

fn write_chunks(path: &Path, chunks: &[Vec<u8>]) -> PromoreelResult<()> {
    use std::io::Write as _;
    let mut file = std::fs::File::create(path).map_err(|e| {
        PromoreelError::encode(format!("create video file '{}': {e}", path.display()))
    })?;
    for chunk in chunks {
        file.write_all(chunk).map_err(|e| {
            PromoreelError::encode(format!("write video file '{}': {e}", path.display()))
        })?;
    }
    Ok(())
}

fn scratch_artifact_path(extension: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "promoreel_capture_{}_{}.{extension}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos(),
    ))
}

struct TempFileGuard(Option<PathBuf>);

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if let Some(path) = self.0.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// Finished video on disk.
///
/// The backing file lives in the system temp directory and is removed when
/// the artifact drops, unless [`persist`] moved it to a final destination.
///
/// [`persist`]: VideoArtifact::persist
#[derive(Debug)]
pub struct VideoArtifact {
    path: PathBuf,
    codec: CodecChoice,
    byte_len: u64,
    owned: bool,
}

impl VideoArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn codec(&self) -> CodecChoice {
        self.codec
    }

    pub fn byte_len(&self) -> u64 {
        self.byte_len
    }

    /// Move the video to `dest`, creating parent directories as needed.
    /// Falls back to copy-and-delete when `dest` is on another filesystem.
    pub fn persist(mut self, dest: &Path) -> PromoreelResult<PathBuf> {
        ensure_parent_dir(dest)?;

        if std::fs::rename(&self.path, dest).is_err() {
            if let Err(e) = std::fs::copy(&self.path, dest) {
                let _ = std::fs::remove_file(dest);
                return Err(PromoreelError::encode(format!(
                    "move video to '{}': {e}",
                    dest.display()
                )));
            }
            let _ = std::fs::remove_file(&self.path);
        }

        self.owned = false;
        Ok(dest.to_path_buf())
    }
}

impl Drop for VideoArtifact {
    fn drop(&mut self) {
        if self.owned {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

fn ensure_parent_dir(path: &Path) -> PromoreelResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

fn flatten_to_opaque_rgba8(
    dst: &mut [u8],
    src: &[u8],
    src_is_premul: bool,
    bg_rgba: [u8; 4],
) -> PromoreelResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(PromoreelError::validation(
            "flatten_to_opaque_rgba8 expects equal-length rgba8 buffers",
        ));
    }

    let bg_r = bg_rgba[0] as u16;
    let bg_g = bg_rgba[1] as u16;
    let bg_b = bg_rgba[2] as u16;

    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let a = s[3] as u16;
        if a == 255 {
            d.copy_from_slice(s);
            d[3] = 255;
            continue;
        }

        let inv = 255u16 - a;

        let (r, g, b) = if src_is_premul {
            (
                s[0] as u16 + mul_div255(bg_r, inv),
                s[1] as u16 + mul_div255(bg_g, inv),
                s[2] as u16 + mul_div255(bg_b, inv),
            )
        } else {
            (
                mul_div255(s[0] as u16, a) + mul_div255(bg_r, inv),
                mul_div255(s[1] as u16, a) + mul_div255(bg_g, inv),
                mul_div255(s[2] as u16, a) + mul_div255(bg_b, inv),
            )
        };

        d[0] = r.min(255) as u8;
        d[1] = g.min(255) as u8;
        d[2] = b.min(255) as u8;
        d[3] = 255;
    }

    Ok(())
}

fn mul_div255(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}
