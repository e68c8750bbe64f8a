use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use promoreel::{Rgba8, StyleConfig};

#[derive(Parser, Debug)]
#[command(name = "promoreel", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render the whole script to a video (requires `ffmpeg` on PATH).
    Render(RenderArgs),
    /// Render a single frame as a PNG.
    Frame(FrameArgs),
    /// Parse the script and print its scenes and timeline as JSON.
    Scenes(ScenesArgs),
    /// Report whether this host can capture video, and with which codec.
    Probe,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input script, one scene per line as 'Title | body text'. '-' reads stdin.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output video path. Defaults to 'promo.<ext>' with the extension of
    /// the negotiated container.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Pace frames at presentation speed instead of rendering flat out.
    #[arg(long)]
    paced: bool,

    #[command(flatten)]
    style: StyleArgs,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Input script, one scene per line as 'Title | body text'. '-' reads stdin.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Frame index (0-based).
    #[arg(long)]
    frame: u64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    #[command(flatten)]
    style: StyleArgs,
}

#[derive(Parser, Debug)]
struct ScenesArgs {
    /// Input script, one scene per line as 'Title | body text'. '-' reads stdin.
    #[arg(long = "in")]
    in_path: PathBuf,

    #[command(flatten)]
    style: StyleArgs,
}

#[derive(Parser, Debug)]
struct StyleArgs {
    /// Style JSON file. The flags below override its fields.
    #[arg(long)]
    style: Option<PathBuf>,

    /// Title and body text color, e.g. '#f5f7ff'.
    #[arg(long)]
    primary: Option<Rgba8>,

    /// Accent color for the progress bar and background blobs.
    #[arg(long)]
    accent: Option<Rgba8>,

    /// Background gradient start color.
    #[arg(long)]
    background_start: Option<Rgba8>,

    /// Background gradient end color.
    #[arg(long)]
    background_end: Option<Rgba8>,

    /// Seconds each scene stays on screen.
    #[arg(long)]
    scene_seconds: Option<f64>,

    /// Font file (.ttf/.otf). Defaults to a system sans face.
    #[arg(long)]
    font: Option<PathBuf>,
}

impl StyleArgs {
    fn resolve(&self) -> anyhow::Result<StyleConfig> {
        let mut style = match &self.style {
            Some(path) => StyleConfig::from_json_file(path)?,
            None => StyleConfig::default(),
        };

        if let Some(c) = self.primary {
            style.primary = c;
        }
        if let Some(c) = self.accent {
            style.accent = c;
        }
        if let Some(c) = self.background_start {
            style.background_start = c;
        }
        if let Some(c) = self.background_end {
            style.background_end = c;
        }
        if let Some(s) = self.scene_seconds {
            style.scene_duration_seconds = s;
        }
        if let Some(f) = &self.font {
            style.font = Some(f.clone());
        }

        style.validate()?;
        Ok(style)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Frame(args) => cmd_frame(args),
        Command::Scenes(args) => cmd_scenes(args),
        Command::Probe => cmd_probe(),
    }
}

fn read_script(path: &Path) -> anyhow::Result<String> {
    if path.as_os_str() == "-" {
        use std::io::Read as _;
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("read script from stdin")?;
        Ok(text)
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("read script '{}'", path.display()))
    }
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let text = read_script(&args.in_path)?;
    let scenes = promoreel::parse_script(&text);
    let style = args.style.resolve()?;

    let artifact = promoreel::render_video(
        scenes,
        style,
        promoreel::RenderOpts {
            paced: args.paced,
            cancel: promoreel::CancelToken::new(),
        },
    )?;

    let codec = artifact.codec();
    let byte_len = artifact.byte_len();
    let out = match args.out {
        Some(out) => out,
        None => PathBuf::from(format!(
            "{}.{}",
            promoreel::DEFAULT_BASENAME,
            codec.container.extension()
        )),
    };
    let path = artifact.persist(&out)?;

    eprintln!("wrote {} ({}, {byte_len} bytes)", path.display(), codec.name);
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let text = read_script(&args.in_path)?;
    let scenes = promoreel::parse_script(&text);
    let style = args.style.resolve()?;

    let frame = promoreel::render_single_frame(&scenes, &style, args.frame)?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }

    image::save_buffer_with_format(
        &args.out,
        &frame.data,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_scenes(args: ScenesArgs) -> anyhow::Result<()> {
    let text = read_script(&args.in_path)?;
    let scenes = promoreel::parse_script(&text);
    let style = args.style.resolve()?;

    let timeline = if scenes.is_empty() {
        None
    } else {
        Some(promoreel::Timeline::new(
            scenes.len(),
            style.scene_duration_seconds,
        )?)
    };

    let doc = serde_json::json!({
        "scenes": scenes,
        "timeline": timeline,
    });
    serde_json::to_writer_pretty(std::io::stdout().lock(), &doc)
        .context("write scene listing")?;
    println!();
    Ok(())
}

fn cmd_probe() -> anyhow::Result<()> {
    let support = promoreel::probe_support();
    if !support.ffmpeg {
        anyhow::bail!("capture unsupported: ffmpeg not found on PATH");
    }
    let Some(codec) = support.codec else {
        anyhow::bail!("capture unsupported: ffmpeg has no usable video encoder");
    };

    println!("ffmpeg: ok");
    println!(
        "codec: {} (encoder {}, container .{})",
        codec.name,
        codec.encoder,
        codec.container.extension()
    );
    match promoreel::TextShaper::new(None) {
        Ok(shaper) => println!("font: {}", shaper.family_name()),
        Err(e) => println!("font: unavailable ({e})"),
    }
    Ok(())
}
