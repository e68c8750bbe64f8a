use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::color::Rgba8;
use crate::error::{PromoreelError, PromoreelResult};

/// Output frame width in pixels.
pub const FRAME_WIDTH: u32 = 1280;
/// Output frame height in pixels.
pub const FRAME_HEIGHT: u32 = 720;
/// Output frame rate in frames per second.
pub const FPS: u32 = 30;
/// Target video bitrate in bits per second.
pub const BITRATE_BPS: u32 = 6_000_000;
/// Suggested output file name, without extension.
pub const DEFAULT_BASENAME: &str = "promo";

/// Visual style for a render.
///
/// The render session clones this at start, so edits to the caller's copy
/// never affect frames of an in-flight render.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    /// Title text and odd-indexed background blobs.
    pub primary: Rgba8,
    /// Progress fill and even-indexed background blobs.
    pub accent: Rgba8,
    pub background_start: Rgba8,
    pub background_end: Rgba8,
    pub scene_duration_seconds: f64,
    /// TTF/OTF file to shape text with. When unset, a usable sans face is
    /// searched for in the conventional system font directories.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font: Option<PathBuf>,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            primary: Rgba8::opaque(245, 247, 255),
            accent: Rgba8::opaque(124, 92, 255),
            background_start: Rgba8::opaque(18, 20, 28),
            background_end: Rgba8::opaque(31, 39, 66),
            scene_duration_seconds: 4.0,
            font: None,
        }
    }
}

impl StyleConfig {
    pub fn validate(&self) -> PromoreelResult<()> {
        if !self.scene_duration_seconds.is_finite() || self.scene_duration_seconds <= 0.0 {
            return Err(PromoreelError::validation(
                "scene_duration_seconds must be finite and > 0",
            ));
        }
        Ok(())
    }

    /// Load a style from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> PromoreelResult<Self> {
        let f = std::fs::File::open(path)
            .with_context(|| format!("open style file '{}'", path.display()))?;
        let r = std::io::BufReader::new(f);
        let style: Self = serde_json::from_reader(r)
            .with_context(|| format!("parse style JSON '{}'", path.display()))?;
        Ok(style)
    }
}
