use std::path::{Path, PathBuf};

use crate::color::Rgba8;
use crate::error::{PromoreelError, PromoreelResult};

/// Vertical space per line as a multiple of the font size.
pub const LINE_HEIGHT_FACTOR: f64 = 1.26;

/// Greedy word-wrap of `text` against `max_width`, where `measure` maps a
/// candidate string to its rendered pixel width.
///
/// A line is committed only when appending the next word would exceed
/// `max_width` and the line already has content, so a single word wider
/// than `max_width` overflows instead of being split. Pure: the same text,
/// width and measure give the same lines.
pub fn wrap_text(text: &str, max_width: f64, mut measure: impl FnMut(&str) -> f64) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        let candidate = format!("{current} {word}");
        if measure(&candidate) > max_width {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        } else {
            current = candidate;
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Vertical center of line `index` when `line_count` lines of `font_size`
/// are stacked symmetrically around `center_y`.
pub fn line_center_y(index: usize, line_count: usize, font_size: f64, center_y: f64) -> f64 {
    let line_height = font_size * LINE_HEIGHT_FACTOR;
    let total = line_height * line_count as f64;
    center_y - total / 2.0 + line_height * (index as f64 + 0.5)
}

/// Parley-backed shaping and measurement over one resolved font face.
///
/// The face comes from an explicit font file or, when none is given, from a
/// scan of the conventional system font directories for a usable sans face.
/// Registered once at construction; all shaping reuses it.
pub struct TextShaper {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<Rgba8>,
    family_name: String,
    font: vello_cpu::peniko::FontData,
}

impl TextShaper {
    pub fn new(font_path: Option<&Path>) -> PromoreelResult<Self> {
        let path = match font_path {
            Some(p) => p.to_path_buf(),
            None => find_system_sans_face().ok_or_else(|| {
                PromoreelError::context_unavailable(
                    "no usable font found in system font directories; pass an explicit font file",
                )
            })?,
        };
        let bytes = std::fs::read(&path).map_err(|e| {
            PromoreelError::context_unavailable(format!(
                "read font '{}': {e}",
                path.display()
            ))
        })?;

        let mut font_ctx = parley::FontContext::default();
        let families = font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(bytes.clone()), None);
        let family_id = families.first().map(|(id, _)| *id).ok_or_else(|| {
            PromoreelError::context_unavailable(format!(
                "no font families registered from '{}'",
                path.display()
            ))
        })?;
        let family_name = font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| {
                PromoreelError::context_unavailable("registered font family has no name")
            })?
            .to_string();

        let font = vello_cpu::peniko::FontData::new(vello_cpu::peniko::Blob::from(bytes), 0);

        Ok(Self {
            font_ctx,
            layout_ctx: parley::LayoutContext::new(),
            family_name,
            font,
        })
    }

    pub fn family_name(&self) -> &str {
        &self.family_name
    }

    /// Font handle for glyph drawing, backed by the same bytes the layouts
    /// were shaped with.
    pub fn font(&self) -> &vello_cpu::peniko::FontData {
        &self.font
    }

    /// Widest line advance of `text` at `size_px`, in pixels.
    pub fn measure(&mut self, text: &str, size_px: f32) -> PromoreelResult<f64> {
        check_size(size_px)?;
        Ok(self.measure_unchecked(text, size_px))
    }

    /// Shape a single-line (or `\n`-separated) text into a layout carrying
    /// `brush` on every glyph run.
    pub fn shape(
        &mut self,
        text: &str,
        size_px: f32,
        brush: Rgba8,
    ) -> PromoreelResult<parley::Layout<Rgba8>> {
        check_size(size_px)?;
        Ok(self.shape_unchecked(text, size_px, brush))
    }

    /// Wrap `text` to `max_width` using this shaper's own measurement.
    pub fn wrap(
        &mut self,
        text: &str,
        size_px: f32,
        max_width: f64,
    ) -> PromoreelResult<Vec<String>> {
        check_size(size_px)?;
        Ok(wrap_text(text, max_width, |candidate| {
            self.measure_unchecked(candidate, size_px)
        }))
    }

    fn measure_unchecked(&mut self, text: &str, size_px: f32) -> f64 {
        let layout = self.shape_unchecked(text, size_px, Rgba8::default());
        layout
            .lines()
            .map(|line| f64::from(line.metrics().advance))
            .fold(0.0, f64::max)
    }

    fn shape_unchecked(&mut self, text: &str, size_px: f32, brush: Rgba8) -> parley::Layout<Rgba8> {
        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(self.family_name.clone())),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::Brush(brush));

        let mut layout: parley::Layout<Rgba8> = builder.build(text);
        layout.break_all_lines(None);
        layout
    }
}

fn check_size(size_px: f32) -> PromoreelResult<()> {
    if !size_px.is_finite() || size_px <= 0.0 {
        return Err(PromoreelError::validation(
            "font size must be finite and > 0",
        ));
    }
    Ok(())
}

fn find_system_sans_face() -> Option<PathBuf> {
    let mut candidates = Vec::new();
    for dir in system_font_dirs() {
        collect_font_files(&dir, &mut candidates, 0);
    }
    pick_sans_face(candidates)
}

fn system_font_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![
        PathBuf::from("/usr/share/fonts"),
        PathBuf::from("/usr/local/share/fonts"),
        PathBuf::from("/System/Library/Fonts"),
        PathBuf::from("/Library/Fonts"),
        PathBuf::from("C:\\Windows\\Fonts"),
    ];
    if let Ok(home) = std::env::var("HOME") {
        dirs.push(Path::new(&home).join(".fonts"));
        dirs.push(Path::new(&home).join(".local/share/fonts"));
    }
    dirs
}

fn collect_font_files(dir: &Path, out: &mut Vec<PathBuf>, depth: usize) {
    // Font trees nest a couple of levels (e.g. truetype/dejavu).
    if depth > 4 {
        return;
    }
    let Ok(rd) = std::fs::read_dir(dir) else {
        return;
    };

    for entry in rd.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_font_files(&path, out, depth + 1);
            continue;
        }
        let Some(ext) = path.extension().and_then(|s| s.to_str()) else {
            continue;
        };
        let ext = ext.to_ascii_lowercase();
        if ext == "ttf" || ext == "otf" || ext == "ttc" {
            out.push(path);
        }
    }
}

/// Deterministic face choice: well-known sans faces first, then anything
/// with "sans" in the name that is not a bold/italic/mono cut, then any
/// font at all.
fn pick_sans_face(mut candidates: Vec<PathBuf>) -> Option<PathBuf> {
    candidates.sort();

    const PREFERRED: [&str; 6] = [
        "dejavusans",
        "liberationsans-regular",
        "notosans-regular",
        "freesans",
        "arial",
        "helvetica",
    ];
    for name in PREFERRED {
        if let Some(p) = candidates.iter().find(|p| stem_of(p) == name) {
            return Some(p.clone());
        }
    }

    if let Some(p) = candidates.iter().find(|p| {
        let stem = stem_of(p);
        stem.contains("sans")
            && !stem.contains("italic")
            && !stem.contains("oblique")
            && !stem.contains("bold")
            && !stem.contains("mono")
    }) {
        return Some(p.clone());
    }

    candidates.into_iter().next()
}

fn stem_of(p: &Path) -> String {
    p.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}
