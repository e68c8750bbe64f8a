use std::f64::consts::TAU;

use crate::color::Rgba8;
use crate::error::PromoreelResult;
use crate::layout::{TextShaper, line_center_y};
use crate::render::Surface;
use crate::script::Scene;
use crate::style::StyleConfig;
use crate::timeline::FrameSample;

/// Title size in pixels at 720p.
const TITLE_SIZE_PX: f32 = 64.0;
const BODY_SIZE_PX: f32 = 30.0;
const CAPTION_SIZE_PX: f32 = 22.0;

/// Fraction of the frame width text may occupy before wrapping.
const TEXT_WIDTH_FRAC: f64 = 0.8;
const TITLE_CENTER_FRAC: f64 = 0.42;
const BODY_CENTER_FRAC: f64 = 0.60;

const BAR_MARGIN_FRAC: f64 = 0.08;
const BAR_THICKNESS: f64 = 6.0;
const BAR_BOTTOM_OFFSET: f64 = 52.0;
const CAPTION_BOTTOM_OFFSET: f64 = 84.0;

const BLOB_COUNT: usize = 5;
/// Blob ink stays faint so text keeps contrast over it.
const BLOB_ALPHA: f32 = 0.16;

type PremulRgba8 = [u8; 4];

/// Paints complete frames: gradient-and-blob backdrop, faded scene text,
/// and the progress HUD along the bottom edge.
///
/// Output depends only on the scene, the frame sample and the style, so
/// repainting the same frame gives identical pixels.
pub struct ScenePainter {
    style: StyleConfig,
    shaper: TextShaper,
}

impl ScenePainter {
    /// Fails with a paint-context error when no usable font face can be
    /// resolved from the style or the system font directories.
    pub fn new(style: StyleConfig) -> PromoreelResult<Self> {
        style.validate()?;
        let shaper = TextShaper::new(style.font.as_deref())?;
        Ok(Self { style, shaper })
    }

    /// Name of the font family all text is shaped with.
    pub fn family_name(&self) -> &str {
        self.shaper.family_name()
    }

    /// Paint one frame of `scene` onto `surface`.
    pub fn paint(
        &mut self,
        surface: &mut Surface,
        scene: &Scene,
        sample: &FrameSample,
        scene_count: usize,
    ) -> PromoreelResult<()> {
        self.paint_background(surface, sample.overall_progress);

        let w = f64::from(surface.width());
        let h = f64::from(surface.height());
        let max_text_width = w * TEXT_WIDTH_FRAC;

        let title_lines = self
            .shaper
            .wrap(&scene.title, TITLE_SIZE_PX, max_text_width)?;
        let body_lines = match &scene.body {
            Some(body) => self.shaper.wrap(body, BODY_SIZE_PX, max_text_width)?,
            None => Vec::new(),
        };
        let caption = if scene.title.is_empty() {
            format!("Scene {}/{}", sample.scene_index + 1, scene_count)
        } else {
            format!(
                "Scene {}/{}: {}",
                sample.scene_index + 1,
                scene_count,
                scene.title
            )
        };

        let opacity = sample.opacity;
        let drift = sample.drift_px;
        let progress = sample.overall_progress;

        let shaper = &mut self.shaper;
        let style = &self.style;
        surface.run_pass(|ctx| {
            ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);

            if opacity > 0.0 {
                draw_text_block(
                    ctx,
                    shaper,
                    &title_lines,
                    TITLE_SIZE_PX,
                    style.primary,
                    w * 0.5,
                    h * TITLE_CENTER_FRAC + drift,
                    opacity,
                )?;
                draw_text_block(
                    ctx,
                    shaper,
                    &body_lines,
                    BODY_SIZE_PX,
                    style.primary.scale_alpha(0.78),
                    w * 0.5,
                    h * BODY_CENTER_FRAC + drift,
                    opacity,
                )?;
            }

            draw_progress_bar(ctx, style, w, h, progress);
            draw_caption(ctx, shaper, style, &caption, w, h)?;
            Ok(())
        })
    }

    /// Fill the surface with the background: a two-stop gradient whose axis
    /// orbits a quarter turn over the video, with drifting color blobs on top.
    fn paint_background(&self, surface: &mut Surface, progress: f64) {
        let w = surface.width() as usize;
        let h = surface.height() as usize;
        let wf = w as f64;
        let hf = h as f64;

        let theta = (0.125 + 0.25 * progress) * TAU;
        let (dx, dy) = (theta.cos(), theta.sin());
        let extent = (wf * dx).abs() + (hf * dy).abs();
        let (cx, cy) = (wf * 0.5, hf * 0.5);

        let start = self.style.background_start;
        let end = self.style.background_end;

        let bytes = surface.pixel_bytes_mut();
        for y in 0..h {
            let fy = y as f64 + 0.5;
            let row = y * w * 4;
            for x in 0..w {
                let fx = x as f64 + 0.5;
                let t = (((fx - cx) * dx + (fy - cy) * dy) / extent + 0.5) as f32;
                let px = start.lerp(end, t).to_premul();
                bytes[row + x * 4..row + x * 4 + 4].copy_from_slice(&px);
            }
        }

        for index in 0..BLOB_COUNT {
            let tint = if index % 2 == 0 {
                self.style.accent
            } else {
                self.style.primary
            };
            paint_blob(
                bytes,
                w,
                h,
                blob_at(progress, index, wf, hf),
                tint.scale_alpha(BLOB_ALPHA),
            );
        }
    }
}

struct Blob {
    center: kurbo::Point,
    radius: f64,
}

/// Deterministic blob placement: each blob orbits the frame center on its
/// own phase and breathes slightly with progress.
fn blob_at(progress: f64, index: usize, w: f64, h: f64) -> Blob {
    let phase = progress * TAU + index as f64 * (TAU / BLOB_COUNT as f64);
    let center = kurbo::Point::new(
        w * (0.5 + 0.36 * phase.cos()),
        h * (0.5 + 0.34 * (phase * 1.7).sin()),
    );
    let radius = h * (0.16 + 0.05 * (progress * 2.0 * TAU + index as f64).sin());
    Blob { center, radius }
}

fn paint_blob(bytes: &mut [u8], w: usize, h: usize, blob: Blob, tint: Rgba8) {
    let src = tint.to_premul();
    let r2 = blob.radius * blob.radius;
    if r2 <= 0.0 {
        return;
    }

    let x0 = (blob.center.x - blob.radius).floor().clamp(0.0, w as f64) as usize;
    let x1 = (blob.center.x + blob.radius).ceil().clamp(0.0, w as f64) as usize;
    let y0 = (blob.center.y - blob.radius).floor().clamp(0.0, h as f64) as usize;
    let y1 = (blob.center.y + blob.radius).ceil().clamp(0.0, h as f64) as usize;

    for y in y0..y1 {
        for x in x0..x1 {
            let p = kurbo::Point::new(x as f64 + 0.5, y as f64 + 0.5);
            let d2 = p.distance_squared(blob.center);
            if d2 >= r2 {
                continue;
            }
            // Quadratic falloff, full strength at the center, zero at the rim.
            let falloff = ((r2 - d2) / r2) as f32;
            let idx = (y * w + x) * 4;
            let out = over(
                [bytes[idx], bytes[idx + 1], bytes[idx + 2], bytes[idx + 3]],
                src,
                falloff,
            );
            bytes[idx..idx + 4].copy_from_slice(&out);
        }
    }
}

/// Source-over in premultiplied space, with `src` further scaled by `opacity`.
fn over(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 || src[3] == 0 {
        return dst;
    }

    let op = ((opacity * 255.0).round() as i32).clamp(0, 255) as u16;
    let sa = mul_div255(u16::from(src[3]), op);
    if sa == 0 {
        return dst;
    }

    let inv = 255u16 - u16::from(sa);
    let mut out = [0u8; 4];
    out[3] = add_sat_u8(sa, mul_div255(u16::from(dst[3]), inv));
    for i in 0..3 {
        let sc = mul_div255(u16::from(src[i]), op);
        let dc = mul_div255(u16::from(dst[i]), inv);
        out[i] = add_sat_u8(sc, dc);
    }
    out
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

fn add_sat_u8(a: u8, b: u8) -> u8 {
    a.saturating_add(b)
}

/// Draw pre-wrapped lines stacked around `(center_x, center_y)`, each line
/// centered horizontally on its own measured width.
fn draw_text_block(
    ctx: &mut vello_cpu::RenderContext,
    shaper: &mut TextShaper,
    lines: &[String],
    size_px: f32,
    color: Rgba8,
    center_x: f64,
    center_y: f64,
    opacity: f32,
) -> PromoreelResult<()> {
    for (index, line) in lines.iter().enumerate() {
        let layout = shaper.shape(line, size_px, color)?;
        let y = line_center_y(index, lines.len(), f64::from(size_px), center_y);
        let x = center_x - layout_width(&layout) / 2.0;
        draw_layout(ctx, shaper.font(), &layout, x, y, opacity);
    }
    Ok(())
}

fn draw_progress_bar(
    ctx: &mut vello_cpu::RenderContext,
    style: &StyleConfig,
    w: f64,
    h: f64,
    progress: f64,
) {
    let left = w * BAR_MARGIN_FRAC;
    let right = w * (1.0 - BAR_MARGIN_FRAC);
    let top = h - BAR_BOTTOM_OFFSET;
    let bottom = top + BAR_THICKNESS;

    ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
    ctx.set_paint(paint_color(style.primary.scale_alpha(0.16)));
    ctx.fill_rect(&vello_cpu::kurbo::Rect::new(left, top, right, bottom));

    let fill_right = left + (right - left) * progress.clamp(0.0, 1.0);
    if fill_right > left {
        ctx.set_paint(paint_color(style.accent));
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(left, top, fill_right, bottom));
    }
}

fn draw_caption(
    ctx: &mut vello_cpu::RenderContext,
    shaper: &mut TextShaper,
    style: &StyleConfig,
    text: &str,
    w: f64,
    h: f64,
) -> PromoreelResult<()> {
    let layout = shaper.shape(text, CAPTION_SIZE_PX, style.primary.scale_alpha(0.66))?;
    draw_layout(
        ctx,
        shaper.font(),
        &layout,
        w * BAR_MARGIN_FRAC,
        h - CAPTION_BOTTOM_OFFSET,
        1.0,
    );
    Ok(())
}

/// Draw one shaped layout with its left edge at `left_x` and its vertical
/// center at `center_y`, bracketed in an opacity layer when faded.
fn draw_layout(
    ctx: &mut vello_cpu::RenderContext,
    font: &vello_cpu::peniko::FontData,
    layout: &parley::Layout<Rgba8>,
    left_x: f64,
    center_y: f64,
    opacity: f32,
) {
    let height = layout_height(layout);
    ctx.set_transform(vello_cpu::kurbo::Affine::translate((
        left_x,
        center_y - height / 2.0,
    )));

    if opacity < 1.0 {
        ctx.push_opacity_layer(opacity);
    }

    for line in layout.lines() {
        for item in line.items() {
            let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                continue;
            };

            let brush = run.style().brush;
            ctx.set_paint(paint_color(brush));

            let glyphs = run.glyphs().map(|g| vello_cpu::Glyph {
                id: g.id,
                x: g.x,
                y: g.y,
            });
            ctx.glyph_run(font)
                .font_size(run.run().font_size())
                .fill_glyphs(glyphs);
        }
    }

    if opacity < 1.0 {
        ctx.pop_layer();
    }
}

fn paint_color(c: Rgba8) -> vello_cpu::peniko::Color {
    vello_cpu::peniko::Color::from_rgba8(c.r, c.g, c.b, c.a)
}

fn layout_width(layout: &parley::Layout<Rgba8>) -> f64 {
    layout
        .lines()
        .map(|line| f64::from(line.metrics().advance))
        .fold(0.0, f64::max)
}

fn layout_height(layout: &parley::Layout<Rgba8>) -> f64 {
    layout
        .lines()
        .map(|line| {
            let m = line.metrics();
            f64::from(m.ascent + m.descent + m.leading)
        })
        .sum()
}
