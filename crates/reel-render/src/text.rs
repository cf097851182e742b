//! Text layer rasterization.
//! Uses fontdue for CPU glyph rasterization: one line, no wrapping, CSS
//! `line-height: 1.2`, optional background box with padding and rounded
//! corners.

use reel_core::{Color, FrameBuffer, ReelConfig};
use reel_ir::TextContent;

use crate::fonts::{FontBook, ResolvedFont, BOLD_WEIGHT};

/// CSS line height multiplier.
pub const LINE_HEIGHT: f64 = 1.2;

/// Advance assumed per character when no font is available, in ems.
const FALLBACK_ADVANCE_EM: f64 = 0.5;

/// A rasterized text box. The buffer's top-left is the box's top-left; the
/// buffer may be larger than the box when text overflows a fixed width.
#[derive(Debug, Clone)]
pub struct TextRaster {
    pub buffer: FrameBuffer,
    pub box_width: f64,
    pub box_height: f64,
    /// No font could be found; only the background was drawn.
    pub font_missing: bool,
}

/// Text renderer: rasterizes text layers to frame buffers.
pub struct TextRenderer {
    fonts: FontBook,
}

impl TextRenderer {
    pub fn new(fonts: FontBook) -> Self {
        Self { fonts }
    }

    pub fn from_config(config: &ReelConfig) -> Self {
        Self::new(FontBook::new(
            &config.render.font_dirs,
            config.render.default_font_family.clone(),
        ))
    }

    pub fn fonts_mut(&mut self) -> &mut FontBook {
        &mut self.fonts
    }

    /// Rasterize `content` with all pixel values multiplied by `scale`.
    /// `fixed_width`/`fixed_height` are output-pixel box sizes from the
    /// layer placement, if any.
    pub fn render(
        &mut self,
        content: &TextContent,
        scale: f64,
        fixed_width: Option<f64>,
        fixed_height: Option<f64>,
    ) -> TextRaster {
        let size = content.font_size * scale;
        let padding = content.padding.scaled(scale);
        let radius = content.corner_radius * scale;
        let text: String = content
            .text
            .chars()
            .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
            .collect();

        let resolved = self.fonts.resolve(&content.font_family, content.font_weight);
        let text_width = match &resolved {
            Some(r) => measure(&r.font, &text, size as f32),
            None => FALLBACK_ADVANCE_EM * size * text.chars().count() as f64,
        };
        let line_height = LINE_HEIGHT * size;

        let auto_width = text_width + padding.left + padding.right;
        let auto_height = line_height + padding.top + padding.bottom;
        let box_width = fixed_width.unwrap_or(auto_width);
        let box_height = fixed_height.unwrap_or(auto_height);

        let buf_w = box_width.max(auto_width).ceil().max(0.0) as u32;
        let buf_h = box_height.max(auto_height).ceil().max(0.0) as u32;
        let mut buffer = FrameBuffer::new(buf_w, buf_h);

        if let Some(bg) = content.background {
            fill_rounded_rect(
                &mut buffer,
                box_width.round() as u32,
                box_height.round() as u32,
                radius,
                bg,
            );
        }

        if let Some(r) = &resolved {
            let origin_x = padding.left;
            let top = padding.top;
            let faux_bold = content.font_weight >= BOLD_WEIGHT && !r.is_bold_face;
            draw_line(
                &mut buffer,
                r,
                &text,
                size as f32,
                content.color,
                origin_x,
                top,
                line_height,
                faux_bold,
            );
        } else {
            tracing::warn!(
                family = %content.font_family,
                "no font available, drawing text background only"
            );
        }

        TextRaster {
            buffer,
            box_width,
            box_height,
            font_missing: resolved.is_none(),
        }
    }
}

fn measure(font: &fontdue::Font, text: &str, size: f32) -> f64 {
    let mut cursor = 0.0f32;
    let mut prev: Option<char> = None;
    for ch in text.chars() {
        if let Some(p) = prev {
            cursor += font.horizontal_kern(p, ch, size).unwrap_or(0.0);
        }
        cursor += font.metrics(ch, size).advance_width;
        prev = Some(ch);
    }
    cursor as f64
}

#[allow(clippy::too_many_arguments)]
fn draw_line(
    fb: &mut FrameBuffer,
    resolved: &ResolvedFont,
    text: &str,
    size: f32,
    color: Color,
    origin_x: f64,
    top: f64,
    line_height: f64,
    faux_bold: bool,
) {
    let font = &resolved.font;
    let (ascent, descent) = match font.horizontal_line_metrics(size) {
        Some(m) => (m.ascent as f64, m.descent as f64),
        None => (size as f64 * 0.8, -(size as f64) * 0.2),
    };
    let half_leading = (line_height - (ascent - descent)) / 2.0;
    let baseline = (top + half_leading + ascent).round() as i32;
    let embolden = if faux_bold {
        ((size / 32.0).round() as i32).max(1)
    } else {
        0
    };

    let mut cursor = origin_x as f32;
    let mut prev: Option<char> = None;
    for ch in text.chars() {
        if let Some(p) = prev {
            cursor += font.horizontal_kern(p, ch, size).unwrap_or(0.0);
        }
        let (metrics, bitmap) = font.rasterize(ch, size);
        let glyph_x = cursor.round() as i32 + metrics.xmin;
        let glyph_y = baseline - (metrics.height as i32 + metrics.ymin);

        for gy in 0..metrics.height {
            for gx in 0..metrics.width + embolden as usize {
                let mut coverage = 0u8;
                for shift in 0..=embolden as usize {
                    if gx >= shift && gx - shift < metrics.width {
                        coverage = coverage.max(bitmap[gy * metrics.width + gx - shift]);
                    }
                }
                if coverage == 0 {
                    continue;
                }
                let px = glyph_x + gx as i32;
                let py = glyph_y + gy as i32;
                if px < 0 || py < 0 {
                    continue;
                }
                let alpha = (coverage as u32 * color.a as u32 + 127) / 255;
                fb.blend_pixel(
                    px as u32,
                    py as u32,
                    [color.r, color.g, color.b, alpha as u8],
                );
            }
        }

        cursor += metrics.advance_width;
        prev = Some(ch);
    }
}

/// Fill `[0, width) x [0, height)` with `color`, antialiasing rounded corners.
pub fn fill_rounded_rect(fb: &mut FrameBuffer, width: u32, height: u32, radius: f64, color: Color) {
    let width = width.min(fb.width);
    let height = height.min(fb.height);
    let radius = radius.max(0.0).min(width.min(height) as f64 / 2.0);
    let w = width as f64;
    let h = height as f64;

    for y in 0..height {
        for x in 0..width {
            let cx = x as f64 + 0.5;
            let cy = y as f64 + 0.5;
            let coverage = if radius > 0.0 {
                let nx = if cx < radius {
                    radius
                } else if cx > w - radius {
                    w - radius
                } else {
                    cx
                };
                let ny = if cy < radius {
                    radius
                } else if cy > h - radius {
                    h - radius
                } else {
                    cy
                };
                let dist = ((cx - nx).powi(2) + (cy - ny).powi(2)).sqrt();
                (radius - dist + 0.5).clamp(0.0, 1.0)
            } else {
                1.0
            };
            if coverage <= 0.0 {
                continue;
            }
            let a = (color.a as f64 * coverage).round() as u8;
            fb.blend_pixel(x, y, [color.r, color.g, color.b, a]);
        }
    }
}
