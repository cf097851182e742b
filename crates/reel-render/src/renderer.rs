//! Scene renderer.
//!
//! `render(scene, time, w, h, scale)` is a pure function of its arguments:
//! the only state a [`SceneRenderer`] keeps is font and image caches keyed by
//! path, which never change the pixels produced.

use std::path::{Path, PathBuf};

use reel_core::{FrameBuffer, ReelConfig};
use reel_ir::{resolve_layer_style, ImageContent, Layer, LayerKind, ResolvedStyle, Scene};

use crate::blur::{blur_padding, gaussian_blur};
use crate::compositor::{composite_layer, LayerBox, LayerTransform, PERSPECTIVE_PX};
use crate::fonts::FontBook;
use crate::image_loader::ImageCache;
use crate::text::TextRenderer;

/// A recoverable problem met while rendering one frame. The affected layer
/// is drawn transparent (or without text) and the frame still succeeds.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderDiagnostic {
    #[error("layer '{layer}': cannot load '{path}': {message}")]
    ResourceLoad {
        layer: String,
        path: PathBuf,
        message: String,
    },

    #[error("layer '{layer}': no font available for family '{family}'")]
    FontUnavailable { layer: String, family: String },
}

/// A rendered frame plus anything that went wrong along the way.
#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub frame: FrameBuffer,
    pub diagnostics: Vec<RenderDiagnostic>,
}

impl RenderOutput {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// A layer rasterized at output scale, before transform and opacity.
struct Raster {
    buffer: FrameBuffer,
    bx: LayerBox,
    dx: f64,
    dy: f64,
}

/// CPU scene renderer.
pub struct SceneRenderer {
    text: TextRenderer,
    images: ImageCache,
    asset_root: Option<PathBuf>,
}

impl SceneRenderer {
    pub fn new(config: &ReelConfig) -> Self {
        Self {
            text: TextRenderer::from_config(config),
            images: ImageCache::new(),
            asset_root: None,
        }
    }

    pub fn with_fonts(fonts: FontBook) -> Self {
        Self {
            text: TextRenderer::new(fonts),
            images: ImageCache::new(),
            asset_root: None,
        }
    }

    /// Resolve relative image paths against `root`.
    pub fn with_asset_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.asset_root = Some(root.into());
        self
    }

    pub fn fonts_mut(&mut self) -> &mut FontBook {
        self.text.fonts_mut()
    }

    /// Render `scene` at `time` into an `out_width x out_height` frame.
    /// Pixel-valued layer properties are multiplied by `scale_factor`.
    pub fn render(
        &mut self,
        scene: &Scene,
        time: f64,
        out_width: u32,
        out_height: u32,
        scale_factor: f64,
    ) -> RenderOutput {
        let scale = if scale_factor.is_finite() && scale_factor > 0.0 {
            scale_factor
        } else {
            tracing::warn!(scale_factor, "invalid scale factor, using 1.0");
            1.0
        };

        let mut frame = FrameBuffer::solid(out_width, out_height, &scene.background());
        let mut diagnostics = Vec::new();

        for layer in scene.layers() {
            let Some(style) = resolve_layer_style(layer, time) else {
                continue;
            };
            let opacity = (style.opacity_or(1.0) * layer.opacity).clamp(0.0, 1.0);
            if opacity <= 0.0 {
                continue;
            }
            let Some(raster) =
                self.rasterize(layer, out_width, out_height, scale, &mut diagnostics)
            else {
                continue;
            };
            draw_layer(&mut frame, raster, &style, scale, opacity);
        }

        RenderOutput { frame, diagnostics }
    }

    fn rasterize(
        &mut self,
        layer: &Layer,
        out_width: u32,
        out_height: u32,
        scale: f64,
        diagnostics: &mut Vec<RenderDiagnostic>,
    ) -> Option<Raster> {
        let p = &layer.placement;
        let x = p.x_percent / 100.0 * out_width as f64;
        let y = p.y_percent / 100.0 * out_height as f64;
        let fixed_w = p.width_percent.map(|w| w / 100.0 * out_width as f64);
        let fixed_h = p.height_percent.map(|h| h / 100.0 * out_height as f64);

        match &layer.kind {
            LayerKind::Text(content) => {
                let raster = self.text.render(content, scale, fixed_w, fixed_h);
                if raster.font_missing && !content.text.trim().is_empty() {
                    diagnostics.push(RenderDiagnostic::FontUnavailable {
                        layer: layer.id().to_string(),
                        family: content.font_family.clone(),
                    });
                }
                Some(Raster {
                    bx: LayerBox {
                        x,
                        y,
                        width: raster.box_width,
                        height: raster.box_height,
                    },
                    buffer: raster.buffer,
                    dx: 0.0,
                    dy: 0.0,
                })
            }
            LayerKind::Image(content) => {
                self.rasterize_image(layer, content, x, y, fixed_w, fixed_h, scale, diagnostics)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn rasterize_image(
        &mut self,
        layer: &Layer,
        content: &ImageContent,
        x: f64,
        y: f64,
        fixed_w: Option<f64>,
        fixed_h: Option<f64>,
        scale: f64,
        diagnostics: &mut Vec<RenderDiagnostic>,
    ) -> Option<Raster> {
        let path = self.resolve_path(&content.source);
        let natural = match self.images.decoded(&path) {
            Ok(fb) => fb,
            Err(e) => {
                tracing::warn!(layer = %layer.id(), "image layer left transparent: {}", e);
                diagnostics.push(RenderDiagnostic::ResourceLoad {
                    layer: layer.id().to_string(),
                    path,
                    message: e.to_string(),
                });
                return None;
            }
        };
        let (nw, nh) = (natural.width as f64, natural.height as f64);
        let (width, height) = match (fixed_w, fixed_h) {
            (Some(w), Some(h)) => (w, h),
            (Some(w), None) => (w, if nw > 0.0 { w * nh / nw } else { 0.0 }),
            (None, Some(h)) => (if nh > 0.0 { h * nw / nh } else { 0.0 }, h),
            (None, None) => (nw * scale, nh * scale),
        };
        let (bw, bh) = (width.round().max(0.0) as u32, height.round().max(0.0) as u32);
        if bw == 0 || bh == 0 {
            return None;
        }
        let fitted = match self.images.fitted(&path, bw, bh, content.fit) {
            Ok(fb) => fb,
            Err(e) => {
                diagnostics.push(RenderDiagnostic::ResourceLoad {
                    layer: layer.id().to_string(),
                    path,
                    message: e.to_string(),
                });
                return None;
            }
        };
        Some(Raster {
            buffer: (*fitted).clone(),
            bx: LayerBox {
                x,
                y,
                width,
                height,
            },
            dx: 0.0,
            dy: 0.0,
        })
    }

    fn resolve_path(&self, source: &Path) -> PathBuf {
        match &self.asset_root {
            Some(root) if source.is_relative() => root.join(source),
            _ => source.to_path_buf(),
        }
    }
}

fn draw_layer(frame: &mut FrameBuffer, mut raster: Raster, style: &ResolvedStyle, scale: f64, opacity: f64) {
    if let Some(radius) = style.effective_blur() {
        let radius = radius * scale;
        let pad = blur_padding(radius) as f64;
        raster.buffer = gaussian_blur(&raster.buffer, radius);
        raster.dx -= pad;
        raster.dy -= pad;
    }

    let (ox, oy) = style.offset();
    let (rz, rx, ry) = style.rotation();
    let transform = LayerTransform {
        scale: style.scale_or(1.0),
        translate_x: ox * scale,
        translate_y: oy * scale,
        rotate_z: rz,
        rotate_x: rx,
        rotate_y: ry,
        perspective: PERSPECTIVE_PX * scale,
    };
    composite_layer(
        frame,
        &raster.buffer,
        &raster.bx,
        raster.dx,
        raster.dy,
        &transform,
        opacity,
    );
}
