//! Image loading module.
//! Decodes PNG, JPEG, WebP and other formats into frame buffers and fits
//! them into layer boxes. Decoded and fitted images are cached by path and
//! size; the cache only avoids repeated work and never changes output.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::RgbaImage;
use reel_core::{FrameBuffer, ReelError, ReelResult};
use reel_ir::ImageFit;

/// Fitted entries kept before the cache is cleared.
const MAX_FITTED_ENTRIES: usize = 64;

/// Load an image file and convert it to a FrameBuffer.
pub fn load_image(path: &Path) -> ReelResult<FrameBuffer> {
    let img = image::open(path).map_err(|e| {
        ReelError::asset(
            format!("failed to load image '{}': {}", path.display(), e),
            path,
        )
    })?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    FrameBuffer::from_rgba(width, height, rgba.into_raw())
        .ok_or_else(|| ReelError::asset("decoded image has an unexpected size", path))
}

fn to_image(fb: &FrameBuffer) -> Option<RgbaImage> {
    RgbaImage::from_raw(fb.width, fb.height, fb.data.clone())
}

fn from_image(img: RgbaImage) -> FrameBuffer {
    let (w, h) = img.dimensions();
    FrameBuffer::from_rgba(w, h, img.into_raw()).unwrap_or_else(|| FrameBuffer::new(w, h))
}

/// Resize `src` into a `box_w x box_h` box according to `fit`.
pub fn fit_image(src: &FrameBuffer, box_w: u32, box_h: u32, fit: ImageFit) -> FrameBuffer {
    if box_w == 0 || box_h == 0 || src.is_empty() {
        return FrameBuffer::new(box_w, box_h);
    }
    let Some(img) = to_image(src) else {
        return FrameBuffer::new(box_w, box_h);
    };
    let sx = box_w as f64 / src.width as f64;
    let sy = box_h as f64 / src.height as f64;

    match fit {
        ImageFit::Fill => from_image(imageops::resize(&img, box_w, box_h, FilterType::Triangle)),
        ImageFit::Cover => {
            let s = sx.max(sy);
            let w = ((src.width as f64 * s).ceil() as u32).max(box_w);
            let h = ((src.height as f64 * s).ceil() as u32).max(box_h);
            let resized = imageops::resize(&img, w, h, FilterType::Triangle);
            let x = (w - box_w) / 2;
            let y = (h - box_h) / 2;
            from_image(imageops::crop_imm(&resized, x, y, box_w, box_h).to_image())
        }
        ImageFit::Contain => {
            let s = sx.min(sy);
            let w = ((src.width as f64 * s).round() as u32).clamp(1, box_w);
            let h = ((src.height as f64 * s).round() as u32).clamp(1, box_h);
            let resized = from_image(imageops::resize(&img, w, h, FilterType::Triangle));
            let mut out = FrameBuffer::new(box_w, box_h);
            out.composite_over(&resized, ((box_w - w) / 2) as i32, ((box_h - h) / 2) as i32);
            out
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FitKey {
    path: PathBuf,
    width: u32,
    height: u32,
    fit: ImageFit,
}

/// Cache of decoded and fitted images.
#[derive(Default)]
pub struct ImageCache {
    decoded: HashMap<PathBuf, Arc<FrameBuffer>>,
    fitted: HashMap<FitKey, Arc<FrameBuffer>>,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoded image at natural size. Failures are not cached.
    pub fn decoded(&mut self, path: &Path) -> ReelResult<Arc<FrameBuffer>> {
        if let Some(fb) = self.decoded.get(path) {
            return Ok(fb.clone());
        }
        let fb = Arc::new(load_image(path)?);
        tracing::debug!(path = %path.display(), width = fb.width, height = fb.height, "decoded image");
        self.decoded.insert(path.to_path_buf(), fb.clone());
        Ok(fb)
    }

    /// Image fitted into a box of the given size.
    pub fn fitted(
        &mut self,
        path: &Path,
        width: u32,
        height: u32,
        fit: ImageFit,
    ) -> ReelResult<Arc<FrameBuffer>> {
        let key = FitKey {
            path: path.to_path_buf(),
            width,
            height,
            fit,
        };
        if let Some(fb) = self.fitted.get(&key) {
            return Ok(fb.clone());
        }
        let source = self.decoded(path)?;
        let fb = Arc::new(fit_image(&source, width, height, fit));
        if self.fitted.len() >= MAX_FITTED_ENTRIES {
            self.fitted.clear();
        }
        self.fitted.insert(key, fb.clone());
        Ok(fb)
    }
}
