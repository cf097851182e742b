//! Layer compositing.
//!
//! A layer raster is placed by its box and transformed about the box centre
//! in CSS order: `scale · translate · rotateZ · rotateX · rotateY`, viewed
//! through a perspective projection. Untransformed layers take a
//! pixel-snapped `composite_over` fast path; everything else is inverse
//! mapped through the plane homography with bilinear sampling.

use reel_core::{FrameBuffer, Mat3, Mat4, Point2D};

/// Perspective distance at scale factor 1, in pixels.
pub const PERSPECTIVE_PX: f64 = 1000.0;

/// The layer box in output pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Resolved transform of one layer, in output pixels and degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerTransform {
    pub scale: f64,
    pub translate_x: f64,
    pub translate_y: f64,
    pub rotate_z: f64,
    pub rotate_x: f64,
    pub rotate_y: f64,
    pub perspective: f64,
}

impl Default for LayerTransform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            translate_x: 0.0,
            translate_y: 0.0,
            rotate_z: 0.0,
            rotate_x: 0.0,
            rotate_y: 0.0,
            perspective: PERSPECTIVE_PX,
        }
    }
}

impl LayerTransform {
    /// Only a translation: no scale and no rotation.
    pub fn is_translation(&self) -> bool {
        self.scale == 1.0 && self.rotate_z == 0.0 && self.rotate_x == 0.0 && self.rotate_y == 0.0
    }

    /// Homography from raster pixel coordinates to output coordinates.
    /// `raster_dx/dy` is the raster's top-left relative to the box's.
    pub fn homography(&self, bx: &LayerBox, raster_dx: f64, raster_dy: f64) -> Mat3 {
        let cx = bx.x + bx.width / 2.0;
        let cy = bx.y + bx.height / 2.0;
        Mat4::translate(cx, cy, 0.0)
            .mul(&Mat4::perspective(self.perspective))
            .mul(&Mat4::scale(self.scale, self.scale))
            .mul(&Mat4::translate(self.translate_x, self.translate_y, 0.0))
            .mul(&Mat4::rotate_z(self.rotate_z))
            .mul(&Mat4::rotate_x(self.rotate_x))
            .mul(&Mat4::rotate_y(self.rotate_y))
            .mul(&Mat4::translate(
                raster_dx - bx.width / 2.0,
                raster_dy - bx.height / 2.0,
                0.0,
            ))
            .plane_homography()
    }
}

/// Composite `src` onto `dst` with the given box, transform and opacity.
pub fn composite_layer(
    dst: &mut FrameBuffer,
    src: &FrameBuffer,
    bx: &LayerBox,
    raster_dx: f64,
    raster_dy: f64,
    transform: &LayerTransform,
    opacity: f64,
) {
    let opacity = opacity.clamp(0.0, 1.0);
    if src.is_empty() || dst.is_empty() || opacity <= 0.0 {
        return;
    }

    if transform.is_translation() {
        let x = (bx.x + transform.translate_x + raster_dx).round() as i32;
        let y = (bx.y + transform.translate_y + raster_dy).round() as i32;
        if opacity < 1.0 {
            let mut faded = src.clone();
            faded.multiply_alpha(opacity as f32);
            dst.composite_over(&faded, x, y);
        } else {
            dst.composite_over(src, x, y);
        }
        return;
    }

    let h = transform.homography(bx, raster_dx, raster_dy);
    let Some(inv) = h.inverse() else {
        // Edge-on: the layer has no area.
        return;
    };

    let corners = [
        Point2D::new(0.0, 0.0),
        Point2D::new(src.width as f64, 0.0),
        Point2D::new(src.width as f64, src.height as f64),
        Point2D::new(0.0, src.height as f64),
    ];
    let projected: Vec<Point2D> = corners.iter().filter_map(|c| h.apply(*c)).collect();
    if projected.is_empty() {
        return;
    }
    let (x0, y0, x1, y1) = if projected.len() < corners.len() {
        // Crosses the viewer plane; scan the whole frame.
        (0, 0, dst.width as i64, dst.height as i64)
    } else {
        let min_x = projected.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
        let max_x = projected.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
        let min_y = projected.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
        let max_y = projected.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
        (
            (min_x.floor() as i64).max(0),
            (min_y.floor() as i64).max(0),
            (max_x.ceil() as i64).min(dst.width as i64),
            (max_y.ceil() as i64).min(dst.height as i64),
        )
    };

    for y in y0..y1 {
        for x in x0..x1 {
            let Some(p) = inv.apply(Point2D::new(x as f64 + 0.5, y as f64 + 0.5)) else {
                continue;
            };
            let Some(px) = sample_bilinear(src, p.x - 0.5, p.y - 0.5) else {
                continue;
            };
            let a = (px[3] as f64 * opacity).round() as u8;
            if a == 0 {
                continue;
            }
            dst.blend_pixel(x as u32, y as u32, [px[0], px[1], px[2], a]);
        }
    }
}

/// Bilinear sample at continuous pixel coordinates, interpolating in
/// premultiplied space. Outside the buffer is transparent.
fn sample_bilinear(src: &FrameBuffer, u: f64, v: f64) -> Option<[u8; 4]> {
    let w = src.width as i64;
    let h = src.height as i64;
    if u <= -1.0 || v <= -1.0 || u >= w as f64 || v >= h as f64 {
        return None;
    }
    let x0 = u.floor() as i64;
    let y0 = v.floor() as i64;
    let fx = u - x0 as f64;
    let fy = v - y0 as f64;

    let mut acc = [0.0f64; 4];
    let taps = [
        (x0, y0, (1.0 - fx) * (1.0 - fy)),
        (x0 + 1, y0, fx * (1.0 - fy)),
        (x0, y0 + 1, (1.0 - fx) * fy),
        (x0 + 1, y0 + 1, fx * fy),
    ];
    for (tx, ty, wgt) in taps {
        if tx < 0 || ty < 0 || tx >= w || ty >= h || wgt == 0.0 {
            continue;
        }
        let i = ((ty * w + tx) * 4) as usize;
        let a = src.data[i + 3] as f64;
        acc[0] += src.data[i] as f64 * a * wgt;
        acc[1] += src.data[i + 1] as f64 * a * wgt;
        acc[2] += src.data[i + 2] as f64 * a * wgt;
        acc[3] += a * wgt;
    }
    if acc[3] < 0.5 {
        return None;
    }
    Some([
        (acc[0] / acc[3]).round().clamp(0.0, 255.0) as u8,
        (acc[1] / acc[3]).round().clamp(0.0, 255.0) as u8,
        (acc[2] / acc[3]).round().clamp(0.0, 255.0) as u8,
        acc[3].round().clamp(0.0, 255.0) as u8,
    ])
}
