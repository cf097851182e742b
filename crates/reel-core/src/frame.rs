use crate::Color;

/// A single RGBA8 raster with straight (non-premultiplied) alpha.
///
/// Every surface in the pipeline uses this layout: rendered layers, the
/// composed scene frame and the buffer handed to the encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    /// Raw pixel data, row-major, 4 bytes per pixel.
    pub data: Vec<u8>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Bytes per RGBA8 pixel.
pub const BYTES_PER_PIXEL: usize = 4;

impl FrameBuffer {
    /// Create a new frame buffer filled with transparent black.
    pub fn new(width: u32, height: u32) -> Self {
        let size = (width as usize) * (height as usize) * BYTES_PER_PIXEL;
        Self {
            data: vec![0u8; size],
            width,
            height,
        }
    }

    /// Create a frame buffer filled with a solid color.
    pub fn solid(width: u32, height: u32, color: &Color) -> Self {
        let mut fb = Self::new(width, height);
        fb.fill(color);
        fb
    }

    /// Wrap existing RGBA8 bytes. Returns None when the length does not match.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if data.len() != (width as usize) * (height as usize) * BYTES_PER_PIXEL {
            return None;
        }
        Some(Self {
            data,
            width,
            height,
        })
    }

    /// Overwrite every pixel with `color`.
    pub fn fill(&mut self, color: &Color) {
        let pixel = color.to_rgba8();
        for px in self.data.chunks_exact_mut(BYTES_PER_PIXEL) {
            px.copy_from_slice(&pixel);
        }
    }

    /// Total number of pixels.
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Total byte size of the pixel data.
    pub fn byte_size(&self) -> usize {
        self.data.len()
    }

    /// True when the buffer has no pixels.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// True when every pixel has zero alpha.
    pub fn is_fully_transparent(&self) -> bool {
        self.data.chunks_exact(BYTES_PER_PIXEL).all(|px| px[3] == 0)
    }

    /// Get the RGBA value at a pixel coordinate. Returns None if out of bounds.
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = self.offset(x, y);
        Some([
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
            self.data[offset + 3],
        ])
    }

    /// Set the RGBA value at a pixel coordinate. No-op if out of bounds.
    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let offset = self.offset(x, y);
        self.data[offset..offset + 4].copy_from_slice(&rgba);
    }

    /// Blend a single straight-alpha pixel over the pixel at (x, y).
    pub fn blend_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let offset = self.offset(x, y);
        blend_over(&rgba, &mut self.data[offset..offset + 4]);
    }

    /// Multiply every alpha value by `factor` (clamped to [0, 1]).
    pub fn multiply_alpha(&mut self, factor: f32) {
        let factor = factor.clamp(0.0, 1.0);
        if factor >= 1.0 {
            return;
        }
        let f = (factor * 256.0).round() as u32;
        for px in self.data.chunks_exact_mut(BYTES_PER_PIXEL) {
            px[3] = ((px[3] as u32 * f) >> 8) as u8;
        }
    }

    /// Alpha-composite `src` on top of `self` at position (dx, dy).
    pub fn composite_over(&mut self, src: &FrameBuffer, dx: i32, dy: i32) {
        let dst_width = self.width as i32;
        let dst_height = self.height as i32;

        let start_y = (-dy).max(0);
        let end_y = (src.height as i32).min(dst_height - dy);
        let start_x = (-dx).max(0);
        let end_x = (src.width as i32).min(dst_width - dx);

        if start_x >= end_x || start_y >= end_y {
            return;
        }

        let src_stride = src.width as usize * BYTES_PER_PIXEL;
        let dst_stride = self.width as usize * BYTES_PER_PIXEL;

        for sy in start_y..end_y {
            let dst_y = dy + sy;
            let src_row_start = (sy as usize * src_stride) + (start_x as usize * BYTES_PER_PIXEL);
            let dst_row_start =
                (dst_y as usize * dst_stride) + ((dx + start_x) as usize * BYTES_PER_PIXEL);
            let len = (end_x - start_x) as usize * BYTES_PER_PIXEL;

            let src_slice = &src.data[src_row_start..src_row_start + len];
            let dst_slice = &mut self.data[dst_row_start..dst_row_start + len];

            for (s, d) in src_slice
                .chunks_exact(BYTES_PER_PIXEL)
                .zip(dst_slice.chunks_exact_mut(BYTES_PER_PIXEL))
            {
                blend_over(s, d);
            }
        }
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        ((y as usize) * (self.width as usize) + (x as usize)) * BYTES_PER_PIXEL
    }
}

/// Straight-alpha source-over for one pixel.
#[inline]
fn blend_over(s: &[u8], d: &mut [u8]) {
    let sa = s[3] as u32;
    if sa == 0 {
        return;
    }
    if sa == 255 {
        d.copy_from_slice(&s[..4]);
        return;
    }

    let da = d[3] as u32;
    let inv_sa = 255 - sa;
    let out_a = sa + (da * inv_sa + 127) / 255;
    if out_a == 0 {
        return;
    }

    let denom = out_a * 255;
    for c in 0..3 {
        let v = (s[c] as u32 * sa * 255 + d[c] as u32 * da * inv_sa + denom / 2) / denom;
        d[c] = v.min(255) as u8;
    }
    d[3] = out_a.min(255) as u8;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_buffer_new_is_transparent() {
        let fb = FrameBuffer::new(64, 32);
        assert_eq!(fb.byte_size(), 64 * 32 * 4);
        assert_eq!(fb.pixel_count(), 64 * 32);
        assert!(fb.is_fully_transparent());
    }

    #[test]
    fn test_from_rgba_checks_length() {
        assert!(FrameBuffer::from_rgba(2, 2, vec![0; 16]).is_some());
        assert!(FrameBuffer::from_rgba(2, 2, vec![0; 15]).is_none());
    }

    #[test]
    fn test_get_set_pixel_bounds() {
        let mut fb = FrameBuffer::new(10, 10);
        fb.set_pixel(5, 5, [128, 64, 32, 255]);
        assert_eq!(fb.get_pixel(5, 5), Some([128, 64, 32, 255]));
        assert_eq!(fb.get_pixel(10, 0), None);
        fb.set_pixel(10, 10, [1, 1, 1, 1]);
    }

    #[test]
    fn test_composite_over_opaque_and_clipped() {
        let mut dst = FrameBuffer::solid(4, 4, &Color::BLUE);
        let src = FrameBuffer::solid(3, 3, &Color::RED);
        dst.composite_over(&src, 2, -1);
        assert_eq!(dst.get_pixel(2, 0), Some([255, 0, 0, 255]));
        assert_eq!(dst.get_pixel(3, 1), Some([255, 0, 0, 255]));
        assert_eq!(dst.get_pixel(1, 0), Some([0, 0, 255, 255]));
        assert_eq!(dst.get_pixel(2, 2), Some([0, 0, 255, 255]));
    }

    #[test]
    fn test_composite_over_fully_outside_is_noop() {
        let mut dst = FrameBuffer::solid(4, 4, &Color::WHITE);
        let src = FrameBuffer::solid(2, 2, &Color::RED);
        dst.composite_over(&src, 10, 10);
        dst.composite_over(&src, -5, 0);
        assert!(dst
            .data
            .chunks_exact(4)
            .all(|px| px == [255, 255, 255, 255]));
    }

    #[test]
    fn test_composite_half_red_over_white() {
        let mut dst = FrameBuffer::solid(1, 1, &Color::WHITE);
        let mut src = FrameBuffer::new(1, 1);
        src.set_pixel(0, 0, [255, 0, 0, 128]);
        dst.composite_over(&src, 0, 0);
        let px = dst.get_pixel(0, 0).unwrap();
        assert_eq!(px[0], 255);
        assert!((126..=128).contains(&px[1]));
        assert_eq!(px[1], px[2]);
        assert_eq!(px[3], 255);
    }

    #[test]
    fn test_composite_over_transparent_destination_keeps_source_color() {
        let mut dst = FrameBuffer::new(1, 1);
        let mut src = FrameBuffer::new(1, 1);
        src.set_pixel(0, 0, [10, 200, 30, 100]);
        dst.composite_over(&src, 0, 0);
        assert_eq!(dst.get_pixel(0, 0), Some([10, 200, 30, 100]));
    }

    #[test]
    fn test_multiply_alpha() {
        let mut fb = FrameBuffer::solid(2, 1, &Color::WHITE);
        fb.multiply_alpha(0.5);
        assert_eq!(fb.get_pixel(0, 0).unwrap()[3], 128);
        fb.multiply_alpha(0.0);
        assert!(fb.is_fully_transparent());
    }

    #[test]
    fn test_blend_pixel() {
        let mut fb = FrameBuffer::solid(2, 2, &Color::BLACK);
        fb.blend_pixel(1, 1, [255, 255, 255, 255]);
        assert_eq!(fb.get_pixel(1, 1), Some([255, 255, 255, 255]));
        assert_eq!(fb.get_pixel(0, 0), Some([0, 0, 0, 255]));
    }
}
