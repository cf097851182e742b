//! Separable gaussian blur on straight-alpha RGBA8 buffers.
//!
//! The buffer is premultiplied, padded with transparent pixels so the blur
//! can spread past the layer edge, blurred with a Q16 fixed-point kernel and
//! converted back. Fixed-point weights keep the output bit-identical across
//! platforms.

use reel_core::FrameBuffer;

/// Kernel half-width in multiples of sigma.
const KERNEL_SIGMAS: f64 = 3.0;

/// Transparent margin added on each side for a blur of `radius_px`.
pub fn blur_padding(radius_px: f64) -> u32 {
    if radius_px <= 0.0 || !radius_px.is_finite() {
        return 0;
    }
    (radius_px * KERNEL_SIGMAS).ceil() as u32
}

/// Blur `src` with a CSS `blur(radius_px)` (sigma = radius). The result is
/// larger than `src` by [`blur_padding`] on every side.
pub fn gaussian_blur(src: &FrameBuffer, radius_px: f64) -> FrameBuffer {
    let pad = blur_padding(radius_px);
    if pad == 0 || src.is_empty() {
        return src.clone();
    }
    let width = src.width + 2 * pad;
    let height = src.height + 2 * pad;

    let mut premul = vec![0u8; width as usize * height as usize * 4];
    for y in 0..src.height {
        for x in 0..src.width {
            let s = ((y * src.width + x) * 4) as usize;
            let d = (((y + pad) * width + x + pad) * 4) as usize;
            let a = src.data[s + 3] as u32;
            for c in 0..3 {
                premul[d + c] = ((src.data[s + c] as u32 * a + 127) / 255) as u8;
            }
            premul[d + 3] = a as u8;
        }
    }

    let kernel = gaussian_kernel_q16(pad, radius_px);
    let mut tmp = vec![0u8; premul.len()];
    horizontal_pass(&premul, &mut tmp, width, height, &kernel);
    vertical_pass(&tmp, &mut premul, width, height, &kernel);

    for px in premul.chunks_exact_mut(4) {
        let a = px[3] as u32;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        for c in 0..3 {
            px[c] = ((px[c] as u32 * 255 + a / 2) / a).min(255) as u8;
        }
    }

    FrameBuffer {
        data: premul,
        width,
        height,
    }
}

fn gaussian_kernel_q16(radius: u32, sigma: f64) -> Vec<u32> {
    let r = radius as i32;
    let denom = 2.0 * sigma * sigma;
    let weights_f: Vec<f64> = (-r..=r)
        .map(|i| (-(i as f64).powi(2) / denom).exp())
        .collect();
    let sum: f64 = weights_f.iter().sum();

    let mut weights: Vec<u32> = weights_f
        .iter()
        .map(|w| ((w / sum) * 65536.0).round().clamp(0.0, 65536.0) as u32)
        .collect();
    let acc: i64 = weights.iter().map(|&w| w as i64).sum();
    let delta = 65536 - acc;
    if delta != 0 {
        let mid = weights.len() / 2;
        weights[mid] = (weights[mid] as i64 + delta).clamp(0, 65536) as u32;
    }
    weights
}

// Samples outside the buffer are transparent.
fn horizontal_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    for y in 0..height as i32 {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let sx = x + ki as i32 - radius;
                if sx < 0 || sx >= w {
                    continue;
                }
                let idx = ((y * w + sx) as usize) * 4;
                for (c, a) in acc.iter_mut().enumerate() {
                    *a += kw as u64 * src[idx + c] as u64;
                }
            }
            let out = ((y * w + x) as usize) * 4;
            for (c, a) in acc.iter().enumerate() {
                dst[out + c] = q16_to_u8(*a);
            }
        }
    }
}

fn vertical_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    let h = height as i32;
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let sy = y + ki as i32 - radius;
                if sy < 0 || sy >= h {
                    continue;
                }
                let idx = ((sy * w + x) as usize) * 4;
                for (c, a) in acc.iter_mut().enumerate() {
                    *a += kw as u64 * src[idx + c] as u64;
                }
            }
            let out = ((y * w + x) as usize) * 4;
            for (c, a) in acc.iter().enumerate() {
                dst[out + c] = q16_to_u8(*a);
            }
        }
    }
}

fn q16_to_u8(acc: u64) -> u8 {
    ((acc + 32768) >> 16).min(255) as u8
}
