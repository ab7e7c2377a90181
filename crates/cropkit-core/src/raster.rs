//! RGB8 raster buffer and the pixel operations behind the load and crop
//! paths: sub-rectangle extraction, arbitrary-angle rotation with canvas
//! expansion, exact right-angle transforms for uprighting, and resampling.

use log::warn;
use thiserror::Error;

/// Errors from raster operations.
#[derive(Debug, Error)]
pub enum RasterError {
    /// Width and height must be non-zero.
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
}

/// Interpolation filter for resampling operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterpolationFilter {
    /// Nearest neighbor (fastest, lowest quality).
    Nearest,
    /// Bilinear (fast, acceptable quality).
    #[default]
    Bilinear,
    /// Lanczos3 (slower, highest quality).
    Lanczos3,
}

impl InterpolationFilter {
    fn to_image_filter(self) -> image::imageops::FilterType {
        match self {
            InterpolationFilter::Nearest => image::imageops::FilterType::Nearest,
            InterpolationFilter::Bilinear => image::imageops::FilterType::Triangle,
            InterpolationFilter::Lanczos3 => image::imageops::FilterType::Lanczos3,
        }
    }
}

/// An image with RGB pixel data, row-major, 3 bytes per pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterBuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RasterBuffer {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(
            pixels.len(),
            (width * height * 3) as usize,
            "pixel buffer size mismatch"
        );
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn from_rgb_image(img: image::RgbImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            pixels: img.into_raw(),
        }
    }

    pub fn to_rgb_image(&self) -> Option<image::RgbImage> {
        image::RgbImage::from_raw(self.width, self.height, self.pixels.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.pixels.is_empty()
    }

    pub fn byte_size(&self) -> usize {
        self.pixels.len()
    }

    /// Extract a sub-rectangle. The region is clamped to the buffer bounds
    /// and the output is at least 1x1.
    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> RasterBuffer {
        let x = x.min(self.width.saturating_sub(1));
        let y = y.min(self.height.saturating_sub(1));
        let right = (x + width).min(self.width);
        let bottom = (y + height).min(self.height);
        let out_width = right.saturating_sub(x).max(1);
        let out_height = bottom.saturating_sub(y).max(1);

        let mut output = vec![0u8; (out_width * out_height * 3) as usize];
        for row in 0..out_height {
            let src_start = (((y + row) * self.width + x) * 3) as usize;
            let dst_start = (row * out_width * 3) as usize;
            let len = (out_width * 3) as usize;
            output[dst_start..dst_start + len]
                .copy_from_slice(&self.pixels[src_start..src_start + len]);
        }

        RasterBuffer::new(out_width, out_height, output)
    }

    /// Rotate about the buffer center by `angle_degrees` (clockwise on
    /// screen), expanding the canvas so nothing is clipped.
    ///
    /// When the rotated canvas cannot be allocated the original buffer is
    /// returned unchanged, so a commit degrades instead of failing.
    pub fn rotate(self, angle_degrees: f64, filter: InterpolationFilter) -> RasterBuffer {
        // Fast path: no rotation needed
        if angle_degrees.abs() < 0.001 {
            return self;
        }

        let (dst_w, dst_h) = rotated_bounds(self.width, self.height, angle_degrees);

        let byte_len = (dst_w as usize) * (dst_h as usize) * 3;
        let mut output = Vec::new();
        if output.try_reserve_exact(byte_len).is_err() {
            warn!(
                "cannot allocate {}x{} rotation canvas, keeping original",
                dst_w, dst_h
            );
            return self;
        }
        output.resize(byte_len, 0u8);

        let angle_rad = angle_degrees.to_radians();
        let cos = angle_rad.cos();
        let sin = angle_rad.sin();

        let src_cx = self.width as f64 / 2.0;
        let src_cy = self.height as f64 / 2.0;
        let dst_cx = dst_w as f64 / 2.0;
        let dst_cy = dst_h as f64 / 2.0;

        for dst_y in 0..dst_h {
            for dst_x in 0..dst_w {
                let dx = dst_x as f64 - dst_cx;
                let dy = dst_y as f64 - dst_cy;

                // Inverse mapping: which source pixel lands here
                let src_x = dx * cos + dy * sin + src_cx;
                let src_y = -dx * sin + dy * cos + src_cy;

                let pixel = match filter {
                    InterpolationFilter::Nearest => self.sample_nearest(src_x, src_y),
                    InterpolationFilter::Bilinear => self.sample_bilinear(src_x, src_y),
                    InterpolationFilter::Lanczos3 => self.sample_lanczos3(src_x, src_y),
                };

                let dst_idx = ((dst_y * dst_w + dst_x) * 3) as usize;
                output[dst_idx..dst_idx + 3].copy_from_slice(&pixel);
            }
        }

        RasterBuffer::new(dst_w, dst_h, output)
    }

    /// Rotate 90 degrees clockwise; dimensions swap.
    pub fn rotate90_cw(self) -> RasterBuffer {
        let w = self.width as usize;
        let h = self.height as usize;
        let mut out = vec![0u8; w * h * 3];
        for y in 0..h {
            for x in 0..w {
                let src = (y * w + x) * 3;
                // (x, y) -> (h-1-y, x)
                let dst = (x * h + (h - 1 - y)) * 3;
                out[dst..dst + 3].copy_from_slice(&self.pixels[src..src + 3]);
            }
        }
        RasterBuffer::new(self.height, self.width, out)
    }

    /// Rotate 180 degrees.
    pub fn rotate180(self) -> RasterBuffer {
        let mut pixels = self.pixels;
        {
            let chunks: &mut [u8] = &mut pixels;
            let n = chunks.len() / 3;
            for i in 0..n / 2 {
                let a = i * 3;
                let b = (n - 1 - i) * 3;
                for ch in 0..3 {
                    chunks.swap(a + ch, b + ch);
                }
            }
        }
        RasterBuffer::new(self.width, self.height, pixels)
    }

    /// Rotate 270 degrees clockwise (90 counter-clockwise); dimensions swap.
    pub fn rotate270_cw(self) -> RasterBuffer {
        let w = self.width as usize;
        let h = self.height as usize;
        let mut out = vec![0u8; w * h * 3];
        for y in 0..h {
            for x in 0..w {
                let src = (y * w + x) * 3;
                // (x, y) -> (y, w-1-x)
                let dst = ((w - 1 - x) * h + y) * 3;
                out[dst..dst + 3].copy_from_slice(&self.pixels[src..src + 3]);
            }
        }
        RasterBuffer::new(self.height, self.width, out)
    }

    /// Mirror left-right in place.
    pub fn flip_horizontal(mut self) -> RasterBuffer {
        let w = self.width as usize;
        let stride = w * 3;
        for row in self.pixels.chunks_exact_mut(stride) {
            for x in 0..w / 2 {
                let left = x * 3;
                let right = (w - 1 - x) * 3;
                for ch in 0..3 {
                    row.swap(left + ch, right + ch);
                }
            }
        }
        self
    }

    /// Resample to exact dimensions.
    pub fn resize(
        &self,
        width: u32,
        height: u32,
        filter: InterpolationFilter,
    ) -> Result<RasterBuffer, RasterError> {
        if width == 0 || height == 0 {
            return Err(RasterError::InvalidDimensions { width, height });
        }
        if self.width == width && self.height == height {
            return Ok(self.clone());
        }
        let rgb = self
            .to_rgb_image()
            .ok_or(RasterError::InvalidDimensions {
                width: self.width,
                height: self.height,
            })?;
        let resized = image::imageops::resize(&rgb, width, height, filter.to_image_filter());
        Ok(RasterBuffer::from_rgb_image(resized))
    }

    #[inline]
    fn pixel_f64(&self, px: usize, py: usize) -> [f64; 3] {
        let idx = (py * self.width as usize + px) * 3;
        [
            self.pixels[idx] as f64,
            self.pixels[idx + 1] as f64,
            self.pixels[idx + 2] as f64,
        ]
    }

    fn sample_nearest(&self, x: f64, y: f64) -> [u8; 3] {
        let px = x.round();
        let py = y.round();
        if px < 0.0 || px >= self.width as f64 || py < 0.0 || py >= self.height as f64 {
            return [0, 0, 0];
        }
        let idx = ((py as u32 * self.width + px as u32) * 3) as usize;
        [self.pixels[idx], self.pixels[idx + 1], self.pixels[idx + 2]]
    }

    fn sample_bilinear(&self, x: f64, y: f64) -> [u8; 3] {
        let (w, h) = (self.width as i64, self.height as i64);
        if x < 0.0 || x >= (w - 1) as f64 || y < 0.0 || y >= (h - 1) as f64 {
            return [0, 0, 0];
        }

        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let fx = x - x0 as f64;
        let fy = y - y0 as f64;

        let p00 = self.pixel_f64(x0, y0);
        let p10 = self.pixel_f64(x0 + 1, y0);
        let p01 = self.pixel_f64(x0, y0 + 1);
        let p11 = self.pixel_f64(x0 + 1, y0 + 1);

        let mut result = [0u8; 3];
        for i in 0..3 {
            let v = p00[i] * (1.0 - fx) * (1.0 - fy)
                + p10[i] * fx * (1.0 - fy)
                + p01[i] * (1.0 - fx) * fy
                + p11[i] * fx * fy;
            result[i] = v.clamp(0.0, 255.0).round() as u8;
        }
        result
    }

    fn sample_lanczos3(&self, x: f64, y: f64) -> [u8; 3] {
        let (w, h) = (self.width as i64, self.height as i64);
        // Near the edges the 6x6 kernel does not fit; fall back to bilinear
        if x < 2.0 || x >= (w - 3) as f64 || y < 2.0 || y >= (h - 3) as f64 {
            return self.sample_bilinear(x, y);
        }

        let x0 = x.floor() as i64;
        let y0 = y.floor() as i64;
        let mut sum = [0.0f64; 3];
        let mut weight_sum = 0.0;

        for ky in -2..=3 {
            for kx in -2..=3 {
                let px = x0 + kx;
                let py = y0 + ky;
                if px >= 0 && px < w && py >= 0 && py < h {
                    let weight =
                        lanczos_weight(x - px as f64, 3.0) * lanczos_weight(y - py as f64, 3.0);
                    let pixel = self.pixel_f64(px as usize, py as usize);
                    for i in 0..3 {
                        sum[i] += pixel[i] * weight;
                    }
                    weight_sum += weight;
                }
            }
        }

        let mut result = [0u8; 3];
        if weight_sum > 0.0 {
            for i in 0..3 {
                result[i] = (sum[i] / weight_sum).clamp(0.0, 255.0).round() as u8;
            }
        }
        result
    }
}

/// Bounding box of a `width x height` rectangle rotated by `angle_degrees`.
pub fn rotated_bounds(width: u32, height: u32, angle_degrees: f64) -> (u32, u32) {
    let normalized = angle_degrees % 360.0;
    let abs_angle = normalized.abs();

    // Exact multiples of 90 keep or swap the dimensions exactly
    if abs_angle < 0.001 || (abs_angle - 180.0).abs() < 0.001 || (abs_angle - 360.0).abs() < 0.001 {
        return (width, height);
    }
    if (abs_angle - 90.0).abs() < 0.001 || (abs_angle - 270.0).abs() < 0.001 {
        return (height, width);
    }

    let rad = angle_degrees.to_radians();
    let cos = rad.cos().abs();
    let sin = rad.sin().abs();
    let w = width as f64;
    let h = height as f64;

    let new_w = (w * cos + h * sin).round() as u32;
    let new_h = (w * sin + h * cos).round() as u32;
    (new_w.max(1), new_h.max(1))
}

/// Lanczos kernel: `sinc(x) * sinc(x/a)` for `|x| < a`, else 0.
fn lanczos_weight(x: f64, a: f64) -> f64 {
    if x.abs() < f64::EPSILON {
        return 1.0;
    }
    if x.abs() >= a {
        return 0.0;
    }
    let pi_x = std::f64::consts::PI * x;
    let pi_x_a = pi_x / a;
    (a * pi_x.sin() * pi_x_a.sin()) / (pi_x * pi_x)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn test_buffer(width: u32, height: u32) -> RasterBuffer {
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for i in 0..(width * height) {
            let v = (i % 256) as u8;
            pixels.extend_from_slice(&[v, v, v]);
        }
        RasterBuffer::new(width, height, pixels)
    }

    proptest! {
        /// Property: crop output is bounded by the input and never empty.
        #[test]
        fn prop_crop_bounded(
            (w, h) in (4u32..=64, 4u32..=64),
            (x, y, cw, ch) in (0u32..=80, 0u32..=80, 0u32..=80, 0u32..=80),
        ) {
            let out = test_buffer(w, h).crop(x, y, cw, ch);
            prop_assert!(out.width >= 1 && out.width <= w);
            prop_assert!(out.height >= 1 && out.height <= h);
            prop_assert_eq!(out.pixels.len(), (out.width * out.height * 3) as usize);
        }

        /// Property: rotated bounds always contain the source rectangle.
        #[test]
        fn prop_rotated_bounds_contain_source(
            (w, h) in (1u32..=128, 1u32..=128),
            angle in -360.0f64..=360.0,
        ) {
            let (rw, rh) = rotated_bounds(w, h, angle);
            // The rotated canvas diagonal cannot be shorter than the source's
            let diag = ((w * w + h * h) as f64).sqrt();
            let rdiag = ((rw * rw + rh * rh) as f64).sqrt();
            prop_assert!(rdiag + 1.5 >= diag);
            prop_assert!(rw >= 1 && rh >= 1);
        }
    }
}
