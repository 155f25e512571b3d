//! Float planes used between the stages of the edge-detection cascade.
//!
//! Stages hold values in the 8-bit domain (`0..=255`) but keep full float
//! precision, and gradients keep their sign.

use crate::core::buffer::{clamp_coord, to_channel, PixelBuffer};
use crate::core::kernel::Kernel;

/// A row-major float image with one or more interleaved channels.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatImage {
    width: u32,
    height: u32,
    channels: usize,
    data: Vec<f32>,
}

impl FloatImage {
    /// Create a zeroed plane.
    pub fn new(width: u32, height: u32, channels: usize) -> Self {
        Self {
            width,
            height,
            channels,
            data: vec![0.0; width as usize * height as usize * channels],
        }
    }

    /// Build a single-channel plane from a per-pixel function.
    pub fn from_fn<F>(width: u32, height: u32, mut f: F) -> Self
    where
        F: FnMut(u32, u32) -> f32,
    {
        let mut plane = Self::new(width, height, 1);
        for y in 0..height {
            for x in 0..width {
                plane.set(x, y, 0, f(x, y));
            }
        }
        plane
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Channels per pixel.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Raw values.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    fn index(&self, x: u32, y: u32, c: usize) -> usize {
        (y as usize * self.width as usize + x as usize) * self.channels + c
    }

    /// Value of channel `c` at `(x, y)`.
    #[inline]
    pub fn get(&self, x: u32, y: u32, c: usize) -> f32 {
        self.data[self.index(x, y, c)]
    }

    /// Edge-clamped read.
    #[inline]
    pub fn get_clamped(&self, x: i64, y: i64, c: usize) -> f32 {
        self.get(clamp_coord(x, self.width), clamp_coord(y, self.height), c)
    }

    /// Write channel `c` at `(x, y)`.
    #[inline]
    pub fn set(&mut self, x: u32, y: u32, c: usize, v: f32) {
        let i = self.index(x, y, c);
        self.data[i] = v;
    }

    /// Edge-clamped correlation of channel `c` with `kernel`, as a new
    /// single-channel plane.
    pub fn convolve(&self, kernel: &Kernel, c: usize) -> FloatImage {
        let r = kernel.radius();
        FloatImage::from_fn(self.width, self.height, |x, y| {
            let mut acc = 0.0;
            for dy in -r..=r {
                for dx in -r..=r {
                    acc += kernel.at(dx, dy) * self.get_clamped(x as i64 + dx, y as i64 + dy, c);
                }
            }
            acc
        })
    }

    /// Expand a single-channel plane back to an opaque grey RGBA buffer,
    /// multiplying each value by `scale` first.
    pub fn to_gray_buffer(&self, scale: f32, buffer: &mut PixelBuffer) {
        for y in 0..self.height.min(buffer.height()) {
            for x in 0..self.width.min(buffer.width()) {
                let v = to_channel(self.get(x, y, 0) * scale);
                buffer.set_pixel(x, y, [v, v, v, 255]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_clamped() {
        let plane = FloatImage::from_fn(3, 1, |x, _| x as f32);
        assert_eq!(plane.get_clamped(-1, 0, 0), 0.0);
        assert_eq!(plane.get_clamped(5, 3, 0), 2.0);
    }

    #[test]
    fn test_convolve_keeps_sign() {
        let plane = FloatImage::from_fn(5, 3, |x, _| if x >= 2 { 255.0 } else { 0.0 });
        let gx = plane.convolve(&Kernel::sobel_x(), 0);
        assert_eq!(gx.get(2, 1, 0), 4.0 * 255.0);
        assert_eq!(gx.get(4, 1, 0), 0.0);

        let reversed = FloatImage::from_fn(5, 3, |x, _| if x >= 2 { 0.0 } else { 255.0 });
        assert!(reversed.convolve(&Kernel::sobel_x(), 0).get(2, 1, 0) < 0.0);
    }

    #[test]
    fn test_to_gray_buffer() {
        let plane = FloatImage::from_fn(2, 1, |x, _| x as f32);
        let mut buffer = PixelBuffer::new(2, 1).unwrap();
        plane.to_gray_buffer(255.0, &mut buffer);
        assert_eq!(buffer.pixel(0, 0), [0, 0, 0, 255]);
        assert_eq!(buffer.pixel(1, 0), [255, 255, 255, 255]);
    }
}
