//! The shared pixel data model.
//!
//! A [`PixelBuffer`] is an interleaved, row-major RGBA image with 8 bits per
//! channel. Every CPU filter pass reads from a shadow copy of the buffer and
//! writes into the buffer itself, so a pass never observes its own output.

use crate::core::error::BufferError;
use image::RgbaImage;

/// Number of interleaved channels per pixel.
pub const CHANNELS: usize = 4;

/// An RGBA8 image.
///
/// Invariant: `data.len() == width * height * 4`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Create a transparent black buffer.
    pub fn new(width: u32, height: u32) -> Result<Self, BufferError> {
        Self::filled(width, height, [0, 0, 0, 0])
    }

    /// Create a buffer where every pixel has the same value.
    pub fn filled(width: u32, height: u32, pixel: [u8; 4]) -> Result<Self, BufferError> {
        if width == 0 || height == 0 {
            return Err(BufferError::EmptyImage { width, height });
        }
        let count = width as usize * height as usize;
        let mut data = Vec::with_capacity(count * CHANNELS);
        for _ in 0..count {
            data.extend_from_slice(&pixel);
        }
        Ok(Self { width, height, data })
    }

    /// Wrap existing RGBA bytes.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self, BufferError> {
        if width == 0 || height == 0 {
            return Err(BufferError::EmptyImage { width, height });
        }
        let expected = width as usize * height as usize * CHANNELS;
        if data.len() != expected {
            return Err(BufferError::LengthMismatch {
                width,
                height,
                expected,
                got: data.len(),
            });
        }
        Ok(Self { width, height, data })
    }

    /// Build a buffer by evaluating `f(x, y)` for every pixel.
    pub fn from_fn<F>(width: u32, height: u32, mut f: F) -> Result<Self, BufferError>
    where
        F: FnMut(u32, u32) -> [u8; 4],
    {
        let mut buffer = Self::new(width, height)?;
        for y in 0..height {
            for x in 0..width {
                buffer.set_pixel(x, y, f(x, y));
            }
        }
        Ok(buffer)
    }

    /// Image width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// `(width, height)`.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Raw interleaved RGBA bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable access to the raw bytes. The length cannot change.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Consume the buffer, returning its bytes.
    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * CHANNELS
    }

    /// Read the pixel at `(x, y)`. Coordinates must be in bounds.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = self.offset(x, y);
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }

    /// Read a pixel with edge clamping: out-of-range coordinates resolve to
    /// the nearest valid pixel.
    #[inline]
    pub fn pixel_clamped(&self, x: i64, y: i64) -> [u8; 4] {
        let cx = clamp_coord(x, self.width);
        let cy = clamp_coord(y, self.height);
        self.pixel(cx, cy)
    }

    /// Write the pixel at `(x, y)`. Coordinates must be in bounds.
    #[inline]
    pub fn set_pixel(&mut self, x: u32, y: u32, pixel: [u8; 4]) {
        let i = self.offset(x, y);
        self.data[i..i + CHANNELS].copy_from_slice(&pixel);
    }

    /// Sample at normalized `[0,1]` coordinates with nearest-pixel lookup
    /// and edge clamping, matching the GPU sampler configuration.
    pub fn sample_uv(&self, u: f32, v: f32) -> [u8; 4] {
        let x = (u * self.width as f32).floor() as i64;
        let y = (v * self.height as f32).floor() as i64;
        self.pixel_clamped(x, y)
    }

    /// Normalized coordinate of the centre of pixel `(x, y)`.
    #[inline]
    pub fn uv_of(&self, x: u32, y: u32) -> (f32, f32) {
        (
            (x as f32 + 0.5) / self.width as f32,
            (y as f32 + 0.5) / self.height as f32,
        )
    }

    /// Replace the contents with another buffer of identical dimensions.
    pub fn replace_with(&mut self, other: PixelBuffer) -> Result<(), BufferError> {
        if other.dimensions() != self.dimensions() {
            return Err(BufferError::DimensionMismatch {
                expected_width: self.width,
                expected_height: self.height,
                width: other.width,
                height: other.height,
            });
        }
        self.data = other.data;
        Ok(())
    }

    /// Apply `f` to every pixel in place. No neighbourhood access, so no
    /// shadow copy is needed.
    pub fn map_pixels<F>(&mut self, mut f: F)
    where
        F: FnMut([u8; 4]) -> [u8; 4],
    {
        for px in self.data.chunks_exact_mut(CHANNELS) {
            let out = f([px[0], px[1], px[2], px[3]]);
            px.copy_from_slice(&out);
        }
    }

    /// Recompute every pixel from a read-only shadow copy of the pre-pass
    /// contents. `f` receives the shadow and the output coordinate.
    pub fn map_with_source<F>(&mut self, mut f: F)
    where
        F: FnMut(&PixelBuffer, u32, u32) -> [u8; 4],
    {
        let source = self.clone();
        for y in 0..self.height {
            for x in 0..self.width {
                let out = f(&source, x, y);
                self.set_pixel(x, y, out);
            }
        }
    }

    /// Largest per-channel absolute difference against another buffer.
    pub fn max_abs_diff(&self, other: &PixelBuffer) -> Result<u8, BufferError> {
        if other.dimensions() != self.dimensions() {
            return Err(BufferError::DimensionMismatch {
                expected_width: self.width,
                expected_height: self.height,
                width: other.width,
                height: other.height,
            });
        }
        Ok(self
            .data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| a.abs_diff(*b))
            .max()
            .unwrap_or(0))
    }
}

/// Clamp a signed coordinate into `[0, len-1]`.
#[inline]
pub fn clamp_coord(v: i64, len: u32) -> u32 {
    v.clamp(0, len as i64 - 1) as u32
}

/// Round and clamp a float channel value into a byte.
#[inline]
pub fn to_channel(v: f32) -> u8 {
    if v.is_nan() {
        0
    } else {
        v.round().clamp(0.0, 255.0) as u8
    }
}

impl From<RgbaImage> for PixelBuffer {
    fn from(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            data: image.into_raw(),
        }
    }
}

impl From<PixelBuffer> for RgbaImage {
    fn from(buffer: PixelBuffer) -> Self {
        let (width, height) = buffer.dimensions();
        // The length invariant guarantees the container fits.
        RgbaImage::from_raw(width, height, buffer.data)
            .unwrap_or_else(|| RgbaImage::new(width, height))
    }
}
