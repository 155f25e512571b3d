//! Convolution kernel construction and application.
//!
//! Smoothing kernels are normalized so their weights sum to exactly one.
//! Gradient kernels (Sobel) are signed and deliberately left unnormalized.

use crate::core::buffer::{to_channel, PixelBuffer};
use crate::core::error::ParameterError;

/// Smallest kernel size with a compiled GPU program variant.
pub const MIN_KERNEL_SIZE: u32 = 3;
/// Largest kernel size with a compiled GPU program variant.
pub const MAX_KERNEL_SIZE: u32 = 15;

/// Fixed Laplacian-style sharpen kernel.
pub const SHARPEN: [f32; 9] = [0.0, -1.0, 0.0, -1.0, 4.0, -1.0, 0.0, -1.0, 0.0];

/// Horizontal Sobel gradient kernel.
pub const SOBEL_X: [f32; 9] = [-1.0, 0.0, 1.0, -2.0, 0.0, 2.0, -1.0, 0.0, 1.0];

/// Vertical Sobel gradient kernel.
pub const SOBEL_Y: [f32; 9] = [-1.0, -2.0, -1.0, 0.0, 0.0, 0.0, 1.0, 2.0, 1.0];

/// Which channels a convolution touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelScope {
    /// Convolve RGB; copy alpha from the source pixel.
    ColorOnly,
    /// Convolve all four channels.
    Full,
}

impl ChannelScope {
    /// Number of leading channels that are convolved.
    pub fn channels(self) -> usize {
        match self {
            ChannelScope::ColorOnly => 3,
            ChannelScope::Full => 4,
        }
    }
}

/// A square, row-major weight grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    size: u32,
    weights: Vec<f32>,
}

impl Kernel {
    /// Wrap a row-major weight grid. `weights.len()` must be `size * size`.
    pub fn from_weights(size: u32, weights: Vec<f32>) -> Option<Self> {
        if size == 0 || weights.len() != (size * size) as usize {
            return None;
        }
        Some(Self { size, weights })
    }

    /// A kernel of the given (odd-forced) size that passes the centre through.
    pub fn identity(size: u32) -> Self {
        let size = force_odd(size);
        let mut weights = vec![0.0; (size * size) as usize];
        let centre = (size * size / 2) as usize;
        weights[centre] = 1.0;
        Self { size, weights }
    }

    /// The 3×3 sharpen kernel.
    pub fn sharpen() -> Self {
        Self {
            size: 3,
            weights: SHARPEN.to_vec(),
        }
    }

    /// The 3×3 horizontal Sobel kernel.
    pub fn sobel_x() -> Self {
        Self {
            size: 3,
            weights: SOBEL_X.to_vec(),
        }
    }

    /// The 3×3 vertical Sobel kernel.
    pub fn sobel_y() -> Self {
        Self {
            size: 3,
            weights: SOBEL_Y.to_vec(),
        }
    }

    /// Side length.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Half-width `floor(size / 2)`.
    pub fn radius(&self) -> i64 {
        (self.size / 2) as i64
    }

    /// Row-major weights.
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    /// Weight at offset `(dx, dy)` from the centre.
    #[inline]
    pub fn at(&self, dx: i64, dy: i64) -> f32 {
        let r = self.radius();
        self.weights[((dy + r) * self.size as i64 + (dx + r)) as usize]
    }

    /// Total mass.
    pub fn sum(&self) -> f32 {
        self.weights.iter().sum()
    }

    /// Whether convolving with this kernel leaves every pixel unchanged.
    pub fn is_identity(&self) -> bool {
        let centre = self.weights.len() / 2;
        self.weights
            .iter()
            .enumerate()
            .all(|(i, &w)| if i == centre { w == 1.0 } else { w == 0.0 })
    }
}

/// Round an even size up to the next odd number.
#[inline]
pub fn force_odd(size: u32) -> u32 {
    if size % 2 == 0 {
        size + 1
    } else {
        size
    }
}

/// Round `size` up to odd and check it lies in `[min, max]`.
pub fn validate_kernel_size(size: u32, min: u32, max: u32) -> Result<u32, ParameterError> {
    let odd = force_odd(size);
    if odd < min || odd > max {
        return Err(ParameterError::InvalidKernelSize { size, min, max });
    }
    Ok(odd)
}

/// Build a normalized Gaussian kernel.
///
/// `size` is forced odd. Each weight is `exp(-(x²+y²)/(2σ²)) / (2πσ²)` for
/// offsets in `[-k, k]²`, divided by the grid's own sum. A zero (or
/// non-finite) sigma yields the identity kernel.
pub fn gaussian_kernel(sigma: f32, size: u32) -> Kernel {
    let size = force_odd(size);
    if !(sigma.is_finite() && sigma > 0.0) {
        return Kernel::identity(size);
    }

    let k = (size / 2) as i64;
    let sigma = sigma as f64;
    let two_sigma_sq = 2.0 * sigma * sigma;
    let scale = 1.0 / (std::f64::consts::PI * two_sigma_sq);

    let mut raw = Vec::with_capacity((size * size) as usize);
    for y in -k..=k {
        for x in -k..=k {
            let d2 = (x * x + y * y) as f64;
            raw.push((-d2 / two_sigma_sq).exp() * scale);
        }
    }

    let total: f64 = raw.iter().sum();
    if total <= 0.0 {
        return Kernel::identity(size);
    }

    Kernel {
        size,
        weights: raw.iter().map(|w| (w / total) as f32).collect(),
    }
}

/// Convolve `buffer` in place with edge-clamped sampling.
///
/// Reads come from a shadow copy, so no output pixel depends on another
/// output pixel of the same pass.
pub fn convolve(buffer: &mut PixelBuffer, kernel: &Kernel, scope: ChannelScope) {
    let r = kernel.radius();
    let channels = scope.channels();
    buffer.map_with_source(|src, x, y| {
        let mut acc = [0.0f32; 4];
        for dy in -r..=r {
            for dx in -r..=r {
                let w = kernel.at(dx, dy);
                if w == 0.0 {
                    continue;
                }
                let px = src.pixel_clamped(x as i64 + dx, y as i64 + dy);
                for c in 0..channels {
                    acc[c] += w * px[c] as f32;
                }
            }
        }
        let centre = src.pixel(x, y);
        let mut out = centre;
        for c in 0..channels {
            out[c] = to_channel(acc[c]);
        }
        out
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gaussian_normalized() {
        for size in [3, 5, 7, 9, 11, 13, 15] {
            let k = gaussian_kernel(1.5, size);
            assert!((k.sum() - 1.0).abs() < 1e-5, "size {} sums to {}", size, k.sum());
        }
    }

    #[test]
    fn test_even_size_forced_odd() {
        assert_eq!(gaussian_kernel(1.0, 4).size(), 5);
        assert_eq!(gaussian_kernel(1.0, 5).size(), 5);
        assert_eq!(Kernel::identity(2).size(), 3);
    }

    #[test]
    fn test_validate_kernel_size() {
        assert_eq!(validate_kernel_size(4, 3, 15), Ok(5));
        assert_eq!(validate_kernel_size(15, 3, 15), Ok(15));
        assert!(validate_kernel_size(16, 3, 15).is_err());
        assert!(validate_kernel_size(1, 3, 15).is_err());
    }

    #[test]
    fn test_zero_sigma_is_identity() {
        let k = gaussian_kernel(0.0, 5);
        assert!(k.is_identity());
        assert_eq!(k.sum(), 1.0);
    }

    #[test]
    fn test_gaussian_symmetry() {
        let k = gaussian_kernel(2.0, 7);
        assert_eq!(k.at(-2, 1), k.at(2, -1));
        assert_eq!(k.at(0, 3), k.at(3, 0));
        assert!(k.at(0, 0) > k.at(1, 0));
    }

    #[test]
    fn test_gradient_kernels_unnormalized() {
        assert_eq!(Kernel::sobel_x().sum(), 0.0);
        assert_eq!(Kernel::sobel_y().sum(), 0.0);
        assert_eq!(Kernel::sharpen().sum(), 0.0);
        assert_eq!(Kernel::sobel_x().at(1, 0), 2.0);
        assert_eq!(Kernel::sobel_y().at(0, -1), -2.0);
    }

    #[test]
    fn test_single_pixel_convolution() {
        // Every sampled offset clamps to the centre pixel.
        let mut buffer = PixelBuffer::filled(1, 1, [200, 100, 50, 77]).unwrap();
        convolve(&mut buffer, &gaussian_kernel(3.0, 15), ChannelScope::Full);
        assert_eq!(buffer.pixel(0, 0), [200, 100, 50, 77]);
    }

    #[test]
    fn test_color_only_preserves_alpha() {
        let mut buffer =
            PixelBuffer::from_fn(3, 3, |x, _| [x as u8 * 100, 0, 0, if x == 1 { 0 } else { 255 }])
                .unwrap();
        convolve(&mut buffer, &gaussian_kernel(1.0, 3), ChannelScope::ColorOnly);
        assert_eq!(buffer.pixel(1, 1)[3], 0);
        assert_eq!(buffer.pixel(0, 1)[3], 255);
    }
}
