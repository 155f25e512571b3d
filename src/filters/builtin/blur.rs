//! Smoothing filters: Gaussian blur, bilateral filter and median filter.

use crate::core::buffer::{to_channel, PixelBuffer};
use crate::core::error::{check_range, ParameterError};
use crate::core::filter::{Category, Filter, FilterMetadata, FromParameters};
use crate::core::gpu::GpuProgram;
use crate::core::kernel::{
    convolve, gaussian_kernel, validate_kernel_size, ChannelScope, Kernel, MAX_KERNEL_SIZE,
    MIN_KERNEL_SIZE,
};
use crate::core::params::{Parameters, ValueType};
use crate::core::port::{Constraint, ParameterDefinition};
use crate::core::shaders;
use crate::filters::registry::FilterRegistry;

/// Largest accepted spatial sigma.
pub const MAX_SIGMA: f64 = 50.0;

/// Smallest bilateral kernel with a program variant.
pub const MIN_BILATERAL_SIZE: u32 = 5;

/// Largest median kernel with a sorting-network variant.
pub const MAX_MEDIAN_SIZE: u32 = 7;

/// Register blur filters.
pub fn register(registry: &mut FilterRegistry) {
    registry.register::<GaussianBlur>();
    registry.register::<BilateralFilter>();
    registry.register::<MedianFilter>();
}

// ============================================================================
// Gaussian Blur
// ============================================================================

/// Normalized Gaussian convolution over all four channels.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianBlur {
    sigma: f32,
    size: u32,
}

impl GaussianBlur {
    /// Create a blur; even sizes are rounded up to odd.
    pub fn new(sigma: f32, size: u32) -> Result<Self, ParameterError> {
        let size = validate_kernel_size(size, MIN_KERNEL_SIZE, MAX_KERNEL_SIZE)?;
        let filter = Self { sigma, size };
        filter.validate()?;
        Ok(filter)
    }

    /// Standard deviation in pixels.
    pub fn sigma(&self) -> f32 {
        self.sigma
    }

    /// Kernel side length (odd).
    pub fn size(&self) -> u32 {
        self.size
    }

    /// The normalized kernel this filter convolves with.
    pub fn kernel(&self) -> Kernel {
        gaussian_kernel(self.sigma, self.size)
    }
}

impl FromParameters for GaussianBlur {
    fn from_parameters(params: &Parameters) -> Result<Self, ParameterError> {
        Self::new(
            params.float_or("sigma", 0.0)? as f32,
            params.size_or("size", 5)?,
        )
    }
}

impl Filter for GaussianBlur {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder("gaussian_blur", "Gaussian Blur")
            .description("Normalized Gaussian convolution with edge-clamped sampling (alpha is blurred too)")
            .category(Category::Blur)
            .tags(["smooth", "denoise"])
            .parameter(
                ParameterDefinition::new("sigma", ValueType::Float, 0.0)
                    .with_description("Standard deviation in pixels; 0 disables the blur")
                    .with_range(0.0, MAX_SIGMA),
            )
            .parameter(
                ParameterDefinition::new("size", ValueType::Integer, 5u32)
                    .with_description("Kernel size (even sizes are rounded up)")
                    .with_constraint(Constraint::KernelSize {
                        min: MIN_KERNEL_SIZE,
                        max: MAX_KERNEL_SIZE,
                    }),
            )
            .build()
    }

    fn parameters(&self) -> Parameters {
        Parameters::new()
            .with("sigma", self.sigma)
            .with("size", self.size)
    }

    fn is_neutral(&self) -> bool {
        self.sigma == 0.0
    }

    fn validate(&self) -> Result<(), ParameterError> {
        check_range("sigma", self.sigma as f64, 0.0, MAX_SIGMA)?;
        validate_kernel_size(self.size, MIN_KERNEL_SIZE, MAX_KERNEL_SIZE)?;
        Ok(())
    }

    fn process(&self, buffer: &mut PixelBuffer) {
        convolve(buffer, &self.kernel(), ChannelScope::Full);
    }

    fn programs(&self) -> Vec<GpuProgram> {
        vec![GpuProgram::new(
            shaders::convolution_key(self.size, ChannelScope::Full),
            shaders::convolution(self.size, ChannelScope::Full),
        )
        .with_table("uKernel", self.kernel().weights().to_vec())]
    }

    fn clone_box(&self) -> Box<dyn Filter> {
        Box::new(self.clone())
    }
}

// ============================================================================
// Bilateral Filter
// ============================================================================

/// Edge-preserving smoothing.
///
/// Each neighbour is weighted by the spatial Gaussian times a range term
/// `exp(-d²/(2σc²))`, where `d` is the Euclidean RGB distance to the centre
/// in normalized `[0,1]` units. The sum is divided by the accumulated weight.
/// Alpha is copied from the centre pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct BilateralFilter {
    sigma_spatial: f32,
    sigma_color: f32,
    size: u32,
}

impl BilateralFilter {
    /// Create a bilateral filter; even sizes are rounded up to odd.
    pub fn new(sigma_spatial: f32, sigma_color: f32, size: u32) -> Result<Self, ParameterError> {
        let size = validate_kernel_size(size, MIN_BILATERAL_SIZE, MAX_KERNEL_SIZE)?;
        let filter = Self {
            sigma_spatial,
            sigma_color,
            size,
        };
        filter.validate()?;
        Ok(filter)
    }

    fn spatial(&self) -> Kernel {
        gaussian_kernel(self.sigma_spatial, self.size)
    }
}

impl FromParameters for BilateralFilter {
    fn from_parameters(params: &Parameters) -> Result<Self, ParameterError> {
        Self::new(
            params.float_or("sigma_spatial", 0.0)? as f32,
            params.float_or("sigma_color", 0.0)? as f32,
            params.size_or("size", 5)?,
        )
    }
}

impl Filter for BilateralFilter {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder("bilateral", "Bilateral Filter")
            .description("Edge-preserving smoothing weighted by spatial distance and colour similarity")
            .category(Category::Blur)
            .tags(["smooth", "denoise", "edge-preserving"])
            .parameter(
                ParameterDefinition::new("sigma_spatial", ValueType::Float, 0.0)
                    .with_description("Spatial standard deviation in pixels; 0 disables the filter")
                    .with_range(0.0, MAX_SIGMA),
            )
            .parameter(
                ParameterDefinition::new("sigma_color", ValueType::Float, 0.0)
                    .with_description("Colour standard deviation in normalized RGB units; 0 disables the filter")
                    .with_range(0.0, 10.0),
            )
            .parameter(
                ParameterDefinition::new("size", ValueType::Integer, 5u32)
                    .with_description("Kernel size")
                    .with_constraint(Constraint::KernelSize {
                        min: MIN_BILATERAL_SIZE,
                        max: MAX_KERNEL_SIZE,
                    }),
            )
            .build()
    }

    fn parameters(&self) -> Parameters {
        Parameters::new()
            .with("sigma_spatial", self.sigma_spatial)
            .with("sigma_color", self.sigma_color)
            .with("size", self.size)
    }

    fn is_neutral(&self) -> bool {
        self.sigma_spatial == 0.0 || self.sigma_color == 0.0
    }

    fn validate(&self) -> Result<(), ParameterError> {
        check_range("sigma_spatial", self.sigma_spatial as f64, 0.0, MAX_SIGMA)?;
        check_range("sigma_color", self.sigma_color as f64, 0.0, 10.0)?;
        validate_kernel_size(self.size, MIN_BILATERAL_SIZE, MAX_KERNEL_SIZE)?;
        Ok(())
    }

    fn process(&self, buffer: &mut PixelBuffer) {
        let spatial = self.spatial();
        let r = spatial.radius();
        let two_sc2 = 2.0 * self.sigma_color * self.sigma_color;

        buffer.map_with_source(|src, x, y| {
            let centre = src.pixel(x, y);
            let c = [
                centre[0] as f32 / 255.0,
                centre[1] as f32 / 255.0,
                centre[2] as f32 / 255.0,
            ];
            let mut sum = [0.0f32; 3];
            let mut total = 0.0f32;

            for dy in -r..=r {
                for dx in -r..=r {
                    let px = src.pixel_clamped(x as i64 + dx, y as i64 + dy);
                    let n = [
                        px[0] as f32 / 255.0,
                        px[1] as f32 / 255.0,
                        px[2] as f32 / 255.0,
                    ];
                    let d2 = (n[0] - c[0]).powi(2) + (n[1] - c[1]).powi(2) + (n[2] - c[2]).powi(2);
                    let w = spatial.at(dx, dy) * (-d2 / two_sc2).exp();
                    for i in 0..3 {
                        sum[i] += n[i] * w;
                    }
                    total += w;
                }
            }

            if total > 0.0 {
                [
                    to_channel(sum[0] / total * 255.0),
                    to_channel(sum[1] / total * 255.0),
                    to_channel(sum[2] / total * 255.0),
                    centre[3],
                ]
            } else {
                centre
            }
        });
    }

    fn programs(&self) -> Vec<GpuProgram> {
        vec![GpuProgram::new(
            format!("bilateral_{}", self.size),
            shaders::bilateral(self.size),
        )
        .with_float("uSigmaColor", self.sigma_color)
        .with_table("uSpatial", self.spatial().weights().to_vec())]
    }

    fn clone_box(&self) -> Box<dyn Filter> {
        Box::new(self.clone())
    }
}

// ============================================================================
// Median Filter
// ============================================================================

/// Per-channel median over a square neighbourhood.
///
/// Each of R, G and B is sorted independently; this is not a vector median.
/// Alpha is copied from the centre pixel. Size 1 disables the filter.
#[derive(Debug, Clone, PartialEq)]
pub struct MedianFilter {
    size: u32,
}

impl MedianFilter {
    /// Create a median filter of size 1 (off), 3, 5 or 7.
    pub fn new(size: u32) -> Result<Self, ParameterError> {
        let size = validate_kernel_size(size, 1, MAX_MEDIAN_SIZE)?;
        Ok(Self { size })
    }

    /// Kernel side length.
    pub fn size(&self) -> u32 {
        self.size
    }
}

impl FromParameters for MedianFilter {
    fn from_parameters(params: &Parameters) -> Result<Self, ParameterError> {
        Self::new(params.size_or("size", 1)?)
    }
}

impl Filter for MedianFilter {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder("median", "Median Filter")
            .description("Per-channel median of the neighbourhood, removes salt-and-pepper noise")
            .category(Category::Blur)
            .tags(["denoise"])
            .parameter(
                ParameterDefinition::new("size", ValueType::Integer, 1u32)
                    .with_description("Neighbourhood size: 1 (off), 3, 5 or 7")
                    .with_constraint(Constraint::KernelSize {
                        min: 1,
                        max: MAX_MEDIAN_SIZE,
                    }),
            )
            .build()
    }

    fn parameters(&self) -> Parameters {
        Parameters::new().with("size", self.size)
    }

    fn is_neutral(&self) -> bool {
        self.size <= 1
    }

    fn validate(&self) -> Result<(), ParameterError> {
        validate_kernel_size(self.size, 1, MAX_MEDIAN_SIZE).map(|_| ())
    }

    fn process(&self, buffer: &mut PixelBuffer) {
        let r = (self.size / 2) as i64;
        let n = (self.size * self.size) as usize;
        let mut channels = [
            Vec::with_capacity(n),
            Vec::with_capacity(n),
            Vec::with_capacity(n),
        ];

        buffer.map_with_source(|src, x, y| {
            for ch in channels.iter_mut() {
                ch.clear();
            }
            for dy in -r..=r {
                for dx in -r..=r {
                    let px = src.pixel_clamped(x as i64 + dx, y as i64 + dy);
                    for (c, ch) in channels.iter_mut().enumerate() {
                        ch.push(px[c]);
                    }
                }
            }
            let mut out = src.pixel(x, y);
            for (c, ch) in channels.iter_mut().enumerate() {
                ch.sort_unstable();
                out[c] = ch[n / 2];
            }
            out
        });
    }

    fn programs(&self) -> Vec<GpuProgram> {
        vec![GpuProgram::new(
            format!("median_{}", self.size),
            shaders::median(self.size),
        )]
    }

    fn clone_box(&self) -> Box<dyn Filter> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hard_edge() -> PixelBuffer {
        PixelBuffer::from_fn(16, 4, |x, _| {
            if x < 8 {
                [0, 0, 0, 255]
            } else {
                [255, 255, 255, 255]
            }
        })
        .unwrap()
    }

    #[test]
    fn test_gaussian_blur_metadata() {
        let filter = GaussianBlur::new(1.0, 5).unwrap();
        let metadata = filter.metadata();
        assert_eq!(metadata.id, "gaussian_blur");
        assert_eq!(metadata.category, Category::Blur);
        assert_eq!(metadata.parameters.len(), 2);
    }

    #[test]
    fn test_gaussian_blur_validation() {
        assert_eq!(GaussianBlur::new(1.0, 6).unwrap().size(), 7);
        assert!(GaussianBlur::new(-1.0, 5).is_err());
        assert!(GaussianBlur::new(f32::NAN, 5).is_err());
        assert!(GaussianBlur::new(1.0, 17).is_err());
    }

    #[test]
    fn test_gaussian_blur_flat_image_unchanged() {
        let mut buffer = PixelBuffer::filled(5, 5, [10, 20, 30, 40]).unwrap();
        GaussianBlur::new(2.0, 7).unwrap().apply_cpu(&mut buffer);
        assert!(buffer.data().chunks(4).all(|p| p == [10, 20, 30, 40]));
    }

    #[test]
    fn test_gaussian_blur_blends_alpha() {
        let mut buffer =
            PixelBuffer::from_fn(3, 1, |x, _| [0, 0, 0, if x == 1 { 255 } else { 0 }]).unwrap();
        GaussianBlur::new(1.0, 3).unwrap().apply_cpu(&mut buffer);
        let a = buffer.pixel(0, 0)[3];
        assert!(a > 0 && a < 255);
    }

    #[test]
    fn test_bilateral_preserves_edges_better_than_gaussian() {
        let source = hard_edge();

        let mut gaussian = source.clone();
        GaussianBlur::new(2.0, 7).unwrap().apply_cpu(&mut gaussian);

        let mut bilateral = source.clone();
        BilateralFilter::new(2.0, 0.1, 7).unwrap().apply_cpu(&mut bilateral);

        // Step across the edge columns 7 -> 8.
        let step = |b: &PixelBuffer| b.pixel(8, 2)[0] as i32 - b.pixel(7, 2)[0] as i32;
        assert!(step(&gaussian) < 200, "gaussian should blend: {}", step(&gaussian));
        assert!(step(&bilateral) > 250, "bilateral should stay sharp: {}", step(&bilateral));
    }

    #[test]
    fn test_bilateral_neutral_states() {
        assert!(BilateralFilter::new(0.0, 1.0, 5).unwrap().is_neutral());
        assert!(BilateralFilter::new(1.0, 0.0, 5).unwrap().is_neutral());
        assert!(!BilateralFilter::new(1.0, 1.0, 5).unwrap().is_neutral());
        assert!(BilateralFilter::new(1.0, 1.0, 3).is_err());
    }

    #[test]
    fn test_median_flat_image_exact() {
        let source = PixelBuffer::filled(6, 6, [7, 99, 201, 128]).unwrap();
        for size in [3, 5, 7] {
            let mut buffer = source.clone();
            MedianFilter::new(size).unwrap().apply_cpu(&mut buffer);
            assert_eq!(buffer, source);
        }
    }

    #[test]
    fn test_median_removes_impulse() {
        let mut buffer = PixelBuffer::from_fn(5, 5, |x, y| {
            if x == 2 && y == 2 {
                [255, 0, 255, 255]
            } else {
                [50, 60, 70, 255]
            }
        })
        .unwrap();
        MedianFilter::new(3).unwrap().apply_cpu(&mut buffer);
        assert_eq!(buffer.pixel(2, 2), [50, 60, 70, 255]);
    }

    #[test]
    fn test_median_is_per_channel() {
        // Three distinct colours in a row: per-channel median mixes channels.
        let colours = [[0, 200, 100, 255], [100, 0, 200, 255], [200, 100, 0, 255]];
        let mut buffer = PixelBuffer::from_fn(3, 1, |x, _| colours[x as usize]).unwrap();
        MedianFilter::new(3).unwrap().apply_cpu(&mut buffer);
        // Neighbourhood of (1,0) holds each colour three times.
        assert_eq!(buffer.pixel(1, 0), [100, 100, 100, 255]);
    }

    #[test]
    fn test_programs_carry_tables() {
        let program = &GaussianBlur::new(1.0, 5).unwrap().programs()[0];
        assert_eq!(program.key(), "convolution_full_5");
        assert_eq!(program.table().unwrap().values.len(), 25);

        let program = &BilateralFilter::new(1.0, 0.5, 9).unwrap().programs()[0];
        assert_eq!(program.key(), "bilateral_9");
        assert_eq!(program.table().unwrap().values.len(), 81);
    }
}
