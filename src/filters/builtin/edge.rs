//! Edge detection: Sobel magnitude, directional edges and the Canny cascade.
//!
//! All CPU stages work on [`FloatImage`] planes in `0..=255` units and clamp
//! coordinates at the image border. Outputs are opaque grey.

use crate::core::buffer::PixelBuffer;
use crate::core::error::{check_range, ParameterError};
use crate::core::filter::{Category, Filter, FilterMetadata, FromParameters};
use crate::core::gpu::GpuProgram;
use crate::core::kernel::{
    gaussian_kernel, validate_kernel_size, ChannelScope, Kernel, MAX_KERNEL_SIZE, MIN_KERNEL_SIZE,
};
use crate::core::params::{Parameters, Value, ValueType};
use crate::core::plane::FloatImage;
use crate::core::port::{Constraint, ParameterDefinition};
use crate::core::shaders;
use crate::filters::builtin::blur::MAX_SIGMA;
use crate::filters::builtin::color::luma;
use crate::filters::registry::FilterRegistry;

/// Ternary value of a strong edge after double thresholding.
pub const STRONG: f32 = 1.0;
/// Ternary value of a weak edge after double thresholding.
pub const WEAK: f32 = 0.5;

/// Register edge filters.
pub fn register(registry: &mut FilterRegistry) {
    registry.register::<SobelEdge>();
    registry.register::<DirectionalEdge>();
    registry.register::<CannyEdge>();
}

// ============================================================================
// Cascade stages
// ============================================================================

/// Luma plane of an RGBA buffer.
pub fn grayscale_plane(buffer: &PixelBuffer) -> FloatImage {
    FloatImage::from_fn(buffer.width(), buffer.height(), |x, y| luma(buffer.pixel(x, y)))
}

/// Gaussian smoothing of a single-channel plane.
pub fn smooth(plane: &FloatImage, kernel: &Kernel) -> FloatImage {
    plane.convolve(kernel, 0)
}

/// Signed Sobel gradient: channel 0 is `gx`, channel 1 is `gy`.
pub fn sobel(plane: &FloatImage) -> FloatImage {
    let gx = plane.convolve(&Kernel::sobel_x(), 0);
    let gy = plane.convolve(&Kernel::sobel_y(), 0);
    let mut out = FloatImage::new(plane.width(), plane.height(), 2);
    for y in 0..plane.height() {
        for x in 0..plane.width() {
            out.set(x, y, 0, gx.get(x, y, 0));
            out.set(x, y, 1, gy.get(x, y, 0));
        }
    }
    out
}

fn magnitude(gradient: &FloatImage, x: i64, y: i64) -> f32 {
    let gx = gradient.get_clamped(x, y, 0);
    let gy = gradient.get_clamped(x, y, 1);
    (gx * gx + gy * gy).sqrt()
}

/// Neighbour offset along the gradient for a direction in degrees `[0, 180)`.
fn gradient_step(angle: f32) -> (i64, i64) {
    if (22.5..67.5).contains(&angle) {
        (1, 1)
    } else if (67.5..112.5).contains(&angle) {
        (0, 1)
    } else if (112.5..157.5).contains(&angle) {
        (-1, 1)
    } else {
        (1, 0)
    }
}

/// Thin gradient ridges to single-pixel edges.
///
/// The angle `atan2(gy, gx)` is folded into `[0, 180)` and quantized to 0°,
/// 45°, 90° or 135°. A pixel keeps its magnitude (clamped to 255) only if it
/// is at least as large as both neighbours along that direction.
pub fn non_max_suppression(gradient: &FloatImage) -> FloatImage {
    FloatImage::from_fn(gradient.width(), gradient.height(), |x, y| {
        let (x, y) = (x as i64, y as i64);
        let gx = gradient.get_clamped(x, y, 0);
        let gy = gradient.get_clamped(x, y, 1);
        let mag = (gx * gx + gy * gy).sqrt();

        let mut angle = gy.atan2(gx).to_degrees();
        if angle < 0.0 {
            angle += 180.0;
        }
        let (dx, dy) = gradient_step(angle);
        let n1 = magnitude(gradient, x + dx, y + dy);
        let n2 = magnitude(gradient, x - dx, y - dy);

        if mag >= n1 && mag >= n2 {
            mag.min(255.0)
        } else {
            0.0
        }
    })
}

/// Classify magnitudes as strong (`1.0`, `>= high`), weak (`0.5`, `> low`) or none.
pub fn double_threshold(plane: &FloatImage, low: f32, high: f32) -> FloatImage {
    FloatImage::from_fn(plane.width(), plane.height(), |x, y| {
        let m = plane.get(x, y, 0);
        if m >= high {
            STRONG
        } else if m > low {
            WEAK
        } else {
            0.0
        }
    })
}

/// Single-pass 3×3 edge linking.
///
/// Strong pixels stay strong; weak pixels become strong when any of their
/// eight neighbours is strong in the input, otherwise they are dropped.
/// Weak chains are not followed transitively.
pub fn hysteresis(plane: &FloatImage) -> FloatImage {
    FloatImage::from_fn(plane.width(), plane.height(), |x, y| {
        let c = plane.get(x, y, 0);
        if c >= STRONG {
            return STRONG;
        }
        if c < WEAK {
            return 0.0;
        }
        let (x, y) = (x as i64, y as i64);
        for dy in -1..=1 {
            for dx in -1..=1 {
                if plane.get_clamped(x + dx, y + dy, 0) >= STRONG {
                    return STRONG;
                }
            }
        }
        0.0
    })
}

// ============================================================================
// Sobel magnitude
// ============================================================================

/// Gradient magnitude of luma, clamped to 255.
#[derive(Debug, Clone, PartialEq)]
pub struct SobelEdge {
    enabled: bool,
}

impl SobelEdge {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl FromParameters for SobelEdge {
    fn from_parameters(params: &Parameters) -> Result<Self, ParameterError> {
        Ok(Self::new(params.bool_or("enabled", true)?))
    }
}

impl Filter for SobelEdge {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder("sobel", "Sobel Edges")
            .description("Sobel gradient magnitude of the luma channel")
            .category(Category::Edge)
            .tags(["gradient", "outline"])
            .parameter(
                ParameterDefinition::new("enabled", ValueType::Boolean, true)
                    .with_description("Whether the filter is applied"),
            )
            .build()
    }

    fn parameters(&self) -> Parameters {
        Parameters::new().with("enabled", self.enabled)
    }

    fn is_neutral(&self) -> bool {
        !self.enabled
    }

    fn process(&self, buffer: &mut PixelBuffer) {
        let gradient = sobel(&grayscale_plane(buffer));
        let mag = FloatImage::from_fn(buffer.width(), buffer.height(), |x, y| {
            magnitude(&gradient, x as i64, y as i64)
        });
        mag.to_gray_buffer(1.0, buffer);
    }

    fn programs(&self) -> Vec<GpuProgram> {
        vec![GpuProgram::new("sobel_edge", shaders::sobel_edge()).with_float("uMode", 0.0)]
    }

    fn clone_box(&self) -> Box<dyn Filter> {
        Box::new(self.clone())
    }
}

// ============================================================================
// Directional edges
// ============================================================================

/// Orientation of the edges to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeDirection {
    /// Horizontal edges: `|Gy|`.
    Horizontal,
    /// Vertical edges: `|Gx|`.
    Vertical,
}

impl EdgeDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeDirection::Horizontal => "horizontal",
            EdgeDirection::Vertical => "vertical",
        }
    }

    fn parse(value: &str) -> Result<Self, ParameterError> {
        match value {
            "horizontal" => Ok(EdgeDirection::Horizontal),
            "vertical" => Ok(EdgeDirection::Vertical),
            other => Err(ParameterError::UnknownOption {
                name: "direction".to_string(),
                value: other.to_string(),
            }),
        }
    }

    fn channel(&self) -> usize {
        match self {
            EdgeDirection::Horizontal => 1,
            EdgeDirection::Vertical => 0,
        }
    }
}

/// One Sobel component (absolute value) of luma, clamped to 255.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionalEdge {
    direction: EdgeDirection,
    enabled: bool,
}

impl DirectionalEdge {
    pub fn new(direction: EdgeDirection, enabled: bool) -> Self {
        Self { direction, enabled }
    }
}

impl FromParameters for DirectionalEdge {
    fn from_parameters(params: &Parameters) -> Result<Self, ParameterError> {
        Ok(Self::new(
            EdgeDirection::parse(params.string_or("direction", "horizontal")?)?,
            params.bool_or("enabled", true)?,
        ))
    }
}

impl Filter for DirectionalEdge {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder("directional_edge", "Directional Edges")
            .description("Absolute horizontal or vertical Sobel response of the luma channel")
            .category(Category::Edge)
            .tags(["gradient", "outline"])
            .parameter(
                ParameterDefinition::new("direction", ValueType::String, "horizontal")
                    .with_description("Edge orientation to detect")
                    .with_constraint(Constraint::OneOf(vec![
                        Value::from("horizontal"),
                        Value::from("vertical"),
                    ])),
            )
            .parameter(
                ParameterDefinition::new("enabled", ValueType::Boolean, true)
                    .with_description("Whether the filter is applied"),
            )
            .build()
    }

    fn parameters(&self) -> Parameters {
        Parameters::new()
            .with("direction", self.direction.as_str())
            .with("enabled", self.enabled)
    }

    fn is_neutral(&self) -> bool {
        !self.enabled
    }

    fn process(&self, buffer: &mut PixelBuffer) {
        let gradient = sobel(&grayscale_plane(buffer));
        let c = self.direction.channel();
        let edges = FloatImage::from_fn(buffer.width(), buffer.height(), |x, y| {
            gradient.get(x, y, c).abs()
        });
        edges.to_gray_buffer(1.0, buffer);
    }

    fn programs(&self) -> Vec<GpuProgram> {
        let mode = match self.direction {
            EdgeDirection::Vertical => 1.0,
            EdgeDirection::Horizontal => 2.0,
        };
        vec![GpuProgram::new("sobel_edge", shaders::sobel_edge()).with_float("uMode", mode)]
    }

    fn clone_box(&self) -> Box<dyn Filter> {
        Box::new(self.clone())
    }
}

// ============================================================================
// Canny
// ============================================================================

/// Six-stage Canny edge detector.
///
/// grayscale → Gaussian(σ, size) → Sobel → non-maximum suppression →
/// double threshold(low, high) → single-pass hysteresis. Thresholds are in
/// `0..=255` magnitude units. Output is a binary opaque grey image.
#[derive(Debug, Clone, PartialEq)]
pub struct CannyEdge {
    enabled: bool,
    sigma: f32,
    size: u32,
    low: f32,
    high: f32,
}

impl CannyEdge {
    pub fn new(sigma: f32, size: u32, low: f32, high: f32) -> Result<Self, ParameterError> {
        let size = validate_kernel_size(size, MIN_KERNEL_SIZE, MAX_KERNEL_SIZE)?;
        let filter = Self {
            enabled: true,
            sigma,
            size,
            low,
            high,
        };
        filter.validate()?;
        Ok(filter)
    }

    /// Replace the thresholds, forcing `low < high` the way interactive
    /// sliders do: when `low >= high`, `low` becomes `high - 1` (at least 0).
    pub fn with_thresholds(mut self, low: f32, high: f32) -> Self {
        let high = high.clamp(0.0, 255.0);
        let mut low = low.clamp(0.0, 255.0);
        if low >= high {
            low = (high - 1.0).max(0.0);
        }
        self.low = low;
        self.high = high;
        self
    }

    /// Enable or disable the detector.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn thresholds(&self) -> (f32, f32) {
        (self.low, self.high)
    }

    fn kernel(&self) -> Kernel {
        gaussian_kernel(self.sigma, self.size)
    }

    /// Run the cascade and return the binary edge plane (`0.0` or `1.0`).
    pub fn detect(&self, buffer: &PixelBuffer) -> FloatImage {
        let gray = grayscale_plane(buffer);
        let smoothed = smooth(&gray, &self.kernel());
        let gradient = sobel(&smoothed);
        let thin = non_max_suppression(&gradient);
        let classified = double_threshold(&thin, self.low, self.high);
        hysteresis(&classified)
    }
}

impl FromParameters for CannyEdge {
    fn from_parameters(params: &Parameters) -> Result<Self, ParameterError> {
        let filter = Self::new(
            params.float_or("sigma", 1.0)? as f32,
            params.size_or("size", 5)?,
            params.float_or("low", 10.0)? as f32,
            params.float_or("high", 20.0)? as f32,
        )?;
        Ok(filter.enabled(params.bool_or("enabled", true)?))
    }
}

impl Filter for CannyEdge {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder("canny", "Canny Edges")
            .description("Gaussian smoothing, Sobel gradient, non-maximum suppression, double threshold and hysteresis")
            .category(Category::Edge)
            .tags(["edges", "outline", "detector"])
            .gpu_passes(6)
            .parameter(
                ParameterDefinition::new("enabled", ValueType::Boolean, true)
                    .with_description("Whether the filter is applied"),
            )
            .parameter(
                ParameterDefinition::new("sigma", ValueType::Float, 1.0)
                    .with_description("Smoothing standard deviation in pixels")
                    .with_range(0.0, MAX_SIGMA),
            )
            .parameter(
                ParameterDefinition::new("size", ValueType::Integer, 5u32)
                    .with_description("Smoothing kernel size")
                    .with_constraint(Constraint::KernelSize {
                        min: MIN_KERNEL_SIZE,
                        max: MAX_KERNEL_SIZE,
                    }),
            )
            .parameter(
                ParameterDefinition::new("low", ValueType::Float, 10.0)
                    .with_description("Weak-edge threshold (gradient magnitude)")
                    .with_range(0.0, 255.0),
            )
            .parameter(
                ParameterDefinition::new("high", ValueType::Float, 20.0)
                    .with_description("Strong-edge threshold (gradient magnitude)")
                    .with_range(0.0, 255.0),
            )
            .build()
    }

    fn parameters(&self) -> Parameters {
        Parameters::new()
            .with("enabled", self.enabled)
            .with("sigma", self.sigma)
            .with("size", self.size)
            .with("low", self.low)
            .with("high", self.high)
    }

    fn is_neutral(&self) -> bool {
        !self.enabled
    }

    fn validate(&self) -> Result<(), ParameterError> {
        check_range("sigma", self.sigma as f64, 0.0, MAX_SIGMA)?;
        validate_kernel_size(self.size, MIN_KERNEL_SIZE, MAX_KERNEL_SIZE)?;
        check_range("low", self.low as f64, 0.0, 255.0)?;
        check_range("high", self.high as f64, 0.0, 255.0)?;
        if self.low > self.high {
            return Err(ParameterError::InvalidThresholds {
                low: self.low as f64,
                high: self.high as f64,
            });
        }
        Ok(())
    }

    fn process(&self, buffer: &mut PixelBuffer) {
        let edges = self.detect(buffer);
        edges.to_gray_buffer(255.0, buffer);
    }

    fn programs(&self) -> Vec<GpuProgram> {
        vec![
            GpuProgram::new("canny_grayscale", shaders::CANNY_GRAYSCALE),
            GpuProgram::new(
                shaders::convolution_key(self.size, ChannelScope::ColorOnly),
                shaders::convolution(self.size, ChannelScope::ColorOnly),
            )
            .with_table("uKernel", self.kernel().weights().to_vec()),
            GpuProgram::new("canny_sobel", shaders::CANNY_SOBEL),
            GpuProgram::new("canny_suppress", shaders::CANNY_SUPPRESS),
            GpuProgram::new("canny_threshold", shaders::CANNY_THRESHOLD)
                .with_float("uLow", self.low / 255.0)
                .with_float("uHigh", self.high / 255.0),
            GpuProgram::new("canny_hysteresis", shaders::CANNY_HYSTERESIS),
        ]
    }

    fn clone_box(&self) -> Box<dyn Filter> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertical_edge() -> PixelBuffer {
        PixelBuffer::from_fn(16, 8, |x, _| {
            if x < 8 {
                [0, 0, 0, 255]
            } else {
                [255, 255, 255, 255]
            }
        })
        .unwrap()
    }

    #[test]
    fn test_canny_marks_vertical_edge() {
        let filter = CannyEdge::new(1.0, 5, 10.0, 20.0).unwrap();
        let edges = filter.detect(&vertical_edge());
        for y in 0..8 {
            // The ridge straddles columns 7 and 8; suppression keeps at least one.
            assert_eq!(edges.get(7, y, 0).max(edges.get(8, y, 0)), 1.0, "row {}", y);
            for x in (0..16).filter(|&x| x != 7 && x != 8) {
                assert_eq!(edges.get(x, y, 0), 0.0, "pixel ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn test_canny_output_is_binary_and_opaque() {
        let mut buffer = vertical_edge();
        CannyEdge::new(1.0, 5, 10.0, 20.0).unwrap().apply_cpu(&mut buffer);
        for px in buffer.data().chunks(4) {
            assert!(px[0] == 0 || px[0] == 255);
            assert_eq!(px[3], 255);
        }
        assert_eq!(buffer.pixel(7, 3)[0].max(buffer.pixel(8, 3)[0]), 255);
        assert_eq!(buffer.pixel(2, 3), [0, 0, 0, 255]);
    }

    #[test]
    fn test_flat_image_has_no_edges() {
        let mut buffer = PixelBuffer::filled(6, 6, [128, 64, 32, 255]).unwrap();
        CannyEdge::new(1.4, 5, 10.0, 20.0).unwrap().apply_cpu(&mut buffer);
        assert!(buffer.data().chunks(4).all(|p| p == [0, 0, 0, 255]));
    }

    #[test]
    fn test_threshold_ordering() {
        assert!(matches!(
            CannyEdge::new(1.0, 5, 30.0, 20.0),
            Err(ParameterError::InvalidThresholds { .. })
        ));
        let filter = CannyEdge::new(1.0, 5, 10.0, 20.0).unwrap().with_thresholds(50.0, 40.0);
        assert_eq!(filter.thresholds(), (39.0, 40.0));
        let filter = filter.with_thresholds(5.0, 0.0);
        assert_eq!(filter.thresholds(), (0.0, 0.0));
    }

    #[test]
    fn test_non_max_suppression_bins() {
        assert_eq!(gradient_step(0.0), (1, 0));
        assert_eq!(gradient_step(22.5), (1, 1));
        assert_eq!(gradient_step(90.0), (0, 1));
        assert_eq!(gradient_step(112.5), (-1, 1));
        assert_eq!(gradient_step(170.0), (1, 0));
    }

    #[test]
    fn test_hysteresis_single_pass() {
        // strong, weak, weak: only the first weak pixel is linked.
        let plane = FloatImage::from_fn(3, 1, |x, _| [STRONG, WEAK, WEAK][x as usize]);
        let linked = hysteresis(&plane);
        assert_eq!(linked.data(), &[1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_double_threshold_classes() {
        let plane = FloatImage::from_fn(4, 1, |x, _| [5.0, 10.0, 15.0, 20.0][x as usize]);
        let classified = double_threshold(&plane, 10.0, 20.0);
        assert_eq!(classified.data(), &[0.0, 0.0, WEAK, STRONG]);
    }

    #[test]
    fn test_directional_edges() {
        let mut vertical = vertical_edge();
        DirectionalEdge::new(EdgeDirection::Vertical, true).apply_cpu(&mut vertical);
        assert_eq!(vertical.pixel(7, 4)[0], 255);

        let mut horizontal = vertical_edge();
        DirectionalEdge::new(EdgeDirection::Horizontal, true).apply_cpu(&mut horizontal);
        assert!(horizontal.data().chunks(4).all(|p| p == [0, 0, 0, 255]));
    }

    #[test]
    fn test_sobel_magnitude_clamped() {
        let mut buffer = vertical_edge();
        SobelEdge::new(true).apply_cpu(&mut buffer);
        assert_eq!(buffer.pixel(8, 0), [255, 255, 255, 255]);
        assert_eq!(buffer.pixel(0, 0), [0, 0, 0, 255]);
    }

    #[test]
    fn test_canny_programs() {
        let programs = CannyEdge::new(1.0, 7, 10.0, 20.0).unwrap().programs();
        assert_eq!(programs.len(), 6);
        assert_eq!(programs[1].key(), "convolution_7");
        assert_eq!(programs[1].table().unwrap().values.len(), 49);
    }
}
