//! Per-pixel colour filters: grayscale, sepia, invert, threshold and tone curves.

use crate::core::buffer::{to_channel, PixelBuffer};
use crate::core::error::{check_range, ParameterError};
use crate::core::filter::{Category, Filter, FilterMetadata, FromParameters};
use crate::core::gpu::{GpuProgram, UniformValue};
use crate::core::params::{Parameters, Value, ValueType};
use crate::core::port::{Constraint, ParameterDefinition};
use crate::core::shaders::{self, LUMA};
use crate::filters::registry::FilterRegistry;

/// Register colour filters.
pub fn register(registry: &mut FilterRegistry) {
    registry.register::<Grayscale>();
    registry.register::<Sepia>();
    registry.register::<Invert>();
    registry.register::<Threshold>();
    registry.register::<ColorTone>();
}

fn enabled_parameter() -> ParameterDefinition {
    ParameterDefinition::new("enabled", ValueType::Boolean, true)
        .with_description("Whether the filter is applied")
}

/// Rec. 601 luma of an RGBA pixel in `[0, 255]`.
#[inline]
pub fn luma(px: [u8; 4]) -> f32 {
    LUMA[0] * px[0] as f32 + LUMA[1] * px[1] as f32 + LUMA[2] * px[2] as f32
}

// ============================================================================
// Grayscale
// ============================================================================

/// Converts to luma `0.299R + 0.587G + 0.114B`, keeping alpha.
#[derive(Debug, Clone, PartialEq)]
pub struct Grayscale {
    enabled: bool,
}

impl Grayscale {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl Default for Grayscale {
    fn default() -> Self {
        Self::new(true)
    }
}

impl FromParameters for Grayscale {
    fn from_parameters(params: &Parameters) -> Result<Self, ParameterError> {
        Ok(Self::new(params.bool_or("enabled", true)?))
    }
}

impl Filter for Grayscale {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder("grayscale", "Grayscale")
            .description("Convert to luma (0.299R + 0.587G + 0.114B)")
            .category(Category::Color)
            .tags(["monochrome", "desaturate"])
            .parameter(enabled_parameter())
            .build()
    }

    fn parameters(&self) -> Parameters {
        Parameters::new().with("enabled", self.enabled)
    }

    fn is_neutral(&self) -> bool {
        !self.enabled
    }

    fn process(&self, buffer: &mut PixelBuffer) {
        buffer.map_pixels(|px| {
            let gray = to_channel(luma(px));
            [gray, gray, gray, px[3]]
        });
    }

    fn programs(&self) -> Vec<GpuProgram> {
        vec![GpuProgram::new("grayscale", shaders::GRAYSCALE)]
    }

    fn clone_box(&self) -> Box<dyn Filter> {
        Box::new(self.clone())
    }
}

// ============================================================================
// Sepia
// ============================================================================

const SEPIA_MATRIX: [[f32; 3]; 3] = [
    [0.393, 0.769, 0.189],
    [0.349, 0.686, 0.168],
    [0.272, 0.534, 0.131],
];

/// Standard sepia colour matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Sepia {
    enabled: bool,
}

impl Sepia {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl FromParameters for Sepia {
    fn from_parameters(params: &Parameters) -> Result<Self, ParameterError> {
        Ok(Self::new(params.bool_or("enabled", true)?))
    }
}

impl Filter for Sepia {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder("sepia", "Sepia")
            .description("Warm brown tint using the standard sepia matrix")
            .category(Category::Color)
            .tags(["vintage", "tint"])
            .parameter(enabled_parameter())
            .build()
    }

    fn parameters(&self) -> Parameters {
        Parameters::new().with("enabled", self.enabled)
    }

    fn is_neutral(&self) -> bool {
        !self.enabled
    }

    fn process(&self, buffer: &mut PixelBuffer) {
        buffer.map_pixels(|px| {
            let rgb = [px[0] as f32, px[1] as f32, px[2] as f32];
            let row = |m: [f32; 3]| to_channel(m[0] * rgb[0] + m[1] * rgb[1] + m[2] * rgb[2]);
            [
                row(SEPIA_MATRIX[0]),
                row(SEPIA_MATRIX[1]),
                row(SEPIA_MATRIX[2]),
                px[3],
            ]
        });
    }

    fn programs(&self) -> Vec<GpuProgram> {
        vec![GpuProgram::new("sepia", shaders::SEPIA)]
    }

    fn clone_box(&self) -> Box<dyn Filter> {
        Box::new(self.clone())
    }
}

// ============================================================================
// Invert
// ============================================================================

/// Colour negative, optionally inverting alpha as well.
#[derive(Debug, Clone, PartialEq)]
pub struct Invert {
    enabled: bool,
    invert_alpha: bool,
}

impl Invert {
    pub fn new(enabled: bool, invert_alpha: bool) -> Self {
        Self {
            enabled,
            invert_alpha,
        }
    }
}

impl FromParameters for Invert {
    fn from_parameters(params: &Parameters) -> Result<Self, ParameterError> {
        Ok(Self::new(
            params.bool_or("enabled", true)?,
            params.bool_or("invert_alpha", false)?,
        ))
    }
}

impl Filter for Invert {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder("invert", "Invert")
            .description("Invert colour channels (255 - value)")
            .category(Category::Color)
            .tags(["negative"])
            .parameter(enabled_parameter())
            .parameter(
                ParameterDefinition::new("invert_alpha", ValueType::Boolean, false)
                    .with_description("Also invert the alpha channel"),
            )
            .build()
    }

    fn parameters(&self) -> Parameters {
        Parameters::new()
            .with("enabled", self.enabled)
            .with("invert_alpha", self.invert_alpha)
    }

    fn is_neutral(&self) -> bool {
        !self.enabled
    }

    fn process(&self, buffer: &mut PixelBuffer) {
        let invert_alpha = self.invert_alpha;
        buffer.map_pixels(|px| {
            [
                255 - px[0],
                255 - px[1],
                255 - px[2],
                if invert_alpha { 255 - px[3] } else { px[3] },
            ]
        });
    }

    fn programs(&self) -> Vec<GpuProgram> {
        vec![GpuProgram::new("invert", shaders::INVERT)
            .with_float("uInvertAlpha", if self.invert_alpha { 1.0 } else { 0.0 })]
    }

    fn clone_box(&self) -> Box<dyn Filter> {
        Box::new(self.clone())
    }
}

// ============================================================================
// Threshold
// ============================================================================

const CHANNEL_NAMES: [&str; 3] = ["red", "green", "blue"];

/// Step function for one colour channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelStep {
    /// Whether this channel is thresholded at all.
    pub active: bool,
    pub threshold: u8,
    pub lower: u8,
    pub upper: u8,
}

impl ChannelStep {
    /// An active step.
    pub fn new(threshold: u8, lower: u8, upper: u8) -> Self {
        Self {
            active: true,
            threshold,
            lower,
            upper,
        }
    }

    /// A pass-through step.
    pub fn inactive() -> Self {
        Self {
            active: false,
            threshold: 128,
            lower: 0,
            upper: 255,
        }
    }

    #[inline]
    fn apply(&self, v: u8) -> u8 {
        if !self.active {
            v
        } else if v > self.threshold {
            self.upper
        } else {
            self.lower
        }
    }
}

/// Hard per-channel step: `channel > threshold ? upper : lower`.
///
/// Each of R, G and B has its own independent triple and can be left
/// untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Threshold {
    channels: [ChannelStep; 3],
}

impl Threshold {
    pub fn new(red: ChannelStep, green: ChannelStep, blue: ChannelStep) -> Self {
        Self {
            channels: [red, green, blue],
        }
    }

    /// The same step on all three channels.
    pub fn uniform(step: ChannelStep) -> Self {
        Self::new(step, step, step)
    }

    fn byte(params: &Parameters, name: &str, default: u8) -> Result<u8, ParameterError> {
        let v = params.float_or(name, default as f64)?;
        check_range(name, v, 0.0, 255.0)?;
        Ok(v.round() as u8)
    }
}

impl FromParameters for Threshold {
    fn from_parameters(params: &Parameters) -> Result<Self, ParameterError> {
        let mut channels = [ChannelStep::inactive(); 3];
        for (step, name) in channels.iter_mut().zip(CHANNEL_NAMES) {
            *step = ChannelStep {
                active: params.bool_or(name, false)?,
                threshold: Self::byte(params, &format!("{}_threshold", name), 128)?,
                lower: Self::byte(params, &format!("{}_lower", name), 0)?,
                upper: Self::byte(params, &format!("{}_upper", name), 255)?,
            };
        }
        Ok(Self { channels })
    }
}

impl Filter for Threshold {
    fn metadata(&self) -> FilterMetadata {
        let mut builder = FilterMetadata::builder("threshold", "Threshold")
            .description("Per-channel step: values above the threshold become 'upper', others 'lower'")
            .category(Category::Color)
            .tags(["posterize", "binary"]);

        for name in CHANNEL_NAMES {
            builder = builder
                .parameter(
                    ParameterDefinition::new(name, ValueType::Boolean, false)
                        .with_description(format!("Threshold the {} channel", name)),
                )
                .parameter(
                    ParameterDefinition::new(format!("{}_threshold", name), ValueType::Float, 128.0)
                        .with_range(0.0, 255.0),
                )
                .parameter(
                    ParameterDefinition::new(format!("{}_lower", name), ValueType::Float, 0.0)
                        .with_range(0.0, 255.0),
                )
                .parameter(
                    ParameterDefinition::new(format!("{}_upper", name), ValueType::Float, 255.0)
                        .with_range(0.0, 255.0),
                );
        }
        builder.build()
    }

    fn parameters(&self) -> Parameters {
        let mut params = Parameters::new();
        for (step, name) in self.channels.iter().zip(CHANNEL_NAMES) {
            params.set(name, step.active);
            params.set(format!("{}_threshold", name), step.threshold as f64);
            params.set(format!("{}_lower", name), step.lower as f64);
            params.set(format!("{}_upper", name), step.upper as f64);
        }
        params
    }

    fn is_neutral(&self) -> bool {
        self.channels.iter().all(|c| !c.active)
    }

    fn process(&self, buffer: &mut PixelBuffer) {
        let [r, g, b] = self.channels;
        buffer.map_pixels(|px| [r.apply(px[0]), g.apply(px[1]), b.apply(px[2]), px[3]]);
    }

    fn programs(&self) -> Vec<GpuProgram> {
        let vec3 = |f: fn(&ChannelStep) -> f32| {
            UniformValue::Vec3([f(&self.channels[0]), f(&self.channels[1]), f(&self.channels[2])])
        };
        vec![GpuProgram::new("threshold", shaders::THRESHOLD)
            .with_uniform("uMask", vec3(|c| if c.active { 1.0 } else { 0.0 }))
            .with_uniform("uThreshold", vec3(|c| c.threshold as f32 / 255.0))
            .with_uniform("uLower", vec3(|c| c.lower as f32 / 255.0))
            .with_uniform("uUpper", vec3(|c| c.upper as f32 / 255.0))]
    }

    fn clone_box(&self) -> Box<dyn Filter> {
        Box::new(self.clone())
    }
}

// ============================================================================
// Cold / warm tone curves
// ============================================================================

/// Cubic `a·x³ + b·x² + c·x + d` over the `[0, 255]` domain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneCurve(pub [f32; 4]);

impl ToneCurve {
    /// Curve that pulls a channel down.
    pub const DECREASE: ToneCurve = ToneCurve([0.000007, -0.000817, 0.724952, 0.0]);
    /// Curve that lifts a channel.
    pub const INCREASE: ToneCurve = ToneCurve([-0.000012, 0.002894, 1.035397, 0.0]);

    /// Evaluate on a channel byte, clamped back to `[0, 255]`.
    #[inline]
    pub fn apply(&self, v: u8) -> u8 {
        let [a, b, c, d] = self.0;
        let x = v as f32;
        to_channel(((a * x + b) * x + c) * x + d)
    }
}

/// Tone direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    /// Red down, blue up.
    Cold,
    /// Red up, blue down.
    Warm,
}

impl Tone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Cold => "cold",
            Tone::Warm => "warm",
        }
    }

    fn parse(value: &str) -> Result<Self, ParameterError> {
        match value {
            "cold" => Ok(Tone::Cold),
            "warm" => Ok(Tone::Warm),
            other => Err(ParameterError::UnknownOption {
                name: "tone".to_string(),
                value: other.to_string(),
            }),
        }
    }

    /// Red and blue curves for this tone.
    pub fn curves(&self) -> (ToneCurve, ToneCurve) {
        match self {
            Tone::Cold => (ToneCurve::DECREASE, ToneCurve::INCREASE),
            Tone::Warm => (ToneCurve::INCREASE, ToneCurve::DECREASE),
        }
    }
}

/// Cold or warm colour cast from fixed cubic curves on red and blue.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorTone {
    tone: Tone,
    enabled: bool,
}

impl ColorTone {
    pub fn new(tone: Tone, enabled: bool) -> Self {
        Self { tone, enabled }
    }
}

impl FromParameters for ColorTone {
    fn from_parameters(params: &Parameters) -> Result<Self, ParameterError> {
        Ok(Self::new(
            Tone::parse(params.string_or("tone", "cold")?)?,
            params.bool_or("enabled", true)?,
        ))
    }
}

impl Filter for ColorTone {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder("color_tone", "Color Tone")
            .description("Cold or warm cast using cubic red/blue curves")
            .category(Category::Color)
            .tags(["cold", "warm", "curve"])
            .parameter(
                ParameterDefinition::new("tone", ValueType::String, "cold")
                    .with_description("Curve direction")
                    .with_constraint(Constraint::OneOf(vec![
                        Value::from("cold"),
                        Value::from("warm"),
                    ])),
            )
            .parameter(enabled_parameter())
            .build()
    }

    fn parameters(&self) -> Parameters {
        Parameters::new()
            .with("tone", self.tone.as_str())
            .with("enabled", self.enabled)
    }

    fn is_neutral(&self) -> bool {
        !self.enabled
    }

    fn process(&self, buffer: &mut PixelBuffer) {
        let (red, blue) = self.tone.curves();
        buffer.map_pixels(|px| [red.apply(px[0]), px[1], blue.apply(px[2]), px[3]]);
    }

    fn programs(&self) -> Vec<GpuProgram> {
        let (red, blue) = self.tone.curves();
        vec![GpuProgram::new("color_tone", shaders::COLOR_TONE)
            .with_uniform("uRedCurve", UniformValue::Vec4(red.0))
            .with_uniform("uBlueCurve", UniformValue::Vec4(blue.0))]
    }

    fn clone_box(&self) -> Box<dyn Filter> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PixelBuffer {
        PixelBuffer::from_fn(4, 2, |x, y| [x as u8 * 60, y as u8 * 120, 200, 180]).unwrap()
    }

    #[test]
    fn test_grayscale_luma() {
        let mut buffer = PixelBuffer::filled(1, 1, [255, 0, 0, 9]).unwrap();
        Grayscale::default().apply_cpu(&mut buffer);
        // 0.299 * 255 = 76.2
        assert_eq!(buffer.pixel(0, 0), [76, 76, 76, 9]);
    }

    #[test]
    fn test_disabled_toggles_are_neutral() {
        let filters: Vec<Box<dyn Filter>> = vec![
            Box::new(Grayscale::new(false)),
            Box::new(Sepia::new(false)),
            Box::new(Invert::new(false, true)),
            Box::new(ColorTone::new(Tone::Warm, false)),
            Box::new(Threshold::from_parameters(&Parameters::new()).unwrap()),
        ];
        for filter in filters {
            assert!(filter.is_neutral(), "{} should be neutral", filter.metadata().id);
            let mut buffer = sample();
            filter.apply_cpu(&mut buffer);
            assert_eq!(buffer, sample());
        }
    }

    #[test]
    fn test_invert_twice_is_identity() {
        let filter = Invert::new(true, true);
        let mut buffer = sample();
        filter.apply_cpu(&mut buffer);
        assert_ne!(buffer, sample());
        filter.apply_cpu(&mut buffer);
        assert_eq!(buffer, sample());
    }

    #[test]
    fn test_sepia_clamps() {
        let mut buffer = PixelBuffer::filled(1, 1, [255, 255, 255, 255]).unwrap();
        Sepia::new(true).apply_cpu(&mut buffer);
        assert_eq!(buffer.pixel(0, 0), [255, 255, 239, 255]);
    }

    #[test]
    fn test_threshold_per_channel() {
        let params = Parameters::new()
            .with("red", true)
            .with("red_threshold", 100.0)
            .with("red_lower", 10.0)
            .with("red_upper", 250.0);
        let filter = Threshold::from_parameters(&params).unwrap();
        assert!(!filter.is_neutral());

        let mut buffer = PixelBuffer::from_fn(2, 1, |x, _| [if x == 0 { 100 } else { 101 }, 7, 8, 255]).unwrap();
        filter.apply_cpu(&mut buffer);
        assert_eq!(buffer.pixel(0, 0), [10, 7, 8, 255]);
        assert_eq!(buffer.pixel(1, 0), [250, 7, 8, 255]);
    }

    #[test]
    fn test_threshold_rejects_out_of_range() {
        let params = Parameters::new().with("green_upper", 300.0);
        assert!(matches!(
            Threshold::from_parameters(&params),
            Err(ParameterError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_tone_curves() {
        assert_eq!(ToneCurve::DECREASE.apply(0), 0);
        assert_eq!(ToneCurve::INCREASE.apply(0), 0);
        assert!(ToneCurve::DECREASE.apply(128) < 128);
        assert!(ToneCurve::INCREASE.apply(128) > 128);

        let mut buffer = PixelBuffer::filled(1, 1, [128, 128, 128, 255]).unwrap();
        ColorTone::new(Tone::Cold, true).apply_cpu(&mut buffer);
        let px = buffer.pixel(0, 0);
        assert!(px[0] < 128 && px[2] > 128);
        assert_eq!(px[1], 128);
    }

    #[test]
    fn test_unknown_tone() {
        let params = Parameters::new().with("tone", "tepid");
        assert!(matches!(
            ColorTone::from_parameters(&params),
            Err(ParameterError::UnknownOption { .. })
        ));
    }

    #[test]
    fn test_threshold_program_uniforms() {
        let filter = Threshold::uniform(ChannelStep::new(51, 0, 255));
        let program = &filter.programs()[0];
        assert_eq!(program.uniform("uThreshold"), Some(&UniformValue::Vec3([0.2; 3])));
        assert_eq!(program.uniform("uMask"), Some(&UniformValue::Vec3([1.0; 3])));
    }
}
