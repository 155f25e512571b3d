//! Tonal adjustments: brightness, contrast, saturation, exposure and vignette.

use crate::core::buffer::{to_channel, PixelBuffer};
use crate::core::error::{check_range, ParameterError};
use crate::core::filter::{Category, Filter, FilterMetadata, FromParameters};
use crate::core::gpu::{GpuProgram, UniformValue};
use crate::core::params::{Parameters, ValueType};
use crate::core::port::ParameterDefinition;
use crate::core::shaders;
use crate::filters::builtin::color::luma;
use crate::filters::registry::FilterRegistry;

/// Register adjustment filters.
pub fn register(registry: &mut FilterRegistry) {
    registry.register::<Brightness>();
    registry.register::<Contrast>();
    registry.register::<Saturation>();
    registry.register::<Exposure>();
    registry.register::<Vignette>();
}

fn unit_slider(name: &str, description: &str) -> ParameterDefinition {
    ParameterDefinition::new(name, ValueType::Float, 0.0)
        .with_description(description)
        .with_range(-1.0, 1.0)
}

// ============================================================================
// Brightness
// ============================================================================

/// Additive offset, global plus per channel, in `[-1, 1]` of full scale.
#[derive(Debug, Clone, PartialEq)]
pub struct Brightness {
    amount: f32,
    rgb: [f32; 3],
}

impl Brightness {
    /// Global brightness only.
    pub fn new(amount: f32) -> Result<Self, ParameterError> {
        Self::with_channels(amount, [0.0; 3])
    }

    /// Global brightness plus per-channel offsets.
    pub fn with_channels(amount: f32, rgb: [f32; 3]) -> Result<Self, ParameterError> {
        let filter = Self { amount, rgb };
        filter.validate()?;
        Ok(filter)
    }

    /// Offsets added to R, G and B, in `[0, 255]` units.
    pub fn offsets(&self) -> [f32; 3] {
        [
            (self.amount + self.rgb[0]) * 255.0,
            (self.amount + self.rgb[1]) * 255.0,
            (self.amount + self.rgb[2]) * 255.0,
        ]
    }
}

impl FromParameters for Brightness {
    fn from_parameters(params: &Parameters) -> Result<Self, ParameterError> {
        Self::with_channels(
            params.float_or("amount", 0.0)? as f32,
            [
                params.float_or("red", 0.0)? as f32,
                params.float_or("green", 0.0)? as f32,
                params.float_or("blue", 0.0)? as f32,
            ],
        )
    }
}

impl Filter for Brightness {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder("brightness", "Brightness")
            .description("Add a constant to each colour channel")
            .category(Category::Adjust)
            .tags(["light", "offset"])
            .parameter(unit_slider("amount", "Offset applied to all channels"))
            .parameter(unit_slider("red", "Additional red offset"))
            .parameter(unit_slider("green", "Additional green offset"))
            .parameter(unit_slider("blue", "Additional blue offset"))
            .build()
    }

    fn parameters(&self) -> Parameters {
        Parameters::new()
            .with("amount", self.amount)
            .with("red", self.rgb[0])
            .with("green", self.rgb[1])
            .with("blue", self.rgb[2])
    }

    fn is_neutral(&self) -> bool {
        self.offsets().iter().all(|&o| o == 0.0)
    }

    fn validate(&self) -> Result<(), ParameterError> {
        check_range("amount", self.amount as f64, -1.0, 1.0)?;
        for (name, v) in ["red", "green", "blue"].iter().zip(self.rgb) {
            check_range(name, v as f64, -1.0, 1.0)?;
        }
        Ok(())
    }

    fn process(&self, buffer: &mut PixelBuffer) {
        let offsets = self.offsets();
        buffer.map_pixels(|px| {
            [
                to_channel(px[0] as f32 + offsets[0]),
                to_channel(px[1] as f32 + offsets[1]),
                to_channel(px[2] as f32 + offsets[2]),
                px[3],
            ]
        });
    }

    fn programs(&self) -> Vec<GpuProgram> {
        let [r, g, b] = self.offsets();
        vec![GpuProgram::new("brightness", shaders::BRIGHTNESS)
            .with_uniform("uOffset", UniformValue::Vec3([r / 255.0, g / 255.0, b / 255.0]))]
    }

    fn clone_box(&self) -> Box<dyn Filter> {
        Box::new(self.clone())
    }
}

// ============================================================================
// Contrast
// ============================================================================

/// Contrast around mid-grey.
///
/// `f = 259(c·255 + 255) / (255(259 − c·255))`, then `v' = f(v − 128) + 128`.
#[derive(Debug, Clone, PartialEq)]
pub struct Contrast {
    amount: f32,
}

impl Contrast {
    pub fn new(amount: f32) -> Result<Self, ParameterError> {
        check_range("amount", amount as f64, -1.0, 1.0)?;
        Ok(Self { amount })
    }

    /// Multiplier applied around 128.
    pub fn factor(&self) -> f32 {
        let c = self.amount * 255.0;
        259.0 * (c + 255.0) / (255.0 * (259.0 - c))
    }
}

impl FromParameters for Contrast {
    fn from_parameters(params: &Parameters) -> Result<Self, ParameterError> {
        Self::new(params.float_or("amount", 0.0)? as f32)
    }
}

impl Filter for Contrast {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder("contrast", "Contrast")
            .description("Stretch or compress values around mid-grey")
            .category(Category::Adjust)
            .parameter(unit_slider("amount", "Contrast adjustment; 0 leaves the image unchanged"))
            .build()
    }

    fn parameters(&self) -> Parameters {
        Parameters::new().with("amount", self.amount)
    }

    fn is_neutral(&self) -> bool {
        self.amount == 0.0
    }

    fn validate(&self) -> Result<(), ParameterError> {
        check_range("amount", self.amount as f64, -1.0, 1.0)
    }

    fn process(&self, buffer: &mut PixelBuffer) {
        let f = self.factor();
        let adjust = |v: u8| to_channel(f * (v as f32 - 128.0) + 128.0);
        buffer.map_pixels(|px| [adjust(px[0]), adjust(px[1]), adjust(px[2]), px[3]]);
    }

    fn programs(&self) -> Vec<GpuProgram> {
        vec![GpuProgram::new("contrast", shaders::CONTRAST).with_float("uFactor", self.factor())]
    }

    fn clone_box(&self) -> Box<dyn Filter> {
        Box::new(self.clone())
    }
}

// ============================================================================
// Saturation
// ============================================================================

/// Interpolates each pixel away from (or towards) its luma by `1 + amount`.
#[derive(Debug, Clone, PartialEq)]
pub struct Saturation {
    amount: f32,
}

impl Saturation {
    pub fn new(amount: f32) -> Result<Self, ParameterError> {
        check_range("amount", amount as f64, -1.0, 1.0)?;
        Ok(Self { amount })
    }
}

impl FromParameters for Saturation {
    fn from_parameters(params: &Parameters) -> Result<Self, ParameterError> {
        Self::new(params.float_or("amount", 0.0)? as f32)
    }
}

impl Filter for Saturation {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder("saturation", "Saturation")
            .description("Scale colour distance from luma; -1 gives grayscale")
            .category(Category::Color)
            .tags(["vibrance"])
            .parameter(unit_slider("amount", "Saturation adjustment"))
            .build()
    }

    fn parameters(&self) -> Parameters {
        Parameters::new().with("amount", self.amount)
    }

    fn is_neutral(&self) -> bool {
        self.amount == 0.0
    }

    fn validate(&self) -> Result<(), ParameterError> {
        check_range("amount", self.amount as f64, -1.0, 1.0)
    }

    fn process(&self, buffer: &mut PixelBuffer) {
        let s = 1.0 + self.amount;
        buffer.map_pixels(|px| {
            let gray = luma(px);
            let mix = |v: u8| to_channel(gray + (v as f32 - gray) * s);
            [mix(px[0]), mix(px[1]), mix(px[2]), px[3]]
        });
    }

    fn programs(&self) -> Vec<GpuProgram> {
        vec![GpuProgram::new("saturation", shaders::SATURATION)
            .with_float("uSaturation", 1.0 + self.amount)]
    }

    fn clone_box(&self) -> Box<dyn Filter> {
        Box::new(self.clone())
    }
}

// ============================================================================
// Exposure
// ============================================================================

/// Photographic exposure: multiplies RGB by `2^ev`.
#[derive(Debug, Clone, PartialEq)]
pub struct Exposure {
    exposure: f32,
}

impl Exposure {
    pub fn new(exposure: f32) -> Result<Self, ParameterError> {
        check_range("exposure", exposure as f64, -4.0, 4.0)?;
        Ok(Self { exposure })
    }

    pub fn multiplier(&self) -> f32 {
        self.exposure.exp2()
    }
}

impl FromParameters for Exposure {
    fn from_parameters(params: &Parameters) -> Result<Self, ParameterError> {
        Self::new(params.float_or("exposure", 0.0)? as f32)
    }
}

impl Filter for Exposure {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder("exposure", "Exposure")
            .description("Scale colour by 2^EV")
            .category(Category::Adjust)
            .tags(["light", "ev"])
            .parameter(
                ParameterDefinition::new("exposure", ValueType::Float, 0.0)
                    .with_description("Exposure compensation in stops")
                    .with_range(-4.0, 4.0),
            )
            .build()
    }

    fn parameters(&self) -> Parameters {
        Parameters::new().with("exposure", self.exposure)
    }

    fn is_neutral(&self) -> bool {
        self.exposure == 0.0
    }

    fn validate(&self) -> Result<(), ParameterError> {
        check_range("exposure", self.exposure as f64, -4.0, 4.0)
    }

    fn process(&self, buffer: &mut PixelBuffer) {
        let m = self.multiplier();
        buffer.map_pixels(|px| {
            [
                to_channel(px[0] as f32 * m),
                to_channel(px[1] as f32 * m),
                to_channel(px[2] as f32 * m),
                px[3],
            ]
        });
    }

    fn programs(&self) -> Vec<GpuProgram> {
        vec![GpuProgram::new("exposure", shaders::EXPOSURE).with_float("uMultiplier", self.multiplier())]
    }

    fn clone_box(&self) -> Box<dyn Filter> {
        Box::new(self.clone())
    }
}

// ============================================================================
// Vignette
// ============================================================================

/// Cubic Hermite step, matching WGSL `smoothstep` with a guarded width.
#[inline]
pub(crate) fn soft_step(e0: f32, e1: f32, x: f32) -> f32 {
    let t = ((x - e0) / (e1 - e0).max(1e-5)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Radial darkening (or brightening) outside a focus radius.
///
/// Distance is measured from the image centre in UV space and scaled by the
/// corner distance, so `radius = 1` leaves every pixel untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Vignette {
    radius: f32,
    softness: f32,
    dark: bool,
}

impl Vignette {
    pub fn new(radius: f32, softness: f32, dark: bool) -> Result<Self, ParameterError> {
        let filter = Self {
            radius,
            softness,
            dark,
        };
        filter.validate()?;
        Ok(filter)
    }

    fn factor(&self, u: f32, v: f32) -> f32 {
        let max_dist = std::f32::consts::FRAC_1_SQRT_2;
        let dist = ((u - 0.5).powi(2) + (v - 0.5).powi(2)).sqrt();
        let s = soft_step(
            self.radius * max_dist,
            (self.radius + self.softness) * max_dist,
            dist,
        );
        if self.dark {
            1.0 - s
        } else {
            1.0 + s
        }
    }
}

impl FromParameters for Vignette {
    fn from_parameters(params: &Parameters) -> Result<Self, ParameterError> {
        Self::new(
            params.float_or("radius", 1.0)? as f32,
            params.float_or("softness", 0.5)? as f32,
            params.bool_or("dark", true)?,
        )
    }
}

impl Filter for Vignette {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder("vignette", "Vignette")
            .description("Darken or brighten towards the corners")
            .category(Category::Adjust)
            .tags(["focus", "radial"])
            .parameter(
                ParameterDefinition::new("radius", ValueType::Float, 1.0)
                    .with_description("Focus radius as a fraction of the corner distance; 1 disables")
                    .with_range(0.0, 1.0),
            )
            .parameter(
                ParameterDefinition::new("softness", ValueType::Float, 0.5)
                    .with_description("Width of the transition band")
                    .with_range(0.0, 1.0),
            )
            .parameter(
                ParameterDefinition::new("dark", ValueType::Boolean, true)
                    .with_description("Darken (true) or brighten (false) outside the radius"),
            )
            .build()
    }

    fn parameters(&self) -> Parameters {
        Parameters::new()
            .with("radius", self.radius)
            .with("softness", self.softness)
            .with("dark", self.dark)
    }

    fn is_neutral(&self) -> bool {
        self.radius >= 1.0
    }

    fn validate(&self) -> Result<(), ParameterError> {
        check_range("radius", self.radius as f64, 0.0, 1.0)?;
        check_range("softness", self.softness as f64, 0.0, 1.0)
    }

    fn process(&self, buffer: &mut PixelBuffer) {
        let (w, h) = buffer.dimensions();
        for y in 0..h {
            for x in 0..w {
                let (u, v) = buffer.uv_of(x, y);
                let f = self.factor(u, v);
                let px = buffer.pixel(x, y);
                buffer.set_pixel(
                    x,
                    y,
                    [
                        to_channel(px[0] as f32 * f),
                        to_channel(px[1] as f32 * f),
                        to_channel(px[2] as f32 * f),
                        px[3],
                    ],
                );
            }
        }
    }

    fn programs(&self) -> Vec<GpuProgram> {
        vec![GpuProgram::new("vignette", shaders::VIGNETTE)
            .with_float("uRadius", self.radius)
            .with_float("uSoftness", self.softness)
            .with_float("uDark", if self.dark { 1.0 } else { 0.0 })]
    }

    fn clone_box(&self) -> Box<dyn Filter> {
        Box::new(self.clone())
    }
}
