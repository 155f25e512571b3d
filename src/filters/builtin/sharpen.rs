//! Laplacian sharpening.

use crate::core::buffer::{to_channel, PixelBuffer};
use crate::core::error::{check_range, ParameterError};
use crate::core::filter::{Category, Filter, FilterMetadata, FromParameters};
use crate::core::gpu::GpuProgram;
use crate::core::kernel::Kernel;
use crate::core::params::{Parameters, ValueType};
use crate::core::port::ParameterDefinition;
use crate::core::shaders;
use crate::filters::registry::FilterRegistry;

/// Register sharpening filters.
pub fn register(registry: &mut FilterRegistry) {
    registry.register::<Sharpen>();
}

/// Adds the 3×3 Laplacian response, scaled by `strength`, to RGB.
///
/// `output = original + laplacian * strength`, clamped to `[0, 255]`.
/// Alpha is copied.
#[derive(Debug, Clone, PartialEq)]
pub struct Sharpen {
    strength: f32,
}

impl Sharpen {
    /// Create a sharpen filter with strength in `[0, 2]`.
    pub fn new(strength: f32) -> Result<Self, ParameterError> {
        check_range("strength", strength as f64, 0.0, 2.0)?;
        Ok(Self { strength })
    }

    pub fn strength(&self) -> f32 {
        self.strength
    }
}

impl FromParameters for Sharpen {
    fn from_parameters(params: &Parameters) -> Result<Self, ParameterError> {
        Self::new(params.float_or("strength", 0.0)? as f32)
    }
}

impl Filter for Sharpen {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder("sharpen", "Sharpen")
            .description("Add a scaled Laplacian to the colour channels")
            .category(Category::Sharpen)
            .tags(["detail", "laplacian"])
            .parameter(
                ParameterDefinition::new("strength", ValueType::Float, 0.0)
                    .with_description("Amount of the Laplacian added back; 0 disables")
                    .with_range(0.0, 2.0),
            )
            .build()
    }

    fn parameters(&self) -> Parameters {
        Parameters::new().with("strength", self.strength)
    }

    fn is_neutral(&self) -> bool {
        self.strength == 0.0
    }

    fn validate(&self) -> Result<(), ParameterError> {
        check_range("strength", self.strength as f64, 0.0, 2.0)
    }

    fn process(&self, buffer: &mut PixelBuffer) {
        let kernel = Kernel::sharpen();
        let strength = self.strength;
        buffer.map_with_source(|src, x, y| {
            let centre = src.pixel(x, y);
            let mut lap = [0.0f32; 3];
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let w = kernel.at(dx, dy);
                    if w == 0.0 {
                        continue;
                    }
                    let px = src.pixel_clamped(x as i64 + dx, y as i64 + dy);
                    for c in 0..3 {
                        lap[c] += w * px[c] as f32;
                    }
                }
            }
            [
                to_channel(centre[0] as f32 + lap[0] * strength),
                to_channel(centre[1] as f32 + lap[1] * strength),
                to_channel(centre[2] as f32 + lap[2] * strength),
                centre[3],
            ]
        });
    }

    fn programs(&self) -> Vec<GpuProgram> {
        vec![GpuProgram::new("sharpen", shaders::SHARPEN).with_float("uStrength", self.strength)]
    }

    fn clone_box(&self) -> Box<dyn Filter> {
        Box::new(self.clone())
    }
}
