//! Geometric warps in normalized UV space: swirl, bulge, zoom blur and reflect.
//!
//! The GPU programs are the primary implementation. The CPU paths evaluate
//! the same UV mapping at each pixel centre and sample with nearest-pixel,
//! edge-clamped lookup, matching the renderer's sampler.

use crate::core::buffer::{to_channel, PixelBuffer};
use crate::core::error::{check_range, ParameterError};
use crate::core::filter::{Category, Filter, FilterMetadata, FromParameters};
use crate::core::gpu::{GpuProgram, UniformValue};
use crate::core::params::{Parameters, Value, ValueType};
use crate::core::port::{Constraint, ParameterDefinition};
use crate::core::shaders;
use crate::filters::builtin::adjust::soft_step;
use crate::filters::registry::FilterRegistry;

/// Maximum swirl rotation in radians, either direction.
pub const MAX_SWIRL_ANGLE: f64 = 10.0;

/// Samples taken along each zoom-blur ray.
pub const ZOOM_SAMPLES: usize = 40;

/// Register warp filters.
pub fn register(registry: &mut FilterRegistry) {
    registry.register::<Swirl>();
    registry.register::<Bulge>();
    registry.register::<ZoomBlur>();
    registry.register::<Reflect>();
}

fn center_parameter() -> ParameterDefinition {
    ParameterDefinition::new("center", ValueType::Array, vec![0.5, 0.5])
        .with_description("Warp centre in UV coordinates")
        .with_constraint(Constraint::Length(2))
}

fn check_center(center: [f32; 2]) -> Result<(), ParameterError> {
    check_range("center", center[0] as f64, 0.0, 1.0)?;
    check_range("center", center[1] as f64, 0.0, 1.0)
}

fn read_center(params: &Parameters) -> Result<[f32; 2], ParameterError> {
    let [x, y] = params.point_or("center", [0.5, 0.5])?;
    Ok([x as f32, y as f32])
}

/// Rebuild every pixel from a UV-space source coordinate.
fn remap<F>(buffer: &mut PixelBuffer, mut map: F)
where
    F: FnMut(f32, f32) -> (f32, f32),
{
    buffer.map_with_source(|src, x, y| {
        let (u, v) = src.uv_of(x, y);
        let (su, sv) = map(u, v);
        src.sample_uv(su, sv)
    });
}

// ============================================================================
// Swirl
// ============================================================================

/// Rotates pixels inside `radius` by an angle that grows towards the centre.
#[derive(Debug, Clone, PartialEq)]
pub struct Swirl {
    center: [f32; 2],
    radius: f32,
    angle: f32,
}

impl Swirl {
    pub fn new(center: [f32; 2], radius: f32, angle: f32) -> Result<Self, ParameterError> {
        let filter = Self {
            center,
            radius,
            angle,
        };
        filter.validate()?;
        Ok(filter)
    }

    /// Source UV for output UV `(u, v)`.
    pub fn map(&self, u: f32, v: f32) -> (f32, f32) {
        let [cx, cy] = self.center;
        let (tx, ty) = (u - cx, v - cy);
        let dist = (tx * tx + ty * ty).sqrt();
        if dist >= self.radius {
            return (u, v);
        }
        let percent = (self.radius - dist) / self.radius;
        let theta = percent * percent * self.angle;
        let (s, c) = theta.sin_cos();
        (tx * c - ty * s + cx, tx * s + ty * c + cy)
    }
}

impl FromParameters for Swirl {
    fn from_parameters(params: &Parameters) -> Result<Self, ParameterError> {
        Self::new(
            read_center(params)?,
            params.float_or("radius", 0.5)? as f32,
            params.float_or("angle", 0.0)? as f32,
        )
    }
}

impl Filter for Swirl {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder("swirl", "Swirl")
            .description("Twist pixels around a centre point")
            .category(Category::Warp)
            .tags(["twist", "distort"])
            .parameter(center_parameter())
            .parameter(
                ParameterDefinition::new("radius", ValueType::Float, 0.5)
                    .with_description("Radius of the affected disc in UV units")
                    .with_range(0.0, 1.0),
            )
            .parameter(
                ParameterDefinition::new("angle", ValueType::Float, 0.0)
                    .with_description("Rotation at the centre in radians; 0 disables")
                    .with_range(-MAX_SWIRL_ANGLE, MAX_SWIRL_ANGLE),
            )
            .build()
    }

    fn parameters(&self) -> Parameters {
        Parameters::new()
            .with("center", vec![self.center[0] as f64, self.center[1] as f64])
            .with("radius", self.radius)
            .with("angle", self.angle)
    }

    fn is_neutral(&self) -> bool {
        self.angle == 0.0 || self.radius == 0.0
    }

    fn validate(&self) -> Result<(), ParameterError> {
        check_center(self.center)?;
        check_range("radius", self.radius as f64, 0.0, 1.0)?;
        check_range("angle", self.angle as f64, -MAX_SWIRL_ANGLE, MAX_SWIRL_ANGLE)
    }

    fn process(&self, buffer: &mut PixelBuffer) {
        remap(buffer, |u, v| self.map(u, v));
    }

    fn programs(&self) -> Vec<GpuProgram> {
        vec![GpuProgram::new("swirl", shaders::SWIRL)
            .with_uniform("uCenter", UniformValue::Vec2(self.center))
            .with_float("uRadius", self.radius)
            .with_float("uAngle", self.angle)]
    }

    fn clone_box(&self) -> Box<dyn Filter> {
        Box::new(self.clone())
    }
}

// ============================================================================
// Bulge
// ============================================================================

/// Magnifies (positive strength) or pinches (negative) a disc around `center`.
#[derive(Debug, Clone, PartialEq)]
pub struct Bulge {
    center: [f32; 2],
    radius: f32,
    strength: f32,
}

impl Bulge {
    pub fn new(center: [f32; 2], radius: f32, strength: f32) -> Result<Self, ParameterError> {
        let filter = Self {
            center,
            radius,
            strength,
        };
        filter.validate()?;
        Ok(filter)
    }

    /// Source UV for output UV `(u, v)`.
    pub fn map(&self, u: f32, v: f32) -> (f32, f32) {
        let [cx, cy] = self.center;
        let (mut tx, mut ty) = (u - cx, v - cy);
        let dist = (tx * tx + ty * ty).sqrt();
        if dist < self.radius && dist > 0.0 {
            let percent = dist / self.radius;
            let scale = if self.strength > 0.0 {
                let t = soft_step(0.0, self.radius / dist, percent);
                lerp(1.0, t, self.strength * 0.75)
            } else {
                let t = percent.powf(1.0 + self.strength * 0.75) * self.radius / dist;
                lerp(1.0, t, 1.0 - percent)
            };
            tx *= scale;
            ty *= scale;
        }
        (tx + cx, ty + cy)
    }
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

impl FromParameters for Bulge {
    fn from_parameters(params: &Parameters) -> Result<Self, ParameterError> {
        Self::new(
            read_center(params)?,
            params.float_or("radius", 0.5)? as f32,
            params.float_or("strength", 0.0)? as f32,
        )
    }
}

impl Filter for Bulge {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder("bulge", "Bulge / Pinch")
            .description("Radially magnify or pinch a disc around a centre point")
            .category(Category::Warp)
            .tags(["fisheye", "pinch", "distort"])
            .parameter(center_parameter())
            .parameter(
                ParameterDefinition::new("radius", ValueType::Float, 0.5)
                    .with_description("Radius of the affected disc in UV units")
                    .with_range(0.0, 1.0),
            )
            .parameter(
                ParameterDefinition::new("strength", ValueType::Float, 0.0)
                    .with_description("Positive bulges, negative pinches; 0 disables")
                    .with_range(-1.0, 1.0),
            )
            .build()
    }

    fn parameters(&self) -> Parameters {
        Parameters::new()
            .with("center", vec![self.center[0] as f64, self.center[1] as f64])
            .with("radius", self.radius)
            .with("strength", self.strength)
    }

    fn is_neutral(&self) -> bool {
        self.strength == 0.0 || self.radius == 0.0
    }

    fn validate(&self) -> Result<(), ParameterError> {
        check_center(self.center)?;
        check_range("radius", self.radius as f64, 0.0, 1.0)?;
        check_range("strength", self.strength as f64, -1.0, 1.0)
    }

    fn process(&self, buffer: &mut PixelBuffer) {
        remap(buffer, |u, v| self.map(u, v));
    }

    fn programs(&self) -> Vec<GpuProgram> {
        vec![GpuProgram::new("bulge", shaders::BULGE)
            .with_uniform("uCenter", UniformValue::Vec2(self.center))
            .with_float("uRadius", self.radius)
            .with_float("uStrength", self.strength)]
    }

    fn clone_box(&self) -> Box<dyn Filter> {
        Box::new(self.clone())
    }
}

// ============================================================================
// Zoom blur
// ============================================================================

/// Dither offset in `[0, 1)` from a fragment coordinate.
fn dither(x: f32, y: f32, seed: f32) -> f32 {
    let d = (x + seed) * 12.9898 + (y + seed) * 78.233 + seed * 151.7182;
    let v = d.sin() * 43758.5453 + seed;
    v - v.floor()
}

/// Radial blur towards a centre point.
///
/// Each pixel averages 40 samples along the ray to the centre with weights
/// `4(p − p²)`, in premultiplied alpha, then un-premultiplies. Sample
/// positions are dithered per pixel to avoid banding; the dither values are
/// not guaranteed to match the GPU bit for bit.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoomBlur {
    center: [f32; 2],
    strength: f32,
}

impl ZoomBlur {
    pub fn new(center: [f32; 2], strength: f32) -> Result<Self, ParameterError> {
        let filter = Self { center, strength };
        filter.validate()?;
        Ok(filter)
    }
}

impl FromParameters for ZoomBlur {
    fn from_parameters(params: &Parameters) -> Result<Self, ParameterError> {
        Self::new(read_center(params)?, params.float_or("strength", 0.0)? as f32)
    }
}

impl Filter for ZoomBlur {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder("zoom_blur", "Zoom Blur")
            .description("Radial motion blur towards a centre point")
            .category(Category::Warp)
            .tags(["radial", "motion", "blur"])
            .parameter(center_parameter())
            .parameter(
                ParameterDefinition::new("strength", ValueType::Float, 0.0)
                    .with_description("Fraction of the distance to the centre covered by the ray; 0 disables")
                    .with_range(0.0, 1.0),
            )
            .build()
    }

    fn parameters(&self) -> Parameters {
        Parameters::new()
            .with("center", vec![self.center[0] as f64, self.center[1] as f64])
            .with("strength", self.strength)
    }

    fn is_neutral(&self) -> bool {
        self.strength == 0.0
    }

    fn validate(&self) -> Result<(), ParameterError> {
        check_center(self.center)?;
        check_range("strength", self.strength as f64, 0.0, 1.0)
    }

    fn process(&self, buffer: &mut PixelBuffer) {
        let [cx, cy] = self.center;
        let strength = self.strength;

        buffer.map_with_source(|src, x, y| {
            let (u, v) = src.uv_of(x, y);
            let (dx, dy) = (cx - u, cy - v);
            let offset = dither(x as f32 + 0.5, y as f32 + 0.5, 0.0);

            let mut acc = [0.0f32; 4];
            let mut total = 0.0f32;
            for t in 0..ZOOM_SAMPLES {
                let percent = (t as f32 + offset) / ZOOM_SAMPLES as f32;
                let weight = 4.0 * (percent - percent * percent);
                let tap = src.sample_uv(u + dx * percent * strength, v + dy * percent * strength);
                let a = tap[3] as f32 / 255.0;
                for c in 0..3 {
                    acc[c] += tap[c] as f32 / 255.0 * a * weight;
                }
                acc[3] += a * weight;
                total += weight;
            }

            if total <= 0.0 {
                return src.pixel(x, y);
            }
            let alpha = acc[3] / total;
            let unpremultiply = |c: f32| {
                if alpha > 0.0 {
                    to_channel((c / total) / alpha * 255.0)
                } else {
                    0
                }
            };
            [
                unpremultiply(acc[0]),
                unpremultiply(acc[1]),
                unpremultiply(acc[2]),
                to_channel(alpha * 255.0),
            ]
        });
    }

    fn programs(&self) -> Vec<GpuProgram> {
        vec![GpuProgram::new("zoom_blur", shaders::ZOOM_BLUR)
            .with_uniform("uCenter", UniformValue::Vec2(self.center))
            .with_float("uStrength", self.strength)]
    }

    fn clone_box(&self) -> Box<dyn Filter> {
        Box::new(self.clone())
    }
}

// ============================================================================
// Reflect
// ============================================================================

/// Mirror variant: which part of the image is the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReflectMode {
    /// Left half mirrored onto the right.
    LeftToRight,
    RightToLeft,
    TopToBottom,
    BottomToTop,
    /// Top-left quadrant mirrored into the other three.
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    /// Upper-left triangle mirrored through the centre.
    LeftDiagonal,
    /// Upper-right triangle transposed onto the lower-left.
    RightDiagonal,
}

impl ReflectMode {
    const ALL: [ReflectMode; 10] = [
        ReflectMode::LeftToRight,
        ReflectMode::RightToLeft,
        ReflectMode::TopToBottom,
        ReflectMode::BottomToTop,
        ReflectMode::TopLeft,
        ReflectMode::TopRight,
        ReflectMode::BottomLeft,
        ReflectMode::BottomRight,
        ReflectMode::LeftDiagonal,
        ReflectMode::RightDiagonal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReflectMode::LeftToRight => "left_to_right",
            ReflectMode::RightToLeft => "right_to_left",
            ReflectMode::TopToBottom => "top_to_bottom",
            ReflectMode::BottomToTop => "bottom_to_top",
            ReflectMode::TopLeft => "top_left",
            ReflectMode::TopRight => "top_right",
            ReflectMode::BottomLeft => "bottom_left",
            ReflectMode::BottomRight => "bottom_right",
            ReflectMode::LeftDiagonal => "left_diagonal",
            ReflectMode::RightDiagonal => "right_diagonal",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ParameterError> {
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == value)
            .ok_or_else(|| ParameterError::UnknownOption {
                name: "mode".to_string(),
                value: value.to_string(),
            })
    }

    /// Index used by the `uMode` uniform.
    fn index(&self) -> usize {
        Self::ALL.iter().position(|m| m == self).unwrap_or(0)
    }

    /// Source UV for output UV `(u, v)`.
    pub fn map(&self, u: f32, v: f32) -> (f32, f32) {
        let flip = |t: f32| 1.0 - t;
        let (mut mu, mut mv) = (u, v);
        match self {
            ReflectMode::LeftToRight => {
                if u > 0.5 {
                    mu = flip(u)
                }
            }
            ReflectMode::RightToLeft => {
                if u < 0.5 {
                    mu = flip(u)
                }
            }
            ReflectMode::TopToBottom => {
                if v > 0.5 {
                    mv = flip(v)
                }
            }
            ReflectMode::BottomToTop => {
                if v < 0.5 {
                    mv = flip(v)
                }
            }
            ReflectMode::TopLeft => {
                if u > 0.5 {
                    mu = flip(u)
                }
                if v > 0.5 {
                    mv = flip(v)
                }
            }
            ReflectMode::TopRight => {
                if u < 0.5 {
                    mu = flip(u)
                }
                if v > 0.5 {
                    mv = flip(v)
                }
            }
            ReflectMode::BottomLeft => {
                if u > 0.5 {
                    mu = flip(u)
                }
                if v < 0.5 {
                    mv = flip(v)
                }
            }
            ReflectMode::BottomRight => {
                if u < 0.5 {
                    mu = flip(u)
                }
                if v < 0.5 {
                    mv = flip(v)
                }
            }
            ReflectMode::LeftDiagonal => {
                if u + v > 1.0 {
                    mu = flip(u);
                    mv = flip(v);
                }
            }
            ReflectMode::RightDiagonal => {
                if u < v {
                    mu = v;
                    mv = u;
                }
            }
        }
        (mu, mv)
    }
}

/// Mirrors one part of the image onto the rest.
#[derive(Debug, Clone, PartialEq)]
pub struct Reflect {
    mode: ReflectMode,
    enabled: bool,
}

impl Reflect {
    pub fn new(mode: ReflectMode, enabled: bool) -> Self {
        Self { mode, enabled }
    }

    pub fn mode(&self) -> ReflectMode {
        self.mode
    }
}

impl FromParameters for Reflect {
    fn from_parameters(params: &Parameters) -> Result<Self, ParameterError> {
        Ok(Self::new(
            ReflectMode::parse(params.string_or("mode", "left_to_right")?)?,
            params.bool_or("enabled", true)?,
        ))
    }
}

impl Filter for Reflect {
    fn metadata(&self) -> FilterMetadata {
        let modes = ReflectMode::ALL.iter().map(|m| Value::from(m.as_str())).collect();
        FilterMetadata::builder("reflect", "Reflect")
            .description("Mirror one half, quadrant or triangle of the image onto the rest")
            .category(Category::Warp)
            .tags(["mirror", "symmetry", "kaleidoscope"])
            .parameter(
                ParameterDefinition::new("mode", ValueType::String, "left_to_right")
                    .with_description("Which region is the mirror source")
                    .with_constraint(Constraint::OneOf(modes)),
            )
            .parameter(
                ParameterDefinition::new("enabled", ValueType::Boolean, true)
                    .with_description("Whether the filter is applied"),
            )
            .build()
    }

    fn parameters(&self) -> Parameters {
        Parameters::new()
            .with("mode", self.mode.as_str())
            .with("enabled", self.enabled)
    }

    fn is_neutral(&self) -> bool {
        !self.enabled
    }

    fn process(&self, buffer: &mut PixelBuffer) {
        let mode = self.mode;
        remap(buffer, |u, v| mode.map(u, v));
    }

    fn programs(&self) -> Vec<GpuProgram> {
        vec![GpuProgram::new("reflect", shaders::REFLECT).with_float("uMode", self.mode.index() as f32)]
    }

    fn clone_box(&self) -> Box<dyn Filter> {
        Box::new(self.clone())
    }
}
