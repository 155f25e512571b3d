//! The `Filter` trait and filter metadata.
//!
//! A filter is one transform with two execution models: a sequential CPU pass
//! over a [`PixelBuffer`] and one or more WGSL fragment programs. Both halves
//! share the filter's identity, parameters and neutral-state predicate, so a
//! renderer can pick either backend without duplicating that logic.

use crate::core::buffer::PixelBuffer;
use crate::core::error::ParameterError;
use crate::core::gpu::GpuProgram;
use crate::core::params::Parameters;
use crate::core::port::ParameterDefinition;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category for organizing filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Smoothing and denoising
    Blur,
    /// Sharpening
    Sharpen,
    /// Edge detection
    Edge,
    /// Per-pixel colour transforms
    Color,
    /// Tonal adjustments (brightness, exposure, equalization)
    Adjust,
    /// Geometric warps
    Warp,
    /// Custom/user-defined
    Custom,
}

impl Category {
    /// Get the display name for this category.
    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Blur => "Blur",
            Category::Sharpen => "Sharpen",
            Category::Edge => "Edge",
            Category::Color => "Color",
            Category::Adjust => "Adjust",
            Category::Warp => "Warp",
            Category::Custom => "Custom",
        }
    }

    /// Get all categories in display order.
    pub fn all() -> &'static [Category] {
        &[
            Category::Adjust,
            Category::Color,
            Category::Blur,
            Category::Sharpen,
            Category::Edge,
            Category::Warp,
            Category::Custom,
        ]
    }
}

impl Default for Category {
    fn default() -> Self {
        Category::Custom
    }
}

/// Metadata describing a filter type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterMetadata {
    /// Unique identifier for this filter type (e.g., "gaussian_blur")
    pub id: String,
    /// Human-readable name (e.g., "Gaussian Blur")
    pub name: String,
    /// Category for organization
    pub category: Category,
    /// Detailed description
    pub description: String,
    /// Parameter definitions
    pub parameters: Vec<ParameterDefinition>,
    /// Searchable tags
    pub tags: Vec<String>,
    /// Number of GPU passes the filter issues
    pub gpu_passes: usize,
}

impl FilterMetadata {
    /// Create a new metadata builder.
    pub fn builder(id: impl Into<String>, name: impl Into<String>) -> FilterMetadataBuilder {
        FilterMetadataBuilder::new(id, name)
    }

    /// Get all parameter names.
    pub fn parameter_names(&self) -> Vec<&str> {
        self.parameters.iter().map(|p| p.name.as_str()).collect()
    }

    /// Find a parameter by name.
    pub fn get_parameter(&self, name: &str) -> Option<&ParameterDefinition> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Check a raw parameter map against the documented definitions.
    ///
    /// Unknown names are reported as errors so typos in settings files do
    /// not silently fall back to defaults.
    pub fn check(&self, params: &Parameters) -> Result<(), String> {
        for (name, value) in params.iter() {
            match self.get_parameter(name) {
                Some(def) => def.validate(value)?,
                None => {
                    return Err(format!(
                        "Filter '{}' has no parameter '{}' (expected one of: {})",
                        self.id,
                        name,
                        self.parameter_names().join(", ")
                    ))
                }
            }
        }
        Ok(())
    }
}

/// Builder for FilterMetadata.
pub struct FilterMetadataBuilder {
    id: String,
    name: String,
    category: Category,
    description: String,
    parameters: Vec<ParameterDefinition>,
    tags: Vec<String>,
    gpu_passes: usize,
}

impl FilterMetadataBuilder {
    /// Create a new builder with required fields.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: Category::Custom,
            description: String::new(),
            parameters: Vec::new(),
            tags: Vec::new(),
            gpu_passes: 1,
        }
    }

    /// Set the category.
    pub fn category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a parameter.
    pub fn parameter(mut self, param: ParameterDefinition) -> Self {
        self.parameters.push(param);
        self
    }

    /// Add multiple tags.
    pub fn tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags.extend(tags.into_iter().map(|t| t.into()));
        self
    }

    /// Set the number of GPU passes.
    pub fn gpu_passes(mut self, passes: usize) -> Self {
        self.gpu_passes = passes;
        self
    }

    /// Build the metadata.
    pub fn build(self) -> FilterMetadata {
        FilterMetadata {
            id: self.id,
            name: self.name,
            category: self.category,
            description: self.description,
            parameters: self.parameters,
            tags: self.tags,
            gpu_passes: self.gpu_passes,
        }
    }
}

/// The core trait for filters.
///
/// # Neutral state
///
/// When [`is_neutral`](Filter::is_neutral) returns true the filter is an
/// identity transform. Chains skip neutral filters, and
/// [`apply_cpu`](Filter::apply_cpu) returns without touching the buffer, so
/// a neutral filter leaves every byte unchanged.
///
/// # Backends
///
/// [`process`](Filter::process) is the CPU algorithm: it must read
/// neighbourhoods from a shadow copy (see [`PixelBuffer::map_with_source`])
/// and clamp both coordinates and channel values. [`programs`](Filter::programs)
/// returns the equivalent GPU passes in execution order.
pub trait Filter: Send + Sync + fmt::Debug {
    /// Get the metadata for this filter type.
    fn metadata(&self) -> FilterMetadata;

    /// The current parameter values, keyed as in the metadata.
    fn parameters(&self) -> Parameters;

    /// Whether the current parameters make this filter a no-op.
    fn is_neutral(&self) -> bool;

    /// Check numeric well-formedness of the current parameters.
    fn validate(&self) -> Result<(), ParameterError> {
        Ok(())
    }

    /// Run the CPU algorithm unconditionally.
    fn process(&self, buffer: &mut PixelBuffer);

    /// Apply on the CPU, skipping neutral configurations.
    fn apply_cpu(&self, buffer: &mut PixelBuffer) {
        if self.is_neutral() {
            return;
        }
        self.process(buffer);
    }

    /// GPU passes equivalent to [`process`](Filter::process).
    fn programs(&self) -> Vec<GpuProgram>;

    /// Clone this filter into a boxed trait object.
    fn clone_box(&self) -> Box<dyn Filter>;
}

// Allow cloning Box<dyn Filter>
impl Clone for Box<dyn Filter> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Construct a filter from a loosely typed parameter map.
///
/// Absent parameters take their documented defaults. Implementations
/// validate before returning.
pub trait FromParameters: Sized {
    /// Build and validate.
    fn from_parameters(params: &Parameters) -> Result<Self, ParameterError>;
}

/// Whether two filters are the same type with the same parameters.
pub fn same_filter(a: &dyn Filter, b: &dyn Filter) -> bool {
    a.metadata().id == b.metadata().id && a.parameters() == b.parameters()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::params::ValueType;

    #[test]
    fn test_metadata_builder() {
        let metadata = FilterMetadata::builder("test_filter", "Test Filter")
            .category(Category::Color)
            .description("A test filter")
            .parameter(ParameterDefinition::new("amount", ValueType::Float, 0.0).with_range(-1.0, 1.0))
            .tags(["test", "debug"])
            .build();

        assert_eq!(metadata.id, "test_filter");
        assert_eq!(metadata.category, Category::Color);
        assert_eq!(metadata.parameter_names(), vec!["amount"]);
        assert_eq!(metadata.tags.len(), 2);
        assert_eq!(metadata.gpu_passes, 1);
    }

    #[test]
    fn test_metadata_check() {
        let metadata = FilterMetadata::builder("test_filter", "Test Filter")
            .parameter(ParameterDefinition::new("amount", ValueType::Float, 0.0).with_range(-1.0, 1.0))
            .build();

        assert!(metadata.check(&Parameters::new().with("amount", 0.5)).is_ok());
        assert!(metadata.check(&Parameters::new().with("amount", 3.0)).is_err());
        assert!(metadata.check(&Parameters::new().with("amuont", 0.5)).is_err());
    }

    #[test]
    fn test_category_display() {
        assert_eq!(Category::Blur.display_name(), "Blur");
        assert_eq!(Category::Warp.display_name(), "Warp");
        assert_eq!(Category::all().len(), 7);
    }
}
