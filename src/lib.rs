//! # Prisma - Dual-backend Image Filters
//!
//! Prisma is an image filter engine. Every filter carries two equivalent
//! implementations: a per-pixel CPU algorithm over an RGBA8 buffer and a WGSL
//! fragment program for the GPU. Filters are composed through an ordered,
//! named [`FilterChain`](chain::FilterChain) and re-applied to a base image
//! whenever a parameter changes.
//!
//! ## Features
//!
//! - **Filter library**: convolution blurs, sharpening, median, bilateral,
//!   Canny/Sobel edges, colour curves, warps and histogram equalisation
//! - **Two backends**: CPU reference algorithms and wgpu render passes
//! - **Ordered chains**: updates keep their position, removals keep the order
//! - **Neutral skipping**: filters whose parameters make them an identity are
//!   never run
//! - **Settings files**: chains described in JSON or TOML
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use prisma::prelude::*;
//!
//! let registry = FilterRegistry::with_builtins();
//! let mut chain = FilterChain::new();
//!
//! let blur = registry.create("gaussian_blur", &Parameters::new().with("sigma", 2.0))?;
//! let keep = !blur.is_neutral();
//! chain.update_or_insert("blur", blur, keep);
//!
//! let image = PixelBuffer::from(image::open("input.png")?.to_rgba8());
//! let mut engine = RenderEngine::new(RenderOptions::default());
//! let (output, stats) = engine.render(&chain, &image)?;
//! ```
//!
//! ## Architecture
//!
//! - [`core`]: pixel buffers, kernels, parameters, the `Filter` trait, GPU programs, errors
//! - [`filters`]: filter registry and built-in filters
//! - [`chain`]: the ordered filter chain and settings documents
//! - [`execution`]: CPU and GPU renderers behind a render engine
//!
//! ## Creating Custom Filters
//!
//! Implement [`Filter`](core::filter::Filter) and
//! [`FromParameters`](core::filter::FromParameters), then register the type:
//!
//! ```rust,ignore
//! #[derive(Debug, Clone)]
//! struct Posterize { levels: u8 }
//!
//! impl Filter for Posterize {
//!     fn metadata(&self) -> FilterMetadata { Self::describe() }
//!     fn parameters(&self) -> Parameters { Parameters::new().with("levels", self.levels as i64) }
//!     fn is_neutral(&self) -> bool { self.levels == 0 }
//!     fn process(&self, buffer: &mut PixelBuffer) { /* ... */ }
//!     fn programs(&self) -> Vec<GpuProgram> { vec![GpuProgram::new("posterize", BODY)] }
//!     fn clone_box(&self) -> Box<dyn Filter> { Box::new(self.clone()) }
//! }
//! ```

#![warn(clippy::all)]

pub mod chain;
pub mod core;
pub mod execution;
pub mod filters;

/// Prelude module for convenient imports.
///
/// Import everything commonly needed with:
/// ```rust,ignore
/// use prisma::prelude::*;
/// ```
pub mod prelude {
    // Buffers and kernels
    pub use crate::core::buffer::PixelBuffer;
    pub use crate::core::kernel::{gaussian_kernel, ChannelScope, Kernel};
    pub use crate::core::plane::FloatImage;

    // Filter traits and metadata
    pub use crate::core::filter::{Category, Filter, FilterMetadata, FromParameters};
    pub use crate::core::params::{Parameters, Value, ValueType};
    pub use crate::core::port::{Constraint, ParameterDefinition};
    pub use crate::core::gpu::{GpuProgram, UniformValue};

    // Errors
    pub use crate::core::error::{
        BufferError, ParameterError, PrismaError, PrismaResult, SettingsError, ValidationReport,
    };
    pub use crate::core::gpu::GpuError;

    // Chain
    pub use crate::chain::{ChainChange, FilterChain, FilterSettings, SettingsEntry};

    // Execution
    pub use crate::execution::{
        Backend, CacheStats, CpuRenderer, GpuRenderer, RenderEngine, RenderOptions, RenderStats,
    };

    // Filters
    pub use crate::filters::registry::{FilterFactory, FilterRegistry};
    pub use crate::filters::builtin::*;
}

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
        assert_eq!(super::NAME, "prisma");
    }

    #[test]
    fn test_registry_with_builtins() {
        let registry = FilterRegistry::with_builtins();
        for id in ["gaussian_blur", "sharpen", "median", "canny", "bilateral", "histogram_equalization", "swirl"] {
            assert!(registry.contains(id), "missing {}", id);
        }
    }

    #[test]
    fn test_chain_from_registry() {
        let registry = FilterRegistry::with_builtins();
        let mut chain = FilterChain::new();
        let blur = registry
            .create("gaussian_blur", &Parameters::new().with("sigma", 2.0))
            .unwrap();
        let keep = !blur.is_neutral();
        assert_eq!(chain.update_or_insert("blur", blur, keep), ChainChange::Inserted);

        let image = PixelBuffer::filled(8, 8, [90, 120, 150, 255]).unwrap();
        let (output, stats) = RenderEngine::cpu().render(&chain, &image).unwrap();
        assert_eq!(stats.filters_applied, 1);
        assert!(output.max_abs_diff(&image).unwrap() <= 1);
    }
}
