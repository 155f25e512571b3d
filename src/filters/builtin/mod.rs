//! Built-in filter implementations.
//!
//! This module contains the standard filters that ship with Prisma.

pub mod adjust;
pub mod blur;
pub mod color;
pub mod edge;
pub mod histogram;
pub mod sharpen;
pub mod warp;

use crate::filters::registry::FilterRegistry;

/// Register all built-in filters.
pub fn register_all(registry: &mut FilterRegistry) {
    adjust::register(registry);
    color::register(registry);
    blur::register(registry);
    sharpen::register(registry);
    edge::register(registry);
    histogram::register(registry);
    warp::register(registry);
}

// Re-export for direct access
pub use adjust::{Brightness, Contrast, Exposure, Saturation, Vignette};
pub use blur::{BilateralFilter, GaussianBlur, MedianFilter};
pub use color::{ChannelStep, ColorTone, Grayscale, Invert, Sepia, Threshold, Tone, ToneCurve};
pub use edge::{CannyEdge, DirectionalEdge, EdgeDirection, SobelEdge};
pub use histogram::{equalization_table, HistogramEqualization};
pub use sharpen::Sharpen;
pub use warp::{Bulge, Reflect, ReflectMode, Swirl, ZoomBlur};
