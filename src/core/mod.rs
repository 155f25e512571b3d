//! Core types and traits for the Prisma filter engine.
//!
//! This module contains the foundational pieces every filter is built from:
//! - Pixel buffers and float planes
//! - Kernel math and coordinate clamping
//! - Parameter values, definitions and constraints
//! - The `Filter` trait and its metadata
//! - GPU program descriptions and WGSL sources
//! - Error types

pub mod buffer;
pub mod error;
pub mod filter;
pub mod gpu;
pub mod kernel;
pub mod params;
pub mod plane;
pub mod port;
pub mod shaders;

// Re-export commonly used types
pub use buffer::PixelBuffer;
pub use error::{BufferError, ParameterError, PrismaError, SettingsError, ValidationReport};
pub use filter::{Category, Filter, FilterMetadata, FromParameters};
pub use gpu::{GpuError, GpuProgram, UniformValue};
pub use kernel::{ChannelScope, Kernel};
pub use params::{Parameters, Value, ValueType};
pub use plane::FloatImage;
pub use port::{Constraint, ParameterDefinition};
