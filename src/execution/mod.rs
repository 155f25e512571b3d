//! Renderer adapter.
//!
//! Applies a [`FilterChain`](crate::chain::FilterChain) to a base image on
//! the CPU or through wgpu.

pub mod cache;
pub mod cpu;
pub mod engine;
pub mod gpu;

pub use cache::{CacheStats, ProgramCache};
pub use cpu::{CpuRenderer, PassCounts};
pub use engine::{Backend, RenderEngine, RenderOptions, RenderStats};
pub use gpu::GpuRenderer;
