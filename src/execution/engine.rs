//! Render engine.
//!
//! The engine re-applies a whole chain to the base image on the preferred
//! backend, falling back to the CPU when the GPU is unavailable.

use crate::chain::FilterChain;
use crate::core::buffer::PixelBuffer;
use crate::core::error::PrismaError;
use crate::core::gpu::GpuError;
use crate::execution::cache::{CacheStats, DEFAULT_CAPACITY};
use crate::execution::cpu::CpuRenderer;
use crate::execution::gpu::GpuRenderer;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

/// Which renderer runs the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Per-pixel CPU algorithms.
    Cpu,
    /// WGSL programs on a wgpu device.
    Gpu,
    /// GPU when an adapter is available, CPU otherwise.
    #[default]
    Auto,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Backend::Cpu => "cpu",
            Backend::Gpu => "gpu",
            Backend::Auto => "auto",
        })
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cpu" => Ok(Backend::Cpu),
            "gpu" => Ok(Backend::Gpu),
            "auto" => Ok(Backend::Auto),
            other => Err(format!("unknown backend '{}'", other)),
        }
    }
}

/// Render options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderOptions {
    /// Preferred backend.
    pub backend: Backend,
    /// Whether a GPU failure falls back to the CPU renderer.
    pub fallback_to_cpu: bool,
    /// Whether neutral filters are skipped instead of run.
    pub skip_neutral: bool,
    /// Maximum number of compiled GPU programs kept alive.
    pub program_cache_capacity: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            backend: Backend::Auto,
            fallback_to_cpu: true,
            skip_neutral: true,
            program_cache_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl RenderOptions {
    /// Create a new options builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the preferred backend.
    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    /// Enable/disable CPU fallback.
    pub fn with_fallback(mut self, fallback: bool) -> Self {
        self.fallback_to_cpu = fallback;
        self
    }

    /// Enable/disable skipping neutral filters.
    pub fn with_skip_neutral(mut self, skip: bool) -> Self {
        self.skip_neutral = skip;
        self
    }

    /// Set the compiled-program cache size.
    pub fn with_program_cache_capacity(mut self, capacity: usize) -> Self {
        self.program_cache_capacity = capacity;
        self
    }
}

/// Render statistics.
#[derive(Debug, Clone, Default)]
pub struct RenderStats {
    /// Number of filters applied.
    pub filters_applied: usize,
    /// Number of neutral filters skipped.
    pub filters_skipped: usize,
    /// Number of passes run (GPU filters may take several).
    pub passes: usize,
    /// Total render time.
    pub duration: Duration,
    /// Backend that produced the output.
    pub backend_used: Option<Backend>,
}

/// GPU state, opened on first use.
enum GpuState {
    Untried,
    Ready(Box<GpuRenderer>),
    Unavailable,
}

/// The render engine.
pub struct RenderEngine {
    options: RenderOptions,
    cpu: CpuRenderer,
    gpu: GpuState,
}

impl RenderEngine {
    /// Create a new render engine. No device is opened until the first GPU
    /// render.
    pub fn new(options: RenderOptions) -> Self {
        Self {
            options,
            cpu: CpuRenderer::new(),
            gpu: GpuState::Untried,
        }
    }

    /// Create a CPU-only engine.
    pub fn cpu() -> Self {
        Self::new(RenderOptions::new().with_backend(Backend::Cpu))
    }

    /// Current options.
    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Whether a GPU device has been opened.
    pub fn gpu_ready(&self) -> bool {
        matches!(self.gpu, GpuState::Ready(_))
    }

    /// Compiled-program cache statistics, once a GPU device is open.
    pub fn gpu_cache_stats(&self) -> Option<CacheStats> {
        match &self.gpu {
            GpuState::Ready(renderer) => Some(renderer.cache_stats()),
            _ => None,
        }
    }

    /// Apply `chain` to `base`, returning a new buffer.
    ///
    /// With [`Backend::Auto`] a GPU failure always falls back to the CPU;
    /// with [`Backend::Gpu`] only when `fallback_to_cpu` is set.
    pub fn render(
        &mut self,
        chain: &FilterChain,
        base: &PixelBuffer,
    ) -> Result<(PixelBuffer, RenderStats), PrismaError> {
        let start = Instant::now();
        debug!(
            "Rendering {} entries over {}x{} ({} backend)",
            chain.len(),
            base.width(),
            base.height(),
            self.options.backend
        );

        let (output, mut stats) = match self.options.backend {
            Backend::Cpu => self.render_cpu(chain, base),
            Backend::Gpu | Backend::Auto => match self.render_gpu(chain, base) {
                Ok(result) => result,
                Err(e) if self.options.fallback_to_cpu || self.options.backend == Backend::Auto => {
                    warn!("GPU render failed ({}), falling back to CPU", e);
                    self.render_cpu(chain, base)
                }
                Err(e) => return Err(e.into()),
            },
        };

        stats.duration = start.elapsed();
        info!(
            "Rendered {} filters ({} skipped) on {} in {:?}",
            stats.filters_applied,
            stats.filters_skipped,
            stats.backend_used.unwrap_or_default(),
            stats.duration
        );
        Ok((output, stats))
    }

    fn render_cpu(&self, chain: &FilterChain, base: &PixelBuffer) -> (PixelBuffer, RenderStats) {
        let (output, counts) = self.cpu.render(chain, base, self.options.skip_neutral);
        let stats = RenderStats {
            filters_applied: counts.applied,
            filters_skipped: counts.skipped,
            passes: counts.applied,
            duration: Duration::ZERO,
            backend_used: Some(Backend::Cpu),
        };
        (output, stats)
    }

    fn render_gpu(
        &mut self,
        chain: &FilterChain,
        base: &PixelBuffer,
    ) -> Result<(PixelBuffer, RenderStats), GpuError> {
        let renderer = self.gpu_renderer()?;
        let (output, passes) = renderer.render(chain, base)?;
        let applied = chain.active().len();
        let stats = RenderStats {
            filters_applied: applied,
            filters_skipped: chain.len() - applied,
            passes,
            duration: Duration::ZERO,
            backend_used: Some(Backend::Gpu),
        };
        Ok((output, stats))
    }

    fn gpu_renderer(&mut self) -> Result<&mut GpuRenderer, GpuError> {
        if let GpuState::Untried = self.gpu {
            self.gpu = match GpuRenderer::with_cache_capacity(self.options.program_cache_capacity) {
                Ok(renderer) => GpuState::Ready(Box::new(renderer)),
                Err(e) => {
                    warn!("GPU unavailable: {}", e);
                    GpuState::Unavailable
                }
            };
        }
        match &mut self.gpu {
            GpuState::Ready(renderer) => Ok(renderer),
            _ => Err(GpuError::NoAdapter),
        }
    }
}

impl Default for RenderEngine {
    fn default() -> Self {
        Self::new(RenderOptions::default())
    }
}

impl fmt::Debug for RenderEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderEngine")
            .field("options", &self.options)
            .field("gpu_ready", &self.gpu_ready())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::builtin::{Brightness, Grayscale, Invert};

    #[test]
    fn test_options_builder() {
        let options = RenderOptions::new()
            .with_backend(Backend::Gpu)
            .with_fallback(false)
            .with_skip_neutral(false)
            .with_program_cache_capacity(8);
        assert_eq!(options.backend, Backend::Gpu);
        assert!(!options.fallback_to_cpu);
        assert!(!options.skip_neutral);
        assert_eq!(options.program_cache_capacity, 8);
    }

    #[test]
    fn test_backend_parse() {
        assert_eq!("GPU".parse::<Backend>().unwrap(), Backend::Gpu);
        assert_eq!(Backend::Cpu.to_string(), "cpu");
        assert!("metal".parse::<Backend>().is_err());
    }

    #[test]
    fn test_cpu_render_stats() {
        let chain = FilterChain::new()
            .with("off", Brightness::new(0.0).unwrap())
            .with("gray", Grayscale::default())
            .with("invert", Invert::new(true, false));
        let base = PixelBuffer::filled(4, 4, [255, 0, 0, 255]).unwrap();

        let mut engine = RenderEngine::cpu();
        let (output, stats) = engine.render(&chain, &base).unwrap();
        assert_eq!(output.pixel(0, 0), [179, 179, 179, 255]);
        assert_eq!(stats.filters_applied, 2);
        assert_eq!(stats.filters_skipped, 1);
        assert_eq!(stats.backend_used, Some(Backend::Cpu));
        assert!(!engine.gpu_ready());
    }

    #[test]
    fn test_auto_always_produces_output() {
        // Without an adapter the engine falls back to the CPU.
        let chain = FilterChain::new().with("invert", Invert::new(true, false));
        let base = PixelBuffer::filled(2, 2, [0, 0, 0, 255]).unwrap();
        let mut engine = RenderEngine::default();
        let (output, stats) = engine.render(&chain, &base).unwrap();
        assert!(stats.backend_used.is_some());
        assert!(output.max_abs_diff(&PixelBuffer::filled(2, 2, [255, 255, 255, 255]).unwrap()).unwrap() <= 1);
    }
}
