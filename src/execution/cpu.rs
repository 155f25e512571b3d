//! CPU rendering of a filter chain.

use crate::chain::FilterChain;
use crate::core::buffer::PixelBuffer;
use log::trace;

/// Counts from one chain application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassCounts {
    /// Filters that ran.
    pub applied: usize,
    /// Neutral filters that were skipped.
    pub skipped: usize,
}

/// Applies a chain with each filter's CPU algorithm.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuRenderer;

impl CpuRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Apply every entry of `chain` left to right to a copy of `base`.
    ///
    /// With `skip_neutral` set, neutral entries are not dispatched at all.
    /// Without it every entry goes through [`Filter::apply_cpu`](crate::core::filter::Filter::apply_cpu), which leaves
    /// the buffer untouched for neutral filters.
    pub fn render(
        &self,
        chain: &FilterChain,
        base: &PixelBuffer,
        skip_neutral: bool,
    ) -> (PixelBuffer, PassCounts) {
        let mut output = base.clone();
        let mut counts = PassCounts::default();

        for (name, filter) in chain.iter() {
            if skip_neutral && filter.is_neutral() {
                trace!("Skipping neutral entry '{}'", name);
                counts.skipped += 1;
                continue;
            }
            trace!("CPU pass '{}' ({})", name, filter.metadata().id);
            filter.apply_cpu(&mut output);
            counts.applied += 1;
        }

        (output, counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::builtin::{Brightness, Grayscale, Invert};

    #[test]
    fn test_render_leaves_base_untouched() {
        let base = PixelBuffer::filled(2, 2, [10, 20, 30, 255]).unwrap();
        let chain = FilterChain::new().with("invert", Invert::new(true, false));
        let (output, counts) = CpuRenderer::new().render(&chain, &base, true);

        assert_eq!(base.pixel(0, 0), [10, 20, 30, 255]);
        assert_eq!(output.pixel(1, 1), [245, 235, 225, 255]);
        assert_eq!(counts, PassCounts { applied: 1, skipped: 0 });
    }

    #[test]
    fn test_render_counts_neutral() {
        let base = PixelBuffer::filled(2, 2, [100, 100, 100, 255]).unwrap();
        let chain = FilterChain::new()
            .with("off", Brightness::new(0.0).unwrap())
            .with("mono_off", Grayscale::new(false))
            .with("gray", Grayscale::default());

        let (skipped, counts) = CpuRenderer::new().render(&chain, &base, true);
        assert_eq!(counts, PassCounts { applied: 1, skipped: 2 });

        let (forced, counts) = CpuRenderer::new().render(&chain, &base, false);
        assert_eq!(counts, PassCounts { applied: 3, skipped: 0 });
        assert_eq!(skipped, forced);
    }

    #[test]
    fn test_empty_chain_is_identity() {
        let base = PixelBuffer::from_fn(3, 3, |x, y| [x as u8 * 40, y as u8 * 40, 7, 255]).unwrap();
        let (output, counts) = CpuRenderer::new().render(&FilterChain::new(), &base, true);
        assert_eq!(output, base);
        assert_eq!(counts.applied, 0);
    }
}
