//! Luma histogram equalization through a 256-entry CDF lookup table.

use crate::core::buffer::{to_channel, PixelBuffer};
use crate::core::error::{check_range, ParameterError};
use crate::core::filter::{Category, Filter, FilterMetadata, FromParameters};
use crate::core::gpu::GpuProgram;
use crate::core::params::{Parameters, ValueType};
use crate::core::port::ParameterDefinition;
use crate::core::shaders;
use crate::filters::builtin::color::luma;
use crate::filters::registry::FilterRegistry;

/// Number of luma levels in an equalization table.
pub const LEVELS: usize = 256;

/// Register histogram filters.
pub fn register(registry: &mut FilterRegistry) {
    registry.register::<HistogramEqualization>();
}

/// Build the equalization table for an image.
///
/// Luma is binned at 256 levels; each level maps to its running count,
/// rescaled so the first occupied level lands on 0 and the last on 255.
/// A single-level image yields the identity table.
pub fn equalization_table(buffer: &PixelBuffer) -> Vec<u8> {
    let mut histogram = [0u64; LEVELS];
    for px in buffer.data().chunks_exact(4) {
        let level = to_channel(luma([px[0], px[1], px[2], px[3]])) as usize;
        histogram[level] += 1;
    }

    let mut cdf = [0u64; LEVELS];
    let mut running = 0;
    for (slot, count) in cdf.iter_mut().zip(histogram) {
        running += count;
        *slot = running;
    }

    let total = running;
    let cdf_min = cdf.iter().copied().find(|&c| c > 0).unwrap_or(0);
    if total <= cdf_min {
        return (0..LEVELS).map(|i| i as u8).collect();
    }

    let span = (total - cdf_min) as f64;
    cdf.iter()
        .map(|&c| {
            let v = c.saturating_sub(cdf_min) as f64 / span * 255.0;
            v.round().clamp(0.0, 255.0) as u8
        })
        .collect()
}

/// Replaces luma with a table lookup, keeping the chroma of each pixel.
///
/// RGB is converted to YCrCb, `Y` is remapped through the table, and the
/// result is converted back. Without a table (or with the identity table)
/// the filter is neutral.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramEqualization {
    table: Option<Vec<f32>>,
}

impl HistogramEqualization {
    /// Equalize with an explicit table of 256 output levels.
    pub fn new(table: Vec<f32>) -> Result<Self, ParameterError> {
        let filter = Self { table: Some(table) };
        filter.validate()?;
        Ok(filter)
    }

    /// Equalize with the table computed from `buffer`.
    pub fn from_image(buffer: &PixelBuffer) -> Self {
        Self {
            table: Some(equalization_table(buffer).into_iter().map(f32::from).collect()),
        }
    }

    /// A filter with no table.
    pub fn disabled() -> Self {
        Self { table: None }
    }

    pub fn table(&self) -> Option<&[f32]> {
        self.table.as_deref()
    }

    fn lookup(table: &[f32], px: [u8; 4]) -> [u8; 4] {
        let r = px[0] as f32 / 255.0;
        let b = px[2] as f32 / 255.0;
        let y = luma(px) / 255.0;
        let cr = (r - y) * 0.713;
        let cb = (b - y) * 0.564;

        let index = (y * 255.0).round().clamp(0.0, 255.0) as usize;
        let eq = table[index] / 255.0;

        [
            to_channel((eq + 1.402 * cr) * 255.0),
            to_channel((eq - 0.714 * cr - 0.344 * cb) * 255.0),
            to_channel((eq + 1.772 * cb) * 255.0),
            px[3],
        ]
    }
}

impl FromParameters for HistogramEqualization {
    fn from_parameters(params: &Parameters) -> Result<Self, ParameterError> {
        match params.float_array("table")? {
            None => Ok(Self::disabled()),
            Some(values) if values.is_empty() => Ok(Self::disabled()),
            Some(values) => Self::new(values.into_iter().map(|v| v as f32).collect()),
        }
    }
}

impl Filter for HistogramEqualization {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder("histogram_equalization", "Histogram Equalization")
            .description("Remap luma through a 256-entry cumulative distribution table")
            .category(Category::Adjust)
            .tags(["equalize", "cdf", "auto-levels"])
            .parameter(
                ParameterDefinition::new("table", ValueType::Array, Vec::<f64>::new())
                    .with_description("256 output levels indexed by input luma; empty disables"),
            )
            .build()
    }

    fn parameters(&self) -> Parameters {
        let table: Vec<f64> = self
            .table
            .iter()
            .flatten()
            .map(|&v| v as f64)
            .collect();
        Parameters::new().with("table", table)
    }

    fn is_neutral(&self) -> bool {
        match &self.table {
            None => true,
            Some(table) => table.iter().enumerate().all(|(i, &v)| v == i as f32),
        }
    }

    fn validate(&self) -> Result<(), ParameterError> {
        let Some(table) = &self.table else {
            return Ok(());
        };
        if table.len() != LEVELS {
            return Err(ParameterError::TableLength {
                name: "table".to_string(),
                expected: LEVELS,
                got: table.len(),
            });
        }
        for &v in table {
            check_range("table", v as f64, 0.0, 255.0)?;
        }
        Ok(())
    }

    fn process(&self, buffer: &mut PixelBuffer) {
        if let Some(table) = &self.table {
            buffer.map_pixels(|px| Self::lookup(table, px));
        }
    }

    fn programs(&self) -> Vec<GpuProgram> {
        let table = self
            .table
            .clone()
            .unwrap_or_else(|| (0..LEVELS).map(|i| i as f32).collect());
        vec![GpuProgram::new("histogram_equalization", shaders::HISTOGRAM_EQUALIZE)
            .with_table("uCdf", table)]
    }

    fn clone_box(&self) -> Box<dyn Filter> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_image_gives_identity_table() {
        let buffer = PixelBuffer::filled(4, 4, [90, 90, 90, 255]).unwrap();
        let table = equalization_table(&buffer);
        assert_eq!(table.len(), LEVELS);
        assert!(table.iter().enumerate().all(|(i, &v)| v as usize == i));
        assert!(HistogramEqualization::from_image(&buffer).is_neutral());
    }

    #[test]
    fn test_two_level_image_stretches() {
        let buffer =
            PixelBuffer::from_fn(2, 1, |x, _| if x == 0 { [100, 100, 100, 255] } else { [110, 110, 110, 255] })
                .unwrap();
        let table = equalization_table(&buffer);
        assert_eq!(table[100], 0);
        assert_eq!(table[110], 255);
        assert!(table.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_equalization_stretches_grey_pixels() {
        let mut buffer =
            PixelBuffer::from_fn(2, 1, |x, _| if x == 0 { [100, 100, 100, 255] } else { [110, 110, 110, 255] })
                .unwrap();
        HistogramEqualization::from_image(&buffer).apply_cpu(&mut buffer);
        assert_eq!(buffer.pixel(0, 0), [0, 0, 0, 255]);
        assert_eq!(buffer.pixel(1, 0), [255, 255, 255, 255]);
    }

    #[test]
    fn test_table_length_checked() {
        let err = HistogramEqualization::new(vec![0.0; 10]).unwrap_err();
        assert_eq!(
            err,
            ParameterError::TableLength {
                name: "table".to_string(),
                expected: 256,
                got: 10
            }
        );
        let params = Parameters::new().with("table", vec![1.0; 3]);
        assert!(HistogramEqualization::from_parameters(&params).is_err());
    }

    #[test]
    fn test_table_values_range_checked() {
        let mut table: Vec<f32> = (0..256).map(|v| v as f32).collect();
        table[7] = 300.0;
        assert!(matches!(
            HistogramEqualization::new(table.clone()),
            Err(ParameterError::OutOfRange { ref name, .. }) if name == "table"
        ));
        table[7] = f32::NAN;
        assert!(matches!(
            HistogramEqualization::new(table),
            Err(ParameterError::NotFinite { .. })
        ));
    }

    #[test]
    fn test_missing_table_is_neutral() {
        let filter = HistogramEqualization::from_parameters(&Parameters::new()).unwrap();
        assert!(filter.is_neutral());
        assert_eq!(filter.programs()[0].table().unwrap().values.len(), LEVELS);
    }
}
