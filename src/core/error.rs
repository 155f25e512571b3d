//! Error types for Prisma.
//!
//! Uses thiserror for structured errors with context. Filter application
//! itself never fails: pixel passes clamp coordinates and channel values.
//! The errors here cover everything around it:
//! - malformed parameters rejected when a filter is constructed
//! - pixel buffers whose byte length does not match their dimensions
//! - GPU device and readback failures
//! - settings files that cannot be parsed

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type for Prisma.
///
/// This enum encompasses all error categories and enables automatic
/// conversion between specific error types.
#[derive(Error, Debug)]
pub enum PrismaError {
    #[error("Parameter error: {0}")]
    Parameter(#[from] ParameterError),

    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),

    #[error("GPU error: {0}")]
    Gpu(#[from] crate::core::gpu::GpuError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("{0}")]
    Other(String),
}

/// Numeric well-formedness failures for filter parameters.
///
/// Only well-formedness is checked here (finite values inside the documented
/// range). Whether a value is perceptually meaningful is the caller's call.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterError {
    #[error("Parameter '{name}' must be finite, got {value}")]
    NotFinite { name: String, value: f64 },

    #[error("Parameter '{name}' = {value} is out of range [{min}, {max}]")]
    OutOfRange {
        name: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Unsupported kernel size {size}: supported sizes are {min}..={max} (odd)")]
    InvalidKernelSize { size: u32, min: u32, max: u32 },

    #[error("Low threshold {low} must not exceed high threshold {high}")]
    InvalidThresholds { low: f64, high: f64 },

    #[error("Lookup table '{name}' must have {expected} entries, got {got}")]
    TableLength {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("Parameter '{name}' expected {expected}, got {got}")]
    TypeMismatch {
        name: String,
        expected: String,
        got: String,
    },

    #[error("Parameter '{name}' has unknown option '{value}'")]
    UnknownOption { name: String, value: String },

    #[error("Unknown filter '{0}'")]
    UnknownFilter(String),
}

/// Errors constructing or combining pixel buffers.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BufferError {
    #[error("Buffer of {width}x{height} needs {expected} bytes, got {got}")]
    LengthMismatch {
        width: u32,
        height: u32,
        expected: usize,
        got: usize,
    },

    #[error("Image dimensions must be non-zero, got {width}x{height}")]
    EmptyImage { width: u32, height: u32 },

    #[error("Dimension mismatch: expected {expected_width}x{expected_height}, got {width}x{height}")]
    DimensionMismatch {
        expected_width: u32,
        expected_height: u32,
        width: u32,
        height: u32,
    },
}

/// Errors loading a filter settings document.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Invalid JSON settings: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid TOML settings: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Could not write TOML settings: {0}")]
    TomlWrite(#[from] toml::ser::Error),

    #[error("Unsupported settings file extension '{0}' (expected .json or .toml)")]
    UnsupportedFormat(String),

    #[error("Settings entry '{entry}': {error}")]
    Entry { entry: String, error: ParameterError },

    #[error("Could not read settings: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Error Utilities
// ============================================================================

impl ParameterError {
    /// Name of the offending parameter, if the error is tied to one.
    pub fn parameter(&self) -> Option<&str> {
        match self {
            ParameterError::NotFinite { name, .. }
            | ParameterError::OutOfRange { name, .. }
            | ParameterError::TableLength { name, .. }
            | ParameterError::TypeMismatch { name, .. }
            | ParameterError::UnknownOption { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Get suggestion for fixing this error.
    pub fn suggested_fix(&self) -> Option<String> {
        match self {
            ParameterError::OutOfRange { name, min, max, .. } => {
                Some(format!("Set '{}' to a value between {} and {}", name, min, max))
            }
            ParameterError::InvalidKernelSize { min, max, .. } => {
                Some(format!("Use an odd kernel size between {} and {}", min, max))
            }
            ParameterError::InvalidThresholds { .. } => {
                Some("Lower the low threshold below the high threshold".to_string())
            }
            ParameterError::UnknownFilter(_) => {
                Some("Run 'prisma list' to see available filters".to_string())
            }
            _ => None,
        }
    }
}

/// Check that `value` is finite and inside `[min, max]`.
pub fn check_range(name: &str, value: f64, min: f64, max: f64) -> Result<(), ParameterError> {
    if !value.is_finite() {
        return Err(ParameterError::NotFinite {
            name: name.to_string(),
            value,
        });
    }
    if value < min || value > max {
        return Err(ParameterError::OutOfRange {
            name: name.to_string(),
            value,
            min,
            max,
        });
    }
    Ok(())
}

/// Result type alias for Prisma operations.
pub type PrismaResult<T> = Result<T, PrismaError>;

/// Result type alias for parameter checks.
pub type ParameterResult<T> = Result<T, ParameterError>;

// ============================================================================
// Validation Report
// ============================================================================

/// Report produced by validating every entry of a filter chain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Whether validation passed without errors.
    pub success: bool,
    /// Errors keyed by the chain entry that produced them.
    pub errors: Vec<(String, ParameterError)>,
    /// Non-fatal observations (for example, filters that are currently neutral).
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// Create a new empty report (success).
    pub fn new() -> Self {
        Self {
            success: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Add an error to the report.
    pub fn add_error(&mut self, entry: impl Into<String>, error: ParameterError) {
        self.success = false;
        self.errors.push((entry.into(), error));
    }

    /// Add a warning to the report.
    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Check if the chain can be rendered.
    pub fn can_render(&self) -> bool {
        self.success
    }

    /// Get a human-readable summary.
    pub fn summary(&self) -> String {
        if self.success {
            if self.warnings.is_empty() {
                "✓ Chain is valid".to_string()
            } else {
                format!("✓ Chain is valid with {} warning(s)", self.warnings.len())
            }
        } else {
            format!("✗ Validation failed with {} error(s)", self.errors.len())
        }
    }

    /// Get detailed error messages with suggestions.
    pub fn detailed_errors(&self) -> Vec<String> {
        self.errors
            .iter()
            .enumerate()
            .map(|(i, (entry, error))| {
                let mut msg = format!("{}. [{}] {}", i + 1, entry, error);
                if let Some(fix) = error.suggested_fix() {
                    msg.push_str(&format!("\n   → Suggestion: {}", fix));
                }
                msg
            })
            .collect()
    }
}
