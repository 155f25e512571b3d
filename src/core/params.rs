//! Parameter values supplied to filters.
//!
//! Parameters arrive from the calling layer as a map of names to loosely
//! typed values (a settings file, a UI panel, CLI flags). Filters pull typed
//! values out of a [`Parameters`] map when they are constructed, falling back
//! to their documented defaults for anything absent.

use crate::core::error::ParameterError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single parameter value.
///
/// Untagged so settings documents can write plain literals:
/// `{ "sigma": 1.5, "enabled": true, "mode": "warm" }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    /// Boolean toggle
    Boolean(bool),
    /// Whole number (kernel sizes)
    Integer(i64),
    /// Floating point number
    Float(f64),
    /// Named option
    String(String),
    /// Homogeneous list (centres, lookup tables)
    Array(Vec<Value>),
}

/// Type tag for a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Boolean,
    Integer,
    Float,
    String,
    Array,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Boolean => "boolean",
            ValueType::Integer => "integer",
            ValueType::Float => "float",
            ValueType::String => "string",
            ValueType::Array => "array",
        };
        f.write_str(name)
    }
}

impl Value {
    /// Get the type tag of this value.
    pub fn get_type(&self) -> ValueType {
        match self {
            Value::Boolean(_) => ValueType::Boolean,
            Value::Integer(_) => ValueType::Integer,
            Value::Float(_) => ValueType::Float,
            Value::String(_) => ValueType::String,
            Value::Array(_) => ValueType::Array,
        }
    }

    /// Try to get this value as a float. Integers widen.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get this value as an integer. Floats with no fractional part narrow.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            _ => None,
        }
    }

    /// Try to get this value as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        if let Value::Boolean(b) = self {
            Some(*b)
        } else {
            None
        }
    }

    /// Try to get this value as a string reference.
    pub fn as_string(&self) -> Option<&str> {
        if let Value::String(s) = self {
            Some(s)
        } else {
            None
        }
    }

    /// Try to get this value as a list of floats.
    pub fn as_float_array(&self) -> Option<Vec<f64>> {
        if let Value::Array(items) = self {
            items.iter().map(Value::as_float).collect()
        } else {
            None
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Array(items) => write!(f, "[{} items]", items.len()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::Array(v.into_iter().map(Value::Float).collect())
    }
}

/// Ordered map of parameter names to values for one filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters {
    values: IndexMap<String, Value>,
}

impl Parameters {
    /// Create an empty parameter map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Insert or overwrite a value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    /// Raw lookup.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Whether `name` is present.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn mismatch(&self, name: &str, expected: ValueType) -> ParameterError {
        ParameterError::TypeMismatch {
            name: name.to_string(),
            expected: expected.to_string(),
            got: self
                .values
                .get(name)
                .map(|v| v.get_type().to_string())
                .unwrap_or_else(|| "nothing".to_string()),
        }
    }

    /// Get a float, or `default` when absent.
    pub fn float_or(&self, name: &str, default: f64) -> Result<f64, ParameterError> {
        match self.values.get(name) {
            None => Ok(default),
            Some(v) => v.as_float().ok_or_else(|| self.mismatch(name, ValueType::Float)),
        }
    }

    /// Get an integer, or `default` when absent.
    pub fn integer_or(&self, name: &str, default: i64) -> Result<i64, ParameterError> {
        match self.values.get(name) {
            None => Ok(default),
            Some(v) => v
                .as_integer()
                .ok_or_else(|| self.mismatch(name, ValueType::Integer)),
        }
    }

    /// Get a kernel size, or `default` when absent. Negative sizes are rejected.
    pub fn size_or(&self, name: &str, default: u32) -> Result<u32, ParameterError> {
        let size = self.integer_or(name, default as i64)?;
        u32::try_from(size).map_err(|_| ParameterError::OutOfRange {
            name: name.to_string(),
            value: size as f64,
            min: 0.0,
            max: u32::MAX as f64,
        })
    }

    /// Get a boolean, or `default` when absent.
    pub fn bool_or(&self, name: &str, default: bool) -> Result<bool, ParameterError> {
        match self.values.get(name) {
            None => Ok(default),
            Some(v) => v.as_bool().ok_or_else(|| self.mismatch(name, ValueType::Boolean)),
        }
    }

    /// Get a string, or `default` when absent.
    pub fn string_or<'a>(&'a self, name: &str, default: &'a str) -> Result<&'a str, ParameterError> {
        match self.values.get(name) {
            None => Ok(default),
            Some(v) => v
                .as_string()
                .ok_or_else(|| self.mismatch(name, ValueType::String)),
        }
    }

    /// Get a 2-component point, or `default` when absent.
    pub fn point_or(&self, name: &str, default: [f64; 2]) -> Result<[f64; 2], ParameterError> {
        match self.values.get(name) {
            None => Ok(default),
            Some(v) => match v.as_float_array().as_deref() {
                Some([x, y]) => Ok([*x, *y]),
                _ => Err(self.mismatch(name, ValueType::Array)),
            },
        }
    }

    /// Get a float list if present.
    pub fn float_array(&self, name: &str) -> Result<Option<Vec<f64>>, ParameterError> {
        match self.values.get(name) {
            None => Ok(None),
            Some(v) => v
                .as_float_array()
                .map(Some)
                .ok_or_else(|| self.mismatch(name, ValueType::Array)),
        }
    }
}

impl FromIterator<(String, Value)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_absent() {
        let params = Parameters::new();
        assert_eq!(params.float_or("sigma", 1.5).unwrap(), 1.5);
        assert!(params.bool_or("enabled", true).unwrap());
        assert_eq!(params.point_or("center", [0.5, 0.5]).unwrap(), [0.5, 0.5]);
    }

    #[test]
    fn test_type_mismatch() {
        let params = Parameters::new().with("sigma", "wide");
        let err = params.float_or("sigma", 1.0).unwrap_err();
        assert!(matches!(err, ParameterError::TypeMismatch { .. }));
    }

    #[test]
    fn test_integer_widening_and_narrowing() {
        let params = Parameters::new().with("size", 5.0).with("sigma", 2i64);
        assert_eq!(params.integer_or("size", 3).unwrap(), 5);
        assert_eq!(params.float_or("sigma", 0.0).unwrap(), 2.0);
        assert!(Parameters::new().with("size", 5.5).integer_or("size", 3).is_err());
        assert!(Parameters::new().with("size", -1i64).size_or("size", 3).is_err());
    }

    #[test]
    fn test_untagged_json() {
        let params: Parameters =
            serde_json::from_str(r#"{"sigma": 1.5, "size": 5, "dark": true, "center": [0.25, 0.75]}"#)
                .unwrap();
        assert_eq!(params.float_or("sigma", 0.0).unwrap(), 1.5);
        assert_eq!(params.get("size"), Some(&Value::Integer(5)));
        assert!(params.bool_or("dark", false).unwrap());
        assert_eq!(params.point_or("center", [0.0, 0.0]).unwrap(), [0.25, 0.75]);
    }
}
