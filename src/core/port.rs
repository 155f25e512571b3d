//! Parameter definitions and constraints.
//!
//! Every filter documents its parameters: name, type, default and the numeric
//! range a value must fall in. The definitions drive `prisma info` output and
//! let [`ParameterDefinition::validate`] reject malformed values before a
//! filter is built.

use crate::core::params::{Value, ValueType};
use serde::{Deserialize, Serialize};

/// Definition of a filter parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterDefinition {
    /// Unique name within the filter
    pub name: String,
    /// Human-readable name
    pub display_name: String,
    /// Type of the parameter
    pub value_type: ValueType,
    /// Default value (the neutral setting for most filters)
    pub default_value: Value,
    /// Description for documentation
    pub description: String,
    /// Constraints for validation
    pub constraints: Vec<Constraint>,
}

/// Constraints that can be applied to parameter values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params")]
pub enum Constraint {
    /// Numeric value must be within range [min, max]
    Range { min: f64, max: f64 },
    /// Numeric value must be >= min
    MinValue(f64),
    /// Kernel size: odd after rounding even sizes up, within [min, max]
    KernelSize { min: u32, max: u32 },
    /// Value must be one of the specified options
    OneOf(Vec<Value>),
    /// Array must have exactly this many elements
    Length(usize),
}

impl ParameterDefinition {
    /// Create a new parameter definition.
    pub fn new(name: impl Into<String>, value_type: ValueType, default_value: impl Into<Value>) -> Self {
        let name = name.into();
        Self {
            display_name: name_to_display(&name),
            name,
            value_type,
            default_value: default_value.into(),
            description: String::new(),
            constraints: Vec::new(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a range constraint.
    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.constraints.push(Constraint::Range { min, max });
        self
    }

    /// Add a constraint.
    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Validate a value against this parameter's type and constraints.
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        let actual = value.get_type();
        let compatible = actual == self.value_type
            || (self.value_type == ValueType::Float && actual == ValueType::Integer)
            || (self.value_type == ValueType::Integer && value.as_integer().is_some());
        if !compatible {
            return Err(format!(
                "Parameter '{}' expects {}, got {}",
                self.name, self.value_type, actual
            ));
        }

        for constraint in &self.constraints {
            constraint
                .validate(value)
                .map_err(|e| format!("Parameter '{}': {}", self.name, e))?;
        }
        Ok(())
    }
}

fn name_to_display(name: &str) -> String {
    name.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

impl Constraint {
    /// Validate a value against this constraint.
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        match self {
            Constraint::Range { min, max } => {
                if let Some(num) = value.as_float() {
                    if !num.is_finite() {
                        return Err(format!("Value {} is not finite", num));
                    }
                    if num < *min || num > *max {
                        return Err(format!("Value {} is out of range [{}, {}]", num, min, max));
                    }
                }
            }

            Constraint::MinValue(min) => {
                if let Some(num) = value.as_float() {
                    if !(num >= *min) {
                        return Err(format!("Value {} is below minimum {}", num, min));
                    }
                }
            }

            Constraint::KernelSize { min, max } => {
                if let Some(size) = value.as_integer() {
                    let odd = if size % 2 == 0 { size + 1 } else { size };
                    if odd < *min as i64 || odd > *max as i64 {
                        return Err(format!(
                            "Kernel size {} is not an odd size in [{}, {}]",
                            size, min, max
                        ));
                    }
                }
            }

            Constraint::OneOf(options) => {
                if !options.contains(value) {
                    let names: Vec<String> = options.iter().map(|o| o.to_string()).collect();
                    return Err(format!("Value {} must be one of: {}", value, names.join(", ")));
                }
            }

            Constraint::Length(len) => {
                if let Value::Array(items) = value {
                    if items.len() != *len {
                        return Err(format!(
                            "Expected {} elements, got {}",
                            len,
                            items.len()
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    /// Get a human-readable description of this constraint.
    pub fn description(&self) -> String {
        match self {
            Constraint::Range { min, max } => format!("{} to {}", min, max),
            Constraint::MinValue(min) => format!("at least {}", min),
            Constraint::KernelSize { min, max } => format!("odd size {} to {}", min, max),
            Constraint::OneOf(options) => {
                let names: Vec<String> = options.iter().map(|o| o.to_string()).collect();
                format!("one of {}", names.join(", "))
            }
            Constraint::Length(len) => format!("exactly {} elements", len),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_definition_builder() {
        let def = ParameterDefinition::new("sigma_color", ValueType::Float, 1.0)
            .with_description("Range sigma")
            .with_range(0.0, 10.0);

        assert_eq!(def.display_name, "Sigma Color");
        assert_eq!(def.constraints.len(), 1);
        assert!(def.validate(&Value::Float(2.0)).is_ok());
        assert!(def.validate(&Value::Integer(2)).is_ok());
        assert!(def.validate(&Value::Float(20.0)).is_err());
        assert!(def.validate(&Value::Boolean(true)).is_err());
    }

    #[test]
    fn test_constraint_range_rejects_nan() {
        let c = Constraint::Range { min: 0.0, max: 1.0 };
        assert!(c.validate(&Value::Float(f64::NAN)).is_err());
        assert!(c.validate(&Value::Float(0.5)).is_ok());
    }

    #[test]
    fn test_kernel_size_constraint() {
        let c = Constraint::KernelSize { min: 3, max: 15 };
        assert!(c.validate(&Value::Integer(4)).is_ok());
        assert!(c.validate(&Value::Integer(15)).is_ok());
        assert!(c.validate(&Value::Integer(16)).is_err());
        assert!(c.validate(&Value::Integer(1)).is_err());
    }

    #[test]
    fn test_one_of() {
        let c = Constraint::OneOf(vec![Value::from("cold"), Value::from("warm")]);
        assert!(c.validate(&Value::from("warm")).is_ok());
        assert!(c.validate(&Value::from("hot")).is_err());
    }
}
