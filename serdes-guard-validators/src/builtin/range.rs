use super::{display_value, number_arg, Args};
use crate::validator::Validator;
use serde_json::{json, Map, Value as JsonValue};
use serdes_guard_core::{ConfigError, Metadata, ValidationResult};

/// Checks that a number lies within bounds. The fix clamps to the bound.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidRange {
    min: Option<f64>,
    max: Option<f64>,
}

impl ValidRange {
    /// Registry id.
    pub const ID: &'static str = "valid-range";

    /// Inclusive bounds.
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    /// Build from `{"min": .., "max": ..}`.
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        let min = number_arg(Self::ID, args, "min")?;
        let max = number_arg(Self::ID, args, "max")?;
        if let (Some(lo), Some(hi)) = (min, max) {
            if lo > hi {
                return Err(ConfigError::invalid_args(Self::ID, "'min' exceeds 'max'"));
            }
        }
        Ok(Self { min, max })
    }
}

fn bound_value(bound: f64, like: &JsonValue) -> JsonValue {
    let integral = like.is_i64() || like.is_u64();
    if integral && bound.fract() == 0.0 && bound.abs() < i64::MAX as f64 {
        json!(bound as i64)
    } else {
        json!(bound)
    }
}

impl Validator for ValidRange {
    fn name(&self) -> &str {
        Self::ID
    }

    fn args(&self) -> Map<String, JsonValue> {
        let mut args = Map::new();
        if let Some(min) = self.min {
            args.insert("min".into(), json!(min));
        }
        if let Some(max) = self.max {
            args.insert("max".into(), json!(max));
        }
        args
    }

    fn validate(&self, value: &JsonValue, _metadata: &Metadata) -> ValidationResult {
        let Some(number) = value.as_f64() else {
            return ValidationResult::fail(format!(
                "Value {} is not a number.",
                display_value(value)
            ));
        };
        if let Some(min) = self.min {
            if number < min {
                return ValidationResult::fail_with_fix(
                    format!("Value {number} is less than {min}."),
                    bound_value(min, value),
                );
            }
        }
        if let Some(max) = self.max {
            if number > max {
                return ValidationResult::fail_with_fix(
                    format!("Value {number} is greater than {max}."),
                    bound_value(max, value),
                );
            }
        }
        ValidationResult::Pass
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(json!(5), None)]
    #[case(json!(-3), Some(json!(0)))]
    #[case(json!(11), Some(json!(10)))]
    #[case(json!(10.5), Some(json!(10.0)))]
    fn test_clamps(#[case] value: JsonValue, #[case] fix: Option<JsonValue>) {
        let v = ValidRange::new(Some(0.0), Some(10.0));
        match v.validate(&value, &Metadata::new()) {
            ValidationResult::Pass => assert!(fix.is_none()),
            ValidationResult::Fail(fail) => assert_eq!(fail.fix_value, fix),
        }
    }

    #[test]
    fn test_not_a_number() {
        let v = ValidRange::new(None, Some(1.0));
        assert!(!v.validate(&json!("3"), &Metadata::new()).is_pass());
    }
}
