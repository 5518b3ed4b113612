use super::{usize_arg, Args};
use crate::validator::Validator;
use serde_json::{json, Map, Value as JsonValue};
use serdes_guard_core::{ConfigError, Metadata, ValidationResult};

/// Checks the length of a string (in characters) or a list.
///
/// Fix values truncate to `max`, or pad to `min` by repeating the last
/// character or element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidLength {
    min: Option<usize>,
    max: Option<usize>,
}

impl ValidLength {
    /// Registry id.
    pub const ID: &'static str = "valid-length";

    /// Length between `min` and `max`, inclusive.
    pub fn new(min: Option<usize>, max: Option<usize>) -> Self {
        Self { min, max }
    }

    /// At most `max`.
    pub fn max(max: usize) -> Self {
        Self::new(None, Some(max))
    }

    /// At least `min`.
    pub fn min(min: usize) -> Self {
        Self::new(Some(min), None)
    }

    /// Build from `{"min": .., "max": ..}`.
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        let min = usize_arg(Self::ID, args, "min")?;
        let max = usize_arg(Self::ID, args, "max")?;
        if let (Some(lo), Some(hi)) = (min, max) {
            if lo > hi {
                return Err(ConfigError::invalid_args(Self::ID, "'min' exceeds 'max'"));
            }
        }
        Ok(Self { min, max })
    }

    fn check_string(&self, text: &str) -> ValidationResult {
        let len = text.chars().count();
        if let Some(min) = self.min {
            if len < min {
                let message = format!(
                    "Value has length less than {min}. Please return a longer output, \
                     that is longer than {min} characters."
                );
                return match text.chars().last() {
                    Some(last) => {
                        let padded: String = text
                            .chars()
                            .chain(std::iter::repeat(last).take(min - len))
                            .collect();
                        ValidationResult::fail_with_fix(message, padded)
                    }
                    None => ValidationResult::fail(message),
                };
            }
        }
        if let Some(max) = self.max {
            if len > max {
                let message = format!(
                    "Value has length greater than {max}. Please return a shorter output, \
                     that is shorter than {max} characters."
                );
                let truncated: String = text.chars().take(max).collect();
                return ValidationResult::fail_with_fix(message, truncated);
            }
        }
        ValidationResult::Pass
    }

    fn check_list(&self, items: &[JsonValue]) -> ValidationResult {
        let len = items.len();
        if let Some(min) = self.min {
            if len < min {
                let message = format!("List has length less than {min}.");
                return match items.last() {
                    Some(last) => {
                        let mut padded = items.to_vec();
                        padded.resize(min, last.clone());
                        ValidationResult::fail_with_fix(message, padded)
                    }
                    None => ValidationResult::fail(message),
                };
            }
        }
        if let Some(max) = self.max {
            if len > max {
                let message = format!("List has length greater than {max}.");
                return ValidationResult::fail_with_fix(message, items[..max].to_vec());
            }
        }
        ValidationResult::Pass
    }
}

impl Validator for ValidLength {
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
        match value {
            JsonValue::String(text) => self.check_string(text),
            JsonValue::Array(items) => self.check_list(items),
            _ => ValidationResult::fail("Value must be a string or a list to check its length."),
        }
    }
}
