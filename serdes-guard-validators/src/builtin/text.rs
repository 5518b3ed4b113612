use super::display_value;
use crate::validator::Validator;
use serde_json::Value as JsonValue;
use serdes_guard_core::{Metadata, ValidationResult};

/// Checks that a string is lower case. The fix lower-cases it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LowerCase;

impl LowerCase {
    /// Registry id.
    pub const ID: &'static str = "lower-case";
}

impl Validator for LowerCase {
    fn name(&self) -> &str {
        Self::ID
    }

    fn validate(&self, value: &JsonValue, _metadata: &Metadata) -> ValidationResult {
        let Some(text) = value.as_str() else {
            return ValidationResult::fail(format!("Value {} is not a string.", display_value(value)));
        };
        let lowered = text.to_lowercase();
        if lowered == text {
            ValidationResult::Pass
        } else {
            ValidationResult::fail_with_fix(format!("Value {text} is not lower case."), lowered)
        }
    }
}

/// Checks that a string has no line breaks. The fix keeps the first line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OneLine;

impl OneLine {
    /// Registry id.
    pub const ID: &'static str = "one-line";
}

impl Validator for OneLine {
    fn name(&self) -> &str {
        Self::ID
    }

    fn validate(&self, value: &JsonValue, _metadata: &Metadata) -> ValidationResult {
        let Some(text) = value.as_str() else {
            return ValidationResult::fail(format!("Value {} is not a string.", display_value(value)));
        };
        if !text.contains('\n') {
            return ValidationResult::Pass;
        }
        let first = text.lines().next().unwrap_or_default();
        ValidationResult::fail_with_fix(format!("Value {text} is not a single line."), first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lower_case() {
        assert!(LowerCase.validate(&json!("fine"), &Metadata::new()).is_pass());
        assert_eq!(
            LowerCase.validate(&json!("Loud"), &Metadata::new()),
            ValidationResult::fail_with_fix("Value Loud is not lower case.", "loud")
        );
    }

    #[test]
    fn test_one_line() {
        assert!(OneLine.validate(&json!("single"), &Metadata::new()).is_pass());
        let result = OneLine.validate(&json!("first\nsecond"), &Metadata::new());
        assert!(matches!(result, ValidationResult::Fail(f) if f.fix_value == Some(json!("first"))));
    }
}
