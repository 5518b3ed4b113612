use super::{display_value, Args};
use crate::validator::Validator;
use serde_json::{Map, Value as JsonValue};
use serdes_guard_core::{ConfigError, Metadata, ValidationResult};

/// Checks that a value is one of a fixed set.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidChoices {
    choices: Vec<JsonValue>,
}

impl ValidChoices {
    /// Registry id.
    pub const ID: &'static str = "valid-choices";

    /// Create from the allowed values.
    pub fn new<I, V>(choices: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<JsonValue>,
    {
        Self {
            choices: choices.into_iter().map(Into::into).collect(),
        }
    }

    /// Build from `{"choices": [..]}`.
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        match args.get("choices") {
            Some(JsonValue::Array(items)) if !items.is_empty() => Ok(Self {
                choices: items.clone(),
            }),
            _ => Err(ConfigError::invalid_args(
                Self::ID,
                "'choices' must be a non-empty list",
            )),
        }
    }
}

impl Validator for ValidChoices {
    fn name(&self) -> &str {
        Self::ID
    }

    fn args(&self) -> Map<String, JsonValue> {
        let mut args = Map::new();
        args.insert("choices".into(), JsonValue::Array(self.choices.clone()));
        args
    }

    fn validate(&self, value: &JsonValue, _metadata: &Metadata) -> ValidationResult {
        if self.choices.contains(value) {
            ValidationResult::Pass
        } else {
            ValidationResult::fail(format!(
                "Value {} is not in choices {}.",
                display_value(value),
                JsonValue::Array(self.choices.clone())
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_choices() {
        let v = ValidChoices::new(["red", "green"]);
        assert!(v.validate(&json!("red"), &Metadata::new()).is_pass());
        assert_eq!(
            v.validate(&json!("blue"), &Metadata::new()),
            ValidationResult::fail("Value blue is not in choices [\"red\",\"green\"].")
        );
    }

    #[test]
    fn test_from_args_rejects_empty() {
        let args = json!({"choices": []}).as_object().cloned().unwrap();
        assert!(ValidChoices::from_args(&args).is_err());
    }
}
