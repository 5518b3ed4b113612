use super::{display_value, str_arg, Args};
use crate::validator::Validator;
use regex::Regex;
use serde_json::{json, Map, Value as JsonValue};
use serdes_guard_core::{ConfigError, Metadata, ValidationResult};

/// How a [`RegexMatch`] pattern is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchType {
    /// Pattern may match anywhere.
    #[default]
    Search,
    /// Pattern must match the whole value.
    FullMatch,
}

impl MatchType {
    fn as_str(self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::FullMatch => "fullmatch",
        }
    }
}

/// Checks a string against a regular expression.
#[derive(Debug, Clone)]
pub struct RegexMatch {
    pattern: String,
    regex: Regex,
    match_type: MatchType,
}

impl RegexMatch {
    /// Registry id.
    pub const ID: &'static str = "regex-match";

    /// Create a validator.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern is invalid.
    pub fn new(pattern: &str, match_type: MatchType) -> Result<Self, ConfigError> {
        let compiled = match match_type {
            MatchType::Search => pattern.to_string(),
            MatchType::FullMatch => format!("^(?:{pattern})$"),
        };
        let regex =
            Regex::new(&compiled).map_err(|e| ConfigError::invalid_args(Self::ID, e.to_string()))?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
            match_type,
        })
    }

    /// Build from `{"regex": "..", "match_type": "search" | "fullmatch"}`.
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        let pattern = str_arg(Self::ID, args, "regex")?
            .ok_or_else(|| ConfigError::invalid_args(Self::ID, "'regex' is required"))?;
        let match_type = match str_arg(Self::ID, args, "match_type")? {
            None | Some("search") => MatchType::Search,
            Some("fullmatch") => MatchType::FullMatch,
            Some(other) => {
                return Err(ConfigError::invalid_args(
                    Self::ID,
                    format!("unknown match_type '{other}'"),
                ))
            }
        };
        Self::new(pattern, match_type)
    }
}

impl Validator for RegexMatch {
    fn name(&self) -> &str {
        Self::ID
    }

    fn args(&self) -> Map<String, JsonValue> {
        let mut args = Map::new();
        args.insert("regex".into(), json!(self.pattern));
        args.insert("match_type".into(), json!(self.match_type.as_str()));
        args
    }

    fn validate(&self, value: &JsonValue, _metadata: &Metadata) -> ValidationResult {
        let Some(text) = value.as_str() else {
            return ValidationResult::fail(format!(
                "Value {} must be a string to match {}",
                display_value(value),
                self.pattern
            ));
        };
        if self.regex.is_match(text) {
            ValidationResult::Pass
        } else {
            ValidationResult::fail(format!("Result must match {}", self.pattern))
        }
    }
}
