//! Built-in validators.
//!
//! Each built-in can be constructed directly or from an argument bag via
//! `from_args`, which is what the [`ValidatorRegistry`](crate::ValidatorRegistry)
//! uses when resolving references.

mod choices;
mod length;
mod pattern;
mod range;
mod text;

pub use choices::ValidChoices;
pub use length::ValidLength;
pub use pattern::{MatchType, RegexMatch};
pub use range::ValidRange;
pub use text::{LowerCase, OneLine};

use serde_json::{Map, Value as JsonValue};
use serdes_guard_core::ConfigError;

pub(crate) type Args = Map<String, JsonValue>;

pub(crate) fn usize_arg(id: &str, args: &Args, key: &str) -> Result<Option<usize>, ConfigError> {
    match args.get(key) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| {
                ConfigError::invalid_args(id, format!("'{key}' must be a non-negative integer"))
            }),
    }
}

pub(crate) fn number_arg(id: &str, args: &Args, key: &str) -> Result<Option<f64>, ConfigError> {
    match args.get(key) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| ConfigError::invalid_args(id, format!("'{key}' must be a number"))),
    }
}

pub(crate) fn str_arg<'a>(
    id: &str,
    args: &'a Args,
    key: &str,
) -> Result<Option<&'a str>, ConfigError> {
    match args.get(key) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(v) => v
            .as_str()
            .map(Some)
            .ok_or_else(|| ConfigError::invalid_args(id, format!("'{key}' must be a string"))),
    }
}

/// Render a value for an error message: strings bare, everything else as JSON.
pub(crate) fn display_value(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}
