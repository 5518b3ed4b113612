//! Validator results and reask records.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;

/// What to do when a validator fails.
///
/// `Fix` and `Noop` resolve a failure in place. `Reask`, `Filter` and
/// `Refrain` are blocking: the first blocking failure on a unit decides
/// its disposition. `Exception` aborts the whole call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OnFail {
    /// Record the failure and keep the value.
    #[default]
    #[serde(alias = "ignore")]
    Noop,
    /// Abort the call with a [`ValidationError`](crate::ValidationError).
    #[serde(alias = "raise")]
    Exception,
    /// Substitute the validator's fix value.
    Fix,
    /// Remove the unit from the output.
    Filter,
    /// Replace the unit with null.
    Refrain,
    /// Ask the model to correct the unit.
    Reask,
}

impl OnFail {
    /// Whether a failure with this policy decides the unit's disposition.
    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::Reask | Self::Filter | Self::Refrain)
    }

    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Noop => "noop",
            Self::Exception => "exception",
            Self::Fix => "fix",
            Self::Filter => "filter",
            Self::Refrain => "refrain",
            Self::Reask => "reask",
        }
    }
}

impl fmt::Display for OnFail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OnFail {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "noop" | "ignore" => Ok(Self::Noop),
            "exception" | "raise" => Ok(Self::Exception),
            "fix" => Ok(Self::Fix),
            "filter" => Ok(Self::Filter),
            "refrain" => Ok(Self::Refrain),
            "reask" => Ok(Self::Reask),
            other => Err(format!("unknown on-fail policy: {other}")),
        }
    }
}

/// A single validator failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailResult {
    /// Human-readable error.
    pub error_message: String,
    /// Suggested replacement value, if the validator can propose one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_value: Option<JsonValue>,
}

impl FailResult {
    /// Create a failure with no fix.
    pub fn new(error_message: impl Into<String>) -> Self {
        Self {
            error_message: error_message.into(),
            fix_value: None,
        }
    }

    /// Attach a fix value.
    #[must_use]
    pub fn with_fix(mut self, fix_value: impl Into<JsonValue>) -> Self {
        self.fix_value = Some(fix_value.into());
        self
    }
}

/// Result of running one validator on one unit of content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum ValidationResult {
    /// The value is acceptable.
    Pass,
    /// The value failed.
    Fail(FailResult),
}

impl ValidationResult {
    /// Shorthand for a failure with no fix.
    pub fn fail(error_message: impl Into<String>) -> Self {
        Self::Fail(FailResult::new(error_message))
    }

    /// Shorthand for a failure with a fix value.
    pub fn fail_with_fix(error_message: impl Into<String>, fix: impl Into<JsonValue>) -> Self {
        Self::Fail(FailResult::new(error_message).with_fix(fix))
    }

    /// Whether this is a pass.
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }
}

/// One unit of content that must be corrected by the next round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldReAsk {
    /// The offending value.
    pub incorrect_value: JsonValue,
    /// Concrete path of the unit (`$` for the whole output).
    pub path: String,
    /// Every failure collected for the unit, controlling failure first.
    pub fail_results: Vec<FailResult>,
}

impl FieldReAsk {
    /// Create a reask for a unit.
    pub fn new(
        incorrect_value: JsonValue,
        path: impl Into<String>,
        fail_results: Vec<FailResult>,
    ) -> Self {
        Self {
            incorrect_value,
            path: path.into(),
            fail_results,
        }
    }

    /// All error messages, in order.
    pub fn error_messages(&self) -> Vec<&str> {
        self.fail_results
            .iter()
            .map(|r| r.error_message.as_str())
            .collect()
    }

    /// First available fix value.
    pub fn fix_value(&self) -> Option<&JsonValue> {
        self.fail_results.iter().find_map(|r| r.fix_value.as_ref())
    }
}
