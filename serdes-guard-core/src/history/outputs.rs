//! Outputs recorded for an iteration.

use crate::validation::{FieldReAsk, OnFail, ValidationResult};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// Status of an iteration or call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// No round completed yet.
    NotRun,
    /// Every validator passed or was resolved in place.
    Pass,
    /// At least one blocking failure remained.
    Fail,
    /// The round aborted with an error.
    Error,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotRun => "not run",
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Response information returned by a generation target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmResponse {
    /// Raw text output.
    pub output: String,
    /// Prompt tokens, if reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_token_count: Option<u32>,
    /// Response tokens, if reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_token_count: Option<u32>,
}

impl LlmResponse {
    /// Response carrying only text.
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            prompt_token_count: None,
            response_token_count: None,
        }
    }

    /// Attach token counts.
    #[must_use]
    pub fn with_usage(mut self, prompt_tokens: u32, response_tokens: u32) -> Self {
        self.prompt_token_count = Some(prompt_tokens);
        self.response_token_count = Some(response_tokens);
        self
    }
}

/// Audit record for one validator run on one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorLog {
    /// Validator name.
    pub validator_name: String,
    /// Concrete path of the unit.
    pub path: String,
    /// Policy the validator was bound to.
    pub on_fail: OnFail,
    /// Value the validator saw.
    pub value_before_validation: JsonValue,
    /// What it returned.
    pub result: ValidationResult,
}

impl ValidatorLog {
    /// Whether this run failed with a blocking policy.
    pub fn is_blocking_failure(&self) -> bool {
        !self.result.is_pass() && self.on_fail.is_blocking()
    }
}

/// Outputs of one generate+validate round.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Outputs {
    /// Response info from the target.
    pub llm_response_info: Option<LlmResponse>,
    /// Raw text that was validated.
    pub raw_output: Option<String>,
    /// Output parsed against the schema shape.
    pub parsed_output: Option<JsonValue>,
    /// Parsed output after on-fail substitutions.
    pub validated_output: Option<JsonValue>,
    /// Units the next round must correct.
    #[serde(default)]
    pub reasks: Vec<FieldReAsk>,
    /// Every validator run, in execution order.
    #[serde(default)]
    pub validator_logs: Vec<ValidatorLog>,
    /// Error that aborted this round.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Outputs {
    /// Derived status of the round.
    pub fn status(&self) -> Status {
        if self.error.is_some() {
            return Status::Error;
        }
        if self.raw_output.is_none() && self.llm_response_info.is_none() {
            return Status::NotRun;
        }
        let blocked = !self.reasks.is_empty()
            || self.validator_logs.iter().any(ValidatorLog::is_blocking_failure);
        if blocked {
            Status::Fail
        } else {
            Status::Pass
        }
    }

    /// Logs for validators that failed.
    pub fn failed_validations(&self) -> impl Iterator<Item = &ValidatorLog> {
        self.validator_logs.iter().filter(|l| !l.result.is_pass())
    }
}
