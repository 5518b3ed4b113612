//! The user-facing result of a call.

use crate::errors::Result;
use crate::history::{Call, Status};
use crate::validation::FieldReAsk;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Terminal, read-only projection of a completed call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    /// Id of the call this outcome was assembled from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    /// Raw output of the last round.
    pub raw_llm_output: Option<String>,
    /// Validated output of the last round (null if unrecoverable).
    pub validated_output: Option<JsonValue>,
    /// Whether the last round ended with no blocking failure.
    pub validation_passed: bool,
    /// Set only on terminal abort or an empty remote response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Reasks left unresolved when the retry budget ran out.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasks: Vec<FieldReAsk>,
}

impl ValidationOutcome {
    /// Assemble the outcome of a completed call.
    ///
    /// Reads only the last iteration and the call's abort state, so calling
    /// it twice on the same call yields identical outcomes.
    pub fn from_call(call: &Call) -> Self {
        let last = call.last_iteration();
        let error = call.exception();
        let (raw_llm_output, validated_output, reasks) = match &last {
            Some(it) => (
                it.outputs.raw_output.clone(),
                it.outputs.validated_output.clone(),
                it.outputs.reasks.clone(),
            ),
            None => (None, None, Vec::new()),
        };
        let validation_passed = error.is_none()
            && last
                .as_ref()
                .is_some_and(|it| it.status() == Status::Pass);
        Self {
            call_id: Some(call.id().to_string()),
            raw_llm_output,
            validated_output,
            validation_passed,
            error,
            reasks,
        }
    }

    /// A failed outcome carrying only an error.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            call_id: None,
            raw_llm_output: None,
            validated_output: None,
            validation_passed: false,
            error: Some(error.into()),
            reasks: Vec::new(),
        }
    }

    /// Attach a call id.
    #[must_use]
    pub fn with_call_id(mut self, call_id: impl Into<String>) -> Self {
        self.call_id = Some(call_id.into());
        self
    }

    /// Deserialize the validated output into a caller type.
    pub fn validated_as<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        match &self.validated_output {
            None | Some(JsonValue::Null) => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
        }
    }

    /// One line per unresolved reask: `path: message; message`.
    pub fn error_summary(&self) -> Option<String> {
        if self.reasks.is_empty() {
            return None;
        }
        let lines: Vec<String> = self
            .reasks
            .iter()
            .map(|r| format!("{}: {}", r.path, r.error_messages().join("; ")))
            .collect();
        Some(lines.join("\n"))
    }
}
