//! Wire types exchanged with the remote validation service.
//!
//! Every response field is optional. Consumers handle absence per field
//! rather than assuming the service echoes everything back.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use serdes_guard_core::{CallInputs, OutputSchema, PromptParams};
use serdes_guard_validators::ValidatorReference;

/// Call keyword holding the provider key forwarded as a header.
pub const API_KEY_KWARG: &str = "api_key";

/// Body of a validate request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatePayload {
    /// Positional call arguments.
    #[serde(default)]
    pub args: Vec<JsonValue>,
    /// Precomputed output to validate instead of generating.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_output: Option<String>,
    /// Retry budget.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_reasks: Option<u32>,
    /// Template parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_params: Option<PromptParams>,
    /// Provider identifier of the generation target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_api: Option<String>,
    /// Remaining call keyword arguments, inlined.
    #[serde(flatten)]
    pub kwargs: Map<String, JsonValue>,
}

impl ValidatePayload {
    /// Build the request for a call.
    ///
    /// The provider key is left out of the body; see [`API_KEY_KWARG`].
    pub fn from_call_inputs(call: &CallInputs, provider: Option<&str>) -> Self {
        let inputs = &call.inputs;
        let mut kwargs = call.kwargs.clone();
        kwargs.remove(API_KEY_KWARG);
        Self {
            args: call.args.clone(),
            llm_output: inputs.llm_output.clone(),
            num_reasks: Some(inputs.num_reasks),
            prompt_params: (!inputs.prompt_params.is_empty()).then(|| inputs.prompt_params.clone()),
            llm_api: provider.map(str::to_string),
            kwargs,
        }
    }
}

/// Body of a validate response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationResponse {
    /// Whether validation passed.
    pub result: Option<bool>,
    /// Validated output.
    pub validated_output: Option<JsonValue>,
    /// Raw output of the last round.
    pub raw_llm_response: Option<String>,
    /// Sessions of rounds the service ran, oldest first.
    pub session_history: Option<Vec<RemoteCall>>,
}

/// One remote session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteCall {
    /// Rounds of the session, in order.
    pub history: Option<Vec<RemoteRound>>,
}

/// Prompt echoed back by the service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemotePrompt {
    /// Template text.
    pub source: Option<String>,
}

/// One remote round.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteRound {
    /// Instructions used.
    pub instructions: Option<String>,
    /// Prompt used.
    pub prompt: Option<RemotePrompt>,
    /// Raw output.
    pub output: Option<String>,
    /// Parsed output.
    pub parsed_output: Option<JsonValue>,
    /// Validated output.
    pub validated_output: Option<JsonValue>,
    /// Units to correct.
    pub reasks: Option<Vec<RemoteReask>>,
}

/// One remote reask record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteReask {
    /// Offending value.
    pub incorrect_value: Option<JsonValue>,
    /// Path of the unit.
    pub path: Option<String>,
    /// Error message.
    pub error_message: Option<String>,
    /// Suggested fix.
    pub fix_value: Option<JsonValue>,
}

/// Guard definition pushed to the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardDescriptor {
    /// Guard id.
    pub id: String,
    /// Guard name.
    pub name: String,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Validators attached to the guard.
    #[serde(default)]
    pub validators: Vec<ValidatorReference>,
    /// Output schema.
    pub output_schema: OutputSchema,
}
