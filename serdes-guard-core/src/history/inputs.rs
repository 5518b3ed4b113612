//! Inputs recorded for calls and iterations.

use crate::prompt::{Instructions, Message, Prompt, PromptParams};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Arbitrary metadata handed to validators.
pub type Metadata = Map<String, JsonValue>;

/// Inputs used for one generate+validate round.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inputs {
    /// Name of the generation target, if any.
    pub llm_api: Option<String>,
    /// Precomputed output (consumed by the first round only).
    pub llm_output: Option<String>,
    /// Prompt template.
    pub prompt: Option<Prompt>,
    /// Instructions template.
    pub instructions: Option<Instructions>,
    /// Chat message history.
    pub msg_history: Option<Vec<Message>>,
    /// Parameters substituted into templates.
    #[serde(default)]
    pub prompt_params: PromptParams,
    /// Retry budget.
    pub num_reasks: u32,
    /// Metadata handed to validators.
    #[serde(default)]
    pub metadata: Metadata,
    /// Whether reasks regenerate the whole schema.
    pub full_schema_reask: bool,
    /// Whether the output was streamed.
    #[serde(default)]
    pub stream: bool,
}

impl Inputs {
    /// Inputs for a reask round: only prompt and instructions change, and
    /// the precomputed output is not reused.
    #[must_use]
    pub fn for_reask(&self, prompt: Prompt, instructions: Option<Instructions>) -> Self {
        Self {
            llm_output: None,
            prompt: Some(prompt),
            instructions,
            ..self.clone()
        }
    }
}

/// Snapshot of everything a call was invoked with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallInputs {
    /// The round inputs the call started from.
    #[serde(flatten)]
    pub inputs: Inputs,
    /// Free-form positional arguments forwarded to the target.
    #[serde(default)]
    pub args: Vec<JsonValue>,
    /// Free-form keyword arguments forwarded to the target.
    #[serde(default)]
    pub kwargs: Map<String, JsonValue>,
}

impl CallInputs {
    /// Wrap round inputs with no extra arguments.
    pub fn new(inputs: Inputs) -> Self {
        Self {
            inputs,
            args: Vec::new(),
            kwargs: Map::new(),
        }
    }

    /// Retry budget for this call.
    pub fn num_reasks(&self) -> u32 {
        self.inputs.num_reasks
    }
}
