//! Per-call options and guard settings.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use serdes_guard_core::{Instructions, Message, Metadata, Prompt, PromptParams, RetentionPolicy};
use serdes_guard_runner::LlmApi;

/// Everything a single invocation may override.
///
/// Unset values fall back to the guard's [`ExecutionOptions`](serdes_guard_core::ExecutionOptions)
/// and settings.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Generation target.
    pub llm_api: Option<LlmApi>,
    /// Precomputed output to validate.
    pub llm_output: Option<String>,
    /// Prompt template.
    pub prompt: Option<Prompt>,
    /// Instructions template.
    pub instructions: Option<Instructions>,
    /// Chat history.
    pub msg_history: Option<Vec<Message>>,
    /// Template parameters.
    pub prompt_params: PromptParams,
    /// Retry budget.
    pub num_reasks: Option<u32>,
    /// Metadata handed to validators.
    pub metadata: Metadata,
    /// Whether reasks regenerate the whole schema.
    pub full_schema_reask: Option<bool>,
    /// Stream partial outcomes.
    pub stream: bool,
    /// Reask prompt template for this call.
    pub reask_prompt: Option<Prompt>,
    /// Reask instructions template for this call.
    pub reask_instructions: Option<Instructions>,
    /// Positional arguments forwarded to the target.
    pub args: Vec<JsonValue>,
    /// Keyword arguments forwarded to the target.
    pub kwargs: Map<String, JsonValue>,
}

impl CallOptions {
    /// Empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the generation target.
    #[must_use]
    pub fn with_api(mut self, api: LlmApi) -> Self {
        self.llm_api = Some(api);
        self
    }

    /// Validate this output instead of generating on the first round.
    #[must_use]
    pub fn with_llm_output(mut self, output: impl Into<String>) -> Self {
        self.llm_output = Some(output.into());
        self
    }

    /// Set the prompt.
    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<Prompt>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Set the instructions.
    #[must_use]
    pub fn with_instructions(mut self, instructions: impl Into<Instructions>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Set the chat history.
    #[must_use]
    pub fn with_msg_history(mut self, messages: Vec<Message>) -> Self {
        self.msg_history = Some(messages);
        self
    }

    /// Add a template parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.prompt_params.insert(key.into(), value.into());
        self
    }

    /// Set the retry budget.
    #[must_use]
    pub fn with_num_reasks(mut self, num_reasks: u32) -> Self {
        self.num_reasks = Some(num_reasks);
        self
    }

    /// Add a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Choose between field-level and full-schema reasks.
    #[must_use]
    pub fn with_full_schema_reask(mut self, full: bool) -> Self {
        self.full_schema_reask = Some(full);
        self
    }

    /// Request a stream of partial outcomes.
    #[must_use]
    pub fn streaming(mut self) -> Self {
        self.stream = true;
        self
    }

    /// Set the reask prompt for this call.
    #[must_use]
    pub fn with_reask_prompt(mut self, prompt: impl Into<Prompt>) -> Self {
        self.reask_prompt = Some(prompt.into());
        self
    }

    /// Set the reask instructions for this call.
    #[must_use]
    pub fn with_reask_instructions(mut self, instructions: impl Into<Instructions>) -> Self {
        self.reask_instructions = Some(instructions.into());
        self
    }

    /// Add a positional argument.
    #[must_use]
    pub fn with_arg(mut self, value: impl Into<JsonValue>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Add a keyword argument.
    #[must_use]
    pub fn with_kwarg(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }
}

/// Settings changed between invocations with [`Guard::configure`](crate::Guard::configure).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardSettings {
    /// Default retry budget.
    pub num_reasks: Option<u32>,
    /// History retention.
    pub retention: Option<RetentionPolicy>,
}

impl GuardSettings {
    /// Set the default retry budget.
    #[must_use]
    pub fn num_reasks(mut self, num_reasks: u32) -> Self {
        self.num_reasks = Some(num_reasks);
        self
    }

    /// Set history retention.
    #[must_use]
    pub fn retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = Some(retention);
        self
    }
}
