//! Per-guard execution defaults.

use crate::prompt::{Instructions, Prompt};
use serde::{Deserialize, Serialize};

/// Default templates a guard falls back to when a call omits them.
///
/// Read-only during an invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOptions {
    /// Default prompt template.
    pub prompt: Option<Prompt>,
    /// Default instructions template.
    pub instructions: Option<Instructions>,
    /// Prompt template used for reask rounds.
    pub reask_prompt: Option<Prompt>,
    /// Instructions template used for reask rounds.
    pub reask_instructions: Option<Instructions>,
}

impl ExecutionOptions {
    /// Create empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default prompt.
    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<Prompt>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Set the default instructions.
    #[must_use]
    pub fn with_instructions(mut self, instructions: impl Into<Instructions>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Set the reask prompt.
    #[must_use]
    pub fn with_reask_prompt(mut self, prompt: impl Into<Prompt>) -> Self {
        self.reask_prompt = Some(prompt.into());
        self
    }

    /// Set the reask instructions.
    #[must_use]
    pub fn with_reask_instructions(mut self, instructions: impl Into<Instructions>) -> Self {
        self.reask_instructions = Some(instructions.into());
        self
    }
}
