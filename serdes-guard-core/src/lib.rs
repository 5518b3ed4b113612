//! # serdes-guard-core
//!
//! Core types, execution history, and error handling for serdes-guard.
//!
//! This crate provides the foundational types shared by every other
//! serdes-guard crate:
//!
//! - **Errors**: the guard error taxonomy
//! - **Schema**: compiled output schemas and the [`OutputModel`] trait
//! - **Prompts**: templates with `${name}` substitution
//! - **Validation**: on-fail policies, fail results, reasks
//! - **History**: calls, iterations, and the per-guard history stack
//! - **Outcome**: the user-facing [`ValidationOutcome`]
//!
//! ## Example
//!
//! ```rust
//! use serdes_guard_core::{
//!     history::{CallInputs, GuardHistory, Inputs, Iteration, Outputs},
//!     ValidationOutcome,
//! };
//! use serde_json::json;
//!
//! let history = GuardHistory::default();
//! let call = history.start_call(CallInputs::new(Inputs::default()));
//!
//! let outputs = Outputs {
//!     raw_output: Some("ok".into()),
//!     validated_output: Some(json!("ok")),
//!     ..Default::default()
//! };
//! call.push_iteration(Iteration::new(0, Inputs::default(), outputs, chrono::Utc::now()))
//!     .expect("within budget");
//!
//! let outcome = ValidationOutcome::from_call(&call);
//! assert!(outcome.validation_passed);
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod errors;
pub mod history;
pub mod options;
pub mod outcome;
pub mod prompt;
pub mod schema;
pub mod validation;

// Re-exports for convenience
pub use errors::{ConfigError, GuardError, LlmError, Result, ValidationError};
pub use history::{
    Call, CallInputs, GuardHistory, Inputs, Iteration, LlmResponse, Metadata, Outputs,
    RetentionPolicy, Status, ValidatorLog,
};
pub use options::ExecutionOptions;
pub use outcome::ValidationOutcome;
pub use prompt::{escape, substitute, Instructions, Message, Prompt, PromptParams, Role};
pub use schema::{OutputModel, OutputSchema, OutputType};
pub use validation::{FailResult, FieldReAsk, OnFail, ValidationResult};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::errors::{ConfigError, GuardError, Result};
    pub use crate::history::{Call, GuardHistory, Iteration, RetentionPolicy, Status};
    pub use crate::options::ExecutionOptions;
    pub use crate::outcome::ValidationOutcome;
    pub use crate::prompt::{Instructions, Message, Prompt, PromptParams};
    pub use crate::schema::{OutputModel, OutputSchema, OutputType};
    pub use crate::validation::{FailResult, FieldReAsk, OnFail, ValidationResult};
}
