//! # serdes-guard
//!
//! Validate the output of a generative model against a declared schema,
//! and reask the model with a corrective prompt until it conforms or the
//! retry budget runs out.
//!
//! ## Core Concepts
//!
//! - **[`Guard`]**: schema, validators and defaults; the invocation entry point
//! - **[`CallOptions`]**: per-call target, prompt, budget and metadata
//! - **[`Strategy`]**: remote, async, stream or sync, chosen once per call
//! - **[`ValidationOutcome`]**: the pass/fail projection of a finished call
//! - **[`GuardHistory`]**: every call and its rounds, for auditing
//!
//! ## Example
//!
//! ```rust
//! use serdes_guard::prelude::*;
//!
//! let guard = Guard::builder()
//!     .validator(
//!         ValidatorReference::new("valid-length", "output")
//!             .with_arg("max", 5)
//!             .with_on_fail(OnFail::Reask),
//!     )
//!     .prompt("Name a color")
//!     .build()
//!     .unwrap();
//!
//! let llm = MockLlm::new("scripted")
//!     .with_response("turquoise")
//!     .with_response("red");
//!
//! let outcome = guard
//!     .call_sync(CallOptions::new().with_api(LlmApi::sync(llm)).with_num_reasks(2))
//!     .unwrap();
//!
//! assert!(outcome.validation_passed);
//! assert_eq!(outcome.validated_output, Some(serde_json::json!("red")));
//! assert_eq!(guard.history().last().unwrap().iteration_count(), 2);
//! ```
//!
//! ## Crates
//!
//! | Crate | Purpose |
//! |-------|---------|
//! | `serdes-guard-core` | Data model, history, errors |
//! | `serdes-guard-validators` | Validator trait, paths, registry, built-ins |
//! | `serdes-guard-runner` | Reask loop and streaming |
//! | `serdes-guard-remote` | Remote service client and history merge |

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

mod blocking;
pub mod builder;
pub mod context;
pub mod guard;
pub mod options;
pub mod response;
pub mod router;

pub use builder::GuardBuilder;
pub use context::ExecutionContext;
pub use guard::{Guard, INVOKE_FAILED_MESSAGE};
pub use options::{CallOptions, GuardSettings};
pub use response::GuardResponse;
pub use router::{check_preconditions, Strategy};

pub use serdes_guard_core::{
    Call, ConfigError, ExecutionOptions, FailResult, FieldReAsk, GuardError, GuardHistory,
    Instructions, Iteration, Message, OnFail, OutputModel, OutputSchema, OutputType, Prompt,
    Result, RetentionPolicy, Status, ValidationOutcome, ValidationResult,
};
pub use serdes_guard_remote::{HttpRemoteClient, RemoteConfig, RemoteError, RemoteService};
pub use serdes_guard_runner::{
    AsyncLlm, AsyncValidationStream, LlmApi, LlmRequest, MockLlm, SyncLlm, ValidationStream,
};
pub use serdes_guard_validators::{
    BoundValidator, FnValidator, JsonPath, Validator, ValidatorMap, ValidatorReference,
    ValidatorRegistry,
};

/// Data model, execution history, and error handling.
pub use serdes_guard_core as core;

/// Validators, paths, and the validator map.
pub use serdes_guard_validators as validators;

/// Reask loop and streaming.
pub use serdes_guard_runner as runner;

/// Remote service delegation.
pub use serdes_guard_remote as remote;

/// Prelude for common imports.
///
/// ```rust
/// use serdes_guard::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        CallOptions, Guard, GuardBuilder, GuardResponse, GuardSettings, Strategy,
    };
    pub use serdes_guard_core::prelude::*;
    pub use serdes_guard_runner::{AsyncLlm, LlmApi, LlmRequest, MockLlm, SyncLlm};
    pub use serdes_guard_validators::{
        FnValidator, JsonPath, Validator, ValidatorReference, ValidatorRegistry,
    };
    pub use serdes_guard_validators::builtin::{
        LowerCase, OneLine, RegexMatch, ValidChoices, ValidLength, ValidRange,
    };
}
