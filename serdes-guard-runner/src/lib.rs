//! # serdes-guard-runner
//!
//! The validation-and-reask engine.
//!
//! A [`Runner`] drives one registered [`Call`](serdes_guard_core::Call):
//!
//! 1. generate (or use the precomputed output on the first round)
//! 2. parse against the schema shape and run the validator map
//! 3. record an [`Iteration`](serdes_guard_core::Iteration)
//! 4. stop, or build a corrective prompt and go again while budget remains
//!
//! Generation targets implement [`SyncLlm`] or [`AsyncLlm`] and are tagged
//! once as an [`LlmApi`]. Streaming produces a [`ValidationStream`]
//! (blocking iterator) or an [`AsyncValidationStream`] (`futures::Stream`).

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod llm;
pub mod mock;
pub mod parse;
pub mod reask;
pub mod runner;
pub mod stream;
pub mod validate;

pub use llm::{AsyncLlm, ChunkIter, ChunkStream, LlmApi, LlmRequest, SyncLlm};
pub use mock::MockLlm;
pub use parse::{parse_output, UNPARSEABLE_MESSAGE};
pub use reask::{
    build_reask_inputs, ReaskRequest, ReaskTemplates, JSON_REASK_INSTRUCTIONS, JSON_REASK_PROMPT,
    STRING_REASK_PROMPT,
};
pub use runner::Runner;
pub use stream::{AsyncValidationStream, ValidationStream};
pub use validate::{validate_output, PassResult};
