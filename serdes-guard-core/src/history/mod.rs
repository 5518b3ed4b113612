//! Execution history.
//!
//! A [`GuardHistory`] holds [`Call`]s, each holding an ordered list of
//! [`Iteration`]s. Every round of every invocation is recorded here,
//! including failures.

mod call;
mod inputs;
mod iteration;
mod outputs;
mod stack;

pub use call::Call;
pub use inputs::{CallInputs, Inputs, Metadata};
pub use iteration::Iteration;
pub use outputs::{LlmResponse, Outputs, Status, ValidatorLog};
pub use stack::{GuardHistory, RetentionPolicy};
