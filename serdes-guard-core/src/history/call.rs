//! One logical invocation and its rounds.

use super::inputs::CallInputs;
use super::iteration::Iteration;
use super::outputs::Status;
use crate::errors::{GuardError, Result};
use crate::validation::FieldReAsk;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// One logical invocation.
///
/// Each invocation exclusively owns its `Call`; the history stack only
/// holds shared references. Iterations are append-only and never mutated
/// once pushed.
#[derive(Debug)]
pub struct Call {
    id: String,
    inputs: CallInputs,
    iterations: RwLock<Vec<Arc<Iteration>>>,
    exception: RwLock<Option<String>>,
    created_at: DateTime<Utc>,
}

impl Call {
    /// Create a new call with no iterations.
    pub fn new(inputs: CallInputs) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            inputs,
            iterations: RwLock::new(Vec::new()),
            exception: RwLock::new(None),
            created_at: Utc::now(),
        }
    }

    /// Unique id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The inputs the call was invoked with.
    pub fn inputs(&self) -> &CallInputs {
        &self.inputs
    }

    /// When the call started.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Maximum number of iterations this call may hold.
    pub fn max_iterations(&self) -> usize {
        self.inputs.num_reasks() as usize + 1
    }

    /// Append a completed iteration.
    ///
    /// Fails with an invariant violation if the retry budget would be
    /// exceeded or the iteration index is out of order.
    pub fn push_iteration(&self, iteration: Iteration) -> Result<Arc<Iteration>> {
        let mut iterations = self.iterations.write();
        if iterations.len() >= self.max_iterations() {
            return Err(GuardError::invariant(format!(
                "call {} already holds {} iterations (num_reasks = {})",
                self.id,
                iterations.len(),
                self.inputs.num_reasks()
            )));
        }
        if iteration.index != iterations.len() {
            return Err(GuardError::invariant(format!(
                "iteration index {} pushed at position {}",
                iteration.index,
                iterations.len()
            )));
        }
        let iteration = Arc::new(iteration);
        iterations.push(Arc::clone(&iteration));
        Ok(iteration)
    }

    /// Number of iterations recorded so far.
    pub fn iteration_count(&self) -> usize {
        self.iterations.read().len()
    }

    /// Snapshot of all iterations, in round order.
    pub fn iterations(&self) -> Vec<Arc<Iteration>> {
        self.iterations.read().clone()
    }

    /// The most recent iteration.
    pub fn last_iteration(&self) -> Option<Arc<Iteration>> {
        self.iterations.read().last().cloned()
    }

    /// Record the error that aborted the call.
    pub fn set_exception(&self, message: impl Into<String>) {
        *self.exception.write() = Some(message.into());
    }

    /// The error that aborted the call, if any.
    pub fn exception(&self) -> Option<String> {
        self.exception.read().clone()
    }

    /// Derived status of the call.
    pub fn status(&self) -> Status {
        if self.exception.read().is_some() {
            return Status::Error;
        }
        self.last_iteration()
            .map_or(Status::NotRun, |it| it.status())
    }

    /// Validated output of the last iteration.
    pub fn validated_output(&self) -> Option<JsonValue> {
        self.last_iteration()
            .and_then(|it| it.outputs.validated_output.clone())
    }

    /// Raw output of the last iteration.
    pub fn raw_output(&self) -> Option<String> {
        self.last_iteration().and_then(|it| it.outputs.raw_output.clone())
    }

    /// Reasks left unresolved by the last iteration.
    pub fn reasks(&self) -> Vec<FieldReAsk> {
        self.last_iteration()
            .map(|it| it.outputs.reasks.clone())
            .unwrap_or_default()
    }
}
