//! A single generate+validate round.

use super::inputs::Inputs;
use super::outputs::{Outputs, Status};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One generate+validate round. Immutable once pushed to its call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Iteration {
    /// Unique id.
    pub id: String,
    /// Zero-based round index within the call.
    pub index: usize,
    /// Inputs used for this round.
    pub inputs: Inputs,
    /// What the round produced.
    pub outputs: Outputs,
    /// When the round started.
    pub started_at: DateTime<Utc>,
    /// When the round finished.
    pub completed_at: DateTime<Utc>,
}

impl Iteration {
    /// Create a completed iteration.
    pub fn new(index: usize, inputs: Inputs, outputs: Outputs, started_at: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            index,
            inputs,
            outputs,
            started_at,
            completed_at: Utc::now(),
        }
    }

    /// Derived status.
    pub fn status(&self) -> Status {
        self.outputs.status()
    }

    /// Whether the next round has anything to correct.
    pub fn has_reasks(&self) -> bool {
        !self.outputs.reasks.is_empty()
    }
}
