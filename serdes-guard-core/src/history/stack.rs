//! Per-guard stack of past calls.

use super::call::Call;
use super::inputs::CallInputs;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;

/// How many calls a guard keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "limit")]
pub enum RetentionPolicy {
    /// Keep every call for the life of the guard.
    #[default]
    Unbounded,
    /// Keep at most this many calls, evicting the oldest.
    Bounded(usize),
}

/// Append-only record of a guard's calls.
///
/// Concurrent invocations each register their own [`Call`] here once, at
/// start; rounds are then appended to that call without touching the
/// stack.
#[derive(Debug, Default)]
pub struct GuardHistory {
    calls: Mutex<VecDeque<Arc<Call>>>,
    retention: Mutex<RetentionPolicy>,
}

impl GuardHistory {
    /// Create an empty history.
    pub fn new(retention: RetentionPolicy) -> Self {
        Self {
            calls: Mutex::new(VecDeque::new()),
            retention: Mutex::new(retention),
        }
    }

    /// Create and register a new call.
    pub fn start_call(&self, inputs: CallInputs) -> Arc<Call> {
        let call = Arc::new(Call::new(inputs));
        self.push(Arc::clone(&call));
        call
    }

    /// Register an existing call.
    pub fn push(&self, call: Arc<Call>) {
        let retention = *self.retention.lock();
        let mut calls = self.calls.lock();
        calls.push_back(call);
        if let RetentionPolicy::Bounded(limit) = retention {
            // the newest call always survives
            let limit = limit.max(1);
            while calls.len() > limit {
                if let Some(evicted) = calls.pop_front() {
                    tracing::debug!(call_id = evicted.id(), limit, "Evicted call from history");
                }
            }
        }
    }

    /// Most recent call.
    pub fn last(&self) -> Option<Arc<Call>> {
        self.calls.lock().back().cloned()
    }

    /// Number of retained calls.
    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    /// Whether no call has been recorded.
    pub fn is_empty(&self) -> bool {
        self.calls.lock().is_empty()
    }

    /// Snapshot of retained calls, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = Arc<Call>> {
        self.calls.lock().iter().cloned().collect::<Vec<_>>().into_iter()
    }

    /// Current retention policy.
    pub fn retention(&self) -> RetentionPolicy {
        *self.retention.lock()
    }

    /// Change the retention policy. Excess calls are evicted at the next push.
    pub fn set_retention(&self, retention: RetentionPolicy) {
        *self.retention.lock() = retention;
    }
}
