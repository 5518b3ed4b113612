//! Per-invocation execution context.

use crate::router::Strategy;
use serde_json::{Map, Value as JsonValue};
use serdes_guard_core::Call;
use tracing::{info_span, Span};

/// State scoped to one invocation.
///
/// Each call builds its own context, so concurrent invocations of one guard
/// never see each other's span or keyword arguments.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    guard_name: String,
    strategy: Strategy,
    kwargs: Map<String, JsonValue>,
    span: Span,
}

impl ExecutionContext {
    /// Open a context for a registered call.
    pub fn new(guard_name: &str, call: &Call, strategy: Strategy) -> Self {
        let span = info_span!(
            "guard_call",
            guard = %guard_name,
            call_id = %call.id(),
            strategy = %strategy,
        );
        Self {
            guard_name: guard_name.to_string(),
            strategy,
            kwargs: call.inputs().kwargs.clone(),
            span,
        }
    }

    /// Guard name.
    pub fn guard_name(&self) -> &str {
        &self.guard_name
    }

    /// Selected strategy.
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Keyword arguments of this call.
    pub fn kwargs(&self) -> &Map<String, JsonValue> {
        &self.kwargs
    }

    /// Span all work for this call is recorded under.
    pub fn span(&self) -> &Span {
        &self.span
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serdes_guard_core::{CallInputs, GuardHistory, Inputs};

    #[test]
    fn test_contexts_are_isolated() {
        let history = GuardHistory::default();
        let mut first = CallInputs::new(Inputs::default());
        first.kwargs.insert("temperature".into(), json!(0.0));
        let mut second = CallInputs::new(Inputs::default());
        second.kwargs.insert("temperature".into(), json!(1.0));

        let a = ExecutionContext::new("g", &history.start_call(first), Strategy::Sync);
        let b = ExecutionContext::new("g", &history.start_call(second), Strategy::Async);

        assert_eq!(a.kwargs().get("temperature"), Some(&json!(0.0)));
        assert_eq!(b.kwargs().get("temperature"), Some(&json!(1.0)));
        assert_eq!(b.strategy(), Strategy::Async);
        assert_eq!(a.guard_name(), "g");
    }
}
