//! Streaming validation.
//!
//! A stream makes a single generation round. Each chunk is appended to the
//! text received so far and validated, yielding one partial
//! [`ValidationOutcome`]. When the chunk source is exhausted the full text
//! is recorded as the call's only [`Iteration`](serdes_guard_core::Iteration).
//! Streams are forward-only and must be drained to record that iteration.

use crate::llm::{ChunkIter, ChunkStream};
use crate::runner::{Evaluated, Runner};
use chrono::{DateTime, Utc};
use futures::Stream;
use pin_project_lite::pin_project;
use serdes_guard_core::{
    Call, GuardError, Inputs, Iteration, LlmError, LlmResponse, Result, ValidationOutcome,
};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::debug;

struct StreamState {
    runner: Runner,
    inputs: Inputs,
    started: DateTime<Utc>,
    accumulated: String,
    chunks_seen: usize,
    finished: bool,
}

impl StreamState {
    fn new(runner: Runner, inputs: Inputs, started: DateTime<Utc>) -> Self {
        Self {
            runner,
            inputs,
            started,
            accumulated: String::new(),
            chunks_seen: 0,
            finished: false,
        }
    }

    fn on_chunk(&mut self, chunk: &str) -> Result<ValidationOutcome> {
        let _entered = self.runner.span().enter();
        self.accumulated.push_str(chunk);
        self.chunks_seen += 1;
        debug!(chunk = self.chunks_seen, len = self.accumulated.len(), "Validating chunk");

        let response = LlmResponse::new(self.accumulated.clone());
        match self.runner.evaluate(response, &self.inputs.metadata) {
            Evaluated::Checked {
                outputs,
                corrections,
                ..
            } => Ok(ValidationOutcome {
                call_id: Some(self.runner.call().id().to_string()),
                raw_llm_output: outputs.raw_output,
                validated_output: outputs.validated_output,
                validation_passed: corrections.is_empty(),
                error: None,
                reasks: outputs.reasks,
            }),
            Evaluated::Aborted { outputs, error } => {
                self.finished = true;
                Err(self.runner.abort(0, self.inputs.clone(), self.started, outputs, error))
            }
        }
    }

    fn on_error(&mut self, error: LlmError) -> GuardError {
        self.finished = true;
        let _entered = self.runner.span().enter();
        match self
            .runner
            .settle::<()>(0, &self.inputs, self.started, Err(error.into()))
        {
            Err(e) => e,
            Ok(()) => GuardError::invariant("stream error settled without an error"),
        }
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        let _entered = self.runner.span().enter();
        let response = LlmResponse::new(std::mem::take(&mut self.accumulated));
        let (outputs, error) = match self.runner.evaluate(response, &self.inputs.metadata) {
            Evaluated::Checked { outputs, .. } => (outputs, None),
            Evaluated::Aborted { outputs, error } => (outputs, Some(error)),
        };
        if let Some(error) = error {
            return Err(self.runner.abort(0, self.inputs.clone(), self.started, outputs, error));
        }
        let reasks = outputs.reasks.len();
        self.runner.call().push_iteration(Iteration::new(
            0,
            self.inputs.clone(),
            outputs,
            self.started,
        ))?;
        debug!(chunks = self.chunks_seen, reasks, "Stream drained");
        Ok(())
    }
}

/// Blocking stream of partial outcomes.
pub struct ValidationStream {
    chunks: ChunkIter,
    state: StreamState,
}

impl ValidationStream {
    pub(crate) fn new(chunks: ChunkIter, runner: Runner, inputs: Inputs, started: DateTime<Utc>) -> Self {
        Self {
            chunks,
            state: StreamState::new(runner, inputs, started),
        }
    }

    /// The call this stream records into.
    pub fn call(&self) -> &Arc<Call> {
        self.state.runner.call()
    }

    /// Whether the stream has been drained.
    pub fn is_finished(&self) -> bool {
        self.state.finished
    }
}

impl Iterator for ValidationStream {
    type Item = Result<ValidationOutcome>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state.finished {
            return None;
        }
        match self.chunks.next() {
            Some(Ok(chunk)) => Some(self.state.on_chunk(&chunk)),
            Some(Err(error)) => Some(Err(self.state.on_error(error))),
            None => self.state.finish().err().map(Err),
        }
    }
}

impl std::fmt::Debug for ValidationStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationStream")
            .field("call_id", &self.call().id())
            .field("chunks_seen", &self.state.chunks_seen)
            .field("finished", &self.state.finished)
            .finish()
    }
}

pin_project! {
    /// Async stream of partial outcomes.
    pub struct AsyncValidationStream {
        #[pin]
        chunks: ChunkStream,
        state: StreamState,
    }
}

impl AsyncValidationStream {
    pub(crate) fn new(chunks: ChunkStream, runner: Runner, inputs: Inputs, started: DateTime<Utc>) -> Self {
        Self {
            chunks,
            state: StreamState::new(runner, inputs, started),
        }
    }

    /// The call this stream records into.
    pub fn call(&self) -> &Arc<Call> {
        self.state.runner.call()
    }

    /// Whether the stream has been drained.
    pub fn is_finished(&self) -> bool {
        self.state.finished
    }
}

impl Stream for AsyncValidationStream {
    type Item = Result<ValidationOutcome>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        if this.state.finished {
            return Poll::Ready(None);
        }
        match this.chunks.poll_next(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(chunk))) => Poll::Ready(Some(this.state.on_chunk(&chunk))),
            Poll::Ready(Some(Err(error))) => Poll::Ready(Some(Err(this.state.on_error(error)))),
            Poll::Ready(None) => Poll::Ready(this.state.finish().err().map(Err)),
        }
    }
}

impl std::fmt::Debug for AsyncValidationStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncValidationStream")
            .field("call_id", &self.call().id())
            .field("chunks_seen", &self.state.chunks_seen)
            .field("finished", &self.state.finished)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmApi;
    use crate::mock::MockLlm;
    use futures::StreamExt;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use serdes_guard_core::{CallInputs, GuardHistory, OnFail, OutputSchema, Prompt};
    use serdes_guard_validators::{BoundValidator, JsonPath, ValidLength, ValidatorMap};

    fn setup(history: &GuardHistory, api: LlmApi) -> Runner {
        let call = history.start_call(CallInputs::new(Inputs {
            prompt: Some(Prompt::new("stream please")),
            num_reasks: 2,
            stream: true,
            ..Default::default()
        }));
        let mut map = ValidatorMap::new();
        map.insert(JsonPath::root(), BoundValidator::new(ValidLength::max(8), OnFail::Reask));
        Runner::new(Arc::new(OutputSchema::string()), Arc::new(map), call).with_api(Some(api))
    }

    #[test]
    fn test_three_chunks_three_outcomes() {
        let history = GuardHistory::default();
        let llm = MockLlm::new("mock").with_chunks(["Hel", "lo ", "world"]);
        let stream = setup(&history, LlmApi::sync(llm.clone())).stream().unwrap();
        let call = Arc::clone(stream.call());

        let outcomes: Vec<ValidationOutcome> = stream.map(|o| o.unwrap()).collect();

        assert_eq!(outcomes.len(), 3);
        let raws: Vec<&str> = outcomes
            .iter()
            .map(|o| o.raw_llm_output.as_deref().unwrap())
            .collect();
        assert_eq!(raws, vec!["Hel", "Hello ", "Hello world"]);
        assert!(outcomes[1].validation_passed);
        assert!(!outcomes[2].validation_passed);
        assert_eq!(outcomes[2].validated_output, Some(json!("Hello wo")));

        assert_eq!(llm.chunks_consumed(), 3);
        assert_eq!(call.iteration_count(), 1);
        assert_eq!(call.raw_output().as_deref(), Some("Hello world"));
    }

    #[test]
    fn test_iteration_recorded_only_when_drained() {
        let history = GuardHistory::default();
        let llm = MockLlm::new("mock").with_chunks(["a", "b"]);
        let mut stream = setup(&history, LlmApi::sync(llm.clone())).stream().unwrap();
        assert!(stream.next().is_some());
        assert_eq!(stream.call().iteration_count(), 0);
        assert!(stream.next().is_some());
        assert!(stream.next().is_none());
        assert!(stream.is_finished());
        assert_eq!(stream.call().iteration_count(), 1);
        assert!(stream.next().is_none());
    }

    #[tokio::test]
    async fn test_async_stream() {
        let history = GuardHistory::default();
        let llm = MockLlm::new("mock").with_chunks(["one", "two", "three"]);
        let stream = setup(&history, LlmApi::from_async(llm.clone()))
            .stream_async()
            .await
            .unwrap();
        let call = Arc::clone(stream.call());

        let outcomes: Vec<_> = stream.collect().await;
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(Result::is_ok));
        assert_eq!(llm.chunks_consumed(), 3);
        assert_eq!(call.iteration_count(), 1);
    }

    #[test]
    fn test_stream_without_target_unsupported() {
        let history = GuardHistory::default();
        let call = history.start_call(CallInputs::new(Inputs {
            llm_output: Some("x".into()),
            ..Default::default()
        }));
        let err = Runner::new(Arc::new(OutputSchema::string()), Arc::new(ValidatorMap::new()), call)
            .stream()
            .unwrap_err();
        assert!(err.is_config());
    }
}
