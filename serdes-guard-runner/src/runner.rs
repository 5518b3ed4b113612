//! The reask loop.
//!
//! Each round generates (or takes the precomputed output on round zero),
//! validates, records an [`Iteration`], and then either stops or builds a
//! corrective round. A call never holds more than `num_reasks + 1`
//! iterations.

use crate::llm::{LlmApi, LlmRequest};
use crate::parse::{parse_output, UNPARSEABLE_MESSAGE};
use crate::reask::{build_reask_inputs, ReaskRequest, ReaskTemplates};
use crate::stream::{AsyncValidationStream, ValidationStream};
use crate::validate::{reask_marker, validate_output};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde_json::{Map, Value as JsonValue};
use serdes_guard_core::{
    Call, ConfigError, FailResult, FieldReAsk, GuardError, Inputs, Iteration, LlmResponse,
    Metadata, OutputSchema, Outputs, PromptParams, Result, ValidationError, ValidationOutcome,
};
use serdes_guard_validators::ValidatorMap;
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument, Span};

/// Drives one call through generate, validate, and reask rounds.
#[derive(Clone)]
pub struct Runner {
    schema: Arc<OutputSchema>,
    validators: Arc<ValidatorMap>,
    api: Option<LlmApi>,
    reask_templates: ReaskTemplates,
    call: Arc<Call>,
    kwargs: Map<String, JsonValue>,
    span: Span,
}

pub(crate) enum Evaluated {
    Checked {
        outputs: Outputs,
        annotated: JsonValue,
        corrections: Vec<FieldReAsk>,
    },
    Aborted { outputs: Outputs, error: ValidationError },
}

enum Step {
    Done,
    Reask(Inputs),
}

impl Runner {
    /// Create a runner for a registered call.
    pub fn new(schema: Arc<OutputSchema>, validators: Arc<ValidatorMap>, call: Arc<Call>) -> Self {
        Self {
            schema,
            validators,
            api: None,
            reask_templates: ReaskTemplates::default(),
            kwargs: call.inputs().kwargs.clone(),
            call,
            span: Span::none(),
        }
    }

    /// Set the generation target.
    #[must_use]
    pub fn with_api(mut self, api: Option<LlmApi>) -> Self {
        self.api = api;
        self
    }

    /// Set the reask templates.
    #[must_use]
    pub fn with_reask_templates(mut self, templates: ReaskTemplates) -> Self {
        self.reask_templates = templates;
        self
    }

    /// Keyword arguments forwarded with every request.
    #[must_use]
    pub fn with_kwargs(mut self, kwargs: Map<String, JsonValue>) -> Self {
        self.kwargs = kwargs;
        self
    }

    /// Record all work under this span.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// The call being driven.
    pub fn call(&self) -> &Arc<Call> {
        &self.call
    }

    pub(crate) fn span(&self) -> &Span {
        &self.span
    }

    /// Run to completion on the calling thread.
    ///
    /// Fails if the generation target is asynchronous.
    pub fn run(&self) -> Result<ValidationOutcome> {
        let _entered = self.span.enter();
        let mut inputs = self.call.inputs().inputs.clone();
        let mut index = 0;
        loop {
            let started = Utc::now();
            let generated = match Self::precomputed(index, &inputs) {
                Some(response) => Ok(response),
                None => self.generate_blocking(&inputs, index),
            };
            let response = self.settle(index, &inputs, started, generated)?;
            match self.complete_round(index, inputs, started, response)? {
                Step::Done => break,
                Step::Reask(next) => {
                    inputs = next;
                    index += 1;
                }
            }
        }
        Ok(ValidationOutcome::from_call(&self.call))
    }

    /// Run to completion, awaiting the generation target.
    pub async fn run_async(&self) -> Result<ValidationOutcome> {
        self.drive_async().instrument(self.span.clone()).await
    }

    async fn drive_async(&self) -> Result<ValidationOutcome> {
        let mut inputs = self.call.inputs().inputs.clone();
        let mut index = 0;
        loop {
            let started = Utc::now();
            let generated = match Self::precomputed(index, &inputs) {
                Some(response) => Ok(response),
                None => self.generate_async(&inputs, index).await,
            };
            let response = self.settle(index, &inputs, started, generated)?;
            match self.complete_round(index, inputs, started, response)? {
                Step::Done => break,
                Step::Reask(next) => {
                    inputs = next;
                    index += 1;
                }
            }
        }
        Ok(ValidationOutcome::from_call(&self.call))
    }

    /// Stream partial outcomes from a blocking target.
    pub fn stream(self) -> Result<ValidationStream> {
        let _entered = self.span.enter();
        let inputs = self.call.inputs().inputs.clone();
        let started = Utc::now();
        let chunks = match &self.api {
            Some(LlmApi::Sync(llm)) => self
                .build_request(&inputs, 0)
                .and_then(|request| llm.stream(&request)),
            Some(LlmApi::Async(llm)) => Err(ConfigError::UnsupportedOperation(format!(
                "generation target '{}' is asynchronous; use the async stream",
                llm.name()
            ))
            .into()),
            None => Err(ConfigError::StreamingUnsupported("llm_output".into()).into()),
        };
        let chunks = self.settle(0, &inputs, started, chunks)?;
        debug!(target_name = self.api_name(), "Streaming started");
        drop(_entered);
        Ok(ValidationStream::new(chunks, self, inputs, started))
    }

    /// Stream partial outcomes, awaiting the target.
    pub async fn stream_async(self) -> Result<AsyncValidationStream> {
        let inputs = self.call.inputs().inputs.clone();
        let started = Utc::now();
        let chunks = match &self.api {
            Some(LlmApi::Async(llm)) => match self.build_request(&inputs, 0) {
                Ok(request) => llm.stream(&request).instrument(self.span.clone()).await,
                Err(e) => Err(e),
            },
            Some(LlmApi::Sync(llm)) => self
                .build_request(&inputs, 0)
                .and_then(|request| llm.stream(&request))
                .map(|iter| futures::stream::iter(iter).boxed()),
            None => Err(ConfigError::StreamingUnsupported("llm_output".into()).into()),
        };
        let chunks = self.settle(0, &inputs, started, chunks)?;
        Ok(AsyncValidationStream::new(chunks, self, inputs, started))
    }

    fn api_name(&self) -> &str {
        self.api.as_ref().map_or("llm_output", LlmApi::name)
    }

    fn precomputed(index: usize, inputs: &Inputs) -> Option<LlmResponse> {
        if index == 0 {
            inputs.llm_output.clone().map(LlmResponse::new)
        } else {
            None
        }
    }

    fn generate_blocking(&self, inputs: &Inputs, index: usize) -> Result<LlmResponse> {
        let request = self.build_request(inputs, index)?;
        match &self.api {
            Some(LlmApi::Sync(llm)) => Ok(llm.generate(&request)?),
            Some(LlmApi::Async(llm)) => Err(ConfigError::UnsupportedOperation(format!(
                "generation target '{}' is asynchronous; use run_async",
                llm.name()
            ))
            .into()),
            None => Err(ConfigError::MissingTarget.into()),
        }
    }

    async fn generate_async(&self, inputs: &Inputs, index: usize) -> Result<LlmResponse> {
        let request = self.build_request(inputs, index)?;
        match &self.api {
            Some(LlmApi::Async(llm)) => Ok(llm.generate(&request).await?),
            Some(LlmApi::Sync(llm)) => Ok(llm.generate(&request)?),
            None => Err(ConfigError::MissingTarget.into()),
        }
    }

    /// Parameters available to templates at generation time.
    pub(crate) fn render_params(&self, base: &PromptParams) -> PromptParams {
        let mut params = base.clone();
        params
            .entry("output_schema")
            .or_insert_with(|| self.schema.render().into());
        params
            .entry("output_type")
            .or_insert_with(|| self.schema.output_type.to_string().into());
        params
    }

    fn build_request(&self, inputs: &Inputs, round: usize) -> Result<LlmRequest> {
        let params = self.render_params(&inputs.prompt_params);
        let prompt = inputs.prompt.as_ref().map(|p| p.format(&params));
        let instructions = inputs.instructions.as_ref().map(|i| i.format(&params));
        let msg_history = inputs
            .msg_history
            .as_ref()
            .map(|history| history.iter().map(|m| m.format(&params)).collect::<Vec<_>>());

        let has_history = msg_history.as_ref().is_some_and(|h| !h.is_empty());
        if prompt.is_none() && !has_history {
            return Err(ConfigError::MissingPrompt.into());
        }

        Ok(LlmRequest {
            prompt,
            instructions,
            msg_history,
            args: self.call.inputs().args.clone(),
            kwargs: self.kwargs.clone(),
            round,
        })
    }

    /// Record a failed generation as an errored iteration and abort the call.
    pub(crate) fn settle<T>(
        &self,
        index: usize,
        inputs: &Inputs,
        started: DateTime<Utc>,
        result: Result<T>,
    ) -> Result<T> {
        let error = match result {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };
        if error.is_fatal() {
            return Err(error);
        }
        let outputs = Outputs {
            error: Some(error.to_string()),
            ..Default::default()
        };
        self.call
            .push_iteration(Iteration::new(index, inputs.clone(), outputs, started))?;
        self.call.set_exception(error.to_string());
        warn!(round = index, error = %error, "Round aborted");
        Err(error)
    }

    /// Parse and validate one response without recording it.
    pub(crate) fn evaluate(&self, response: LlmResponse, metadata: &Metadata) -> Evaluated {
        let raw = response.output.clone();
        let mut outputs = Outputs {
            llm_response_info: Some(response),
            raw_output: Some(raw.clone()),
            ..Default::default()
        };

        let Some(parsed) = parse_output(&raw, self.schema.output_type) else {
            let reask = FieldReAsk::new(
                JsonValue::String(raw),
                "$",
                vec![FailResult::new(UNPARSEABLE_MESSAGE)],
            );
            let annotated = reask_marker(&reask);
            outputs.reasks = vec![reask.clone()];
            return Evaluated::Checked {
                outputs,
                annotated,
                corrections: vec![reask],
            };
        };

        match validate_output(&parsed, &self.validators, metadata) {
            Ok(pass) => {
                outputs.parsed_output = Some(parsed);
                outputs.validated_output = pass.validated;
                outputs.reasks = pass.reasks;
                outputs.validator_logs = pass.logs;
                Evaluated::Checked {
                    outputs,
                    annotated: pass.annotated,
                    corrections: pass.corrections,
                }
            }
            Err((error, logs)) => {
                outputs.parsed_output = Some(parsed);
                outputs.validator_logs = logs;
                outputs.error = Some(error.to_string());
                Evaluated::Aborted { outputs, error }
            }
        }
    }

    /// Record an aborted round and surface the validation error.
    pub(crate) fn abort(
        &self,
        index: usize,
        inputs: Inputs,
        started: DateTime<Utc>,
        outputs: Outputs,
        error: ValidationError,
    ) -> GuardError {
        if let Err(fatal) = self
            .call
            .push_iteration(Iteration::new(index, inputs, outputs, started))
        {
            return fatal;
        }
        self.call.set_exception(error.to_string());
        warn!(
            round = index,
            validator = %error.validator,
            path = %error.path,
            "Validator raised; aborting call"
        );
        error.into()
    }

    fn complete_round(
        &self,
        index: usize,
        inputs: Inputs,
        started: DateTime<Utc>,
        response: LlmResponse,
    ) -> Result<Step> {
        let (outputs, annotated, corrections) = match self.evaluate(response, &inputs.metadata) {
            Evaluated::Checked {
                outputs,
                annotated,
                corrections,
            } => (outputs, annotated, corrections),
            Evaluated::Aborted { outputs, error } => {
                return Err(self.abort(index, inputs, started, outputs, error));
            }
        };

        let iteration = self
            .call
            .push_iteration(Iteration::new(index, inputs, outputs, started))?;
        let blocked = corrections.len();
        debug!(
            round = index,
            reasks = iteration.outputs.reasks.len(),
            blocked,
            status = %iteration.status(),
            "Validation round complete"
        );

        if blocked == 0 {
            return Ok(Step::Done);
        }
        let budget = iteration.inputs.num_reasks as usize;
        if index >= budget {
            warn!(
                rounds = index + 1,
                num_reasks = budget,
                blocked,
                "Reask budget exhausted"
            );
            return Ok(Step::Done);
        }
        if self.api.is_none() {
            info!(blocked, "No generation target; not reasking");
            return Ok(Step::Done);
        }

        let full_schema = iteration.inputs.full_schema_reask;
        let next = build_reask_inputs(
            &iteration.inputs,
            ReaskRequest {
                schema: &self.schema,
                reasks: &corrections,
                annotated: &annotated,
                full_schema,
            },
            &self.reask_templates,
        );
        info!(round = index + 1, blocked, full_schema, "Reasking");
        Ok(Step::Reask(next))
    }
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("call_id", &self.call.id())
            .field("api", &self.api)
            .field("validators", &self.validators.validator_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockLlm;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;
    use serdes_guard_core::{
        CallInputs, GuardHistory, LlmError, OnFail, Prompt, Status,
    };
    use serdes_guard_validators::{BoundValidator, JsonPath, ValidChoices, ValidLength};

    fn length_map(on_fail: OnFail) -> Arc<ValidatorMap> {
        let mut map = ValidatorMap::new();
        map.insert(JsonPath::root(), BoundValidator::new(ValidLength::max(5), on_fail));
        Arc::new(map)
    }

    fn start(history: &GuardHistory, num_reasks: u32, llm_output: Option<&str>) -> Arc<Call> {
        history.start_call(CallInputs::new(Inputs {
            llm_api: Some("mock".into()),
            llm_output: llm_output.map(str::to_string),
            prompt: Some(Prompt::new("Say something short")),
            num_reasks,
            ..Default::default()
        }))
    }

    fn runner(call: Arc<Call>, map: Arc<ValidatorMap>, llm: &MockLlm) -> Runner {
        Runner::new(Arc::new(OutputSchema::string()), map, call)
            .with_api(Some(LlmApi::sync(llm.clone())))
    }

    #[test]
    fn test_scenario_always_too_long() {
        let history = GuardHistory::default();
        let call = start(&history, 2, None);
        let llm = MockLlm::new("mock").always("toolong");

        let outcome = runner(Arc::clone(&call), length_map(OnFail::Reask), &llm)
            .run()
            .unwrap();

        assert_eq!(call.iteration_count(), 3);
        assert_eq!(llm.call_count(), 3);
        assert!(!outcome.validation_passed);
        assert_eq!(outcome.validated_output, Some(json!("toolo")));
        assert_eq!(outcome.raw_llm_output.as_deref(), Some("toolong"));
        assert!(outcome.error.is_none());
        assert_eq!(call.status(), Status::Fail);
    }

    #[test]
    fn test_scenario_passes_first_time() {
        let history = GuardHistory::default();
        let call = start(&history, 2, None);
        let llm = MockLlm::new("mock").with_response("ok");

        let outcome = runner(Arc::clone(&call), length_map(OnFail::Reask), &llm)
            .run()
            .unwrap();

        assert_eq!(call.iteration_count(), 1);
        assert!(outcome.validation_passed);
        assert_eq!(outcome.validated_output, Some(json!("ok")));
    }

    #[rstest]
    #[case(OnFail::Reask)]
    #[case(OnFail::Filter)]
    #[case(OnFail::Noop)]
    fn test_zero_budget_single_iteration(#[case] on_fail: OnFail) {
        let history = GuardHistory::default();
        let call = start(&history, 0, None);
        let llm = MockLlm::new("mock").always("toolong");
        runner(Arc::clone(&call), length_map(on_fail), &llm).run().unwrap();
        assert_eq!(call.iteration_count(), 1);
    }

    #[rstest]
    #[case(OnFail::Filter)]
    #[case(OnFail::Refrain)]
    fn test_blocked_unit_is_reasked(#[case] on_fail: OnFail) {
        let history = GuardHistory::default();
        let call = start(&history, 2, None);
        let llm = MockLlm::new("mock").with_response("toolong").with_response("short");

        let outcome = runner(Arc::clone(&call), length_map(on_fail), &llm)
            .run()
            .unwrap();

        assert_eq!(call.iteration_count(), 2);
        assert_eq!(call.iterations()[0].status(), Status::Fail);
        assert!(call.iterations()[0].outputs.reasks.is_empty());
        assert!(llm.recorded_requests()[1]
            .prompt
            .as_deref()
            .is_some_and(|p| p.contains("toolong")));
        assert!(outcome.validation_passed);
        assert_eq!(outcome.validated_output, Some(json!("short")));
    }

    #[test]
    fn test_reask_then_pass() {
        let history = GuardHistory::default();
        let call = start(&history, 3, None);
        let llm = MockLlm::new("mock").with_response("toolong").with_response("short");

        let outcome = runner(Arc::clone(&call), length_map(OnFail::Reask), &llm)
            .run()
            .unwrap();

        assert!(outcome.validation_passed);
        assert_eq!(outcome.validated_output, Some(json!("short")));
        let iterations = call.iterations();
        assert_eq!(iterations.len(), 2);

        let first = &iterations[0].inputs;
        let second = &iterations[1].inputs;
        assert_ne!(first.prompt, second.prompt);
        assert_eq!(first.msg_history, second.msg_history);
        assert_eq!(first.metadata, second.metadata);
        assert_eq!(first.num_reasks, second.num_reasks);

        let requests = llm.recorded_requests();
        assert_eq!(requests[1].round, 1);
        assert!(requests[1].prompt.as_deref().unwrap().contains("toolong"));
    }

    #[test]
    fn test_kwargs_forwarded_every_round() {
        let history = GuardHistory::default();
        let call = start(&history, 1, None);
        let llm = MockLlm::new("mock").with_response("toolong").with_response("short");
        let mut kwargs = Map::new();
        kwargs.insert("temperature".into(), json!(0.2));

        runner(Arc::clone(&call), length_map(OnFail::Reask), &llm)
            .with_kwargs(kwargs.clone())
            .run()
            .unwrap();

        let requests = llm.recorded_requests();
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|r| r.kwargs == kwargs));
    }

    #[test]
    fn test_precomputed_output_used_once() {
        let history = GuardHistory::default();
        let call = start(&history, 1, Some("toolong"));
        let llm = MockLlm::new("mock").with_response("fine");

        let outcome = runner(Arc::clone(&call), length_map(OnFail::Reask), &llm)
            .run()
            .unwrap();

        assert_eq!(llm.call_count(), 1);
        assert_eq!(call.iteration_count(), 2);
        assert!(outcome.validation_passed);
    }

    #[test]
    fn test_no_target_does_not_reask() {
        let history = GuardHistory::default();
        let call = start(&history, 2, Some("toolong"));
        let outcome = Runner::new(
            Arc::new(OutputSchema::string()),
            length_map(OnFail::Reask),
            Arc::clone(&call),
        )
        .run()
        .unwrap();
        assert_eq!(call.iteration_count(), 1);
        assert!(!outcome.validation_passed);
    }

    #[test]
    fn test_exception_aborts_call() {
        let history = GuardHistory::default();
        let call = start(&history, 2, None);
        let llm = MockLlm::new("mock").always("toolong");

        let err = runner(Arc::clone(&call), length_map(OnFail::Exception), &llm)
            .run()
            .unwrap_err();

        assert!(matches!(err, GuardError::Validation(_)));
        assert_eq!(call.iteration_count(), 1);
        assert_eq!(call.status(), Status::Error);
        assert!(call.exception().is_some());
        let outcome = ValidationOutcome::from_call(&call);
        assert!(!outcome.validation_passed);
        assert!(outcome.error.is_some());
    }

    #[test]
    fn test_generation_error_recorded() {
        let history = GuardHistory::default();
        let call = start(&history, 2, None);
        let llm = MockLlm::new("mock").with_error(LlmError::new("rate limited"));

        let err = runner(Arc::clone(&call), length_map(OnFail::Reask), &llm)
            .run()
            .unwrap_err();

        assert!(matches!(err, GuardError::Generation(_)));
        assert_eq!(call.iteration_count(), 1);
        assert_eq!(call.iterations()[0].status(), Status::Error);
    }

    #[test]
    fn test_structured_unparseable_reasks() {
        let history = GuardHistory::default();
        let call = start(&history, 1, None);
        let llm = MockLlm::new("mock")
            .with_response("I can't do JSON")
            .with_response(r#"{"color": "red"}"#);
        let mut map = ValidatorMap::new();
        map.insert(
            JsonPath::parse("$.color").unwrap(),
            BoundValidator::new(ValidChoices::new(["red", "green"]), OnFail::Reask),
        );
        let schema = OutputSchema::object(json!({
            "type": "object",
            "properties": {"color": {"type": "string"}}
        }));

        let outcome = Runner::new(Arc::new(schema), Arc::new(map), Arc::clone(&call))
            .with_api(Some(LlmApi::sync(llm.clone())))
            .run()
            .unwrap();

        let first = &call.iterations()[0];
        assert_eq!(first.outputs.reasks[0].error_messages(), vec![UNPARSEABLE_MESSAGE]);
        assert!(first.outputs.parsed_output.is_none());
        assert!(outcome.validation_passed);
        assert_eq!(outcome.validated_output, Some(json!({"color": "red"})));

        let reask_request = &llm.recorded_requests()[1];
        assert_eq!(
            reask_request.instructions.as_deref(),
            Some(crate::reask::JSON_REASK_INSTRUCTIONS)
        );
    }

    #[test]
    fn test_missing_prompt_on_generation() {
        let history = GuardHistory::default();
        let call = history.start_call(CallInputs::new(Inputs {
            num_reasks: 0,
            ..Default::default()
        }));
        let llm = MockLlm::new("mock").always("x");
        let err = runner(Arc::clone(&call), length_map(OnFail::Noop), &llm)
            .run()
            .unwrap_err();
        assert!(err.is_config());
        assert_eq!(llm.call_count(), 0);
    }

    #[test]
    fn test_template_params_rendered() {
        let history = GuardHistory::default();
        let mut inputs = Inputs {
            prompt: Some(Prompt::new("Describe ${thing} as ${output_type}")),
            num_reasks: 0,
            ..Default::default()
        };
        inputs.prompt_params.insert("thing".into(), json!("rust"));
        let call = history.start_call(CallInputs::new(inputs));
        let llm = MockLlm::new("mock").always("ok");
        runner(call, length_map(OnFail::Noop), &llm).run().unwrap();
        assert_eq!(
            llm.recorded_requests()[0].prompt.as_deref(),
            Some("Describe rust as string")
        );
    }

    #[tokio::test]
    async fn test_async_matches_sync() {
        let history = GuardHistory::default();
        let call = start(&history, 2, None);
        let llm = MockLlm::new("mock").always("toolong");

        let outcome = Runner::new(
            Arc::new(OutputSchema::string()),
            length_map(OnFail::Reask),
            Arc::clone(&call),
        )
        .with_api(Some(LlmApi::from_async(llm.clone())))
        .run_async()
        .await
        .unwrap();

        assert_eq!(call.iteration_count(), 3);
        assert!(!outcome.validation_passed);
        assert_eq!(outcome.validated_output, Some(json!("toolo")));
    }

    #[test]
    fn test_sync_run_rejects_async_target() {
        let history = GuardHistory::default();
        let call = start(&history, 0, None);
        let llm = MockLlm::new("mock").always("ok");
        let err = Runner::new(
            Arc::new(OutputSchema::string()),
            length_map(OnFail::Noop),
            Arc::clone(&call),
        )
        .with_api(Some(LlmApi::from_async(llm)))
        .run()
        .unwrap_err();
        assert!(err.is_config());
    }
}
