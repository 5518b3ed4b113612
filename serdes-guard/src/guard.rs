//! The guard and its invocation entry points.

use crate::blocking::block_on;
use crate::builder::GuardBuilder;
use crate::context::ExecutionContext;
use crate::options::{CallOptions, GuardSettings};
use crate::response::GuardResponse;
use crate::router::{check_preconditions, Strategy};
use futures::{FutureExt, StreamExt};
use serde_json::Value as JsonValue;
use serdes_guard_core::{
    Call, CallInputs, ConfigError, ExecutionOptions, GuardError, GuardHistory, Inputs,
    OutputSchema, OutputType, Result, ValidationOutcome,
};
use serdes_guard_remote::{delegate, GuardDescriptor, RemoteService};
use serdes_guard_runner::{
    AsyncValidationStream, LlmApi, ReaskTemplates, Runner, ValidationStream,
};
use serdes_guard_validators::{
    BoundValidator, JsonPath, OnFail, SharedValidator, Validator, ValidatorMap, ValidatorReference,
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, Instrument};

/// Error returned by [`Guard::invoke`] when nothing survived validation.
pub const INVOKE_FAILED_MESSAGE: &str =
    "The response from the LLM failed validation! See `guard.history` for more details.";

const DEFAULT_CALL_REASKS: u32 = 1;

/// Validates generative output against a schema and reasks on failure.
///
/// Configuration methods take `&mut self` and run between invocations.
/// Invocations take `&self`; each one owns its [`Call`] and
/// [`ExecutionContext`], so a guard can be shared across threads.
#[derive(Debug)]
pub struct Guard {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) schema: Arc<OutputSchema>,
    pub(crate) references: Vec<ValidatorReference>,
    pub(crate) validators: Arc<ValidatorMap>,
    pub(crate) options: ExecutionOptions,
    pub(crate) num_reasks: Option<u32>,
    pub(crate) base_model: Option<String>,
    pub(crate) remote: Option<Arc<dyn RemoteService>>,
    pub(crate) history: Arc<GuardHistory>,
}

/// A resolved invocation that has not touched history yet.
struct Plan {
    strategy: Strategy,
    api: Option<LlmApi>,
    inputs: CallInputs,
    templates: ReaskTemplates,
}

struct Started {
    call: Arc<Call>,
    context: ExecutionContext,
    runner: Runner,
    provider: Option<String>,
}

impl Guard {
    /// Start building a guard.
    pub fn builder() -> GuardBuilder {
        GuardBuilder::new()
    }

    /// Guard id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Guard name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Guard description.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Output schema.
    pub fn schema(&self) -> &OutputSchema {
        &self.schema
    }

    /// Validator references, in attachment order.
    pub fn references(&self) -> &[ValidatorReference] {
        &self.references
    }

    /// Resolved validator map.
    pub fn validators(&self) -> &ValidatorMap {
        &self.validators
    }

    /// Execution defaults.
    pub fn options(&self) -> &ExecutionOptions {
        &self.options
    }

    /// Configured retry budget, if any.
    pub fn num_reasks(&self) -> Option<u32> {
        self.num_reasks
    }

    /// Whether the guard was built from an [`OutputModel`](serdes_guard_core::OutputModel).
    pub fn is_structured_model(&self) -> bool {
        self.base_model.is_some()
    }

    /// Every call made through this guard.
    pub fn history(&self) -> &GuardHistory {
        &self.history
    }

    /// Apply settings between invocations.
    pub fn configure(&mut self, settings: GuardSettings) -> &mut Self {
        if let Some(num_reasks) = settings.num_reasks {
            self.num_reasks = Some(num_reasks);
        }
        if let Some(retention) = settings.retention {
            self.history.set_retention(retention);
        }
        self
    }

    /// Attach a validator to a path of a string guard.
    ///
    /// `on` accepts `output` as an alias for `$`.
    pub fn use_validator(
        &mut self,
        validator: impl Validator + 'static,
        on_fail: OnFail,
        on: &str,
    ) -> Result<&mut Self> {
        self.attach(Arc::new(validator), on_fail, on)?;
        Ok(self)
    }

    /// Attach several validators to one path of a string guard, in order.
    pub fn use_many<I>(&mut self, validators: I, on: &str) -> Result<&mut Self>
    where
        I: IntoIterator<Item = (SharedValidator, OnFail)>,
    {
        for (validator, on_fail) in validators {
            self.attach(validator, on_fail, on)?;
        }
        Ok(self)
    }

    fn attach(&mut self, validator: SharedValidator, on_fail: OnFail, on: &str) -> Result<()> {
        if self.schema.output_type != OutputType::String {
            return Err(ConfigError::UnsupportedOperation(
                "use_validator is only supported for string output types".into(),
            )
            .into());
        }
        let path = JsonPath::parse(on)?;
        let mut reference =
            ValidatorReference::new(validator.name(), path.to_string()).with_on_fail(on_fail);
        reference.kwargs = validator.args();
        let bound = BoundValidator::from_shared(validator, on_fail);
        if Arc::make_mut(&mut self.validators).insert(path, bound) {
            self.references.push(reference);
        }
        Ok(())
    }

    /// Route an invocation and start it.
    ///
    /// Synchronous strategies run before this returns; async and remote
    /// ones come back as [`GuardResponse::Pending`].
    pub fn call(&self, options: CallOptions) -> Result<GuardResponse> {
        let plan = self.plan(options, DEFAULT_CALL_REASKS)?;
        self.dispatch(plan)
    }

    /// Invoke and block until the outcome is ready.
    pub fn call_sync(&self, options: CallOptions) -> Result<ValidationOutcome> {
        reject_stream(&options, "call_sync")?;
        let plan = self.plan(options, DEFAULT_CALL_REASKS)?;
        self.finish_sync(plan)
    }

    /// Invoke and await the outcome.
    pub async fn call_async(&self, options: CallOptions) -> Result<ValidationOutcome> {
        reject_stream(&options, "call_async")?;
        let plan = self.plan(options, DEFAULT_CALL_REASKS)?;
        self.finish_async(plan).await
    }

    /// Invoke a blocking target and iterate partial outcomes.
    pub fn call_stream(&self, options: CallOptions) -> Result<ValidationStream> {
        let plan = self.plan(options.streaming(), DEFAULT_CALL_REASKS)?;
        reject_remote_stream(plan.strategy)?;
        if plan.api.as_ref().is_some_and(LlmApi::is_async) {
            return Err(ConfigError::UnsupportedOperation(
                "asynchronous generation targets stream through call_stream_async".into(),
            )
            .into());
        }
        self.start(plan).runner.stream()
    }

    /// Invoke and stream partial outcomes asynchronously.
    pub async fn call_stream_async(&self, options: CallOptions) -> Result<AsyncValidationStream> {
        let plan = self.plan(options.streaming(), DEFAULT_CALL_REASKS)?;
        reject_remote_stream(plan.strategy)?;
        self.start(plan).runner.stream_async().await
    }

    /// Validate a precomputed output, reasking through `options.llm_api` if set.
    ///
    /// The retry budget defaults to the guard's, then to 0 without a
    /// generation target and 1 with one.
    pub fn parse(&self, llm_output: impl Into<String>, options: CallOptions) -> Result<ValidationOutcome> {
        reject_stream(&options, "parse")?;
        let default = parse_default_reasks(&options);
        let plan = self.plan(options.with_llm_output(llm_output), default)?;
        self.finish_sync(plan)
    }

    /// Async form of [`parse`](Self::parse).
    pub async fn parse_async(
        &self,
        llm_output: impl Into<String>,
        options: CallOptions,
    ) -> Result<ValidationOutcome> {
        reject_stream(&options, "parse_async")?;
        let default = parse_default_reasks(&options);
        let plan = self.plan(options.with_llm_output(llm_output), default)?;
        self.finish_async(plan).await
    }

    /// Validate text with no generation target.
    pub fn validate(&self, llm_output: impl Into<String>) -> Result<ValidationOutcome> {
        self.parse(llm_output, CallOptions::new())
    }

    /// Validate text and return the validated value as text.
    ///
    /// Structured output is serialized to JSON.
    pub fn invoke(&self, input: &str) -> Result<String> {
        let outcome = self.validate(input)?;
        match outcome.validated_output {
            None | Some(JsonValue::Null) => {
                Err(GuardError::Other(anyhow::anyhow!(INVOKE_FAILED_MESSAGE)))
            }
            Some(JsonValue::String(text)) => Ok(text),
            Some(other) => Ok(serde_json::to_string(&other)?),
        }
    }

    /// What the remote service needs to know about this guard.
    pub fn descriptor(&self) -> GuardDescriptor {
        GuardDescriptor {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            validators: self.references.clone(),
            output_schema: (*self.schema).clone(),
        }
    }

    /// Push this guard's definition to the remote service.
    pub async fn upsert_remote(&self) -> Result<()> {
        let remote = self.remote.as_ref().ok_or_else(no_remote)?;
        remote.upsert_guard(&self.descriptor()).await?;
        debug!(guard = %self.name, "Guard upserted to remote service");
        Ok(())
    }

    /// Blocking form of [`upsert_remote`](Self::upsert_remote).
    pub fn upsert_remote_sync(&self) -> Result<()> {
        block_on("upsert_remote_sync", "upsert_remote", self.upsert_remote())?
    }

    fn plan(&self, options: CallOptions, default_reasks: u32) -> Result<Plan> {
        let CallOptions {
            llm_api,
            llm_output,
            prompt,
            instructions,
            msg_history,
            prompt_params,
            num_reasks,
            metadata,
            full_schema_reask,
            stream,
            reask_prompt,
            reask_instructions,
            args,
            kwargs,
        } = options;

        let inputs = Inputs {
            llm_api: llm_api.as_ref().map(|api| api.name().to_string()),
            llm_output,
            prompt: prompt.or_else(|| self.options.prompt.clone()),
            instructions: instructions.or_else(|| self.options.instructions.clone()),
            msg_history,
            prompt_params,
            num_reasks: num_reasks.or(self.num_reasks).unwrap_or(default_reasks),
            metadata,
            full_schema_reask: full_schema_reask.unwrap_or(self.base_model.is_some()),
            stream,
        };
        check_preconditions(llm_api.as_ref(), &inputs, &self.validators)?;

        let strategy = Strategy::select(llm_api.as_ref(), stream, self.remote.as_deref());
        let templates = ReaskTemplates {
            prompt: reask_prompt.or_else(|| self.options.reask_prompt.clone()),
            instructions: reask_instructions.or_else(|| self.options.reask_instructions.clone()),
        };
        Ok(Plan {
            strategy,
            api: llm_api,
            inputs: CallInputs {
                inputs,
                args,
                kwargs,
            },
            templates,
        })
    }

    fn start(&self, plan: Plan) -> Started {
        let provider = plan
            .api
            .as_ref()
            .and_then(LlmApi::remote_provider)
            .map(str::to_string);
        let call = self.history.start_call(plan.inputs);
        let context = ExecutionContext::new(&self.name, &call, plan.strategy);
        context.span().in_scope(|| {
            debug!(
                num_reasks = call.inputs().num_reasks(),
                target = call.inputs().inputs.llm_api.as_deref().unwrap_or("llm_output"),
                "Call started"
            );
        });
        let runner = Runner::new(
            Arc::clone(&self.schema),
            Arc::clone(&self.validators),
            Arc::clone(&call),
        )
        .with_api(plan.api)
        .with_reask_templates(plan.templates)
        .with_kwargs(context.kwargs().clone())
        .with_span(context.span().clone());
        Started {
            call,
            context,
            runner,
            provider,
        }
    }

    fn dispatch(&self, plan: Plan) -> Result<GuardResponse> {
        let is_async = plan.api.as_ref().is_some_and(LlmApi::is_async);
        let started = self.start(plan);
        match started.context.strategy() {
            Strategy::Remote => Ok(GuardResponse::Pending(self.remote_future(started)?)),
            Strategy::Async => {
                let runner = started.runner;
                Ok(GuardResponse::Pending(
                    async move { runner.run_async().await }.boxed(),
                ))
            }
            Strategy::Stream if is_async => {
                let stream = futures::stream::once(started.runner.stream_async())
                    .flat_map(|opened| match opened {
                        Ok(stream) => stream.boxed(),
                        Err(e) => futures::stream::once(futures::future::ready(Err(e))).boxed(),
                    })
                    .boxed();
                Ok(GuardResponse::AsyncStream(stream))
            }
            Strategy::Stream => Ok(GuardResponse::Stream(started.runner.stream()?)),
            Strategy::Sync => Ok(GuardResponse::Outcome(started.runner.run()?)),
        }
    }

    fn finish_sync(&self, plan: Plan) -> Result<ValidationOutcome> {
        match self.dispatch(plan)? {
            GuardResponse::Outcome(outcome) => Ok(outcome),
            GuardResponse::Pending(future) => block_on("call_sync", "call_async", future)?,
            other => Err(GuardError::invariant(format!(
                "blocking invocation produced a {} response",
                other.kind()
            ))),
        }
    }

    async fn finish_async(&self, plan: Plan) -> Result<ValidationOutcome> {
        let started = self.start(plan);
        match started.context.strategy() {
            Strategy::Remote => self.remote_future(started)?.await,
            _ => started.runner.run_async().await,
        }
    }

    fn remote_future(
        &self,
        started: Started,
    ) -> Result<futures::future::BoxFuture<'static, Result<ValidationOutcome>>> {
        let remote = self.remote.clone().ok_or_else(|| {
            GuardError::invariant("remote strategy selected without a remote service")
        })?;
        let Started {
            call,
            context,
            provider,
            ..
        } = started;
        let span = context.span().clone();
        Ok(async move {
            delegate(remote.as_ref(), context.guard_name(), &call, provider.as_deref()).await
        }
        .instrument(span)
        .boxed())
    }
}

fn parse_default_reasks(options: &CallOptions) -> u32 {
    if options.llm_api.is_some() {
        DEFAULT_CALL_REASKS
    } else {
        0
    }
}

fn reject_stream(options: &CallOptions, method: &str) -> Result<()> {
    if options.stream {
        return Err(ConfigError::UnsupportedOperation(format!(
            "{method} does not stream; use call_stream or call_stream_async"
        ))
        .into());
    }
    Ok(())
}

fn reject_remote_stream(strategy: Strategy) -> Result<()> {
    if strategy == Strategy::Remote {
        return Err(ConfigError::StreamingUnsupported("remote delegation".into()).into());
    }
    Ok(())
}

fn no_remote() -> GuardError {
    ConfigError::UnsupportedOperation("Guard does not have an api client!".into()).into()
}

impl fmt::Display for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let validators: Vec<String> = self
            .validators
            .iter()
            .flat_map(|(path, bound)| bound.iter().map(move |v| format!("{path}: {v}")))
            .collect();
        write!(
            f,
            "Guard(name={}, output_type={}, validators=[{}])",
            self.name,
            self.schema.output_type,
            validators.join(", ")
        )
    }
}
