//! Folding a remote response into local history.

use crate::client::RemoteService;
use crate::payload::{RemoteReask, RemoteRound, ValidatePayload, ValidationResponse, API_KEY_KWARG};
use chrono::Utc;
use serde_json::Value as JsonValue;
use serdes_guard_core::{
    Call, FailResult, FieldReAsk, GuardError, Inputs, Instructions, Iteration, LlmResponse,
    Outputs, Prompt, Result, ValidationOutcome,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Error reported when the service answers without a result payload.
pub const EMPTY_RESPONSE_MESSAGE: &str = "The response from the server was empty!";

/// Run a call on the remote service and merge what it returns.
///
/// Transport failures are recorded as the call's exception and returned as
/// [`GuardError::Remote`]. An empty answer is a failed outcome, not an error.
pub async fn delegate(
    service: &dyn RemoteService,
    guard_name: &str,
    call: &Arc<Call>,
    provider: Option<&str>,
) -> Result<ValidationOutcome> {
    let payload = ValidatePayload::from_call_inputs(call.inputs(), provider);
    let provider_key = call
        .inputs()
        .kwargs
        .get(API_KEY_KWARG)
        .and_then(JsonValue::as_str);

    let response = match service.validate(guard_name, &payload, provider_key).await {
        Ok(response) => response,
        Err(err) => {
            let err = GuardError::from(err);
            call.set_exception(err.to_string());
            warn!(guard = guard_name, error = %err, "Remote validation failed");
            return Err(err);
        }
    };

    match response {
        Some(response) => merge_response(call, &response),
        None => {
            warn!(guard = guard_name, "Remote service returned no result");
            Ok(empty_response_outcome(call))
        }
    }
}

/// Outcome for a response with no result payload.
pub fn empty_response_outcome(call: &Call) -> ValidationOutcome {
    ValidationOutcome::failed(EMPTY_RESPONSE_MESSAGE).with_call_id(call.id())
}

/// Append the most recent remote session's rounds to `call` and build the
/// outcome from the response fields.
///
/// Rounds beyond the call's retry budget are an invariant violation; the
/// call is then left without merged rounds and marked as errored.
pub fn merge_response(call: &Call, response: &ValidationResponse) -> Result<ValidationOutcome> {
    let base = &call.inputs().inputs;
    let rounds = response
        .session_history
        .iter()
        .flatten()
        .rev()
        .find_map(|session| session.history.as_ref())
        .map_or(&[][..], Vec::as_slice);

    let room = call.max_iterations().saturating_sub(call.iteration_count());
    if rounds.len() > room {
        let err = GuardError::invariant(format!(
            "remote history has {} rounds but the call allows {}",
            rounds.len(),
            call.max_iterations()
        ));
        call.set_exception(err.to_string());
        warn!(call_id = call.id(), error = %err, "Remote history rejected");
        return Err(err);
    }

    for round in rounds {
        let index = call.iteration_count();
        let pushed = call.push_iteration(Iteration::new(
            index,
            round_inputs(base, round),
            round_outputs(round),
            Utc::now(),
        ));
        if let Err(err) = pushed {
            call.set_exception(err.to_string());
            return Err(err);
        }
    }
    debug!(call_id = call.id(), rounds = rounds.len(), "Merged remote history");

    let validated_output = match &response.validated_output {
        None | Some(JsonValue::Null) => None,
        Some(value) => Some(value.clone()),
    };
    Ok(ValidationOutcome {
        call_id: Some(call.id().to_string()),
        raw_llm_output: response.raw_llm_response.clone(),
        validated_output,
        validation_passed: response.result.unwrap_or(false),
        error: None,
        reasks: call.reasks(),
    })
}

fn round_inputs(base: &Inputs, round: &RemoteRound) -> Inputs {
    Inputs {
        prompt: round
            .prompt
            .as_ref()
            .and_then(|p| p.source.clone())
            .map(Prompt::new),
        instructions: round.instructions.clone().map(Instructions::new),
        ..base.clone()
    }
}

fn round_outputs(round: &RemoteRound) -> Outputs {
    Outputs {
        llm_response_info: round.output.clone().map(LlmResponse::new),
        raw_output: round.output.clone(),
        parsed_output: round.parsed_output.clone(),
        validated_output: round.validated_output.clone(),
        reasks: round
            .reasks
            .iter()
            .flatten()
            .map(field_reask)
            .collect(),
        validator_logs: Vec::new(),
        error: None,
    }
}

fn field_reask(reask: &RemoteReask) -> FieldReAsk {
    let mut fail = FailResult::new(reask.error_message.clone().unwrap_or_default());
    fail.fix_value = reask.fix_value.clone();
    FieldReAsk::new(
        reask.incorrect_value.clone().unwrap_or(JsonValue::Null),
        reask.path.clone().unwrap_or_else(|| "$".to_string()),
        vec![fail],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteError;
    use crate::payload::{GuardDescriptor, RemoteCall, RemotePrompt};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use serdes_guard_core::{CallInputs, GuardHistory, Status};
    use std::sync::Mutex;

    fn call(history: &GuardHistory, num_reasks: u32) -> Arc<Call> {
        history.start_call(CallInputs::new(Inputs {
            prompt: Some(Prompt::new("original")),
            num_reasks,
            ..Default::default()
        }))
    }

    fn round(output: &str, reasks: Option<Vec<RemoteReask>>) -> RemoteRound {
        RemoteRound {
            prompt: Some(RemotePrompt {
                source: Some(format!("prompt for {output}")),
            }),
            output: Some(output.into()),
            validated_output: Some(json!(output)),
            reasks,
            ..Default::default()
        }
    }

    #[test]
    fn test_merge_last_session_only() {
        let history = GuardHistory::default();
        let call = call(&history, 1);
        let response = ValidationResponse {
            result: Some(true),
            validated_output: Some(json!("fine")),
            raw_llm_response: Some("fine".into()),
            session_history: Some(vec![
                RemoteCall {
                    history: Some(vec![round("old", None)]),
                },
                RemoteCall {
                    history: Some(vec![
                        round(
                            "toolong",
                            Some(vec![RemoteReask {
                                incorrect_value: Some(json!("toolong")),
                                path: Some("$".into()),
                                error_message: Some("too long".into()),
                                fix_value: Some(json!("toolo")),
                            }]),
                        ),
                        round("fine", None),
                    ]),
                },
            ]),
        };

        let outcome = merge_response(&call, &response).unwrap();

        assert_eq!(call.iteration_count(), 2);
        let iterations = call.iterations();
        assert_eq!(iterations[0].status(), Status::Fail);
        assert_eq!(iterations[0].outputs.reasks[0].fix_value(), Some(&json!("toolo")));
        assert_eq!(
            iterations[1].inputs.prompt,
            Some(Prompt::new("prompt for fine"))
        );
        assert_eq!(iterations[1].inputs.num_reasks, 1);
        assert!(outcome.validation_passed);
        assert_eq!(outcome.validated_output, Some(json!("fine")));
        assert!(outcome.error.is_none());
    }

    #[test]
    fn test_merge_over_budget_merges_nothing() {
        let history = GuardHistory::default();
        let call = call(&history, 0);
        let response = ValidationResponse {
            session_history: Some(vec![RemoteCall {
                history: Some(vec![round("a", None), round("b", None)]),
            }]),
            ..Default::default()
        };
        let err = merge_response(&call, &response).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(call.iteration_count(), 0);
        assert_eq!(call.status(), Status::Error);
        assert_eq!(call.exception(), Some(err.to_string()));
    }

    #[test]
    fn test_merge_without_history() {
        let history = GuardHistory::default();
        let call = call(&history, 1);
        let outcome = merge_response(
            &call,
            &ValidationResponse {
                result: None,
                validated_output: Some(JsonValue::Null),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(call.iteration_count(), 0);
        assert!(!outcome.validation_passed);
        assert!(outcome.validated_output.is_none());
    }

    #[derive(Debug, Default)]
    struct ScriptedService {
        response: Option<ValidationResponse>,
        fail: bool,
        seen: Mutex<Vec<(ValidatePayload, Option<String>)>>,
    }

    #[async_trait]
    impl RemoteService for ScriptedService {
        fn supports(&self, provider: &str) -> bool {
            provider == "openai"
        }

        async fn validate(
            &self,
            _guard_name: &str,
            payload: &ValidatePayload,
            provider_key: Option<&str>,
        ) -> std::result::Result<Option<ValidationResponse>, RemoteError> {
            self.seen
                .lock()
                .unwrap()
                .push((payload.clone(), provider_key.map(str::to_string)));
            if self.fail {
                return Err(RemoteError::http(500, "boom"));
            }
            Ok(self.response.clone())
        }

        async fn upsert_guard(&self, _guard: &GuardDescriptor) -> std::result::Result<(), RemoteError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_delegate_empty_response() {
        let history = GuardHistory::default();
        let call = call(&history, 2);
        let service = ScriptedService::default();

        let outcome = delegate(&service, "g", &call, Some("openai")).await.unwrap();

        assert_eq!(
            outcome,
            ValidationOutcome::failed(EMPTY_RESPONSE_MESSAGE).with_call_id(call.id())
        );
        assert_eq!(call.iteration_count(), 0);
    }

    #[tokio::test]
    async fn test_delegate_forwards_provider_key() {
        let history = GuardHistory::default();
        let mut inputs = CallInputs::new(Inputs {
            prompt: Some(Prompt::new("p")),
            num_reasks: 1,
            ..Default::default()
        });
        inputs.kwargs.insert(API_KEY_KWARG.into(), json!("sk-1"));
        let call = history.start_call(inputs);
        let service = ScriptedService {
            response: Some(ValidationResponse {
                result: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };

        let outcome = delegate(&service, "g", &call, Some("openai")).await.unwrap();
        assert!(outcome.validation_passed);

        let seen = service.seen.lock().unwrap();
        let (payload, key) = &seen[0];
        assert_eq!(key.as_deref(), Some("sk-1"));
        assert!(!payload.kwargs.contains_key(API_KEY_KWARG));
        assert_eq!(payload.llm_api.as_deref(), Some("openai"));
    }

    #[tokio::test]
    async fn test_delegate_transport_error_recorded() {
        let history = GuardHistory::default();
        let call = call(&history, 1);
        let service = ScriptedService {
            fail: true,
            ..Default::default()
        };
        let err = delegate(&service, "g", &call, None).await.unwrap_err();
        assert!(matches!(err, GuardError::Remote(_)));
        assert_eq!(call.status(), Status::Error);
    }
}
