//! Strategy selection and pre-flight checks.

use serdes_guard_core::{ConfigError, Inputs};
use serdes_guard_remote::RemoteService;
use serdes_guard_runner::LlmApi;
use serdes_guard_validators::{verify_metadata_requirements, ValidatorMap};
use std::fmt;

/// How an invocation is executed. Chosen once per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// The remote service runs the whole cycle.
    Remote,
    /// Awaited locally.
    Async,
    /// Partial outcomes per chunk.
    Stream,
    /// Blocking on the calling thread.
    Sync,
}

impl Strategy {
    /// Pick the strategy for an invocation.
    ///
    /// Remote delegation wins when a service is configured and supports the
    /// target's provider. Otherwise a streaming request streams, an async
    /// target is awaited, and everything else runs synchronously.
    pub fn select(api: Option<&LlmApi>, stream: bool, remote: Option<&dyn RemoteService>) -> Self {
        let provider = api.and_then(LlmApi::remote_provider);
        if let (Some(service), Some(provider)) = (remote, provider) {
            if service.supports(provider) {
                return Self::Remote;
            }
        }
        if stream {
            Self::Stream
        } else if api.is_some_and(LlmApi::is_async) {
            Self::Async
        } else {
            Self::Sync
        }
    }

    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Async => "async",
            Self::Stream => "stream",
            Self::Sync => "sync",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Checks that must pass before any generation attempt.
pub fn check_preconditions(
    api: Option<&LlmApi>,
    inputs: &Inputs,
    validators: &ValidatorMap,
) -> Result<(), ConfigError> {
    if api.is_none() && inputs.llm_output.is_none() {
        return Err(ConfigError::MissingTarget);
    }
    let has_history = inputs.msg_history.as_ref().is_some_and(|h| !h.is_empty());
    if api.is_some() && inputs.llm_output.is_none() && inputs.prompt.is_none() && !has_history {
        return Err(ConfigError::MissingPrompt);
    }
    verify_metadata_requirements(validators, &inputs.metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;
    use serdes_guard_core::{Message, Prompt};
    use serdes_guard_remote::{HttpRemoteClient, RemoteConfig};
    use serdes_guard_runner::MockLlm;
    use serdes_guard_core::ValidationResult;
    use serdes_guard_validators::{BoundValidator, FnValidator, JsonPath, OnFail};

    fn sync_api() -> LlmApi {
        LlmApi::sync(MockLlm::new("mock"))
    }

    fn remote_api() -> LlmApi {
        LlmApi::sync(MockLlm::new("gpt").with_remote_provider("openai"))
    }

    #[rstest]
    #[case(false, false, Strategy::Sync)]
    #[case(true, false, Strategy::Async)]
    #[case(false, true, Strategy::Stream)]
    #[case(true, true, Strategy::Stream)]
    fn test_local_selection(#[case] is_async: bool, #[case] stream: bool, #[case] expected: Strategy) {
        let api = if is_async {
            LlmApi::from_async(MockLlm::new("mock"))
        } else {
            sync_api()
        };
        assert_eq!(Strategy::select(Some(&api), stream, None), expected);
    }

    #[test]
    fn test_remote_requires_supported_provider() {
        let client = HttpRemoteClient::new(RemoteConfig::new("k"));
        let service: &dyn RemoteService = &client;
        assert_eq!(
            Strategy::select(Some(&remote_api()), false, Some(service)),
            Strategy::Remote
        );
        assert_eq!(
            Strategy::select(Some(&sync_api()), false, Some(service)),
            Strategy::Sync
        );
        assert_eq!(Strategy::select(None, false, Some(service)), Strategy::Sync);
        assert_eq!(
            Strategy::select(Some(&remote_api()), true, Some(service)),
            Strategy::Remote
        );
    }

    #[test]
    fn test_missing_target() {
        let err = check_preconditions(None, &Inputs::default(), &ValidatorMap::new()).unwrap_err();
        assert_eq!(err, ConfigError::MissingTarget);
    }

    #[test]
    fn test_missing_prompt() {
        let api = sync_api();
        let err = check_preconditions(Some(&api), &Inputs::default(), &ValidatorMap::new())
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingPrompt);

        let empty_history = Inputs {
            msg_history: Some(Vec::new()),
            ..Default::default()
        };
        assert!(check_preconditions(Some(&api), &empty_history, &ValidatorMap::new()).is_err());

        let with_history = Inputs {
            msg_history: Some(vec![Message::user("hi")]),
            ..Default::default()
        };
        assert!(check_preconditions(Some(&api), &with_history, &ValidatorMap::new()).is_ok());

        let with_prompt = Inputs {
            prompt: Some(Prompt::new("p")),
            ..Default::default()
        };
        assert!(check_preconditions(Some(&api), &with_prompt, &ValidatorMap::new()).is_ok());
    }

    #[test]
    fn test_missing_metadata_names_every_key() {
        let mut map = ValidatorMap::new();
        map.insert(
            JsonPath::root(),
            BoundValidator::new(
                FnValidator::new("needs-keys", |_, _| ValidationResult::Pass)
                    .requires_metadata(["k1", "k2"]),
                OnFail::Noop,
            ),
        );
        let inputs = Inputs {
            llm_output: Some("x".into()),
            ..Default::default()
        };
        let err = check_preconditions(None, &inputs, &map).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("k1"));
        assert!(message.contains("k2"));

        let mut satisfied = inputs;
        satisfied.metadata.insert("k1".into(), json!(1));
        satisfied.metadata.insert("k2".into(), json!(2));
        assert!(check_preconditions(None, &satisfied, &map).is_ok());
    }
}
