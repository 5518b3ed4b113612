//! Guard construction.

use crate::guard::Guard;
use serdes_guard_core::{
    ExecutionOptions, GuardHistory, Instructions, OutputModel, OutputSchema, Prompt, Result,
    RetentionPolicy,
};
use serdes_guard_remote::{HttpRemoteClient, RemoteService};
use serdes_guard_validators::{ValidatorMap, ValidatorReference, ValidatorRegistry};
use std::sync::Arc;
use tracing::debug;

/// Builder for [`Guard`].
///
/// ```rust
/// use serdes_guard::prelude::*;
///
/// let guard = Guard::builder()
///     .name("short-answers")
///     .validator(
///         ValidatorReference::new("valid-length", "output")
///             .with_arg("max", 5)
///             .with_on_fail(OnFail::Reask),
///     )
///     .num_reasks(2)
///     .build()
///     .unwrap();
/// assert_eq!(guard.validators().validator_count(), 1);
/// ```
pub struct GuardBuilder {
    id: Option<String>,
    name: Option<String>,
    description: Option<String>,
    schema: OutputSchema,
    base_model: Option<String>,
    references: Vec<ValidatorReference>,
    registry: ValidatorRegistry,
    options: ExecutionOptions,
    num_reasks: Option<u32>,
    remote: Option<Arc<dyn RemoteService>>,
    retention: RetentionPolicy,
}

impl Default for GuardBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GuardBuilder {
    /// A builder for a plain string guard.
    pub fn new() -> Self {
        Self {
            id: None,
            name: None,
            description: None,
            schema: OutputSchema::string(),
            base_model: None,
            references: Vec::new(),
            registry: ValidatorRegistry::with_builtins(),
            options: ExecutionOptions::default(),
            num_reasks: None,
            remote: None,
            retention: RetentionPolicy::default(),
        }
    }

    /// A guard whose output is a plain string.
    pub fn string() -> Self {
        Self::new()
    }

    /// A guard whose output deserializes into `T`.
    ///
    /// Reasks default to regenerating the whole schema.
    pub fn for_model<T: OutputModel>() -> Self {
        Self {
            schema: T::output_schema(),
            base_model: Some(T::model_name().to_string()),
            ..Self::new()
        }
    }

    /// A guard for an already compiled schema.
    pub fn from_schema(schema: OutputSchema) -> Self {
        Self {
            schema,
            ..Self::new()
        }
    }

    /// Set the id (a random uuid by default).
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the name (`gr-{id}` by default).
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the guard description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Describe the expected string output; rendered as `${output_schema}`.
    #[must_use]
    pub fn output_description(mut self, description: impl Into<String>) -> Self {
        self.schema = self.schema.with_description(description);
        self
    }

    /// Attach a validator reference.
    #[must_use]
    pub fn validator(mut self, reference: ValidatorReference) -> Self {
        self.references.push(reference);
        self
    }

    /// Attach several validator references.
    #[must_use]
    pub fn validators<I>(mut self, references: I) -> Self
    where
        I: IntoIterator<Item = ValidatorReference>,
    {
        self.references.extend(references);
        self
    }

    /// Resolve references through this registry.
    #[must_use]
    pub fn registry(mut self, registry: ValidatorRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Default prompt.
    #[must_use]
    pub fn prompt(mut self, prompt: impl Into<Prompt>) -> Self {
        self.options.prompt = Some(prompt.into());
        self
    }

    /// Default instructions.
    #[must_use]
    pub fn instructions(mut self, instructions: impl Into<Instructions>) -> Self {
        self.options.instructions = Some(instructions.into());
        self
    }

    /// Default reask prompt.
    #[must_use]
    pub fn reask_prompt(mut self, prompt: impl Into<Prompt>) -> Self {
        self.options.reask_prompt = Some(prompt.into());
        self
    }

    /// Default reask instructions.
    #[must_use]
    pub fn reask_instructions(mut self, instructions: impl Into<Instructions>) -> Self {
        self.options.reask_instructions = Some(instructions.into());
        self
    }

    /// Replace all execution defaults.
    #[must_use]
    pub fn options(mut self, options: ExecutionOptions) -> Self {
        self.options = options;
        self
    }

    /// Default retry budget.
    #[must_use]
    pub fn num_reasks(mut self, num_reasks: u32) -> Self {
        self.num_reasks = Some(num_reasks);
        self
    }

    /// Delegate supported calls to a remote service.
    #[must_use]
    pub fn remote(mut self, service: impl RemoteService + 'static) -> Self {
        self.remote = Some(Arc::new(service));
        self
    }

    /// Delegate to the service configured in the environment, if any.
    #[must_use]
    pub fn remote_from_env(mut self) -> Self {
        match HttpRemoteClient::from_env() {
            Ok(client) => self.remote = Some(Arc::new(client)),
            Err(e) => debug!(error = %e, "Remote delegation disabled"),
        }
        self
    }

    /// History retention.
    #[must_use]
    pub fn retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    /// Resolve validators and build the guard.
    pub fn build(self) -> Result<Guard> {
        let references = self
            .references
            .iter()
            .map(ValidatorReference::normalized)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let validators = ValidatorMap::from_references(&references, &self.registry)?;
        let id = self
            .id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let name = self.name.unwrap_or_else(|| format!("gr-{id}"));
        debug!(
            guard = %name,
            output_type = %self.schema.output_type,
            validators = validators.validator_count(),
            "Guard built"
        );
        Ok(Guard {
            id,
            name,
            description: self.description,
            schema: Arc::new(self.schema),
            references,
            validators: Arc::new(validators),
            options: self.options,
            num_reasks: self.num_reasks,
            base_model: self.base_model,
            remote: self.remote,
            history: Arc::new(GuardHistory::new(self.retention)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;
    use serde_json::json;
    use serdes_guard_core::{ConfigError, GuardError, OutputType};

    #[derive(Debug, Deserialize)]
    struct Pet {
        #[allow(dead_code)]
        name: String,
    }

    impl OutputModel for Pet {
        fn output_schema() -> OutputSchema {
            OutputSchema::object(json!({
                "type": "object",
                "properties": {"name": {"type": "string"}},
                "required": ["name"]
            }))
        }
    }

    #[test]
    fn test_defaults() {
        let guard = GuardBuilder::new().build().unwrap();
        assert_eq!(guard.name(), format!("gr-{}", guard.id()));
        assert_eq!(guard.schema().output_type, OutputType::String);
        assert!(guard.validators().is_empty());
        assert!(!guard.is_structured_model());
    }

    #[test]
    fn test_for_model() {
        let guard = GuardBuilder::for_model::<Pet>().name("pets").build().unwrap();
        assert_eq!(guard.schema().output_type, OutputType::Object);
        assert!(guard.is_structured_model());
    }

    #[test]
    fn test_references_normalized_and_deduplicated() {
        let reference = ValidatorReference::new("valid-length", "output").with_arg("max", 3);
        let guard = GuardBuilder::string()
            .validators([reference.clone(), reference])
            .build()
            .unwrap();
        assert_eq!(guard.references()[0].on, "$");
        assert_eq!(guard.validators().validator_count(), 1);
    }

    #[test]
    fn test_unknown_validator() {
        let err = GuardBuilder::string()
            .validator(ValidatorReference::new("no-such-thing", "$"))
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            GuardError::Config(ConfigError::UnknownValidator(ref id)) if id == "no-such-thing"
        ));
    }

    #[test]
    fn test_output_description_rendered() {
        let guard = GuardBuilder::string()
            .output_description("A haiku")
            .build()
            .unwrap();
        assert_eq!(guard.schema().render(), "A haiku");
    }
}
