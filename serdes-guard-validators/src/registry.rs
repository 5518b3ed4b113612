//! Resolution of validator references into runnable validators.

use crate::builtin::{LowerCase, OneLine, RegexMatch, ValidChoices, ValidLength, ValidRange};
use crate::path::JsonPath;
use crate::reference::ValidatorReference;
use crate::validator::{BoundValidator, SharedValidator};
use indexmap::IndexMap;
use serde_json::{Map, Value as JsonValue};
use serdes_guard_core::ConfigError;
use std::fmt;
use std::sync::Arc;

/// Builds a validator from its argument bag.
pub type ValidatorFactory =
    Arc<dyn Fn(&Map<String, JsonValue>) -> Result<SharedValidator, ConfigError> + Send + Sync>;

/// Maps capability ids to factories.
///
/// The default registry knows every built-in validator.
#[derive(Clone)]
pub struct ValidatorRegistry {
    factories: IndexMap<String, ValidatorFactory>,
}

impl ValidatorRegistry {
    /// A registry with no factories.
    pub fn empty() -> Self {
        Self {
            factories: IndexMap::new(),
        }
    }

    /// A registry with every built-in validator registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(ValidLength::ID, |args| {
            Ok(Arc::new(ValidLength::from_args(args)?) as SharedValidator)
        });
        registry.register(RegexMatch::ID, |args| {
            Ok(Arc::new(RegexMatch::from_args(args)?) as SharedValidator)
        });
        registry.register(ValidChoices::ID, |args| {
            Ok(Arc::new(ValidChoices::from_args(args)?) as SharedValidator)
        });
        registry.register(ValidRange::ID, |args| {
            Ok(Arc::new(ValidRange::from_args(args)?) as SharedValidator)
        });
        registry.register(LowerCase::ID, |_| Ok(Arc::new(LowerCase) as SharedValidator));
        registry.register(OneLine::ID, |_| Ok(Arc::new(OneLine) as SharedValidator));
        registry
    }

    /// Register (or replace) a factory.
    pub fn register<F>(&mut self, id: impl Into<String>, factory: F)
    where
        F: Fn(&Map<String, JsonValue>) -> Result<SharedValidator, ConfigError>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(id.into(), Arc::new(factory));
    }

    /// Builder form of [`register`](Self::register).
    #[must_use]
    pub fn with<F>(mut self, id: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&Map<String, JsonValue>) -> Result<SharedValidator, ConfigError>
            + Send
            + Sync
            + 'static,
    {
        self.register(id, factory);
        self
    }

    /// Whether a factory exists for `id`.
    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// Registered ids, in registration order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Build a validator.
    pub fn build(
        &self,
        id: &str,
        args: &Map<String, JsonValue>,
    ) -> Result<SharedValidator, ConfigError> {
        let factory = self
            .factories
            .get(id)
            .ok_or_else(|| ConfigError::UnknownValidator(id.to_string()))?;
        factory(args)
    }

    /// Resolve a reference into its path and bound validator.
    pub fn resolve(
        &self,
        reference: &ValidatorReference,
    ) -> Result<(JsonPath, BoundValidator), ConfigError> {
        let path = reference.path()?;
        let validator = self.build(&reference.id, &reference.kwargs)?;
        Ok((path, BoundValidator::from_shared(validator, reference.on_fail)))
    }
}

impl Default for ValidatorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorRegistry")
            .field("ids", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}
