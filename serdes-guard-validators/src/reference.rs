//! Declarative validator references.

use crate::path::JsonPath;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use serdes_guard_core::{ConfigError, OnFail};

/// Declarative record of a validator attached to a guard.
///
/// Immutable once attached; the guard keeps its references so the
/// validator map can be rebuilt and the guard described to a remote
/// service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorReference {
    /// Capability id, e.g. `valid-length`.
    pub id: String,
    /// Path the validator applies to.
    pub on: String,
    /// Failure policy.
    #[serde(default)]
    pub on_fail: OnFail,
    /// Validator arguments.
    #[serde(default)]
    pub kwargs: Map<String, JsonValue>,
}

impl ValidatorReference {
    /// Reference a validator on a path with the default policy.
    pub fn new(id: impl Into<String>, on: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            on: on.into(),
            on_fail: OnFail::default(),
            kwargs: Map::new(),
        }
    }

    /// Set the failure policy.
    #[must_use]
    pub fn with_on_fail(mut self, on_fail: OnFail) -> Self {
        self.on_fail = on_fail;
        self
    }

    /// Add an argument.
    #[must_use]
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    /// Parse the applies-to path.
    pub fn path(&self) -> Result<JsonPath, ConfigError> {
        JsonPath::parse(&self.on)
    }

    /// Same reference with the path in canonical form (`output` becomes `$`).
    pub fn normalized(&self) -> Result<Self, ConfigError> {
        Ok(Self {
            on: self.path()?.to_string(),
            ..self.clone()
        })
    }
}
