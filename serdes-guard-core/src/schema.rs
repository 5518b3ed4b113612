//! Compiled output schemas.
//!
//! Schemas reach the guard already compiled. This module only carries the
//! shape tag and the JSON schema document used for prompting.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::fmt;

/// Top-level shape of the expected output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputType {
    /// Free-form string.
    #[default]
    String,
    /// JSON object.
    Object,
    /// JSON array.
    List,
}

impl OutputType {
    /// Whether outputs of this type are parsed as JSON.
    pub fn is_structured(&self) -> bool {
        !matches!(self, Self::String)
    }
}

impl fmt::Display for OutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Object => write!(f, "object"),
            Self::List => write!(f, "list"),
        }
    }
}

/// A compiled output schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSchema {
    /// Shape tag.
    pub output_type: OutputType,
    /// JSON schema document.
    pub json_schema: JsonValue,
    /// Optional human description (used for string outputs).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl OutputSchema {
    /// Schema for a plain string.
    pub fn string() -> Self {
        Self {
            output_type: OutputType::String,
            json_schema: json!({"type": "string"}),
            description: None,
        }
    }

    /// Schema for a JSON object.
    pub fn object(json_schema: JsonValue) -> Self {
        Self {
            output_type: OutputType::Object,
            json_schema,
            description: None,
        }
    }

    /// Schema for a JSON array.
    pub fn list(json_schema: JsonValue) -> Self {
        Self {
            output_type: OutputType::List,
            json_schema,
            description: None,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        if let JsonValue::Object(map) = &mut self.json_schema {
            map.insert("description".into(), JsonValue::String(description.clone()));
        }
        self.description = Some(description);
        self
    }

    /// Render the schema for inclusion in a prompt.
    pub fn render(&self) -> String {
        match (self.output_type, &self.description) {
            (OutputType::String, Some(desc)) => desc.clone(),
            _ => serde_json::to_string_pretty(&self.json_schema)
                .unwrap_or_else(|_| self.json_schema.to_string()),
        }
    }
}

impl Default for OutputSchema {
    fn default() -> Self {
        Self::string()
    }
}

/// A Rust type that can describe the structured output it deserializes from.
///
/// Guards built from an `OutputModel` default to full-schema reasks.
pub trait OutputModel: DeserializeOwned {
    /// The compiled schema for this type.
    fn output_schema() -> OutputSchema;

    /// Name recorded on the guard.
    fn model_name() -> &'static str {
        std::any::type_name::<Self>()
    }
}
