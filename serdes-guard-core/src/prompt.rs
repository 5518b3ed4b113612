//! Prompts, instructions, and chat messages.
//!
//! Templates use `${name}` placeholders. Substitution is *safe*: a
//! placeholder with no matching parameter is left in place, and `$$`
//! renders a literal `$`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;

/// Prompt parameters keyed by placeholder name.
pub type PromptParams = Map<String, JsonValue>;

/// Substitute `${name}` placeholders in `template`.
///
/// String parameters are inserted verbatim; any other JSON value is
/// inserted in its compact JSON form.
pub fn substitute(template: &str, params: &PromptParams) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos + 1..];

        if let Some(after) = tail.strip_prefix('$') {
            out.push('$');
            rest = after;
            continue;
        }

        if let Some(body) = tail.strip_prefix('{') {
            if let Some(end) = body.find('}') {
                let name = &body[..end];
                if let Some(value) = params.get(name) {
                    match value {
                        JsonValue::String(s) => out.push_str(s),
                        other => out.push_str(&other.to_string()),
                    }
                } else {
                    out.push_str("${");
                    out.push_str(name);
                    out.push('}');
                }
                rest = &body[end + 1..];
                continue;
            }
        }

        out.push('$');
        rest = tail;
    }

    out.push_str(rest);
    out
}

/// Escape `$` so that `text` renders to itself under [`substitute`].
pub fn escape(text: &str) -> String {
    text.replace('$', "$$")
}

/// A prompt template.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Prompt {
    source: String,
}

impl Prompt {
    /// Create a prompt from its template source.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// The raw template source.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Render with the given parameters.
    pub fn format(&self, params: &PromptParams) -> String {
        substitute(&self.source, params)
    }
}

impl From<&str> for Prompt {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Prompt {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Instructions (system prompt) template for chat models.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Instructions {
    source: String,
}

impl Instructions {
    /// Create instructions from their template source.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// The raw template source.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Render with the given parameters.
    pub fn format(&self, params: &PromptParams) -> String {
        substitute(&self.source, params)
    }
}

impl From<&str> for Instructions {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Instructions {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for Instructions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System message.
    System,
    /// User message.
    User,
    /// Assistant message.
    Assistant,
}

/// A chat message in the caller-supplied message history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message role.
    pub role: Role,
    /// Message content (may contain placeholders).
    pub content: String,
}

impl Message {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Render the content with the given parameters.
    pub fn format(&self, params: &PromptParams) -> Self {
        Self {
            role: self.role,
            content: substitute(&self.content, params),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: JsonValue) -> PromptParams {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_substitute_known() {
        let p = params(json!({"name": "Alice", "n": 3}));
        assert_eq!(substitute("Hi ${name}, x${n}", &p), "Hi Alice, x3");
    }

    #[test]
    fn test_substitute_unknown_kept() {
        let p = params(json!({}));
        assert_eq!(substitute("keep ${missing} here", &p), "keep ${missing} here");
    }

    #[test]
    fn test_substitute_escape_and_bare_dollar() {
        let p = params(json!({"x": "1"}));
        assert_eq!(substitute("$$5 and $ alone ${x}", &p), "$5 and $ alone 1");
    }

    #[test]
    fn test_substitute_unterminated() {
        let p = params(json!({"x": "1"}));
        assert_eq!(substitute("broken ${x", &p), "broken ${x");
    }

    #[test]
    fn test_escape_round_trips() {
        let text = "cost: $5 and ${literal}";
        assert_eq!(substitute(&escape(text), &params(json!({"literal": "x"}))), text);
    }

    #[test]
    fn test_prompt_format() {
        let prompt = Prompt::new("Summarize ${doc}");
        let p = params(json!({"doc": "the text"}));
        assert_eq!(prompt.format(&p), "Summarize the text");
        assert_eq!(prompt.source(), "Summarize ${doc}");
    }

    #[test]
    fn test_message_format_keeps_role() {
        let msg = Message::user("Hello ${who}").format(&params(json!({"who": "bob"})));
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello bob");
    }
}
