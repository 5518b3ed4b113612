//! JSONPath-like locators into structured output.
//!
//! Supported syntax is deliberately small:
//!
//! - `$` is the whole document (`output` is accepted as an alias)
//! - `.key` or `['key']` selects an object field
//! - `[3]` selects a list element
//! - `[*]` or `.*` fans out over every list element or object value
//!
//! A leading `$` is optional, so `a.b` is the same path as `$.a.b`.

use serde_json::Value as JsonValue;
use serdes_guard_core::ConfigError;
use std::fmt;
use std::str::FromStr;

/// One step of a [`JsonPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Object field.
    Key(String),
    /// List element.
    Index(usize),
    /// Every child.
    Wildcard,
}

/// A parsed path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct JsonPath {
    segments: Vec<Segment>,
}

impl JsonPath {
    /// The root path `$`.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a path string.
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed == "$" || trimmed == "output" {
            return Ok(Self::root());
        }

        let rest = trimmed.strip_prefix('$').unwrap_or(trimmed);
        let invalid = |message: &str| ConfigError::invalid_path(input, message);
        let mut segments = Vec::new();
        let mut chars = rest.char_indices().peekable();
        let mut expect_key = !rest.starts_with('.') && !rest.starts_with('[');

        while let Some(&(_, c)) = chars.peek() {
            if expect_key || c == '.' {
                if c == '.' {
                    chars.next();
                }
                expect_key = false;
                let key_start = chars.peek().map_or(rest.len(), |&(i, _)| i);
                let mut key_end = rest.len();
                while let Some(&(i, ch)) = chars.peek() {
                    if ch == '.' || ch == '[' {
                        key_end = i;
                        break;
                    }
                    chars.next();
                }
                let key = &rest[key_start..key_end];
                match key {
                    "" => return Err(invalid("empty key")),
                    "*" => segments.push(Segment::Wildcard),
                    _ => segments.push(Segment::Key(key.to_string())),
                }
            } else if c == '[' {
                chars.next();
                let body_start = chars.peek().map_or(rest.len(), |&(i, _)| i);
                let mut body_end = None;
                for (i, ch) in chars.by_ref() {
                    if ch == ']' {
                        body_end = Some(i);
                        break;
                    }
                }
                let body_end = body_end.ok_or_else(|| invalid("unterminated '['"))?;
                segments.push(Self::parse_bracket(&rest[body_start..body_end]).ok_or_else(
                    || invalid("bracket must hold an index, '*', or a quoted key"),
                )?);
            } else {
                return Err(invalid("expected '.' or '['"));
            }
        }

        Ok(Self { segments })
    }

    fn parse_bracket(body: &str) -> Option<Segment> {
        let body = body.trim();
        if body == "*" {
            return Some(Segment::Wildcard);
        }
        if let Ok(index) = body.parse::<usize>() {
            return Some(Segment::Index(index));
        }
        let quoted = body
            .strip_prefix('\'')
            .and_then(|b| b.strip_suffix('\''))
            .or_else(|| body.strip_prefix('"').and_then(|b| b.strip_suffix('"')))?;
        Some(Segment::Key(quoted.to_string()))
    }

    /// Path segments.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of segments; the root has depth 0.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Whether this is the root path.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Whether the path contains a wildcard.
    pub fn is_concrete(&self) -> bool {
        !self.segments.contains(&Segment::Wildcard)
    }

    /// Extend the path by one segment.
    #[must_use]
    pub fn child(&self, segment: Segment) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self { segments }
    }

    /// Expand wildcards against a document.
    ///
    /// Returns every concrete path that exists in `root`, in document order.
    pub fn resolve(&self, root: &JsonValue) -> Vec<JsonPath> {
        let mut found = Vec::new();
        Self::expand(root, &self.segments, Self::root(), &mut found);
        found
    }

    fn expand(value: &JsonValue, rest: &[Segment], prefix: JsonPath, out: &mut Vec<JsonPath>) {
        let Some((head, tail)) = rest.split_first() else {
            out.push(prefix);
            return;
        };
        match (head, value) {
            (Segment::Key(key), JsonValue::Object(map)) => {
                if let Some(child) = map.get(key) {
                    Self::expand(child, tail, prefix.child(head.clone()), out);
                }
            }
            (Segment::Index(i), JsonValue::Array(items)) => {
                if let Some(child) = items.get(*i) {
                    Self::expand(child, tail, prefix.child(head.clone()), out);
                }
            }
            (Segment::Wildcard, JsonValue::Array(items)) => {
                for (i, child) in items.iter().enumerate() {
                    Self::expand(child, tail, prefix.child(Segment::Index(i)), out);
                }
            }
            (Segment::Wildcard, JsonValue::Object(map)) => {
                for (key, child) in map {
                    Self::expand(child, tail, prefix.child(Segment::Key(key.clone())), out);
                }
            }
            _ => {}
        }
    }

    /// Value at a concrete path.
    pub fn get<'a>(&self, root: &'a JsonValue) -> Option<&'a JsonValue> {
        self.segments
            .iter()
            .try_fold(root, |value, segment| match (segment, value) {
                (Segment::Key(key), JsonValue::Object(map)) => map.get(key),
                (Segment::Index(i), JsonValue::Array(items)) => items.get(*i),
                _ => None,
            })
    }

    fn get_mut<'a>(segments: &[Segment], root: &'a mut JsonValue) -> Option<&'a mut JsonValue> {
        segments
            .iter()
            .try_fold(root, |value, segment| match (segment, value) {
                (Segment::Key(key), JsonValue::Object(map)) => map.get_mut(key),
                (Segment::Index(i), JsonValue::Array(items)) => items.get_mut(*i),
                _ => None,
            })
    }

    /// Replace the value at a concrete path. Returns `false` if it does not exist.
    pub fn set(&self, root: &mut JsonValue, value: JsonValue) -> bool {
        match Self::get_mut(&self.segments, root) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Remove the value at a concrete path.
    ///
    /// Removing the root replaces the document with null.
    pub fn remove(&self, root: &mut JsonValue) -> Option<JsonValue> {
        let Some((last, parent)) = self.segments.split_last() else {
            return Some(std::mem::take(root));
        };
        match (last, Self::get_mut(parent, root)?) {
            (Segment::Key(key), JsonValue::Object(map)) => map.remove(key),
            (Segment::Index(i), JsonValue::Array(items)) if *i < items.len() => {
                Some(items.remove(*i))
            }
            _ => None,
        }
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for segment in &self.segments {
            match segment {
                Segment::Key(key) if is_plain_key(key) => write!(f, ".{key}")?,
                Segment::Key(key) => write!(f, "['{key}']")?,
                Segment::Index(i) => write!(f, "[{i}]")?,
                Segment::Wildcard => f.write_str("[*]")?,
            }
        }
        Ok(())
    }
}

fn is_plain_key(key: &str) -> bool {
    !key.is_empty()
        && key != "*"
        && key
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
}

impl FromStr for JsonPath {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("$", "$")]
    #[case("output", "$")]
    #[case("", "$")]
    #[case("$.name", "$.name")]
    #[case("name", "$.name")]
    #[case("$.items[0].name", "$.items[0].name")]
    #[case("$.items[*]", "$.items[*]")]
    #[case("$.tags.*", "$.tags[*]")]
    #[case("$['odd key']", "$['odd key']")]
    fn test_parse_and_display(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(JsonPath::parse(input).unwrap().to_string(), expected);
    }

    #[rstest]
    #[case("$.")]
    #[case("$.items[")]
    #[case("$.items[abc]")]
    #[case("$..a")]
    fn test_parse_invalid(#[case] input: &str) {
        assert!(matches!(
            JsonPath::parse(input),
            Err(ConfigError::InvalidPath { .. })
        ));
    }

    #[test]
    fn test_depth() {
        assert_eq!(JsonPath::root().depth(), 0);
        assert_eq!(JsonPath::parse("$.a[*].b").unwrap().depth(), 3);
    }

    #[test]
    fn test_resolve_wildcards() {
        let doc = json!({"items": [{"name": "a"}, {"price": 1}, {"name": "c"}]});
        let paths: Vec<String> = JsonPath::parse("$.items[*].name")
            .unwrap()
            .resolve(&doc)
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(paths, vec!["$.items[0].name", "$.items[2].name"]);
    }

    #[test]
    fn test_resolve_object_wildcard() {
        let doc = json!({"scores": {"x": 1, "y": 2}});
        let paths = JsonPath::parse("$.scores.*").unwrap().resolve(&doc);
        assert_eq!(paths.len(), 2);
    }

    #[test]
    fn test_get_set_remove() {
        let mut doc = json!({"a": {"b": [1, 2, 3]}});
        let path = JsonPath::parse("$.a.b[1]").unwrap();
        assert_eq!(path.get(&doc), Some(&json!(2)));

        assert!(path.set(&mut doc, json!(20)));
        assert_eq!(doc, json!({"a": {"b": [1, 20, 3]}}));

        assert_eq!(path.remove(&mut doc), Some(json!(20)));
        assert_eq!(doc, json!({"a": {"b": [1, 3]}}));

        let key = JsonPath::parse("$.a.b").unwrap();
        key.remove(&mut doc);
        assert_eq!(doc, json!({"a": {}}));
    }

    #[test]
    fn test_remove_root_nulls() {
        let mut doc = json!("text");
        assert_eq!(JsonPath::root().remove(&mut doc), Some(json!("text")));
        assert_eq!(doc, JsonValue::Null);
    }

    #[test]
    fn test_set_missing_is_noop() {
        let mut doc = json!({"a": 1});
        assert!(!JsonPath::parse("$.b.c").unwrap().set(&mut doc, json!(2)));
        assert_eq!(doc, json!({"a": 1}));
    }
}
