//! Parsing raw output against the schema shape.
//!
//! String schemas take the text as-is. Object and list schemas look for
//! JSON of the declared shape: a fenced code block first, then the first
//! balanced `{..}` or `[..]` in the text, then the whole text.

use serde_json::Value as JsonValue;
use serdes_guard_core::OutputType;

/// Error message recorded when structured output cannot be parsed.
pub const UNPARSEABLE_MESSAGE: &str = "Output is not parseable as JSON";

/// Parse raw text into a value of the declared shape.
///
/// Returns `None` when structured output holds no JSON of that shape.
pub fn parse_output(raw: &str, output_type: OutputType) -> Option<JsonValue> {
    match output_type {
        OutputType::String => Some(JsonValue::String(raw.to_string())),
        OutputType::Object => extract_json(raw, '{', '}', JsonValue::is_object),
        OutputType::List => extract_json(raw, '[', ']', JsonValue::is_array),
    }
}

fn extract_json(
    text: &str,
    open: char,
    close: char,
    shape: fn(&JsonValue) -> bool,
) -> Option<JsonValue> {
    let text = text.trim();
    from_fenced_block(text)
        .filter(shape)
        .or_else(|| find_balanced(text, open, close).filter(shape))
        .or_else(|| serde_json::from_str(text).ok().filter(shape))
}

fn from_fenced_block(text: &str) -> Option<JsonValue> {
    let start = text.find("```")?;
    let rest = &text[start + 3..];
    // skip the language tag, if any
    let body_start = rest.find('\n').map_or(0, |i| i + 1);
    let body = &rest[body_start..];
    let end = body.find("```")?;
    serde_json::from_str(body[..end].trim()).ok()
}

fn find_balanced(text: &str, open: char, close: char) -> Option<JsonValue> {
    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find(open) {
        let start = search_from + offset;
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escape_next = false;

        for (i, c) in text[start..].char_indices() {
            if escape_next {
                escape_next = false;
                continue;
            }
            match c {
                '\\' if in_string => escape_next = true,
                '"' => in_string = !in_string,
                c if c == open && !in_string => depth += 1,
                c if c == close && !in_string => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        let candidate = &text[start..=start + i];
                        if let Ok(value) = serde_json::from_str(candidate) {
                            return Some(value);
                        }
                        break;
                    }
                }
                _ => {}
            }
        }
        search_from = start + open.len_utf8();
    }
    None
}
