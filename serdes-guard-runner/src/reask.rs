//! Corrective prompts for reask rounds.
//!
//! Templates may use `${previous_response}`, `${error_messages}`,
//! `${output_schema}` and `${output_type}` in addition to the caller's
//! prompt parameters. The rendered text is stored escaped, so rendering it
//! again at generation time is the identity.

use serde_json::{Map, Value as JsonValue};
use serdes_guard_core::{
    escape, FieldReAsk, Inputs, Instructions, OutputSchema, Prompt, PromptParams,
};
use serdes_guard_validators::{JsonPath, Segment};

/// Default reask prompt for string output.
pub const STRING_REASK_PROMPT: &str = "\
This was a previous response you generated:

======

${previous_response}

======

Generate a new response that corrects your old response such that the following issues are fixed
${error_messages}

Your generated response should satisfy the following properties:
${output_schema}

Don't talk; just go.";

/// Default reask prompt for structured output.
pub const JSON_REASK_PROMPT: &str = "\
I was given the following JSON response, which had problems due to incorrect values.

${previous_response}

Help me correct the incorrect values based on the given error messages.

Given below is a JSON schema that describes the information to extract and the shape to extract it into.

${output_schema}

ONLY return valid JSON of type ${output_type} (no other text is necessary), where each key matches \
a key in the schema. If you are unsure anywhere, enter `null`.";

/// Default reask instructions for structured output.
pub const JSON_REASK_INSTRUCTIONS: &str = "\
You are a helpful assistant only capable of communicating with valid JSON, and no other text.";

/// Reask templates resolved for one call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReaskTemplates {
    /// Prompt template; the built-in default is used when absent.
    pub prompt: Option<Prompt>,
    /// Instructions template; see [`build_reask_inputs`] for fallbacks.
    pub instructions: Option<Instructions>,
}

/// What the next round must correct.
#[derive(Debug, Clone, Copy)]
pub struct ReaskRequest<'a> {
    /// Output schema.
    pub schema: &'a OutputSchema,
    /// Unresolved units from the previous round.
    pub reasks: &'a [FieldReAsk],
    /// Previous output with reask markers in place.
    pub annotated: &'a JsonValue,
    /// Whether to regenerate against the whole schema.
    pub full_schema: bool,
}

/// Build the inputs for a reask round.
///
/// Only prompt and instructions change. Instructions fall back to the
/// built-in JSON instructions for structured output and to the previous
/// round's instructions for strings.
pub fn build_reask_inputs(
    previous: &Inputs,
    request: ReaskRequest<'_>,
    templates: &ReaskTemplates,
) -> Inputs {
    let structured = request.schema.output_type.is_structured();
    let params = reask_params(&previous.prompt_params, request);

    let prompt_template = templates.prompt.clone().unwrap_or_else(|| {
        Prompt::new(if structured {
            JSON_REASK_PROMPT
        } else {
            STRING_REASK_PROMPT
        })
    });
    let prompt = Prompt::new(escape(&prompt_template.format(&params)));

    let instructions = match (&templates.instructions, structured) {
        (Some(template), _) => Some(Instructions::new(escape(&template.format(&params)))),
        (None, true) => Some(Instructions::new(escape(JSON_REASK_INSTRUCTIONS))),
        (None, false) => previous.instructions.clone(),
    };

    previous.for_reask(prompt, instructions)
}

fn reask_params(base: &PromptParams, request: ReaskRequest<'_>) -> PromptParams {
    let ReaskRequest {
        schema,
        reasks,
        annotated,
        full_schema,
    } = request;
    let structured = schema.output_type.is_structured();

    let paths: Vec<JsonPath> = reasks
        .iter()
        .filter_map(|r| JsonPath::parse(&r.path).ok())
        .collect();
    let segments: Vec<&[Segment]> = paths.iter().map(JsonPath::segments).collect();

    let previous_response = if structured {
        let shown = if full_schema {
            annotated.clone()
        } else {
            prune_value(annotated, &segments).unwrap_or_else(|| annotated.clone())
        };
        pretty(&shown)
    } else {
        reasks
            .iter()
            .find(|r| r.path == "$")
            .map_or_else(|| pretty(annotated), |r| plain(&r.incorrect_value))
    };

    let output_schema = if structured && !full_schema {
        let mut pruned = schema.clone();
        pruned.json_schema = prune_schema(&schema.json_schema, &segments);
        pruned.render()
    } else {
        schema.render()
    };

    let error_messages = reasks
        .iter()
        .flat_map(|r| {
            r.error_messages().into_iter().map(move |m| {
                if structured {
                    format!("- {}: {m}", r.path)
                } else {
                    format!("- {m}")
                }
            })
        })
        .collect::<Vec<_>>()
        .join("\n");

    let mut params = base.clone();
    params.insert("previous_response".into(), previous_response.into());
    params.insert("error_messages".into(), error_messages.into());
    params.insert("output_schema".into(), output_schema.into());
    params.insert("output_type".into(), schema.output_type.to_string().into());
    params
}

fn plain(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => pretty(other),
    }
}

fn pretty(value: &JsonValue) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Keep only the branches of `value` that lead to one of `paths`.
pub fn prune_value(value: &JsonValue, paths: &[&[Segment]]) -> Option<JsonValue> {
    if paths.iter().any(|p| p.is_empty()) {
        return Some(value.clone());
    }
    match value {
        JsonValue::Object(map) => {
            let mut kept = Map::new();
            for (key, child) in map {
                let rest = descend(paths, |segment| {
                    matches!(segment, Segment::Key(k) if k == key) || *segment == Segment::Wildcard
                });
                if rest.is_empty() {
                    continue;
                }
                if let Some(pruned) = prune_value(child, &rest) {
                    kept.insert(key.clone(), pruned);
                }
            }
            (!kept.is_empty()).then_some(JsonValue::Object(kept))
        }
        JsonValue::Array(items) => {
            let kept: Vec<JsonValue> = items
                .iter()
                .enumerate()
                .filter_map(|(i, child)| {
                    let rest = descend(paths, |segment| {
                        *segment == Segment::Index(i) || *segment == Segment::Wildcard
                    });
                    if rest.is_empty() {
                        None
                    } else {
                        prune_value(child, &rest)
                    }
                })
                .collect();
            (!kept.is_empty()).then_some(JsonValue::Array(kept))
        }
        _ => None,
    }
}

/// Keep only the parts of a JSON schema that describe `paths`.
pub fn prune_schema(schema: &JsonValue, paths: &[&[Segment]]) -> JsonValue {
    if paths.iter().any(|p| p.is_empty()) {
        return schema.clone();
    }
    let Some(object) = schema.as_object() else {
        return schema.clone();
    };
    let mut out = object.clone();

    if let Some(JsonValue::Object(properties)) = object.get("properties") {
        let mut kept = Map::new();
        for (key, sub_schema) in properties {
            let rest = descend(paths, |segment| {
                matches!(segment, Segment::Key(k) if k == key) || *segment == Segment::Wildcard
            });
            if !rest.is_empty() {
                kept.insert(key.clone(), prune_schema(sub_schema, &rest));
            }
        }
        if let Some(JsonValue::Array(required)) = object.get("required") {
            let required: Vec<JsonValue> = required
                .iter()
                .filter(|r| r.as_str().is_some_and(|name| kept.contains_key(name)))
                .cloned()
                .collect();
            out.insert("required".into(), JsonValue::Array(required));
        }
        out.insert("properties".into(), JsonValue::Object(kept));
    }

    if let Some(items) = object.get("items") {
        let rest = descend(paths, |segment| {
            matches!(segment, Segment::Index(_) | Segment::Wildcard)
        });
        if !rest.is_empty() {
            out.insert("items".into(), prune_schema(items, &rest));
        }
    }

    JsonValue::Object(out)
}

fn descend<'a>(paths: &[&'a [Segment]], matches: impl Fn(&Segment) -> bool) -> Vec<&'a [Segment]> {
    paths
        .iter()
        .filter_map(|p| match p.split_first() {
            Some((head, rest)) if matches(head) => Some(rest),
            _ => None,
        })
        .collect()
}
