//! One validation pass over parsed output.

use serde_json::{json, Value as JsonValue};
use serdes_guard_core::{
    FailResult, FieldReAsk, Metadata, OnFail, ValidationError, ValidationResult, ValidatorLog,
};
use serdes_guard_validators::{JsonPath, ValidatorMap};

/// Result of validating one parsed output.
#[derive(Debug, Clone, PartialEq)]
pub struct PassResult {
    /// Parsed output after fix, filter, refrain and reask substitutions.
    /// `None` when nothing survived.
    pub validated: Option<JsonValue>,
    /// Parsed output with every blocked unit replaced in place by a marker
    /// carrying its incorrect value and error messages. Nothing is removed,
    /// so concrete paths stay valid. Used to build reask prompts.
    pub annotated: JsonValue,
    /// Units blocked by a `reask` policy.
    pub reasks: Vec<FieldReAsk>,
    /// Every blocked unit (`reask`, `filter` or `refrain`), in order.
    pub corrections: Vec<FieldReAsk>,
    /// Every validator run, in execution order.
    pub logs: Vec<ValidatorLog>,
}

/// Marker inserted into the annotated output for a reask unit.
pub fn reask_marker(reask: &FieldReAsk) -> JsonValue {
    json!({
        "incorrect_value": reask.incorrect_value,
        "error_messages": reask.error_messages(),
    })
}

impl PassResult {
    /// Whether any unit was blocked.
    pub fn failed(&self) -> bool {
        !self.corrections.is_empty()
    }
}

enum Disposition {
    Keep(JsonValue),
    Reask(FieldReAsk),
    Filter(FieldReAsk),
    Refrain(FieldReAsk),
}

/// Run every validator in `map` against `parsed`.
///
/// Deeper paths run before shallower ones. Within a unit, validators run
/// in registration order on the current value; `fix` substitutes and
/// continues, the first blocking failure decides the unit, and an
/// `exception` failure aborts the pass.
pub fn validate_output(
    parsed: &JsonValue,
    map: &ValidatorMap,
    metadata: &Metadata,
) -> Result<PassResult, (ValidationError, Vec<ValidatorLog>)> {
    let mut validated = parsed.clone();
    let mut annotated = parsed.clone();
    let mut reasks = Vec::new();
    let mut corrections = Vec::new();
    let mut logs = Vec::new();

    for (path, validators) in map.processing_order() {
        let mut removals: Vec<JsonPath> = Vec::new();

        for unit in path.resolve(&validated) {
            let Some(original) = unit.get(&validated).cloned() else {
                continue;
            };
            let concrete = unit.to_string();
            let mut value = original.clone();
            let mut blocking: Option<OnFail> = None;
            let mut failures: Vec<FailResult> = Vec::new();

            for bound in validators {
                let result = bound.validate(&value, metadata);
                logs.push(ValidatorLog {
                    validator_name: bound.name().to_string(),
                    path: concrete.clone(),
                    on_fail: bound.on_fail(),
                    value_before_validation: value.clone(),
                    result: result.clone(),
                });
                let ValidationResult::Fail(fail) = result else {
                    continue;
                };

                match bound.on_fail() {
                    OnFail::Exception => {
                        let error =
                            ValidationError::new(bound.name(), concrete, fail.error_message);
                        return Err((error, logs));
                    }
                    OnFail::Fix if blocking.is_none() => {
                        if let Some(fix) = &fail.fix_value {
                            value = fix.clone();
                        }
                    }
                    OnFail::Reask | OnFail::Filter | OnFail::Refrain if blocking.is_none() => {
                        blocking = Some(bound.on_fail());
                        failures.push(fail);
                    }
                    _ if blocking.is_some() => failures.push(fail),
                    _ => {}
                }
            }

            let disposition = match blocking {
                None => Disposition::Keep(value),
                Some(policy) => {
                    let unit_reask = FieldReAsk::new(original.clone(), concrete, failures);
                    match policy {
                        OnFail::Filter => Disposition::Filter(unit_reask),
                        OnFail::Refrain => Disposition::Refrain(unit_reask),
                        _ => Disposition::Reask(unit_reask),
                    }
                }
            };

            match disposition {
                Disposition::Keep(value) => {
                    if value != original {
                        unit.set(&mut validated, value.clone());
                        unit.set(&mut annotated, value);
                    }
                }
                Disposition::Reask(reask) => {
                    match reask.fix_value() {
                        Some(fix) => {
                            unit.set(&mut validated, fix.clone());
                        }
                        None => removals.push(unit.clone()),
                    }
                    unit.set(&mut annotated, reask_marker(&reask));
                    corrections.push(reask.clone());
                    reasks.push(reask);
                }
                Disposition::Filter(filtered) => {
                    removals.push(unit.clone());
                    unit.set(&mut annotated, reask_marker(&filtered));
                    corrections.push(filtered);
                }
                Disposition::Refrain(refrained) => {
                    unit.set(&mut validated, JsonValue::Null);
                    unit.set(&mut annotated, reask_marker(&refrained));
                    corrections.push(refrained);
                }
            }
        }

        // concrete units come out in document order; remove back to front
        for unit in removals.iter().rev() {
            unit.remove(&mut validated);
        }
    }

    let validated = match validated {
        JsonValue::Null => None,
        other => Some(other),
    };
    Ok(PassResult {
        validated,
        annotated,
        reasks,
        corrections,
        logs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serdes_guard_validators::{
        BoundValidator, FnValidator, LowerCase, ValidChoices, ValidLength, ValidRange,
    };

    fn map(entries: Vec<(&str, BoundValidator)>) -> ValidatorMap {
        let mut map = ValidatorMap::new();
        for (path, bound) in entries {
            map.insert(JsonPath::parse(path).unwrap(), bound);
        }
        map
    }

    fn run(value: JsonValue, map: &ValidatorMap) -> PassResult {
        validate_output(&value, map, &Metadata::new()).unwrap()
    }

    #[test]
    fn test_all_pass() {
        let m = map(vec![("$", BoundValidator::new(ValidLength::max(5), OnFail::Reask))]);
        let result = run(json!("ok"), &m);
        assert_eq!(result.validated, Some(json!("ok")));
        assert!(result.reasks.is_empty());
        assert_eq!(result.logs.len(), 1);
    }

    #[test]
    fn test_reask_uses_fix_value() {
        let m = map(vec![("$", BoundValidator::new(ValidLength::max(5), OnFail::Reask))]);
        let result = run(json!("toolong"), &m);
        assert_eq!(result.validated, Some(json!("toolo")));
        assert_eq!(result.reasks.len(), 1);
        assert_eq!(result.reasks[0].path, "$");
        assert_eq!(result.reasks[0].incorrect_value, json!("toolong"));
        assert_eq!(result.annotated["incorrect_value"], json!("toolong"));
    }

    #[test]
    fn test_reask_without_fix_removes_unit() {
        let m = map(vec![(
            "$.color",
            BoundValidator::new(ValidChoices::new(["red"]), OnFail::Reask),
        )]);
        let result = run(json!({"color": "blue", "size": 3}), &m);
        assert_eq!(result.validated, Some(json!({"size": 3})));
        assert_eq!(result.reasks[0].path, "$.color");
        assert_eq!(
            result.annotated["color"]["error_messages"][0],
            json!("Value blue is not in choices [\"red\"].")
        );
    }

    #[test]
    fn test_fix_then_continue() {
        let m = map(vec![
            ("$", BoundValidator::new(LowerCase, OnFail::Fix)),
            ("$", BoundValidator::new(ValidLength::max(3), OnFail::Fix)),
        ]);
        let result = run(json!("HELLO"), &m);
        assert_eq!(result.validated, Some(json!("hel")));
        assert_eq!(result.logs[1].value_before_validation, json!("hello"));
        assert!(result.reasks.is_empty());
    }

    #[test]
    fn test_first_blocking_failure_controls() {
        let m = map(vec![
            ("$", BoundValidator::new(ValidLength::max(2), OnFail::Filter)),
            ("$", BoundValidator::new(LowerCase, OnFail::Reask)),
        ]);
        let result = run(json!("ABC"), &m);
        assert_eq!(result.validated, None);
        assert!(result.reasks.is_empty());
        assert!(result.failed());
        assert_eq!(result.corrections[0].fail_results.len(), 2);
        assert_eq!(result.logs.len(), 2);
    }

    #[test]
    fn test_later_failures_join_reask() {
        let m = map(vec![
            ("$", BoundValidator::new(LowerCase, OnFail::Reask)),
            ("$", BoundValidator::new(ValidLength::max(2), OnFail::Noop)),
        ]);
        let result = run(json!("ABC"), &m);
        assert_eq!(result.reasks.len(), 1);
        assert_eq!(result.reasks[0].fail_results.len(), 2);
        assert_eq!(result.reasks[0].fix_value(), Some(&json!("abc")));
    }

    #[test]
    fn test_filter_list_elements() {
        let m = map(vec![(
            "$[*]",
            BoundValidator::new(ValidRange::new(Some(0.0), None), OnFail::Filter),
        )]);
        let result = run(json!([1, -1, 2, -2]), &m);
        assert_eq!(result.validated, Some(json!([1, 2])));
        assert_eq!(result.annotated.as_array().map(Vec::len), Some(4));
        assert_eq!(result.annotated[1]["incorrect_value"], json!(-1));
        let paths: Vec<&str> = result.corrections.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["$[1]", "$[3]"]);
        assert!(result.reasks.is_empty());
    }

    #[test]
    fn test_filter_keeps_reask_paths_addressable() {
        let m = map(vec![
            (
                "$[*]",
                BoundValidator::new(ValidRange::new(Some(0.0), None), OnFail::Filter),
            ),
            (
                "$[*]",
                BoundValidator::new(ValidRange::new(None, Some(10.0)), OnFail::Reask),
            ),
        ]);
        let result = run(json!([-1, 50, 3]), &m);

        assert_eq!(result.reasks.len(), 1);
        assert_eq!(result.reasks[0].path, "$[1]");
        let unit = JsonPath::parse(&result.reasks[0].path).unwrap();
        assert_eq!(
            unit.get(&result.annotated).map(|m| m["incorrect_value"].clone()),
            Some(json!(50))
        );
        assert_eq!(result.corrections.len(), 2);
    }

    #[test]
    fn test_refrain_nulls_unit() {
        let m = map(vec![(
            "$.age",
            BoundValidator::new(ValidRange::new(Some(0.0), None), OnFail::Refrain),
        )]);
        let result = run(json!({"age": -4}), &m);
        assert_eq!(result.validated, Some(json!({"age": null})));
        assert!(result.failed());
        assert_eq!(result.corrections[0].path, "$.age");
    }

    #[test]
    fn test_exception_aborts() {
        let m = map(vec![("$", BoundValidator::new(ValidLength::max(1), OnFail::Exception))]);
        let (err, logs) = validate_output(&json!("long"), &m, &Metadata::new()).unwrap_err();
        assert_eq!(err.path, "$");
        assert_eq!(err.validator, "valid-length");
        assert_eq!(logs.len(), 1);
    }

    #[test]
    fn test_children_before_parents() {
        let seen = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        let record = |label: &'static str| {
            let seen = std::sync::Arc::clone(&seen);
            FnValidator::new(label, move |_, _| {
                seen.lock().push(label);
                ValidationResult::Pass
            })
        };
        let m = map(vec![
            ("$", BoundValidator::new(record("root"), OnFail::Noop)),
            ("$.a.b", BoundValidator::new(record("deep"), OnFail::Noop)),
            ("$.a", BoundValidator::new(record("mid"), OnFail::Noop)),
        ]);
        run(json!({"a": {"b": 1}}), &m);
        assert_eq!(*seen.lock(), vec!["deep", "mid", "root"]);
    }

    #[test]
    fn test_missing_path_skipped() {
        let m = map(vec![("$.absent", BoundValidator::new(LowerCase, OnFail::Reask))]);
        let result = run(json!({"present": "X"}), &m);
        assert!(result.logs.is_empty());
        assert_eq!(result.validated, Some(json!({"present": "X"})));
    }
}
