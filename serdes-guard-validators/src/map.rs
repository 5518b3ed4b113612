//! Path-keyed validator map.

use crate::path::JsonPath;
use crate::reference::ValidatorReference;
use crate::registry::ValidatorRegistry;
use crate::validator::BoundValidator;
use indexmap::IndexMap;
use serdes_guard_core::ConfigError;

/// Mapping from path to the ordered validators that apply there.
///
/// Paths only enter the map together with a validator, so no entry is ever
/// empty. Within a path, insertion order is execution order.
#[derive(Debug, Clone, Default)]
pub struct ValidatorMap {
    entries: IndexMap<JsonPath, Vec<BoundValidator>>,
}

impl ValidatorMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a map from references.
    ///
    /// Identical references on the same path are only added once.
    pub fn from_references<'a, I>(
        references: I,
        registry: &ValidatorRegistry,
    ) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = &'a ValidatorReference>,
    {
        let mut map = Self::new();
        for reference in references {
            let (path, bound) = registry.resolve(reference)?;
            if !map.insert(path, bound) {
                tracing::debug!(validator = %reference.id, "Skipping duplicate validator");
            }
        }
        Ok(map)
    }

    /// Append a validator to a path.
    ///
    /// Returns `false` if an interchangeable validator is already there.
    pub fn insert(&mut self, path: JsonPath, validator: BoundValidator) -> bool {
        let entry = self.entries.entry(path).or_default();
        if entry.iter().any(|existing| existing.same_as(&validator)) {
            return false;
        }
        entry.push(validator);
        true
    }

    /// Validators registered on a path.
    pub fn get(&self, path: &JsonPath) -> Option<&[BoundValidator]> {
        self.entries.get(path).map(Vec::as_slice)
    }

    /// Number of paths.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no validator is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of validators across paths.
    pub fn validator_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Paths and validators in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&JsonPath, &[BoundValidator])> {
        self.entries.iter().map(|(p, v)| (p, v.as_slice()))
    }

    /// Paths in the order they are validated: deeper paths first, equal
    /// depths in insertion order.
    pub fn processing_order(&self) -> Vec<(&JsonPath, &[BoundValidator])> {
        let mut order: Vec<_> = self.iter().collect();
        order.sort_by(|a, b| b.0.depth().cmp(&a.0.depth()));
        order
    }

    /// Every required metadata key, in first-seen order, without duplicates.
    pub fn required_metadata_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        for validator in self.entries.values().flatten() {
            for key in validator.validator().required_metadata_keys() {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::{LowerCase, ValidLength};
    use crate::validator::FnValidator;
    use pretty_assertions::assert_eq;
    use serdes_guard_core::{OnFail, ValidationResult};

    fn path(s: &str) -> JsonPath {
        JsonPath::parse(s).unwrap()
    }

    #[test]
    fn test_insertion_order_within_path() {
        let mut map = ValidatorMap::new();
        map.insert(path("$"), BoundValidator::new(ValidLength::max(5), OnFail::Reask));
        map.insert(path("$"), BoundValidator::new(LowerCase, OnFail::Fix));
        let names: Vec<&str> = map.get(&path("$")).unwrap().iter().map(BoundValidator::name).collect();
        assert_eq!(names, vec!["valid-length", "lower-case"]);
    }

    #[test]
    fn test_duplicates_skipped() {
        let refs = vec![
            ValidatorReference::new("valid-length", "$").with_arg("max", 5),
            ValidatorReference::new("valid-length", "output").with_arg("max", 5),
            ValidatorReference::new("valid-length", "$").with_arg("max", 6),
        ];
        let map = ValidatorMap::from_references(&refs, &ValidatorRegistry::default()).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.validator_count(), 2);
    }

    #[test]
    fn test_distinct_closures_kept() {
        let positive = FnValidator::new("check", |value, _| match value.as_i64() {
            Some(n) if n > 0 => ValidationResult::Pass,
            _ => ValidationResult::fail("not positive"),
        });
        let even = FnValidator::new("check", |value, _| match value.as_i64() {
            Some(n) if n % 2 == 0 => ValidationResult::Pass,
            _ => ValidationResult::fail("not even"),
        });
        let mut map = ValidatorMap::new();
        assert!(map.insert(path("$"), BoundValidator::new(positive.clone(), OnFail::Noop)));
        assert!(map.insert(path("$"), BoundValidator::new(even, OnFail::Noop)));
        assert!(!map.insert(path("$"), BoundValidator::new(positive, OnFail::Noop)));
        assert_eq!(map.validator_count(), 2);
    }

    #[test]
    fn test_unknown_reference_fails() {
        let refs = vec![ValidatorReference::new("missing", "$")];
        assert!(ValidatorMap::from_references(&refs, &ValidatorRegistry::default()).is_err());
    }

    #[test]
    fn test_processing_order_deepest_first() {
        let mut map = ValidatorMap::new();
        map.insert(path("$"), BoundValidator::new(LowerCase, OnFail::Noop));
        map.insert(path("$.a"), BoundValidator::new(LowerCase, OnFail::Noop));
        map.insert(path("$.b[*].c"), BoundValidator::new(LowerCase, OnFail::Noop));
        map.insert(path("$.d"), BoundValidator::new(LowerCase, OnFail::Noop));
        let order: Vec<String> = map
            .processing_order()
            .into_iter()
            .map(|(p, _)| p.to_string())
            .collect();
        assert_eq!(order, vec!["$.b[*].c", "$.a", "$.d", "$"]);
    }

    #[test]
    fn test_no_empty_entries() {
        let map = ValidatorMap::from_references(
            &[ValidatorReference::new("lower-case", "$.name")],
            &ValidatorRegistry::default(),
        )
        .unwrap();
        assert!(map.iter().all(|(_, validators)| !validators.is_empty()));
    }
}
