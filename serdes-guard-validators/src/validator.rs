//! The validator capability.
//!
//! A [`Validator`] checks one unit of content and returns a
//! [`ValidationResult`]. What happens on failure is decided by the
//! [`OnFail`] policy it is bound to, not by the validator itself.

use serde_json::{Map, Value as JsonValue};
use serdes_guard_core::{Metadata, OnFail, ValidationResult};
use std::fmt;
use std::sync::Arc;

/// A runnable validation capability.
///
/// Validation is synchronous and pure: it must not block or perform I/O.
pub trait Validator: Send + Sync + fmt::Debug {
    /// Identifier, e.g. `valid-length`.
    fn name(&self) -> &str;

    /// Arguments the validator was built with.
    fn args(&self) -> Map<String, JsonValue> {
        Map::new()
    }

    /// Metadata keys that must be present when this validator runs.
    fn required_metadata_keys(&self) -> Vec<String> {
        Vec::new()
    }

    /// Identity of a closure-backed check.
    ///
    /// Validators fully described by name and args return `None`.
    fn check_id(&self) -> Option<usize> {
        None
    }

    /// Validate one unit of content.
    fn validate(&self, value: &JsonValue, metadata: &Metadata) -> ValidationResult;
}

/// Shared validator for dynamic dispatch.
pub type SharedValidator = Arc<dyn Validator>;

/// A validator bound to an on-fail policy.
#[derive(Debug, Clone)]
pub struct BoundValidator {
    validator: SharedValidator,
    on_fail: OnFail,
}

impl BoundValidator {
    /// Bind a validator to a policy.
    pub fn new(validator: impl Validator + 'static, on_fail: OnFail) -> Self {
        Self {
            validator: Arc::new(validator),
            on_fail,
        }
    }

    /// Bind an already shared validator.
    pub fn from_shared(validator: SharedValidator, on_fail: OnFail) -> Self {
        Self { validator, on_fail }
    }

    /// Validator name.
    pub fn name(&self) -> &str {
        self.validator.name()
    }

    /// Bound policy.
    pub fn on_fail(&self) -> OnFail {
        self.on_fail
    }

    /// The underlying validator.
    pub fn validator(&self) -> &SharedValidator {
        &self.validator
    }

    /// Run the validator.
    pub fn validate(&self, value: &JsonValue, metadata: &Metadata) -> ValidationResult {
        self.validator.validate(value, metadata)
    }

    /// Whether two bindings are interchangeable.
    ///
    /// Closure validators match only when they share the same closure.
    pub fn same_as(&self, other: &Self) -> bool {
        self.on_fail == other.on_fail
            && self.name() == other.name()
            && self.validator.check_id() == other.validator.check_id()
            && self.validator.args() == other.validator.args()
    }
}

impl fmt::Display for BoundValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args = self.validator.args();
        if args.is_empty() {
            write!(f, "{}(on_fail={})", self.name(), self.on_fail)
        } else {
            write!(
                f,
                "{}({}, on_fail={})",
                self.name(),
                JsonValue::Object(args),
                self.on_fail
            )
        }
    }
}

type CheckFn = dyn Fn(&JsonValue, &Metadata) -> ValidationResult + Send + Sync;

/// A validator backed by a closure.
///
/// ```rust
/// use serdes_guard_validators::FnValidator;
/// use serdes_guard_core::ValidationResult;
///
/// let no_empty = FnValidator::new("not-empty", |value, _meta| {
///     if value.as_str().is_some_and(str::is_empty) {
///         ValidationResult::fail("Value must not be empty")
///     } else {
///         ValidationResult::Pass
///     }
/// });
/// ```
#[derive(Clone)]
pub struct FnValidator {
    name: String,
    required_keys: Vec<String>,
    check: Arc<CheckFn>,
}

impl FnValidator {
    /// Create a validator from a closure.
    pub fn new<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&JsonValue, &Metadata) -> ValidationResult + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            required_keys: Vec::new(),
            check: Arc::new(check),
        }
    }

    /// Declare metadata keys the closure reads.
    #[must_use]
    pub fn requires_metadata<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_keys.extend(keys.into_iter().map(Into::into));
        self
    }
}

impl fmt::Debug for FnValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnValidator")
            .field("name", &self.name)
            .field("required_keys", &self.required_keys)
            .finish()
    }
}

impl Validator for FnValidator {
    fn name(&self) -> &str {
        &self.name
    }

    fn required_metadata_keys(&self) -> Vec<String> {
        self.required_keys.clone()
    }

    fn check_id(&self) -> Option<usize> {
        Some(Arc::as_ptr(&self.check).cast::<()>() as usize)
    }

    fn validate(&self, value: &JsonValue, metadata: &Metadata) -> ValidationResult {
        (self.check)(value, metadata)
    }
}
