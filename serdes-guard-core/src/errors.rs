//! Error types for serdes-guard.
//!
//! Errors fall into a small taxonomy:
//!
//! - **Configuration** errors are raised before any generation attempt.
//! - **Validation** errors are raised only when a validator with the
//!   `exception` policy fails; every other validator failure is recovered
//!   inside the reask loop.
//! - **Generation** errors come from the generation target itself.
//! - **Remote** errors are transport failures talking to the remote service.
//!   An empty remote response is *not* an error; it is a failed outcome.
//! - **Invariant** violations are internal bugs and should abort loudly.

use thiserror::Error;

/// The main error type for serdes-guard operations.
#[derive(Debug, Error)]
pub enum GuardError {
    /// The invocation was misconfigured.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A validator with the `exception` policy failed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The generation target failed.
    #[error(transparent)]
    Generation(#[from] LlmError),

    /// Transport-level failure talking to the remote service.
    #[error("Remote service error: {0}")]
    Remote(String),

    /// Internal invariant violated. This is a bug, not a user error.
    #[error("Invariant violated: {0}")]
    Invariant(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Async runtime error (e.g. sync API used inside a runtime).
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Other error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GuardError {
    /// Create an invariant violation.
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant(message.into())
    }

    /// Create a remote transport error.
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote(message.into())
    }

    /// Create a runtime error.
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime(message.into())
    }

    /// Whether this is an internal invariant violation.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Invariant(_))
    }

    /// Whether this error was raised before any generation attempt.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// Result type alias using GuardError.
pub type Result<T> = std::result::Result<T, GuardError>;

/// Configuration errors, raised synchronously before generation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Neither a generation target nor a precomputed output was supplied.
    #[error("'llm_api' or 'llm_output' must be provided!")]
    MissingTarget,

    /// A generation target was supplied without anything to prompt it with.
    #[error("'prompt' or 'msg_history' must be provided in order to call an LLM!")]
    MissingPrompt,

    /// Validators require metadata keys that were not supplied.
    #[error("Missing required metadata keys: {}", keys.join(", "))]
    MissingMetadata {
        /// Every missing key, in first-seen order.
        keys: Vec<String>,
    },

    /// Operation not allowed for this guard.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Streaming was requested but the target cannot stream.
    #[error("Streaming is not supported by generation target '{0}'")]
    StreamingUnsupported(String),

    /// No factory registered for a validator id.
    #[error("Unknown validator: {0}")]
    UnknownValidator(String),

    /// Validator arguments could not be interpreted.
    #[error("Invalid arguments for validator '{id}': {message}")]
    InvalidValidatorArgs {
        /// Validator id.
        id: String,
        /// What was wrong.
        message: String,
    },

    /// A path locator could not be parsed.
    #[error("Invalid path '{path}': {message}")]
    InvalidPath {
        /// The offending path.
        path: String,
        /// What was wrong.
        message: String,
    },
}

impl ConfigError {
    /// Create a missing-metadata error.
    pub fn missing_metadata<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::MissingMetadata {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Create an invalid-arguments error.
    pub fn invalid_args(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValidatorArgs {
            id: id.into(),
            message: message.into(),
        }
    }

    /// Create an invalid-path error.
    pub fn invalid_path(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Raised when a validator with the `exception` policy fails.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Validation failed for field with errors: {message}")]
pub struct ValidationError {
    /// Validator that failed.
    pub validator: String,
    /// Path of the failing unit.
    pub path: String,
    /// Error message reported by the validator.
    pub message: String,
}

impl ValidationError {
    /// Create a new validation error.
    pub fn new(
        validator: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            validator: validator.into(),
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Error reported by a generation target.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Generation failed: {message}")]
pub struct LlmError {
    /// Error message.
    pub message: String,
    /// Whether the provider considers this transient.
    pub retryable: bool,
}

impl LlmError {
    /// Create a non-retryable generation error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }

    /// Create a transient generation error.
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }
}
