//! Generation targets.
//!
//! A target is either synchronous ([`SyncLlm`]) or asynchronous
//! ([`AsyncLlm`]). The choice is made once, when the target is wrapped in
//! an [`LlmApi`], and never re-inspected at call sites.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use serdes_guard_core::{ConfigError, GuardError, LlmError, LlmResponse, Message};
use std::fmt;
use std::sync::Arc;

/// Fully rendered request handed to a generation target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmRequest {
    /// Rendered prompt.
    pub prompt: Option<String>,
    /// Rendered instructions.
    pub instructions: Option<String>,
    /// Rendered message history.
    pub msg_history: Option<Vec<Message>>,
    /// Positional arguments from the call.
    #[serde(default)]
    pub args: Vec<JsonValue>,
    /// Keyword arguments from the call.
    #[serde(default)]
    pub kwargs: Map<String, JsonValue>,
    /// Zero-based round index.
    pub round: usize,
}

/// Blocking iterator over text chunks.
pub type ChunkIter = Box<dyn Iterator<Item = Result<String, LlmError>> + Send>;

/// Async stream of text chunks.
pub type ChunkStream = BoxStream<'static, Result<String, LlmError>>;

/// A synchronous generation target.
pub trait SyncLlm: Send + Sync {
    /// Target name, recorded in history.
    fn name(&self) -> &str;

    /// Generate a full response.
    fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Generate a response as chunks.
    fn stream(&self, _request: &LlmRequest) -> Result<ChunkIter, GuardError> {
        Err(ConfigError::StreamingUnsupported(self.name().to_string()).into())
    }

    /// Provider id if the remote service can call this target itself.
    fn remote_provider(&self) -> Option<&str> {
        None
    }
}

/// An asynchronous generation target.
#[async_trait]
pub trait AsyncLlm: Send + Sync {
    /// Target name, recorded in history.
    fn name(&self) -> &str;

    /// Generate a full response.
    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Generate a response as chunks.
    async fn stream(&self, _request: &LlmRequest) -> Result<ChunkStream, GuardError> {
        Err(ConfigError::StreamingUnsupported(self.name().to_string()).into())
    }

    /// Provider id if the remote service can call this target itself.
    fn remote_provider(&self) -> Option<&str> {
        None
    }
}

/// A generation target, tagged by calling convention.
#[derive(Clone)]
pub enum LlmApi {
    /// Blocking target.
    Sync(Arc<dyn SyncLlm>),
    /// Async target.
    Async(Arc<dyn AsyncLlm>),
}

impl LlmApi {
    /// Wrap a synchronous target.
    pub fn sync(llm: impl SyncLlm + 'static) -> Self {
        Self::Sync(Arc::new(llm))
    }

    /// Wrap an asynchronous target.
    pub fn from_async(llm: impl AsyncLlm + 'static) -> Self {
        Self::Async(Arc::new(llm))
    }

    /// Target name.
    pub fn name(&self) -> &str {
        match self {
            Self::Sync(llm) => llm.name(),
            Self::Async(llm) => llm.name(),
        }
    }

    /// Whether the target must be awaited.
    pub fn is_async(&self) -> bool {
        matches!(self, Self::Async(_))
    }

    /// Provider id if the remote service supports this target.
    pub fn remote_provider(&self) -> Option<&str> {
        match self {
            Self::Sync(llm) => llm.remote_provider(),
            Self::Async(llm) => llm.remote_provider(),
        }
    }
}

impl fmt::Debug for LlmApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_async() { "Async" } else { "Sync" };
        f.debug_tuple(kind).field(&self.name()).finish()
    }
}
