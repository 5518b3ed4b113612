//! Scripted generation target for tests and demos.
//!
//! [`MockLlm`] returns queued responses in order and records every request
//! it receives. It implements both [`SyncLlm`] and [`AsyncLlm`], so the same
//! script can drive any strategy.
//!
//! ```rust
//! use serdes_guard_runner::{LlmApi, MockLlm};
//!
//! let llm = MockLlm::new("scripted")
//!     .with_response("toolong")
//!     .with_response("short");
//! let api = LlmApi::sync(llm.clone());
//! assert_eq!(api.name(), "scripted");
//! ```

use crate::llm::{AsyncLlm, ChunkIter, ChunkStream, LlmRequest, SyncLlm};
use async_trait::async_trait;
use parking_lot::Mutex;
use serdes_guard_core::{GuardError, LlmError, LlmResponse};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Scripted {
    Text(String),
    Error(LlmError),
}

/// A scripted generation target.
#[derive(Debug, Clone)]
pub struct MockLlm {
    name: String,
    responses: Arc<Mutex<VecDeque<Scripted>>>,
    fallback: Option<String>,
    chunks: Arc<Mutex<Vec<String>>>,
    chunks_consumed: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<LlmRequest>>>,
    remote_provider: Option<String>,
}

impl MockLlm {
    /// Create a mock with an empty script.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            responses: Arc::new(Mutex::new(VecDeque::new())),
            fallback: None,
            chunks: Arc::new(Mutex::new(Vec::new())),
            chunks_consumed: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
            remote_provider: None,
        }
    }

    /// Queue a text response.
    #[must_use]
    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.responses.lock().push_back(Scripted::Text(text.into()));
        self
    }

    /// Queue a failure.
    #[must_use]
    pub fn with_error(self, error: LlmError) -> Self {
        self.responses.lock().push_back(Scripted::Error(error));
        self
    }

    /// Response returned once the script is exhausted.
    #[must_use]
    pub fn always(mut self, text: impl Into<String>) -> Self {
        self.fallback = Some(text.into());
        self
    }

    /// Chunks yielded when streaming.
    #[must_use]
    pub fn with_chunks<I, S>(self, chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.chunks.lock().extend(chunks.into_iter().map(Into::into));
        self
    }

    /// Advertise support by the remote service under this provider id.
    #[must_use]
    pub fn with_remote_provider(mut self, provider: impl Into<String>) -> Self {
        self.remote_provider = Some(provider.into());
        self
    }

    /// Requests received so far.
    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().clone()
    }

    /// Number of generate calls received.
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Number of stream chunks handed out.
    pub fn chunks_consumed(&self) -> usize {
        self.chunks_consumed.load(Ordering::SeqCst)
    }

    fn next_response(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().push(request.clone());
        match self.responses.lock().pop_front() {
            Some(Scripted::Text(text)) => Ok(LlmResponse::new(text)),
            Some(Scripted::Error(error)) => Err(error),
            None => self
                .fallback
                .clone()
                .map(LlmResponse::new)
                .ok_or_else(|| LlmError::new("mock script exhausted")),
        }
    }

    fn chunk_source(&self, request: &LlmRequest) -> CountingChunks {
        self.requests.lock().push(request.clone());
        CountingChunks {
            chunks: self.chunks.lock().clone().into(),
            consumed: Arc::clone(&self.chunks_consumed),
        }
    }
}

struct CountingChunks {
    chunks: VecDeque<String>,
    consumed: Arc<AtomicUsize>,
}

impl Iterator for CountingChunks {
    type Item = Result<String, LlmError>;

    fn next(&mut self) -> Option<Self::Item> {
        let chunk = self.chunks.pop_front()?;
        self.consumed.fetch_add(1, Ordering::SeqCst);
        Some(Ok(chunk))
    }
}

impl SyncLlm for MockLlm {
    fn name(&self) -> &str {
        &self.name
    }

    fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.next_response(request)
    }

    fn stream(&self, request: &LlmRequest) -> Result<ChunkIter, GuardError> {
        Ok(Box::new(self.chunk_source(request)))
    }

    fn remote_provider(&self) -> Option<&str> {
        self.remote_provider.as_deref()
    }
}

#[async_trait]
impl AsyncLlm for MockLlm {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        yield_once().await;
        self.next_response(request)
    }

    async fn stream(&self, request: &LlmRequest) -> Result<ChunkStream, GuardError> {
        Ok(Box::pin(futures::stream::iter(self.chunk_source(request))))
    }

    fn remote_provider(&self) -> Option<&str> {
        self.remote_provider.as_deref()
    }
}

// Suspend once so async callers observe a real await point.
async fn yield_once() {
    let mut yielded = false;
    futures::future::poll_fn(|cx| {
        if yielded {
            std::task::Poll::Ready(())
        } else {
            yielded = true;
            cx.waker().wake_by_ref();
            std::task::Poll::Pending
        }
    })
    .await;
}
