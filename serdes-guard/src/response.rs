//! What an invocation hands back, per strategy.

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use serdes_guard_core::{Result, ValidationOutcome};
use serdes_guard_runner::ValidationStream;
use std::fmt;

/// Result of [`Guard::call`](crate::Guard::call).
pub enum GuardResponse {
    /// The cycle already ran on the calling thread.
    Outcome(ValidationOutcome),
    /// An async or remote cycle, run when awaited.
    Pending(BoxFuture<'static, Result<ValidationOutcome>>),
    /// Partial outcomes from a blocking target.
    Stream(ValidationStream),
    /// Partial outcomes from an async target.
    AsyncStream(BoxStream<'static, Result<ValidationOutcome>>),
}

impl GuardResponse {
    /// Strategy-neutral name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Outcome(_) => "outcome",
            Self::Pending(_) => "pending",
            Self::Stream(_) => "stream",
            Self::AsyncStream(_) => "async_stream",
        }
    }

    /// Await a single outcome.
    ///
    /// Streams are drained and their last partial outcome returned.
    pub async fn into_outcome(self) -> Result<ValidationOutcome> {
        use futures::StreamExt;
        match self {
            Self::Outcome(outcome) => Ok(outcome),
            Self::Pending(future) => future.await,
            Self::Stream(stream) => last_of(stream),
            Self::AsyncStream(mut stream) => {
                let mut last = None;
                while let Some(item) = stream.next().await {
                    last = Some(item?);
                }
                last.ok_or_else(empty_stream)
            }
        }
    }
}

fn last_of(stream: ValidationStream) -> Result<ValidationOutcome> {
    let mut last = None;
    for item in stream {
        last = Some(item?);
    }
    last.ok_or_else(empty_stream)
}

fn empty_stream() -> serdes_guard_core::GuardError {
    serdes_guard_core::GuardError::runtime("stream produced no outcomes")
}

impl fmt::Debug for GuardResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Outcome(outcome) => f.debug_tuple("Outcome").field(outcome).finish(),
            Self::Stream(stream) => f.debug_tuple("Stream").field(stream).finish(),
            other => f.debug_tuple(other.kind()).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use futures::FutureExt;
    use futures::StreamExt;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_pending_resolves_on_await() {
        let outcome = ValidationOutcome::failed("boom").with_call_id("c1");
        let expected = outcome.clone();
        let response = GuardResponse::Pending(async move { Ok(outcome) }.boxed());
        assert_eq!(response.kind(), "pending");
        assert_eq!(tokio_test::block_on(response.into_outcome()).unwrap(), expected);
    }

    #[test]
    fn test_async_stream_returns_last_item() {
        let items = vec![
            Ok(ValidationOutcome::failed("first")),
            Ok(ValidationOutcome::failed("second")),
        ];
        let response = GuardResponse::AsyncStream(stream::iter(items).boxed());
        let outcome = tokio_test::block_on(response.into_outcome()).unwrap();
        assert_eq!(outcome.error.as_deref(), Some("second"));
    }

    #[test]
    fn test_empty_async_stream_is_an_error() {
        let response = GuardResponse::AsyncStream(stream::empty().boxed());
        assert!(tokio_test::block_on(response.into_outcome()).is_err());
    }

    #[test]
    fn test_debug_names_variant() {
        let response = GuardResponse::AsyncStream(stream::empty().boxed());
        assert_eq!(format!("{response:?}"), "async_stream");
    }
}
