//! Driving futures from synchronous entry points.

use serdes_guard_core::{GuardError, Result};
use std::future::Future;

/// Run `future` to completion on a private current-thread runtime.
///
/// Refuses to run inside an existing runtime; `async_name` is the method to
/// use there instead.
pub(crate) fn block_on<F: Future>(sync_name: &str, async_name: &str, future: F) -> Result<F::Output> {
    if tokio::runtime::Handle::try_current().is_ok() {
        return Err(GuardError::runtime(format!(
            "{sync_name} cannot be called from async context. Use {async_name} instead."
        )));
    }
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| GuardError::runtime(format!("Failed to create runtime: {e}")))?;
    Ok(runtime.block_on(future))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runs_future() {
        assert_eq!(block_on("f", "f_async", async { 41 + 1 }).unwrap(), 42);
    }

    #[tokio::test]
    async fn test_refuses_inside_runtime() {
        let err = block_on("call_sync", "call_async", async {}).unwrap_err();
        assert!(err.to_string().contains("call_async"));
    }
}
