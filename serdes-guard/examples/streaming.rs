//! Partial outcomes while a response streams in.
//!
//! Run with:
//! ```bash
//! cargo run -p serdes-guard --example streaming
//! ```

use serdes_guard::prelude::*;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let guard = Guard::builder()
        .validator(
            ValidatorReference::new("valid-length", "$")
                .with_arg("max", 24)
                .with_on_fail(OnFail::Fix),
        )
        .prompt("Write a short greeting.")
        .build()?;

    let llm = MockLlm::new("scripted").with_chunks(["Hello ", "there, ", "streaming ", "world!"]);
    let stream = guard.call_stream(CallOptions::new().with_api(LlmApi::sync(llm)))?;

    for partial in stream {
        let partial = partial?;
        println!(
            "{:<32} passed={} validated={:?}",
            partial.raw_llm_output.unwrap_or_default(),
            partial.validation_passed,
            partial.validated_output
        );
    }

    Ok(())
}
