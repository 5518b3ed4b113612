//! Reask loop with a scripted generation target.
//!
//! Run with:
//! ```bash
//! RUST_LOG=serdes_guard=debug cargo run -p serdes-guard --example reask_loop
//! ```

use serdes_guard::prelude::*;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let guard = Guard::builder()
        .name("short-color")
        .validator(
            ValidatorReference::new("valid-length", "output")
                .with_arg("max", 6)
                .with_on_fail(OnFail::Reask),
        )
        .validator(ValidatorReference::new("lower-case", "output").with_on_fail(OnFail::Fix))
        .prompt("Name a ${kind} color in one word.")
        .build()?;

    println!("{guard}\n");

    let llm = MockLlm::new("scripted")
        .with_response("Ultramarine")
        .with_response("Teal");

    let outcome = guard.call_sync(
        CallOptions::new()
            .with_api(LlmApi::sync(llm.clone()))
            .with_param("kind", "blue")
            .with_num_reasks(2),
    )?;

    for (i, request) in llm.recorded_requests().iter().enumerate() {
        println!("--- round {i} prompt ---\n{}\n", request.prompt.as_deref().unwrap_or(""));
    }

    println!("passed: {}", outcome.validation_passed);
    println!("validated: {:?}", outcome.validated_output);

    if let Some(call) = guard.history().last() {
        for iteration in call.iterations() {
            println!(
                "round {} -> {} ({:?})",
                iteration.index,
                iteration.status(),
                iteration.outputs.raw_output
            );
        }
    }

    Ok(())
}
