//! Structured output validated field by field.
//!
//! Run with:
//! ```bash
//! cargo run -p serdes-guard --example structured_output
//! ```

use serde::Deserialize;
use serde_json::json;
use serdes_guard::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Deserialize)]
struct Ticket {
    title: String,
    priority: String,
    estimate_hours: f64,
}

impl OutputModel for Ticket {
    fn output_schema() -> OutputSchema {
        OutputSchema::object(json!({
            "type": "object",
            "properties": {
                "title": {"type": "string"},
                "priority": {"type": "string", "enum": ["low", "medium", "high"]},
                "estimate_hours": {"type": "number"}
            },
            "required": ["title", "priority", "estimate_hours"]
        }))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let guard = GuardBuilder::for_model::<Ticket>()
        .name("ticket")
        .validators([
            ValidatorReference::new("valid-choices", "$.priority")
                .with_arg("choices", json!(["low", "medium", "high"]))
                .with_on_fail(OnFail::Reask),
            ValidatorReference::new("valid-range", "$.estimate_hours")
                .with_arg("min", 0.5)
                .with_arg("max", 40.0)
                .with_on_fail(OnFail::Fix),
        ])
        .prompt("File a ticket for: ${issue}\n\n${output_schema}")
        .build()?;

    let llm = MockLlm::new("scripted")
        .with_response(r#"Sure! {"title": "Login fails", "priority": "urgent", "estimate_hours": 3}"#)
        .with_response(
            "```json\n{\"title\": \"Login fails\", \"priority\": \"high\", \"estimate_hours\": 120}\n```",
        );

    let outcome = guard
        .call_async(
            CallOptions::new()
                .with_api(LlmApi::from_async(llm))
                .with_param("issue", "users cannot log in after password reset"),
        )
        .await?;

    println!("passed: {}", outcome.validation_passed);
    if let Some(ticket) = outcome.validated_as::<Ticket>()? {
        println!(
            "{} [{}] ~{}h",
            ticket.title, ticket.priority, ticket.estimate_hours
        );
    }

    Ok(())
}
