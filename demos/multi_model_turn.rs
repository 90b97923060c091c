//! Example: one orchestrated turn against the configured providers
//!
//! Reads `orquesta.toml` (plus `ORQUESTA__*` env overrides) for the
//! provider list, runs a turn, and prints every model's answer alongside
//! the selected one. Requires the providers' API key variables to be set.

use orquesta::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    orquesta::init_tracing();

    let config = EngineConfig::load()?;
    let orchestrator = MultiModelOrchestrator::from_config(config)?;

    let ctx = orchestrator.contexts().create("demo conversation");

    // Slightly more creative sampling for this conversation
    orchestrator.control().update(ctx, Some(0.9), None)?;

    let outcome = orchestrator
        .ask(ctx, "In one sentence, what makes consensus hard?")
        .await?;

    for response in &outcome.responses {
        let status = if response.is_failed() { "failed" } else { "ok" };
        println!(
            "[{status}] {} (confidence {:.2}): {}",
            response.model_name, response.confidence, response.response_text
        );
    }

    println!("\nselected answer ({}):", outcome.answer.model_name);
    println!("{}", outcome.answer.response_text);

    let report = orchestrator.health_report();
    println!(
        "\n{} turns, success rate {:.0}%, p50 {:.0}ms",
        report.metrics.count,
        report.metrics.success_rate * 100.0,
        report.metrics.p50
    );

    Ok(())
}
