//! `maestro status` — Show configuration and registry status.

use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let orchestrator = super::orchestrator(config_path)?;
    let config = orchestrator.config();
    let status = orchestrator.registry().status();
    let perf = &status.performance_metrics;

    println!("Maestro Status");
    println!("==============");
    println!("  Config:            {}", super::config_path(config_path).display());
    println!("  Tools:             {}", status.total_tools);
    println!("  Available:         {}", status.available_tools);
    println!("  Healthy:           {}", status.healthy_tools);
    let categories: Vec<&str> = status.categories_available.iter().map(|c| c.as_str()).collect();
    println!("  Categories:        {}", categories.join(", "));
    println!(
        "  Executions:        {} ({} ok)",
        perf.total_executions, perf.successful_executions
    );
    println!("  Default timeout:   {}ms", config.registry.default_timeout_ms);
    println!(
        "  Mapping:           {}",
        if config.decision.advanced_mapping { "adaptive" } else { "static table" }
    );
    println!("  Confidence gate:   {:.2}", config.workflow.confidence_threshold);
    println!("  Trace capacity:    {} sessions", orchestrator.tracer().capacity());

    Ok(())
}
