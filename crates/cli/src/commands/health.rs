//! `maestro health` — Run tool health checks.

use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let orchestrator = super::orchestrator(config_path)?;
    let mut results: Vec<(String, bool)> = orchestrator
        .registry()
        .run_health_checks()
        .await
        .into_iter()
        .collect();
    results.sort();

    let unhealthy = results.iter().filter(|(_, ok)| !ok).count();
    for (id, healthy) in &results {
        println!("  {} {id}", if *healthy { "✅" } else { "❌" });
    }
    println!();
    println!("  {} checked, {unhealthy} unhealthy", results.len());
    Ok(())
}
