//! `maestro doctor` — Diagnose configuration and environment.

use maestro_tools::default_registry;
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Maestro Doctor");
    println!("=================\n");

    let mut issues = 0;

    let path = super::config_path(config_path);
    if path.exists() {
        println!("  ✅ Config file found at {}", path.display());
    } else {
        println!("  ⚠️  No config file at {} — using defaults", path.display());
    }

    let config = match super::load_config(config_path) {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  1 issue(s) found. See above for details.");
            return Ok(());
        }
    };

    let registry = default_registry(&config.registry);
    let descriptors = registry.descriptors();
    let available = descriptors.iter().filter(|t| registry.is_available(&t.id)).count();
    if available > 0 {
        println!("  ✅ {available} of {} tools available", descriptors.len());
    } else {
        println!("  ❌ No tools available");
        issues += 1;
    }

    for tool in descriptors.iter().filter(|t| !registry.is_available(&t.id)) {
        if !tool.required_env.is_empty() {
            println!("  ⚠️  {} disabled — set {}", tool.id, tool.required_env.join(", "));
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }
    Ok(())
}
