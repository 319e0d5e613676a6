//! `maestro tools` — List registered tools.

use maestro_tools::default_registry;
use std::path::Path;

pub async fn run(config_path: Option<&Path>, all: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)
        .map_err(|e| format!("Failed to load config: {e}"))?;
    let registry = default_registry(&config.registry);

    let mut shown = 0;
    for tool in registry.descriptors() {
        let available = registry.is_available(&tool.id);
        if !available && !all {
            continue;
        }
        shown += 1;
        let marker = if available { "✅" } else { "⛔" };
        println!(
            "  {marker} {:<16} {:<13} {:<8} {}",
            tool.id,
            tool.category.as_str(),
            tool.priority.as_str(),
            tool.capabilities.join(", ")
        );
        if !available && !tool.required_env.is_empty() {
            println!("       needs: {}", tool.required_env.join(", "));
        }
    }

    if shown == 0 {
        println!("  No tools available. Use --all to include unavailable tools.");
    }
    Ok(())
}
