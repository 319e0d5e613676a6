//! `maestro templates` — List workflow templates.

use maestro_workflow::WorkflowEngine;
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)
        .map_err(|e| format!("Failed to load config: {e}"))?;
    let engine = WorkflowEngine::from_config(&config.workflow);

    for name in engine.available_templates() {
        match engine.template(&name) {
            Some(template) if template.name == name => {
                let steps: Vec<&str> = template.steps.iter().map(|s| s.id.as_str()).collect();
                println!("  {name:<20} {}", steps.join(" → "));
            }
            Some(template) => println!("  {name:<20} alias of {}", template.name),
            None => {}
        }
    }
    Ok(())
}
