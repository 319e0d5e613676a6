//! Tool registry for Maestro.
//!
//! Holds capability-tagged tools, decides which are available for a
//! request, ranks them, and executes them under a deadline with failure
//! isolation. Rolling per-tool metrics feed back into ranking.
//!
//! The built-in [`catalog`] registers bridges to well-known MCP servers.

pub mod catalog;
pub mod deadline;
pub mod environment;
pub mod metrics;
pub mod registry;
pub mod scoring;

pub use catalog::{McpBridge, mcp_catalog};
pub use deadline::{Deadline, race};
pub use environment::{ConfiguredEnv, Environment, ProcessEnv, StaticEnv};
pub use metrics::ExecutionMetrics;
pub use registry::{
    AggregatePerformance, RegistrySettings, RegistryStatus, ScoredTool, ToolRegistry,
};

use maestro_config::RegistryConfig;

/// Create a registry from config, pre-loaded with the MCP catalog when
/// `load_catalog` is set.
pub fn default_registry(config: &RegistryConfig) -> ToolRegistry {
    let registry = ToolRegistry::from_config(config);
    if config.load_catalog {
        for tool in mcp_catalog() {
            if let Err(e) = registry.register(tool) {
                tracing::warn!(error = %e, "Skipping invalid catalog entry");
            }
        }
    }
    registry
}
