//! Maestro orchestrator.
//!
//! Wires the tool registry, decision maker, workflow engine and decision
//! tracer into one context object and runs requests through them:
//! resolve a strategy into processing modules, execute the best tool per
//! module, optionally run a multi-step workflow, and trace every stage.

pub mod orchestrator;
pub mod request;

pub use orchestrator::Orchestrator;
pub use request::{ModuleOutcome, OrchestrationRequest, OrchestrationResult};
