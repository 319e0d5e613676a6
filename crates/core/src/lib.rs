//! # Maestro Core
//!
//! Domain types, collaborator traits, and error definitions for the Maestro
//! tool-orchestration engine. This crate has **no runtime dependencies** — it
//! defines the model that the registry, decision, workflow and telemetry
//! crates implement against.
//!
//! ## Design Philosophy
//!
//! Every seam that an external collaborator plugs into is a trait here:
//! - [`ToolExecutor`] — the uniform contract every capability provider meets
//! - [`ReasoningSelector`] — chooses a reasoning approach for a request
//! - [`EscalationService`] — retries low-confidence results
//!
//! Implementations live in their respective crates (or outside the
//! workspace entirely), which keeps the dependency graph pointing inward.

pub mod error;
pub mod reasoning;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{CollaboratorError, Error, Result, ToolError, WorkflowError};
pub use reasoning::{
    DecisionContext, EscalationOutcome, EscalationRequest, EscalationService, ReasoningSelector,
    ServiceSelection,
};
pub use tool::{
    ExecutionContext, InstallComplexity, ToolCategory, ToolDefinition, ToolDescriptor,
    ToolExecutor, ToolMetadata, ToolPerformance, ToolPriority, ToolResult, WILDCARD_CAPABILITY,
};
