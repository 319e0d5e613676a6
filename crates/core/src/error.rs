//! Error types for the Maestro domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum.

use thiserror::Error;

/// The top-level error type for all Maestro operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Collaborator errors ---
    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    // --- Workflow errors ---
    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    /// The caller asked for a tool id that was never registered.
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_ms}ms")]
    Timeout { tool_name: String, timeout_ms: u64 },

    #[error("Tool execution cancelled: {0}")]
    Cancelled(String),

    #[error("Tool unavailable: {tool_name} — missing {missing}")]
    Unavailable { tool_name: String, missing: String },

    #[error("Invalid tool definition: {0}")]
    InvalidDefinition(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

#[derive(Debug, Clone, Error)]
pub enum CollaboratorError {
    #[error("Reasoning selector failed: {0}")]
    Selector(String),

    #[error("Escalation service failed: {0}")]
    Escalation(String),

    #[error("Collaborator timed out after {0}ms")]
    Timeout(u64),
}

#[derive(Debug, Clone, Error)]
pub enum WorkflowError {
    #[error("Unknown workflow template: {0}")]
    UnknownTemplate(String),

    #[error("Invalid workflow template '{name}': {reason}")]
    InvalidTemplate { name: String, reason: String },

    #[error("Workflow cancelled: {0}")]
    Cancelled(String),

    #[error("Workflow {workflow_id} exceeded its {budget_ms}ms budget")]
    BudgetExceeded { workflow_id: String, budget_ms: u64 },
}
