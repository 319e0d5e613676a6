//! Request and result types for the orchestration pipeline.

use maestro_core::{ToolPriority, ToolResult};
use maestro_decision::{DecisionInput, ModuleResolution, ProcessingModule};
use maestro_telemetry::DecisionPath;
use maestro_workflow::WorkflowResult;
use serde::{Deserialize, Serialize};

/// One incoming request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationRequest {
    pub user_id: String,
    #[serde(default)]
    pub channel_id: Option<String>,
    pub message: String,
    /// Response strategy name, e.g. `deep_reason`.
    #[serde(default)]
    pub strategy: Option<String>,
    /// Legacy operation tag, used when no strategy is given.
    #[serde(default)]
    pub operation: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    /// Workflow template to run after tool execution.
    #[serde(default)]
    pub workflow: Option<String>,
    /// Parameters handed to every executed tool.
    #[serde(default)]
    pub params: serde_json::Value,
    /// Overrides the mapping's priority.
    #[serde(default)]
    pub priority: Option<ToolPriority>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl OrchestrationRequest {
    pub fn new(user_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            channel_id: None,
            message: message.into(),
            strategy: None,
            operation: None,
            confidence: None,
            workflow: None,
            params: serde_json::Value::Null,
            priority: None,
            timeout_ms: None,
        }
    }

    pub fn with_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = Some(strategy.into());
        self
    }

    pub fn with_operation(mut self, tag: impl Into<String>) -> Self {
        self.operation = Some(tag.into());
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_workflow(mut self, template: impl Into<String>) -> Self {
        self.workflow = Some(template.into());
        self
    }

    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = params;
        self
    }

    pub fn with_channel(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = Some(channel_id.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub(crate) fn decision_input(&self) -> DecisionInput {
        DecisionInput {
            strategy: self.strategy.clone(),
            confidence: self.confidence,
            token_estimate: None,
            message: Some(self.message.clone()),
            factors: None,
            operation_tag: self.operation.clone(),
        }
    }
}

/// What happened for one resolved module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleOutcome {
    pub module: ProcessingModule,
    pub capabilities: Vec<String>,
    /// Ranked candidate tool ids at discovery time.
    pub candidates: Vec<String>,
    /// `None` when no available tool offered the module's capabilities.
    pub result: Option<ToolResult>,
}

impl ModuleOutcome {
    pub fn is_failure(&self) -> bool {
        self.result.as_ref().is_some_and(|r| !r.success)
    }
}

/// The aggregated answer to a request. Always produced, even when every
/// stage failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationResult {
    pub session_id: String,
    pub success: bool,
    pub confidence: f64,
    pub resolution: ModuleResolution,
    pub modules: Vec<ModuleOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<WorkflowResult>,
    pub errors: Vec<String>,
    pub execution_time_ms: u64,
    /// The closed trace session, when the tracer still holds it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<DecisionPath>,
}

impl OrchestrationResult {
    /// Results from tools that actually ran.
    pub fn tool_results(&self) -> impl Iterator<Item = &ToolResult> {
        self.modules.iter().filter_map(|m| m.result.as_ref())
    }

    /// Tool results that must be forwarded to an external MCP server.
    pub fn external_mcp_calls(&self) -> impl Iterator<Item = &ToolResult> {
        self.tool_results().filter(|r| r.requires_external_mcp)
    }
}
