//! Workflow outcomes and the analytics derived from them.

use chrono::{DateTime, Utc};
use maestro_core::ToolResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::template::{DecisionStep, StepKind};

/// Sentinel id of a workflow that never started.
pub const FAILED_WORKFLOW_ID: &str = "failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Completed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
    TimedOut,
}

impl WorkflowState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running | Self::Paused)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    pub step_id: String,
    pub kind: StepKind,
    pub status: StepStatus,
    /// Running confidence after this step, for steps that produce one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub execution_time_ms: u64,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Live view of an in-flight workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStatus {
    pub workflow_id: String,
    pub template: String,
    pub state: WorkflowState,
    pub current_step: Option<String>,
    pub steps_done: usize,
    pub total_steps: usize,
    pub confidence: f64,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EscalationSummary {
    pub triggered: bool,
    pub attempts: u32,
    pub path: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommend_next_action: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub workflow_id: String,
    pub template: String,
    pub success: bool,
    pub state: WorkflowState,
    pub final_confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_service: Option<String>,
    pub total_steps: usize,
    pub completed_steps: usize,
    pub failed_steps: usize,
    pub skipped_steps: usize,
    pub execution_time_ms: u64,
    /// Mean of the confidences recorded by individual steps.
    pub average_confidence: f64,
    pub confidence_progression: Vec<f64>,
    pub critical_path: Vec<String>,
    pub bottlenecks: Vec<String>,
    pub reasoning_trail: Vec<String>,
    pub escalation: EscalationSummary,
    pub recommendations: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_results: Vec<ToolResult>,
    pub steps: Vec<StepOutcome>,
}

impl WorkflowResult {
    /// The result for a workflow that could not start.
    pub fn failed(template: &str, reason: impl Into<String>) -> Self {
        Self {
            workflow_id: FAILED_WORKFLOW_ID.to_string(),
            template: template.to_string(),
            success: false,
            state: WorkflowState::Failed,
            final_confidence: 0.0,
            selected_service: None,
            total_steps: 0,
            completed_steps: 0,
            failed_steps: 0,
            skipped_steps: 0,
            execution_time_ms: 0,
            average_confidence: 0.0,
            confidence_progression: Vec::new(),
            critical_path: Vec::new(),
            bottlenecks: Vec::new(),
            reasoning_trail: vec![reason.into()],
            escalation: EscalationSummary::default(),
            recommendations: vec![format!(
                "Retry with a simpler workflow such as '{}'",
                crate::template::QUICK_TEMPLATE
            )],
            tool_results: Vec::new(),
            steps: Vec::new(),
        }
    }
}

// ── Analytics ─────────────────────────────────────────────────────────────

/// Longest-duration dependency chain through completed steps.
pub fn critical_path(steps: &[DecisionStep], outcomes: &[StepOutcome]) -> Vec<String> {
    let durations: HashMap<&str, u64> = outcomes
        .iter()
        .filter(|o| o.status == StepStatus::Completed)
        .map(|o| (o.step_id.as_str(), o.execution_time_ms))
        .collect();

    // (chain duration, predecessor) per completed step, in template order.
    let mut best: HashMap<&str, (u64, Option<&str>)> = HashMap::new();
    for step in steps {
        let Some(&own) = durations.get(step.id.as_str()) else {
            continue;
        };
        let prev = step
            .depends_on
            .iter()
            .filter_map(|d| best.get(d.as_str()).map(|(total, _)| (d.as_str(), *total)))
            .max_by_key(|(_, total)| *total);
        let entry = match prev {
            Some((dep, total)) => (total + own, Some(dep)),
            None => (own, None),
        };
        best.insert(step.id.as_str(), entry);
    }

    // Ties go to the later step so the path reaches as far as it can.
    let mut tail = None;
    let mut longest = 0;
    for step in steps {
        if let Some(&(total, _)) = best.get(step.id.as_str()) {
            if tail.is_none() || total >= longest {
                longest = total;
                tail = Some(step.id.as_str());
            }
        }
    }

    let mut path = Vec::new();
    while let Some(id) = tail {
        path.push(id.to_string());
        tail = best.get(id).and_then(|(_, prev)| *prev);
    }
    path.reverse();
    path
}

/// Executed steps that took more than twice the mean step time.
pub fn bottlenecks(outcomes: &[StepOutcome]) -> Vec<String> {
    let executed: Vec<&StepOutcome> = outcomes
        .iter()
        .filter(|o| o.status != StepStatus::Skipped)
        .collect();
    if executed.is_empty() {
        return Vec::new();
    }
    let mean = executed
        .iter()
        .map(|o| o.execution_time_ms as f64)
        .sum::<f64>()
        / executed.len() as f64;
    if mean <= 0.0 {
        return Vec::new();
    }
    executed
        .iter()
        .filter(|o| o.execution_time_ms as f64 > 2.0 * mean)
        .map(|o| o.step_id.clone())
        .collect()
}
