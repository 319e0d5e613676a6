//! Data model for decision traces and traced sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Step ──────────────────────────────────────────────────────────────────

/// The pipeline stage a trace records.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TraceStepKind {
    /// Request accepted into the pipeline.
    RequestReceived,
    /// Strategy and modules resolved.
    StrategyResolution,
    /// Candidate tools discovered and ranked.
    ToolDiscovery,
    /// A tool executed.
    ToolExecution,
    /// A step of a multi-step workflow.
    WorkflowStep,
    /// Confidence escalation.
    Escalation,
    /// Final response assembled.
    ResponseSynthesis,
}

impl std::fmt::Display for TraceStepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RequestReceived => write!(f, "request_received"),
            Self::StrategyResolution => write!(f, "strategy_resolution"),
            Self::ToolDiscovery => write!(f, "tool_discovery"),
            Self::ToolExecution => write!(f, "tool_execution"),
            Self::WorkflowStep => write!(f, "workflow_step"),
            Self::Escalation => write!(f, "escalation"),
            Self::ResponseSynthesis => write!(f, "response_synthesis"),
        }
    }
}

/// What a caller reports for one step. The tracer stamps it into a
/// [`DecisionTrace`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceStep {
    pub kind: TraceStepKind,
    pub name: String,
    /// Component that performed the step (e.g. `tool_registry`).
    pub component: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default)]
    pub execution_time_ms: u64,
    #[serde(default)]
    pub confidence: Option<f64>,
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl TraceStep {
    pub fn new(kind: TraceStepKind, name: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            component: component.into(),
            payload: serde_json::Value::Null,
            execution_time_ms: 0,
            confidence: None,
            success: true,
            error: None,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_time(mut self, execution_time_ms: u64) -> Self {
        self.execution_time_ms = execution_time_ms;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence.clamp(0.0, 1.0));
        self
    }

    /// Mark the step as failed.
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }
}

/// One recorded pipeline step. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTrace {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub user_id: String,
    pub kind: TraceStepKind,
    pub step_name: String,
    pub component: String,
    pub payload: serde_json::Value,
    pub execution_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DecisionTrace {
    pub(crate) fn stamp(session_id: &str, user_id: &str, step: TraceStep) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            session_id: session_id.to_string(),
            user_id: user_id.to_string(),
            kind: step.kind,
            step_name: step.name,
            component: step.component,
            payload: step.payload,
            execution_time_ms: step.execution_time_ms,
            confidence: step.confidence,
            success: step.success,
            error: step.error,
        }
    }
}

// ── Session ───────────────────────────────────────────────────────────────

/// Running statistics for a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PathSummary {
    pub total_steps: usize,
    pub successful_steps: usize,
    pub avg_step_time_ms: f64,
    /// Wall-clock session time, never less than the summed step times.
    pub total_time_ms: u64,
    /// Steps that took more than twice the running average, in order.
    pub bottlenecks: Vec<String>,
}

/// One traced session: a request and every step taken to answer it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionPath {
    pub session_id: String,
    pub user_id: String,
    pub request_text: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub traces: Vec<DecisionTrace>,
    pub summary: PathSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_result: Option<serde_json::Value>,
}

impl DecisionPath {
    pub fn new(user_id: impl Into<String>, request_text: impl Into<String>) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            request_text: request_text.into(),
            started_at: Utc::now(),
            ended_at: None,
            traces: Vec::new(),
            summary: PathSummary::default(),
            final_result: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.ended_at.is_some()
    }

    /// Append a trace and fold it into the running summary.
    pub fn push(&mut self, trace: DecisionTrace) {
        let step_time_ms = self.step_time_ms();
        let s = &mut self.summary;
        s.total_steps += 1;
        if trace.success {
            s.successful_steps += 1;
        }
        let time = trace.execution_time_ms as f64;
        s.avg_step_time_ms += (time - s.avg_step_time_ms) / s.total_steps as f64;
        if time > 2.0 * s.avg_step_time_ms && !s.bottlenecks.contains(&trace.step_name) {
            s.bottlenecks.push(trace.step_name.clone());
        }
        s.total_time_ms = s.total_time_ms.max(step_time_ms + trace.execution_time_ms);
        self.traces.push(trace);
    }

    /// Close the session.
    pub fn end(&mut self, result: Option<serde_json::Value>) {
        let now = Utc::now();
        self.ended_at = Some(now);
        let wall = now
            .signed_duration_since(self.started_at)
            .num_milliseconds()
            .max(0) as u64;
        self.summary.total_time_ms = wall.max(self.step_time_ms());
        self.final_result = result;
    }

    /// Summed step execution times.
    pub fn step_time_ms(&self) -> u64 {
        self.traces.iter().map(|t| t.execution_time_ms).sum()
    }

    /// Successful / total steps; 1.0 for a session with no steps.
    pub fn success_rate(&self) -> f64 {
        if self.summary.total_steps == 0 {
            return 1.0;
        }
        self.summary.successful_steps as f64 / self.summary.total_steps as f64
    }

    /// Step names in recorded order.
    pub fn step_sequence(&self) -> Vec<String> {
        self.traces.iter().map(|t| t.step_name.clone()).collect()
    }
}
