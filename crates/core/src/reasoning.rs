//! Reasoning collaborators — the injected services a workflow consults.
//!
//! Maestro does not reason by itself. A [`ReasoningSelector`] picks the
//! reasoning approach for a request and an [`EscalationService`] retries
//! when the resulting confidence is too low. Both are opaque to the engine.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CollaboratorError;

/// Everything a collaborator may look at when making a decision.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DecisionContext {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    pub request_text: String,
    /// Capabilities the request needs, forwarded to tool discovery.
    #[serde(default)]
    pub required_capabilities: Vec<String>,
    /// Set by escalation to ask the selector for a specific approach.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_service: Option<String>,
    /// Free-form signals (strategy, token estimate, ...).
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl DecisionContext {
    pub fn new(user_id: impl Into<String>, request_text: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            request_text: request_text.into(),
            ..Default::default()
        }
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_capabilities
            .extend(capabilities.into_iter().map(Into::into));
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// The approach a selector picked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSelection {
    pub service_name: String,
    /// Selector's confidence in [0, 1].
    pub confidence: f64,
    /// Alternative approaches, best first.
    #[serde(default)]
    pub fallbacks: Vec<String>,
}

#[async_trait]
pub trait ReasoningSelector: Send + Sync {
    async fn select(&self, ctx: &DecisionContext) -> Result<ServiceSelection, CollaboratorError>;
}

/// Input to an escalation round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationRequest {
    pub context: DecisionContext,
    pub current_service: String,
    pub current_confidence: f64,
    pub threshold: f64,
    /// Alternatives to try, in order.
    pub alternatives: Vec<String>,
    /// Hard cap on retries.
    pub max_attempts: u32,
}

/// What an escalation round achieved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationOutcome {
    pub triggered: bool,
    pub final_confidence: f64,
    /// Services tried, in order.
    pub escalation_path: Vec<String>,
    pub recommend_next_action: String,
    pub attempts: u32,
    /// Service that produced `final_confidence`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_service: Option<String>,
}

impl EscalationOutcome {
    /// The outcome when confidence was already sufficient.
    pub fn not_triggered(confidence: f64) -> Self {
        Self {
            triggered: false,
            final_confidence: confidence,
            escalation_path: Vec::new(),
            recommend_next_action: "proceed".into(),
            attempts: 0,
            best_service: None,
        }
    }
}

#[async_trait]
pub trait EscalationService: Send + Sync {
    async fn evaluate_and_escalate(
        &self,
        request: EscalationRequest,
    ) -> Result<EscalationOutcome, CollaboratorError>;
}
