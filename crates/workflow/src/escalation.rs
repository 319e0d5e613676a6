//! Retry-based escalation: re-ask a selector with each alternative as the
//! preferred service and keep the most confident answer.

use async_trait::async_trait;
use maestro_core::{
    CollaboratorError, EscalationOutcome, EscalationRequest, EscalationService, ReasoningSelector,
};
use std::sync::Arc;
use tracing::debug;

pub const ACTION_PROCEED: &str = "proceed_with_escalated_service";
pub const ACTION_REVIEW: &str = "request_human_review";

pub struct RetryEscalation {
    selector: Arc<dyn ReasoningSelector>,
}

impl RetryEscalation {
    pub fn new(selector: Arc<dyn ReasoningSelector>) -> Self {
        Self { selector }
    }
}

#[async_trait]
impl EscalationService for RetryEscalation {
    async fn evaluate_and_escalate(
        &self,
        request: EscalationRequest,
    ) -> Result<EscalationOutcome, CollaboratorError> {
        if request.current_confidence >= request.threshold {
            return Ok(EscalationOutcome::not_triggered(request.current_confidence));
        }

        let mut best_service = request.current_service.clone();
        let mut best_confidence = request.current_confidence;
        let mut path = vec![request.current_service.clone()];
        let mut attempts = 0;

        for alternative in request
            .alternatives
            .iter()
            .filter(|a| **a != request.current_service)
            .take(request.max_attempts as usize)
        {
            let mut ctx = request.context.clone();
            ctx.preferred_service = Some(alternative.clone());
            let selection = self.selector.select(&ctx).await?;
            attempts += 1;
            path.push(selection.service_name.clone());

            debug!(
                service = %selection.service_name,
                confidence = selection.confidence,
                attempt = attempts,
                "Escalation attempt"
            );
            if selection.confidence > best_confidence {
                best_confidence = selection.confidence;
                best_service = selection.service_name;
            }
            if best_confidence >= request.threshold {
                break;
            }
        }

        let recommend = if best_confidence >= request.threshold {
            ACTION_PROCEED
        } else {
            ACTION_REVIEW
        };
        Ok(EscalationOutcome {
            triggered: true,
            final_confidence: best_confidence.clamp(0.0, 1.0),
            escalation_path: path,
            recommend_next_action: recommend.to_string(),
            attempts,
            best_service: Some(best_service),
        })
    }
}
