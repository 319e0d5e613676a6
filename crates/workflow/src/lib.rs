//! Multi-step decision workflows for Maestro.
//!
//! A workflow runs a named [`WorkflowTemplate`] against a request: it asks a
//! [`ReasoningSelector`](maestro_core::ReasoningSelector) for an approach,
//! executes it (through the tool registry when attached), and escalates
//! through an [`EscalationService`](maestro_core::EscalationService) while
//! confidence stays below the threshold. Results carry the confidence
//! progression, critical path, bottlenecks and a reasoning trail.

pub mod engine;
pub mod escalation;
pub mod result;
pub mod selector;
pub mod template;

pub use engine::{WorkflowEngine, WorkflowSettings};
pub use escalation::RetryEscalation;
pub use result::{
    EscalationSummary, FAILED_WORKFLOW_ID, StepOutcome, StepStatus, WorkflowResult, WorkflowState,
    WorkflowStatus,
};
pub use selector::HeuristicSelector;
pub use template::{
    COMPLEX_TEMPLATE, DecisionStep, QUICK_TEMPLATE, StepCondition, StepKind, WorkflowTemplate,
    complex_multi_step, quick_multi_step,
};
