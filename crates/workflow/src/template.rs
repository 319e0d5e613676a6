//! Workflow templates — named, ordered decision steps.

use maestro_core::WorkflowError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

pub const QUICK_TEMPLATE: &str = "quick_multi_step";
pub const COMPLEX_TEMPLATE: &str = "complex_multi_step";

/// Short names accepted in place of the built-in template names.
pub const TEMPLATE_ALIASES: &[(&str, &str)] =
    &[("quick", QUICK_TEMPLATE), ("complex", COMPLEX_TEMPLATE)];

/// Map an alias to its template name; other names pass through.
pub fn resolve_alias(name: &str) -> &str {
    TEMPLATE_ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, target)| *target)
        .unwrap_or(name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    AnalyzeContext,
    SelectService,
    Execute,
    Escalate,
    Synthesize,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AnalyzeContext => "analyze_context",
            Self::SelectService => "select_service",
            Self::Execute => "execute",
            Self::Escalate => "escalate",
            Self::Synthesize => "synthesize",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When a step runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepCondition {
    #[default]
    Always,
    /// Only while the running confidence is below the threshold.
    ConfidenceBelowThreshold,
    /// Only when the last executed step failed.
    PreviousFailed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionStep {
    pub id: String,
    pub kind: StepKind,
    #[serde(default)]
    pub condition: StepCondition,
    /// Steps this one builds on. Used for critical-path analysis.
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl DecisionStep {
    pub fn new(id: impl Into<String>, kind: StepKind) -> Self {
        Self {
            id: id.into(),
            kind,
            condition: StepCondition::Always,
            depends_on: Vec::new(),
        }
    }

    pub fn when(mut self, condition: StepCondition) -> Self {
        self.condition = condition;
        self
    }

    pub fn after<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(ids.into_iter().map(Into::into));
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowTemplate {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub steps: Vec<DecisionStep>,
}

impl WorkflowTemplate {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        steps: Vec<DecisionStep>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            steps,
        }
    }

    /// Steps must exist, have unique ids, and depend only on earlier steps.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        let invalid = |reason: String| WorkflowError::InvalidTemplate {
            name: self.name.clone(),
            reason,
        };
        if self.name.trim().is_empty() {
            return Err(invalid("template name must not be empty".into()));
        }
        if self.steps.is_empty() {
            return Err(invalid("template has no steps".into()));
        }

        let mut seen = HashSet::new();
        for step in &self.steps {
            for dep in &step.depends_on {
                if !seen.contains(dep.as_str()) {
                    return Err(invalid(format!(
                        "step '{}' depends on '{dep}', which is not an earlier step",
                        step.id
                    )));
                }
            }
            if !seen.insert(step.id.as_str()) {
                return Err(invalid(format!("duplicate step id '{}'", step.id)));
            }
        }
        Ok(())
    }
}

/// select → execute → escalate while confidence is low.
pub fn quick_multi_step() -> WorkflowTemplate {
    WorkflowTemplate::new(
        QUICK_TEMPLATE,
        "Select an approach, execute it, escalate if confidence is low",
        vec![
            DecisionStep::new("select", StepKind::SelectService),
            DecisionStep::new("execute", StepKind::Execute).after(["select"]),
            DecisionStep::new("escalate", StepKind::Escalate)
                .when(StepCondition::ConfidenceBelowThreshold)
                .after(["execute"]),
        ],
    )
}

/// analyze → select → execute → escalate while low → synthesize.
pub fn complex_multi_step() -> WorkflowTemplate {
    WorkflowTemplate::new(
        COMPLEX_TEMPLATE,
        "Analyze context, select, execute, escalate if needed, synthesize",
        vec![
            DecisionStep::new("analyze", StepKind::AnalyzeContext),
            DecisionStep::new("select", StepKind::SelectService).after(["analyze"]),
            DecisionStep::new("execute", StepKind::Execute).after(["select"]),
            DecisionStep::new("escalate", StepKind::Escalate)
                .when(StepCondition::ConfidenceBelowThreshold)
                .after(["execute"]),
            DecisionStep::new("synthesize", StepKind::Synthesize).after(["execute", "escalate"]),
        ],
    )
}

pub fn builtin_templates() -> Vec<WorkflowTemplate> {
    vec![quick_multi_step(), complex_multi_step()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_valid() {
        for template in builtin_templates() {
            template.validate().unwrap();
        }
    }

    #[test]
    fn aliases_resolve() {
        assert_eq!(resolve_alias("quick"), QUICK_TEMPLATE);
        assert_eq!(resolve_alias("complex"), COMPLEX_TEMPLATE);
        assert_eq!(resolve_alias("custom"), "custom");
    }

    #[test]
    fn forward_dependency_rejected() {
        let t = WorkflowTemplate::new(
            "bad",
            "",
            vec![
                DecisionStep::new("a", StepKind::Execute).after(["b"]),
                DecisionStep::new("b", StepKind::SelectService),
            ],
        );
        assert!(matches!(t.validate(), Err(WorkflowError::InvalidTemplate { .. })));
    }

    #[test]
    fn duplicate_and_empty_rejected() {
        let dup = WorkflowTemplate::new(
            "dup",
            "",
            vec![
                DecisionStep::new("a", StepKind::Execute),
                DecisionStep::new("a", StepKind::Execute),
            ],
        );
        assert!(dup.validate().is_err());
        assert!(WorkflowTemplate::new("empty", "", vec![]).validate().is_err());
    }

    #[test]
    fn step_serializes_snake_case() {
        let step = DecisionStep::new("e", StepKind::Escalate)
            .when(StepCondition::ConfidenceBelowThreshold);
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["kind"], "escalate");
        assert_eq!(json["condition"], "confidence_below_threshold");
    }
}
