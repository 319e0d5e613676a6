//! Multi-step decision workflow engine.
//!
//! Runs a template's steps in order against the injected reasoning
//! collaborators (and, when attached, the tool registry). Between steps it
//! honours cancel and pause signals and the wall-clock budget. Every
//! in-flight workflow sits in an id-keyed table for status queries and is
//! removed by a drop guard however the run ends.

use chrono::Utc;
use maestro_config::WorkflowConfig;
use maestro_core::{
    DecisionContext, EscalationRequest, EscalationService, ExecutionContext, ReasoningSelector,
    ToolCategory, ToolResult, WorkflowError,
};
use maestro_tools::{Deadline, ToolRegistry, race};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::escalation::RetryEscalation;
use crate::result::{
    EscalationSummary, StepOutcome, StepStatus, WorkflowResult, WorkflowState, WorkflowStatus,
    bottlenecks, critical_path,
};
use crate::selector::HeuristicSelector;
use crate::template::{
    DecisionStep, StepCondition, StepKind, TEMPLATE_ALIASES, WorkflowTemplate, builtin_templates,
    resolve_alias,
};

#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub confidence_threshold: f64,
    pub max_escalation_attempts: u32,
    /// Wall-clock budget for a whole workflow.
    pub max_duration: Duration,
    /// Upper bound for any single step.
    pub step_timeout: Duration,
    /// Confidence multiplier applied when a step fails.
    pub degradation_factor: f64,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self::from(&WorkflowConfig::default())
    }
}

impl From<&WorkflowConfig> for WorkflowSettings {
    fn from(config: &WorkflowConfig) -> Self {
        Self {
            confidence_threshold: config.confidence_threshold,
            max_escalation_attempts: config.max_escalation_attempts,
            max_duration: Duration::from_millis(config.max_duration_ms),
            step_timeout: Duration::from_millis(config.step_timeout_ms),
            degradation_factor: config.degradation_factor,
        }
    }
}

// ── Active table ──────────────────────────────────────────────────────────

struct ActiveWorkflow {
    status: WorkflowStatus,
    cancel: CancellationToken,
    pause: watch::Sender<bool>,
}

type ActiveTable = Arc<Mutex<HashMap<String, ActiveWorkflow>>>;

fn lock(table: &ActiveTable) -> MutexGuard<'_, HashMap<String, ActiveWorkflow>> {
    table.lock().unwrap_or_else(|e| e.into_inner())
}

/// Removes its workflow from the active table when dropped.
struct ActiveGuard {
    table: ActiveTable,
    id: String,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        lock(&self.table).remove(&self.id);
    }
}

// ── Run state ─────────────────────────────────────────────────────────────

struct Run {
    ctx: DecisionContext,
    confidence: f64,
    service: Option<String>,
    fallbacks: Vec<String>,
    last_failed: bool,
    outcomes: Vec<StepOutcome>,
    progression: Vec<f64>,
    trail: Vec<String>,
    escalation: EscalationSummary,
    tool_results: Vec<ToolResult>,
}

impl Run {
    fn new(ctx: &DecisionContext) -> Self {
        Self {
            ctx: ctx.clone(),
            confidence: 0.0,
            service: None,
            fallbacks: Vec::new(),
            last_failed: false,
            outcomes: Vec::new(),
            progression: Vec::new(),
            trail: Vec::new(),
            escalation: EscalationSummary::default(),
            tool_results: Vec::new(),
        }
    }

    fn set_confidence(&mut self, confidence: f64) {
        self.confidence = confidence.clamp(0.0, 1.0);
    }
}

/// What a finished step reports: its detail line and whether it produced
/// a confidence.
struct StepReport {
    detail: String,
    scored: bool,
}

// ── Engine ────────────────────────────────────────────────────────────────

pub struct WorkflowEngine {
    settings: WorkflowSettings,
    selector: Arc<dyn ReasoningSelector>,
    escalation: Arc<dyn EscalationService>,
    registry: Option<Arc<ToolRegistry>>,
    templates: RwLock<HashMap<String, Arc<WorkflowTemplate>>>,
    active: ActiveTable,
}

impl WorkflowEngine {
    pub fn new(
        settings: WorkflowSettings,
        selector: Arc<dyn ReasoningSelector>,
        escalation: Arc<dyn EscalationService>,
    ) -> Self {
        let templates = builtin_templates()
            .into_iter()
            .map(|t| (t.name.clone(), Arc::new(t)))
            .collect();
        Self {
            settings,
            selector,
            escalation,
            registry: None,
            templates: RwLock::new(templates),
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Built-in heuristic selector with retry escalation.
    pub fn from_config(config: &WorkflowConfig) -> Self {
        let selector: Arc<dyn ReasoningSelector> = Arc::new(HeuristicSelector);
        let escalation = Arc::new(RetryEscalation::new(selector.clone()));
        Self::new(WorkflowSettings::from(config), selector, escalation)
    }

    /// Execute steps through this registry when tools match.
    pub fn with_registry(mut self, registry: Arc<ToolRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    // ── Templates ─────────────────────────────────────────────────────

    pub fn register_template(&self, template: WorkflowTemplate) -> Result<(), WorkflowError> {
        template.validate()?;
        if TEMPLATE_ALIASES.iter().any(|(alias, _)| *alias == template.name) {
            return Err(WorkflowError::InvalidTemplate {
                name: template.name.clone(),
                reason: "name is reserved as a template alias".into(),
            });
        }
        info!(
            template = %template.name,
            steps = template.steps.len(),
            "Registering workflow template"
        );
        self.templates
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(template.name.clone(), Arc::new(template));
        Ok(())
    }

    pub fn template(&self, name: &str) -> Option<Arc<WorkflowTemplate>> {
        self.templates
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(resolve_alias(name))
            .cloned()
    }

    /// Registered template names plus the short aliases, sorted.
    pub fn available_templates(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .templates
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        names.extend(TEMPLATE_ALIASES.iter().map(|(alias, _)| alias.to_string()));
        names.sort();
        names.dedup();
        names
    }

    // ── Live workflows ────────────────────────────────────────────────

    pub fn active_workflow_count(&self) -> usize {
        lock(&self.active).len()
    }

    pub fn active_workflow_ids(&self) -> Vec<String> {
        lock(&self.active).keys().cloned().collect()
    }

    pub fn workflow_status(&self, id: &str) -> Option<WorkflowStatus> {
        lock(&self.active).get(id).map(|w| w.status.clone())
    }

    pub fn cancel_workflow(&self, id: &str) -> bool {
        match lock(&self.active).get(id) {
            Some(w) => {
                info!(workflow_id = %id, "Cancelling workflow");
                w.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn pause_workflow(&self, id: &str) -> bool {
        self.signal_pause(id, true)
    }

    pub fn resume_workflow(&self, id: &str) -> bool {
        self.signal_pause(id, false)
    }

    fn signal_pause(&self, id: &str, paused: bool) -> bool {
        match lock(&self.active).get(id) {
            Some(w) => {
                debug!(workflow_id = %id, paused, "Pause signal");
                w.pause.send_replace(paused);
                true
            }
            None => false,
        }
    }

    /// Cancel every in-flight workflow.
    pub fn cancel_all(&self) {
        for w in lock(&self.active).values() {
            w.cancel.cancel();
        }
    }

    fn update_status(&self, id: &str, f: impl FnOnce(&mut WorkflowStatus)) {
        if let Some(w) = lock(&self.active).get_mut(id) {
            f(&mut w.status);
        }
    }

    // ── Execution ─────────────────────────────────────────────────────

    /// Run a template against a request.
    ///
    /// Never fails: an unknown template yields a result with
    /// `success = false` and workflow id `"failed"`, and collaborator
    /// faults fail only the step they occur in.
    pub async fn execute_multi_step_decision(
        &self,
        ctx: &DecisionContext,
        template_name: &str,
    ) -> WorkflowResult {
        let Some(template) = self.template(template_name) else {
            let err = WorkflowError::UnknownTemplate(template_name.to_string());
            warn!(template = %template_name, "Unknown workflow template");
            return WorkflowResult::failed(template_name, err.to_string());
        };

        let workflow_id = uuid::Uuid::new_v4().to_string();
        let cancel = CancellationToken::new();
        let (pause_tx, mut pause_rx) = watch::channel(false);
        lock(&self.active).insert(
            workflow_id.clone(),
            ActiveWorkflow {
                status: WorkflowStatus {
                    workflow_id: workflow_id.clone(),
                    template: template.name.clone(),
                    state: WorkflowState::Running,
                    current_step: None,
                    steps_done: 0,
                    total_steps: template.steps.len(),
                    confidence: 0.0,
                    started_at: Utc::now(),
                },
                cancel: cancel.clone(),
                pause: pause_tx,
            },
        );
        let _guard = ActiveGuard {
            table: self.active.clone(),
            id: workflow_id.clone(),
        };

        info!(
            workflow_id = %workflow_id,
            template = %template.name,
            user_id = %ctx.user_id,
            "Starting workflow"
        );
        let started = Instant::now();
        let deadline = started + self.settings.max_duration;
        let mut run = Run::new(ctx);
        let mut state = WorkflowState::Completed;

        for step in &template.steps {
            if let Some(stop) = self
                .checkpoint(&workflow_id, &cancel, &mut pause_rx, deadline)
                .await
            {
                state = stop;
                break;
            }
            self.update_status(&workflow_id, |s| s.current_step = Some(step.id.clone()));

            if !self.condition_met(step.condition, &run) {
                debug!(
                    workflow_id = %workflow_id,
                    step = %step.id,
                    "Condition not met, skipping step"
                );
                run.outcomes.push(StepOutcome {
                    step_id: step.id.clone(),
                    kind: step.kind,
                    status: StepStatus::Skipped,
                    confidence: None,
                    execution_time_ms: 0,
                    detail: format!("skipped: {:?} not met", step.condition),
                    error: None,
                });
                let done = run.outcomes.len();
                self.update_status(&workflow_id, |s| s.steps_done = done);
                continue;
            }

            let step_started = Instant::now();
            let limit = self
                .settings
                .step_timeout
                .min(deadline.saturating_duration_since(step_started));
            let outcome = race(self.run_step(step, &mut run), limit, &cancel).await;
            let elapsed_ms = step_started.elapsed().as_millis() as u64;

            let failure = match outcome {
                Deadline::Completed(Ok(report)) => {
                    run.last_failed = false;
                    let confidence = report.scored.then_some(run.confidence);
                    if let Some(c) = confidence {
                        run.progression.push(c);
                    }
                    run.trail.push(format!("{}: {}", step.kind, report.detail));
                    run.outcomes.push(StepOutcome {
                        step_id: step.id.clone(),
                        kind: step.kind,
                        status: StepStatus::Completed,
                        confidence,
                        execution_time_ms: elapsed_ms,
                        detail: report.detail,
                        error: None,
                    });
                    None
                }
                Deadline::Completed(Err(e)) => Some(e),
                Deadline::TimedOut if Instant::now() >= deadline => {
                    state = WorkflowState::TimedOut;
                    Some(
                        WorkflowError::BudgetExceeded {
                            workflow_id: workflow_id.clone(),
                            budget_ms: self.settings.max_duration.as_millis() as u64,
                        }
                        .to_string(),
                    )
                }
                Deadline::TimedOut => Some(format!("step timed out after {}ms", limit.as_millis())),
                Deadline::Cancelled => {
                    state = WorkflowState::Cancelled;
                    Some(WorkflowError::Cancelled(workflow_id.clone()).to_string())
                }
            };

            if let Some(error) = failure {
                warn!(workflow_id = %workflow_id, step = %step.id, %error, "Workflow step failed");
                run.last_failed = true;
                run.set_confidence(run.confidence * self.settings.degradation_factor);
                run.progression.push(run.confidence);
                run.trail.push(format!("{}: failed ({error})", step.kind));
                run.outcomes.push(StepOutcome {
                    step_id: step.id.clone(),
                    kind: step.kind,
                    status: StepStatus::Failed,
                    confidence: Some(run.confidence),
                    execution_time_ms: elapsed_ms,
                    detail: "step failed".into(),
                    error: Some(error),
                });
            }

            let confidence = run.confidence;
            let done = run.outcomes.len();
            self.update_status(&workflow_id, |s| {
                s.steps_done = done;
                s.confidence = confidence;
            });

            if state != WorkflowState::Completed {
                break;
            }
        }

        let result = self.finish(&workflow_id, &template, run, state, started.elapsed());
        info!(
            workflow_id = %workflow_id,
            success = result.success,
            state = ?result.state,
            confidence = result.final_confidence,
            elapsed_ms = result.execution_time_ms,
            "Workflow finished"
        );
        result
    }

    /// Between-step gate. Waits out a pause; returns the terminal state if
    /// the workflow must stop.
    async fn checkpoint(
        &self,
        id: &str,
        cancel: &CancellationToken,
        pause: &mut watch::Receiver<bool>,
        deadline: Instant,
    ) -> Option<WorkflowState> {
        loop {
            if cancel.is_cancelled() {
                return Some(WorkflowState::Cancelled);
            }
            if Instant::now() >= deadline {
                return Some(WorkflowState::TimedOut);
            }
            if !*pause.borrow_and_update() {
                return None;
            }

            self.update_status(id, |s| s.state = WorkflowState::Paused);
            tokio::select! {
                _ = cancel.cancelled() => {}
                changed = pause.changed() => {
                    if changed.is_err() {
                        return None;
                    }
                }
                _ = tokio::time::sleep_until(deadline) => {}
            }
            self.update_status(id, |s| s.state = WorkflowState::Running);
        }
    }

    fn condition_met(&self, condition: StepCondition, run: &Run) -> bool {
        match condition {
            StepCondition::Always => true,
            StepCondition::ConfidenceBelowThreshold => {
                run.confidence < self.settings.confidence_threshold
            }
            StepCondition::PreviousFailed => run.last_failed,
        }
    }

    async fn run_step(&self, step: &DecisionStep, run: &mut Run) -> Result<StepReport, String> {
        match step.kind {
            StepKind::AnalyzeContext => Ok(self.analyze(run)),
            StepKind::SelectService => self.select(run).await,
            StepKind::Execute => self.execute(run).await,
            StepKind::Escalate => self.escalate(run).await,
            StepKind::Synthesize => Ok(self.synthesize(run)),
        }
    }

    fn analyze(&self, run: &mut Run) -> StepReport {
        let words = run.ctx.request_text.split_whitespace().count();
        let mut categories: Vec<&'static str> = Vec::new();
        for word in run.ctx.request_text.split_whitespace() {
            for category in ToolCategory::matching(word) {
                if !categories.contains(&category.as_str()) {
                    categories.push(category.as_str());
                }
            }
        }
        run.ctx
            .metadata
            .insert("word_count".into(), json!(words));
        run.ctx
            .metadata
            .insert("categories".into(), json!(categories));

        StepReport {
            detail: format!(
                "{words} words, {} capabilities requested, categories [{}]",
                run.ctx.required_capabilities.len(),
                categories.join(", ")
            ),
            scored: false,
        }
    }

    async fn select(&self, run: &mut Run) -> Result<StepReport, String> {
        let selection = self.selector.select(&run.ctx).await.map_err(|e| e.to_string())?;
        run.set_confidence(selection.confidence);
        let detail = format!("chose {} (confidence {:.2})", selection.service_name, run.confidence);
        run.service = Some(selection.service_name);
        run.fallbacks = selection.fallbacks;
        Ok(StepReport {
            detail,
            scored: true,
        })
    }

    async fn execute(&self, run: &mut Run) -> Result<StepReport, String> {
        let service = run.service.clone().unwrap_or_else(|| "default".into());
        let carried = || StepReport {
            detail: format!("no matching tools, carrying {service} confidence"),
            scored: true,
        };

        let Some(registry) = &self.registry else {
            return Ok(carried());
        };
        if run.ctx.required_capabilities.is_empty() {
            return Ok(carried());
        }

        let mut exec_ctx =
            ExecutionContext::new(run.ctx.user_id.clone(), run.ctx.request_text.clone())
                .with_capabilities(run.ctx.required_capabilities.iter().cloned());
        exec_ctx.channel_id = run.ctx.channel_id.clone();
        let params = json!({ "request": run.ctx.request_text, "service": service });

        match registry.execute_best(params, &exec_ctx).await {
            None => Ok(carried()),
            Some(result) if result.success => {
                let detail = format!(
                    "{} succeeded in {}ms",
                    result.tool_used, result.execution_time_ms
                );
                run.tool_results.push(result);
                Ok(StepReport {
                    detail,
                    scored: true,
                })
            }
            Some(result) => {
                let error = format!(
                    "{} failed: {}",
                    result.tool_used,
                    result.error.as_deref().unwrap_or("unknown error")
                );
                run.tool_results.push(result);
                Err(error)
            }
        }
    }

    async fn escalate(&self, run: &mut Run) -> Result<StepReport, String> {
        let request = EscalationRequest {
            context: run.ctx.clone(),
            current_service: run.service.clone().unwrap_or_else(|| "default".into()),
            current_confidence: run.confidence,
            threshold: self.settings.confidence_threshold,
            alternatives: run.fallbacks.clone(),
            max_attempts: self.settings.max_escalation_attempts,
        };
        let outcome = self
            .escalation
            .evaluate_and_escalate(request)
            .await
            .map_err(|e| e.to_string())?;

        run.escalation.triggered |= outcome.triggered;
        run.escalation.attempts += outcome.attempts;
        run.escalation.path.extend(outcome.escalation_path.iter().cloned());
        run.escalation.recommend_next_action = Some(outcome.recommend_next_action.clone());

        if outcome.final_confidence > run.confidence {
            run.set_confidence(outcome.final_confidence);
            if let Some(best) = outcome.best_service {
                run.service = Some(best);
            }
        }
        Ok(StepReport {
            detail: format!(
                "{} attempts, confidence {:.2}, next: {}",
                outcome.attempts, run.confidence, outcome.recommend_next_action
            ),
            scored: true,
        })
    }

    fn synthesize(&self, run: &Run) -> StepReport {
        let completed = run
            .outcomes
            .iter()
            .filter(|o| o.status == StepStatus::Completed)
            .count();
        StepReport {
            detail: format!(
                "combined {completed} completed steps and {} tool results via {}",
                run.tool_results.len(),
                run.service.as_deref().unwrap_or("default")
            ),
            scored: true,
        }
    }

    fn finish(
        &self,
        workflow_id: &str,
        template: &WorkflowTemplate,
        run: Run,
        state: WorkflowState,
        elapsed: Duration,
    ) -> WorkflowResult {
        let count = |status: StepStatus| run.outcomes.iter().filter(|o| o.status == status).count();
        let completed = count(StepStatus::Completed);
        let failed = count(StepStatus::Failed);
        let skipped = count(StepStatus::Skipped);

        let scored: Vec<f64> = run.outcomes.iter().filter_map(|o| o.confidence).collect();
        let average = if scored.is_empty() {
            0.0
        } else {
            scored.iter().sum::<f64>() / scored.len() as f64
        };

        let critical = critical_path(&template.steps, &run.outcomes);
        let slow = bottlenecks(&run.outcomes);

        let mut recommendations = Vec::new();
        if run.confidence < self.settings.confidence_threshold {
            recommendations.push(format!(
                "Confidence {:.2} is below the {:.2} threshold; \
                 consider a deeper strategy or human review",
                run.confidence, self.settings.confidence_threshold
            ));
        }
        if failed > 0 {
            recommendations.push(format!("{failed} step(s) failed; check collaborator health"));
        }
        if !slow.is_empty() {
            recommendations.push(format!("Optimize slow steps: {}", slow.join(", ")));
        }
        if run.escalation.triggered
            && run.escalation.attempts >= self.settings.max_escalation_attempts
        {
            recommendations.push("Escalation used every allowed attempt".to_string());
        }
        match state {
            WorkflowState::Cancelled => {
                recommendations.push("Workflow was cancelled before finishing".into())
            }
            WorkflowState::TimedOut => recommendations.push(format!(
                "Workflow exceeded its {}ms budget; use a shorter template",
                self.settings.max_duration.as_millis()
            )),
            _ => {}
        }

        WorkflowResult {
            workflow_id: workflow_id.to_string(),
            template: template.name.clone(),
            success: state == WorkflowState::Completed && failed == 0,
            state,
            final_confidence: run.confidence,
            selected_service: run.service,
            total_steps: template.steps.len(),
            completed_steps: completed,
            failed_steps: failed,
            skipped_steps: skipped,
            execution_time_ms: elapsed.as_millis() as u64,
            average_confidence: average,
            confidence_progression: run.progression,
            critical_path: critical,
            bottlenecks: slow,
            reasoning_trail: run.trail,
            escalation: run.escalation,
            recommendations,
            tool_results: run.tool_results,
            steps: run.outcomes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::FAILED_WORKFLOW_ID;
    use crate::template::{COMPLEX_TEMPLATE, QUICK_TEMPLATE};
    use async_trait::async_trait;
    use maestro_core::{
        CollaboratorError, EscalationOutcome, ServiceSelection, ToolDefinition, ToolError,
        ToolExecutor, ToolPriority,
    };
    use tokio::sync::Notify;

    /// Fixed confidence; alternatives each score `alt_confidence`.
    struct FixedSelector {
        confidence: f64,
        alt_confidence: f64,
    }

    #[async_trait]
    impl ReasoningSelector for FixedSelector {
        async fn select(
            &self,
            ctx: &DecisionContext,
        ) -> Result<ServiceSelection, CollaboratorError> {
            match &ctx.preferred_service {
                Some(p) => Ok(ServiceSelection {
                    service_name: p.clone(),
                    confidence: self.alt_confidence,
                    fallbacks: vec![],
                }),
                None => Ok(ServiceSelection {
                    service_name: "analytical".into(),
                    confidence: self.confidence,
                    fallbacks: vec!["factual".into(), "creative".into()],
                }),
            }
        }
    }

    struct FailingSelector;

    #[async_trait]
    impl ReasoningSelector for FailingSelector {
        async fn select(
            &self,
            _ctx: &DecisionContext,
        ) -> Result<ServiceSelection, CollaboratorError> {
            Err(CollaboratorError::Selector("model offline".into()))
        }
    }

    struct FailingEscalation;

    #[async_trait]
    impl EscalationService for FailingEscalation {
        async fn evaluate_and_escalate(
            &self,
            _request: EscalationRequest,
        ) -> Result<EscalationOutcome, CollaboratorError> {
            Err(CollaboratorError::Escalation("escalation backend down".into()))
        }
    }

    /// Blocks until released.
    struct GatedSelector(Arc<Notify>);

    #[async_trait]
    impl ReasoningSelector for GatedSelector {
        async fn select(
            &self,
            _ctx: &DecisionContext,
        ) -> Result<ServiceSelection, CollaboratorError> {
            self.0.notified().await;
            Ok(ServiceSelection {
                service_name: "analytical".into(),
                confidence: 0.9,
                fallbacks: vec![],
            })
        }
    }

    struct SlowSelector(Duration);

    #[async_trait]
    impl ReasoningSelector for SlowSelector {
        async fn select(
            &self,
            _ctx: &DecisionContext,
        ) -> Result<ServiceSelection, CollaboratorError> {
            tokio::time::sleep(self.0).await;
            Ok(ServiceSelection {
                service_name: "analytical".into(),
                confidence: 0.9,
                fallbacks: vec![],
            })
        }
    }

    fn engine_with(selector: Arc<dyn ReasoningSelector>) -> WorkflowEngine {
        let escalation = Arc::new(RetryEscalation::new(selector.clone()));
        WorkflowEngine::new(WorkflowSettings::default(), selector, escalation)
    }

    fn fixed(confidence: f64, alt_confidence: f64) -> WorkflowEngine {
        engine_with(Arc::new(FixedSelector {
            confidence,
            alt_confidence,
        }))
    }

    fn ctx() -> DecisionContext {
        DecisionContext::new("user-1", "explain the tradeoffs of async runtimes")
    }

    async fn wait_until(mut cond: impl FnMut() -> bool) {
        for _ in 0..1000 {
            if cond() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("condition never became true");
    }

    #[test]
    fn templates_include_aliases() {
        let engine = fixed(0.9, 0.9);
        let names = engine.available_templates();
        for expected in ["complex", "quick", QUICK_TEMPLATE, COMPLEX_TEMPLATE] {
            assert!(names.contains(&expected.to_string()), "missing {expected}");
        }
        assert!(engine.template("quick").is_some());
    }

    #[test]
    fn alias_names_cannot_be_registered() {
        let engine = fixed(0.9, 0.9);
        let shadowing = WorkflowTemplate::new(
            "quick",
            "would be hidden behind the alias",
            vec![DecisionStep::new("select", StepKind::SelectService)],
        );
        assert!(matches!(
            engine.register_template(shadowing),
            Err(WorkflowError::InvalidTemplate { .. })
        ));
        assert_eq!(engine.template("quick").unwrap().name, QUICK_TEMPLATE);
    }

    #[tokio::test]
    async fn skipped_steps_count_towards_progress() {
        let gate = Arc::new(Notify::new());
        let engine = Arc::new(engine_with(Arc::new(GatedSelector(gate.clone()))));
        engine
            .register_template(WorkflowTemplate::new(
                "retry_then_select",
                "",
                vec![
                    DecisionStep::new("retry", StepKind::Escalate)
                        .when(StepCondition::PreviousFailed),
                    DecisionStep::new("select", StepKind::SelectService),
                ],
            ))
            .unwrap();

        let task = {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .execute_multi_step_decision(&ctx(), "retry_then_select")
                    .await
            })
        };
        wait_until(|| engine.active_workflow_count() == 1).await;
        let id = engine.active_workflow_ids().remove(0);
        wait_until(|| {
            engine
                .workflow_status(&id)
                .is_some_and(|s| s.current_step.as_deref() == Some("select"))
        })
        .await;
        let status = engine.workflow_status(&id).unwrap();
        assert_eq!(status.steps_done, 1);
        assert_eq!(status.total_steps, 2);

        gate.notify_one();
        let result = task.await.unwrap();
        assert!(result.success);
        assert_eq!(result.skipped_steps, 1);
    }

    #[tokio::test]
    async fn confident_quick_workflow_skips_escalation() {
        let engine = fixed(0.9, 0.5);
        let result = engine.execute_multi_step_decision(&ctx(), QUICK_TEMPLATE).await;

        assert!(result.success);
        assert_eq!(result.state, WorkflowState::Completed);
        assert_eq!(result.escalation.attempts, 0);
        assert!(!result.escalation.triggered);
        assert_eq!(result.completed_steps, 2);
        assert_eq!(result.skipped_steps, 1);
        assert!((result.final_confidence - 0.9).abs() < 1e-12);
        assert_eq!(result.confidence_progression, vec![0.9, 0.9]);
        assert_eq!(result.critical_path, vec!["select", "execute"]);
        assert_ne!(result.workflow_id, FAILED_WORKFLOW_ID);
        assert_eq!(engine.active_workflow_count(), 0);
    }

    #[tokio::test]
    async fn low_confidence_triggers_escalation() {
        let engine = fixed(0.4, 0.8);
        let result = engine.execute_multi_step_decision(&ctx(), "quick").await;

        assert!(result.escalation.triggered);
        assert!(!result.escalation.path.is_empty());
        assert!(result.escalation.attempts >= 1);
        assert!((result.final_confidence - 0.8).abs() < 1e-12);
        assert_eq!(result.selected_service.as_deref(), Some("factual"));
        assert!(result.success);
    }

    #[tokio::test]
    async fn unsuccessful_escalation_is_reported() {
        let engine = fixed(0.3, 0.35);
        let result = engine.execute_multi_step_decision(&ctx(), QUICK_TEMPLATE).await;

        assert!(result.escalation.triggered);
        assert_eq!(result.escalation.attempts, 2);
        assert!(result.final_confidence < 0.7);
        assert!(result.recommendations.iter().any(|r| r.contains("below")));
    }

    #[tokio::test]
    async fn unknown_template_yields_sentinel() {
        let engine = fixed(0.9, 0.9);
        let result = engine.execute_multi_step_decision(&ctx(), "does_not_exist").await;

        assert!(!result.success);
        assert_eq!(result.workflow_id, "failed");
        assert!(result.reasoning_trail[0].contains("does_not_exist"));
        assert!(result.recommendations.iter().any(|r| r.contains("simpler")));
        assert_eq!(engine.active_workflow_count(), 0);
    }

    #[tokio::test]
    async fn selector_fault_fails_only_its_step() {
        let selector: Arc<dyn ReasoningSelector> = Arc::new(FailingSelector);
        let engine = WorkflowEngine::new(
            WorkflowSettings::default(),
            selector,
            Arc::new(FailingEscalation),
        );
        let result = engine.execute_multi_step_decision(&ctx(), COMPLEX_TEMPLATE).await;

        assert!(!result.success);
        assert_eq!(result.state, WorkflowState::Completed);
        // select and escalate fail; analyze, execute and synthesize complete.
        assert_eq!(result.failed_steps, 2);
        assert_eq!(result.completed_steps, 3);
        assert_eq!(result.steps.len(), 5);
        assert!(result.steps[1].error.as_deref().unwrap().contains("model offline"));
        assert!(result.recommendations.iter().any(|r| r.contains("failed")));
    }

    #[tokio::test]
    async fn degradation_applies_on_failure() {
        let selector: Arc<dyn ReasoningSelector> = Arc::new(FixedSelector {
            confidence: 0.5,
            alt_confidence: 0.5,
        });
        let engine = WorkflowEngine::new(
            WorkflowSettings::default(),
            selector,
            Arc::new(FailingEscalation),
        );
        let result = engine.execute_multi_step_decision(&ctx(), QUICK_TEMPLATE).await;

        // 0.5 after select, halved when escalation fails.
        assert!((result.final_confidence - 0.25).abs() < 1e-12);
        assert_eq!(result.failed_steps, 1);
    }

    #[tokio::test]
    async fn concurrent_workflows_drain_active_table() {
        let engine = Arc::new(fixed(0.4, 0.9));
        let failing = Arc::new(WorkflowEngine::new(
            WorkflowSettings::default(),
            Arc::new(FailingSelector),
            Arc::new(FailingEscalation),
        ));

        let mut handles = Vec::new();
        for template in [QUICK_TEMPLATE, COMPLEX_TEMPLATE, "quick", "bogus"] {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine.execute_multi_step_decision(&ctx(), template).await
            }));
        }
        for template in [QUICK_TEMPLATE, COMPLEX_TEMPLATE] {
            let failing = failing.clone();
            handles.push(tokio::spawn(async move {
                failing.execute_multi_step_decision(&ctx(), template).await
            }));
        }

        let mut ids = std::collections::HashSet::new();
        for h in handles {
            let result = h.await.unwrap();
            if result.workflow_id != FAILED_WORKFLOW_ID {
                assert!(ids.insert(result.workflow_id));
            }
        }
        assert_eq!(ids.len(), 5);
        assert_eq!(engine.active_workflow_count(), 0);
        assert_eq!(failing.active_workflow_count(), 0);
    }

    #[tokio::test]
    async fn cancel_stops_in_flight_workflow() {
        let gate = Arc::new(Notify::new());
        let engine = Arc::new(engine_with(Arc::new(GatedSelector(gate.clone()))));

        let task = {
            let engine = engine.clone();
            tokio::spawn(
                async move { engine.execute_multi_step_decision(&ctx(), QUICK_TEMPLATE).await },
            )
        };
        wait_until(|| engine.active_workflow_count() == 1).await;

        let id = engine.active_workflow_ids().remove(0);
        let status = engine.workflow_status(&id).unwrap();
        assert_eq!(status.template, QUICK_TEMPLATE);
        assert!(engine.cancel_workflow(&id));

        let result = task.await.unwrap();
        assert_eq!(result.state, WorkflowState::Cancelled);
        assert!(!result.success);
        assert_eq!(engine.active_workflow_count(), 0);
        assert!(engine.workflow_status(&id).is_none());
        assert!(!engine.cancel_workflow(&id));
    }

    #[tokio::test]
    async fn pause_holds_between_steps_until_resumed() {
        let gate = Arc::new(Notify::new());
        let engine = Arc::new(engine_with(Arc::new(GatedSelector(gate.clone()))));

        let task = {
            let engine = engine.clone();
            tokio::spawn(
                async move { engine.execute_multi_step_decision(&ctx(), QUICK_TEMPLATE).await },
            )
        };
        wait_until(|| engine.active_workflow_count() == 1).await;
        let id = engine.active_workflow_ids().remove(0);

        assert!(engine.pause_workflow(&id));
        gate.notify_one();
        wait_until(|| {
            engine
                .workflow_status(&id)
                .is_some_and(|s| s.state == WorkflowState::Paused)
        })
        .await;
        assert_eq!(engine.workflow_status(&id).unwrap().steps_done, 1);

        assert!(engine.resume_workflow(&id));
        let result = task.await.unwrap();
        assert!(result.success);
        assert_eq!(engine.active_workflow_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn wall_clock_budget_is_enforced() {
        let selector: Arc<dyn ReasoningSelector> = Arc::new(SlowSelector(Duration::from_secs(10)));
        let settings = WorkflowSettings {
            max_duration: Duration::from_secs(1),
            ..WorkflowSettings::default()
        };
        let escalation = Arc::new(RetryEscalation::new(selector.clone()));
        let engine = WorkflowEngine::new(settings, selector, escalation);

        let result = engine.execute_multi_step_decision(&ctx(), QUICK_TEMPLATE).await;
        assert_eq!(result.state, WorkflowState::TimedOut);
        assert!(!result.success);
        assert_eq!(result.failed_steps, 1);
        assert!(result.execution_time_ms < 2000);
    }

    #[tokio::test]
    async fn custom_templates_register_and_validate() {
        let engine = fixed(0.9, 0.9);
        let custom = WorkflowTemplate::new(
            "select_only",
            "just pick",
            vec![DecisionStep::new("pick", StepKind::SelectService)],
        );
        engine.register_template(custom).unwrap();
        assert!(engine.available_templates().contains(&"select_only".to_string()));

        let result = engine.execute_multi_step_decision(&ctx(), "select_only").await;
        assert!(result.success);
        assert_eq!(result.total_steps, 1);

        let invalid = WorkflowTemplate::new("empty", "", vec![]);
        assert!(engine.register_template(invalid).is_err());
    }

    #[tokio::test]
    async fn previous_failed_condition_runs_recovery_step() {
        let engine = WorkflowEngine::new(
            WorkflowSettings::default(),
            Arc::new(FailingSelector),
            Arc::new(FailingEscalation),
        );
        let template = WorkflowTemplate::new(
            "recover",
            "",
            vec![
                DecisionStep::new("select", StepKind::SelectService),
                DecisionStep::new("recover", StepKind::Synthesize)
                    .when(StepCondition::PreviousFailed),
                DecisionStep::new("again", StepKind::Synthesize)
                    .when(StepCondition::PreviousFailed),
            ],
        );
        engine.register_template(template).unwrap();

        let result = engine.execute_multi_step_decision(&ctx(), "recover").await;
        assert_eq!(result.steps[1].status, StepStatus::Completed);
        assert_eq!(result.steps[2].status, StepStatus::Skipped);
    }

    struct EchoTool;

    #[async_trait]
    impl ToolExecutor for EchoTool {
        async fn execute(&self, params: serde_json::Value) -> Result<ToolResult, ToolError> {
            Ok(ToolResult::ok("echo", params))
        }
    }

    #[tokio::test]
    async fn execute_step_uses_registry_tools() {
        let registry = Arc::new(ToolRegistry::new());
        registry
            .register(
                ToolDefinition::new("echo", "Echo", ToolCategory::Search, Arc::new(EchoTool))
                    .with_priority(ToolPriority::High)
                    .with_capabilities(["search"]),
            )
            .unwrap();
        let engine = fixed(0.9, 0.9).with_registry(registry.clone());

        let with_caps = ctx().with_capabilities(["search"]);
        let result = engine.execute_multi_step_decision(&with_caps, QUICK_TEMPLATE).await;
        assert!(result.success);
        assert_eq!(result.tool_results.len(), 1);
        assert_eq!(result.tool_results[0].data.as_ref().unwrap()["service"], "analytical");
        assert_eq!(registry.metrics("echo").unwrap().execution_count, 1);

        let without = engine.execute_multi_step_decision(&ctx(), QUICK_TEMPLATE).await;
        assert!(without.tool_results.is_empty());
    }
}
