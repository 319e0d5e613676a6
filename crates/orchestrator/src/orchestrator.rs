//! The orchestrator — one context object owning every component, and the
//! request pipeline that runs through them.
//!
//! ```text
//! request ─▶ DecisionMaker ─▶ modules ─▶ ToolRegistry (per module)
//!                                    └─▶ WorkflowEngine (optional)
//!            every stage ─▶ DecisionTracer
//! ```

use futures::future::join_all;
use maestro_config::AppConfig;
use maestro_core::{DecisionContext, ExecutionContext, ToolPriority};
use maestro_decision::{DecisionMaker, ModuleResolution, ProcessingModule};
use maestro_telemetry::{DecisionTracer, TraceStep, TraceStepKind};
use maestro_tools::{ToolRegistry, default_registry};
use maestro_workflow::{StepStatus, WorkflowEngine, WorkflowResult};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::request::{ModuleOutcome, OrchestrationRequest, OrchestrationResult};

const DEFAULT_CONFIDENCE: f64 = 0.7;

/// Owns the registry, decision maker, workflow engine and tracer.
///
/// Built once at startup; components are shared as `Arc`s so callers can
/// hold on to the pieces they need.
pub struct Orchestrator {
    config: AppConfig,
    registry: Arc<ToolRegistry>,
    decision: Arc<DecisionMaker>,
    workflows: Arc<WorkflowEngine>,
    tracer: Arc<DecisionTracer>,
}

impl Orchestrator {
    /// Build every component from configuration, with the MCP catalog
    /// loaded when `registry.load_catalog` is set.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::with_registry(config, Arc::new(default_registry(&config.registry)))
    }

    /// Build around an existing registry.
    pub fn with_registry(config: &AppConfig, registry: Arc<ToolRegistry>) -> Self {
        let workflows =
            WorkflowEngine::from_config(&config.workflow).with_registry(registry.clone());
        Self::with_components(
            config.clone(),
            registry,
            Arc::new(DecisionMaker::from_config(&config.decision)),
            Arc::new(workflows),
            Arc::new(DecisionTracer::from_config(&config.telemetry)),
        )
    }

    pub fn with_components(
        config: AppConfig,
        registry: Arc<ToolRegistry>,
        decision: Arc<DecisionMaker>,
        workflows: Arc<WorkflowEngine>,
        tracer: Arc<DecisionTracer>,
    ) -> Self {
        info!(
            tools = registry.len(),
            advanced_mapping = config.decision.advanced_mapping,
            "Orchestrator ready"
        );
        Self {
            config,
            registry,
            decision,
            workflows,
            tracer,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn decision_maker(&self) -> &Arc<DecisionMaker> {
        &self.decision
    }

    pub fn workflows(&self) -> &Arc<WorkflowEngine> {
        &self.workflows
    }

    pub fn tracer(&self) -> &Arc<DecisionTracer> {
        &self.tracer
    }

    /// Cancel in-flight tool executions and workflows.
    pub fn shutdown(&self) {
        info!("Shutting down orchestrator");
        self.workflows.cancel_all();
        self.registry.shutdown();
    }

    // ── Pipeline ──────────────────────────────────────────────────────

    /// Resolve, execute and trace one request. Never fails: every fault
    /// ends up in the result's `errors` and `success` fields.
    pub async fn handle(&self, request: OrchestrationRequest) -> OrchestrationResult {
        let started = Instant::now();
        let session = self.tracer.start_session(&request.user_id, &request.message);
        info!(session_id = %session, user_id = %request.user_id, "Handling request");

        self.trace(
            &session,
            TraceStep::new(TraceStepKind::RequestReceived, "request", "orchestrator").with_payload(
                json!({
                    "strategy": request.strategy,
                    "operation": request.operation,
                    "workflow": request.workflow,
                }),
            ),
        );

        // Resolve
        let resolve_started = Instant::now();
        let resolution = self.decision.resolve(&request.decision_input());
        self.trace(
            &session,
            TraceStep::new(TraceStepKind::StrategyResolution, "resolve", "decision_maker")
                .with_time(elapsed_ms(resolve_started))
                .with_payload(json!({
                    "source": resolution.source,
                    "operations": resolution.operations,
                    "modules": resolution.modules,
                })),
        );

        // Execute
        let priority = request
            .priority
            .or_else(|| resolution.mapping.as_ref().map(|m| m.priority))
            .unwrap_or_default();
        let parallel = resolution.mapping.as_ref().is_some_and(|m| m.parallel);
        let modules = self.run_modules(&session, &request, &resolution, priority, parallel).await;

        let mut errors: Vec<String> = modules
            .iter()
            .filter_map(|m| m.result.as_ref())
            .filter(|r| !r.success)
            .map(|r| format!("{}: {}", r.tool_used, r.error.as_deref().unwrap_or("failed")))
            .collect();

        // Workflow
        let workflow = match request.workflow.as_deref() {
            Some(template) => {
                Some(self.run_workflow(&session, &request, &resolution, template).await)
            }
            None => None,
        };
        if let Some(wf) = workflow.as_ref().filter(|wf| !wf.success) {
            errors.push(format!("workflow {} ended {:?}", wf.template, wf.state));
        }

        let success = !modules.iter().any(ModuleOutcome::is_failure)
            && workflow.as_ref().is_none_or(|wf| wf.success);
        let confidence = workflow
            .as_ref()
            .filter(|wf| wf.workflow_id != maestro_workflow::FAILED_WORKFLOW_ID)
            .map(|wf| wf.final_confidence)
            .unwrap_or_else(|| request.confidence.unwrap_or(DEFAULT_CONFIDENCE))
            .clamp(0.0, 1.0);
        let execution_time_ms = elapsed_ms(started);

        if let Some(mapping) = &resolution.mapping {
            self.decision.mapper().record_outcome(mapping, success, execution_time_ms);
        }

        let mut synthesis =
            TraceStep::new(TraceStepKind::ResponseSynthesis, "synthesize", "orchestrator")
                .with_confidence(confidence)
                .with_payload(json!({
                    "tools_run": modules.iter().filter(|m| m.result.is_some()).count(),
                    "errors": errors.len(),
                }));
        if !success {
            synthesis = synthesis.failed(errors.join("; "));
        }
        self.trace(&session, synthesis);

        let summary = json!({
            "success": success,
            "confidence": confidence,
            "modules": resolution.modules,
        });
        let trace = match self.tracer.end_session(&session, Some(summary)) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(session_id = %session, error = %e, "Could not close trace session");
                None
            }
        };

        info!(
            session_id = %session,
            success,
            confidence,
            elapsed_ms = execution_time_ms,
            "Request handled"
        );
        OrchestrationResult {
            session_id: session,
            success,
            confidence,
            resolution,
            modules,
            workflow,
            errors,
            execution_time_ms,
            trace,
        }
    }

    async fn run_modules(
        &self,
        session: &str,
        request: &OrchestrationRequest,
        resolution: &ModuleResolution,
        priority: ToolPriority,
        parallel: bool,
    ) -> Vec<ModuleOutcome> {
        let contexts: Vec<(ProcessingModule, ExecutionContext)> = resolution
            .modules
            .iter()
            .map(|module| (*module, self.execution_context(request, *module, priority)))
            .collect();

        let mut outcomes = Vec::with_capacity(contexts.len());
        if parallel && contexts.len() > 1 {
            debug!(modules = contexts.len(), "Running modules concurrently");
            let runs = contexts
                .iter()
                .map(|(module, ctx)| self.run_module(session, *module, ctx, &request.params));
            outcomes.extend(join_all(runs).await);
        } else {
            for (module, ctx) in &contexts {
                outcomes.push(self.run_module(session, *module, ctx, &request.params).await);
            }
        }
        outcomes
    }

    async fn run_module(
        &self,
        session: &str,
        module: ProcessingModule,
        ctx: &ExecutionContext,
        params: &serde_json::Value,
    ) -> ModuleOutcome {
        let candidates: Vec<String> = self
            .registry
            .discover_scored(ctx)
            .into_iter()
            .map(|s| s.tool.id.clone())
            .collect();
        self.trace(
            session,
            TraceStep::new(
                TraceStepKind::ToolDiscovery,
                format!("discover:{module}"),
                "tool_registry",
            )
            .with_payload(json!({
                "capabilities": ctx.required_capabilities,
                "candidates": candidates,
            })),
        );

        let result = if candidates.is_empty() {
            debug!(%module, "No available tool for module");
            None
        } else {
            self.registry.execute_best(params.clone(), ctx).await
        };

        if let Some(r) = &result {
            let mut step = TraceStep::new(
                TraceStepKind::ToolExecution,
                format!("execute:{module}"),
                "tool_registry",
            )
            .with_time(r.execution_time_ms)
            .with_payload(json!({
                "tool": r.tool_used,
                "requires_external_mcp": r.requires_external_mcp,
            }));
            if !r.success {
                step = step.failed(r.error.clone().unwrap_or_else(|| "tool failed".into()));
            }
            self.trace(session, step);
        }

        ModuleOutcome {
            module,
            capabilities: ctx.required_capabilities.clone(),
            candidates,
            result,
        }
    }

    async fn run_workflow(
        &self,
        session: &str,
        request: &OrchestrationRequest,
        resolution: &ModuleResolution,
        template: &str,
    ) -> WorkflowResult {
        let mut ctx = DecisionContext::new(&request.user_id, &request.message)
            .with_capabilities(resolution.required_capabilities());
        ctx.channel_id = request.channel_id.clone();

        let result = self.workflows.execute_multi_step_decision(&ctx, template).await;

        for step in &result.steps {
            let mut trace = TraceStep::new(
                TraceStepKind::WorkflowStep,
                format!("workflow:{}", step.step_id),
                "workflow_engine",
            )
            .with_time(step.execution_time_ms)
            .with_payload(json!({
                "kind": step.kind,
                "status": step.status,
                "detail": step.detail,
            }));
            if let Some(c) = step.confidence {
                trace = trace.with_confidence(c);
            }
            if step.status == StepStatus::Failed {
                trace = trace.failed(step.error.clone().unwrap_or_else(|| "step failed".into()));
            }
            self.trace(session, trace);
        }

        if result.escalation.triggered {
            let mut trace =
                TraceStep::new(TraceStepKind::Escalation, "escalation", "workflow_engine")
                    .with_confidence(result.final_confidence)
                    .with_payload(json!({
                        "attempts": result.escalation.attempts,
                        "path": result.escalation.path,
                        "next_action": result.escalation.recommend_next_action,
                    }));
            if result.final_confidence < self.workflows.settings().confidence_threshold {
                trace = trace.failed("confidence below threshold after escalation");
            }
            self.trace(session, trace);
        }

        if result.steps.is_empty() {
            // Template never started.
            self.trace(
                session,
                TraceStep::new(
                    TraceStepKind::WorkflowStep,
                    format!("workflow:{template}"),
                    "workflow_engine",
                )
                .failed(result.reasoning_trail.join("; ")),
            );
        }
        result
    }

    fn execution_context(
        &self,
        request: &OrchestrationRequest,
        module: ProcessingModule,
        priority: ToolPriority,
    ) -> ExecutionContext {
        let mut ctx = ExecutionContext::new(&request.user_id, &request.message)
            .with_priority(priority)
            .with_capabilities(module.required_capabilities().iter().copied());
        ctx.channel_id = request.channel_id.clone();
        if let Some(ms) = request.timeout_ms {
            ctx = ctx.with_timeout(Duration::from_millis(ms));
        }
        ctx
    }

    fn trace(&self, session: &str, step: TraceStep) {
        if let Err(e) = self.tracer.add_trace(session, step) {
            // The session can be evicted mid-request under heavy load.
            warn!(session_id = %session, error = %e, "Dropping trace");
        }
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}
