//! The tool registry — discovery, ranking, bounded-time execution and
//! health tracking for capability-tagged tools.
//!
//! The registry is shared behind an `Arc` and is safe to use from many
//! tasks at once: definitions and metrics live in one `RwLock`-guarded
//! map, and no lock is ever held across an `.await`.

use chrono::{DateTime, Utc};
use futures::FutureExt;
use maestro_config::RegistryConfig;
use maestro_core::{
    ExecutionContext, ToolCategory, ToolDefinition, ToolDescriptor, ToolError, ToolResult,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::deadline::{Deadline, race};
use crate::environment::{ConfiguredEnv, Environment, ProcessEnv};
use crate::metrics::ExecutionMetrics;
use crate::scoring;

/// Tools used successfully within this window count as healthy when they
/// have no health check of their own.
const RECENT_SUCCESS_WINDOW_HOURS: i64 = 1;

/// Reliability above which a tool counts as healthy in [`RegistryStatus`].
const HEALTHY_RELIABILITY: f64 = 0.8;

/// Tunables for availability, timeouts and fallback.
#[derive(Debug, Clone)]
pub struct RegistrySettings {
    pub default_timeout: Duration,
    pub health_check_timeout: Duration,
    pub min_reliability: f64,
    pub reliability_grace_executions: u64,
    pub max_fallbacks: usize,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self::from(&RegistryConfig::default())
    }
}

impl From<&RegistryConfig> for RegistrySettings {
    fn from(config: &RegistryConfig) -> Self {
        Self {
            default_timeout: Duration::from_millis(config.default_timeout_ms),
            health_check_timeout: Duration::from_millis(config.health_check_timeout_ms),
            min_reliability: config.min_reliability,
            reliability_grace_executions: config.reliability_grace_executions,
            max_fallbacks: config.max_fallbacks,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct HealthRecord {
    healthy: bool,
    checked_at: DateTime<Utc>,
}

struct Entry {
    tool: Arc<ToolDefinition>,
    metrics: ExecutionMetrics,
    health: Option<HealthRecord>,
}

/// A discovered tool with the score it was ranked by.
#[derive(Debug, Clone)]
pub struct ScoredTool {
    pub tool: Arc<ToolDefinition>,
    pub score: f64,
}

/// Registry-wide snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryStatus {
    pub total_tools: usize,
    pub available_tools: usize,
    pub healthy_tools: usize,
    pub categories_available: Vec<ToolCategory>,
    pub performance_metrics: AggregatePerformance,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AggregatePerformance {
    pub total_executions: u64,
    pub successful_executions: u64,
    pub overall_reliability: f64,
    pub avg_response_time_ms: f64,
}

/// A registry of capability-tagged tools.
pub struct ToolRegistry {
    entries: RwLock<HashMap<String, Entry>>,
    env: Arc<dyn Environment>,
    settings: RegistrySettings,
    shutdown: CancellationToken,
}

impl ToolRegistry {
    /// Default settings, process environment.
    pub fn new() -> Self {
        Self::with_settings(RegistrySettings::default(), Arc::new(ProcessEnv))
    }

    pub fn with_settings(settings: RegistrySettings, env: Arc<dyn Environment>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            env,
            settings,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn from_config(config: &RegistryConfig) -> Self {
        Self::with_settings(
            RegistrySettings::from(config),
            Arc::new(ConfiguredEnv::new(&config.environment_keys)),
        )
    }

    pub fn settings(&self) -> &RegistrySettings {
        &self.settings
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Entry>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Entry>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }

    // ── Registration ──────────────────────────────────────────────────

    /// Register a tool. Replaces any existing tool with the same id and
    /// starts it with fresh metrics.
    pub fn register(&self, tool: ToolDefinition) -> Result<(), ToolError> {
        tool.validate()?;
        let id = tool.id.clone();
        info!(
            tool_id = %id,
            category = %tool.category,
            priority = %tool.priority,
            "Registering tool"
        );
        self.write().insert(
            id,
            Entry {
                tool: Arc::new(tool),
                metrics: ExecutionMetrics::default(),
                health: None,
            },
        );
        Ok(())
    }

    /// Remove a tool and its metrics, returning the removed definition.
    pub fn unregister(&self, id: &str) -> Option<Arc<ToolDefinition>> {
        let removed = self.write().remove(id).map(|e| e.tool);
        if removed.is_some() {
            info!(tool_id = %id, "Unregistered tool");
        }
        removed
    }

    pub fn get(&self, id: &str) -> Option<Arc<ToolDefinition>> {
        self.read().get(id).map(|e| e.tool.clone())
    }

    pub fn metrics(&self, id: &str) -> Option<ExecutionMetrics> {
        self.read().get(id).map(|e| e.metrics.clone())
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// All registered tools as serializable descriptors, sorted by id.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        let entries = self.read();
        let mut out: Vec<ToolDescriptor> = entries
            .values()
            .map(|e| {
                e.tool
                    .to_descriptor(e.metrics.performance(e.health.map(|h| h.checked_at)))
            })
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    // ── Availability & discovery ──────────────────────────────────────

    /// Why a tool cannot be offered right now, or `None` if it can.
    fn unavailability(&self, entry: &Entry, entries: &HashMap<String, Entry>) -> Option<String> {
        if let Some(key) = entry.tool.required_env.iter().find(|k| !self.env.has(k)) {
            return Some(format!("environment key {key}"));
        }
        if let Some(dep) = entry
            .tool
            .dependencies
            .iter()
            .find(|d| !entries.contains_key(d.as_str()))
        {
            return Some(format!("dependency {dep}"));
        }
        if entry.metrics.execution_count > self.settings.reliability_grace_executions
            && entry.metrics.reliability() < self.settings.min_reliability
        {
            return Some(format!(
                "reliability {:.2} below {:.2}",
                entry.metrics.reliability(),
                self.settings.min_reliability
            ));
        }
        None
    }

    /// Whether a registered tool passes the availability gate.
    pub fn is_available(&self, id: &str) -> bool {
        let entries = self.read();
        entries
            .get(id)
            .is_some_and(|e| self.unavailability(e, &entries).is_none())
    }

    /// Available tools matching the request, best first, with scores.
    pub fn discover_scored(&self, ctx: &ExecutionContext) -> Vec<ScoredTool> {
        let entries = self.read();
        let mut found: Vec<ScoredTool> = entries
            .values()
            .filter(|e| match self.unavailability(e, &entries) {
                Some(reason) => {
                    debug!(
                        tool_id = %e.tool.id,
                        %reason,
                        "Tool unavailable, excluded from discovery"
                    );
                    false
                }
                None => true,
            })
            .filter(|e| e.tool.matches_capabilities(&ctx.required_capabilities))
            .map(|e| ScoredTool {
                tool: e.tool.clone(),
                score: scoring::score(&e.tool, &e.metrics, ctx),
            })
            .collect();

        found.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.tool.id.cmp(&b.tool.id))
        });
        found
    }

    /// Available tools matching the request, best first.
    pub fn discover(&self, ctx: &ExecutionContext) -> Vec<Arc<ToolDefinition>> {
        self.discover_scored(ctx)
            .into_iter()
            .map(|s| s.tool)
            .collect()
    }

    // ── Execution ─────────────────────────────────────────────────────

    /// Execute one tool under the request's timeout (or the default).
    ///
    /// Executor errors, panics, timeouts and shutdown all come back as a
    /// failed [`ToolResult`] and count against the tool's reliability.
    /// Only an unknown id is an `Err`.
    pub async fn execute(
        &self,
        id: &str,
        params: serde_json::Value,
        ctx: &ExecutionContext,
    ) -> Result<ToolResult, ToolError> {
        let tool = self.get(id).ok_or_else(|| ToolError::NotFound(id.to_string()))?;
        let timeout = ctx.timeout().unwrap_or(self.settings.default_timeout);

        debug!(tool_id = %id, timeout_ms = timeout.as_millis() as u64, "Executing tool");
        let started = tokio::time::Instant::now();
        let call = AssertUnwindSafe(tool.executor.execute(params)).catch_unwind();
        let outcome = race(call, timeout, &self.shutdown).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let mut result = match outcome {
            Deadline::Completed(Ok(Ok(result))) => result,
            Deadline::Completed(Ok(Err(e))) => ToolResult::failure(id, e.to_string()),
            Deadline::Completed(Err(_panic)) => ToolResult::failure(
                id,
                ToolError::ExecutionFailed {
                    tool_name: id.to_string(),
                    reason: "executor panicked".into(),
                }
                .to_string(),
            ),
            Deadline::TimedOut => ToolResult::failure(
                id,
                ToolError::Timeout {
                    tool_name: id.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                }
                .to_string(),
            ),
            Deadline::Cancelled => {
                ToolResult::failure(id, ToolError::Cancelled(id.to_string()).to_string())
            }
        };
        if result.tool_used.is_empty() {
            result.tool_used = id.to_string();
        }
        result.execution_time_ms = elapsed_ms;

        if result.success {
            debug!(tool_id = %id, elapsed_ms, "Tool succeeded");
        } else {
            warn!(tool_id = %id, elapsed_ms, error = ?result.error, "Tool failed");
        }
        self.record(id, result.success, elapsed_ms);
        Ok(result)
    }

    fn record(&self, id: &str, success: bool, elapsed_ms: u64) {
        if let Some(entry) = self.write().get_mut(id) {
            entry.metrics.record(success, elapsed_ms, Utc::now());
        }
    }

    /// Execute the best tool for the request. When it fails and the request
    /// allows fallback, the next-ranked tools are tried (up to
    /// `max_fallbacks`). Returns `None` when nothing matched.
    pub async fn execute_best(
        &self,
        params: serde_json::Value,
        ctx: &ExecutionContext,
    ) -> Option<ToolResult> {
        let attempts = if ctx.fallback_allowed {
            1 + self.settings.max_fallbacks
        } else {
            1
        };

        let mut last = None;
        for tool in self.discover(ctx).into_iter().take(attempts) {
            match self.execute(&tool.id, params.clone(), ctx).await {
                Ok(result) if result.success => return Some(result),
                Ok(result) => {
                    debug!(tool_id = %tool.id, "Falling back to next ranked tool");
                    last = Some(result);
                }
                // Unregistered between discovery and execution.
                Err(e) => warn!(tool_id = %tool.id, error = %e, "Discovered tool vanished"),
            }
        }
        last
    }

    /// Cancel every in-flight execution. Later executions fail immediately.
    pub fn shutdown(&self) {
        info!("Tool registry shutting down");
        self.shutdown.cancel();
    }

    // ── Health ────────────────────────────────────────────────────────

    /// Run every tool's health check concurrently.
    ///
    /// Tools without a health check are healthy only if they succeeded
    /// within the last hour. A check that exceeds the health-check timeout
    /// counts as failed.
    pub async fn run_health_checks(&self) -> HashMap<String, bool> {
        let tools: Vec<Arc<ToolDefinition>> =
            self.read().values().map(|e| e.tool.clone()).collect();
        let limit = self.settings.health_check_timeout;

        let checks = tools.into_iter().map(|tool| async move {
            let checked = match tokio::time::timeout(limit, tool.executor.health_check()).await {
                Ok(result) => result,
                Err(_) => Some(false),
            };
            (tool.id.clone(), checked)
        });
        let results = futures::future::join_all(checks).await;

        let now = Utc::now();
        let recent = chrono::Duration::hours(RECENT_SUCCESS_WINDOW_HOURS);
        let mut entries = self.write();
        let mut report = HashMap::with_capacity(results.len());

        for (id, checked) in results {
            let Some(entry) = entries.get_mut(&id) else {
                continue;
            };
            let healthy = match checked {
                Some(ok) => {
                    entry.health = Some(HealthRecord {
                        healthy: ok,
                        checked_at: now,
                    });
                    ok
                }
                None => entry
                    .metrics
                    .last_success
                    .is_some_and(|t| now.signed_duration_since(t) <= recent),
            };
            if !healthy {
                warn!(tool_id = %id, "Tool failed health check");
            }
            report.insert(id, healthy);
        }
        report
    }

    // ── Status ────────────────────────────────────────────────────────

    pub fn status(&self) -> RegistryStatus {
        let entries = self.read();
        let mut available = 0;
        let mut healthy = 0;
        let mut categories = BTreeSet::new();
        let mut perf = AggregatePerformance::default();
        let mut total_time_ms = 0u64;

        for entry in entries.values() {
            if self.unavailability(entry, &entries).is_none() {
                available += 1;
                categories.insert(entry.tool.category);
            }

            let failed_check = entry.health.is_some_and(|h| !h.healthy);
            let reliable = entry.metrics.execution_count == 0
                || entry.metrics.reliability() > HEALTHY_RELIABILITY;
            if reliable && !failed_check {
                healthy += 1;
            }

            perf.total_executions += entry.metrics.execution_count;
            perf.successful_executions += entry.metrics.success_count;
            total_time_ms += entry.metrics.total_time_ms;
        }

        if perf.total_executions > 0 {
            perf.overall_reliability =
                perf.successful_executions as f64 / perf.total_executions as f64;
            perf.avg_response_time_ms = total_time_ms as f64 / perf.total_executions as f64;
        } else {
            perf.overall_reliability = 1.0;
        }

        RegistryStatus {
            total_tools: entries.len(),
            available_tools: available,
            healthy_tools: healthy,
            categories_available: categories.into_iter().collect(),
            performance_metrics: perf,
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::StaticEnv;
    use async_trait::async_trait;
    use maestro_core::{ToolExecutor, ToolPriority};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Succeeds or fails on demand, counting calls.
    struct ScriptedTool {
        succeed: bool,
        calls: AtomicUsize,
    }

    impl ScriptedTool {
        fn new(succeed: bool) -> Arc<Self> {
            Arc::new(Self {
                succeed,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ToolExecutor for ScriptedTool {
        async fn execute(&self, params: serde_json::Value) -> Result<ToolResult, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.succeed {
                Ok(ToolResult::ok("", params))
            } else {
                Err(ToolError::ExecutionFailed {
                    tool_name: "scripted".into(),
                    reason: "scripted failure".into(),
                })
            }
        }
    }

    struct HangingTool;

    #[async_trait]
    impl ToolExecutor for HangingTool {
        async fn execute(&self, _params: serde_json::Value) -> Result<ToolResult, ToolError> {
            std::future::pending().await
        }
    }

    struct PanickingTool;

    #[async_trait]
    impl ToolExecutor for PanickingTool {
        async fn execute(&self, _params: serde_json::Value) -> Result<ToolResult, ToolError> {
            panic!("boom")
        }
    }

    struct CheckedTool(bool);

    #[async_trait]
    impl ToolExecutor for CheckedTool {
        async fn execute(&self, _params: serde_json::Value) -> Result<ToolResult, ToolError> {
            Ok(ToolResult::ok("checked", serde_json::Value::Null))
        }

        async fn health_check(&self) -> Option<bool> {
            Some(self.0)
        }
    }

    fn def(
        id: &str,
        category: ToolCategory,
        priority: ToolPriority,
        caps: &[&str],
        executor: Arc<dyn ToolExecutor>,
    ) -> ToolDefinition {
        ToolDefinition::new(id, id, category, executor)
            .with_priority(priority)
            .with_capabilities(caps.iter().copied())
    }

    fn registry_with_env(keys: &[&str]) -> ToolRegistry {
        ToolRegistry::with_settings(
            RegistrySettings::default(),
            Arc::new(StaticEnv::new(keys.iter().copied())),
        )
    }

    fn ctx(caps: &[&str]) -> ExecutionContext {
        ExecutionContext::new("user-1", "find something").with_capabilities(caps.iter().copied())
    }

    #[test]
    fn register_replaces_and_resets_metrics() {
        let registry = ToolRegistry::new();
        let tool = def(
            "a",
            ToolCategory::Search,
            ToolPriority::High,
            &["search"],
            ScriptedTool::new(true),
        );
        registry.register(tool.clone()).unwrap();
        registry.record("a", false, 10);
        assert_eq!(registry.metrics("a").unwrap().execution_count, 1);

        registry.register(tool).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.metrics("a").unwrap().execution_count, 0);
    }

    #[tokio::test]
    async fn unregister_removes_tool_from_discovery_and_execution() {
        let registry = ToolRegistry::new();
        let tool = def(
            "web",
            ToolCategory::Search,
            ToolPriority::High,
            &["search"],
            ScriptedTool::new(true),
        );
        registry.register(tool).unwrap();
        registry.record("web", true, 10);

        let removed = registry.unregister("web").unwrap();
        assert_eq!(removed.id, "web");
        assert!(registry.is_empty());
        assert!(registry.metrics("web").is_none());
        assert!(registry.discover(&ctx(&["search"])).is_empty());
        assert!(matches!(
            registry.execute("web", serde_json::json!({}), &ctx(&["search"])).await,
            Err(ToolError::NotFound(id)) if id == "web"
        ));

        assert!(registry.unregister("web").is_none());
        assert!(registry.unregister("never-registered").is_none());
    }

    #[test]
    fn register_rejects_empty_capabilities() {
        let registry = ToolRegistry::new();
        let tool = def("empty", ToolCategory::Ai, ToolPriority::Low, &[], ScriptedTool::new(true));
        assert!(matches!(
            registry.register(tool),
            Err(ToolError::InvalidDefinition(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn discover_excludes_missing_environment_keys() {
        let registry = registry_with_env(&["BRAVE_API_KEY"]);
        registry
            .register(
                def(
                    "brave",
                    ToolCategory::Search,
                    ToolPriority::High,
                    &["search"],
                    ScriptedTool::new(true),
                )
                .with_required_env(["BRAVE_API_KEY"]),
            )
            .unwrap();
        registry
            .register(
                def(
                    "perplexity",
                    ToolCategory::Search,
                    ToolPriority::High,
                    &["search"],
                    ScriptedTool::new(true),
                )
                .with_required_env(["PERPLEXITY_API_KEY"]),
            )
            .unwrap();

        let ids: Vec<String> = registry
            .discover(&ctx(&["search"]))
            .iter()
            .map(|t| t.id.clone())
            .collect();
        assert_eq!(ids, vec!["brave"]);
        assert!(!registry.is_available("perplexity"));
    }

    #[test]
    fn discover_filters_by_capability_and_wildcard() {
        let registry = ToolRegistry::new();
        registry
            .register(def(
                "mem",
                ToolCategory::Memory,
                ToolPriority::Medium,
                &["memory"],
                ScriptedTool::new(true),
            ))
            .unwrap();
        registry
            .register(def(
                "web",
                ToolCategory::Search,
                ToolPriority::Medium,
                &["search"],
                ScriptedTool::new(true),
            ))
            .unwrap();
        registry
            .register(def(
                "any",
                ToolCategory::Ai,
                ToolPriority::Low,
                &["*"],
                ScriptedTool::new(true),
            ))
            .unwrap();

        let ids: Vec<String> = registry
            .discover(&ctx(&["memory"]))
            .iter()
            .map(|t| t.id.clone())
            .collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"mem".to_string()));
        assert!(ids.contains(&"any".to_string()));

        assert_eq!(registry.discover(&ctx(&[])).len(), 3);
    }

    #[test]
    fn discover_requires_registered_dependencies() {
        let registry = ToolRegistry::new();
        registry
            .register(
                def(
                    "summarizer",
                    ToolCategory::Content,
                    ToolPriority::Medium,
                    &["content"],
                    ScriptedTool::new(true),
                )
                .with_dependencies(["filesystem"]),
            )
            .unwrap();
        assert!(registry.discover(&ctx(&["content"])).is_empty());

        registry
            .register(def(
                "filesystem",
                ToolCategory::Content,
                ToolPriority::Low,
                &["file_read"],
                ScriptedTool::new(true),
            ))
            .unwrap();
        assert_eq!(registry.discover(&ctx(&["content"])).len(), 1);
    }

    #[tokio::test]
    async fn unreliable_tool_hidden_after_grace_period() {
        let registry = ToolRegistry::new();
        registry
            .register(def(
                "flaky",
                ToolCategory::Search,
                ToolPriority::High,
                &["search"],
                ScriptedTool::new(false),
            ))
            .unwrap();

        for _ in 0..5 {
            registry.execute("flaky", serde_json::json!({}), &ctx(&[])).await.unwrap();
        }
        // Five failures: still inside the grace period.
        assert_eq!(registry.discover(&ctx(&["search"])).len(), 1);

        registry.execute("flaky", serde_json::json!({}), &ctx(&[])).await.unwrap();
        assert!(registry.discover(&ctx(&["search"])).is_empty());
    }

    #[tokio::test]
    async fn critical_reliable_tool_ranks_first() {
        let registry = ToolRegistry::new();
        registry
            .register(def(
                "primary",
                ToolCategory::Search,
                ToolPriority::Critical,
                &["search"],
                ScriptedTool::new(true),
            ))
            .unwrap();
        registry
            .register(def(
                "secondary",
                ToolCategory::Search,
                ToolPriority::High,
                &["search"],
                ScriptedTool::new(true),
            ))
            .unwrap();
        registry
            .register(def(
                "shaky",
                ToolCategory::Search,
                ToolPriority::Critical,
                &["search"],
                ScriptedTool::new(false),
            ))
            .unwrap();

        let c = ctx(&["search"]).with_priority(ToolPriority::Critical);
        for _ in 0..10 {
            registry.execute("primary", serde_json::json!({}), &c).await.unwrap();
        }
        for _ in 0..3 {
            registry.execute("shaky", serde_json::json!({}), &c).await.unwrap();
        }

        assert_eq!(registry.metrics("primary").unwrap().reliability(), 1.0);
        let ranked = registry.discover(&c);
        assert_eq!(ranked[0].id, "primary");
    }

    #[tokio::test]
    async fn execute_unknown_tool_is_an_error() {
        let registry = ToolRegistry::new();
        let err = registry
            .execute("nonexistent", serde_json::json!({}), &ctx(&[]))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[tokio::test]
    async fn executor_error_becomes_failed_result() {
        let registry = ToolRegistry::new();
        registry
            .register(def(
                "broken",
                ToolCategory::Content,
                ToolPriority::Low,
                &["content"],
                ScriptedTool::new(false),
            ))
            .unwrap();

        let result = registry.execute("broken", serde_json::json!({}), &ctx(&[])).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.tool_used, "broken");
        assert!(result.error.unwrap().contains("scripted failure"));
        assert_eq!(registry.metrics("broken").unwrap().reliability(), 0.0);
    }

    #[tokio::test]
    async fn executor_panic_is_contained() {
        let registry = ToolRegistry::new();
        registry
            .register(def(
                "panicky",
                ToolCategory::Ai,
                ToolPriority::Low,
                &["ai"],
                Arc::new(PanickingTool),
            ))
            .unwrap();

        let result = registry.execute("panicky", serde_json::json!({}), &ctx(&[])).await.unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("panicked"));
        assert_eq!(registry.metrics("panicky").unwrap().execution_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_tool_times_out() {
        let registry = ToolRegistry::new();
        registry
            .register(def(
                "hang",
                ToolCategory::Search,
                ToolPriority::Low,
                &["search"],
                Arc::new(HangingTool),
            ))
            .unwrap();

        let c = ctx(&[]).with_timeout(Duration::from_millis(250));
        let started = tokio::time::Instant::now();
        let result = registry.execute("hang", serde_json::json!({}), &c).await.unwrap();

        assert!(!result.success);
        assert!(result.error.unwrap().contains("timed out"));
        assert!(started.elapsed() < Duration::from_millis(300));
        assert_eq!(registry.metrics("hang").unwrap().success_count, 0);
    }

    #[tokio::test]
    async fn shutdown_cancels_executions() {
        let registry = ToolRegistry::new();
        registry
            .register(def(
                "hang",
                ToolCategory::Search,
                ToolPriority::Low,
                &["search"],
                Arc::new(HangingTool),
            ))
            .unwrap();
        registry.shutdown();

        let result = registry.execute("hang", serde_json::json!({}), &ctx(&[])).await.unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("cancelled"));
    }

    #[tokio::test]
    async fn execute_best_falls_back() {
        let registry = ToolRegistry::new();
        let failing = ScriptedTool::new(false);
        let working = ScriptedTool::new(true);
        registry
            .register(def(
                "first",
                ToolCategory::Search,
                ToolPriority::Critical,
                &["search"],
                failing.clone(),
            ))
            .unwrap();
        registry
            .register(def(
                "second",
                ToolCategory::Search,
                ToolPriority::Low,
                &["search"],
                working.clone(),
            ))
            .unwrap();

        let result = registry
            .execute_best(serde_json::json!({"q": "rust"}), &ctx(&["search"]))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.tool_used, "second");
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);

        // After its failure "first" ranks below "second".
        let ranked = registry.discover(&ctx(&["search"]));
        assert_eq!(ranked[0].id, "second");
    }

    #[tokio::test]
    async fn execute_best_respects_no_fallback() {
        let registry = ToolRegistry::new();
        let working = ScriptedTool::new(true);
        registry
            .register(def(
                "first",
                ToolCategory::Search,
                ToolPriority::Critical,
                &["search"],
                ScriptedTool::new(false),
            ))
            .unwrap();
        registry
            .register(def(
                "second",
                ToolCategory::Search,
                ToolPriority::Low,
                &["search"],
                working.clone(),
            ))
            .unwrap();

        let no_fallback = ctx(&["search"]).without_fallback();
        let result = registry.execute_best(serde_json::json!({}), &no_fallback).await.unwrap();
        assert_eq!(result.tool_used, "first");
        assert!(!result.success);
        assert_eq!(working.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn execute_best_without_match_is_none() {
        let registry = ToolRegistry::new();
        assert!(registry.execute_best(serde_json::json!({}), &ctx(&["search"])).await.is_none());
    }

    #[tokio::test]
    async fn health_checks_record_results() {
        let registry = ToolRegistry::new();
        registry
            .register(def(
                "ok",
                ToolCategory::Memory,
                ToolPriority::Low,
                &["memory"],
                Arc::new(CheckedTool(true)),
            ))
            .unwrap();
        registry
            .register(def(
                "sick",
                ToolCategory::Memory,
                ToolPriority::Low,
                &["memory"],
                Arc::new(CheckedTool(false)),
            ))
            .unwrap();
        registry
            .register(def(
                "unused",
                ToolCategory::Search,
                ToolPriority::Low,
                &["search"],
                ScriptedTool::new(true),
            ))
            .unwrap();
        registry
            .register(def(
                "used",
                ToolCategory::Search,
                ToolPriority::Low,
                &["search"],
                ScriptedTool::new(true),
            ))
            .unwrap();
        registry.execute("used", serde_json::json!({}), &ctx(&[])).await.unwrap();

        let report = registry.run_health_checks().await;
        assert_eq!(report["ok"], true);
        assert_eq!(report["sick"], false);
        assert_eq!(report["unused"], false);
        assert_eq!(report["used"], true);

        let descriptors = registry.descriptors();
        let ok = descriptors.iter().find(|d| d.id == "ok").unwrap();
        assert!(ok.performance.last_health_check.is_some());
        let unused = descriptors.iter().find(|d| d.id == "unused").unwrap();
        assert!(unused.performance.last_health_check.is_none());
    }

    #[tokio::test]
    async fn status_aggregates() {
        let registry = registry_with_env(&[]);
        registry
            .register(def(
                "mem",
                ToolCategory::Memory,
                ToolPriority::Critical,
                &["memory"],
                ScriptedTool::new(true),
            ))
            .unwrap();
        registry
            .register(def(
                "bad",
                ToolCategory::Search,
                ToolPriority::High,
                &["search"],
                ScriptedTool::new(false),
            ))
            .unwrap();
        registry
            .register(
                def(
                    "gated",
                    ToolCategory::Database,
                    ToolPriority::Low,
                    &["sql"],
                    ScriptedTool::new(true),
                )
                .with_required_env(["POSTGRES_URL"]),
            )
            .unwrap();

        registry.execute("mem", serde_json::json!({}), &ctx(&[])).await.unwrap();
        registry.execute("bad", serde_json::json!({}), &ctx(&[])).await.unwrap();

        let status = registry.status();
        assert_eq!(status.total_tools, 3);
        assert_eq!(status.available_tools, 2);
        // "bad" has reliability 0; "gated" never ran.
        assert_eq!(status.healthy_tools, 2);
        assert_eq!(
            status.categories_available,
            vec![ToolCategory::Memory, ToolCategory::Search]
        );
        assert_eq!(status.performance_metrics.total_executions, 2);
        assert!((status.performance_metrics.overall_reliability - 0.5).abs() < 1e-10);
    }

    #[tokio::test]
    async fn concurrent_executions_keep_metrics_consistent() {
        let registry = Arc::new(ToolRegistry::new());
        registry
            .register(def(
                "shared",
                ToolCategory::Search,
                ToolPriority::Low,
                &["search"],
                ScriptedTool::new(true),
            ))
            .unwrap();

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    registry
                        .execute("shared", serde_json::json!({}), &ExecutionContext::new("u", "q"))
                        .await
                        .unwrap()
                })
            })
            .collect();
        for h in handles {
            assert!(h.await.unwrap().success);
        }
        let m = registry.metrics("shared").unwrap();
        assert_eq!(m.execution_count, 20);
        assert_eq!(m.success_count, 20);
    }
}
