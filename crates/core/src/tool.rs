//! Tool model — capability-tagged executable units.
//!
//! A tool is anything that provides a capability to the orchestrator: a web
//! search backend, a memory store, an MCP server bridge. The registry only
//! ever talks to tools through [`ToolExecutor`] and never interprets the
//! data they return.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ToolError;

/// Capability tag that matches every request.
pub const WILDCARD_CAPABILITY: &str = "*";

// ── Category ──────────────────────────────────────────────────────────────

/// The functional family a tool belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    Memory,
    Search,
    Content,
    Reasoning,
    Automation,
    Communication,
    Database,
    Ai,
}

impl ToolCategory {
    pub const ALL: [ToolCategory; 8] = [
        ToolCategory::Memory,
        ToolCategory::Search,
        ToolCategory::Content,
        ToolCategory::Reasoning,
        ToolCategory::Automation,
        ToolCategory::Communication,
        ToolCategory::Database,
        ToolCategory::Ai,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Search => "search",
            Self::Content => "content",
            Self::Reasoning => "reasoning",
            Self::Automation => "automation",
            Self::Communication => "communication",
            Self::Database => "database",
            Self::Ai => "ai",
        }
    }

    /// Categories whose keywords appear in a requested capability string.
    ///
    /// Matching is a lowercase substring test against [`CAPABILITY_KEYWORDS`];
    /// each category is yielded at most once.
    pub fn matching(capability: &str) -> Vec<ToolCategory> {
        let needle = capability.to_lowercase();
        let mut found: Vec<ToolCategory> = Vec::new();
        for (keyword, category) in CAPABILITY_KEYWORDS {
            if needle.contains(keyword) && !found.contains(category) {
                found.push(*category);
            }
        }
        found
    }
}

impl fmt::Display for ToolCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown tool category: {s}"))
    }
}

/// Keyword → category table used for the categorical scoring bonus.
///
/// Keywords are lowercase stems; a requested capability such as
/// `"web_search"` or `"analyze_image"` earns a bonus for tools whose category
/// owns one of the stems it contains.
pub static CAPABILITY_KEYWORDS: &[(&str, ToolCategory)] = &[
    ("memory", ToolCategory::Memory),
    ("remember", ToolCategory::Memory),
    ("recall", ToolCategory::Memory),
    ("knowledge", ToolCategory::Memory),
    ("search", ToolCategory::Search),
    ("web", ToolCategory::Search),
    ("lookup", ToolCategory::Search),
    ("research", ToolCategory::Search),
    ("news", ToolCategory::Search),
    ("content", ToolCategory::Content),
    ("extract", ToolCategory::Content),
    ("file", ToolCategory::Content),
    ("document", ToolCategory::Content),
    ("scrape", ToolCategory::Content),
    ("reason", ToolCategory::Reasoning),
    ("analy", ToolCategory::Reasoning),
    ("think", ToolCategory::Reasoning),
    ("plan", ToolCategory::Reasoning),
    ("automat", ToolCategory::Automation),
    ("schedule", ToolCategory::Automation),
    ("workflow", ToolCategory::Automation),
    ("repo", ToolCategory::Automation),
    ("calendar", ToolCategory::Automation),
    ("message", ToolCategory::Communication),
    ("chat", ToolCategory::Communication),
    ("notify", ToolCategory::Communication),
    ("channel", ToolCategory::Communication),
    ("database", ToolCategory::Database),
    ("sql", ToolCategory::Database),
    ("cache", ToolCategory::Database),
    ("storage", ToolCategory::Database),
    ("image", ToolCategory::Ai),
    ("vision", ToolCategory::Ai),
    ("multimodal", ToolCategory::Ai),
    ("generat", ToolCategory::Ai),
    ("embedding", ToolCategory::Ai),
];

// ── Priority ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToolPriority {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

impl ToolPriority {
    /// Base ranking weight.
    pub fn weight(&self) -> f64 {
        match self {
            Self::Critical => 100.0,
            Self::High => 75.0,
            Self::Medium => 50.0,
            Self::Low => 25.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for ToolPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "critical" => Ok(Self::Critical),
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            other => Err(format!("unknown priority: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InstallComplexity {
    #[default]
    Low,
    Medium,
    High,
}

// ── Metadata ──────────────────────────────────────────────────────────────

/// Static descriptive metadata supplied at registration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolMetadata {
    pub description: String,
    pub version: String,
    #[serde(default)]
    pub install_complexity: InstallComplexity,
}

/// Rolling performance figures maintained by the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolPerformance {
    /// Mean response time over all executions (0 before the first one).
    pub avg_response_time_ms: f64,
    /// successes / executions, 1.0 before the first execution.
    pub reliability: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_health_check: Option<DateTime<Utc>>,
}

impl Default for ToolPerformance {
    fn default() -> Self {
        Self {
            avg_response_time_ms: 0.0,
            reliability: 1.0,
            last_health_check: None,
        }
    }
}

// ── Executor contract ─────────────────────────────────────────────────────

/// The uniform contract every capability provider implements.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Run the tool. Errors are converted to failed [`ToolResult`]s by the
    /// registry, so implementations may use `?` freely.
    async fn execute(&self, params: serde_json::Value) -> Result<ToolResult, ToolError>;

    /// Optional self-check. `None` means the tool has no health check.
    async fn health_check(&self) -> Option<bool> {
        None
    }
}

// ── Definition ────────────────────────────────────────────────────────────

/// A registered tool: identity, capabilities and the executor behind them.
#[derive(Clone)]
pub struct ToolDefinition {
    pub id: String,
    pub name: String,
    pub category: ToolCategory,
    pub priority: ToolPriority,
    /// Lowercased capability tags. `"*"` matches every request.
    pub capabilities: BTreeSet<String>,
    /// Environment keys that must be present for the tool to be available.
    pub required_env: Vec<String>,
    /// Ids of other tools this one needs registered.
    pub dependencies: Vec<String>,
    pub metadata: ToolMetadata,
    pub executor: Arc<dyn ToolExecutor>,
}

impl fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("category", &self.category)
            .field("priority", &self.priority)
            .field("capabilities", &self.capabilities)
            .field("required_env", &self.required_env)
            .field("dependencies", &self.dependencies)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

impl ToolDefinition {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        category: ToolCategory,
        executor: Arc<dyn ToolExecutor>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category,
            priority: ToolPriority::default(),
            capabilities: BTreeSet::new(),
            required_env: Vec::new(),
            dependencies: Vec::new(),
            metadata: ToolMetadata::default(),
            executor,
        }
    }

    pub fn with_priority(mut self, priority: ToolPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.capabilities.extend(
            capabilities
                .into_iter()
                .map(|c| c.as_ref().trim().to_lowercase())
                .filter(|c| !c.is_empty()),
        );
        self
    }

    pub fn with_required_env<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_env.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn with_dependencies<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_metadata(mut self, metadata: ToolMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Whether this tool advertises the wildcard capability.
    pub fn is_wildcard(&self) -> bool {
        self.capabilities.contains(WILDCARD_CAPABILITY)
    }

    /// Capability intersection test. An empty request matches every tool.
    pub fn matches_capabilities(&self, requested: &[String]) -> bool {
        if requested.is_empty() || self.is_wildcard() {
            return true;
        }
        requested
            .iter()
            .any(|r| self.capabilities.contains(&r.trim().to_lowercase()))
    }

    /// Reject definitions the registry cannot serve.
    pub fn validate(&self) -> Result<(), ToolError> {
        if self.id.trim().is_empty() {
            return Err(ToolError::InvalidDefinition("tool id must not be empty".into()));
        }
        if self.capabilities.is_empty() {
            return Err(ToolError::InvalidDefinition(format!(
                "tool '{}' declares no capabilities (use \"*\" for a wildcard tool)",
                self.id
            )));
        }
        Ok(())
    }

    /// Serializable snapshot combining this definition with live figures.
    pub fn to_descriptor(&self, performance: ToolPerformance) -> ToolDescriptor {
        ToolDescriptor {
            id: self.id.clone(),
            name: self.name.clone(),
            category: self.category,
            priority: self.priority,
            capabilities: self.capabilities.iter().cloned().collect(),
            required_env: self.required_env.clone(),
            dependencies: self.dependencies.clone(),
            metadata: self.metadata.clone(),
            performance,
        }
    }
}

/// A serializable view of a registered tool (for status output and the CLI).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub id: String,
    pub name: String,
    pub category: ToolCategory,
    pub priority: ToolPriority,
    pub capabilities: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_env: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    pub metadata: ToolMetadata,
    pub performance: ToolPerformance,
}

// ── Invocation ────────────────────────────────────────────────────────────

/// Per-request context, read-only for the duration of one invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    pub request_text: String,
    #[serde(default)]
    pub priority: ToolPriority,
    #[serde(default)]
    pub required_capabilities: Vec<String>,
    #[serde(default = "default_fallback_allowed")]
    pub fallback_allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

fn default_fallback_allowed() -> bool {
    true
}

impl ExecutionContext {
    pub fn new(user_id: impl Into<String>, request_text: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            channel_id: None,
            request_text: request_text.into(),
            priority: ToolPriority::default(),
            required_capabilities: Vec::new(),
            fallback_allowed: true,
            timeout_ms: None,
        }
    }

    pub fn with_channel(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = Some(channel_id.into());
        self
    }

    pub fn with_priority(mut self, priority: ToolPriority) -> Self {
        self.priority = priority;
        self
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

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn without_fallback(mut self) -> Self {
        self.fallback_allowed = false;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// The uniform outcome of a tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,

    /// Opaque payload. The registry never looks inside.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Id of the tool that produced this result.
    pub tool_used: String,

    /// The work must be completed by an external MCP server.
    #[serde(default)]
    pub requires_external_mcp: bool,

    /// Wall-clock time measured by the registry.
    #[serde(default)]
    pub execution_time_ms: u64,
}

impl ToolResult {
    pub fn ok(tool_used: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            tool_used: tool_used.into(),
            requires_external_mcp: false,
            execution_time_ms: 0,
        }
    }

    pub fn failure(tool_used: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            tool_used: tool_used.into(),
            requires_external_mcp: false,
            execution_time_ms: 0,
        }
    }

    /// A successful hand-off to an external MCP server.
    pub fn external_mcp(tool_used: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            requires_external_mcp: true,
            ..Self::ok(tool_used, data)
        }
    }
}
