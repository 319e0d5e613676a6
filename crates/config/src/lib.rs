//! Configuration loading, validation, and management for Maestro.
//!
//! Loads configuration from `~/.maestro/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.maestro/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Tool registry settings
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Strategy mapping and decision settings
    #[serde(default)]
    pub decision: DecisionConfig,

    /// Multi-step workflow settings
    #[serde(default)]
    pub workflow: WorkflowConfig,

    /// Decision tracer settings
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Timeout applied when the request does not carry one
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,

    /// Upper bound for a single tool health check
    #[serde(default = "default_health_check_timeout_ms")]
    pub health_check_timeout_ms: u64,

    /// Tools below this reliability are hidden from discovery...
    #[serde(default = "default_min_reliability")]
    pub min_reliability: f64,

    /// ...once they have more than this many executions
    #[serde(default = "default_reliability_grace")]
    pub reliability_grace_executions: u64,

    /// How many lower-ranked tools `execute_best` may fall back to
    #[serde(default = "default_max_fallbacks")]
    pub max_fallbacks: usize,

    /// Register the built-in MCP server catalog at startup
    #[serde(default = "default_true")]
    pub load_catalog: bool,

    /// Keys treated as present in addition to the process environment
    #[serde(default)]
    pub environment_keys: Vec<String>,
}

fn default_timeout_ms() -> u64 {
    30_000
}
fn default_health_check_timeout_ms() -> u64 {
    5_000
}
fn default_min_reliability() -> f64 {
    0.5
}
fn default_reliability_grace() -> u64 {
    5
}
fn default_max_fallbacks() -> usize {
    2
}
fn default_true() -> bool {
    true
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_timeout_ms(),
            health_check_timeout_ms: default_health_check_timeout_ms(),
            min_reliability: default_min_reliability(),
            reliability_grace_executions: default_reliability_grace(),
            max_fallbacks: default_max_fallbacks(),
            load_catalog: true,
            environment_keys: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionConfig {
    /// Use the strategy-operation mapper (tier 1). When false the decision
    /// maker starts at the static strategy table.
    #[serde(default = "default_true")]
    pub advanced_mapping: bool,

    /// Ceiling for any operation mapping's token budget
    #[serde(default = "default_max_token_budget")]
    pub max_token_budget: u32,

    /// Smoothing factor of the adaptive scoring policy
    #[serde(default = "default_adaptation_alpha")]
    pub adaptation_alpha: f64,

    /// Mappings slower than this on average get a trimmed budget
    #[serde(default = "default_slow_threshold_ms")]
    pub slow_threshold_ms: u64,
}

fn default_max_token_budget() -> u32 {
    8192
}
fn default_adaptation_alpha() -> f64 {
    0.2
}
fn default_slow_threshold_ms() -> u64 {
    5_000
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            advanced_mapping: true,
            max_token_budget: default_max_token_budget(),
            adaptation_alpha: default_adaptation_alpha(),
            slow_threshold_ms: default_slow_threshold_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Escalate when a step's confidence falls below this
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    /// Cap on escalation retries per workflow
    #[serde(default = "default_max_escalation_attempts")]
    pub max_escalation_attempts: u32,

    /// Wall-clock budget for a whole workflow
    #[serde(default = "default_max_duration_ms")]
    pub max_duration_ms: u64,

    /// Budget for a single collaborator call
    #[serde(default = "default_step_timeout_ms")]
    pub step_timeout_ms: u64,

    /// Confidence multiplier applied when a collaborator faults
    #[serde(default = "default_degradation_factor")]
    pub degradation_factor: f64,
}

fn default_confidence_threshold() -> f64 {
    0.7
}
fn default_max_escalation_attempts() -> u32 {
    3
}
fn default_max_duration_ms() -> u64 {
    60_000
}
fn default_step_timeout_ms() -> u64 {
    15_000
}
fn default_degradation_factor() -> f64 {
    0.5
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            max_escalation_attempts: default_max_escalation_attempts(),
            max_duration_ms: default_max_duration_ms(),
            step_timeout_ms: default_step_timeout_ms(),
            degradation_factor: default_degradation_factor(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Session history capacity; the oldest session is evicted first
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// How long a computed trace analysis stays valid
    #[serde(default = "default_analysis_cache_secs")]
    pub analysis_cache_secs: u64,
}

fn default_max_sessions() -> usize {
    1_000
}
fn default_analysis_cache_secs() -> u64 {
    30
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
            analysis_cache_secs: default_analysis_cache_secs(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.maestro/config.toml).
    ///
    /// Environment overrides (highest priority):
    /// - `MAESTRO_DEFAULT_TIMEOUT_MS`
    /// - `MAESTRO_CONFIDENCE_THRESHOLD`
    /// - `MAESTRO_MAX_SESSIONS`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in `load`).
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("MAESTRO_DEFAULT_TIMEOUT_MS") {
            self.registry.default_timeout_ms = parse_override("MAESTRO_DEFAULT_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("MAESTRO_CONFIDENCE_THRESHOLD") {
            self.workflow.confidence_threshold =
                parse_override("MAESTRO_CONFIDENCE_THRESHOLD", &v)?;
        }
        if let Some(v) = lookup("MAESTRO_MAX_SESSIONS") {
            self.telemetry.max_sessions = parse_override("MAESTRO_MAX_SESSIONS", &v)?;
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".maestro")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.registry.default_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "registry.default_timeout_ms must be > 0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.registry.min_reliability) {
            return Err(ConfigError::ValidationError(
                "registry.min_reliability must be between 0.0 and 1.0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.workflow.confidence_threshold) {
            return Err(ConfigError::ValidationError(
                "workflow.confidence_threshold must be between 0.0 and 1.0".into(),
            ));
        }
        if self.workflow.degradation_factor <= 0.0 || self.workflow.degradation_factor > 1.0 {
            return Err(ConfigError::ValidationError(
                "workflow.degradation_factor must be in (0.0, 1.0]".into(),
            ));
        }
        if self.decision.adaptation_alpha <= 0.0 || self.decision.adaptation_alpha > 1.0 {
            return Err(ConfigError::ValidationError(
                "decision.adaptation_alpha must be in (0.0, 1.0]".into(),
            ));
        }
        if self.telemetry.max_sessions == 0 {
            return Err(ConfigError::ValidationError(
                "telemetry.max_sessions must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::ValidationError(format!("{key} has invalid value '{value}'")))
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
