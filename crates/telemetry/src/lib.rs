//! Decision tracing for Maestro.
//!
//! Records every step the orchestration pipeline takes per request
//! session, keeps a bounded history, and derives pattern, performance and
//! error analyses plus JSON / JSON Lines / CSV exports from it.

pub mod analysis;
pub mod export;
pub mod model;
pub mod tracer;

pub use analysis::{
    DecisionPattern, ErrorAnalysis, ErrorFrequency, PerformanceInsights, RecoveryPattern,
    TraceAnalysis,
};
pub use export::ExportFormat;
pub use model::{DecisionPath, DecisionTrace, PathSummary, TraceStep, TraceStepKind};
pub use tracer::DecisionTracer;

/// Errors from the telemetry subsystem.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("unknown trace session: {0}")]
    UnknownSession(String),

    #[error("trace session already ended: {0}")]
    SessionEnded(String),

    #[error("unknown export format: {0}")]
    UnknownFormat(String),

    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}
