//! Trace export formats.

use crate::TelemetryError;
use crate::model::{DecisionPath, DecisionTrace};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Pretty-printed array of sessions.
    Json,
    /// One trace object per line.
    Jsonl,
    /// One row per trace.
    Csv,
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Jsonl => write!(f, "jsonl"),
            Self::Csv => write!(f, "csv"),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "jsonl" | "ndjson" => Ok(Self::Jsonl),
            "csv" => Ok(Self::Csv),
            other => Err(TelemetryError::UnknownFormat(other.to_string())),
        }
    }
}

const CSV_HEADER: &str = "session_id,user_id,trace_id,timestamp,kind,step_name,component,\
                          execution_time_ms,confidence,success,error";

pub(crate) fn render(
    format: ExportFormat,
    paths: &[&DecisionPath],
) -> Result<String, TelemetryError> {
    match format {
        ExportFormat::Json => Ok(serde_json::to_string_pretty(paths)?),
        ExportFormat::Jsonl => {
            let mut out = String::new();
            for trace in paths.iter().flat_map(|p| &p.traces) {
                out.push_str(&serde_json::to_string(trace)?);
                out.push('\n');
            }
            Ok(out)
        }
        ExportFormat::Csv => {
            let mut out = String::from(CSV_HEADER);
            out.push('\n');
            for trace in paths.iter().flat_map(|p| &p.traces) {
                out.push_str(&csv_row(trace));
                out.push('\n');
            }
            Ok(out)
        }
    }
}

fn csv_row(t: &DecisionTrace) -> String {
    let confidence = t.confidence.map(|c| format!("{c:.4}")).unwrap_or_default();
    [
        csv_field(&t.session_id),
        csv_field(&t.user_id),
        csv_field(&t.id),
        t.timestamp.to_rfc3339(),
        t.kind.to_string(),
        csv_field(&t.step_name),
        csv_field(&t.component),
        t.execution_time_ms.to_string(),
        confidence,
        t.success.to_string(),
        csv_field(t.error.as_deref().unwrap_or("")),
    ]
    .join(",")
}

/// Quote a field when it holds a delimiter, quote or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
