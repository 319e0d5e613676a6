//! Aggregate analysis over completed decision paths.

use crate::model::DecisionPath;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Patterns reported per analysis.
const TOP_PATTERNS: usize = 10;
/// Errors reported per analysis.
const TOP_ERRORS: usize = 10;
/// Share of sessions that must be outliers before a recommendation fires.
const OUTLIER_SHARE: f64 = 0.2;
const SLOW_FACTOR: f64 = 1.5;
const RELIABILITY_GAP: f64 = 0.2;

/// A recurring step sequence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionPattern {
    pub steps: Vec<String>,
    pub frequency: usize,
    pub avg_total_time_ms: f64,
    pub success_rate: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceInsights {
    pub avg_total_time_ms: f64,
    pub avg_success_rate: f64,
    pub fastest_session: Option<String>,
    pub slowest_session: Option<String>,
    pub most_reliable_session: Option<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorFrequency {
    pub error: String,
    pub count: usize,
    /// Components that raised this error, sorted.
    pub components: Vec<String>,
}

/// How often a failed step is followed by a successful one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecoveryPattern {
    pub failed_step: String,
    pub next_step: String,
    pub occurrences: usize,
    pub success_rate: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorAnalysis {
    pub total_errors: usize,
    pub top_errors: Vec<ErrorFrequency>,
    pub recovery_patterns: Vec<RecoveryPattern>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceAnalysis {
    pub window_hours: u32,
    pub generated_at: DateTime<Utc>,
    pub sessions_analyzed: usize,
    pub patterns: Vec<DecisionPattern>,
    pub performance: PerformanceInsights,
    pub errors: ErrorAnalysis,
}

impl TraceAnalysis {
    /// Analyze `paths`. The caller decides which sessions fall in the window.
    pub fn compute(window_hours: u32, paths: &[&DecisionPath]) -> Self {
        Self {
            window_hours,
            generated_at: Utc::now(),
            sessions_analyzed: paths.len(),
            patterns: patterns(paths),
            performance: performance(paths),
            errors: errors(paths),
        }
    }
}

// ── Patterns ──────────────────────────────────────────────────────────────

fn patterns(paths: &[&DecisionPath]) -> Vec<DecisionPattern> {
    // sequence -> (count, summed time, summed success rate, first seen)
    let mut groups: HashMap<Vec<String>, (usize, u64, f64, usize)> = HashMap::new();
    for (i, path) in paths.iter().enumerate() {
        let entry = groups.entry(path.step_sequence()).or_insert((0, 0, 0.0, i));
        entry.0 += 1;
        entry.1 += path.summary.total_time_ms;
        entry.2 += path.success_rate();
    }

    let mut ranked: Vec<_> = groups.into_iter().collect();
    ranked.sort_by(|a, b| b.1.0.cmp(&a.1.0).then(a.1.3.cmp(&b.1.3)));
    ranked
        .into_iter()
        .take(TOP_PATTERNS)
        .map(|(steps, (count, time, success, _))| DecisionPattern {
            steps,
            frequency: count,
            avg_total_time_ms: time as f64 / count as f64,
            success_rate: success / count as f64,
        })
        .collect()
}

// ── Performance ───────────────────────────────────────────────────────────

fn performance(paths: &[&DecisionPath]) -> PerformanceInsights {
    if paths.is_empty() {
        return PerformanceInsights::default();
    }
    let n = paths.len() as f64;
    let avg_time = paths.iter().map(|p| p.summary.total_time_ms as f64).sum::<f64>() / n;
    let avg_success = paths.iter().map(|p| p.success_rate()).sum::<f64>() / n;

    let fastest = paths.iter().min_by_key(|p| p.summary.total_time_ms);
    let slowest = paths.iter().max_by_key(|p| p.summary.total_time_ms);
    let most_reliable = paths
        .iter()
        .max_by(|a, b| a.success_rate().total_cmp(&b.success_rate()));

    let mut recommendations = Vec::new();

    let slow = paths
        .iter()
        .filter(|p| p.summary.total_time_ms as f64 > SLOW_FACTOR * avg_time)
        .count();
    if slow as f64 >= OUTLIER_SHARE * n && slow > 0 {
        recommendations.push(format!(
            "{slow} of {} sessions took more than {SLOW_FACTOR}x the average time \
             ({avg_time:.0}ms); review slow steps",
            paths.len()
        ));
    }

    let unreliable = paths
        .iter()
        .filter(|p| p.success_rate() < avg_success - RELIABILITY_GAP)
        .count();
    if unreliable as f64 >= OUTLIER_SHARE * n && unreliable > 0 {
        recommendations.push(format!(
            "{unreliable} of {} sessions fall well below the average success rate \
             ({:.0}%); add fallbacks",
            paths.len(),
            avg_success * 100.0
        ));
    }

    let mut bottleneck_counts: HashMap<&str, (usize, usize)> = HashMap::new();
    let mut order = 0;
    for path in paths {
        for step in &path.summary.bottlenecks {
            let e = bottleneck_counts.entry(step.as_str()).or_insert((0, order));
            e.0 += 1;
            order += 1;
        }
    }
    if let Some((step, (count, _))) = bottleneck_counts
        .into_iter()
        .max_by(|a, b| a.1.0.cmp(&b.1.0).then(b.1.1.cmp(&a.1.1)))
    {
        recommendations.push(format!(
            "Step '{step}' is the most frequent bottleneck ({count} sessions)"
        ));
    }

    PerformanceInsights {
        avg_total_time_ms: avg_time,
        avg_success_rate: avg_success,
        fastest_session: fastest.map(|p| p.session_id.clone()),
        slowest_session: slowest.map(|p| p.session_id.clone()),
        most_reliable_session: most_reliable.map(|p| p.session_id.clone()),
        recommendations,
    }
}

// ── Errors ────────────────────────────────────────────────────────────────

fn errors(paths: &[&DecisionPath]) -> ErrorAnalysis {
    let mut total = 0;
    let mut by_error: HashMap<&str, (usize, Vec<&str>, usize)> = HashMap::new();
    // (failed step, next step) -> (occurrences, next succeeded, first seen)
    let mut transitions: HashMap<(&str, &str), (usize, usize, usize)> = HashMap::new();
    let mut seen = 0;

    for path in paths {
        for (i, trace) in path.traces.iter().enumerate() {
            if trace.success {
                continue;
            }
            total += 1;
            let message = trace.error.as_deref().unwrap_or("unknown error");
            let e = by_error.entry(message).or_insert((0, Vec::new(), seen));
            e.0 += 1;
            if !e.1.contains(&trace.component.as_str()) {
                e.1.push(trace.component.as_str());
            }
            if let Some(next) = path.traces.get(i + 1) {
                let t = transitions
                    .entry((trace.step_name.as_str(), next.step_name.as_str()))
                    .or_insert((0, 0, seen));
                t.0 += 1;
                if next.success {
                    t.1 += 1;
                }
            }
            seen += 1;
        }
    }

    let mut top: Vec<_> = by_error.into_iter().collect();
    top.sort_by(|a, b| b.1.0.cmp(&a.1.0).then(a.1.2.cmp(&b.1.2)));
    let top_errors = top
        .into_iter()
        .take(TOP_ERRORS)
        .map(|(error, (count, mut components, _))| {
            components.sort_unstable();
            ErrorFrequency {
                error: error.to_string(),
                count,
                components: components.into_iter().map(str::to_string).collect(),
            }
        })
        .collect();

    let mut recovery: Vec<_> = transitions.into_iter().collect();
    recovery.sort_by(|a, b| b.1.0.cmp(&a.1.0).then(a.1.2.cmp(&b.1.2)));
    let recovery_patterns = recovery
        .into_iter()
        .map(|((failed, next), (occurrences, recovered, _))| RecoveryPattern {
            failed_step: failed.to_string(),
            next_step: next.to_string(),
            occurrences,
            success_rate: recovered as f64 / occurrences as f64,
        })
        .collect();

    ErrorAnalysis {
        total_errors: total,
        top_errors,
        recovery_patterns,
    }
}
