//! Per-tool rolling execution metrics.

use chrono::{DateTime, Utc};
use maestro_core::ToolPerformance;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExecutionMetrics {
    pub execution_count: u64,
    pub success_count: u64,
    /// Cumulative wall-clock time across executions.
    pub total_time_ms: u64,
    pub last_execution: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
}

impl ExecutionMetrics {
    pub fn record(&mut self, success: bool, elapsed_ms: u64, at: DateTime<Utc>) {
        self.execution_count += 1;
        self.total_time_ms += elapsed_ms;
        self.last_execution = Some(at);
        if success {
            self.success_count += 1;
            self.last_success = Some(at);
        }
    }

    /// successes / executions; 1.0 before any execution.
    pub fn reliability(&self) -> f64 {
        if self.execution_count == 0 {
            return 1.0;
        }
        (self.success_count as f64 / self.execution_count as f64).clamp(0.0, 1.0)
    }

    pub fn avg_response_time_ms(&self) -> f64 {
        if self.execution_count == 0 {
            return 0.0;
        }
        self.total_time_ms as f64 / self.execution_count as f64
    }

    pub fn performance(&self, last_health_check: Option<DateTime<Utc>>) -> ToolPerformance {
        ToolPerformance {
            avg_response_time_ms: self.avg_response_time_ms(),
            reliability: self.reliability(),
            last_health_check,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_metrics_are_optimistic() {
        let m = ExecutionMetrics::default();
        assert_eq!(m.reliability(), 1.0);
        assert_eq!(m.avg_response_time_ms(), 0.0);
    }

    #[test]
    fn record_updates_counts_and_times() {
        let mut m = ExecutionMetrics::default();
        let now = Utc::now();
        m.record(true, 100, now);
        m.record(false, 300, now);
        m.record(true, 200, now);

        assert_eq!(m.execution_count, 3);
        assert_eq!(m.success_count, 2);
        assert!((m.reliability() - 2.0 / 3.0).abs() < 1e-10);
        assert!((m.avg_response_time_ms() - 200.0).abs() < 1e-10);
        assert_eq!(m.last_success, Some(now));
    }

    #[test]
    fn failure_does_not_touch_last_success() {
        let mut m = ExecutionMetrics::default();
        m.record(false, 10, Utc::now());
        assert!(m.last_success.is_none());
        assert!(m.last_execution.is_some());
        assert_eq!(m.reliability(), 0.0);
    }
}
