//! Adaptation policies — how recorded outcomes reshape future mappings.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

use crate::context::Complexity;
use crate::mapper::OperationMapping;
use crate::strategy::{CognitiveOperation, ResponseStrategy};

/// Adjusts fresh mappings from the outcomes of earlier ones.
pub trait AdaptationPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Tune a mapping before it is handed out. Returns whether anything
    /// changed.
    fn adjust(&self, mapping: &mut OperationMapping) -> bool;

    /// Learn from a finished mapping.
    fn record(&self, mapping: &OperationMapping, success: bool, elapsed_ms: u64);
}

/// Never adjusts.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAdaptation;

impl AdaptationPolicy for NoAdaptation {
    fn name(&self) -> &'static str {
        "none"
    }

    fn adjust(&self, _mapping: &mut OperationMapping) -> bool {
        false
    }

    fn record(&self, _mapping: &OperationMapping, _success: bool, _elapsed_ms: u64) {}
}

/// Smoothed outcomes for one (strategy, complexity) bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutcomeStats {
    pub success_rate: f64,
    pub latency_ms: f64,
    pub samples: u64,
}

const LOW_SUCCESS: f64 = 0.6;
const HIGH_SUCCESS: f64 = 0.9;
const WIDEN_FACTOR: f64 = 1.2;
const TRIM_FACTOR: f64 = 0.85;
/// Buckets with fewer samples are left alone.
const MIN_SAMPLES: u64 = 3;

/// Exponentially weighted success rate and latency per
/// (strategy, complexity).
///
/// - success rate below 0.6: budget ×1.2 and reasoning is added
/// - slow (latency above the threshold) but succeeding ≥ 0.9: budget ×0.85
pub struct EwmaPolicy {
    alpha: f64,
    slow_threshold_ms: f64,
    stats: Mutex<HashMap<(ResponseStrategy, Complexity), OutcomeStats>>,
}

impl EwmaPolicy {
    pub fn new(alpha: f64, slow_threshold_ms: u64) -> Self {
        Self {
            alpha: alpha.clamp(f64::EPSILON, 1.0),
            slow_threshold_ms: slow_threshold_ms as f64,
            stats: Mutex::new(HashMap::new()),
        }
    }

    pub fn stats(
        &self,
        strategy: ResponseStrategy,
        complexity: Complexity,
    ) -> Option<OutcomeStats> {
        self.stats
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(strategy, complexity))
            .copied()
    }
}

impl AdaptationPolicy for EwmaPolicy {
    fn name(&self) -> &'static str {
        "ewma"
    }

    fn adjust(&self, mapping: &mut OperationMapping) -> bool {
        if mapping.strategy == ResponseStrategy::Ignore {
            return false;
        }
        let Some(stats) = self.stats(mapping.strategy, mapping.factors.complexity) else {
            return false;
        };
        if stats.samples < MIN_SAMPLES {
            return false;
        }

        if stats.success_rate < LOW_SUCCESS {
            mapping.token_budget = (mapping.token_budget as f64 * WIDEN_FACTOR).round() as u32;
            if !mapping.operations.contains(&CognitiveOperation::Reasoning) {
                mapping.operations.push(CognitiveOperation::Reasoning);
            }
            debug!(
                strategy = %mapping.strategy,
                success_rate = stats.success_rate,
                "Widening mapping after poor outcomes"
            );
            true
        } else if stats.latency_ms > self.slow_threshold_ms && stats.success_rate >= HIGH_SUCCESS {
            mapping.token_budget = (mapping.token_budget as f64 * TRIM_FACTOR).round() as u32;
            debug!(
                strategy = %mapping.strategy,
                latency_ms = stats.latency_ms,
                "Trimming budget of slow but reliable mapping"
            );
            true
        } else {
            false
        }
    }

    fn record(&self, mapping: &OperationMapping, success: bool, elapsed_ms: u64) {
        let outcome = if success { 1.0 } else { 0.0 };
        let elapsed = elapsed_ms as f64;
        let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        stats
            .entry((mapping.strategy, mapping.factors.complexity))
            .and_modify(|s| {
                s.success_rate += self.alpha * (outcome - s.success_rate);
                s.latency_ms += self.alpha * (elapsed - s.latency_ms);
                s.samples += 1;
            })
            .or_insert(OutcomeStats {
                success_rate: outcome,
                latency_ms: elapsed,
                samples: 1,
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextualFactors;
    use maestro_core::ToolPriority;

    fn mapping(strategy: ResponseStrategy) -> OperationMapping {
        OperationMapping {
            strategy,
            operations: vec![CognitiveOperation::Understanding, CognitiveOperation::Processing],
            priority: ToolPriority::Medium,
            parallel: true,
            token_budget: 1000,
            factors: ContextualFactors::default(),
            adapted: false,
        }
    }

    #[test]
    fn first_sample_seeds_the_average() {
        let policy = EwmaPolicy::new(0.2, 5000);
        let m = mapping(ResponseStrategy::QuickReply);
        policy.record(&m, true, 400);

        let s = policy.stats(ResponseStrategy::QuickReply, Complexity::Low).unwrap();
        assert_eq!(s.success_rate, 1.0);
        assert_eq!(s.latency_ms, 400.0);
        assert_eq!(s.samples, 1);
    }

    #[test]
    fn ewma_moves_towards_new_outcomes() {
        let policy = EwmaPolicy::new(0.5, 5000);
        let m = mapping(ResponseStrategy::QuickReply);
        policy.record(&m, true, 100);
        policy.record(&m, false, 300);

        let s = policy.stats(ResponseStrategy::QuickReply, Complexity::Low).unwrap();
        assert!((s.success_rate - 0.5).abs() < 1e-12);
        assert!((s.latency_ms - 200.0).abs() < 1e-12);
    }

    #[test]
    fn poor_outcomes_widen_and_add_reasoning() {
        let policy = EwmaPolicy::new(0.2, 5000);
        let m = mapping(ResponseStrategy::QuickReply);
        for _ in 0..3 {
            policy.record(&m, false, 100);
        }

        let mut fresh = mapping(ResponseStrategy::QuickReply);
        assert!(policy.adjust(&mut fresh));
        assert_eq!(fresh.token_budget, 1200);
        assert!(fresh.operations.contains(&CognitiveOperation::Reasoning));
    }

    #[test]
    fn slow_reliable_mappings_are_trimmed() {
        let policy = EwmaPolicy::new(0.2, 1000);
        let m = mapping(ResponseStrategy::DeepReason);
        for _ in 0..3 {
            policy.record(&m, true, 4000);
        }

        let mut fresh = mapping(ResponseStrategy::DeepReason);
        assert!(policy.adjust(&mut fresh));
        assert_eq!(fresh.token_budget, 850);
        assert!(!fresh.operations.contains(&CognitiveOperation::Reasoning));
    }

    #[test]
    fn too_few_samples_changes_nothing() {
        let policy = EwmaPolicy::new(0.2, 5000);
        let m = mapping(ResponseStrategy::QuickReply);
        policy.record(&m, false, 100);

        let mut fresh = mapping(ResponseStrategy::QuickReply);
        assert!(!policy.adjust(&mut fresh));
        assert_eq!(fresh.token_budget, 1000);
    }

    #[test]
    fn no_adaptation_is_inert() {
        let mut m = mapping(ResponseStrategy::QuickReply);
        NoAdaptation.record(&m, false, 1);
        assert!(!NoAdaptation.adjust(&mut m));
    }
}
