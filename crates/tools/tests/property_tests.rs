//! Property-based tests for maestro-tools.
//!
//! Reliability bookkeeping and ranking must hold for any sequence of
//! outcomes, not just the hand-picked ones in the unit tests.

use async_trait::async_trait;
use chrono::Utc;
use maestro_core::{
    ExecutionContext, ToolCategory, ToolDefinition, ToolError, ToolExecutor, ToolPriority,
    ToolResult,
};
use maestro_tools::scoring;
use maestro_tools::{ExecutionMetrics, StaticEnv, ToolRegistry, RegistrySettings};
use proptest::prelude::*;
use std::sync::Arc;

struct Noop;

#[async_trait]
impl ToolExecutor for Noop {
    async fn execute(&self, _p: serde_json::Value) -> Result<ToolResult, ToolError> {
        Ok(ToolResult::ok("noop", serde_json::Value::Null))
    }
}

fn arb_priority() -> impl Strategy<Value = ToolPriority> {
    prop_oneof![
        Just(ToolPriority::Critical),
        Just(ToolPriority::High),
        Just(ToolPriority::Medium),
        Just(ToolPriority::Low),
    ]
}

fn arb_category() -> impl Strategy<Value = ToolCategory> {
    proptest::sample::select(ToolCategory::ALL.to_vec())
}

fn metrics_from(outcomes: &[(bool, u64)]) -> ExecutionMetrics {
    let mut m = ExecutionMetrics::default();
    for &(ok, ms) in outcomes {
        m.record(ok, ms, Utc::now());
    }
    m
}

proptest! {
    #[test]
    fn reliability_is_success_ratio(
        outcomes in prop::collection::vec((any::<bool>(), 0u64..10_000), 1..200),
    ) {
        let m = metrics_from(&outcomes);
        let successes = outcomes.iter().filter(|(ok, _)| *ok).count() as f64;
        let r = m.reliability();

        prop_assert!((0.0..=1.0).contains(&r));
        prop_assert!((r - successes / outcomes.len() as f64).abs() < 1e-12);
        prop_assert!(m.success_count <= m.execution_count);
    }

    #[test]
    fn score_is_monotonic_in_reliability(
        priority in arb_priority(),
        category in arb_category(),
        request_priority in arb_priority(),
        runs in 1u64..50,
        fewer in 0u64..50,
        elapsed in 0u64..5_000,
    ) {
        let fewer = fewer.min(runs);
        let tool = ToolDefinition::new("t", "t", category, Arc::new(Noop))
            .with_priority(priority)
            .with_capabilities(["*"]);
        let ctx = ExecutionContext::new("u", "q")
            .with_priority(request_priority)
            .with_capabilities(["search", "memory"]);

        // Same count and timing, different success counts.
        let outcomes = |ok: u64| -> Vec<(bool, u64)> {
            (0..runs).map(|i| (i < ok, elapsed)).collect()
        };
        let better = metrics_from(&outcomes(runs));
        let worse = metrics_from(&outcomes(fewer));

        prop_assert!(scoring::score(&tool, &better, &ctx) >= scoring::score(&tool, &worse, &ctx));
    }

    #[test]
    fn discover_respects_environment(keys in prop::collection::hash_set("[A-C]_KEY", 0..3)) {
        let registry = ToolRegistry::with_settings(
            RegistrySettings::default(),
            Arc::new(StaticEnv::new(keys.iter().cloned())),
        );
        for key in ["A_KEY", "B_KEY", "C_KEY"] {
            let tool = ToolDefinition::new(key, key, ToolCategory::Search, Arc::new(Noop))
                .with_capabilities(["search"])
                .with_required_env([key]);
            registry.register(tool).unwrap();
        }

        let ctx = ExecutionContext::new("u", "q").with_capabilities(["search"]);
        let found = registry.discover(&ctx);
        prop_assert_eq!(found.len(), keys.len());
        for tool in found {
            prop_assert!(tool.required_env.iter().all(|k| keys.contains(k)));
        }
    }
}
