//! Strategy-operation mapper.
//!
//! Turns a response strategy plus contextual signals into an ordered list
//! of cognitive operations, a priority, a parallelism hint and a token
//! budget. Outcomes fed back through [`StrategyOperationMapper::record_outcome`]
//! reshape later mappings via the configured [`AdaptationPolicy`].

use chrono::{Timelike, Utc};
use maestro_config::DecisionConfig;
use maestro_core::ToolPriority;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::context::{ChannelActivity, Complexity, ContextualFactors, SystemLoad, UserPreference};
use crate::policy::{AdaptationPolicy, EwmaPolicy, NoAdaptation};
use crate::strategy::{CognitiveOperation, ResponseStrategy};

/// Operations kept under a speed preference.
const SPEED_OPERATION_LIMIT: usize = 2;
const HIGH_LOAD_BUDGET_MULTIPLIER: f64 = 0.8;

/// What the mapper is asked to map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingRequest {
    pub strategy: ResponseStrategy,
    pub confidence: f64,
    #[serde(default)]
    pub token_estimate: u32,
    #[serde(default)]
    pub message: Option<String>,
    /// Explicit factors; derived from the other fields when absent.
    #[serde(default)]
    pub factors: Option<ContextualFactors>,
}

impl MappingRequest {
    pub fn new(strategy: ResponseStrategy, confidence: f64) -> Self {
        Self {
            strategy,
            confidence: confidence.clamp(0.0, 1.0),
            token_estimate: 0,
            message: None,
            factors: None,
        }
    }

    pub fn with_tokens(mut self, token_estimate: u32) -> Self {
        self.token_estimate = token_estimate;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_factors(mut self, factors: ContextualFactors) -> Self {
        self.factors = Some(factors);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationMapping {
    pub strategy: ResponseStrategy,
    /// Ordered, without duplicates.
    pub operations: Vec<CognitiveOperation>,
    pub priority: ToolPriority,
    /// Operations may run concurrently.
    pub parallel: bool,
    pub token_budget: u32,
    pub factors: ContextualFactors,
    /// The adaptation policy changed this mapping.
    #[serde(default)]
    pub adapted: bool,
}

pub struct StrategyOperationMapper {
    max_token_budget: u32,
    policy: Box<dyn AdaptationPolicy>,
}

impl StrategyOperationMapper {
    pub fn new(max_token_budget: u32, policy: Box<dyn AdaptationPolicy>) -> Self {
        Self {
            max_token_budget,
            policy,
        }
    }

    /// A mapper that never adapts.
    pub fn fixed(max_token_budget: u32) -> Self {
        Self::new(max_token_budget, Box::new(NoAdaptation))
    }

    pub fn from_config(config: &DecisionConfig) -> Self {
        Self::new(
            config.max_token_budget,
            Box::new(EwmaPolicy::new(config.adaptation_alpha, config.slow_threshold_ms)),
        )
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    pub fn map(&self, request: &MappingRequest) -> OperationMapping {
        let factors = request.factors.unwrap_or_else(|| {
            ContextualFactors::derive(
                request.confidence,
                request.token_estimate,
                request.message.as_deref(),
                Utc::now().hour(),
            )
        });

        let mut mapping = OperationMapping {
            strategy: request.strategy,
            operations: select_operations(request.strategy, &factors),
            priority: priority_for(request.strategy, &factors),
            parallel: false,
            token_budget: token_budget(request.strategy, request.token_estimate, &factors),
            factors,
            adapted: false,
        };

        mapping.adapted = self.policy.adjust(&mut mapping);
        if factors.user_preference == UserPreference::Speed {
            mapping.operations.truncate(SPEED_OPERATION_LIMIT);
        }
        mapping.parallel = parallel_hint(mapping.operations.len(), &factors);
        mapping.token_budget = mapping.token_budget.min(self.max_token_budget);

        debug!(
            strategy = %mapping.strategy,
            operations = mapping.operations.len(),
            parallel = mapping.parallel,
            token_budget = mapping.token_budget,
            adapted = mapping.adapted,
            "Mapped strategy to operations"
        );
        mapping
    }

    /// Feed the real outcome of a mapping back into the policy.
    pub fn record_outcome(&self, mapping: &OperationMapping, success: bool, elapsed_ms: u64) {
        info!(strategy = %mapping.strategy, success, elapsed_ms, "Recording mapping outcome");
        self.policy.record(mapping, success, elapsed_ms);
    }
}

fn push_unique(ops: &mut Vec<CognitiveOperation>, op: CognitiveOperation) {
    if !ops.contains(&op) {
        ops.push(op);
    }
}

fn select_operations(
    strategy: ResponseStrategy,
    factors: &ContextualFactors,
) -> Vec<CognitiveOperation> {
    let mut ops = strategy.base_operations().to_vec();

    if factors.complexity == Complexity::High {
        match strategy {
            ResponseStrategy::DeepReason => push_unique(&mut ops, CognitiveOperation::Researching),
            ResponseStrategy::QuickReply => push_unique(&mut ops, CognitiveOperation::Reasoning),
            _ => {}
        }
    }
    match factors.user_preference {
        UserPreference::Accuracy if strategy == ResponseStrategy::DeepReason => {
            push_unique(&mut ops, CognitiveOperation::Researching)
        }
        UserPreference::Speed => ops.truncate(SPEED_OPERATION_LIMIT),
        _ => {}
    }
    ops
}

fn parallel_hint(operation_count: usize, factors: &ContextualFactors) -> bool {
    operation_count >= 2
        && factors.system_load != SystemLoad::High
        && factors.channel_activity != ChannelActivity::Busy
}

fn priority_for(strategy: ResponseStrategy, factors: &ContextualFactors) -> ToolPriority {
    match strategy {
        ResponseStrategy::Ignore | ResponseStrategy::Defer => ToolPriority::Low,
        ResponseStrategy::QuickReply if factors.user_preference == UserPreference::Speed => {
            ToolPriority::High
        }
        ResponseStrategy::QuickReply => ToolPriority::Medium,
        ResponseStrategy::DeepReason
            if factors.complexity == Complexity::High
                && factors.user_preference == UserPreference::Accuracy =>
        {
            ToolPriority::Critical
        }
        ResponseStrategy::DeepReason => ToolPriority::High,
    }
}

fn token_budget(
    strategy: ResponseStrategy,
    token_estimate: u32,
    factors: &ContextualFactors,
) -> u32 {
    if strategy == ResponseStrategy::Ignore {
        return 0;
    }
    let mut budget = strategy.base_token_budget() as f64
        * factors.complexity.budget_multiplier()
        * factors.user_preference.budget_multiplier();
    if factors.system_load == SystemLoad::High {
        budget *= HIGH_LOAD_BUDGET_MULTIPLIER;
    }
    let floor = token_estimate.saturating_mul(2);
    (budget.round() as u32).max(floor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factors(
        complexity: Complexity,
        load: SystemLoad,
        pref: UserPreference,
    ) -> ContextualFactors {
        ContextualFactors {
            complexity,
            system_load: load,
            user_preference: pref,
            channel_activity: ChannelActivity::Normal,
        }
    }

    fn map(strategy: ResponseStrategy, f: ContextualFactors) -> OperationMapping {
        StrategyOperationMapper::fixed(8192)
            .map(&MappingRequest::new(strategy, 0.7).with_factors(f))
    }

    #[test]
    fn quick_reply_balanced() {
        let m = map(
            ResponseStrategy::QuickReply,
            factors(Complexity::Medium, SystemLoad::Normal, UserPreference::Balanced),
        );
        assert_eq!(
            m.operations,
            vec![CognitiveOperation::Understanding, CognitiveOperation::Processing]
        );
        assert_eq!(m.priority, ToolPriority::Medium);
        assert!(m.parallel);
        assert_eq!(m.token_budget, 512);
    }

    #[test]
    fn deep_reason_high_complexity_accuracy() {
        let m = map(
            ResponseStrategy::DeepReason,
            factors(Complexity::High, SystemLoad::Low, UserPreference::Accuracy),
        );
        assert_eq!(
            m.operations,
            vec![
                CognitiveOperation::Understanding,
                CognitiveOperation::Reasoning,
                CognitiveOperation::Remembering,
                CognitiveOperation::Researching,
            ]
        );
        assert_eq!(m.priority, ToolPriority::Critical);
        // 2048 × 1.5 × 1.25
        assert_eq!(m.token_budget, 3840);
    }

    #[test]
    fn quick_reply_high_complexity_adds_reasoning() {
        let m = map(
            ResponseStrategy::QuickReply,
            factors(Complexity::High, SystemLoad::Low, UserPreference::Balanced),
        );
        assert_eq!(m.operations.last(), Some(&CognitiveOperation::Reasoning));
        assert_eq!(m.operations.len(), 3);
    }

    #[test]
    fn speed_keeps_two_operations_and_raises_quick_priority() {
        let m = map(
            ResponseStrategy::DeepReason,
            factors(Complexity::High, SystemLoad::Low, UserPreference::Speed),
        );
        assert_eq!(m.operations.len(), 2);
        assert_eq!(m.priority, ToolPriority::High);

        let q = map(
            ResponseStrategy::QuickReply,
            factors(Complexity::Low, SystemLoad::Low, UserPreference::Speed),
        );
        assert_eq!(q.priority, ToolPriority::High);
    }

    #[test]
    fn high_load_disables_parallelism_and_shrinks_budget() {
        let m = map(
            ResponseStrategy::QuickReply,
            factors(Complexity::Medium, SystemLoad::High, UserPreference::Balanced),
        );
        assert!(!m.parallel);
        // 512 × 0.8
        assert_eq!(m.token_budget, 410);
    }

    #[test]
    fn busy_channel_disables_parallelism() {
        let mut f = factors(Complexity::Medium, SystemLoad::Low, UserPreference::Balanced);
        f.channel_activity = ChannelActivity::Busy;
        assert!(!map(ResponseStrategy::QuickReply, f).parallel);
    }

    #[test]
    fn ignore_and_defer() {
        let f = factors(Complexity::High, SystemLoad::Low, UserPreference::Accuracy);
        let ignore = map(ResponseStrategy::Ignore, f);
        assert!(ignore.operations.is_empty());
        assert_eq!(ignore.token_budget, 0);
        assert_eq!(ignore.priority, ToolPriority::Low);
        assert!(!ignore.parallel);

        let defer = map(ResponseStrategy::Defer, f);
        assert_eq!(defer.operations, vec![CognitiveOperation::Remembering]);
        assert_eq!(defer.priority, ToolPriority::Low);
        assert!(!defer.parallel);
    }

    #[test]
    fn budget_floor_and_cap() {
        let f = factors(Complexity::Low, SystemLoad::Low, UserPreference::Balanced);
        let mapper = StrategyOperationMapper::fixed(1000);

        let floored = mapper.map(
            &MappingRequest::new(ResponseStrategy::Defer, 0.7)
                .with_tokens(300)
                .with_factors(f),
        );
        assert_eq!(floored.token_budget, 600);

        let capped = mapper.map(
            &MappingRequest::new(ResponseStrategy::Defer, 0.7)
                .with_tokens(900)
                .with_factors(f),
        );
        assert_eq!(capped.token_budget, 1000);
    }

    #[test]
    fn derived_factors_follow_confidence_and_size() {
        let mapper = StrategyOperationMapper::fixed(8192);
        let m =
            mapper.map(&MappingRequest::new(ResponseStrategy::DeepReason, 0.95).with_tokens(600));
        assert_eq!(m.factors.complexity, Complexity::High);
        assert_eq!(m.factors.user_preference, UserPreference::Accuracy);
        assert_eq!(m.priority, ToolPriority::Critical);
    }

    #[test]
    fn recorded_failures_adapt_later_mappings() {
        let mapper = StrategyOperationMapper::new(8192, Box::new(EwmaPolicy::new(0.3, 5000)));
        let f = factors(Complexity::Low, SystemLoad::Low, UserPreference::Balanced);
        let request = MappingRequest::new(ResponseStrategy::QuickReply, 0.7).with_factors(f);

        let first = mapper.map(&request);
        assert!(!first.adapted);
        for _ in 0..3 {
            mapper.record_outcome(&first, false, 200);
        }

        let second = mapper.map(&request);
        assert!(second.adapted);
        assert!(second.operations.contains(&CognitiveOperation::Reasoning));
        assert!(second.token_budget > first.token_budget);
        assert_eq!(mapper.policy_name(), "ewma");
    }

    #[test]
    fn adaptation_never_widens_past_speed_limit() {
        let mapper = StrategyOperationMapper::new(8192, Box::new(EwmaPolicy::new(0.5, 5000)));
        let f = factors(Complexity::Low, SystemLoad::Low, UserPreference::Speed);
        let request = MappingRequest::new(ResponseStrategy::QuickReply, 0.4).with_factors(f);

        let first = mapper.map(&request);
        for _ in 0..4 {
            mapper.record_outcome(&first, false, 100);
        }

        let second = mapper.map(&request);
        assert!(second.adapted);
        assert_eq!(
            second.operations,
            vec![CognitiveOperation::Understanding, CognitiveOperation::Processing]
        );
        assert!(second.token_budget > first.token_budget);
    }
}
