//! Decision maker — layered module resolution.
//!
//! Resolution order:
//! 1. the mapper, when a recognised strategy is present and advanced
//!    mapping is on
//! 2. the static strategy → operation table
//! 3. an explicit operation tag
//! 4. the understanding operation

use maestro_config::DecisionConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::context::{ContextualFactors, estimate_tokens};
use crate::mapper::{MappingRequest, OperationMapping, StrategyOperationMapper};
use crate::strategy::{CognitiveOperation, ProcessingModule, ResponseStrategy};

/// Confidence assumed when the caller gives none.
const DEFAULT_CONFIDENCE: f64 = 0.7;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecisionInput {
    /// Raw strategy name, e.g. `deep_reason`.
    #[serde(default)]
    pub strategy: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub token_estimate: Option<u32>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub factors: Option<ContextualFactors>,
    /// Legacy operation tag, e.g. `think` or `recall`.
    #[serde(default)]
    pub operation_tag: Option<String>,
}

impl DecisionInput {
    pub fn strategy(strategy: impl Into<String>) -> Self {
        Self {
            strategy: Some(strategy.into()),
            ..Self::default()
        }
    }

    pub fn operation(tag: impl Into<String>) -> Self {
        Self {
            operation_tag: Some(tag.into()),
            ..Self::default()
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
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

    pub fn with_operation_tag(mut self, tag: impl Into<String>) -> Self {
        self.operation_tag = Some(tag.into());
        self
    }
}

/// Which tier produced a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    Mapper,
    StrategyTable,
    OperationTag,
    Default,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleResolution {
    pub operations: Vec<CognitiveOperation>,
    /// One module per operation, in operation order.
    pub modules: Vec<ProcessingModule>,
    pub source: ResolutionSource,
    /// Present only when the mapper produced the resolution.
    pub mapping: Option<OperationMapping>,
}

impl ModuleResolution {
    fn from_operations(
        operations: Vec<CognitiveOperation>,
        source: ResolutionSource,
        mapping: Option<OperationMapping>,
    ) -> Self {
        let mut modules = Vec::with_capacity(operations.len());
        for module in operations.iter().map(CognitiveOperation::module) {
            if !modules.contains(&module) {
                modules.push(module);
            }
        }
        Self {
            operations,
            modules,
            source,
            mapping,
        }
    }

    /// Union of the modules' tool capabilities, first occurrence order.
    pub fn required_capabilities(&self) -> Vec<String> {
        let mut caps: Vec<String> = Vec::new();
        for cap in self.modules.iter().flat_map(|m| m.required_capabilities()) {
            if !caps.iter().any(|c| c == cap) {
                caps.push(cap.to_string());
            }
        }
        caps
    }
}

pub struct DecisionMaker {
    mapper: StrategyOperationMapper,
    advanced_mapping: bool,
}

impl DecisionMaker {
    pub fn new(mapper: StrategyOperationMapper, advanced_mapping: bool) -> Self {
        Self {
            mapper,
            advanced_mapping,
        }
    }

    pub fn from_config(config: &DecisionConfig) -> Self {
        Self::new(
            StrategyOperationMapper::from_config(config),
            config.advanced_mapping,
        )
    }

    pub fn mapper(&self) -> &StrategyOperationMapper {
        &self.mapper
    }

    pub fn resolve(&self, input: &DecisionInput) -> ModuleResolution {
        let strategy = input
            .strategy
            .as_deref()
            .and_then(|raw| match raw.parse::<ResponseStrategy>() {
                Ok(s) => Some(s),
                Err(e) => {
                    warn!(error = %e, "Ignoring unrecognised strategy");
                    None
                }
            });

        if let Some(strategy) = strategy {
            if self.advanced_mapping {
                let mapping = self.mapper.map(&self.mapping_request(strategy, input));
                debug!(%strategy, "Resolved modules through mapper");
                return ModuleResolution::from_operations(
                    mapping.operations.clone(),
                    ResolutionSource::Mapper,
                    Some(mapping),
                );
            }
            debug!(%strategy, "Resolved modules through strategy table");
            return ModuleResolution::from_operations(
                strategy.base_operations().to_vec(),
                ResolutionSource::StrategyTable,
                None,
            );
        }

        if let Some(tag) = input.operation_tag.as_deref() {
            match tag.parse::<CognitiveOperation>() {
                Ok(op) => {
                    debug!(operation = %op, "Resolved module from operation tag");
                    return ModuleResolution::from_operations(
                        vec![op],
                        ResolutionSource::OperationTag,
                        None,
                    );
                }
                Err(e) => warn!(error = %e, "Ignoring unrecognised operation tag"),
            }
        }

        debug!("No usable strategy or tag, defaulting to understanding");
        ModuleResolution::from_operations(
            vec![CognitiveOperation::Understanding],
            ResolutionSource::Default,
            None,
        )
    }

    fn mapping_request(&self, strategy: ResponseStrategy, input: &DecisionInput) -> MappingRequest {
        let tokens = input
            .token_estimate
            .or_else(|| input.message.as_deref().map(estimate_tokens))
            .unwrap_or(0);
        let confidence = input.confidence.unwrap_or(DEFAULT_CONFIDENCE);
        let mut request = MappingRequest::new(strategy, confidence).with_tokens(tokens);
        if let Some(message) = &input.message {
            request = request.with_message(message.clone());
        }
        if let Some(factors) = input.factors {
            request = request.with_factors(factors);
        }
        request
    }
}
