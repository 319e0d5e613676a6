//! Maestro decision layer.
//!
//! The [`StrategyOperationMapper`] turns a response strategy into cognitive
//! operations, a priority and a token budget, learning from recorded
//! outcomes through a pluggable [`AdaptationPolicy`]. The [`DecisionMaker`]
//! resolves the processing modules to run, falling back from the mapper to
//! static tables when context is thin.

pub mod context;
pub mod error;
pub mod maker;
pub mod mapper;
pub mod policy;
pub mod strategy;

pub use context::{
    ChannelActivity, Complexity, ContextualFactors, SystemLoad, UserPreference, estimate_tokens,
};
pub use error::DecisionError;
pub use maker::{DecisionInput, DecisionMaker, ModuleResolution, ResolutionSource};
pub use mapper::{MappingRequest, OperationMapping, StrategyOperationMapper};
pub use policy::{AdaptationPolicy, EwmaPolicy, NoAdaptation, OutcomeStats};
pub use strategy::{CognitiveOperation, ProcessingModule, ResponseStrategy};
