//! Strategies, cognitive operations and the processing modules behind them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DecisionError;

// ── Response strategy ─────────────────────────────────────────────────────

/// Coarse decision on how to respond to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStrategy {
    QuickReply,
    DeepReason,
    Defer,
    Ignore,
}

impl ResponseStrategy {
    pub const ALL: [ResponseStrategy; 4] = [
        Self::QuickReply,
        Self::DeepReason,
        Self::Defer,
        Self::Ignore,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QuickReply => "quick_reply",
            Self::DeepReason => "deep_reason",
            Self::Defer => "defer",
            Self::Ignore => "ignore",
        }
    }

    /// Operations a strategy needs before any contextual adjustment.
    pub fn base_operations(&self) -> &'static [CognitiveOperation] {
        use CognitiveOperation::*;
        match self {
            Self::QuickReply => &[Understanding, Processing],
            Self::DeepReason => &[Understanding, Reasoning, Remembering],
            Self::Defer => &[Remembering],
            Self::Ignore => &[],
        }
    }

    /// Token budget before multipliers.
    pub fn base_token_budget(&self) -> u32 {
        match self {
            Self::QuickReply => 512,
            Self::DeepReason => 2048,
            Self::Defer => 256,
            Self::Ignore => 0,
        }
    }
}

impl fmt::Display for ResponseStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseStrategy {
    type Err = DecisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "quick_reply" | "quick" => Ok(Self::QuickReply),
            "deep_reason" | "deep" => Ok(Self::DeepReason),
            "defer" => Ok(Self::Defer),
            "ignore" => Ok(Self::Ignore),
            _ => Err(DecisionError::UnknownStrategy(s.to_string())),
        }
    }
}

// ── Cognitive operation ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CognitiveOperation {
    Understanding,
    Processing,
    Reasoning,
    Remembering,
    Researching,
}

impl CognitiveOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Understanding => "understanding",
            Self::Processing => "processing",
            Self::Reasoning => "reasoning",
            Self::Remembering => "remembering",
            Self::Researching => "researching",
        }
    }

    /// The module that performs this operation.
    pub fn module(&self) -> ProcessingModule {
        match self {
            Self::Understanding => ProcessingModule::IntentAnalyzer,
            Self::Processing => ProcessingModule::ContentProcessor,
            Self::Reasoning => ProcessingModule::ReasoningEngine,
            Self::Remembering => ProcessingModule::MemoryManager,
            Self::Researching => ProcessingModule::ResearchAgent,
        }
    }
}

impl fmt::Display for CognitiveOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts the operation names plus the older verb-style tags
/// (`think`, `recall`, `search`, ...).
impl FromStr for CognitiveOperation {
    type Err = DecisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "understanding" | "understand" | "intent" => Ok(Self::Understanding),
            "processing" | "process" | "extract" => Ok(Self::Processing),
            "reasoning" | "reason" | "think" | "analyze" => Ok(Self::Reasoning),
            "remembering" | "remember" | "recall" | "memory" => Ok(Self::Remembering),
            "researching" | "research" | "search" => Ok(Self::Researching),
            _ => Err(DecisionError::UnknownOperation(s.to_string())),
        }
    }
}

// ── Processing module ─────────────────────────────────────────────────────

/// A concrete processing unit the orchestrator dispatches work to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingModule {
    ReasoningEngine,
    MemoryManager,
    ResearchAgent,
    ContentProcessor,
    IntentAnalyzer,
}

impl ProcessingModule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReasoningEngine => "reasoning_engine",
            Self::MemoryManager => "memory_manager",
            Self::ResearchAgent => "research_agent",
            Self::ContentProcessor => "content_processor",
            Self::IntentAnalyzer => "intent_analyzer",
        }
    }

    /// Tool capabilities this module draws on.
    pub fn required_capabilities(&self) -> &'static [&'static str] {
        match self {
            Self::ReasoningEngine => &["reasoning", "analysis"],
            Self::MemoryManager => &["memory", "recall"],
            Self::ResearchAgent => &["web_search", "research"],
            Self::ContentProcessor => &["document", "file_read"],
            Self::IntentAnalyzer => &["intent", "classification"],
        }
    }
}

impl fmt::Display for ProcessingModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
