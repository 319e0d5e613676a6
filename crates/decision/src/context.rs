//! Contextual factors — the signals that shape an operation mapping.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    #[default]
    Low,
    Medium,
    High,
}

impl Complexity {
    /// High above 500 tokens or 100 words, medium above 150 tokens or
    /// 30 words.
    pub fn from_size(token_estimate: u32, word_count: usize) -> Self {
        if token_estimate > 500 || word_count > 100 {
            Self::High
        } else if token_estimate > 150 || word_count > 30 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn budget_multiplier(&self) -> f64 {
        match self {
            Self::Low => 0.75,
            Self::Medium => 1.0,
            Self::High => 1.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SystemLoad {
    Low,
    #[default]
    Normal,
    High,
}

impl SystemLoad {
    /// Time-of-day estimate: business hours (09–17 UTC) are busy, the
    /// evening is normal, night is quiet.
    pub fn from_hour(hour_utc: u32) -> Self {
        match hour_utc {
            9..=17 => Self::High,
            18..=22 => Self::Normal,
            _ => Self::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserPreference {
    Speed,
    Accuracy,
    #[default]
    Balanced,
}

impl UserPreference {
    /// Low confidence favours a fast answer, high confidence a careful one.
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence < 0.5 {
            Self::Speed
        } else if confidence > 0.8 {
            Self::Accuracy
        } else {
            Self::Balanced
        }
    }

    pub fn budget_multiplier(&self) -> f64 {
        match self {
            Self::Speed => 0.75,
            Self::Accuracy => 1.25,
            Self::Balanced => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChannelActivity {
    Quiet,
    #[default]
    Normal,
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ContextualFactors {
    pub complexity: Complexity,
    pub system_load: SystemLoad,
    pub user_preference: UserPreference,
    pub channel_activity: ChannelActivity,
}

impl ContextualFactors {
    /// Derive factors from request size, confidence and the hour of day.
    /// Channel activity is assumed normal.
    pub fn derive(
        confidence: f64,
        token_estimate: u32,
        message: Option<&str>,
        hour_utc: u32,
    ) -> Self {
        let words = message.map(|m| m.split_whitespace().count()).unwrap_or(0);
        Self {
            complexity: Complexity::from_size(token_estimate, words),
            system_load: SystemLoad::from_hour(hour_utc),
            user_preference: UserPreference::from_confidence(confidence),
            channel_activity: ChannelActivity::Normal,
        }
    }
}

/// Rough token count for a message: one token per four characters.
pub fn estimate_tokens(text: &str) -> u32 {
    text.chars().count().div_ceil(4) as u32
}
