//! Keyword heuristic reasoning selector.

use async_trait::async_trait;
use maestro_core::{CollaboratorError, DecisionContext, ReasoningSelector, ServiceSelection};

const BASE_CONFIDENCE: f64 = 0.5;
const PER_MATCH: f64 = 0.15;
const PREFERRED_BONUS: f64 = 0.1;
const MAX_CONFIDENCE: f64 = 0.95;
/// Confidence when no keyword matched at all.
const UNMATCHED_CONFIDENCE: f64 = 0.4;

const SERVICES: &[(&str, &[&str])] = &[
    (
        "analytical",
        &[
            "analy", "compare", "why", "explain", "evaluat", "reason", "plan", "calculat",
            "tradeoff",
        ],
    ),
    (
        "creative",
        &["write", "story", "poem", "imagin", "design", "brainstorm", "creat", "idea"],
    ),
    (
        "factual",
        &["what", "when", "where", "who", "define", "fact", "list", "search", "find", "latest"],
    ),
    (
        "conversational",
        &["hi", "hello", "hey", "thanks", "thank", "chat", "how are"],
    ),
];

/// Picks among analytical, creative, factual and conversational services
/// by counting keyword hits in the request text.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicSelector;

impl HeuristicSelector {
    pub fn services() -> impl Iterator<Item = &'static str> {
        SERVICES.iter().map(|(name, _)| *name)
    }

    fn matches(text: &str, keywords: &[&str]) -> usize {
        let words: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric() && c != '\'')
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .collect();
        let lowered = text.to_lowercase();

        keywords
            .iter()
            .filter(|&&kw| {
                if kw.contains(' ') {
                    lowered.contains(kw)
                } else if kw.len() < 4 {
                    words.iter().any(|w| w == kw)
                } else {
                    words.iter().any(|w| w.starts_with(kw))
                }
            })
            .count()
    }

    fn confidence(hits: usize) -> f64 {
        if hits == 0 {
            UNMATCHED_CONFIDENCE
        } else {
            (BASE_CONFIDENCE + PER_MATCH * hits as f64).min(MAX_CONFIDENCE)
        }
    }
}

#[async_trait]
impl ReasoningSelector for HeuristicSelector {
    async fn select(&self, ctx: &DecisionContext) -> Result<ServiceSelection, CollaboratorError> {
        if ctx.request_text.trim().is_empty() {
            return Err(CollaboratorError::Selector("empty request text".into()));
        }

        let mut scored: Vec<(&str, usize)> = SERVICES
            .iter()
            .map(|(name, keywords)| (*name, Self::matches(&ctx.request_text, keywords)))
            .collect();
        // Stable: equal scores keep table order.
        scored.sort_by(|a, b| b.1.cmp(&a.1));

        let preferred = ctx
            .preferred_service
            .as_deref()
            .and_then(|p| scored.iter().position(|(name, _)| *name == p));

        let (name, confidence) = match preferred {
            Some(i) => {
                let (name, hits) = scored.remove(i);
                let bonus = if hits > 0 { PREFERRED_BONUS } else { 0.0 };
                (name, (Self::confidence(hits) + bonus).min(MAX_CONFIDENCE))
            }
            None => {
                let (name, hits) = scored.remove(0);
                (name, Self::confidence(hits))
            }
        };

        Ok(ServiceSelection {
            service_name: name.to_string(),
            confidence,
            fallbacks: scored.into_iter().map(|(n, _)| n.to_string()).collect(),
        })
    }
}
