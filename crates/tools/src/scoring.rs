//! Tool ranking.
//!
//! score = priority weight
//!       + priority-match bonus
//!       + reliability × 100
//!       + performance bonus (inverse of mean response time)
//!       + category bonus per requested capability whose keywords map to the
//!         tool's category

use maestro_core::{ExecutionContext, ToolCategory, ToolDefinition};

use crate::metrics::ExecutionMetrics;

pub const PRIORITY_MATCH_BONUS: f64 = 20.0;
pub const RELIABILITY_WEIGHT: f64 = 100.0;
pub const MAX_PERFORMANCE_BONUS: f64 = 20.0;
pub const CATEGORY_MATCH_BONUS: f64 = 15.0;

/// Response times below this floor all earn the maximum bonus.
const PERFORMANCE_FLOOR_MS: f64 = 50.0;

pub fn score(tool: &ToolDefinition, metrics: &ExecutionMetrics, ctx: &ExecutionContext) -> f64 {
    let mut score = tool.priority.weight();
    if tool.priority == ctx.priority {
        score += PRIORITY_MATCH_BONUS;
    }
    score += metrics.reliability() * RELIABILITY_WEIGHT;
    score += performance_bonus(metrics);
    score += category_bonus(tool.category, &ctx.required_capabilities);
    score
}

/// Zero until the tool has run; afterwards `1000 / max(avg_ms, 50)`, capped.
pub fn performance_bonus(metrics: &ExecutionMetrics) -> f64 {
    if metrics.execution_count == 0 {
        return 0.0;
    }
    (1000.0 / metrics.avg_response_time_ms().max(PERFORMANCE_FLOOR_MS)).min(MAX_PERFORMANCE_BONUS)
}

pub fn category_bonus(category: ToolCategory, requested: &[String]) -> f64 {
    requested
        .iter()
        .filter(|cap| ToolCategory::matching(cap).contains(&category))
        .count() as f64
        * CATEGORY_MATCH_BONUS
}
