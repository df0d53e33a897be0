use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Router
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Classifier decisions below this confidence fall back to the default
    /// agent (`overrideSource: "fallback"`).
    #[serde(default = "d_confidence_threshold")]
    pub confidence_threshold: f32,
    /// Number of recent decisions retained in the in-memory `DecisionLog`
    /// exposed at `GET /api/router/decisions`.
    #[serde(default = "d_decision_log_capacity")]
    pub decision_log_capacity: usize,
    /// When set, the classifier step also issues an LLM call (through the
    /// same `LlmProvider` used for turns) instead of relying solely on the
    /// keyword heuristic.
    #[serde(default)]
    pub llm_classifier_enabled: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: d_confidence_threshold(),
            decision_log_capacity: d_decision_log_capacity(),
            llm_classifier_enabled: false,
        }
    }
}

fn d_confidence_threshold() -> f32 {
    0.30
}
fn d_decision_log_capacity() -> usize {
    200
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
