use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Agent definitions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Configuration for one of the five fixed conversational agents.
///
/// Unlike a dynamic delegation registry, this set is closed at build time:
/// the [`Router`](crate::config::RouterConfig) selects one of these by id
/// before a turn starts, it is never invoked recursively mid-turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Stable identifier, e.g. `"analytical"`, `"crm"`.
    pub id: String,
    /// System prompt prefix injected by the ContextAssembler.
    #[serde(default)]
    pub system_prompt: String,
    /// Tool allow/deny policy.
    #[serde(default)]
    pub tool_policy: ToolPolicy,
    /// Override model string (`"provider_id/model_name"`). Falls back to
    /// the default provider's default model when unset.
    #[serde(default)]
    pub model: Option<String>,
    /// Workflow stage configuration for Agencies (`customer-support`,
    /// `crm`). `None` for plain conversational agents.
    #[serde(default)]
    pub workflow: Option<WorkflowConfig>,
}

/// Sub-stage thresholds for an Agency's `generating` delegation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Ordered sub-stage names, e.g. `["intake", "sentiment", ...]`.
    pub stages: Vec<String>,
    /// Per-stage wall-clock budget before an `escalation` branch triggers.
    #[serde(default = "d_stage_timeout_ms")]
    pub stage_timeout_ms: u64,
    /// Category names that force escalation regardless of sentiment.
    #[serde(default)]
    pub restricted_categories: Vec<String>,
    /// Sentiment score below which escalation triggers (-1.0..=1.0).
    #[serde(default = "d_escalation_sentiment")]
    pub escalation_sentiment_threshold: f32,
}

fn d_stage_timeout_ms() -> u64 {
    15_000
}
fn d_escalation_sentiment() -> f32 {
    -0.4
}

/// Tool allow/deny policy — prefix-based matching.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolPolicy {
    /// Tool name prefixes this agent may use. `["*"]` or empty = unrestricted.
    #[serde(default)]
    pub allow: Vec<String>,
    /// Tool name prefixes this agent is denied (evaluated before allow).
    #[serde(default)]
    pub deny: Vec<String>,
}

impl ToolPolicy {
    /// Check whether the given tool name is permitted by this policy.
    ///
    /// Matching is **case-insensitive**. Deny always wins over allow.
    pub fn allows(&self, tool_name: &str) -> bool {
        let name = tool_name.to_ascii_lowercase();

        for d in &self.deny {
            let d_lower = d.to_ascii_lowercase();
            if d_lower == "*" || name == d_lower || name.starts_with(&format!("{d_lower}.")) {
                return false;
            }
        }
        if self.allow.is_empty() || self.allow.iter().any(|a| a == "*") {
            return true;
        }
        for a in &self.allow {
            let a_lower = a.to_ascii_lowercase();
            if name == a_lower || name.starts_with(&format!("{a_lower}.")) {
                return true;
            }
        }
        false
    }
}

/// The closed set of agents, keyed by id, plus the default fallback id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentsConfig {
    #[serde(default = "d_default_agent")]
    pub default_agent: String,
    #[serde(default = "d_agents")]
    pub agents: HashMap<String, AgentConfig>,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            default_agent: d_default_agent(),
            agents: d_agents(),
        }
    }
}

fn d_default_agent() -> String {
    "analytical".into()
}

fn d_agents() -> HashMap<String, AgentConfig> {
    let mut m = HashMap::new();
    m.insert(
        "analytical".into(),
        AgentConfig {
            id: "analytical".into(),
            system_prompt: "You are an analytical assistant. Reason carefully, cite evidence from retrieved memory, and prefer precise, structured answers.".into(),
            tool_policy: ToolPolicy {
                allow: vec!["memory.search".into()],
                deny: vec![],
            },
            model: None,
            workflow: None,
        },
    );
    m.insert(
        "creative".into(),
        AgentConfig {
            id: "creative".into(),
            system_prompt: "You are a creative assistant. Favor expressive, exploratory responses while staying grounded in retrieved context.".into(),
            tool_policy: ToolPolicy {
                allow: vec!["memory.search".into()],
                deny: vec![],
            },
            model: None,
            workflow: None,
        },
    );
    m.insert(
        "technical".into(),
        AgentConfig {
            id: "technical".into(),
            system_prompt: "You are a technical assistant. Give accurate, implementation-level detail and call out tradeoffs.".into(),
            tool_policy: ToolPolicy {
                allow: vec!["memory.search".into(), "web.search".into()],
                deny: vec![],
            },
            model: None,
            workflow: None,
        },
    );
    m.insert(
        "customer-support".into(),
        AgentConfig {
            id: "customer-support".into(),
            system_prompt: "You are a customer support agent. Work the ticket through intake, sentiment, classification, resolution, and summary.".into(),
            tool_policy: ToolPolicy {
                allow: vec!["memory.search".into()],
                deny: vec![],
            },
            model: None,
            workflow: Some(WorkflowConfig {
                stages: vec![
                    "intake".into(),
                    "sentiment".into(),
                    "classification".into(),
                    "resolution".into(),
                    "summary".into(),
                ],
                stage_timeout_ms: d_stage_timeout_ms(),
                restricted_categories: vec!["billing_dispute".into(), "legal".into()],
                escalation_sentiment_threshold: d_escalation_sentiment(),
            }),
        },
    );
    m.insert(
        "crm".into(),
        AgentConfig {
            id: "crm".into(),
            system_prompt: "You are a CRM operations agent. Work the request through intake, lookup, action, and summary, using contact and deal tools as needed.".into(),
            tool_policy: ToolPolicy {
                allow: vec![
                    "contact_search".into(),
                    "crm.create_note".into(),
                    "crm.update_deal".into(),
                    "memory.search".into(),
                ],
                deny: vec![],
            },
            model: None,
            workflow: Some(WorkflowConfig {
                stages: vec![
                    "intake".into(),
                    "lookup".into(),
                    "action".into(),
                    "summary".into(),
                ],
                stage_timeout_ms: d_stage_timeout_ms(),
                restricted_categories: vec![],
                escalation_sentiment_threshold: d_escalation_sentiment(),
            }),
        },
    );
    m
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
