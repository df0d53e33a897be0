//! The agent abstraction (§4.7): a resolved view of one `AgentConfig`, plus
//! the state machine vocabulary the turn pipeline drives it through and
//! the sub-stage escalation rules Agencies layer on top of `generating`.
//!
//! `idle -> planning -> (tool_call -> tool_wait)* -> generating -> done`,
//! with `error` reachable from any state. The states are not kept as a
//! struct between suspension points — `turn.rs` uses them as the
//! vocabulary for its `status` events and logs.

use sa_domain::config::{AgentConfig, ToolPolicy, WorkflowConfig};
use sa_domain::tool::ToolDefinition;
use sa_tools::ToolRegistry;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Idle,
    Planning,
    ToolCall,
    ToolWait,
    Generating,
    Done,
    Error,
}

/// A closed-set agent resolved from config, ready to drive a turn.
#[derive(Debug, Clone)]
pub struct Agent {
    pub id: String,
    pub system_prompt: String,
    pub tool_policy: ToolPolicy,
    pub model: Option<String>,
    pub workflow: Option<WorkflowConfig>,
}

impl Agent {
    pub fn from_config(cfg: &AgentConfig) -> Self {
        Self {
            id: cfg.id.clone(),
            system_prompt: cfg.system_prompt.clone(),
            tool_policy: cfg.tool_policy.clone(),
            model: cfg.model.clone(),
            workflow: cfg.workflow.clone(),
        }
    }

    pub fn is_agency(&self) -> bool {
        self.workflow.is_some()
    }

    /// The tool definitions this agent's `tool_call` state may emit,
    /// filtered by its `ToolPolicy` against everything the registry knows.
    pub fn allowed_tools(&self, registry: &ToolRegistry) -> Vec<ToolDefinition> {
        registry
            .definitions()
            .into_iter()
            .filter(|d| self.tool_policy.allows(&d.name))
            .collect()
    }
}

/// Where an Agency's `generating` delegation currently sits.
#[derive(Debug, Clone)]
pub struct StageProgress {
    pub stage: String,
    pub index: usize,
}

/// Advance to the next named sub-stage, or `None` once past the last one.
pub fn next_stage(workflow: &WorkflowConfig, current: Option<&StageProgress>) -> Option<StageProgress> {
    let next_index = current.map(|c| c.index + 1).unwrap_or(0);
    workflow
        .stages
        .get(next_index)
        .map(|stage| StageProgress {
            stage: stage.clone(),
            index: next_index,
        })
}

/// Evaluates an Agency's escalation criteria at the end of a sub-stage:
/// a restricted category, sentiment below threshold, or a stage that ran
/// past its wall-clock budget. Returns the trigger reason, if any.
pub fn should_escalate(
    workflow: &WorkflowConfig,
    sentiment: Option<f32>,
    category: Option<&str>,
    stage_elapsed_ms: u64,
) -> Option<String> {
    if let Some(cat) = category {
        if workflow.restricted_categories.iter().any(|c| c == cat) {
            return Some(format!("restricted category: {cat}"));
        }
    }
    if let Some(sentiment) = sentiment {
        if sentiment < workflow.escalation_sentiment_threshold {
            return Some(format!("negative sentiment: {sentiment:.2}"));
        }
    }
    if stage_elapsed_ms > workflow.stage_timeout_ms {
        return Some(format!(
            "stage exceeded budget: {stage_elapsed_ms}ms > {}ms",
            workflow.stage_timeout_ms
        ));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_domain::config::AgentsConfig;

    #[test]
    fn customer_support_stage_sequence() {
        let cfg = AgentsConfig::default();
        let agent = Agent::from_config(&cfg.agents["customer-support"]);
        let workflow = agent.workflow.as_ref().unwrap();

        let s1 = next_stage(workflow, None).unwrap();
        assert_eq!(s1.stage, "intake");
        let s2 = next_stage(workflow, Some(&s1)).unwrap();
        assert_eq!(s2.stage, "sentiment");
        let s5 = next_stage(
            workflow,
            Some(&StageProgress {
                stage: "resolution".into(),
                index: 3,
            }),
        )
        .unwrap();
        assert_eq!(s5.stage, "summary");
        assert!(next_stage(workflow, Some(&s5)).is_none());
    }

    #[test]
    fn escalates_on_restricted_category() {
        let cfg = AgentsConfig::default();
        let agent = Agent::from_config(&cfg.agents["customer-support"]);
        let workflow = agent.workflow.as_ref().unwrap();
        let reason = should_escalate(workflow, Some(0.5), Some("billing_dispute"), 0);
        assert!(reason.unwrap().contains("restricted category"));
    }

    #[test]
    fn escalates_on_negative_sentiment() {
        let cfg = AgentsConfig::default();
        let agent = Agent::from_config(&cfg.agents["customer-support"]);
        let workflow = agent.workflow.as_ref().unwrap();
        let reason = should_escalate(workflow, Some(-0.9), None, 0);
        assert!(reason.unwrap().contains("negative sentiment"));
    }

    #[test]
    fn no_escalation_when_within_thresholds() {
        let cfg = AgentsConfig::default();
        let agent = Agent::from_config(&cfg.agents["customer-support"]);
        let workflow = agent.workflow.as_ref().unwrap();
        assert!(should_escalate(workflow, Some(0.2), Some("general"), 1000).is_none());
    }

    #[test]
    fn crm_is_agency_analytical_is_not() {
        let cfg = AgentsConfig::default();
        assert!(Agent::from_config(&cfg.agents["crm"]).is_agency());
        assert!(!Agent::from_config(&cfg.agents["analytical"]).is_agency());
    }
}
