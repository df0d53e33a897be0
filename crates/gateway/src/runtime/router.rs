//! Turn routing (§4.6): picks which agent handles a turn, before the
//! pipeline drives its FSM.
//!
//! `Router::decide` is pure — no I/O, no session mutation — so every turn
//! produces a reproducible trail in the `DecisionLog` and a `RouterDecision`
//! the pipeline persists onto the assistant message's metadata.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use sa_domain::config::{AgentsConfig, RouterConfig};
use sa_domain::trace::TraceEvent;
use serde::{Deserialize, Serialize};

/// Per-session routing state the caller supplies; lives in session
/// metadata, not in the `Router` itself.
#[derive(Debug, Clone, Default)]
pub struct SessionSettings {
    /// When set, the session is pinned to `last_agent` and the classifier
    /// never runs.
    pub agent_lock: bool,
    pub last_agent: Option<String>,
    /// Soft preference used only to break classifier ties.
    pub agent_preference: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideSource {
    Slash,
    Lock,
    Router,
    Fallback,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterDecision {
    pub agent: String,
    pub confidence: f32,
    pub reason: String,
    pub override_source: OverrideSource,
}

/// Bounded ring buffer of recent decisions, exposed at `GET
/// /api/router/decisions` for operator diagnosis.
#[derive(Default)]
pub struct DecisionLog {
    capacity: usize,
    entries: Mutex<VecDeque<(String, RouterDecision)>>,
}

impl DecisionLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    fn push(&self, session_id: &str, decision: RouterDecision) {
        let mut entries = self.entries.lock();
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back((session_id.to_string(), decision));
    }

    /// Most recent `limit` decisions, newest first.
    pub fn recent(&self, limit: usize) -> Vec<(String, RouterDecision)> {
        self.entries
            .lock()
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }
}

/// Keyword groups used by the rule-based classifier. Each agent's score is
/// the fraction of its keywords present in the lower-cased user text.
/// `llm_classifier_enabled` is reserved for wiring an LLM-backed classifier
/// through the same `LlmProvider` used for turns; no prompt wording is
/// prescribed here, so it is not implemented in this build.
fn keyword_groups() -> HashMap<&'static str, &'static [&'static str]> {
    let mut m: HashMap<&'static str, &'static [&'static str]> = HashMap::new();
    m.insert(
        "analytical",
        &[
            "analyze", "analysis", "data", "compare", "metrics", "statistics", "why", "trend",
        ],
    );
    m.insert(
        "creative",
        &["write", "story", "poem", "brainstorm", "idea", "imagine", "creative"],
    );
    m.insert(
        "technical",
        &[
            "code", "bug", "error", "function", "api", "compile", "stack trace", "implement",
        ],
    );
    m.insert(
        "customer-support",
        &[
            "ticket", "refund", "complaint", "issue", "broken", "cancel", "support", "help me",
        ],
    );
    m.insert(
        "crm",
        &["contact", "deal", "lead", "crm", "pipeline", "account", "customer record"],
    );
    m
}

pub struct Router {
    config: RouterConfig,
    agents: AgentsConfig,
    pub decisions: DecisionLog,
}

impl Router {
    pub fn new(config: RouterConfig, agents: AgentsConfig) -> Self {
        let decisions = DecisionLog::new(config.decision_log_capacity);
        Self {
            config,
            agents,
            decisions,
        }
    }

    /// `/agent_id` or `/agent_id rest of message` — the leading token,
    /// minus its slash, must name one of the closed agents.
    fn parse_slash(&self, text: &str) -> Option<String> {
        let first = text.trim().split_whitespace().next()?;
        let id = first.strip_prefix('/')?;
        if self.agents.agents.contains_key(id) {
            Some(id.to_string())
        } else {
            None
        }
    }

    fn classify(&self, text: &str) -> HashMap<String, f32> {
        let lower = text.to_ascii_lowercase();
        let groups = keyword_groups();
        let mut scores = HashMap::new();
        for agent_id in self.agents.agents.keys() {
            let keywords = groups.get(agent_id.as_str()).copied().unwrap_or(&[]);
            if keywords.is_empty() {
                scores.insert(agent_id.clone(), 0.0);
                continue;
            }
            let hits = keywords.iter().filter(|kw| lower.contains(*kw)).count();
            scores.insert(agent_id.clone(), hits as f32 / keywords.len() as f32);
        }
        scores
    }

    /// Decision precedence: slash command > session lock > classifier >
    /// fallback. `explicit_slash_command` overrides text-derived slash
    /// parsing when the caller already extracted one (e.g. from a
    /// structured API field).
    pub fn decide(
        &self,
        session_id: &str,
        user_text: &str,
        settings: &SessionSettings,
        explicit_slash_command: Option<&str>,
    ) -> RouterDecision {
        let slash = explicit_slash_command
            .map(|s| s.to_string())
            .or_else(|| self.parse_slash(user_text));

        let decision = if let Some(agent) = slash.filter(|a| self.agents.agents.contains_key(a)) {
            RouterDecision {
                agent,
                confidence: 1.0,
                reason: "slash".into(),
                override_source: OverrideSource::Slash,
            }
        } else if settings.agent_lock
            && settings
                .last_agent
                .as_ref()
                .is_some_and(|a| self.agents.agents.contains_key(a))
        {
            RouterDecision {
                agent: settings.last_agent.clone().unwrap(),
                confidence: 1.0,
                reason: "locked".into(),
                override_source: OverrideSource::Lock,
            }
        } else {
            let scores = self.classify(user_text);
            match self.argmax(&scores, settings) {
                Some((agent, confidence)) if confidence >= self.config.confidence_threshold => {
                    RouterDecision {
                        agent,
                        confidence,
                        reason: "classifier".into(),
                        override_source: OverrideSource::Router,
                    }
                }
                _ => RouterDecision {
                    agent: self.agents.default_agent.clone(),
                    confidence: 0.0,
                    reason: "fallback".into(),
                    override_source: OverrideSource::Fallback,
                },
            }
        };

        TraceEvent::RouterDecision {
            session_id: session_id.to_string(),
            agent_id: decision.agent.clone(),
            source: decision.reason.clone(),
            confidence: Some(decision.confidence),
        }
        .emit();
        self.decisions.push(session_id, decision.clone());
        decision
    }

    /// Arg-max over classifier scores. Ties broken by `agentPreference`,
    /// then `lastAgent`, then fixed lexical order over agent ids.
    fn argmax(
        &self,
        scores: &HashMap<String, f32>,
        settings: &SessionSettings,
    ) -> Option<(String, f32)> {
        let max = scores.values().cloned().fold(f32::MIN, f32::max);
        if !max.is_finite() {
            return None;
        }
        let mut tied: Vec<&String> = scores
            .iter()
            .filter(|(_, v)| (**v - max).abs() < f32::EPSILON)
            .map(|(k, _)| k)
            .collect();
        tied.sort();

        if tied.len() == 1 {
            return Some((tied[0].clone(), max));
        }
        if let Some(pref) = &settings.agent_preference {
            if tied.iter().any(|a| *a == pref) {
                return Some((pref.clone(), max));
            }
        }
        if let Some(last) = &settings.last_agent {
            if tied.iter().any(|a| *a == last) {
                return Some((last.clone(), max));
            }
        }
        tied.first().map(|a| ((*a).clone(), max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> Router {
        Router::new(RouterConfig::default(), AgentsConfig::default())
    }

    #[test]
    fn slash_command_beats_lock() {
        let r = router();
        let settings = SessionSettings {
            agent_lock: true,
            last_agent: Some("analytical".into()),
            agent_preference: None,
        };
        let decision = r.decide("s1", "/crm find Peter Kelly", &settings, None);
        assert_eq!(decision.agent, "crm");
        assert_eq!(decision.override_source, OverrideSource::Slash);
        assert_eq!(decision.confidence, 1.0);
    }

    #[test]
    fn lock_wins_over_classifier() {
        let r = router();
        let settings = SessionSettings {
            agent_lock: true,
            last_agent: Some("creative".into()),
            agent_preference: None,
        };
        let decision = r.decide("s1", "please debug this function", &settings, None);
        assert_eq!(decision.agent, "creative");
        assert_eq!(decision.override_source, OverrideSource::Lock);
    }

    #[test]
    fn classifier_picks_technical_for_code_terms() {
        let r = router();
        let settings = SessionSettings::default();
        let decision = r.decide("s1", "I have a bug in my function, can you help debug the stack trace?", &settings, None);
        assert_eq!(decision.agent, "technical");
        assert_eq!(decision.override_source, OverrideSource::Router);
    }

    #[test]
    fn low_confidence_falls_back_to_default_agent() {
        let r = router();
        let settings = SessionSettings::default();
        let decision = r.decide("s1", "hello there", &settings, None);
        assert_eq!(decision.override_source, OverrideSource::Fallback);
        assert_eq!(decision.agent, "analytical");
    }

    #[test]
    fn decision_log_bounded_by_capacity() {
        let log = DecisionLog::new(2);
        for i in 0..5 {
            log.push(
                "s1",
                RouterDecision {
                    agent: format!("agent{i}"),
                    confidence: 1.0,
                    reason: "test".into(),
                    override_source: OverrideSource::Fallback,
                },
            );
        }
        assert_eq!(log.recent(10).len(), 2);
    }
}
