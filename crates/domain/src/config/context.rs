use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ContextAssembler caps
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Hard cap on total messages in the assembled bundle, including the
    /// system prompt and the current user message.
    #[serde(default = "d_max_messages")]
    pub max_messages: usize,
    /// Overflow policy applied when the assembled bundle would exceed
    /// `max_messages`.
    #[serde(default)]
    pub overflow_policy: OverflowPolicy,
    /// System message slots reserved by the sliding-window overflow policy.
    #[serde(default = "d_system_reserved_slots")]
    pub system_reserved_slots: usize,
    #[serde(default)]
    pub cross_session: CrossSessionPolicy,
    #[serde(default)]
    pub memory: MemoryPolicy,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_messages: d_max_messages(),
            overflow_policy: OverflowPolicy::default(),
            system_reserved_slots: d_system_reserved_slots(),
            cross_session: CrossSessionPolicy::default(),
            memory: MemoryPolicy::default(),
        }
    }
}

/// Overflow strategy once the assembled bundle exceeds `max_messages`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicy {
    /// Reserve `system_reserved_slots`, then keep the most recent
    /// non-system messages.
    #[default]
    SlidingWindow,
    /// Keep the last `max_messages` with no reserved system overhead.
    Truncate,
    /// Reserved name. No summarizer is wired up; this always falls back to
    /// `SlidingWindow` and the resulting `ContextBundle.degraded` is set.
    Summarize,
}

/// Cross-session snippet lookup — pulls recent messages from other active
/// sessions belonging to the same user, to give the agent continuity
/// across conversations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossSessionPolicy {
    /// Whether cross-session lookup runs at all.
    #[serde(default = "d_true")]
    pub enabled: bool,
    /// Maximum number of other sessions to pull snippets from.
    #[serde(default = "d_3")]
    pub max_sessions: usize,
    /// Only consider sessions whose `lastActivityAt` falls within this
    /// many hours.
    #[serde(default = "d_24")]
    pub window_hours: i64,
    /// Maximum messages contributed per matched session.
    #[serde(default = "d_10")]
    pub max_messages_per_session: usize,
}

impl Default for CrossSessionPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_sessions: d_3(),
            window_hours: d_24(),
            max_messages_per_session: d_10(),
        }
    }
}

/// Memory-snippet retrieval policy for a turn's context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryPolicy {
    #[serde(default = "d_true")]
    pub enabled: bool,
    /// Maximum snippets returned from `MemoryGateway.queryRelevant`.
    #[serde(default = "d_5")]
    pub max_snippets: usize,
}

impl Default for MemoryPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_snippets: d_5(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_max_messages() -> usize {
    100
}
fn d_system_reserved_slots() -> usize {
    1
}
fn d_true() -> bool {
    true
}
fn d_3() -> usize {
    3
}
fn d_24() -> i64 {
    24
}
fn d_10() -> usize {
    10
}
fn d_5() -> usize {
    5
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
