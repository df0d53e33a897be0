use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ToolRegistry / built-in tool configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Per-tool default timeout (milliseconds), overridable per invocation.
    #[serde(default = "d_timeout_ms")]
    pub default_timeout_ms: u64,
    /// Cap on a tool's serialized output before it is truncated for both
    /// the stream and the persisted `tool_executions.tool_output` row.
    #[serde(default = "d_output_cap_bytes")]
    pub output_cap_bytes: usize,
    /// Per-tool retry cap within a single turn (a tool failing this many
    /// times makes the agent move on rather than loop forever).
    #[serde(default = "d_retry_cap")]
    pub retry_cap: u32,
    #[serde(default)]
    pub exec_security: ExecSecurityConfig,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: d_timeout_ms(),
            output_cap_bytes: d_output_cap_bytes(),
            retry_cap: d_retry_cap(),
            exec_security: ExecSecurityConfig::default(),
        }
    }
}

/// Security policy for the built-in `exec` tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecSecurityConfig {
    /// Regex patterns that, if matched against the command line, cause
    /// the invocation to be rejected before it ever spawns a process.
    #[serde(default = "d_denied_patterns")]
    pub denied_patterns: Vec<String>,
    /// Default foreground wait before auto-backgrounding (milliseconds).
    #[serde(default = "d_yield_ms")]
    pub yield_ms: u64,
    /// Hard kill timeout for a background process (seconds).
    #[serde(default = "d_hard_timeout_sec")]
    pub hard_timeout_sec: u64,
}

impl Default for ExecSecurityConfig {
    fn default() -> Self {
        Self {
            denied_patterns: d_denied_patterns(),
            yield_ms: d_yield_ms(),
            hard_timeout_sec: d_hard_timeout_sec(),
        }
    }
}

/// Back-compat alias: the process manager only needs the exec-security
/// subset of `ToolsConfig`.
pub type ExecConfig = ExecSecurityConfig;

fn d_timeout_ms() -> u64 {
    30_000
}
fn d_output_cap_bytes() -> usize {
    32 * 1024
}
fn d_retry_cap() -> u32 {
    1
}
fn d_yield_ms() -> u64 {
    3_000
}
fn d_hard_timeout_sec() -> u64 {
    120
}
fn d_denied_patterns() -> Vec<String> {
    vec![
        r"rm\s+-rf\s+/".into(),
        r":\(\)\s*\{\s*:\|:&\s*\};:".into(),
        r"mkfs\.".into(),
        r">\s*/dev/sd[a-z]".into(),
    ]
}
