use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// MemoryGateway connection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Connection settings for the external memory/vector store.
///
/// When `base_url` is `None` the gateway falls back to `NullMemoryGateway`
/// (always returns empty results) rather than failing startup — memory is
/// best-effort by design.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Wall-clock budget for `queryRelevant` calls (milliseconds).
    #[serde(default = "d_query_timeout_ms")]
    pub query_timeout_ms: u64,
    /// Wall-clock budget for `addTurn` calls (milliseconds).
    #[serde(default = "d_add_timeout_ms")]
    pub add_timeout_ms: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            query_timeout_ms: d_query_timeout_ms(),
            add_timeout_ms: d_add_timeout_ms(),
        }
    }
}

impl MemoryConfig {
    /// Whether an `HttpMemoryGateway` should be constructed, versus the
    /// no-op `NullMemoryGateway`.
    pub fn is_configured(&self) -> bool {
        self.base_url.as_ref().is_some_and(|u| !u.is_empty())
    }
}

fn d_query_timeout_ms() -> u64 {
    1_500
}
fn d_add_timeout_ms() -> u64 {
    3_000
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_configured_by_default() {
        assert!(!MemoryConfig::default().is_configured());
    }

    #[test]
    fn configured_when_base_url_set() {
        let cfg = MemoryConfig {
            base_url: Some("http://localhost:8088".into()),
            ..MemoryConfig::default()
        };
        assert!(cfg.is_configured());
    }

    #[test]
    fn empty_base_url_is_not_configured() {
        let cfg = MemoryConfig {
            base_url: Some(String::new()),
            ..MemoryConfig::default()
        };
        assert!(!cfg.is_configured());
    }
}
