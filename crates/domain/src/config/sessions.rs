use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session lifecycle
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleConfig::default(),
        }
    }
}

/// Session lifecycle rules — activity timeout and optional daily reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Idle timeout in minutes. If the last message was more than this
    /// many minutes ago, the session transitions `active` -> `inactive`.
    /// Reactivated on the next write.
    #[serde(default = "d_idle_minutes")]
    pub idle_minutes: u32,
    /// Daily reset hour (0-23, gateway-local time). `None` disables it.
    #[serde(default)]
    pub daily_reset_hour: Option<u8>,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            idle_minutes: d_idle_minutes(),
            daily_reset_hour: None,
        }
    }
}

fn d_idle_minutes() -> u32 {
    30
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
