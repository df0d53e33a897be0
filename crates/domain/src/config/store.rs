use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// PersistentStore
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Filesystem path to the SQLite database file.
    /// `":memory:"` is accepted for tests and ephemeral runs.
    #[serde(default = "d_sqlite_path")]
    pub sqlite_path: String,
    /// Maximum connections in the `sqlx::SqlitePool`.
    #[serde(default = "d_max_connections")]
    pub max_connections: u32,
    /// Run embedded migrations automatically on startup.
    #[serde(default = "d_true")]
    pub auto_migrate: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sqlite_path: d_sqlite_path(),
            max_connections: d_max_connections(),
            auto_migrate: true,
        }
    }
}

fn d_sqlite_path() -> String {
    "serialagent.db".into()
}
fn d_max_connections() -> u32 {
    5
}
fn d_true() -> bool {
    true
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
