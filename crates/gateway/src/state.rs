//! Shared application state handed to every API handler and to
//! `runtime::pipeline::start_turn`.
//!
//! One `Arc<AppState>` is built once at startup (see [`crate::bootstrap`])
//! and cloned (cheaply — every field is itself an `Arc`) into each request.

use std::collections::HashMap;
use std::sync::Arc;

use sa_domain::config::Config;
use sa_memory::MemoryGateway;
use sa_providers::registry::ProviderRegistry;
use sa_sessions::SessionRegistry;
use sa_store::PersistentStore;
use sa_tools::ToolRegistry;

use crate::runtime::agent::Agent;
use crate::runtime::cancel::CancelMap;
use crate::runtime::context::ContextAssembler;
use crate::runtime::quota::QuotaTracker;
use crate::runtime::router::Router;
use crate::runtime::session_rate_limit::SessionRateLimiter;

/// Everything a turn or an API handler needs. Built once in
/// [`crate::bootstrap::build_state`] from a loaded [`Config`].
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<PersistentStore>,

    // ── Turn orchestration ───────────────────────────────────────────
    pub sessions: Arc<SessionRegistry>,
    pub cancels: Arc<CancelMap>,
    pub quota: Arc<QuotaTracker>,
    pub router: Arc<Router>,
    /// The closed agent set, resolved from `AgentsConfig` once at startup.
    pub agents: HashMap<String, Agent>,
    pub context: Arc<ContextAssembler>,
    pub providers: Arc<ProviderRegistry>,
    pub tools: Arc<ToolRegistry>,
    pub memory: Arc<dyn MemoryGateway>,
    pub session_rate_limiter: Arc<SessionRateLimiter>,

    // ── Security (startup-computed) ───────────────────────────────────
    /// SHA-256 hash of the admin bearer token. `None` disables admin auth
    /// (dev mode) — see `api::auth::require_admin_token`.
    pub admin_token_hash: Option<Vec<u8>>,
    /// Secret backing `X-CSRF-Token` issuance/verification on write
    /// endpoints. `None` disables CSRF enforcement (dev mode).
    pub csrf_secret: Option<Vec<u8>>,
}
