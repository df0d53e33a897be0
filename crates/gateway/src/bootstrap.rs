//! Turns a loaded [`Config`] into a ready-to-serve [`AppState`].
//!
//! Nothing here talks HTTP — `main.rs` owns the listener, the CORS layer,
//! and the per-IP `tower_governor` limiter. This module just wires the
//! domain: connect the store, run migrations, resolve the closed agent
//! set, and stand up the provider/memory/tool subsystems.

use std::collections::HashMap;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{info, warn};

use sa_domain::config::Config;
use sa_domain::error::Result;
use sa_memory::create_gateway;
use sa_providers::registry::ProviderRegistry;
use sa_sessions::SessionRegistry;
use sa_store::PersistentStore;
use sa_tools::{register_all, ToolRegistry};

use crate::runtime::agent::Agent;
use crate::runtime::cancel::CancelMap;
use crate::runtime::context::ContextAssembler;
use crate::runtime::quota::QuotaTracker;
use crate::runtime::router::Router;
use crate::runtime::session_rate_limit::SessionRateLimiter;
use crate::state::AppState;

/// Connects the store, migrates it, and assembles every subsystem into an
/// [`AppState`]. Tool executions left `pending` by a previous, uncleanly
/// terminated process are marked `error` before anything else touches the
/// database.
pub async fn build_state(config: Config) -> Result<AppState> {
    let store = Arc::new(PersistentStore::connect(&config.store).await?);
    if config.store.auto_migrate {
        store.migrate().await?;
    }
    let abandoned = store.abandon_stale_tool_executions().await?;
    if abandoned > 0 {
        warn!(count = abandoned, "abandoned stale pending tool executions from a prior run");
    }

    let providers = Arc::new(ProviderRegistry::from_config(&config.llm)?);
    if providers.is_empty() {
        for err in providers.init_errors() {
            warn!(provider = %err.provider_id, error = %err.error, "LLM provider failed to initialize");
        }
        if config.llm.startup_policy == sa_domain::config::LlmStartupPolicy::RequireOne {
            return Err(sa_domain::error::Error::Config(
                "llm.startup_policy = require_one but no provider initialized".into(),
            ));
        }
    }

    let memory = create_gateway(&config.memory);
    if !config.memory.is_configured() {
        info!("memory.base_url not set, cross-session memory snippets disabled (NullMemoryGateway)");
    }

    let mut tools = ToolRegistry::new();
    register_all(&mut tools, memory.clone());
    let tools = Arc::new(tools);

    let agents: HashMap<String, Agent> = config
        .agents
        .agents
        .values()
        .map(|cfg| (cfg.id.clone(), Agent::from_config(cfg)))
        .collect();
    if !agents.contains_key(&config.agents.default_agent) {
        return Err(sa_domain::error::Error::Config(format!(
            "agents.default_agent {:?} is not one of the configured agents",
            config.agents.default_agent
        )));
    }

    let sessions = Arc::new(SessionRegistry::new(store.clone()));
    let cancels = Arc::new(CancelMap::new());
    let quota = Arc::new(QuotaTracker::new(config.quota.clone()));
    let router = Arc::new(Router::new(config.router.clone(), config.agents.clone()));
    let context = Arc::new(ContextAssembler::new(
        store.clone(),
        memory.clone(),
        config.context.clone(),
    ));
    let session_rate_limiter = Arc::new(SessionRateLimiter::from_config(
        config.server.rate_limit.as_ref(),
    ));

    let admin_token_hash = read_secret_env(&config.admin.token_env).map(|t| sha256(&t));
    let csrf_secret = read_secret_env(&config.admin.csrf_secret_env).map(|s| sha256(&s));
    if admin_token_hash.is_none() {
        warn!(
            env = %config.admin.token_env,
            "admin token not set, admin endpoints are unauthenticated"
        );
    }

    Ok(AppState {
        config: Arc::new(config),
        store,
        sessions,
        cancels,
        quota,
        router,
        agents,
        context,
        providers,
        tools,
        memory,
        session_rate_limiter,
        admin_token_hash,
        csrf_secret,
    })
}

fn read_secret_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.is_empty())
}

fn sha256(input: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hasher.finalize().to_vec()
}
