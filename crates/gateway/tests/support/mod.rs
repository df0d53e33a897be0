//! Shared scaffolding for the gateway's end-to-end turn scenarios (§8).
//!
//! Builds an [`AppState`] the way [`sa_gateway::bootstrap::build_state`]
//! does, except the store is an in-memory SQLite pool and the default LLM
//! provider is a [`sa_providers::testing::MockProvider`] inserted directly
//! into the registry — `ProviderRegistry::insert` exists precisely for
//! this (see its doc comment).

use std::collections::HashMap;
use std::sync::Arc;

use sa_domain::config::Config;
use sa_gateway::runtime::agent::Agent;
use sa_gateway::runtime::cancel::CancelMap;
use sa_gateway::runtime::context::ContextAssembler;
use sa_gateway::runtime::quota::QuotaTracker;
use sa_gateway::runtime::router::Router;
use sa_gateway::runtime::session_rate_limit::SessionRateLimiter;
use sa_gateway::runtime::TurnEvent;
use sa_gateway::state::AppState;
use sa_memory::create_gateway;
use sa_providers::registry::ProviderRegistry;
use sa_providers::LlmProvider;
use sa_sessions::SessionRegistry;
use sa_store::PersistentStore;
use sa_tools::{register_all, ToolRegistry};

/// Build an `AppState` wired against an in-memory store with the given
/// provider standing in for every configured LLM call.
pub async fn test_state(provider: Arc<dyn LlmProvider>) -> Arc<AppState> {
    let mut config = Config::default();
    config.store.sqlite_path = ":memory:".into();
    config.store.max_connections = 1;
    config.llm.providers.clear();

    let store = Arc::new(PersistentStore::connect(&config.store).await.unwrap());
    store.migrate().await.unwrap();

    let mut providers = ProviderRegistry::from_config(&config.llm).unwrap();
    providers.insert(provider);
    let providers = Arc::new(providers);

    let memory = create_gateway(&config.memory);

    let mut tools = ToolRegistry::new();
    register_all(&mut tools, memory.clone());
    let tools = Arc::new(tools);

    let agents: HashMap<String, Agent> = config
        .agents
        .agents
        .values()
        .map(|cfg| (cfg.id.clone(), Agent::from_config(cfg)))
        .collect();

    let sessions = Arc::new(SessionRegistry::new(store.clone()));
    let cancels = Arc::new(CancelMap::new());
    let quota = Arc::new(QuotaTracker::new(config.quota.clone()));
    let router = Arc::new(Router::new(config.router.clone(), config.agents.clone()));
    let context = Arc::new(ContextAssembler::new(store.clone(), memory.clone(), config.context.clone()));
    let session_rate_limiter = Arc::new(SessionRateLimiter::from_config(config.server.rate_limit.as_ref()));

    Arc::new(AppState {
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
        admin_token_hash: None,
        csrf_secret: None,
    })
}

/// Drain a turn's event channel to completion, returning every event in
/// arrival order.
pub async fn drain(mut rx: tokio::sync::mpsc::Receiver<TurnEvent>) -> Vec<TurnEvent> {
    let mut events = Vec::new();
    while let Some(e) = rx.recv().await {
        events.push(e);
    }
    events
}
