//! `GET /health` — liveness plus a cheap readiness summary. Never blocks on
//! an actual memory-store round trip; store connectivity is checked with a
//! trivial query, everything else reports what was already known at
//! startup or computed in-process.

use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Json};
use serde_json::json;

use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let store_ok = state.store.get_session("__health_check__").await.is_ok();

    Json(json!({
        "status": "ok",
        "store": if store_ok { "connected" } else { "unreachable" },
        "llmProviders": state.providers.len(),
        "sessions": state.sessions.session_count(),
    }))
}
