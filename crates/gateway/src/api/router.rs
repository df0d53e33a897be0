//! - `GET /api/slash-commands`   — list the closed agent set as slash commands
//! - `GET /api/router/decisions` — last N routing decisions (admin-only, **[ADDED]**)

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;

use crate::state::AppState;

pub async fn slash_commands(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut commands: Vec<_> = state
        .agents
        .values()
        .map(|agent| {
            json!({
                "command": format!("/{}", agent.id),
                "agent": agent.id,
                "isAgency": agent.is_agency(),
            })
        })
        .collect();
    commands.sort_by(|a, b| a["command"].as_str().cmp(&b["command"].as_str()));

    Json(json!({ "commands": commands }))
}

#[derive(Debug, Deserialize)]
pub struct DecisionsQuery {
    #[serde(default = "d_limit")]
    pub limit: usize,
}

fn d_limit() -> usize {
    100
}

pub async fn decisions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DecisionsQuery>,
) -> impl IntoResponse {
    let items = state.router.decisions.recent(query.limit);
    Json(json!({ "decisions": items, "count": items.len() }))
}
