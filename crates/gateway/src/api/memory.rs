//! `POST /api/memory/cross-session` — a ranked cross-session memory query
//! (§6), backed by the same scan [`ContextAssembler`] runs at turn time.

use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;

use crate::api::error::ApiError;
use crate::state::AppState;

fn d_limit() -> usize {
    10
}

#[derive(Debug, Deserialize)]
pub struct CrossSessionQueryBody {
    pub session_id: String,
    pub user_id: String,
    #[serde(default = "d_limit")]
    pub limit: usize,
}

pub async fn cross_session_query(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CrossSessionQueryBody>,
) -> Result<impl IntoResponse, ApiError> {
    let messages = state
        .context
        .query_cross_session(&body.session_id, &body.user_id, body.limit)
        .await?;

    let snippets: Vec<_> = messages
        .iter()
        .map(|m| json!({ "content": m.content.extract_all_text() }))
        .collect();

    Ok(Json(json!({ "snippets": snippets, "count": snippets.len() })))
}
