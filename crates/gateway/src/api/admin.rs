//! Admin-only endpoints, gated behind [`crate::api::auth::require_admin_token`]:
//! hard deletion (cascades via the store's foreign keys, §8 scenario 6) and
//! a routing-decisions diagnostic (see [`crate::api::router::decisions`]).

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::api::error::ApiError;
use crate::state::AppState;

/// `DELETE /api/admin/chats/{id}` — hard delete, cascading to `messages`
/// and `tool_executions` via the store's foreign keys. Irreversible, unlike
/// the soft `DELETE /api/chats/{id}`.
pub async fn hard_delete_chat(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.store.hard_delete_session(&id).await?;
    Ok((StatusCode::NO_CONTENT, ()))
}
