//! HTTP surface (§6): turn endpoints, session CRUD, cross-session memory
//! query, slash-command listing, health, and an admin-gated sliver for
//! hard deletes and routing diagnostics.

pub mod admin;
pub mod auth;
pub mod chat;
pub mod error;
pub mod health;
pub mod memory;
pub mod router;
pub mod sessions;

use std::sync::Arc;

use axum::routing::{delete, get, patch, post};
use axum::{middleware, Router as AxumRouter};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> AxumRouter {
    let writes = AxumRouter::new()
        .route("/api/chats", post(sessions::create_chat))
        .route("/api/chats/:id/messages", post(sessions::append_message))
        .route("/api/chats/:id", delete(sessions::delete_chat))
        .route("/api/chats/:id/read", patch(sessions::mark_read))
        .route("/api/chats/:id/settings", post(sessions::update_settings))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_csrf_token,
        ));

    let reads = AxumRouter::new()
        .route("/api/chats", get(sessions::list_chats))
        .route("/api/chats/:id/messages", get(sessions::list_messages))
        .route("/api/chats/:id/settings", get(sessions::get_settings))
        .route("/api/chat", post(chat::chat))
        .route("/api/chat/stream", post(chat::chat_stream))
        .route("/api/memory/cross-session", post(memory::cross_session_query))
        .route("/api/slash-commands", get(router::slash_commands))
        .route("/health", get(health::health));

    let admin = AxumRouter::new()
        .route("/api/admin/chats/:id", delete(admin::hard_delete_chat))
        .route("/api/router/decisions", get(router::decisions))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin_token,
        ));

    reads
        .merge(writes)
        .merge(admin)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
