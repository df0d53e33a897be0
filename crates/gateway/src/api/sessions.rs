//! Session CRUD, message history, and per-session settings (§6).
//!
//! Backed directly by [`PersistentStore`] — `SessionRegistry` only owns
//! per-session concurrency and the inactivity timer, not listing/CRUD.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use sa_store::model::{ListSessionsQuery, MessageType, ReadMessagesQuery, SessionPatch, SessionStatus, SortOrder};

use crate::api::error::ApiError;
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /api/chats
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct CreateChatBody {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub initial_message: Option<String>,
}

pub async fn create_chat(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateChatBody>,
) -> Result<impl IntoResponse, ApiError> {
    let id = uuid::Uuid::new_v4().simple().to_string();
    let session = state
        .store
        .create_session(&id, body.user_id.as_deref(), body.title.as_deref())
        .await?;

    if let Some(text) = body.initial_message.filter(|t| !t.is_empty()) {
        state
            .store
            .append_message(&session.id, MessageType::User, &text, Default::default())
            .await?;
    }

    Ok(Json(json!({
        "sessionId": session.id,
        "title": session.title,
        "createdAt": session.created_at,
        "messageCount": session.message_count,
    })))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /api/chats
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct ListChatsParams {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

pub async fn list_chats(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListChatsParams>,
) -> Result<impl IntoResponse, ApiError> {
    let status = match params.status.as_deref() {
        Some(s) => Some(
            SessionStatus::parse(s)
                .ok_or_else(|| ApiError(sa_domain::error::Error::Validation(format!("unknown status {s:?}"))))?,
        ),
        None => None,
    };

    let sessions = state
        .store
        .list_sessions(ListSessionsQuery {
            status,
            user_id: params.user_id,
            limit: params.limit,
            offset: params.offset,
            ..Default::default()
        })
        .await?;

    Ok(Json(json!({ "sessions": sessions, "count": sessions.len() })))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /api/chats/{id}/messages
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct ListMessagesParams {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
    #[serde(default)]
    pub order: Option<String>,
}

pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<ListMessagesParams>,
) -> Result<impl IntoResponse, ApiError> {
    let order = match params.order.as_deref() {
        Some("asc") => Some(SortOrder::Asc),
        Some("desc") => Some(SortOrder::Desc),
        Some(other) => {
            return Err(ApiError(sa_domain::error::Error::Validation(format!(
                "unknown order {other:?}"
            ))))
        }
        None => None,
    };

    let messages = state
        .store
        .read_messages(
            &id,
            ReadMessagesQuery {
                limit: params.limit,
                offset: params.offset,
                order,
            },
        )
        .await?;

    Ok(Json(json!({ "messages": messages, "count": messages.len() })))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /api/chats/{id}/messages
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct AppendMessageBody {
    #[serde(rename = "type", default = "default_message_type")]
    pub kind: String,
    pub content: String,
    #[serde(default)]
    pub metadata: std::collections::HashMap<String, Value>,
}

fn default_message_type() -> String {
    "user".to_string()
}

pub async fn append_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<AppendMessageBody>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = MessageType::parse(&body.kind)
        .ok_or_else(|| ApiError(sa_domain::error::Error::Validation(format!("unknown message type {:?}", body.kind))))?;

    let message = state
        .store
        .append_message(&id, kind, &body.content, body.metadata)
        .await?;

    Ok(Json(json!({ "message": message })))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DELETE /api/chats/{id}  (soft delete)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn delete_chat(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.sessions.mark_deleted(&id).await?;
    Ok((StatusCode::NO_CONTENT, ()))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// PATCH /api/chats/{id}/read
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state
        .store
        .update_session(
            &id,
            SessionPatch {
                unread_count: Some(0),
                ..Default::default()
            },
        )
        .await?;
    Ok(Json(json!({ "sessionId": session.id, "unreadCount": session.unread_count })))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET/POST /api/chats/{id}/settings
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn get_settings(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state
        .store
        .get_session(&id)
        .await?
        .ok_or_else(|| ApiError(sa_domain::error::Error::NotFound(format!("session {id}"))))?;

    Ok(Json(settings_from_metadata(&session.metadata)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettingsBody {
    #[serde(default)]
    pub agent_lock: Option<bool>,
    #[serde(default)]
    pub agent_preference: Option<String>,
    #[serde(default)]
    pub cross_session_enabled: Option<bool>,
}

pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<UpdateSettingsBody>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state
        .store
        .get_session(&id)
        .await?
        .ok_or_else(|| ApiError(sa_domain::error::Error::NotFound(format!("session {id}"))))?;

    let mut metadata = session.metadata;
    if let Some(v) = body.agent_lock {
        metadata.insert("agentLock".to_string(), Value::Bool(v));
    }
    if let Some(v) = body.agent_preference {
        metadata.insert("agentPreference".to_string(), Value::String(v));
    }
    if let Some(v) = body.cross_session_enabled {
        metadata.insert("crossSessionEnabled".to_string(), Value::Bool(v));
    }

    let updated = state
        .store
        .update_session(
            &id,
            SessionPatch {
                metadata: Some(metadata),
                ..Default::default()
            },
        )
        .await?;

    Ok(Json(settings_from_metadata(&updated.metadata)))
}

fn settings_from_metadata(metadata: &std::collections::HashMap<String, Value>) -> Value {
    json!({
        "agentLock": metadata.get("agentLock").and_then(Value::as_bool).unwrap_or(false),
        "lastAgent": metadata.get("lastAgent").and_then(Value::as_str),
        "agentPreference": metadata.get("agentPreference").and_then(Value::as_str),
        "crossSessionEnabled": metadata.get("crossSessionEnabled").and_then(Value::as_bool).unwrap_or(true),
    })
}
