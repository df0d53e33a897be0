//! Chat API endpoints — the primary interface for running agent turns.
//!
//! - `POST /api/chat`        — non-streaming: drains a turn and returns the
//!   final assistant message plus metadata.
//! - `POST /api/chat/stream` — SSE streaming: frames each `TurnEvent` as it
//!   is produced.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json};
use futures_util::stream::Stream;
use serde::Deserialize;
use serde_json::json;

use crate::api::error::ApiError;
use crate::runtime::{start_turn, TurnEvent, TurnInput};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// Existing session id. Omit to start a new session.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Caller-supplied user identity, required for cross-session memory
    /// lookups to run at all (§4.5/§9 leak-prevention rule).
    #[serde(default)]
    pub user_id: Option<String>,
    pub message: String,
    /// A slash command already parsed out of a structured field, bypassing
    /// `Router::parse_slash` on `message`.
    #[serde(default)]
    pub slash_command: Option<String>,
}

fn turn_input(body: ChatRequest) -> TurnInput {
    TurnInput {
        session_id: body.session_id,
        user_id: body.user_id,
        user_text: body.message,
        explicit_slash_command: body.slash_command,
    }
}

/// `POST /api/chat` — non-streaming turn.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut handle = start_turn(state, turn_input(body)).await?;

    let mut content = String::new();
    let mut metadata = json!({});
    let mut error: Option<(String, &'static str)> = None;

    while let Some(event) = handle.rx.recv().await {
        match event {
            TurnEvent::End { content: c, metadata: m } => {
                content = c;
                metadata = m;
            }
            TurnEvent::Error { message, kind } => error = Some((message, kind)),
            _ => {}
        }
    }

    if let Some((message, kind)) = error {
        return Ok((
            StatusCode::BAD_GATEWAY,
            Json(json!({
                "sessionId": handle.session_id,
                "error": message,
                "kind": kind,
            })),
        )
            .into_response());
    }

    Ok(Json(json!({
        "sessionId": handle.session_id,
        "content": content,
        "metadata": metadata,
    }))
    .into_response())
}

/// `POST /api/chat/stream` — SSE turn.
pub async fn chat_stream(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let handle = start_turn(state, turn_input(body)).await?;
    let stream = make_sse_stream(handle);
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn make_sse_stream(
    mut handle: crate::runtime::TurnHandle,
) -> impl Stream<Item = Result<Event, std::convert::Infallible>> {
    async_stream::stream! {
        while let Some(event) = handle.rx.recv().await {
            let event_type = event.sse_event_name();
            let data = serde_json::to_string(&event).unwrap_or_default();
            yield Ok(Event::default().event(event_type).data(data));
            if event.is_terminal() {
                break;
            }
        }
    }
}
