//! The SSE wire format a turn emits (§6): a strict typed event sequence —
//! `start`, then any interleaving of `token` / `status` / `tool_start` /
//! `tool_result`, then exactly one of `end` / `error` last.
//!
//! [`TurnEvent`] is the internal event the pipeline pushes down an
//! `mpsc::channel`; the HTTP layer either drains it into SSE frames
//! (`api::chat::chat_stream`) or collects it into one JSON body
//! (`api::chat::chat`).

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    Start {
        #[serde(rename = "sessionId")]
        session_id: String,
        agent: String,
    },
    Token {
        #[serde(rename = "content")]
        text: String,
    },
    Status {
        #[serde(rename = "message")]
        stage: String,
    },
    ToolStart {
        #[serde(rename = "toolId")]
        tool_call_id: String,
        #[serde(rename = "toolName")]
        tool_name: String,
    },
    ToolResult {
        #[serde(rename = "toolId")]
        tool_call_id: String,
        #[serde(rename = "toolName")]
        tool_name: String,
        success: bool,
        #[serde(rename = "result", skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(rename = "durationMs")]
        duration_ms: u64,
    },
    End {
        #[serde(rename = "message")]
        content: String,
        metadata: Value,
    },
    Error {
        message: String,
        #[serde(rename = "code")]
        kind: &'static str,
    },
}

impl TurnEvent {
    /// The SSE frame name axum's `Event::event(...)` should carry —
    /// matches the `type` tag but kept as its own method so the wire
    /// naming stays in one place even if the internal tag naming drifts.
    pub fn sse_event_name(&self) -> &'static str {
        match self {
            TurnEvent::Start { .. } => "start",
            TurnEvent::Token { .. } => "token",
            TurnEvent::Status { .. } => "status",
            TurnEvent::ToolStart { .. } => "tool_start",
            TurnEvent::ToolResult { .. } => "tool_result",
            TurnEvent::End { .. } => "end",
            TurnEvent::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnEvent::End { .. } | TurnEvent::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_events_are_end_or_error() {
        assert!(TurnEvent::End {
            content: String::new(),
            metadata: Value::Null
        }
        .is_terminal());
        assert!(TurnEvent::Error {
            message: "x".into(),
            kind: "upstream"
        }
        .is_terminal());
        assert!(!TurnEvent::Token { text: "x".into() }.is_terminal());
    }

    #[test]
    fn event_name_matches_tag() {
        assert_eq!(
            TurnEvent::ToolStart {
                tool_call_id: "1".into(),
                tool_name: "memory.search".into()
            }
            .sse_event_name(),
            "tool_start"
        );
    }

    #[test]
    fn wire_field_names_match_the_documented_event_format() {
        let start = serde_json::to_value(TurnEvent::Start {
            session_id: "s1".into(),
            agent: "analytical".into(),
        })
        .unwrap();
        assert_eq!(start["sessionId"], "s1");
        assert!(start.get("session_id").is_none());

        let token = serde_json::to_value(TurnEvent::Token { text: "hi".into() }).unwrap();
        assert_eq!(token["content"], "hi");

        let status = serde_json::to_value(TurnEvent::Status { stage: "intake".into() }).unwrap();
        assert_eq!(status["message"], "intake");

        let tool_result = serde_json::to_value(TurnEvent::ToolResult {
            tool_call_id: "call1".into(),
            tool_name: "contact_search".into(),
            success: true,
            data: Some(serde_json::json!({"found": true})),
            error: None,
            duration_ms: 42,
        })
        .unwrap();
        assert_eq!(tool_result["toolId"], "call1");
        assert_eq!(tool_result["toolName"], "contact_search");
        assert_eq!(tool_result["result"], serde_json::json!({"found": true}));
        assert_eq!(tool_result["durationMs"], 42);
        assert!(tool_result.get("data").is_none());

        let end = serde_json::to_value(TurnEvent::End {
            content: "done".into(),
            metadata: serde_json::json!({}),
        })
        .unwrap();
        assert_eq!(end["message"], "done");

        let error = serde_json::to_value(TurnEvent::Error {
            message: "boom".into(),
            kind: "upstream",
        })
        .unwrap();
        assert_eq!(error["code"], "upstream");
    }
}
