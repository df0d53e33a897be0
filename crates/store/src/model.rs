use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle status of a [`Session`]. `deleted` is a soft-delete terminal
/// state — rows stay in the table until an explicit hard delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Inactive,
    Archived,
    Deleted,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Inactive => "inactive",
            SessionStatus::Archived => "archived",
            SessionStatus::Deleted => "deleted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            "archived" => Some(Self::Archived),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Opaque 32-char hex identifier.
    pub id: String,
    pub user_id: Option<String>,
    pub title: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub message_count: i64,
    pub unread_count: i64,
    pub metadata: HashMap<String, Value>,
}

/// Partial update applied by `updateSession`. `None` fields are left
/// untouched; `metadata` is shallow-merged into the existing map rather
/// than replacing it.
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub title: Option<String>,
    pub status: Option<SessionStatus>,
    pub metadata: Option<HashMap<String, Value>>,
    pub unread_count: Option<i64>,
    pub touch_activity: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    User,
    Assistant,
    System,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::User => "user",
            MessageType::Assistant => "assistant",
            MessageType::System => "system",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Monotonic per-store id (sqlite rowid). Strictly increasing across
    /// successful `appendMessage` calls observed in program order.
    pub id: i64,
    pub session_id: String,
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub metadata: HashMap<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Default)]
pub struct ReadMessagesQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub order: Option<SortOrder>,
}

#[derive(Debug, Clone, Default)]
pub struct ListSessionsQuery {
    pub status: Option<SessionStatus>,
    pub user_id: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<SortOrder>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolExecutionStatus {
    Pending,
    Success,
    Error,
}

impl ToolExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolExecutionStatus::Pending => "pending",
            ToolExecutionStatus::Success => "success",
            ToolExecutionStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "success" => Some(Self::Success),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// A row to insert via `logToolExecution`. Always created in `Pending`
/// status; `updateToolExecution` performs the single terminal transition.
#[derive(Debug, Clone)]
pub struct NewToolExecution {
    pub session_id: String,
    pub message_id: Option<i64>,
    pub tool_name: String,
    pub tool_input: Value,
    pub metadata: HashMap<String, Value>,
}

#[derive(Debug, Clone)]
pub struct ToolExecutionPatch {
    pub status: ToolExecutionStatus,
    pub tool_output: Option<Value>,
    pub error_message: Option<String>,
    pub duration_ms: Option<i64>,
    pub message_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExecution {
    pub id: i64,
    pub session_id: String,
    pub message_id: Option<i64>,
    pub tool_name: String,
    pub tool_input: Value,
    pub tool_output: Option<Value>,
    pub status: ToolExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub error_message: Option<String>,
    pub metadata: HashMap<String, Value>,
}

/// Result row for `searchMessages`: a `Message` plus its owning session id
/// (already present on `Message`, kept as a distinct type so callers don't
/// confuse a search hit with an ordinary read).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageSearchHit {
    pub message: Message,
}
