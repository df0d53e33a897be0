//! Durable storage for sessions, messages, and tool executions (§4.1).
//!
//! `PersistentStore` is the single source of truth for ordering and counter
//! invariants — `message_count` and `last_activity_at` are maintained by
//! store-level triggers, never computed by callers.

pub mod error;
pub mod model;
pub mod store;

pub use model::{
    ListSessionsQuery, Message, MessageSearchHit, MessageType, NewToolExecution,
    ReadMessagesQuery, Session, SessionPatch, SessionStatus, SortOrder, ToolExecution,
    ToolExecutionPatch, ToolExecutionStatus,
};
pub use store::PersistentStore;
