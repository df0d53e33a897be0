//! Wire types for the external memory/vector store's RAG API.
//!
//! The store itself is a collaborator, out of scope per spec.md §1 — these
//! types model only the narrow "add / query" surface the gateway calls
//! through.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// POST /api/rag/search — request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RagSearchRequest {
    pub user_id: String,
    pub session_id: String,
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

/// POST /api/rag/search — response body.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RagSearchResponse {
    #[serde(default)]
    pub memories: Vec<RetrievedMemoryDto>,
}

/// A single retrieved memory record, ranked by relevance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedMemoryDto {
    #[serde(default)]
    pub id: Option<String>,
    pub content: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

/// POST /api/memories — request body. Used by `MemoryGateway::add_turn` to
/// write the user/assistant message pair into long-term memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryIngestRequest {
    pub user_id: String,
    pub session_id: String,
    pub role: String,
    pub content: String,
}

/// POST /api/memories — response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub memory_id: String,
}

/// DELETE /api/sessions/{id} — removes everything the store holds for one
/// session, scoped by user (§9: cross-session leak risk — the store itself
/// must reject a mismatched userId; the gateway always sends both).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSessionRequest {
    pub user_id: String,
    pub session_id: String,
}
