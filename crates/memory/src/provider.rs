//! Low-level transport trait for the external memory/vector store.
//!
//! This is the narrow collaborator interface from spec.md §1 — the store's
//! own ranking/embedding/graph implementation is out of scope. Implementors
//! only need `search` and `ingest`; everything else (timeouts, degraded
//! status, session-scoped deletes) is layered on top by [`crate::gateway`].

use async_trait::async_trait;
use sa_domain::error::Result;

use crate::types::{IngestResponse, MemoryIngestRequest, RagSearchRequest, RagSearchResponse};

#[async_trait]
pub trait MemoryBackend: Send + Sync {
    async fn search(&self, req: RagSearchRequest) -> Result<RagSearchResponse>;
    async fn ingest(&self, req: MemoryIngestRequest) -> Result<IngestResponse>;
    async fn delete_session(&self, user_id: &str, session_id: &str) -> Result<()>;
}
