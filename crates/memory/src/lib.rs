//! Client for the external memory/vector store consulted during context
//! assembly.
//!
//! The store itself — its ranking, embedding, and retention policy — is a
//! narrow collaborator out of scope for this crate. What lives here is the
//! gateway boundary the rest of the system calls through: bounded by a hard
//! wall-clock budget per call, and designed so a slow or unreachable store
//! degrades a turn's context rather than failing it.
//!
//! - [`types`] — wire DTOs for the store's REST API.
//! - [`provider`] — the narrow `MemoryBackend` transport trait.
//! - [`backend`] — the HTTP implementation of that trait.
//! - [`gateway`] — `MemoryGateway`, the timeout/degraded-status wrapper
//!   callers actually use, plus [`gateway::create_gateway`].
//!
//! # Quick start
//!
//! ```rust,no_run
//! use sa_domain::config::MemoryConfig;
//! use sa_memory::create_gateway;
//!
//! # async fn example() -> sa_domain::error::Result<()> {
//! let cfg = MemoryConfig::default();
//! let gateway = create_gateway(&cfg);
//! let (snippets, status) = gateway.query_relevant("session-1", "user-1", "favorite language", 5).await;
//! println!("{} snippets, status={:?}", snippets.len(), status);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod gateway;
pub mod provider;
pub mod types;

pub use backend::HttpMemoryBackend;
pub use gateway::{
    create_gateway, HttpMemoryGateway, MemoryGateway, MemoryStatus, NullMemoryGateway, Snippet,
    TurnMessage,
};
pub use provider::MemoryBackend;
pub use types::{
    DeleteSessionRequest, IngestResponse, MemoryIngestRequest, RagSearchRequest,
    RagSearchResponse, RetrievedMemoryDto,
};
