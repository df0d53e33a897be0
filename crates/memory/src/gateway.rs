//! [`MemoryGateway`] — the spec-level collaborator boundary (§4.4).
//!
//! Best-effort by design: every call has a hard wall-clock budget and never
//! fails the turn. Timeout or transport error degrades to an empty result
//! (for reads) or a no-op (for writes), with the reason surfaced to the
//! caller so it can be recorded in the assistant message's
//! `metadata.memory = {status: "degraded", reason}`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sa_domain::config::MemoryConfig;
use sa_domain::error::Result;

use crate::backend::HttpMemoryBackend;
use crate::provider::MemoryBackend;
use crate::types::{MemoryIngestRequest, RagSearchRequest};

/// One turn side (user or assistant message) to commit to long-term memory.
#[derive(Debug, Clone)]
pub struct TurnMessage {
    pub role: &'static str,
    pub content: String,
}

/// A ranked piece of prior text pulled into a turn's context bundle.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Snippet {
    pub content: String,
    pub source: Option<String>,
    pub score: Option<f64>,
}

/// Outcome of a best-effort memory call, surfaced in assistant metadata.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStatus {
    pub status: &'static str, // "ok" | "degraded" | "disabled"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl MemoryStatus {
    fn ok() -> Self {
        Self {
            status: "ok",
            reason: None,
        }
    }
    fn degraded(reason: impl Into<String>) -> Self {
        Self {
            status: "degraded",
            reason: Some(reason.into()),
        }
    }
    fn disabled() -> Self {
        Self {
            status: "disabled",
            reason: None,
        }
    }
}

#[async_trait]
pub trait MemoryGateway: Send + Sync {
    /// Best-effort write of the last user/assistant turn into long-term
    /// memory. Bounded by `memory.add_timeout_ms` (default 3s).
    async fn add_turn(
        &self,
        session_id: &str,
        user_id: &str,
        messages: &[TurnMessage],
    ) -> MemoryStatus;

    /// Ranked retrieval for a turn's context bundle. Bounded by
    /// `memory.query_timeout_ms` (default 1.5s). Returns `([], status)` on
    /// timeout/error — never fails the turn.
    async fn query_relevant(
        &self,
        session_id: &str,
        user_id: &str,
        query_text: &str,
        k: usize,
    ) -> (Vec<Snippet>, MemoryStatus);

    /// Best-effort delete on hard-delete of a session (§3 lifecycle).
    async fn delete_session(&self, session_id: &str, user_id: &str) -> MemoryStatus;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// HttpMemoryGateway
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct HttpMemoryGateway {
    backend: Arc<dyn MemoryBackend>,
    query_timeout: Duration,
    add_timeout: Duration,
}

impl HttpMemoryGateway {
    pub fn new(cfg: &MemoryConfig) -> Result<Self> {
        let backend = Arc::new(HttpMemoryBackend::new(cfg)?);
        Ok(Self {
            backend,
            query_timeout: Duration::from_millis(cfg.query_timeout_ms),
            add_timeout: Duration::from_millis(cfg.add_timeout_ms),
        })
    }
}

#[async_trait]
impl MemoryGateway for HttpMemoryGateway {
    async fn add_turn(
        &self,
        session_id: &str,
        user_id: &str,
        messages: &[TurnMessage],
    ) -> MemoryStatus {
        let fut = async {
            for m in messages {
                let req = MemoryIngestRequest {
                    user_id: user_id.to_string(),
                    session_id: session_id.to_string(),
                    role: m.role.to_string(),
                    content: m.content.clone(),
                };
                self.backend.ingest(req).await?;
            }
            Ok::<(), sa_domain::error::Error>(())
        };
        match tokio::time::timeout(self.add_timeout, fut).await {
            Ok(Ok(())) => MemoryStatus::ok(),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, session_id, "memory add_turn degraded");
                MemoryStatus::degraded(e.to_string())
            }
            Err(_) => {
                tracing::warn!(session_id, "memory add_turn timed out");
                MemoryStatus::degraded("timeout")
            }
        }
    }

    async fn query_relevant(
        &self,
        session_id: &str,
        user_id: &str,
        query_text: &str,
        k: usize,
    ) -> (Vec<Snippet>, MemoryStatus) {
        let req = RagSearchRequest {
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            query: query_text.to_string(),
            limit: Some(k as u32),
        };
        match tokio::time::timeout(self.query_timeout, self.backend.search(req)).await {
            Ok(Ok(resp)) => {
                let snippets = resp
                    .memories
                    .into_iter()
                    .take(k)
                    .map(|m| Snippet {
                        content: m.content,
                        source: m.source,
                        score: m.score,
                    })
                    .collect();
                (snippets, MemoryStatus::ok())
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, session_id, "memory query_relevant degraded");
                (Vec::new(), MemoryStatus::degraded(e.to_string()))
            }
            Err(_) => {
                tracing::warn!(session_id, "memory query_relevant timed out");
                (Vec::new(), MemoryStatus::degraded("timeout"))
            }
        }
    }

    async fn delete_session(&self, session_id: &str, user_id: &str) -> MemoryStatus {
        match self.backend.delete_session(user_id, session_id).await {
            Ok(()) => MemoryStatus::ok(),
            Err(e) => {
                tracing::warn!(error = %e, session_id, "memory delete_session degraded");
                MemoryStatus::degraded(e.to_string())
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// NullMemoryGateway
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Used when `memory.base_url` is unset. Always a no-op / empty result —
/// never "degraded", since there's nothing configured to fail.
pub struct NullMemoryGateway;

#[async_trait]
impl MemoryGateway for NullMemoryGateway {
    async fn add_turn(&self, _: &str, _: &str, _: &[TurnMessage]) -> MemoryStatus {
        MemoryStatus::disabled()
    }

    async fn query_relevant(
        &self,
        _: &str,
        _: &str,
        _: &str,
        _: usize,
    ) -> (Vec<Snippet>, MemoryStatus) {
        (Vec::new(), MemoryStatus::disabled())
    }

    async fn delete_session(&self, _: &str, _: &str) -> MemoryStatus {
        MemoryStatus::disabled()
    }
}

/// Build the right gateway implementation from config: `HttpMemoryGateway`
/// when `base_url` is set, `NullMemoryGateway` otherwise. Never fails
/// startup — memory is best-effort by design (§4.4).
pub fn create_gateway(cfg: &MemoryConfig) -> Arc<dyn MemoryGateway> {
    if cfg.is_configured() {
        match HttpMemoryGateway::new(cfg) {
            Ok(g) => return Arc::new(g),
            Err(e) => {
                tracing::warn!(error = %e, "failed to build memory gateway, falling back to null");
            }
        }
    }
    Arc::new(NullMemoryGateway)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_gateway_reports_disabled() {
        let gw = NullMemoryGateway;
        let (snips, status) = gw.query_relevant("s1", "u1", "hi", 5).await;
        assert!(snips.is_empty());
        assert_eq!(status.status, "disabled");
    }

    #[tokio::test]
    async fn create_gateway_falls_back_when_unconfigured() {
        let cfg = MemoryConfig::default();
        let gw = create_gateway(&cfg);
        let status = gw.add_turn("s1", "u1", &[]).await;
        assert_eq!(status.status, "disabled");
    }
}
