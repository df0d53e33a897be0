//! REST implementation of [`MemoryBackend`] against the external
//! memory/vector store's HTTP API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use sa_domain::config::MemoryConfig;
use sa_domain::error::{Error, Result};

use crate::provider::MemoryBackend;
use crate::types::{IngestResponse, MemoryIngestRequest, RagSearchRequest, RagSearchResponse};

/// Talks to the configured memory store over HTTP. Created once and reused
/// for the process lifetime — the underlying `reqwest::Client` keeps a
/// connection pool.
#[derive(Debug, Clone)]
pub struct HttpMemoryBackend {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpMemoryBackend {
    pub fn new(cfg: &MemoryConfig) -> Result<Self> {
        let base_url = cfg
            .base_url
            .clone()
            .ok_or_else(|| Error::Config("memory.base_url is not set".into()))?;
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Config(format!("building memory http client: {e}")))?;
        Ok(Self {
            http,
            base_url,
            api_key: cfg.api_key.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn authed(&self, rb: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(k) if !k.is_empty() => rb.bearer_auth(k),
            _ => rb,
        }
    }
}

#[async_trait]
impl MemoryBackend for HttpMemoryBackend {
    async fn search(&self, req: RagSearchRequest) -> Result<RagSearchResponse> {
        let resp = self
            .authed(self.http.post(self.url("/api/rag/search")))
            .json(&req)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(Error::Http(format!(
                "memory search returned {}",
                resp.status()
            )));
        }
        resp.json::<RagSearchResponse>()
            .await
            .map_err(|e| Error::Http(format!("decoding memory search response: {e}")))
    }

    async fn ingest(&self, req: MemoryIngestRequest) -> Result<IngestResponse> {
        let resp = self
            .authed(self.http.post(self.url("/api/memories")))
            .json(&req)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(Error::Http(format!(
                "memory ingest returned {}",
                resp.status()
            )));
        }
        resp.json::<IngestResponse>()
            .await
            .map_err(|e| Error::Http(format!("decoding memory ingest response: {e}")))
    }

    async fn delete_session(&self, user_id: &str, session_id: &str) -> Result<()> {
        let resp = self
            .authed(
                self.http
                    .delete(self.url(&format!("/api/sessions/{session_id}")))
                    .query(&[("userId", user_id)]),
            )
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        if !resp.status().is_success() && resp.status().as_u16() != 404 {
            return Err(Error::Http(format!(
                "memory delete_session returned {}",
                resp.status()
            )));
        }
        Ok(())
    }
}
