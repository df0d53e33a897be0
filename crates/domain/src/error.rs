use serde::{Deserialize, Serialize};

/// Shared error type used across all SerialAgent crates.
///
/// Every error is classified into an [`ErrorKind`] before it crosses an
/// agent-FSM or HTTP boundary — see [`Error::kind`].
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("SerialMemory: {0}")]
    SerialMemory(String),

    #[error("config: {0}")]
    Config(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("validation: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("tool {tool}: {message}")]
    Tool { tool: String, message: String },

    #[error("storage: {0}")]
    Storage(String),

    #[error("degraded: {0}")]
    Degraded(String),

    #[error("cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

/// Classification surfaced to HTTP responses and SSE `error` events. Every
/// variant of [`Error`] maps onto exactly one of these; handlers branch on
/// `kind()` rather than matching the full `Error` enum so new internal
/// error variants never silently fall through to a 500.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    Validation,
    Auth,
    NotFound,
    RateLimited,
    Timeout,
    Tool,
    Upstream,
    Storage,
    Degraded,
    Cancelled,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::Auth(_) => ErrorKind::Auth,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::RateLimited(_) => ErrorKind::RateLimited,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::Tool { .. } => ErrorKind::Tool,
            Error::Provider { .. } | Error::Http(_) | Error::SerialMemory(_) => {
                ErrorKind::Upstream
            }
            Error::Storage(_) | Error::Io(_) => ErrorKind::Storage,
            Error::Degraded(_) => ErrorKind::Degraded,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Config(_) | Error::Json(_) | Error::Other(_) => ErrorKind::Validation,
        }
    }

    /// HTTP status code a handler should map `kind()` to. Centralized here
    /// so every surface (REST, SSE `error` events, admin endpoints) agrees.
    pub fn http_status(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation => 400,
            ErrorKind::Auth => 401,
            ErrorKind::NotFound => 404,
            ErrorKind::RateLimited => 429,
            ErrorKind::Timeout => 504,
            ErrorKind::Tool => 502,
            ErrorKind::Upstream => 502,
            ErrorKind::Storage => 500,
            ErrorKind::Degraded => 200,
            ErrorKind::Cancelled => 499,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
