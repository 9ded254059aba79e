//! Error types for model backends and the memory service.

use thiserror::Error;

/// Everything that can go wrong talking to a model backend.
///
/// The classification gate treats every variant the same way (fail-open);
/// the distinction matters for logs and for the HTTP passthrough routes.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Connection refused, DNS failure, reset, etc.
    #[error("backend unreachable: {0}")]
    Transport(String),

    /// The request did not finish within the configured timeout
    #[error("backend timed out after {0}s")]
    Timeout(u64),

    /// Non-2xx status
    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Body was not the expected JSON shape
    #[error("unexpected backend response: {0}")]
    Schema(String),

    /// Backend cannot be built from the given settings
    #[error("backend misconfigured: {0}")]
    Config(String),
}

impl BackendError {
    /// Map a reqwest failure onto the taxonomy.
    pub fn from_reqwest(err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            BackendError::Timeout(timeout_secs)
        } else if err.is_decode() {
            BackendError::Schema(err.to_string())
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

/// Failures surfaced by [`MemoryService`](crate::service::MemoryService).
///
/// The HTTP layer maps each variant to a status code.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Caller sent something unusable
    #[error("validation error: {0}")]
    Validation(String),

    #[error("memory not found: {0}")]
    NotFound(String),

    /// The embedding provider failed
    #[error("embedding failed: {0:#}")]
    Embedding(anyhow::Error),

    /// The chat passthrough backend failed
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// A feature turned off in config was requested
    #[error("{0} is disabled")]
    Disabled(&'static str),

    /// Database or task failure
    #[error("storage error: {0:#}")]
    Storage(anyhow::Error),
}
