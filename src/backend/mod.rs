//! Text-generation backends.
//!
//! Provides the [`TextBackend`] trait consumed by the classification gate and
//! the chat passthrough, plus [`OpenAiCompatBackend`], the one HTTP client that
//! serves every supported [`BackendProfile`].

pub mod openai_compat;
pub mod profile;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::BackendConfig;
use crate::error::BackendError;

pub use openai_compat::{OpenAiCompatBackend, ProbeReport};
pub use profile::BackendProfile;

/// One chat turn in OpenAI wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// A single non-streaming completion call.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Anything that can turn a list of chat messages into one text completion.
///
/// Implementations must be safe to share across concurrent requests and hold
/// no per-call mutable state.
#[async_trait]
pub trait TextBackend: Send + Sync {
    /// Run one completion and return the first choice's text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, BackendError>;

    /// Short identifier used in logs and `/health`.
    fn name(&self) -> &str;

    /// Model identifier sent with each request.
    fn model(&self) -> &str;
}

/// Create a backend from config.
pub fn create_backend(config: &BackendConfig) -> anyhow::Result<Arc<dyn TextBackend>> {
    let backend = OpenAiCompatBackend::from_config(config)?;
    Ok(Arc::new(backend))
}
