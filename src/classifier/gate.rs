//! The usefulness gate in front of the memory store.
//!
//! Two failure policies meet here and they point in opposite directions:
//! an unreachable backend stores the text anyway (fail-open), while a
//! reachable backend that answers without a clear `USEFUL` discards it
//! (fail-closed).

use std::sync::Arc;

use super::parse::parse_response;
use super::prompt::{build_messages, PromptStyle};
use super::types::{ClassificationDecision, ClassificationRequest};
use crate::backend::{CompletionRequest, TextBackend};
use crate::config::ClassifierConfig;

/// Reason attached to fail-open decisions.
pub const CLASSIFIER_ERROR_REASON: &str = "classifier_error";

/// Read-only settings for [`ClassificationGate`].
#[derive(Debug, Clone)]
pub struct GateConfig {
    pub prompt: PromptStyle,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Characters of request text sent to the backend.
    pub input_char_cap: usize,
    /// Characters kept when the original text stands in for an extraction.
    pub fallback_char_cap: usize,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            prompt: PromptStyle::Reason,
            max_tokens: 128,
            temperature: 0.1,
            input_char_cap: 2000,
            fallback_char_cap: 500,
        }
    }
}

impl GateConfig {
    pub fn from_classifier_config(config: &ClassifierConfig) -> Self {
        Self {
            prompt: PromptStyle::from_config_str(&config.prompt).unwrap_or(PromptStyle::Reason),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            input_char_cap: config.input_char_cap,
            fallback_char_cap: config.fallback_char_cap,
        }
    }
}

#[derive(Clone)]
pub struct ClassificationGate {
    backend: Arc<dyn TextBackend>,
    config: GateConfig,
}

impl ClassificationGate {
    pub fn new(backend: Arc<dyn TextBackend>, config: GateConfig) -> Self {
        Self { backend, config }
    }

    pub fn backend(&self) -> &dyn TextBackend {
        self.backend.as_ref()
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Decide whether `request` is worth storing.
    ///
    /// Issues at most one backend call and never returns an error: backend
    /// failures become a useful decision carrying the truncated input.
    pub async fn classify(&self, request: &ClassificationRequest) -> ClassificationDecision {
        let joined = request.text();
        let text = joined.trim();
        if text.is_empty() {
            return ClassificationDecision::discard("");
        }

        let completion = CompletionRequest {
            messages: build_messages(
                self.config.prompt,
                truncate_chars(text, self.config.input_char_cap),
            ),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let response = match self.backend.complete(&completion).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(
                    backend = self.backend.name(),
                    error = %e,
                    "classification failed, storing anyway"
                );
                return ClassificationDecision::useful(
                    CLASSIFIER_ERROR_REASON,
                    self.fallback_text(text),
                );
            }
        };

        let parsed = parse_response(&response);
        tracing::debug!(useful = parsed.useful, reason = %parsed.reason, "classified");

        if !parsed.useful {
            return ClassificationDecision::discard(parsed.reason);
        }

        let extracted = parsed.memory.unwrap_or_else(|| self.fallback_text(text));
        ClassificationDecision::useful(parsed.reason, extracted)
    }

    fn fallback_text(&self, text: &str) -> String {
        truncate_chars(text, self.config.fallback_char_cap).to_string()
    }
}

/// The first `max_chars` characters of `text`, never splitting a character.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
