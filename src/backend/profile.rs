//! Capability profiles for OpenAI-compatible backends.
//!
//! Every backend memgate talks to speaks the same chat-completion schema, but
//! each one has quirks: some reject `response_format`, some need a bearer
//! token, some expose a health route instead of `/models`. A profile captures
//! those quirks so request building never has to special-case a URL.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendProfile {
    /// Local quantized model server (llama.cpp `llama-server`).
    LlamaCpp,
    /// Local model runner exposing an OpenAI-compatible `/v1`.
    Ollama,
    /// Desktop inference application API.
    LmStudio,
    /// Hosted inference API.
    Cerebras,
}

impl BackendProfile {
    /// Parse profile from config string value
    pub fn from_config_str(s: &str) -> Option<Self> {
        match s {
            "llama_cpp" => Some(Self::LlamaCpp),
            "ollama" => Some(Self::Ollama),
            "lm_studio" => Some(Self::LmStudio),
            "cerebras" => Some(Self::Cerebras),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LlamaCpp => "llama_cpp",
            Self::Ollama => "ollama",
            Self::LmStudio => "lm_studio",
            Self::Cerebras => "cerebras",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::LlamaCpp => "llama.cpp",
            Self::Ollama => "Ollama",
            Self::LmStudio => "LM Studio",
            Self::Cerebras => "Cerebras",
        }
    }

    /// Hosted APIs refuse unauthenticated calls.
    pub fn requires_api_key(&self) -> bool {
        matches!(self, Self::Cerebras)
    }

    /// LM Studio rejects `response_format: {"type": "json_object"}` outright.
    pub fn supports_response_format(&self) -> bool {
        !matches!(self, Self::LmStudio)
    }

    /// Whether to send an explicit `"stream": false`.
    pub fn sends_stream_flag(&self) -> bool {
        matches!(self, Self::LlamaCpp | Self::Ollama | Self::LmStudio)
    }

    /// URL used to check that the backend is up, given the normalized `/v1` base.
    pub fn probe_url(&self, base_url: &str) -> String {
        match self {
            Self::LlamaCpp => format!("{}/health", strip_v1(base_url)),
            Self::Ollama => format!("{}/api/tags", strip_v1(base_url)),
            Self::LmStudio | Self::Cerebras => format!("{base_url}/models"),
        }
    }
}

impl std::fmt::Display for BackendProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalize a configured base URL: strip trailing slashes and accept a full
/// `.../chat/completions` endpoint by trimming it back to the API root.
pub fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    let trimmed = trimmed.strip_suffix("/chat/completions").unwrap_or(trimmed);
    trimmed.trim_end_matches('/').to_string()
}

fn strip_v1(base_url: &str) -> &str {
    base_url.strip_suffix("/v1").unwrap_or(base_url)
}
