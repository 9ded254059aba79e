//! OpenAI-compatible chat-completion client.
//!
//! One implementation for every [`BackendProfile`]; the profile decides which
//! optional fields go on the wire and whether a bearer token is attached.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::profile::{normalize_base_url, BackendProfile};
use super::{ChatMessage, CompletionRequest, TextBackend};
use crate::config::BackendConfig;
use crate::error::BackendError;

/// Longest error body kept in a [`BackendError::Status`].
const MAX_ERROR_BODY: usize = 300;

#[derive(Debug, Serialize)]
struct ChatRequestBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseBody {
    choices: Vec<ResponseChoice>,
}

#[derive(Debug, Deserialize)]
struct ResponseChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

/// Outcome of a backend liveness check.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub profile: BackendProfile,
    pub url: String,
    /// Model ids when the probe route lists them (`/models`), else empty.
    pub models: Vec<String>,
}

pub struct OpenAiCompatBackend {
    profile: BackendProfile,
    base_url: String,
    model: String,
    api_key: Option<String>,
    timeout_secs: u64,
    http: Client,
}

impl OpenAiCompatBackend {
    pub fn new(
        profile: BackendProfile,
        base_url: &str,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let api_key = api_key.filter(|k| !k.is_empty());
        if profile.requires_api_key() && api_key.is_none() {
            return Err(BackendError::Config(format!(
                "{} requires an api_key",
                profile.display_name()
            )));
        }

        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .build()
            .map_err(|e| BackendError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            profile,
            base_url: normalize_base_url(base_url),
            model: model.into(),
            api_key,
            timeout_secs: timeout.as_secs(),
            http,
        })
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        let profile = BackendProfile::from_config_str(&config.profile).ok_or_else(|| {
            BackendError::Config(format!(
                "unknown backend profile: {}. Supported: llama_cpp, ollama, lm_studio, cerebras",
                config.profile
            ))
        })?;
        Self::new(
            profile,
            &config.base_url,
            config.model.clone(),
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn profile(&self) -> BackendProfile {
        self.profile
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn build_body<'a>(
        &'a self,
        request: &'a CompletionRequest,
        response_format: Option<serde_json::Value>,
    ) -> ChatRequestBody<'a> {
        ChatRequestBody {
            model: &self.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream: self.profile.sends_stream_flag().then_some(false),
            response_format: response_format.filter(|_| self.profile.supports_response_format()),
        }
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("Authorization", format!("Bearer {key}")),
            None => builder,
        }
    }

    /// Send a completion, optionally asking for a structured response format.
    /// The format is silently dropped for profiles that reject it.
    async fn send_completion(
        &self,
        request: &CompletionRequest,
        response_format: Option<serde_json::Value>,
    ) -> Result<String, BackendError> {
        let body = self.build_body(request, response_format);
        let started = std::time::Instant::now();

        let response = self
            .authorize(self.http.post(self.chat_url()))
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::from_reqwest(e, self.timeout_secs))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| BackendError::from_reqwest(e, self.timeout_secs))?;

        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                body: text.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        let content = parse_completion(&text)?;
        tracing::debug!(
            backend = self.profile.as_str(),
            model = %self.model,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "completion received"
        );
        Ok(content)
    }

    /// Check that the backend is reachable.
    pub async fn probe(&self) -> Result<ProbeReport, BackendError> {
        let url = self.profile.probe_url(&self.base_url);
        let response = self
            .authorize(self.http.get(&url))
            .send()
            .await
            .map_err(|e| BackendError::from_reqwest(e, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                body: String::new(),
            });
        }

        let models = response
            .text()
            .await
            .ok()
            .and_then(|t| serde_json::from_str::<ModelList>(&t).ok())
            .map(|list| list.data.into_iter().map(|m| m.id).collect())
            .unwrap_or_default();

        Ok(ProbeReport {
            profile: self.profile,
            url,
            models,
        })
    }
}

#[async_trait]
impl TextBackend for OpenAiCompatBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, BackendError> {
        self.send_completion(request, None).await
    }

    fn name(&self) -> &str {
        self.profile.as_str()
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Extract the first choice's message content from a response body.
fn parse_completion(body: &str) -> Result<String, BackendError> {
    let parsed: ChatResponseBody = serde_json::from_str(body)
        .map_err(|e| BackendError::Schema(format!("invalid chat response: {e}")))?;
    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| BackendError::Schema("response contained no choices".into()))?;
    Ok(choice.message.content.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CompletionRequest {
        CompletionRequest {
            messages: vec![ChatMessage::system("sys"), ChatMessage::user("hi")],
            max_tokens: 64,
            temperature: 0.1,
        }
    }

    fn backend(profile: BackendProfile, key: Option<&str>) -> OpenAiCompatBackend {
        OpenAiCompatBackend::new(
            profile,
            "http://localhost:1234/v1/",
            "local-model",
            key.map(String::from),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn lm_studio_body_drops_response_format() {
        let b = backend(BackendProfile::LmStudio, None);
        let req = request();
        let body = b.build_body(&req, Some(serde_json::json!({"type": "json_object"})));
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("response_format").is_none());
        assert_eq!(json["stream"], false);
        assert_eq!(json["max_tokens"], 64);
        assert_eq!(json["messages"][1]["content"], "hi");
    }

    #[test]
    fn llama_cpp_body_keeps_response_format() {
        let b = backend(BackendProfile::LlamaCpp, None);
        let req = request();
        let body = b.build_body(&req, Some(serde_json::json!({"type": "json_object"})));
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["response_format"]["type"], "json_object");
    }

    #[test]
    fn cerebras_body_omits_stream_flag() {
        let b = backend(BackendProfile::Cerebras, Some("csk-123"));
        let req = request();
        let json = serde_json::to_value(b.build_body(&req, None)).unwrap();
        assert!(json.get("stream").is_none());
    }

    #[test]
    fn cerebras_without_key_is_config_error() {
        let result = OpenAiCompatBackend::new(
            BackendProfile::Cerebras,
            "https://api.cerebras.ai/v1",
            "llama3.1-70b",
            Some(String::new()),
            Duration::from_secs(5),
        );
        assert!(matches!(result, Err(BackendError::Config(_))));
    }

    #[test]
    fn from_config_normalizes_full_endpoint_url() {
        let config = BackendConfig {
            profile: "llama_cpp".into(),
            base_url: "http://localhost:8080/v1/chat/completions".into(),
            model: "lfm2-classifier".into(),
            api_key: None,
            timeout_secs: 30,
        };
        let b = OpenAiCompatBackend::from_config(&config).unwrap();
        assert_eq!(b.base_url(), "http://localhost:8080/v1");
        assert_eq!(b.chat_url(), "http://localhost:8080/v1/chat/completions");
        assert_eq!(b.name(), "llama_cpp");
        assert_eq!(b.model(), "lfm2-classifier");
    }

    #[test]
    fn parse_completion_extracts_first_choice() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"DECISION: USEFUL"}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "DECISION: USEFUL");
    }

    #[test]
    fn parse_completion_rejects_empty_choices_and_garbage() {
        assert!(matches!(
            parse_completion(r#"{"choices":[]}"#),
            Err(BackendError::Schema(_))
        ));
        assert!(matches!(
            parse_completion("<html>oops</html>"),
            Err(BackendError::Schema(_))
        ));
    }

    #[test]
    fn parse_completion_null_content_is_empty() {
        let body = r#"{"choices":[{"message":{"content":null}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "");
    }
}
