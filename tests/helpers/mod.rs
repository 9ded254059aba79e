#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use memgate::api::{create_router, AppState, ServerInfo};
use memgate::backend::{CompletionRequest, TextBackend};
use memgate::classifier::{ClassificationGate, GateConfig};
use memgate::db::{self, EmbeddingMeta};
use memgate::embedding::{l2_normalize, EmbeddingProvider};
use memgate::error::BackendError;
use memgate::service::{MemoryService, ServiceSettings};
use rusqlite::Connection;

pub const TEST_DIMS: usize = 8;
pub const TEST_EMBED_MODEL: &str = "mock-embedder";

/// Backend that replays a fixed response (or error) and counts calls.
pub struct MockBackend {
    response: Result<String, String>,
    calls: AtomicUsize,
    last_request: Mutex<Option<CompletionRequest>>,
}

impl MockBackend {
    pub fn replying(response: &str) -> Arc<Self> {
        Arc::new(Self {
            response: Ok(response.to_string()),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        })
    }

    /// Every call fails with a transport error.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            response: Err("connection refused".into()),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Content of the user message in the most recent call.
    pub fn last_user_message(&self) -> Option<String> {
        self.last_request
            .lock()
            .unwrap()
            .as_ref()
            .and_then(|r| r.messages.iter().find(|m| m.role == "user"))
            .map(|m| m.content.clone())
    }
}

#[async_trait]
impl TextBackend for MockBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        match &self.response {
            Ok(text) => Ok(text.clone()),
            Err(e) => Err(BackendError::Transport(e.clone())),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }
}

/// Bag-of-words hashing embedder: same words give the same vector, shared
/// words give nearby vectors.
pub struct MockEmbedder;

impl MockEmbedder {
    pub fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; TEST_DIMS];
        for word in text.split_whitespace() {
            let word = word.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
            if word.is_empty() {
                continue;
            }
            v[fnv1a(&word) as usize % TEST_DIMS] += 1.0;
        }
        if v.iter().all(|x| *x == 0.0) {
            v[0] = 1.0;
        }
        l2_normalize(&v)
    }
}

fn fnv1a(s: &str) -> u64 {
    s.bytes().fold(0xcbf29ce484222325u64, |hash, b| {
        (hash ^ b as u64).wrapping_mul(0x100000001b3)
    })
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    fn dimensions(&self) -> usize {
        TEST_DIMS
    }

    fn model_name(&self) -> &str {
        TEST_EMBED_MODEL
    }
}

/// Embedder whose every call fails.
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        anyhow::bail!("embedding server unreachable")
    }

    fn dimensions(&self) -> usize {
        TEST_DIMS
    }

    fn model_name(&self) -> &str {
        TEST_EMBED_MODEL
    }
}

pub fn test_meta() -> EmbeddingMeta {
    EmbeddingMeta {
        model: TEST_EMBED_MODEL.into(),
        dimensions: TEST_DIMS,
    }
}

/// Open a fresh in-memory database with schema and migrations applied.
pub fn test_db() -> Connection {
    db::open_memory_database(&test_meta()).unwrap()
}

pub fn gate_with(backend: Arc<MockBackend>) -> ClassificationGate {
    ClassificationGate::new(backend, GateConfig::default())
}

pub fn test_settings() -> ServiceSettings {
    ServiceSettings {
        default_user: "default_user".into(),
        // Exact matches only, so unrelated test texts never fold together.
        dedup_threshold: 1.0,
        chat_max_tokens: 256,
        chat_temperature: 0.7,
    }
}

/// Service over an in-memory database and the mock embedder.
pub fn test_service(
    gate: Option<ClassificationGate>,
    chat: Option<Arc<dyn TextBackend>>,
) -> MemoryService {
    MemoryService::new(test_db(), Arc::new(MockEmbedder), gate, chat, test_settings())
}

pub fn test_info() -> ServerInfo {
    ServerInfo {
        classifier_profile: "lm_studio".into(),
        classifier_base_url: "http://localhost:1234/v1".into(),
        embedding_provider: "remote".into(),
        chat_profile: "cerebras".into(),
        allowed_origins: vec![
            "http://localhost:3000".into(),
            "chrome-extension://*".into(),
        ],
    }
}

pub fn test_router(service: MemoryService) -> axum::Router {
    create_router(AppState {
        service: Arc::new(service),
        info: Arc::new(test_info()),
    })
}
