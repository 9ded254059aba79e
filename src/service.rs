//! The memory service: gate → embed → store.
//!
//! [`MemoryService`] is what the HTTP handlers and the CLI talk to. It owns the
//! database connection, the embedding provider, the optional classification
//! gate, and the optional chat passthrough backend, and counts how many
//! requests the gate let through.

use anyhow::Context;
use rusqlite::Connection;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::backend::{create_backend, ChatMessage, CompletionRequest, TextBackend};
use crate::classifier::{ClassificationGate, ClassificationRequest, GateConfig, Turn};
use crate::config::MemgateConfig;
use crate::db::EmbeddingMeta;
use crate::embedding::EmbeddingProvider;
use crate::error::ServiceError;
use crate::memory::search::MAX_KNN;
use crate::memory::{AddResult, MemoryRecord, NewMemory, SearchHit};

/// Running totals of gate outcomes since startup.
#[derive(Debug, Default)]
pub struct GateStats {
    stored: AtomicU64,
    discarded: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GateStatsSnapshot {
    pub stored: u64,
    pub discarded: u64,
}

impl GateStats {
    pub fn snapshot(&self) -> GateStatsSnapshot {
        GateStatsSnapshot {
            stored: self.stored.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}

/// Settings the service reads on every call.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub default_user: String,
    pub dedup_threshold: f64,
    pub chat_max_tokens: u32,
    pub chat_temperature: f32,
}

impl ServiceSettings {
    pub fn from_config(config: &MemgateConfig) -> Self {
        Self {
            default_user: config.storage.default_user.clone(),
            dedup_threshold: config.storage.dedup_threshold,
            chat_max_tokens: config.chat.max_tokens,
            chat_temperature: config.chat.temperature,
        }
    }
}

/// A "remember this" call.
#[derive(Debug, Clone, Default)]
pub struct RememberRequest {
    pub turns: Vec<Turn>,
    pub user_id: Option<String>,
    pub agent_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub enum RememberOutcome {
    /// Persisted (or folded into a near-duplicate). `reason` is the gate's
    /// reason when the gate ran.
    Stored {
        result: AddResult,
        reason: Option<String>,
    },
    /// Rejected by the gate; nothing was written.
    Discarded { id: String, reason: String },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
}

pub struct MemoryService {
    db: Arc<Mutex<Connection>>,
    embedder: Arc<dyn EmbeddingProvider>,
    gate: Option<ClassificationGate>,
    chat: Option<Arc<dyn TextBackend>>,
    settings: ServiceSettings,
    stats: GateStats,
}

impl MemoryService {
    pub fn new(
        conn: Connection,
        embedder: Arc<dyn EmbeddingProvider>,
        gate: Option<ClassificationGate>,
        chat: Option<Arc<dyn TextBackend>>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
            embedder,
            gate,
            chat,
            settings,
            stats: GateStats::default(),
        }
    }

    /// Build everything from config: open the database, create the embedding
    /// provider, and the gate and chat backends when enabled.
    pub fn from_config(config: &MemgateConfig) -> anyhow::Result<Self> {
        let embedder = crate::embedding::create_provider(&config.embedding)?;
        let meta = EmbeddingMeta {
            model: embedder.model_name().to_string(),
            dimensions: embedder.dimensions(),
        };
        let conn = crate::db::open_database(config.resolved_db_path(), &meta)?;

        let gate = if config.classifier.enabled {
            let backend = create_backend(&config.classifier.backend())
                .context("failed to create classifier backend")?;
            Some(ClassificationGate::new(
                backend,
                GateConfig::from_classifier_config(&config.classifier),
            ))
        } else {
            None
        };

        let chat = if config.chat.enabled {
            match create_backend(&config.chat.backend()) {
                Ok(backend) => Some(backend),
                Err(e) => {
                    tracing::warn!(error = %e, "chat passthrough disabled");
                    None
                }
            }
        } else {
            None
        };

        Ok(Self::new(
            conn,
            embedder,
            gate,
            chat,
            ServiceSettings::from_config(config),
        ))
    }

    pub fn gate(&self) -> Option<&ClassificationGate> {
        self.gate.as_ref()
    }

    pub fn embedder(&self) -> &dyn EmbeddingProvider {
        self.embedder.as_ref()
    }

    pub fn chat_backend(&self) -> Option<&dyn TextBackend> {
        self.chat.as_deref()
    }

    pub fn stats(&self) -> GateStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn default_user(&self) -> &str {
        &self.settings.default_user
    }

    fn user_or_default(&self, user_id: Option<&str>) -> String {
        user_id
            .filter(|u| !u.is_empty())
            .unwrap_or(self.settings.default_user.as_str())
            .to_string()
    }

    /// Run a DB closure on the blocking pool with the connection locked.
    async fn with_db<T, F>(&self, f: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&mut Connection) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            // A panicked writer leaves no open transaction behind (rusqlite
            // rolls back on drop), so the connection is still usable.
            let mut conn = db.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            f(&mut conn)
        })
        .await
        .map_err(|e| ServiceError::Storage(anyhow::anyhow!("db task failed: {e}")))?
        .map_err(ServiceError::Storage)
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        self.embedder.embed(text).await.map_err(ServiceError::Embedding)
    }

    /// Classify, then embed and store if the gate lets the text through.
    pub async fn remember(&self, request: RememberRequest) -> Result<RememberOutcome, ServiceError> {
        let metadata = match request.metadata {
            None | Some(serde_json::Value::Null) => serde_json::Map::new(),
            Some(serde_json::Value::Object(map)) => map,
            Some(_) => {
                return Err(ServiceError::Validation("metadata must be a JSON object".into()))
            }
        };
        let user_id = self.user_or_default(request.user_id.as_deref());
        let classification = ClassificationRequest::new(request.turns);

        let (content, reason) = match &self.gate {
            Some(gate) => {
                let decision = gate.classify(&classification).await;
                if !decision.useful {
                    self.stats.discarded.fetch_add(1, Ordering::Relaxed);
                    let id = format!("discarded_{}", &uuid::Uuid::new_v4().simple().to_string()[..8]);
                    tracing::info!(user_id = %user_id, reason = %decision.reason, "memory discarded");
                    return Ok(RememberOutcome::Discarded {
                        id,
                        reason: decision.reason,
                    });
                }
                (decision.extracted_text, Some(decision.reason))
            }
            None => {
                let text = classification.text();
                if text.trim().is_empty() {
                    return Err(ServiceError::Validation("no content to remember".into()));
                }
                (text, None)
            }
        };

        let mut metadata = metadata;
        if let Some(reason) = &reason {
            metadata.insert("classified".into(), serde_json::Value::Bool(true));
            metadata.insert("classifier_reason".into(), reason.clone().into());
        }

        let embedding = self.embed_one(&content).await?;

        let memory = NewMemory {
            user_id: user_id.clone(),
            agent_id: request.agent_id.filter(|a| !a.is_empty()),
            content,
            metadata: serde_json::Value::Object(metadata),
            ..Default::default()
        };
        let threshold = self.settings.dedup_threshold;
        let result = self
            .with_db(move |conn| crate::memory::store::add_memory(conn, &memory, &embedding, threshold))
            .await?;

        self.stats.stored.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            id = %result.record.id,
            user_id = %user_id,
            deduplicated = result.deduplicated,
            "memory stored"
        );
        Ok(RememberOutcome::Stored { result, reason })
    }

    pub async fn search(
        &self,
        query: &str,
        user_id: Option<&str>,
        agent_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SearchHit>, ServiceError> {
        if query.trim().is_empty() {
            return Err(ServiceError::Validation("query must not be empty".into()));
        }
        let limit = limit.min(MAX_KNN);
        let embedding = self.embed_one(query).await?;
        let user_id = self.user_or_default(user_id);
        let agent_id = agent_id.map(String::from);
        self.with_db(move |conn| {
            crate::memory::search::search_memories(conn, &embedding, &user_id, agent_id.as_deref(), limit)
        })
        .await
    }

    pub async fn list(
        &self,
        user_id: Option<&str>,
        agent_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>, ServiceError> {
        let user_id = self.user_or_default(user_id);
        let agent_id = agent_id.map(String::from);
        self.with_db(move |conn| {
            crate::memory::search::list_memories(conn, &user_id, agent_id.as_deref(), limit)
        })
        .await
    }

    pub async fn get(&self, id: &str) -> Result<MemoryRecord, ServiceError> {
        let owned = id.to_string();
        self.with_db(move |conn| crate::memory::search::get_memory(conn, &owned))
            .await?
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))
    }

    pub async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        let owned = id.to_string();
        let deleted = self
            .with_db(move |conn| crate::memory::forget::delete_memory(conn, &owned))
            .await?;
        if deleted {
            Ok(())
        } else {
            Err(ServiceError::NotFound(id.to_string()))
        }
    }

    pub async fn delete_all(&self, user_id: &str) -> Result<usize, ServiceError> {
        if user_id.is_empty() {
            return Err(ServiceError::Validation("user_id is required".into()));
        }
        let user_id = user_id.to_string();
        self.with_db(move |conn| crate::memory::forget::delete_all(conn, &user_id))
            .await
    }

    /// Embed arbitrary inputs, preserving order.
    pub async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
        if inputs.is_empty() {
            return Err(ServiceError::Validation("input must not be empty".into()));
        }
        self.embedder
            .embed_batch(inputs)
            .await
            .map_err(ServiceError::Embedding)
    }

    /// Forward a conversation to the chat backend.
    pub async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<String, ServiceError> {
        let backend = self.chat.as_ref().ok_or(ServiceError::Disabled("chat passthrough"))?;
        if messages.is_empty() {
            return Err(ServiceError::Validation("messages must not be empty".into()));
        }
        let request = CompletionRequest {
            messages,
            max_tokens: max_tokens.unwrap_or(self.settings.chat_max_tokens),
            temperature: temperature.unwrap_or(self.settings.chat_temperature),
        };
        Ok(backend.complete(&request).await?)
    }

    /// Store already-normalized records without classification or dedup.
    /// Records whose id already exists are skipped.
    pub async fn import(&self, records: Vec<MemoryRecord>) -> Result<ImportSummary, ServiceError> {
        let mut summary = ImportSummary::default();
        for record in records {
            let id = record.id.clone();
            let exists = self
                .with_db(move |conn| crate::memory::search::get_memory(conn, &id))
                .await?
                .is_some();
            if exists {
                summary.skipped += 1;
                continue;
            }

            let embedding = self.embed_one(&record.content).await?;
            let memory = NewMemory {
                user_id: record.user_id,
                agent_id: record.agent_id,
                content: record.content,
                metadata: record.metadata,
                id: Some(record.id),
                created_at: Some(record.created_at),
            };
            self.with_db(move |conn| crate::memory::store::add_memory(conn, &memory, &embedding, 1.0))
                .await?;
            summary.imported += 1;
        }
        Ok(summary)
    }
}
