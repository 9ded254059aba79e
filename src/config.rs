use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::backend::BackendProfile;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MemgateConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub classifier: ClassifierConfig,
    pub chat: ChatConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    /// Exact origins, or prefixes ending in `*` (e.g. `chrome-extension://*`).
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
    pub default_user: String,
    /// Cosine similarity at or above which a new memory is folded into an
    /// existing one for the same user. `1.0` disables dedup.
    pub dedup_threshold: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// `"remote"` (OpenAI-compatible `/embeddings`) or `"local"` (ONNX).
    pub provider: String,
    pub model: String,
    pub dimensions: usize,
    pub base_url: String,
    pub api_key: Option<String>,
    pub cache_dir: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ClassifierConfig {
    pub enabled: bool,
    pub profile: String,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    /// `"reason"` (DECISION/REASON) or `"extract"` (adds a MEMORY line).
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub input_char_cap: usize,
    pub fallback_char_cap: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChatConfig {
    pub enabled: bool,
    pub profile: String,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

/// The subset of settings needed to build a text-generation backend.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub profile: String,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for MemgateConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            embedding: EmbeddingConfig::default(),
            classifier: ClassifierConfig::default(),
            chat: ChatConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 8000,
            log_level: "info".into(),
            allowed_origins: vec![
                "http://localhost:3000".into(),
                "http://localhost:8080".into(),
                "http://localhost:7345".into(),
                "chrome-extension://*".into(),
            ],
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_memgate_dir()
            .join("memory.db")
            .to_string_lossy()
            .into_owned();
        Self {
            db_path,
            default_user: "default_user".into(),
            dedup_threshold: 0.95,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let cache_dir = default_memgate_dir()
            .join("models")
            .to_string_lossy()
            .into_owned();
        Self {
            provider: "remote".into(),
            model: "text-embedding-nomic-embed-text-v1.5".into(),
            dimensions: 768,
            base_url: "http://localhost:1234/v1".into(),
            api_key: None,
            cache_dir,
            timeout_secs: 30,
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            profile: "lm_studio".into(),
            base_url: "http://localhost:1234/v1".into(),
            model: "local-model".into(),
            api_key: None,
            prompt: "reason".into(),
            max_tokens: 128,
            temperature: 0.1,
            timeout_secs: 30,
            input_char_cap: 2000,
            fallback_char_cap: 500,
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            profile: "cerebras".into(),
            base_url: "https://api.cerebras.ai/v1".into(),
            model: "llama3.1-70b".into(),
            api_key: None,
            max_tokens: 512,
            temperature: 0.7,
            timeout_secs: 60,
        }
    }
}

impl ClassifierConfig {
    pub fn backend(&self) -> BackendConfig {
        BackendConfig {
            profile: self.profile.clone(),
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            api_key: self.api_key.clone(),
            timeout_secs: self.timeout_secs,
        }
    }
}

impl ChatConfig {
    pub fn backend(&self) -> BackendConfig {
        BackendConfig {
            profile: self.profile.clone(),
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            api_key: self.api_key.clone(),
            timeout_secs: self.timeout_secs,
        }
    }
}

/// Returns `~/.memgate/`
pub fn default_memgate_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".memgate")
}

/// Returns the default config file path: `~/.memgate/config.toml`
pub fn default_config_path() -> PathBuf {
    default_memgate_dir().join("config.toml")
}

impl MemgateConfig {
    /// Load config from the default TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides and validate.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            MemgateConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("MEMGATE_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = std::env::var("MEMGATE_PORT") {
            match val.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!(value = %val, "ignoring invalid MEMGATE_PORT"),
            }
        }
        if let Ok(val) = std::env::var("MEMGATE_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("MEMGATE_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("MEMGATE_CLASSIFIER_URL") {
            self.classifier.base_url = val;
        }
        if let Ok(val) = std::env::var("MEMGATE_CLASSIFIER_MODEL") {
            self.classifier.model = val;
        }
        if let Ok(val) = std::env::var("MEMGATE_EMBEDDING_URL") {
            self.embedding.base_url = val;
        }
        if let Ok(val) = std::env::var("CEREBRAS_API_KEY") {
            if !val.is_empty() {
                self.chat.api_key = Some(val);
                self.chat.enabled = true;
            }
        }
    }

    /// Reject settings that would make the gate or the store misbehave.
    pub fn validate(&self) -> Result<()> {
        let c = &self.classifier;
        if c.input_char_cap < 1000 {
            bail!("classifier.input_char_cap must be at least 1000 (got {})", c.input_char_cap);
        }
        if c.fallback_char_cap == 0 {
            bail!("classifier.fallback_char_cap must be positive");
        }
        if !(0.0..=2.0).contains(&c.temperature) {
            bail!("classifier.temperature must be within 0.0..=2.0 (got {})", c.temperature);
        }
        if !matches!(c.prompt.as_str(), "reason" | "extract") {
            bail!("unknown classifier.prompt: {}. Supported: reason, extract", c.prompt);
        }
        BackendProfile::from_config_str(&c.profile)
            .with_context(|| format!("invalid classifier.profile: {}", c.profile))?;
        if self.chat.enabled {
            BackendProfile::from_config_str(&self.chat.profile)
                .with_context(|| format!("invalid chat.profile: {}", self.chat.profile))?;
        }

        let threshold = self.storage.dedup_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            bail!("storage.dedup_threshold must be within (0.0, 1.0] (got {threshold})");
        }
        if self.embedding.dimensions == 0 {
            bail!("embedding.dimensions must be positive");
        }
        Ok(())
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
