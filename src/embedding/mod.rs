//! Text-to-vector embedding pipeline.
//!
//! Provides the [`EmbeddingProvider`] trait with two implementations: a remote
//! OpenAI-compatible `/embeddings` client (the default, served by the same
//! desktop inference app that hosts the classifier) and a local ONNX model.
//! Both produce L2-normalized vectors. The provider is created via
//! [`create_provider`] from configuration.

pub mod local;
pub mod remote;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Trait for embedding text into vectors.
///
/// Implementations produce L2-normalized vectors of exactly
/// [`dimensions`](EmbeddingProvider::dimensions) components.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text string into a vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        anyhow::ensure!(results.len() == 1, "provider returned {} vectors for one input", results.len());
        Ok(results.remove(0))
    }

    /// Embed a batch of text strings, preserving input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Number of dimensions this provider produces.
    fn dimensions(&self) -> usize;

    /// Model identifier recorded in the database.
    fn model_name(&self) -> &str;
}

/// Create an embedding provider from config.
///
/// `"local"` needs model files in `cache_dir`; run `memgate model download` first.
pub fn create_provider(
    config: &crate::config::EmbeddingConfig,
) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "remote" => Ok(Arc::new(remote::RemoteEmbeddingProvider::new(config)?)),
        "local" => Ok(Arc::new(local::LocalEmbeddingProvider::new(config)?)),
        other => anyhow::bail!("unknown embedding provider: {other}. Supported: remote, local"),
    }
}

/// L2-normalize a vector. Returns the input unchanged if its norm is zero.
pub fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}
