//! OpenAI-compatible `/embeddings` client.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{l2_normalize, EmbeddingProvider};
use crate::backend::profile::normalize_base_url;
use crate::config::EmbeddingConfig;
use crate::error::BackendError;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

pub struct RemoteEmbeddingProvider {
    base_url: String,
    model: String,
    dimensions: usize,
    api_key: Option<String>,
    timeout_secs: u64,
    http: Client,
}

impl RemoteEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            base_url: normalize_base_url(&config.base_url),
            model: config.model.clone(),
            dimensions: config.dimensions,
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            timeout_secs: config.timeout_secs,
            http,
        })
    }

    async fn request(&self, texts: &[String]) -> Result<EmbeddingResponse, BackendError> {
        let mut builder = self
            .http
            .post(format!("{}/embeddings", self.base_url))
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            });
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| BackendError::from_reqwest(e, self.timeout_secs))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::from_reqwest(e, self.timeout_secs))?;

        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                body: body.chars().take(300).collect(),
            });
        }
        serde_json::from_str(&body)
            .map_err(|e| BackendError::Schema(format!("invalid embeddings response: {e}")))
    }
}

#[async_trait]
impl EmbeddingProvider for RemoteEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let response = self.request(texts).await?;
        order_and_check(response.data, texts.len(), self.dimensions)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Sort by `index`, then verify count and dimension and normalize.
fn order_and_check(
    mut data: Vec<EmbeddingData>,
    expected: usize,
    dims: usize,
) -> Result<Vec<Vec<f32>>> {
    anyhow::ensure!(
        data.len() == expected,
        "embeddings response had {} vectors for {expected} inputs",
        data.len()
    );
    data.sort_by_key(|d| d.index);

    data.into_iter()
        .map(|d| {
            anyhow::ensure!(
                d.embedding.len() == dims,
                "embedding dimension mismatch: got {}, configured {dims}",
                d.embedding.len()
            );
            Ok(l2_normalize(&d.embedding))
        })
        .collect()
}
