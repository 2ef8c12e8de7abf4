//! Embedding abstraction for the in-process document index
//!
//! Two providers:
//! - OpenAI-compatible `/embeddings` endpoint
//! - A deterministic hashing embedder that needs no network access

use crate::config::EmbeddingConfig;
use crate::errors::{AppError, Result};
use crate::evidence::SourceKind;
use async_trait::async_trait;
use backoff::ExponentialBackoff;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

/// Trait for embedding generation
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts (batch)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get the model name
    fn model_name(&self) -> &str;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;
}

fn embedding_error(message: String) -> AppError {
    AppError::RetrievalFailed {
        source_kind: SourceKind::DocumentIndex,
        message,
    }
}

/// OpenAI embedding client
pub struct OpenAIEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dimension: usize,
    base_url: String,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAIEmbedder {
    pub fn new(api_key: String, model: String, base_url: Option<String>) -> Result<Self> {
        let dimension = match model.as_str() {
            "text-embedding-ada-002" | "text-embedding-3-small" => 1536,
            "text-embedding-3-large" => 3072,
            _ => crate::DEFAULT_EMBEDDING_DIMENSION,
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key,
            model,
            dimension,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
        })
    }

    async fn request_with_retry(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let policy = ExponentialBackoff {
            initial_interval: Duration::from_millis(100),
            max_elapsed_time: Some(Duration::from_secs(10)),
            ..ExponentialBackoff::default()
        };

        backoff::future::retry(policy, || async move {
            self.make_request(texts).await.map_err(|e| {
                tracing::warn!(error = %e, model = %self.model, "Embedding request failed");
                backoff::Error::transient(e)
            })
        })
        .await
    }

    async fn make_request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&EmbeddingRequest {
                input: texts,
                model: &self.model,
            })
            .send()
            .await
            .map_err(|e| embedding_error(format!("Embedding request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(embedding_error(format!(
                "Embedding API error {}: {}",
                status, body
            )));
        }

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| embedding_error(format!("Failed to parse embedding response: {}", e)))?;

        Ok(result.data.into_iter().map(|e| e.embedding).collect())
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.request_with_retry(&[text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| embedding_error("Empty embedding response".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        const BATCH_SIZE: usize = 100;

        let mut all_embeddings = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(BATCH_SIZE) {
            all_embeddings.extend(self.request_with_retry(chunk).await?);
        }
        Ok(all_embeddings)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Bag-of-words embedder: each lowercased token is hashed into a bucket.
///
/// Texts sharing vocabulary land close together under cosine similarity,
/// which is enough for local runs and tests.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&digest[..8]);
            let index = (u64::from_le_bytes(bucket) % self.dimension as u64) as usize;
            vector[index] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_sync(t)).collect())
    }

    fn model_name(&self) -> &str {
        "hash-embedding"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Create an embedder based on configuration
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "openai" => {
            let key = config.api_key.clone().ok_or_else(|| AppError::Configuration {
                message: "embedding.api_key is required for the openai provider".to_string(),
            })?;
            Ok(Arc::new(OpenAIEmbedder::new(
                key,
                config.model.clone(),
                config.api_base.clone(),
            )?))
        }
        "hash" => Ok(Arc::new(HashEmbedder::new(config.dimension))),
        other => Err(AppError::Configuration {
            message: format!("Unknown embedding provider: {}", other),
        }),
    }
}

/// Cosine similarity between two vectors; 0 when either is all zeros
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
