//! Embedding provider abstraction and implementations.
//!
//! Defines the [`EmbeddingsProvider`] trait and concrete implementations:
//! - **[`DisabledProvider`]**: returns errors; used when embeddings are not configured.
//! - **[`OpenAiEmbeddings`]**: any OpenAI-compatible `/embeddings` endpoint, with retry and backoff.
//! - **[`WorkersAiEmbeddings`]**: Cloudflare Workers AI embedding models.
//!
//! Every provider validates the returned vector length against the configured
//! `dims` so a model/index mismatch fails loudly instead of scoring garbage.
//!
//! Also provides vector utilities used by the SQLite store:
//! - [`cosine_similarity`]: compute similarity between two embedding vectors
//! - [`vec_to_blob`] / [`blob_to_vec`]: little-endian `f32` BLOB encoding

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::EmbeddingConfig;
use crate::http::{client_with_timeout, join_url, post_json_with_retry, preview};
use crate::workers_ai::WorkersAiClient;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Trait for embedding providers.
#[async_trait]
pub trait EmbeddingsProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Returns the expected embedding dimensionality (e.g. `384`).
    fn dims(&self) -> usize;
    /// Embed a single text.
    ///
    /// Fails when the response carries no numeric vector or when its length
    /// differs from [`dims`](EmbeddingsProvider::dims).
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

// ============ Disabled Provider ============

/// A no-op embedding provider that always returns errors.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingsProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.")
    }
}

// ============ OpenAI-compatible Provider ============

/// Embedding provider for OpenAI-compatible APIs.
///
/// Calls `POST {base_url}/embeddings`. Requires `OPENAI_API_KEY` unless a
/// key is supplied with [`OpenAiEmbeddings::with_api_key`].
pub struct OpenAiEmbeddings {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    dims: usize,
    max_retries: u32,
}

impl OpenAiEmbeddings {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &EmbeddingConfig, api_key: impl Into<String>) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for OpenAI provider"))?;
        let base = config.base_url.as_deref().unwrap_or(OPENAI_BASE_URL);

        Ok(Self {
            client: client_with_timeout(config.timeout_secs)?,
            url: join_url(base, "embeddings"),
            api_key: api_key.into(),
            model,
            dims: config.dims,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl EmbeddingsProvider for OpenAiEmbeddings {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": [text],
        });
        let json = post_json_with_retry(
            &self.client,
            &self.url,
            &self.api_key,
            &body,
            self.max_retries,
            "OpenAI embeddings",
        )
        .await?;
        checked_vector(&json, self.dims)
    }
}

// ============ Workers AI Provider ============

/// Embedding provider backed by Cloudflare Workers AI.
///
/// Sends `{ "text": [input] }` and accepts any of the response shapes
/// handled by [`extract_embedding`].
pub struct WorkersAiEmbeddings {
    client: WorkersAiClient,
    model: String,
    dims: usize,
}

impl WorkersAiEmbeddings {
    pub fn new(client: WorkersAiClient, model: impl Into<String>, dims: usize) -> Self {
        Self {
            client,
            model: model.into(),
            dims,
        }
    }
}

#[async_trait]
impl EmbeddingsProvider for WorkersAiEmbeddings {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let result = self
            .client
            .run(&self.model, &serde_json::json!({ "text": [text] }))
            .await?;
        checked_vector(&result, self.dims)
    }
}

/// Extract the first embedding vector from a provider response.
///
/// Recognized shapes:
/// 1. `{ "data": [ { "embedding": [..] } ] }`
/// 2. `{ "data": [ [..] ] }`
/// 3. `{ "embedding": [..] }`
/// 4. `{ "data": [..] }` (single embedding)
pub fn extract_embedding(result: &serde_json::Value) -> Option<Vec<f32>> {
    let obj = result.as_object()?;

    if let Some(v) = obj.get("embedding").and_then(numeric_array) {
        return Some(v);
    }

    let data = obj.get("data")?.as_array()?;
    let first = data.first()?;
    if let Some(v) = numeric_array(first) {
        return Some(v);
    }
    if let Some(v) = first.get("embedding").and_then(numeric_array) {
        return Some(v);
    }
    numeric_array(obj.get("data")?)
}

fn numeric_array(value: &serde_json::Value) -> Option<Vec<f32>> {
    let arr = value.as_array()?;
    if arr.is_empty() {
        return None;
    }
    arr.iter().map(|x| x.as_f64().map(|f| f as f32)).collect()
}

fn checked_vector(json: &serde_json::Value, expected_dims: usize) -> Result<Vec<f32>> {
    let vec = match extract_embedding(json) {
        Some(v) => v,
        None => bail!(
            "Embeddings response missing embedding vector. Response preview: {}",
            preview(json)
        ),
    };
    if expected_dims > 0 && vec.len() != expected_dims {
        bail!(
            "Embedding dim mismatch: got {}, expected {}. Check EMBED_DIM / embedding.model.",
            vec.len(),
            expected_dims
        );
    }
    Ok(vec)
}

/// Create the appropriate [`EmbeddingsProvider`] based on configuration.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledProvider`] |
/// | `"openai"` | [`OpenAiEmbeddings`] |
/// | `"cloudflare"` | [`WorkersAiEmbeddings`] |
pub fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingsProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledProvider)),
        "openai" => Ok(Arc::new(OpenAiEmbeddings::new(config)?)),
        "cloudflare" => {
            let model = config
                .model
                .clone()
                .ok_or_else(|| anyhow::anyhow!("embedding.model required for Cloudflare provider"))?;
            let client = WorkersAiClient::from_env(config.base_url.as_deref(), config.timeout_secs)?;
            Ok(Arc::new(WorkersAiEmbeddings::new(client, model, config.dims)))
        }
        other => bail!("Unknown embedding provider: {}", other),
    }
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` for empty vectors, vectors of
/// different lengths, and zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_openai_shape() {
        let v = json!({ "data": [ { "embedding": [0.5, -1.0], "index": 0 } ] });
        assert_eq!(extract_embedding(&v), Some(vec![0.5, -1.0]));
    }

    #[test]
    fn test_extract_workers_ai_shapes() {
        assert_eq!(
            extract_embedding(&json!({ "shape": [1, 2], "data": [[1.0, 2.0]] })),
            Some(vec![1.0, 2.0])
        );
        assert_eq!(
            extract_embedding(&json!({ "embedding": [3.0] })),
            Some(vec![3.0])
        );
        assert_eq!(
            extract_embedding(&json!({ "data": [0.25, 0.75] })),
            Some(vec![0.25, 0.75])
        );
    }

    #[test]
    fn test_extract_rejects_non_numeric() {
        assert_eq!(extract_embedding(&json!({ "data": [] })), None);
        assert_eq!(extract_embedding(&json!({ "data": ["a", "b"] })), None);
        assert_eq!(extract_embedding(&json!({ "embedding": [1.0, "x"] })), None);
        assert_eq!(extract_embedding(&json!([1.0, 2.0])), None);
    }

    #[test]
    fn test_checked_vector_dims() {
        let v = json!({ "embedding": [1.0, 2.0, 3.0] });
        assert!(checked_vector(&v, 3).is_ok());
        let err = checked_vector(&v, 4).unwrap_err();
        assert!(err.to_string().contains("dim mismatch"));
        let err = checked_vector(&json!({ "nope": true }), 3).unwrap_err();
        assert!(err.to_string().contains("missing embedding vector"));
    }

    #[tokio::test]
    async fn test_disabled_provider_fails() {
        let err = DisabledProvider.embed("hello").await.unwrap_err();
        assert!(err.to_string().contains("disabled"));
    }

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        assert_eq!(blob_to_vec(&vec_to_blob(&vec)), vec);
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }
}
