//! Embedding providers and vector utilities.
//!
//! Three backends sit behind one config switch:
//! - **hashed** — deterministic SHA-256 feature hashing into a fixed
//!   dimension. No model, no network; the same text always embeds to the
//!   same vector across processes. The default.
//! - **openai** — the OpenAI embeddings API with batching and exponential
//!   backoff retry.
//! - **local** — fastembed, behind the `local-embeddings` feature.
//!
//! Vectors are stored as little-endian `f32` BLOBs; [`cosine_similarity`]
//! is the similarity measure used by semantic search.

use anyhow::{bail, Result};
use sha2::{Digest, Sha256};
use std::time::Duration;

use crate::config::EmbeddingConfig;

/// Metadata surface for a configured embedding backend.
pub trait EmbeddingProvider: Send + Sync {
    fn model_name(&self) -> &str;
    fn dims(&self) -> usize;
}

pub struct HashedProvider {
    dims: usize,
}

impl EmbeddingProvider for HashedProvider {
    fn model_name(&self) -> &str {
        "hashed"
    }
    fn dims(&self) -> usize {
        self.dims
    }
}

pub struct OpenAIProvider {
    model: String,
    dims: usize,
}

impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
}

pub struct LocalProvider {
    model: String,
    dims: usize,
}

impl EmbeddingProvider for LocalProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
}

/// Instantiate the provider selected in `[embedding]`.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "hashed" => Ok(Box::new(HashedProvider { dims: config.dims })),
        "openai" => {
            let model = config
                .model
                .clone()
                .ok_or_else(|| anyhow::anyhow!("embedding.model required for OpenAI provider"))?;
            if std::env::var("OPENAI_API_KEY").is_err() {
                bail!("OPENAI_API_KEY environment variable not set");
            }
            Ok(Box::new(OpenAIProvider {
                model,
                dims: config.dims,
            }))
        }
        "local" => Ok(Box::new(LocalProvider {
            model: config
                .model
                .clone()
                .unwrap_or_else(|| "all-minilm-l6-v2".to_string()),
            dims: config.dims,
        })),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

/// Embed a batch of texts with the configured backend, in input order.
pub async fn embed_texts(config: &EmbeddingConfig, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    match config.provider.as_str() {
        "hashed" => Ok(texts
            .iter()
            .map(|t| hashed_embedding(t, config.dims))
            .collect()),
        "openai" => embed_openai(config, texts).await,
        "local" => embed_local(config, texts),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

/// Embed a single query text.
pub async fn embed_query(config: &EmbeddingConfig, text: &str) -> Result<Vec<f32>> {
    let results = embed_texts(config, &[text.to_string()]).await?;
    results
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
}

/// Split into lowercase alphanumeric tokens. Shared by the hashed embedder
/// and the lexical scorer so both see the same token stream.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Feature-hash a text into a fixed-dimension, L2-normalized vector.
///
/// Each token is bucketed by the first eight bytes of its SHA-256 digest and
/// contributes ±1 by the ninth byte's parity. sha2 keeps the mapping stable
/// across processes, unlike the standard library's `DefaultHasher`.
pub fn hashed_embedding(text: &str, dims: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; dims];
    if dims == 0 {
        return v;
    }
    for token in tokenize(text) {
        let digest = Sha256::digest(token.as_bytes());
        let bucket = digest[..8]
            .iter()
            .fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
            % dims as u64;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        v[bucket as usize] += sign;
    }
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

/// Call the OpenAI embeddings API with retry/backoff.
///
/// HTTP 429 and 5xx retry with exponential backoff (1s, 2s, 4s, … capped);
/// other 4xx fail immediately; network errors retry.
async fn embed_openai(config: &EmbeddingConfig, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    let api_key =
        std::env::var("OPENAI_API_KEY").map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;
    let model = config
        .model
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("embedding.model required"))?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    let body = serde_json::json!({ "model": model, "input": texts });

    let mut last_err = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let resp = client
            .post("https://api.openai.com/v1/embeddings")
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&body)
            .send()
            .await;

        match resp {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    let json: serde_json::Value = response.json().await?;
                    return parse_openai_response(&json);
                }
                if status.as_u16() == 429 || status.is_server_error() {
                    let body_text = response.text().await.unwrap_or_default();
                    last_err = Some(anyhow::anyhow!("OpenAI API error {}: {}", status, body_text));
                    continue;
                }
                let body_text = response.text().await.unwrap_or_default();
                bail!("OpenAI API error {}: {}", status, body_text);
            }
            Err(e) => {
                last_err = Some(e.into());
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Embedding failed after retries")))
}

fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing data array"))?;

    data.iter()
        .map(|item| {
            let embedding = item
                .get("embedding")
                .and_then(|e| e.as_array())
                .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing embedding"))?;
            Ok(embedding
                .iter()
                .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                .collect())
        })
        .collect()
}

#[cfg(feature = "local-embeddings")]
fn embed_local(_config: &EmbeddingConfig, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    let mut model = TextEmbedding::try_new(InitOptions::new(EmbeddingModel::AllMiniLML6V2))
        .map_err(|e| anyhow::anyhow!("failed to initialize local embedding model: {e}"))?;
    model
        .embed(texts.to_vec(), None)
        .map_err(|e| anyhow::anyhow!("local embedding failed: {e}"))
}

#[cfg(not(feature = "local-embeddings"))]
fn embed_local(_config: &EmbeddingConfig, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
    bail!("provider 'local' requires building with the local-embeddings feature")
}

/// Encode a float vector as little-endian `f32` bytes for BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB written by [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`; `0.0` for empty or mismatched vectors.
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

    #[test]
    fn hashed_embedding_is_deterministic() {
        let a = hashed_embedding("track maintenance schedule", 384);
        let b = hashed_embedding("track maintenance schedule", 384);
        assert_eq!(a, b);
        assert_eq!(a.len(), 384);
    }

    #[test]
    fn hashed_embedding_is_normalized() {
        let v = hashed_embedding("safety incident report", 128);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn hashed_embedding_of_empty_text_is_zero() {
        let v = hashed_embedding("", 64);
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn similar_texts_share_buckets() {
        let a = hashed_embedding("platform safety incident", 256);
        let b = hashed_embedding("safety incident on the platform", 256);
        let c = hashed_embedding("quarterly invoice totals", 256);
        assert!(cosine_similarity(&a, &b) > cosine_similarity(&a, &c));
    }

    #[test]
    fn vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        let blob = vec_to_blob(&vec);
        assert_eq!(blob.len(), 20);
        assert_eq!(blob_to_vec(&blob), vec);
    }

    #[test]
    fn cosine_identical_vectors() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal_vectors() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_mismatched_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn tokenize_lowercases_and_splits() {
        assert_eq!(
            tokenize("Invoice #42: URGENT-review"),
            vec!["invoice", "42", "urgent", "review"]
        );
    }
}
