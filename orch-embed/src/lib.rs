#![deny(missing_docs)]
//! Embedding client implementations (C1).
//!
//! `HttpEmbedder` is an HTTP-backed [`orch_proto::Embedder`]: it never
//! knows the wire format of its backend beyond "POST text, get a vector
//! back" — that's captured by [`Config`]. `NullEmbedder` is a no-backend
//! stand-in that always returns `None`, useful where an embedder is
//! required positionally but semantic search isn't exercised.

use async_trait::async_trait;
use orch_proto::embed::Embedder;
use orch_proto::error::EmbedError;
use serde::{Deserialize, Serialize};

/// Environment-driven configuration for [`HttpEmbedder`], in the style
/// of the teacher's per-crate `Config::from_env()` constructors rather
/// than a generic config framework.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the embedding backend.
    pub base_url: String,
    /// Bearer token, if the backend requires one.
    pub api_key: Option<String>,
    /// Vector width this backend produces.
    pub dimension: usize,
    /// Max texts per backend call.
    pub batch_size: usize,
}

impl Config {
    /// Build from `ORCH_EMBED_*` environment variables, defaulting
    /// `dimension` to 1536 and `batch_size` to 100.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("ORCH_EMBED_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:11434/api/embeddings".to_string()),
            api_key: std::env::var("ORCH_EMBED_API_KEY").ok(),
            dimension: std::env::var("ORCH_EMBED_DIMENSION")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1536),
            batch_size: std::env::var("ORCH_EMBED_BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(100),
        }
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// HTTP-backed embedder.
pub struct HttpEmbedder {
    client: reqwest::Client,
    config: Config,
}

impl HttpEmbedder {
    /// Build an embedder from an explicit configuration.
    pub fn new(config: Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Build an embedder from the environment (see [`Config::from_env`]).
    pub fn from_env() -> Self {
        Self::new(Config::from_env())
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>, EmbedError> {
        if text.trim().is_empty() {
            return Ok(None);
        }

        let mut request = self
            .client
            .post(&self.config.base_url)
            .json(&EmbedRequest { input: text });
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| EmbedError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, %body, "embedding backend returned an error");
            return Err(EmbedError::RequestFailed(format!("HTTP {status}: {body}")));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbedError::RequestFailed(e.to_string()))?;

        if parsed.embedding.len() != self.config.dimension {
            return Err(EmbedError::WidthMismatch {
                expected: self.config.dimension,
                got: parsed.embedding.len(),
            });
        }

        Ok(Some(parsed.embedding))
    }

    fn batch_size(&self) -> usize {
        self.config.batch_size
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }
}

/// An embedder with no backend: always returns `None`. Used where the
/// pipeline needs *an* `Embedder` but semantic search is out of scope
/// for the test or caller (e.g. unit tests that only exercise tag-match
/// parent linking).
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEmbedder {
    dimension: usize,
}

impl NullEmbedder {
    /// Build a null embedder reporting the given dimension (for callers
    /// that inspect `dimension()` without ever calling `embed`).
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl Embedder for NullEmbedder {
    async fn embed(&self, _text: &str) -> Result<Option<Vec<f32>>, EmbedError> {
        Ok(None)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_text_short_circuits() {
        let embedder = HttpEmbedder::new(Config {
            base_url: "http://unused.invalid".to_string(),
            api_key: None,
            dimension: 8,
            batch_size: 10,
        });
        assert_eq!(embedder.embed("   ").await.unwrap(), None);
    }

    #[tokio::test]
    async fn null_embedder_always_none() {
        let embedder = NullEmbedder::new(1536);
        assert_eq!(embedder.embed("anything").await.unwrap(), None);
        assert_eq!(embedder.dimension(), 1536);
    }

    #[test]
    fn config_from_env_has_spec_defaults() {
        // SAFETY: test-only mutation of process env, single-threaded test.
        unsafe {
            std::env::remove_var("ORCH_EMBED_DIMENSION");
            std::env::remove_var("ORCH_EMBED_BATCH_SIZE");
        }
        let config = Config::from_env();
        assert_eq!(config.dimension, 1536);
        assert_eq!(config.batch_size, 100);
    }
}
