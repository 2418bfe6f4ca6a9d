//! The embedding client contract (C1).

use async_trait::async_trait;

use crate::error::EmbedError;

/// Fixed-dimension vector embedder.
///
/// Object-safe and meant to live behind `Arc<dyn Embedder>`, shared
/// across concurrent requests — unlike a non-object-safe
/// RPITIT-based provider trait, this one is dispatched dynamically.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed one piece of text. Empty or whitespace-only input yields
    /// `Ok(None)` without calling the backend.
    async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>, EmbedError>;

    /// Embed many texts, chunked into batches of at most `self.batch_size()`.
    /// The default implementation calls [`Embedder::embed`] once per
    /// chunk, sequentially — no intra-batch concurrency.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Option<Vec<f32>>>, EmbedError> {
        let batch_size = self.batch_size();
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(batch_size.max(1)) {
            for text in chunk {
                out.push(self.embed(text).await?);
            }
        }
        Ok(out)
    }

    /// Maximum number of texts per backend call. Default 100.
    fn batch_size(&self) -> usize {
        100
    }

    /// Width of the vectors this embedder produces.
    fn dimension(&self) -> usize;
}

/// Cosine similarity of two vectors. Zero-norm inputs yield `0.0`
/// rather than `NaN`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// `1 - cosine_distance`, i.e. `cosine_similarity` under another name,
/// matching the terminology similarity-search callers use.
pub fn cosine_distance_complement(a: &[f32], b: &[f32]) -> f32 {
    cosine_similarity(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_have_similarity_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn zero_vector_yields_zero() {
        let zero = vec![0.0, 0.0];
        let other = vec![1.0, 1.0];
        assert_eq!(cosine_similarity(&zero, &other), 0.0);
    }

    #[test]
    fn orthogonal_vectors_have_similarity_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }
}
