//! `MemoryContextStore`: the `ContextStore` implementation and the
//! parent-topic linking algorithm.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use orch_proto::context::{ContextStore, NewContext, SimilarityHit};
use orch_proto::embed::{cosine_similarity, Embedder};
use orch_proto::error::ContextError;
use orch_proto::id::{ContextId, UserId};
use orch_proto::model::ContextRecord;
use orch_proto::tags::{normalize_tags, tag_overlap};
use tokio::sync::RwLock;

/// Default minimum tag overlap for parent-candidate selection (spec
/// §4.3 item 4, default 1).
pub const DEFAULT_MIN_TAG_OVERLAP: usize = 1;

/// Default cosine-similarity threshold for embedding-based parent
/// selection.
pub const DEFAULT_PARENT_SIMILARITY_THRESHOLD: f32 = 0.7;

/// In-memory `ContextStore`. One `RwLock<HashMap<...>>` holding every
/// context row, keyed by id — good enough for a per-process deployment;
/// a durable backend would implement the same trait against Postgres.
pub struct MemoryContextStore {
    embedder: Arc<dyn Embedder>,
    rows: RwLock<HashMap<ContextId, ContextRecord>>,
    min_tag_overlap: usize,
    parent_similarity_threshold: f32,
}

impl MemoryContextStore {
    /// Build an empty store backed by `embedder`, using spec defaults
    /// for tag overlap and similarity threshold.
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            rows: RwLock::new(HashMap::new()),
            min_tag_overlap: DEFAULT_MIN_TAG_OVERLAP,
            parent_similarity_threshold: DEFAULT_PARENT_SIMILARITY_THRESHOLD,
        }
    }

    /// Override the minimum tag overlap for parent-candidate selection.
    pub fn with_min_tag_overlap(mut self, min_tag_overlap: usize) -> Self {
        self.min_tag_overlap = min_tag_overlap;
        self
    }

    /// Override the embedding-similarity threshold (`τ`) for parent
    /// selection.
    pub fn with_parent_similarity_threshold(mut self, threshold: f32) -> Self {
        self.parent_similarity_threshold = threshold;
        self
    }

    /// Find the best parent candidate for `tags`/`embedding` among
    /// `candidates`. `candidates` must already be
    /// filtered to the owning user and to roots (`parent_context_id ==
    /// None`) and given in stable creation order.
    fn select_parent(
        &self,
        tags: &[String],
        embedding: Option<&[f32]>,
        candidates: &[&ContextRecord],
    ) -> Option<ContextId> {
        let overlapping: Vec<&&ContextRecord> = candidates
            .iter()
            .filter(|c| tag_overlap(tags, &c.tags) >= self.min_tag_overlap)
            .collect();

        if overlapping.is_empty() {
            return None;
        }

        if let Some(query) = embedding {
            let best = overlapping
                .iter()
                .filter_map(|c| {
                    c.embedding
                        .as_ref()
                        .map(|e| (cosine_similarity(query, e), c.context_id.clone()))
                })
                .filter(|(sim, _)| *sim >= self.parent_similarity_threshold)
                .max_by(|a, b| a.0.total_cmp(&b.0));
            if let Some((_, id)) = best {
                return Some(id);
            }
        }

        // No embedding, or no candidate met the threshold: fall back to
        // the first candidate by stable order (tag-match only).
        overlapping.first().map(|c| c.context_id.clone())
    }
}

#[async_trait]
impl ContextStore for MemoryContextStore {
    async fn create_batch(
        &self,
        drafts: Vec<NewContext>,
    ) -> Vec<Result<ContextRecord, ContextError>> {
        let existing_roots: Vec<ContextRecord> = {
            let rows = self.rows.read().await;
            rows.values()
                .filter(|c| c.parent_context_id.is_none())
                .cloned()
                .collect()
        };

        // Sequential per-entry processing: a record created
        // earlier in this batch becomes a visible root candidate for
        // later entries in the same batch, same as an already-persisted
        // root would be.
        let mut staged_roots: Vec<ContextRecord> = existing_roots;
        let mut results = Vec::with_capacity(drafts.len());

        for draft in drafts {
            let tags = normalize_tags(&draft.tags);
            let embedding = match self.embedder.embed(&draft.raw_content).await {
                Ok(embedding) => embedding,
                Err(e) => {
                    tracing::warn!(error = %e, "context embedding failed, continuing without one");
                    None
                }
            };

            let parent_context_id = if draft.find_parent {
                let candidates: Vec<&ContextRecord> = staged_roots
                    .iter()
                    .filter(|c| c.user_id == draft.user_id)
                    .collect();
                self.select_parent(&tags, embedding.as_deref(), &candidates)
            } else {
                None
            };

            let mut record =
                ContextRecord::new(draft.user_id.clone(), draft.raw_content, draft.kind, Utc::now());
            record.tags = tags;
            record.embedding = embedding;
            record.url = draft.url;
            record.parent_context_id = parent_context_id;

            if record.parent_context_id.is_none() {
                staged_roots.push(record.clone());
            }
            results.push(Ok(record));
        }

        // Single commit: one write-lock acquisition for the whole batch.
        {
            let mut rows = self.rows.write().await;
            for result in &results {
                if let Ok(record) = result {
                    rows.insert(record.context_id.clone(), record.clone());
                }
            }
        }

        results
    }

    async fn fetch(&self, id: &ContextId) -> Result<Option<ContextRecord>, ContextError> {
        Ok(self.rows.read().await.get(id).cloned())
    }

    async fn fetch_many(&self, ids: &[ContextId]) -> Result<Vec<ContextRecord>, ContextError> {
        let rows = self.rows.read().await;
        Ok(ids.iter().filter_map(|id| rows.get(id).cloned()).collect())
    }

    async fn fetch_by_user(&self, user_id: &UserId) -> Result<Vec<ContextRecord>, ContextError> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .filter(|c| &c.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn similarity_search(
        &self,
        query: &[f32],
        k: usize,
        user_id: Option<&UserId>,
    ) -> Result<Vec<SimilarityHit>, ContextError> {
        let rows = self.rows.read().await;
        let mut hits: Vec<SimilarityHit> = rows
            .values()
            .filter(|c| user_id.is_none_or(|u| &c.user_id == u))
            .filter_map(|c| {
                c.embedding
                    .as_ref()
                    .map(|e| SimilarityHit {
                        context: c.clone(),
                        similarity: cosine_similarity(query, e),
                    })
            })
            .collect();
        hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        hits.truncate(k);
        Ok(hits)
    }
}
