//! The context store contract (C3).
//!
//! `ContextStore` owns persistence, similarity search, and the
//! parent-topic linking algorithm; `CredentialStore` owns
//! the sibling integration-credential table. Both traits are implemented once, by
//! `orch-context::MemoryContextStore`, but live here so every crate
//! that needs "a context store" depends on the trait, not the backend.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::ContextError;
use crate::id::{ContextId, UserId};
use crate::model::{ContextKind, ContextRecord, IntegrationCredential};

/// Everything needed to create one context row, before an id, embedding,
/// or parent link have been assigned.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct NewContext {
    /// Owning tenant.
    pub user_id: UserId,
    /// Original content.
    pub raw_content: String,
    /// Raw (not-yet-normalised) tags.
    pub tags: Vec<String>,
    /// Source URL, if any.
    pub url: Option<String>,
    /// What kind of content this is.
    pub kind: ContextKind,
    /// Whether to run the parent-topic linking algorithm for this row.
    pub find_parent: bool,
}

impl NewContext {
    /// Build a draft with the common defaults: text content, parent
    /// linking enabled (the usual case during ingest).
    pub fn text(user_id: UserId, raw_content: impl Into<String>) -> Self {
        Self {
            user_id,
            raw_content: raw_content.into(),
            tags: Vec::new(),
            url: None,
            kind: ContextKind::Text,
            find_parent: true,
        }
    }

    /// Attach tags (raw; the store normalises them).
    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Attach a source URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// One similarity-search hit: a context plus its similarity to the query.
#[derive(Debug, Clone)]
pub struct SimilarityHit {
    /// The matched context.
    pub context: ContextRecord,
    /// `1 - cosine_distance` against the query vector.
    pub similarity: f32,
}

/// Persistence + search contract for user contexts (C3).
///
/// Create is intentionally batched (`create_batch`) rather than
/// one-row-at-a-time: writes are deferred and committed explicitly, with
/// per-entry best-effort creation landing in one transaction. A
/// single-row convenience is
/// just `create_batch` with one element.
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Create each draft, computing its embedding and parent link, then
    /// commit all successes in one transaction. A per-entry failure does
    /// not abort the batch — it's reported at that
    /// entry's position and excluded from the commit.
    async fn create_batch(
        &self,
        drafts: Vec<NewContext>,
    ) -> Vec<Result<ContextRecord, ContextError>>;

    /// Fetch one context by id.
    async fn fetch(&self, id: &ContextId) -> Result<Option<ContextRecord>, ContextError>;

    /// Fetch a set of contexts by id, skipping ids that don't exist.
    async fn fetch_many(&self, ids: &[ContextId]) -> Result<Vec<ContextRecord>, ContextError>;

    /// Fetch every context owned by a user.
    async fn fetch_by_user(&self, user_id: &UserId) -> Result<Vec<ContextRecord>, ContextError>;

    /// Top-`k` contexts by cosine similarity to `query`, optionally
    /// scoped to one user.
    async fn similarity_search(
        &self,
        query: &[f32],
        k: usize,
        user_id: Option<&UserId>,
    ) -> Result<Vec<SimilarityHit>, ContextError>;
}

/// Persistence contract for per-user third-party integration secrets
///. Deliberately separate from
/// `ContextStore` even though one backend implements both — credentials
/// are not contexts, and keeping the traits apart means a future
/// dedicated secrets backend can implement only this one.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert or update the non-deleted credential for
    /// `(user_id, integration)`. Idempotent: calling this twice with the
    /// same `(user_id, integration, secret)` leaves exactly one
    /// non-deleted row with the latest secret.
    async fn upsert(
        &self,
        user_id: &UserId,
        integration: &str,
        secret: String,
        metadata: Map<String, Value>,
    ) -> Result<IntegrationCredential, ContextError>;

    /// Fetch the current non-deleted credential, if any.
    async fn get(
        &self,
        user_id: &UserId,
        integration: &str,
    ) -> Result<Option<IntegrationCredential>, ContextError>;

    /// Soft-delete the current credential, if any. No-op if none exists.
    async fn delete(&self, user_id: &UserId, integration: &str) -> Result<(), ContextError>;
}
