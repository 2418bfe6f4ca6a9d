//! `MemoryCredentialStore`: the sibling table to `MemoryContextStore`
//! for per-user integration secrets.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use orch_proto::context::CredentialStore;
use orch_proto::error::ContextError;
use orch_proto::id::UserId;
use orch_proto::model::IntegrationCredential;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

/// In-memory `CredentialStore`. Keyed by `(user_id, integration)` so the
/// uniqueness invariant — at most one non-deleted record per
/// `(user_id, integration)` — is just "one map slot per key": soft-deleted
/// rows are replaced in place rather than accumulating.
#[derive(Default)]
pub struct MemoryCredentialStore {
    rows: RwLock<HashMap<(UserId, String), IntegrationCredential>>,
}

impl MemoryCredentialStore {
    /// Build an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn upsert(
        &self,
        user_id: &UserId,
        integration: &str,
        secret: String,
        metadata: Map<String, Value>,
    ) -> Result<IntegrationCredential, ContextError> {
        let integration = integration.to_lowercase();
        let key = (user_id.clone(), integration.clone());
        let now = Utc::now();
        let mut rows = self.rows.write().await;

        let credential = match rows.get(&key) {
            Some(existing) => IntegrationCredential {
                id: existing.id.clone(),
                user_id: user_id.clone(),
                integration,
                secret,
                metadata,
                deleted: false,
                created_at: existing.created_at,
                updated_at: now,
            },
            None => IntegrationCredential {
                id: format!("{}-{}-{integration}", user_id.as_str(), fastrand_suffix()),
                user_id: user_id.clone(),
                integration,
                secret,
                metadata,
                deleted: false,
                created_at: now,
                updated_at: now,
            },
        };
        rows.insert(key, credential.clone());
        Ok(credential)
    }

    async fn get(
        &self,
        user_id: &UserId,
        integration: &str,
    ) -> Result<Option<IntegrationCredential>, ContextError> {
        let key = (user_id.clone(), integration.to_lowercase());
        let rows = self.rows.read().await;
        Ok(rows.get(&key).filter(|c| !c.deleted).cloned())
    }

    async fn delete(&self, user_id: &UserId, integration: &str) -> Result<(), ContextError> {
        let key = (user_id.clone(), integration.to_lowercase());
        let mut rows = self.rows.write().await;
        if let Some(existing) = rows.get_mut(&key) {
            existing.deleted = true;
            existing.updated_at = Utc::now();
        }
        Ok(())
    }
}

/// Short random suffix for synthetic credential ids. Not cryptographic —
/// just enough to avoid id collisions between upserts for different
/// integrations on the same user.
fn fastrand_suffix() -> String {
    (0..6).map(|_| fastrand::alphanumeric()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_is_idempotent_on_the_non_deleted_row() {
        let store = MemoryCredentialStore::new();
        let user = UserId::new("u1");

        store
            .upsert(&user, "NOTES", "secret-1".to_string(), Map::new())
            .await
            .unwrap();
        let second = store
            .upsert(&user, "notes", "secret-2".to_string(), Map::new())
            .await
            .unwrap();

        let fetched = store.get(&user, "notes").await.unwrap().unwrap();
        assert_eq!(fetched.secret, "secret-2");
        assert_eq!(fetched.id, second.id);
        assert!(!fetched.deleted);
    }

    #[tokio::test]
    async fn deleted_credential_is_not_returned_by_get() {
        let store = MemoryCredentialStore::new();
        let user = UserId::new("u1");
        store
            .upsert(&user, "board", String::new(), Map::new())
            .await
            .unwrap();
        store.delete(&user, "board").await.unwrap();
        assert!(store.get(&user, "board").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn integration_name_is_lowercased() {
        let store = MemoryCredentialStore::new();
        let user = UserId::new("u1");
        store
            .upsert(&user, "Notes", "s".to_string(), Map::new())
            .await
            .unwrap();
        assert!(store.get(&user, "notes").await.unwrap().is_some());
    }
}
