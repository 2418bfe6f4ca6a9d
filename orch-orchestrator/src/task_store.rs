//! Task persistence. Mirrors `orch-context::MemoryContextStore`'s shape: one
//! `RwLock<HashMap<...>>`, scoped by id.

use std::collections::HashMap;

use async_trait::async_trait;
use orch_proto::error::OrchError;
use orch_proto::id::{TaskId, UserId};
use orch_proto::model::TaskRecord;
use tokio::sync::RwLock;

/// Persistence contract for task records. Kept separate from
/// `ContextStore` even though `MemoryTaskStore` is the only
/// implementation today — a durable backend would implement this
/// trait against the same table `app/repositories` writes to in the
/// original.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Write or replace a task record.
    async fn persist(&self, record: TaskRecord) -> Result<(), OrchError>;

    /// Fetch one task by id.
    async fn fetch(&self, id: &TaskId) -> Option<TaskRecord>;

    /// Fetch every task owned by a user.
    async fn fetch_by_user(&self, user_id: &UserId) -> Vec<TaskRecord>;
}

/// In-memory `TaskStore`.
#[derive(Default)]
pub struct MemoryTaskStore {
    rows: RwLock<HashMap<TaskId, TaskRecord>>,
}

impl MemoryTaskStore {
    /// Build an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn persist(&self, record: TaskRecord) -> Result<(), OrchError> {
        self.rows.write().await.insert(record.task_id.clone(), record);
        Ok(())
    }

    async fn fetch(&self, id: &TaskId) -> Option<TaskRecord> {
        self.rows.read().await.get(id).cloned()
    }

    async fn fetch_by_user(&self, user_id: &UserId) -> Vec<TaskRecord> {
        self.rows
            .read()
            .await
            .values()
            .filter(|t| &t.user_id == user_id)
            .cloned()
            .collect()
    }
}

/// A [`TaskStore`] whose `persist` always fails, for exercising spec
/// §4.11's "persistence failure does not mask a successful agent
/// result" path in tests.
#[derive(Default)]
pub struct AlwaysFailsTaskStore;

#[async_trait]
impl TaskStore for AlwaysFailsTaskStore {
    async fn persist(&self, _record: TaskRecord) -> Result<(), OrchError> {
        Err(OrchError::Other(Box::from("simulated persistence failure")))
    }

    async fn fetch(&self, _id: &TaskId) -> Option<TaskRecord> {
        None
    }

    async fn fetch_by_user(&self, _user_id: &UserId) -> Vec<TaskRecord> {
        Vec::new()
    }
}
