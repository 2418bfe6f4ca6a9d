//! The orchestrator's single input and output types.

use orch_proto::id::{ContextId, TaskId, UserId};
use orch_proto::model::{TaskStatus, TaskType};
use serde_json::{Map, Value};

/// Input to [`crate::Orchestrator::orchestrate`]. At least one of
/// `selected_text`, `user_context`, `urls` must be non-empty (spec
/// §4.9 step 1).
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct OrchestrateRequest {
    /// Owning tenant.
    pub user_id: UserId,
    /// Text the user highlighted, if any.
    pub selected_text: Option<String>,
    /// Free-form surrounding context the user typed, if any.
    pub user_context: Option<String>,
    /// URLs to fetch and summarise during ingest.
    pub urls: Vec<String>,
    /// Caller-supplied task type, skipping classification entirely.
    pub explicit_task_type: Option<TaskType>,
}

impl OrchestrateRequest {
    /// Build a request with no text, urls, or explicit task type set —
    /// callers attach what they have via the builder methods. An empty
    /// request fails `orchestrate`'s precondition check unless at least
    /// one of them is filled in.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            selected_text: None,
            user_context: None,
            urls: Vec::new(),
            explicit_task_type: None,
        }
    }

    /// Attach highlighted text.
    pub fn with_selected_text(mut self, text: impl Into<String>) -> Self {
        self.selected_text = Some(text.into());
        self
    }

    /// Attach free-form surrounding context.
    pub fn with_user_context(mut self, text: impl Into<String>) -> Self {
        self.user_context = Some(text.into());
        self
    }

    /// Attach source URLs.
    pub fn with_urls(mut self, urls: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.urls = urls.into_iter().map(Into::into).collect();
        self
    }

    /// Skip task identification, forcing this task type.
    pub fn with_explicit_task_type(mut self, task_type: TaskType) -> Self {
        self.explicit_task_type = Some(task_type);
        self
    }
}

/// Output of one `orchestrate` call. Always
/// returned, even when task persistence itself failed — a persistence
/// failure "does not mask a successful agent result".
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct TaskResult {
    /// Freshly generated identifier for the task record.
    pub task_id: TaskId,
    /// Owning tenant.
    pub user_id: UserId,
    /// Classified (or explicit) task type.
    pub task_type: TaskType,
    /// Normalised completion status.
    pub status: TaskStatus,
    /// The agent's result payload.
    pub output: Map<String, Value>,
    /// Context rows ingested for this task.
    pub context_ids: Vec<ContextId>,
    /// Error message, set whenever `status != Completed`.
    pub error: Option<String>,
}
