//! The agent execution contract (C7).
//!
//! Mirrors `layer0::operator` exactly: one object-safe trait, one
//! input type, one output type. `AgentContext`/`AgentResult` play the
//! role `OperatorInput`/`OperatorOutput` play in the teacher — free-form
//! `serde_json::Value` payloads, `#[non_exhaustive]`, `::new()`
//! constructors for the required fields, builder methods for the rest.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::error::AgentError;
use crate::id::{ContextId, UserId};
use crate::model::{AgentResultStatus, TaskIdentificationResult};

/// Shared scalar map for multi-agent composition. Cloning an `AgentContext` clones the `Arc`, not the map, so
/// every agent in a workflow step sees the same state.
pub type SharedState = Arc<Mutex<Map<String, Value>>>;

/// Everything an agent execution needs besides its structured input.
#[non_exhaustive]
#[derive(Clone)]
pub struct AgentContext {
    /// Original free-form user text (selected text + user context,
    /// concatenated by the orchestrator).
    pub raw_text: String,
    /// The task-identification result that selected this agent.
    pub task_identification: TaskIdentificationResult,
    /// Metadata such as `urls` and `tags` gathered during ingest.
    pub metadata: Map<String, Value>,
    /// Output of context ingestion, if the agent wants to inspect it
    /// directly rather than re-deriving it from `context_ids`.
    pub processed_context: Option<Value>,
    /// Owning tenant for this execution.
    pub user_id: UserId,
    /// Context rows ingested for this task.
    pub context_ids: Vec<ContextId>,
    /// Mutable map shared across agents in a multi-step workflow.
    pub shared_state: SharedState,
}

impl AgentContext {
    /// Build a context with the required fields; `metadata`,
    /// `processed_context`, and `shared_state` start empty/fresh.
    pub fn new(
        raw_text: impl Into<String>,
        task_identification: TaskIdentificationResult,
        user_id: UserId,
        context_ids: Vec<ContextId>,
    ) -> Self {
        Self {
            raw_text: raw_text.into(),
            task_identification,
            metadata: Map::new(),
            processed_context: None,
            user_id,
            context_ids,
            shared_state: Arc::new(Mutex::new(Map::new())),
        }
    }

    /// Attach ingest metadata (`urls`, `tags`, …).
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Structural-validation outcome of [`Agent`]'s `evaluate` helper (spec
/// §4.7). Errors lower `passed`; warnings (e.g. a type mismatch) don't.
#[non_exhaustive]
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct EvaluationResult {
    /// Whether no errors were found.
    pub passed: bool,
    /// Score in `[0, 1]`.
    pub score: f32,
    /// Required-field / rule failures. Each one costs the score.
    pub errors: Vec<String>,
    /// Type mismatches and other non-fatal observations.
    pub warnings: Vec<String>,
}

/// Output of one agent execution.
#[non_exhaustive]
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AgentResult {
    /// Completion status.
    pub status: AgentResultStatus,
    /// Free-form result payload, agent-interpreted.
    pub result: Map<String, Value>,
    /// Path to a file the agent produced (data-extraction writer output).
    pub file_path: Option<String>,
    /// Structured rows the agent extracted, if any.
    pub rows: Option<Vec<Map<String, Value>>>,
    /// Structural validation of `result`, if the agent ran one.
    pub validation: Option<EvaluationResult>,
    /// Free-form execution metadata (timings, reasoner usage, …).
    pub metadata: Map<String, Value>,
    /// Error message, set whenever `status != Completed`.
    pub error: Option<String>,
}

impl AgentResult {
    /// A successful result with no auxiliary fields set.
    pub fn completed(result: Map<String, Value>) -> Self {
        Self {
            status: AgentResultStatus::Completed,
            result,
            file_path: None,
            rows: None,
            validation: None,
            metadata: Map::new(),
            error: None,
        }
    }

    /// A failed result carrying an explanatory message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: AgentResultStatus::Failed,
            result: Map::new(),
            file_path: None,
            rows: None,
            validation: None,
            metadata: Map::new(),
            error: Some(message.into()),
        }
    }

    /// A partial result: some but not all of the expected output landed.
    pub fn partial(result: Map<String, Value>, message: impl Into<String>) -> Self {
        Self {
            status: AgentResultStatus::Partial,
            result,
            file_path: None,
            rows: None,
            validation: None,
            metadata: Map::new(),
            error: Some(message.into()),
        }
    }

    /// Attach a produced file path.
    pub fn with_file_path(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    /// Attach extracted rows.
    pub fn with_rows(mut self, rows: Vec<Map<String, Value>>) -> Self {
        self.rows = Some(rows);
        self
    }

    /// Attach an evaluation outcome.
    pub fn with_validation(mut self, validation: EvaluationResult) -> Self {
        self.validation = Some(validation);
        self
    }
}

/// Protocol ① for this domain — what one specialised agent does per
/// task. One method, object-safe, exactly like
/// `layer0::Operator`: everything that happens inside (how many
/// reasoner calls, how many tool calls) is the implementation's concern.
///
/// `Err` is reserved for defects the orchestrator cannot meaningfully
/// turn into a task record (e.g. a bug in the agent itself); operational
/// failures — a bad reasoner response, a tool that errored — are
/// reported as `Ok(AgentResult::failed(..))` instead: external tool
/// failures propagate as a failed result, not as an exception.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Execute this agent against `task_input`/`context`.
    async fn execute(
        &self,
        task_input: Map<String, Value>,
        context: AgentContext,
    ) -> Result<AgentResult, AgentError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TaskType;

    fn sample_identification() -> TaskIdentificationResult {
        TaskIdentificationResult {
            task_type: TaskType::AddToKnowledgeBase,
            confidence: 0.9,
            reasoning: "test".into(),
            alternatives: vec![],
            input: Map::new(),
            output: Map::new(),
        }
    }

    #[test]
    fn agent_result_constructors_set_status() {
        let ok = AgentResult::completed(Map::new());
        assert_eq!(ok.status, AgentResultStatus::Completed);
        assert!(ok.error.is_none());

        let failed = AgentResult::failed("boom");
        assert_eq!(failed.status, AgentResultStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("boom"));

        let partial = AgentResult::partial(Map::new(), "half done");
        assert_eq!(partial.status, AgentResultStatus::Partial);
    }

    #[tokio::test]
    async fn shared_state_is_actually_shared_across_clones() {
        let ctx = AgentContext::new("hi", sample_identification(), UserId::new("u1"), vec![]);
        let clone = ctx.clone();
        ctx.shared_state
            .lock()
            .await
            .insert("k".to_string(), Value::Bool(true));
        assert_eq!(
            clone.shared_state.lock().await.get("k"),
            Some(&Value::Bool(true))
        );
    }

    fn _assert_object_safe(_: &dyn Agent) {}
}
