//! Data-model types shared by every component: context records, task
//! records, integration credentials, agent descriptors, and the task
//! identification result.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::id::{AgentId, ContextId, TaskId, UserId};

/// Kind of content a context record holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextKind {
    /// Plain text.
    Text,
    /// An image reference.
    Image,
    /// A video reference.
    Video,
}

/// One ingested unit of user-provided or web-fetched content.
///
/// `tags` preserves insertion order with duplicates forbidden — see
/// [`crate::tags::normalize_tags`]. `parent_context_id`, when set,
/// always references a root context owned by the same user (§4.3's
/// two-level hierarchy).
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextRecord {
    /// Stable, opaque identifier.
    pub context_id: ContextId,
    /// Owning tenant.
    pub user_id: UserId,
    /// Original content.
    pub raw_content: String,
    /// Optional short human summary.
    pub user_summary: Option<String>,
    /// Ordered, deduplicated tags.
    pub tags: Vec<String>,
    /// Fixed-width embedding vector, if one was computed.
    pub embedding: Option<Vec<f32>>,
    /// Source URL, if any.
    pub url: Option<String>,
    /// What kind of content this is.
    pub kind: ContextKind,
    /// Root context this one is grouped under, if any.
    pub parent_context_id: Option<ContextId>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl ContextRecord {
    /// Build a new record with a freshly generated id and the current
    /// time. Callers still choose `tags`/`embedding`/`parent_context_id`
    /// explicitly — this only fixes the identity/timestamp boilerplate.
    pub fn new(
        user_id: UserId,
        raw_content: impl Into<String>,
        kind: ContextKind,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            context_id: ContextId::generate(),
            user_id,
            raw_content: raw_content.into(),
            user_summary: None,
            tags: Vec::new(),
            embedding: None,
            url: None,
            kind,
            parent_context_id: None,
            created_at,
        }
    }
}

/// Status of a task record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not yet started.
    Pending,
    /// Currently executing.
    InProgress,
    /// Finished successfully.
    Completed,
    /// Finished with an unrecoverable error.
    Failed,
    /// Finished with some but not all expected output.
    Partial,
}

impl TaskStatus {
    /// Map an [`crate::model::AgentResultStatus`] onto a task status, the
    /// normalisation step run just before persisting a task record.
    pub fn from_agent_result_status(status: AgentResultStatus) -> Self {
        match status {
            AgentResultStatus::Completed => TaskStatus::Completed,
            AgentResultStatus::Failed => TaskStatus::Failed,
            AgentResultStatus::Partial => TaskStatus::Partial,
        }
    }
}

/// The concrete task types recovered from the original system, plus an
/// escape hatch for anything a future reasoner classification names
/// that this build doesn't know about yet.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskType {
    /// Freeform note capture.
    NoteTaking,
    /// Add a context to the user's knowledge base without further action.
    AddToKnowledgeBase,
    /// Answer a question directly.
    QuestionAnswer,
    /// Create a to-do item.
    CreateTodo,
    /// Create a diagram from the content.
    CreateDiagrams,
    /// Append rows to a Google Sheet.
    AddToGoogleSheets,
    /// Produce a location map.
    CreateLocationMap,
    /// Compare shopping prices across sources.
    CompareShoppingPrices,
    /// Create an actionable item (todo, reminder) from context.
    CreateActionFromContext,
    /// Store content as context with no further processing.
    AddToContext,
    /// Extract structured rows into a spreadsheet.
    ExtractDataToSheet,
    /// A task type this build doesn't recognise by name.
    Custom(String),
}

impl TaskType {
    /// The full set of built-in (non-`Custom`) variants, in the order
    /// the task identifier's prompt enumerates them.
    pub fn built_in() -> &'static [TaskType] {
        const VARIANTS: &[TaskType] = &[
            TaskType::NoteTaking,
            TaskType::AddToKnowledgeBase,
            TaskType::QuestionAnswer,
            TaskType::CreateTodo,
            TaskType::CreateDiagrams,
            TaskType::AddToGoogleSheets,
            TaskType::CreateLocationMap,
            TaskType::CompareShoppingPrices,
            TaskType::CreateActionFromContext,
            TaskType::AddToContext,
            TaskType::ExtractDataToSheet,
        ];
        VARIANTS
    }

    /// The stable wire name for this variant (kebab-case, matching the
    /// serde representation).
    pub fn as_wire_name(&self) -> String {
        match self {
            TaskType::Custom(s) => s.clone(),
            other => serde_json::to_value(other)
                .ok()
                .and_then(|v| v.as_str().map(str::to_owned))
                .unwrap_or_default(),
        }
    }

    /// The safe default used when classification can't match anything,
    /// even after normalisation.
    pub fn safe_default() -> Self {
        TaskType::AddToKnowledgeBase
    }
}

/// A record of a task submitted by a user.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Stable, opaque identifier.
    pub task_id: TaskId,
    /// Owning tenant.
    pub user_id: UserId,
    /// Classified (or explicit) task type.
    pub task_type: TaskType,
    /// Structured input, agent-interpreted.
    pub input: Map<String, Value>,
    /// Structured output, agent-interpreted.
    pub output: Map<String, Value>,
    /// Context rows this task ingested or produced.
    pub context_ids: Vec<ContextId>,
    /// Current status.
    pub status: TaskStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// An opaque secret a user has given this service for a third-party
/// integration (notes service, task board, …). Pure data storage — see
/// the crate-level docs for why this is not an auth protocol.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationCredential {
    /// Stable, opaque identifier.
    pub id: String,
    /// Owning tenant.
    pub user_id: UserId,
    /// Lowercase short integration name (`notes`, `board`, …).
    pub integration: String,
    /// Opaque secret text. May be empty for integrations needing none.
    pub secret: String,
    /// Free-form metadata.
    pub metadata: Map<String, Value>,
    /// Soft-delete flag.
    pub deleted: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// A registry entry describing one installable agent.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDescriptor {
    /// Stable identifier for this descriptor.
    pub agent_id: AgentId,
    /// Key into the compile-time agent factory table.
    pub loadable_class_name: String,
    /// Task types this agent can handle.
    pub supported_task_types: BTreeSet<TaskType>,
    /// Free-form capability tags.
    pub capabilities: BTreeSet<String>,
    /// Qualified tool names this agent needs (`svc.<server>.<tool>`).
    pub required_tools: Vec<String>,
    /// Tool server names this agent needs natively available.
    pub required_tool_servers: BTreeSet<String>,
    /// Toolkits to request from the fallback provider, if given
    /// explicitly (otherwise inferred from unsatisfied tools).
    pub fallback_toolkits: Option<Vec<String>>,
    /// Whether the composer may fall back to the external provider.
    pub use_fallback_provider: bool,
    /// Human-readable description.
    pub description: String,
    /// Capability flags and other free-form configuration.
    pub config: AgentDescriptorConfig,
}

/// The spawner-facing subset of an agent descriptor's `config` map:
/// capability marker booleans replacing constructor-parameter
/// introspection (§9 REDESIGN FLAG).
#[non_exhaustive]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentDescriptorConfig {
    /// Agent wants the composed tool surface wired in.
    #[serde(default)]
    pub wants_tool_surface: bool,
    /// Agent wants a writer (spreadsheet) client wired in directly.
    #[serde(default)]
    pub wants_writer: bool,
    /// Agent wants a notes client wired in directly.
    #[serde(default)]
    pub wants_notes_client: bool,
    /// Any additional free-form config the agent itself interprets.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TaskType {
    fn order_key(&self) -> String {
        self.as_wire_name()
    }
}

impl PartialOrd for TaskType {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TaskType {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.order_key().cmp(&other.order_key())
    }
}

/// Status of an agent's execution result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentResultStatus {
    /// Finished successfully.
    Completed,
    /// Finished with an unrecoverable error.
    Failed,
    /// Finished with some but not all expected output.
    Partial,
}

/// Result of classifying a free-form request into a task type.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskIdentificationResult {
    /// Chosen task type.
    pub task_type: TaskType,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
    /// Free-text reasoning from the classifier.
    pub reasoning: String,
    /// Up to 3 alternative task types, never including `task_type`.
    pub alternatives: Vec<TaskType>,
    /// Structured input, agent-interpreted.
    pub input: Map<String, Value>,
    /// Structured output, agent-interpreted.
    pub output: Map<String, Value>,
}
