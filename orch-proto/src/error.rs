//! Error types for each protocol boundary.
//!
//! One enum per boundary, each with a catch-all `Other` arm, matching
//! the "errors are data, not exceptions" principle: every
//! internal function returns a typed `Result`, and these enums are the
//! full set of kinds that can flow out of the core.

use thiserror::Error;

/// Errors from the embedding client (C1).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum EmbedError {
    /// The backend request failed.
    #[error("embedding request failed: {0}")]
    RequestFailed(String),

    /// The backend returned a vector of unexpected width.
    #[error("embedding width mismatch: expected {expected}, got {got}")]
    WidthMismatch {
        /// Width every other vector in the store uses.
        expected: usize,
        /// Width returned by the backend.
        got: usize,
    },

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors from the reasoner (C2). Never raised across the
/// orchestrator boundary — always captured into a result value.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ReasonError {
    /// The backend request failed (network, auth, rate limit).
    #[error("reasoner backend error: {0}")]
    Backend(String),

    /// A requested tool was not present in the tool surface handed to
    /// this call.
    #[error("tool not available to this reasoner call: {0}")]
    ToolUnavailable(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors from the context store (C3).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ContextError {
    /// The context, or the user scoping it, does not exist.
    #[error("context not found: {0}")]
    NotFound(String),

    /// A `parent_context_id` would have referenced a context owned by
    /// a different user, or a non-root context (would break the
    /// two-level hierarchy's acyclicity invariant).
    #[error("invalid parent link: {0}")]
    InvalidParent(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors from tool servers and the tool-surface composer (C4).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ToolError {
    /// The requested tool was not found in any composed server.
    #[error("tool not found: {0}")]
    NotFound(String),

    /// Tool execution failed. Carries the provider's message verbatim.
    #[error("tool '{tool}' failed: {message}")]
    ExecutionFailed {
        /// Qualified tool name (`svc.<server>.<tool>`).
        tool: String,
        /// Message from the underlying provider.
        message: String,
    },

    /// The input handed to the tool did not match its schema.
    #[error("invalid input for '{tool}': {message}")]
    InvalidInput {
        /// Qualified tool name.
        tool: String,
        /// Description of what was wrong.
        message: String,
    },

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors from the agent registry (C5).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No descriptor in the registry supports the requested task type.
    #[error("no agent supports task type: {0}")]
    NoAgentForTaskType(String),

    /// The registry JSON file could not be read or parsed.
    #[error("registry load failed: {0}")]
    LoadFailed(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors from agent execution (C6/C7). Surfaced as `agent_result.failed`,
/// never as a raised exception past the orchestrator boundary.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum AgentError {
    /// The reasoner returned an error or unusable output.
    #[error("reasoning failed: {0}")]
    Reasoning(#[from] ReasonError),

    /// A required tool call failed.
    #[error("tool failed: {0}")]
    Tool(#[from] ToolError),

    /// The agent could not make sense of its own input (missing
    /// required fields, wrong shape).
    #[error("invalid agent input: {0}")]
    InvalidInput(String),

    /// The agent's output failed evaluation in a way that blocks
    /// returning a result at all (distinct from partial success,
    /// which is represented as `AgentResult::partial` rather than
    /// this variant).
    #[error("evaluation failed: {0}")]
    Evaluation(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors from the orchestrator (C9). This is the last
/// boundary where a failure can become a value the caller sees as
/// something other than a completed/failed/partial task record —
/// only `InvalidInput` is raised before any task record exists.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum OrchError {
    /// Precondition failed: the request carried none of `urls`,
    /// `selected_text`, `user_context`.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The request's deadline was reached or the caller cancelled it.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// An error from a downstream component propagated through
    /// orchestration. By the time this is constructed a task record
    /// with status `failed` has usually already been written — this
    /// variant exists for callers that need the typed cause.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}
