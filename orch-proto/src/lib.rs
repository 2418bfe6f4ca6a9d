#![deny(missing_docs)]
//! Protocol traits for the per-user agent-orchestration core.
//!
//! Mirrors `layer0`'s role in the teacher repo: this crate holds the
//! object-safe traits every other crate in the workspace implements or
//! consumes — `Embedder`, `Reasoner`, `ContextStore`, `CredentialStore`,
//! `ToolServerHandle`, and `Agent` — plus the data model (§3) and the
//! per-boundary error enums (§7). No concrete backend lives here.

pub mod agent;
pub mod base;
pub mod context;
pub mod embed;
pub mod error;
pub mod id;
pub mod json_extract;
pub mod model;
pub mod reasoner;
pub mod tags;
pub mod tool;

pub use agent::{Agent, AgentContext, AgentResult, EvaluationResult};
pub use base::{AgentBase, EvaluationRule, EvaluationSpec, FieldExpectation};
pub use context::{ContextStore, CredentialStore, NewContext, SimilarityHit};
pub use embed::{cosine_similarity, Embedder};
pub use id::{AgentId, ContextId, TaskId, UserId};
pub use model::{
    AgentDescriptor, AgentDescriptorConfig, AgentResultStatus, ContextKind, ContextRecord,
    IntegrationCredential, TaskIdentificationResult, TaskRecord, TaskStatus, TaskType,
};
pub use reasoner::{NullPromptSink, PromptSink, ReasonJson, ReasonResponse, Reasoner};
pub use tool::ToolServerHandle;
