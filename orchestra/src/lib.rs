#![deny(missing_docs)]
//! # orchestra — umbrella crate
//!
//! Single import surface for the per-user agent-orchestration service.
//! Re-exports the protocol and implementation crates behind feature
//! flags, plus a `prelude` for the happy path and a `defaults` module
//! wiring the two built-in specialised agents into an
//! [`orch_registry::AgentRegistry`] without every caller having to
//! hand-author the registry JSON.

#[cfg(feature = "core")]
pub use orch_context;
#[cfg(feature = "embed")]
pub use orch_embed;
#[cfg(feature = "identifier")]
pub use orch_identifier;
#[cfg(feature = "orchestrator")]
pub use orch_orchestrator;
#[cfg(feature = "core")]
pub use orch_proto;
#[cfg(feature = "reasoner-anthropic")]
pub use orch_reasoner_anthropic;
#[cfg(feature = "reasoner-mock")]
pub use orch_reasoner;
#[cfg(feature = "core")]
pub use orch_registry;
#[cfg(feature = "core")]
pub use orch_spawner;
#[cfg(feature = "core")]
pub use orch_tool;

#[cfg(feature = "agent-dataextract")]
pub use orch_agent_dataextract;
#[cfg(feature = "agent-notes")]
pub use orch_agent_notes;

/// Happy-path imports for composing an orchestration pipeline.
pub mod prelude {
    #[cfg(feature = "core")]
    pub use orch_proto::{
        Agent, AgentContext, AgentDescriptor, AgentDescriptorConfig, AgentId, AgentResult,
        AgentResultStatus, ContextId, ContextKind, ContextRecord, ContextStore, EvaluationResult,
        NewContext, Reasoner, TaskId, TaskIdentificationResult, TaskRecord, TaskStatus, TaskType,
        ToolServerHandle, UserId,
    };

    #[cfg(feature = "core")]
    pub use orch_context::MemoryContextStore;

    #[cfg(feature = "core")]
    pub use orch_registry::{AgentBuildArgs, AgentFactory, AgentRegistry};

    #[cfg(feature = "core")]
    pub use orch_spawner::AgentSpawner;

    #[cfg(feature = "core")]
    pub use orch_tool::{compose_tool_surface, BuiltinServers, NotesServer, WriterServer};

    #[cfg(feature = "identifier")]
    pub use orch_identifier::TaskIdentifier;

    #[cfg(feature = "orchestrator")]
    pub use orch_orchestrator::{MemoryTaskStore, OrchestrateRequest, Orchestrator, TaskStore};

    #[cfg(feature = "agent-dataextract")]
    pub use orch_agent_dataextract::DataExtractionAgent;

    #[cfg(feature = "agent-notes")]
    pub use orch_agent_notes::NoteTakingAgent;
}

/// Default wiring for the two built-in specialised agents: the
/// compile-time factory table their `loadable_class_name`s resolve
/// through, and a matching agent-registry JSON document in
/// the on-disk shape spec §6 describes, so a caller who wants the
/// stock agents doesn't have to hand-author either.
#[cfg(feature = "agents")]
pub mod defaults {
    use std::collections::HashMap;
    use std::sync::Arc;

    use orch_registry::{AgentFactory, AgentRegistry};

    /// `loadable_class_name` the data-extraction descriptor resolves to.
    pub const DATA_EXTRACTION_CLASS: &str = "data_extraction";
    /// `loadable_class_name` the note-taking descriptor resolves to.
    pub const NOTE_TAKING_CLASS: &str = "note_taking";

    /// The registry JSON document describing the two
    /// built-in agents: data-extraction wants the `writer` server,
    /// note-taking wants `notes`; both decline the fallback provider
    /// since their one required server is always natively available
    /// in this deployment.
    pub const DEFAULT_REGISTRY_JSON: &str = r#"{
  "agents": {
    "data-extraction": {
      "agent_id": "data-extraction",
      "loadable_class_name": "data_extraction",
      "supported_task_types": ["extract-data-to-sheet", "add-to-google-sheets"],
      "capabilities": ["spreadsheet"],
      "required_tools": ["svc.writer.write_rows"],
      "required_tool_servers": ["writer"],
      "fallback_toolkits": null,
      "use_fallback_provider": false,
      "description": "Extracts structured rows from free-form text into a spreadsheet.",
      "config": {
        "wants_tool_surface": true,
        "wants_writer": true,
        "wants_notes_client": false
      }
    },
    "note-taking": {
      "agent_id": "note-taking",
      "loadable_class_name": "note_taking",
      "supported_task_types": ["note-taking"],
      "capabilities": ["notes"],
      "required_tools": ["svc.notes.search", "svc.notes.append_blocks", "svc.notes.create_page"],
      "required_tool_servers": ["notes"],
      "fallback_toolkits": null,
      "use_fallback_provider": false,
      "description": "Searches the notes workspace and appends to or creates a page.",
      "config": {
        "wants_tool_surface": true,
        "wants_writer": false,
        "wants_notes_client": true
      }
    }
  }
}"#;

    /// The factory table the registry resolves `loadable_class_name`
    /// against for both built-in agents.
    pub fn default_factories() -> HashMap<String, AgentFactory> {
        let mut factories: HashMap<String, AgentFactory> = HashMap::new();
        factories.insert(
            DATA_EXTRACTION_CLASS.to_string(),
            Arc::new(orch_agent_dataextract::DataExtractionAgent::factory),
        );
        factories.insert(
            NOTE_TAKING_CLASS.to_string(),
            Arc::new(orch_agent_notes::NoteTakingAgent::factory),
        );
        factories
    }

    /// Build a registry pre-loaded with [`DEFAULT_REGISTRY_JSON`] over
    /// [`default_factories`]. Panics only if `DEFAULT_REGISTRY_JSON`
    /// itself is malformed, which would be a bug in this crate, not in
    /// caller input — load a caller-supplied document through
    /// [`orch_registry::AgentRegistry::load_json`] directly instead of
    /// this helper when the registry file isn't this one.
    pub async fn build_default_registry() -> AgentRegistry {
        let registry = AgentRegistry::new(default_factories());
        registry
            .load_json(DEFAULT_REGISTRY_JSON)
            .await
            .expect("DEFAULT_REGISTRY_JSON is a fixed, known-valid document");
        registry
    }
}

#[cfg(all(test, feature = "agents"))]
mod tests {
    use super::defaults::*;
    use orch_proto::model::TaskType;

    #[tokio::test]
    async fn default_registry_resolves_both_built_in_agents() {
        let registry = build_default_registry().await;

        let (_, extraction) = registry
            .lookup_by_task_type(&TaskType::ExtractDataToSheet)
            .await
            .unwrap();
        assert_eq!(extraction.loadable_class_name, DATA_EXTRACTION_CLASS);
        assert!(extraction.required_tool_servers.contains("writer"));

        let (_, notes) = registry.lookup_by_task_type(&TaskType::NoteTaking).await.unwrap();
        assert_eq!(notes.loadable_class_name, NOTE_TAKING_CLASS);
        assert!(notes.required_tool_servers.contains("notes"));
    }
}
