#![deny(missing_docs)]
//! Agent registry (C5): a JSON-file-backed mapping from task type to
//! agent descriptor, resolved through a compile-time factory table
//! rather than dynamic class loading.
//!
//! This crate knows nothing about concrete agents — the factory table
//! is supplied by the caller (the facade crate wires in
//! `orch-agent-dataextract`/`orch-agent-notes`), matching `neuron`'s
//! pattern of assembling concrete implementations only at the facade.
//!
//! What the registry resolves is a *constructor*, not an instance: every
//! execution builds a fresh, isolated agent (its own
//! reasoner, evaluator, tool surface), so `lookup_by_task_type` hands
//! the caller (`orch-spawner`) an [`AgentFactory`] to call with that
//! execution's [`AgentBuildArgs`], not a pre-built `Arc<dyn Agent>`.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use orch_proto::context::ContextStore;
use orch_proto::embed::Embedder;
use orch_proto::error::RegistryError;
use orch_proto::id::AgentId;
use orch_proto::model::{AgentDescriptor, TaskType};
use orch_proto::reasoner::{PromptSink, Reasoner};
use orch_proto::tool::ToolServerHandle;
use orch_proto::Agent;
use serde::Deserialize;
use tokio::sync::RwLock;

/// Per-execution services the spawner assembles before invoking an
/// [`AgentFactory`]: a fresh reasoner, the composed tool
/// surface for this one execution, and the shared long-lived services
/// (embedding, context store) an agent may ask for. Every field an
/// agent's constructor ignores is simply unused — no reflection
/// required.
#[non_exhaustive]
pub struct AgentBuildArgs {
    /// A fresh reasoner for this execution.
    pub reasoner: Arc<dyn Reasoner>,
    /// Tool servers composed for this execution,
    /// keyed by server name.
    pub tool_servers: HashMap<String, Arc<dyn ToolServerHandle>>,
    /// Qualified tool names the reasoner may call this execution.
    pub allowed_tools: Vec<String>,
    /// Shared embedding client, for agents that do their own RAG
    /// via `retrieve_knowledge`.
    pub embedder: Option<Arc<dyn Embedder>>,
    /// Shared context store, ditto.
    pub context_store: Option<Arc<dyn ContextStore>>,
    /// Optional prompt-observability sink.
    pub prompt_sink: Option<Arc<dyn PromptSink>>,
}

/// A factory function building a fresh agent instance from this
/// execution's [`AgentBuildArgs`], keyed by `loadable_class_name`.
pub type AgentFactory = Arc<dyn Fn(AgentBuildArgs) -> Arc<dyn Agent> + Send + Sync>;

#[derive(Deserialize)]
struct RegistryFile {
    agents: HashMap<String, AgentDescriptor>,
}

/// JSON-backed agent registry. Single writer (startup load,
/// subsequent `register` calls), lock-free-in-spirit reads via
/// `RwLock` — reads vastly outnumber writes.
pub struct AgentRegistry {
    descriptors: RwLock<Vec<AgentDescriptor>>,
    factories: HashMap<String, AgentFactory>,
}

impl AgentRegistry {
    /// Build an empty registry backed by `factories` (keyed by
    /// `loadable_class_name`). Resolving a name against this table
    /// is already the only caching that's needed — a compile-time
    /// `HashMap` lookup needs no further memoization.
    pub fn new(factories: HashMap<String, AgentFactory>) -> Self {
        Self {
            descriptors: RwLock::new(Vec::new()),
            factories,
        }
    }

    /// Load descriptors from the registry JSON file's contents (spec
    /// §6 "Agent-registry file"). Entries whose `agent_id` duplicates
    /// an already-loaded entry replace it. This is the one bulk writer
    /// call; it acquires the write lock once for the whole file.
    pub async fn load_json(&self, json: &str) -> Result<usize, RegistryError> {
        let file: RegistryFile =
            serde_json::from_str(json).map_err(|e| RegistryError::LoadFailed(e.to_string()))?;

        let mut count = 0;
        let mut descriptors = self.descriptors.write().await;
        for (key, mut descriptor) in file.agents {
            if descriptor.agent_id.as_str().is_empty() {
                descriptor.agent_id = AgentId::new(key);
            }
            descriptors.retain(|d| d.agent_id != descriptor.agent_id);
            descriptors.push(descriptor);
            count += 1;
        }
        Ok(count)
    }

    /// Register (or replace) one descriptor directly, bypassing the
    /// JSON file — the "subsequent registrations" writer path of spec
    /// §4.5/§5.
    pub async fn register(&self, descriptor: AgentDescriptor) {
        let mut descriptors = self.descriptors.write().await;
        descriptors.retain(|d| d.agent_id != descriptor.agent_id);
        descriptors.push(descriptor);
    }

    /// Resolve `loadable_class_name` through the factory table. Unknown
    /// keys are logged and treated as absent, never fatal.
    fn resolve(&self, loadable_class_name: &str) -> Option<AgentFactory> {
        match self.factories.get(loadable_class_name) {
            Some(factory) => Some(Arc::clone(factory)),
            None => {
                tracing::warn!(
                    loadable_class_name,
                    "no factory registered for this agent class; skipping"
                );
                None
            }
        }
    }

    /// First descriptor whose `supported_task_types` includes
    /// `task_type`, paired with its resolved constructor. Descriptors whose class fails to
    /// resolve are skipped in favor of the next matching one.
    pub async fn lookup_by_task_type(
        &self,
        task_type: &TaskType,
    ) -> Result<(AgentFactory, AgentDescriptor), RegistryError> {
        let descriptors = self.descriptors.read().await;
        for descriptor in descriptors.iter() {
            if descriptor.supported_task_types.contains(task_type) {
                if let Some(factory) = self.resolve(&descriptor.loadable_class_name) {
                    return Ok((factory, descriptor.clone()));
                }
            }
        }
        Err(RegistryError::NoAgentForTaskType(task_type.as_wire_name()))
    }

    /// Every descriptor matching both a capability and a task-type
    /// filter (empty sets match everything) — spec §4.5 `discover`.
    pub async fn discover(
        &self,
        required_capabilities: &BTreeSet<String>,
        task_types: &BTreeSet<TaskType>,
    ) -> Vec<AgentDescriptor> {
        let descriptors = self.descriptors.read().await;
        descriptors
            .iter()
            .filter(|d| {
                required_capabilities.is_empty()
                    || required_capabilities.is_subset(&d.capabilities)
            })
            .filter(|d| {
                task_types.is_empty()
                    || d.supported_task_types.iter().any(|t| task_types.contains(t))
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use orch_proto::agent::{AgentContext, AgentResult};
    use orch_proto::error::AgentError;
    use orch_proto::model::AgentDescriptorConfig;
    use serde_json::Map;
    use std::collections::BTreeSet as Set;

    struct StubAgent;

    #[async_trait]
    impl Agent for StubAgent {
        async fn execute(
            &self,
            _task_input: Map<String, serde_json::Value>,
            _context: AgentContext,
        ) -> Result<AgentResult, AgentError> {
            Ok(AgentResult::completed(Map::new()))
        }
    }

    fn descriptor(id: &str, class: &str, task_type: TaskType) -> AgentDescriptor {
        AgentDescriptor {
            agent_id: AgentId::new(id),
            loadable_class_name: class.to_string(),
            supported_task_types: Set::from([task_type]),
            capabilities: Set::new(),
            required_tools: vec![],
            required_tool_servers: Set::new(),
            fallback_toolkits: None,
            use_fallback_provider: true,
            description: "stub".to_string(),
            config: AgentDescriptorConfig::default(),
        }
    }

    fn factories() -> HashMap<String, AgentFactory> {
        let mut map: HashMap<String, AgentFactory> = HashMap::new();
        map.insert(
            "stub".to_string(),
            Arc::new(|_args: AgentBuildArgs| Arc::new(StubAgent) as Arc<dyn Agent>),
        );
        map
    }

    fn build_args() -> AgentBuildArgs {
        AgentBuildArgs {
            reasoner: Arc::new(orch_reasoner_test_double::AlwaysEmpty),
            tool_servers: HashMap::new(),
            allowed_tools: vec![],
            embedder: None,
            context_store: None,
            prompt_sink: None,
        }
    }

    mod orch_reasoner_test_double {
        use async_trait::async_trait;
        use orch_proto::reasoner::{ReasonResponse, Reasoner};
        use orch_proto::tool::ToolServerHandle;
        use serde_json::{Map, Value};
        use std::collections::HashMap;
        use std::sync::Arc;

        pub struct AlwaysEmpty;

        #[async_trait]
        impl Reasoner for AlwaysEmpty {
            async fn reason(
                &self,
                _prompt: &str,
                _context_map: Option<&Map<String, Value>>,
                _tools: Option<&[String]>,
                _tool_servers: Option<&HashMap<String, Arc<dyn ToolServerHandle>>>,
                _caller_tag: Option<&str>,
            ) -> ReasonResponse {
                ReasonResponse::text_only("")
            }
        }
    }

    #[tokio::test]
    async fn lookup_resolves_through_factory_table() {
        let registry = AgentRegistry::new(factories());
        registry
            .register(descriptor("a1", "stub", TaskType::NoteTaking))
            .await;
        let (factory, found) = registry
            .lookup_by_task_type(&TaskType::NoteTaking)
            .await
            .unwrap();
        assert_eq!(found.agent_id, AgentId::new("a1"));
        let agent = factory(build_args());
        let result = agent.execute(Map::new(), test_context()).await.unwrap();
        assert_eq!(
            result.status,
            orch_proto::model::AgentResultStatus::Completed
        );
    }

    #[tokio::test]
    async fn unresolvable_class_is_skipped_not_fatal() {
        let registry = AgentRegistry::new(factories());
        registry
            .register(descriptor("a1", "unknown_class", TaskType::NoteTaking))
            .await;
        registry
            .register(descriptor("a2", "stub", TaskType::NoteTaking))
            .await;
        let (_, found) = registry
            .lookup_by_task_type(&TaskType::NoteTaking)
            .await
            .unwrap();
        assert_eq!(found.agent_id, AgentId::new("a2"));
    }

    #[tokio::test]
    async fn missing_agent_is_reported_not_panicked() {
        let registry = AgentRegistry::new(factories());
        let result = registry.lookup_by_task_type(&TaskType::CreateTodo).await;
        assert!(matches!(result, Err(RegistryError::NoAgentForTaskType(_))));
    }

    #[tokio::test]
    async fn load_json_populates_descriptors() {
        let registry = AgentRegistry::new(factories());
        let json = r#"{
            "agents": {
                "a1": {
                    "agent_id": "a1",
                    "loadable_class_name": "stub",
                    "supported_task_types": ["note-taking"],
                    "capabilities": [],
                    "required_tools": [],
                    "required_tool_servers": [],
                    "fallback_toolkits": null,
                    "use_fallback_provider": true,
                    "description": "stub",
                    "config": {}
                }
            }
        }"#;
        let loaded = registry.load_json(json).await.unwrap();
        assert_eq!(loaded, 1);
        assert!(registry
            .lookup_by_task_type(&TaskType::NoteTaking)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn discover_filters_by_capability_and_task_type() {
        let registry = AgentRegistry::new(factories());
        let mut with_cap = descriptor("a1", "stub", TaskType::NoteTaking);
        with_cap.capabilities.insert("notion".to_string());
        registry.register(with_cap).await;
        registry
            .register(descriptor("a2", "stub", TaskType::CreateTodo))
            .await;

        let found = registry
            .discover(&Set::from(["notion".to_string()]), &Set::new())
            .await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].agent_id, AgentId::new("a1"));
    }

    fn test_context() -> AgentContext {
        AgentContext::new(
            "hi",
            orch_proto::model::TaskIdentificationResult {
                task_type: TaskType::NoteTaking,
                confidence: 0.9,
                reasoning: "x".to_string(),
                alternatives: vec![],
                input: Map::new(),
                output: Map::new(),
            },
            orch_proto::id::UserId::new("u1"),
            vec![],
        )
    }
}
