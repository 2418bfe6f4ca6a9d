#![deny(missing_docs)]
//! Agent spawner (C6/C7): resolves an agent factory through the
//! registry, composes that execution's tool surface, and constructs a
//! fresh, isolated agent instance to run it.

use std::sync::Arc;

use orch_proto::context::ContextStore;
use orch_proto::embed::Embedder;
use orch_proto::error::AgentError;
use orch_proto::id::AgentId;
use orch_proto::model::AgentDescriptor;
use orch_proto::reasoner::{PromptSink, Reasoner};
use orch_proto::{Agent, AgentContext, AgentResult};
use orch_registry::{AgentBuildArgs, AgentRegistry};
use orch_tool::{compose_tool_surface, BuiltinServers, FallbackGateway};
use serde_json::{Map, Value};

/// Builds a fresh [`Reasoner`] for one execution. Kept as a factory
/// rather than a shared `Arc<dyn Reasoner>` so each agent run gets an
/// isolated instance, even when the underlying backend
/// client is itself cheap to clone.
pub type ReasonerFactory = Arc<dyn Fn() -> Arc<dyn Reasoner> + Send + Sync>;

/// Result of one spawn-and-execute call: the agent's result plus which
/// descriptor actually handled it, for the orchestrator to log/persist.
pub struct SpawnOutcome {
    /// What the agent produced.
    pub result: AgentResult,
    /// Which agent descriptor was selected.
    pub agent_id: AgentId,
}

/// Resolves agents from an [`AgentRegistry`] and executes them with a
/// per-run composed tool surface.
pub struct AgentSpawner {
    registry: Arc<AgentRegistry>,
    builtins: BuiltinServers,
    fallback_gateway: Option<Arc<dyn FallbackGateway>>,
    embedder: Option<Arc<dyn Embedder>>,
    context_store: Option<Arc<dyn ContextStore>>,
    prompt_sink: Option<Arc<dyn PromptSink>>,
    reasoner_factory: ReasonerFactory,
}

impl AgentSpawner {
    /// Build a spawner over `registry`, using `reasoner_factory` to
    /// mint a fresh reasoner per execution and `builtins` for the
    /// native `writer`/`notes` tool servers.
    pub fn new(
        registry: Arc<AgentRegistry>,
        builtins: BuiltinServers,
        reasoner_factory: ReasonerFactory,
    ) -> Self {
        Self {
            registry,
            builtins,
            fallback_gateway: None,
            embedder: None,
            context_store: None,
            prompt_sink: None,
            reasoner_factory,
        }
    }

    /// Attach the fallback-provider gateway.
    pub fn with_fallback_gateway(mut self, gateway: Arc<dyn FallbackGateway>) -> Self {
        self.fallback_gateway = Some(gateway);
        self
    }

    /// Attach the shared embedder, for agents that do their own RAG.
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Attach the shared context store, ditto.
    pub fn with_context_store(mut self, store: Arc<dyn ContextStore>) -> Self {
        self.context_store = Some(store);
        self
    }

    /// Attach a prompt-observability sink, forwarded to every reasoner
    /// this spawner mints.
    pub fn with_prompt_sink(mut self, sink: Arc<dyn PromptSink>) -> Self {
        self.prompt_sink = Some(sink);
        self
    }

    /// The effective set of tool-server names this descriptor needs,
    /// folding its `wants_writer`/`wants_notes_client` capability
    /// flags into the declared `required_tool_servers` set.
    fn effective_descriptor(descriptor: &AgentDescriptor) -> AgentDescriptor {
        let mut descriptor = descriptor.clone();
        if descriptor.config.wants_writer {
            descriptor.required_tool_servers.insert("writer".to_string());
        }
        if descriptor.config.wants_notes_client {
            descriptor.required_tool_servers.insert("notes".to_string());
        }
        descriptor
    }

    /// Resolve the agent for `context.task_identification.task_type`,
    /// compose its tool surface, build a fresh instance, and run it
    /// against `task_input`.
    pub async fn spawn_and_execute(
        &self,
        task_input: Map<String, Value>,
        context: AgentContext,
    ) -> Result<SpawnOutcome, AgentError> {
        let (factory, descriptor) = self
            .registry
            .lookup_by_task_type(&context.task_identification.task_type)
            .await
            .map_err(|e| AgentError::Other(Box::new(e)))?;

        let effective = Self::effective_descriptor(&descriptor);

        let composed = if effective.config.wants_tool_surface
            || !effective.required_tools.is_empty()
            || !effective.required_tool_servers.is_empty()
        {
            compose_tool_surface(
                &effective,
                &context.user_id,
                &self.builtins,
                self.fallback_gateway.clone(),
            )
        } else {
            orch_tool::ComposedToolSurface {
                servers: Default::default(),
                allowed_tools: Vec::new(),
            }
        };

        tracing::info!(
            agent_id = %descriptor.agent_id,
            task_type = %context.task_identification.task_type.as_wire_name(),
            tool_servers = composed.servers.len(),
            "spawning agent"
        );

        let args = AgentBuildArgs {
            reasoner: (self.reasoner_factory)(),
            tool_servers: composed.servers,
            allowed_tools: composed.allowed_tools,
            embedder: self.embedder.clone(),
            context_store: self.context_store.clone(),
            prompt_sink: self.prompt_sink.clone(),
        };

        let agent: Arc<dyn Agent> = factory(args);
        let result = agent.execute(task_input, context).await?;
        Ok(SpawnOutcome {
            result,
            agent_id: descriptor.agent_id,
        })
    }
}
