//! The orchestrator proper (C9): `Orchestrator::orchestrate`, the
//! seven-step ingest → identify → spawn → persist pipeline.

use std::sync::Arc;

use chrono::Utc;
use orch_proto::agent::AgentContext;
use orch_proto::context::{ContextStore, NewContext};
use orch_proto::error::OrchError;
use orch_proto::id::TaskId;
use orch_proto::model::{TaskIdentificationResult, TaskRecord, TaskStatus};
use orch_proto::reasoner::Reasoner;
use orch_spawner::AgentSpawner;
use serde_json::{Map, Value};

use crate::ingest::run_context_processing;
use crate::request::{OrchestrateRequest, TaskResult};
use crate::task_store::TaskStore;
use crate::workflow::is_atomic;

/// Drives one request through ingest → identification → spawn →
/// persist. Holds every long-lived, shared service a
/// request needs; per-request state (agent instance, reasoner,
/// composed tool surface) is constructed fresh inside
/// `AgentSpawner::spawn_and_execute`.
pub struct Orchestrator {
    context_store: Arc<dyn ContextStore>,
    identifier: Arc<orch_identifier::TaskIdentifier<dyn Reasoner>>,
    ingest_reasoner: Arc<dyn Reasoner>,
    spawner: Arc<AgentSpawner>,
    task_store: Arc<dyn TaskStore>,
}

impl Orchestrator {
    /// Build an orchestrator over its shared services.
    ///
    /// `ingest_reasoner` and the reasoner backing `identifier` are
    /// deliberately separate parameters from the one
    /// `AgentSpawner`/`ReasonerFactory` mints per agent execution —
    /// each of the three reasoner roles (context-processing, task
    /// identification, agent execution) is independently swappable.
    pub fn new(
        context_store: Arc<dyn ContextStore>,
        identifier: Arc<orch_identifier::TaskIdentifier<dyn Reasoner>>,
        ingest_reasoner: Arc<dyn Reasoner>,
        spawner: Arc<AgentSpawner>,
        task_store: Arc<dyn TaskStore>,
    ) -> Self {
        Self {
            context_store,
            identifier,
            ingest_reasoner,
            spawner,
            task_store,
        }
    }

    /// Run the full seven-step pipeline.
    pub async fn orchestrate(&self, request: OrchestrateRequest) -> Result<TaskResult, OrchError> {
        let selected_text = request.selected_text.clone().unwrap_or_default();
        let user_context = request.user_context.clone().unwrap_or_default();

        // Step 1: precondition.
        if request.urls.is_empty()
            && selected_text.trim().is_empty()
            && user_context.trim().is_empty()
        {
            return Err(OrchError::InvalidInput(
                "at least one of urls, selected_text, user_context is required".to_string(),
            ));
        }

        let raw_text = [selected_text.trim(), user_context.trim()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");

        // Step 2: ingest contexts.
        let free_text = if !selected_text.trim().is_empty() {
            selected_text.clone()
        } else {
            user_context.clone()
        };
        let entries = run_context_processing(&self.ingest_reasoner, &request.urls, &free_text).await;

        let mut context_ids = Vec::new();
        let mut all_tags: Vec<String> = Vec::new();

        if !entries.is_empty() {
            let drafts: Vec<NewContext> = entries
                .iter()
                .map(|entry| {
                    let mut draft = NewContext::text(request.user_id.clone(), entry.content.clone())
                        .with_tags(entry.tags.clone());
                    if let Some(url) = &entry.url {
                        draft = draft.with_url(url.clone());
                    }
                    draft
                })
                .collect();

            for (index, outcome) in self.context_store.create_batch(drafts).await.into_iter().enumerate() {
                match outcome {
                    Ok(record) => {
                        all_tags.extend(record.tags.clone());
                        context_ids.push(record.context_id);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, entry_index = index, "context ingest entry failed, continuing");
                    }
                }
            }
        }

        if context_ids.is_empty() {
            let fallback_raw = raw_text.clone();
            let fallback = NewContext::text(request.user_id.clone(), fallback_raw)
                .with_tags(["user_input".to_string()]);
            if let Some(Ok(record)) = self
                .context_store
                .create_batch(vec![fallback])
                .await
                .into_iter()
                .next()
            {
                all_tags.extend(record.tags.clone());
                context_ids.push(record.context_id);
            }
        }

        // Step 3: identify task.
        let mut metadata = Map::new();
        metadata.insert(
            "urls".to_string(),
            Value::from(request.urls.iter().cloned().collect::<Vec<_>>()),
        );
        metadata.insert("tags".to_string(), Value::from(all_tags));

        let task_identification = match &request.explicit_task_type {
            Some(task_type) => TaskIdentificationResult {
                task_type: task_type.clone(),
                confidence: 1.0,
                reasoning: "explicit task type supplied by caller".to_string(),
                alternatives: Vec::new(),
                input: Map::new(),
                output: Map::new(),
            },
            None => self.identifier.identify(&raw_text, Some(&metadata)).await,
        };

        let agent_context = AgentContext::new(
            raw_text,
            task_identification.clone(),
            request.user_id.clone(),
            context_ids.clone(),
        )
        .with_metadata(metadata);

        // Steps 4-6: select agent, compose tool surface, spawn and execute.
        let task_input = task_identification.input.clone();
        let agent_result = if is_atomic(&task_identification) {
            match self.spawner.spawn_and_execute(task_input, agent_context.clone()).await {
                Ok(outcome) => outcome.result,
                Err(e) => {
                    tracing::warn!(error = %e, "agent selection or execution failed");
                    orch_proto::AgentResult::failed(e.to_string())
                }
            }
        } else {
            // Reserved: is_atomic never returns false today, so this
            // branch is exercised directly in `workflow`'s own tests
            // rather than through `orchestrate`.
            orch_proto::AgentResult::failed("non-atomic task identification is not yet policy-enabled")
        };

        // Step 7: persist.
        let task_id = TaskId::generate();
        let status = TaskStatus::from_agent_result_status(agent_result.status);
        let record = TaskRecord {
            task_id: task_id.clone(),
            user_id: request.user_id.clone(),
            task_type: task_identification.task_type.clone(),
            input: task_identification.input.clone(),
            output: agent_result.result.clone(),
            context_ids: context_ids.clone(),
            status,
            created_at: Utc::now(),
        };

        if let Err(e) = self.task_store.persist(record).await {
            tracing::warn!(error = %e, task_id = %task_id, "task persistence failed, returning in-memory result anyway");
        }

        Ok(TaskResult {
            task_id,
            user_id: request.user_id,
            task_type: task_identification.task_type,
            status,
            output: agent_result.result,
            context_ids,
            error: agent_result.error,
        })
    }
}
