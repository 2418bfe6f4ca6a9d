//! The non-atomic (multi-agent) branch. `is_atomic` always returns `true` today — task
//! identification never produces a workflow plan — but the scheduling
//! algorithm itself is implemented and tested as a real code path, not
//! a stub, since its scheduling behaviour is fully specified regardless.

use std::sync::Arc;

use orch_proto::agent::{AgentContext, AgentResult};
use orch_proto::model::TaskIdentificationResult;
use orch_proto::model::TaskType;
use orch_spawner::AgentSpawner;
use serde_json::{Map, Value};

/// One step of a workflow plan: an agent invocation plus the indices
/// (into the plan's `steps`) it depends on.
#[derive(Debug, Clone)]
pub struct WorkflowStep {
    /// Task type this step asks the registry to resolve.
    pub task_type: TaskType,
    /// Structured input for this step's agent.
    pub input: Map<String, Value>,
    /// Indices of steps that must complete before this one runs.
    pub depends_on: Vec<usize>,
}

impl WorkflowStep {
    /// Build a step with no dependencies.
    pub fn new(task_type: TaskType, input: Map<String, Value>) -> Self {
        Self {
            task_type,
            input,
            depends_on: Vec::new(),
        }
    }

    /// Attach dependencies on earlier steps.
    pub fn depends_on(mut self, indices: impl IntoIterator<Item = usize>) -> Self {
        self.depends_on = indices.into_iter().collect();
        self
    }
}

/// An ordered list of steps to run as one multi-agent task.
#[derive(Debug, Clone, Default)]
pub struct WorkflowPlan {
    /// The steps, in declaration order; `depends_on` indices refer to
    /// positions in this vec.
    pub steps: Vec<WorkflowStep>,
}

/// Reserved policy hook: whether `task_identification` should be
/// executed as a single agent (the only behaviour exercised today) or
/// expanded into a [`WorkflowPlan`] of multiple agents. Always `true`
/// for now.
pub fn is_atomic(_task_identification: &TaskIdentificationResult) -> bool {
    true
}

/// Run `plan` against `spawner`: no-deps steps first, then every step
/// whose dependencies are now satisfied, in exactly one further pass
///. A step whose dependencies are
/// never satisfied — because they point past this second pass — is
/// recorded as failed rather than silently dropped, so `agent_results`
/// always has one entry per step.
pub async fn run_workflow(
    spawner: &Arc<AgentSpawner>,
    plan: WorkflowPlan,
    context: &AgentContext,
) -> Vec<AgentResult> {
    let mut results: Vec<Option<AgentResult>> = vec![None; plan.steps.len()];

    let first_pass: Vec<usize> = plan
        .steps
        .iter()
        .enumerate()
        .filter(|(_, step)| step.depends_on.is_empty())
        .map(|(i, _)| i)
        .collect();
    run_pass(spawner, &plan, &first_pass, context, &mut results).await;

    let completed_after_first: std::collections::HashSet<usize> = first_pass.into_iter().collect();
    let second_pass: Vec<usize> = plan
        .steps
        .iter()
        .enumerate()
        .filter(|(i, step)| {
            !completed_after_first.contains(i)
                && step.depends_on.iter().all(|d| completed_after_first.contains(d))
        })
        .map(|(i, _)| i)
        .collect();
    run_pass(spawner, &plan, &second_pass, context, &mut results).await;

    results
        .into_iter()
        .map(|r| r.unwrap_or_else(|| AgentResult::failed("dependency never satisfied within one scheduling pass")))
        .collect()
}

async fn run_pass(
    spawner: &Arc<AgentSpawner>,
    plan: &WorkflowPlan,
    indices: &[usize],
    context: &AgentContext,
    results: &mut [Option<AgentResult>],
) {
    let mut handles = Vec::with_capacity(indices.len());
    for &index in indices {
        let step = plan.steps[index].clone();
        let spawner = Arc::clone(spawner);
        let mut step_context = context.clone();
        step_context.task_identification.task_type = step.task_type;
        handles.push((
            index,
            tokio::spawn(async move { spawner.spawn_and_execute(step.input, step_context).await }),
        ));
    }
    for (index, handle) in handles {
        let outcome = match handle.await {
            Ok(Ok(outcome)) => outcome.result,
            Ok(Err(e)) => AgentResult::failed(e.to_string()),
            Err(e) => AgentResult::failed(format!("workflow step task panicked: {e}")),
        };
        results[index] = Some(outcome);
    }
}
