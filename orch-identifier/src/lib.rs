#![deny(missing_docs)]
//! Task identifier (C8): classifies a free-form request into a
//! [`TaskType`] by prompting a [`Reasoner`], then normalizes the raw
//! JSON answer into a [`TaskIdentificationResult`] — pure functions
//! over the parsed object, independently testable with canned JSON
//! strings.
//!
//! Grounded on `app/services/task_identification.py`: same prompt
//! shape (context + URLs + tags, a listed `TaskType` menu, a JSON
//! schema describing `task_type`/`confidence`/`reasoning`/
//! `alternative_types`/`input`/`output`), same normalization rule
//! (`value.upper().replace("-", "_")` matched against enum members) and
//! the same `AddToKnowledgeBase`/confidence-0.5 safe default when
//! nothing can be determined at all.

use std::fmt::Write as _;

use orch_proto::model::{TaskIdentificationResult, TaskType};
use orch_proto::reasoner::{ReasonJson, Reasoner};
use serde_json::{Map, Value};

const CALLER_TAG: &str = "task_identifier";

/// Classifies free-form context into a [`TaskIdentificationResult`].
pub struct TaskIdentifier<R: Reasoner + ?Sized> {
    reasoner: std::sync::Arc<R>,
}

impl<R: Reasoner + ?Sized> TaskIdentifier<R> {
    /// Build an identifier backed by `reasoner`.
    pub fn new(reasoner: std::sync::Arc<R>) -> Self {
        Self { reasoner }
    }

    /// Classify `user_context`, optionally enriched with `urls`/`tags`
    /// pulled from `context_metadata`.
    pub async fn identify(
        &self,
        user_context: &str,
        context_metadata: Option<&Map<String, Value>>,
    ) -> TaskIdentificationResult {
        let prompt = build_prompt(user_context, context_metadata);
        let response = self.reasoner.reason_json(&prompt, None, Some(CALLER_TAG)).await;
        match response {
            ReasonJson::Parsed(object) => normalize_result(&object),
            ReasonJson::Unparsed { .. } => {
                tracing::warn!("task identifier could not parse a JSON object from the reasoner's answer");
                safe_default_result()
            }
        }
    }
}

fn build_prompt(user_context: &str, context_metadata: Option<&Map<String, Value>>) -> String {
    let mut context_info = user_context.to_string();
    if let Some(metadata) = context_metadata {
        if let Some(urls) = metadata.get("urls").and_then(Value::as_array) {
            if !urls.is_empty() {
                let joined = urls
                    .iter()
                    .map(value_to_display)
                    .collect::<Vec<_>>()
                    .join(", ");
                let _ = write!(context_info, "\n\nURLs: {joined}");
            }
        }
        if let Some(tags) = metadata.get("tags").and_then(Value::as_array) {
            if !tags.is_empty() {
                let joined = tags
                    .iter()
                    .map(value_to_display)
                    .collect::<Vec<_>>()
                    .join(", ");
                let _ = write!(context_info, "\n\nTags: {joined}");
            }
        }
    }

    let task_types_list = TaskType::built_in()
        .iter()
        .map(|t| format!("- {}", t.as_wire_name()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are a task identification expert. Analyze the following user context \
         and map it to the most appropriate TaskType.\n\n\
         User Context:\n{context_info}\n\n\
         Your task is to:\n\
         1. Select exactly one TaskType from the list below\n\
         2. Provide a confidence score (0.0 to 1.0)\n\
         3. Explain why the task type fits the context\n\
         4. Provide up to 3 alternative TaskTypes (lower confidence) if applicable\n\
         5. Identify the input parameters required for this task\n\
         6. Identify the output structure expected from this task\n\n\
         TaskType list:\n{task_types_list}\n\n\
         Return your analysis as a JSON object with this exact structure:\n\
         {{\n  \"task_type\": \"one-task-type-from-list\",\n  \"confidence\": 0.0,\n  \
         \"reasoning\": \"brief explanation\",\n  \"alternative_types\": [\"type1\", \"type2\"],\n  \
         \"input\": {{}},\n  \"output\": {{}}\n}}"
    )
}

fn value_to_display(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Match `raw` against the built-in variants case/separator-insensitively
/// (`value.upper().replace("-", "_")` in the original); an unmatched but
/// present string is kept as [`TaskType::Custom`] rather than discarded.
pub fn normalize_task_type(raw: Option<&str>) -> TaskType {
    let raw = match raw.map(str::trim) {
        Some(s) if !s.is_empty() => s,
        _ => return TaskType::safe_default(),
    };
    let normalized = raw.to_lowercase().replace(['_', ' '], "-");
    for candidate in TaskType::built_in() {
        if candidate.as_wire_name() == normalized {
            return candidate.clone();
        }
    }
    TaskType::Custom(raw.to_string())
}

fn parse_alternatives(object: &Map<String, Value>, primary: &TaskType) -> Vec<TaskType> {
    let Some(values) = object.get("alternative_types").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut alternatives = Vec::new();
    for value in values {
        let Some(s) = value.as_str() else { continue };
        let parsed = normalize_task_type(Some(s));
        if &parsed != primary && !alternatives.contains(&parsed) {
            alternatives.push(parsed);
        }
        if alternatives.len() == 3 {
            break;
        }
    }
    alternatives
}

fn parse_confidence(object: &Map<String, Value>) -> f32 {
    object
        .get("confidence")
        .and_then(Value::as_f64)
        .map(|c| c.clamp(0.0, 1.0) as f32)
        .unwrap_or(0.5)
}

fn parse_object_field(object: &Map<String, Value>, key: &str) -> Map<String, Value> {
    match object.get(key) {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    }
}

fn normalize_result(object: &Map<String, Value>) -> TaskIdentificationResult {
    let task_type = normalize_task_type(object.get("task_type").and_then(Value::as_str));
    let alternatives = parse_alternatives(object, &task_type);
    let confidence = parse_confidence(object);
    let reasoning = object
        .get("reasoning")
        .and_then(Value::as_str)
        .unwrap_or("Task type analysis")
        .to_string();

    TaskIdentificationResult {
        task_type,
        confidence,
        reasoning,
        alternatives,
        input: parse_object_field(object, "input"),
        output: parse_object_field(object, "output"),
    }
}

fn safe_default_result() -> TaskIdentificationResult {
    TaskIdentificationResult {
        task_type: TaskType::safe_default(),
        confidence: 0.5,
        reasoning: "Unable to determine task type from context".to_string(),
        alternatives: Vec::new(),
        input: Map::new(),
        output: Map::new(),
    }
}
