//! `AgentBase`: the four helper operations every agent's base class
//! provides — `reason`, `use_tool`, `evaluate`, and `retrieve_knowledge`.
//! Mirrors `layer0`'s choice to keep `Operator`
//! itself a one-method trait (object safety, no inheritance) and push
//! shared behaviour into a plain composable struct an implementation
//! holds a field of, rather than a default trait method — there is no
//! base-class mechanism to reuse in Rust, so a struct plays that role.
//!
//! An agent that wants none of these four (most don't need `use_tool`
//! or `retrieve_knowledge`) simply never constructs one; nothing in
//! [`crate::Agent`] requires it.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::context::{ContextStore, SimilarityHit};
use crate::embed::Embedder;
use crate::error::ToolError;
use crate::id::UserId;
use crate::reasoner::{ReasonResponse, Reasoner};
use crate::tool::ToolServerHandle;

/// One required-field expectation for [`AgentBase::evaluate`]: the
/// field must be present, and if `type_name` is set its JSON type must
/// match (`"string"`, `"number"`, `"boolean"`, `"array"`, `"object"`,
/// or `"null"` — see [`value_type_name`]).
#[derive(Debug, Clone)]
pub struct FieldExpectation {
    /// The key that must be present in the result map.
    pub name: String,
    /// Expected JSON type name, if type-checked.
    pub type_name: Option<&'static str>,
}

/// A custom validation rule for [`AgentBase::evaluate`]: given the
/// result map, return `Some(message)` on failure. Spec §4.7 calls
/// these "custom rule callables".
pub type EvaluationRule = Arc<dyn Fn(&Map<String, Value>) -> Option<String> + Send + Sync>;

/// Declarative expectations an agent hands to [`AgentBase::evaluate`].
#[derive(Clone, Default)]
pub struct EvaluationSpec {
    /// Fields that must be present (and optionally type-checked).
    pub required_fields: Vec<FieldExpectation>,
    /// Additional rule callables run against the whole result map.
    pub rules: Vec<EvaluationRule>,
}

impl EvaluationSpec {
    /// Build a spec requiring every name in `fields` to be present,
    /// with no type check and no custom rules — the common case.
    pub fn requiring(fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            required_fields: fields
                .into_iter()
                .map(|name| FieldExpectation {
                    name: name.into(),
                    type_name: None,
                })
                .collect(),
            rules: Vec::new(),
        }
    }

    /// Attach an expected JSON type name to the most recently added
    /// required field.
    pub fn with_last_type(mut self, type_name: &'static str) -> Self {
        if let Some(last) = self.required_fields.last_mut() {
            last.type_name = Some(type_name);
        }
        self
    }

    /// Attach a custom rule callable.
    pub fn with_rule(mut self, rule: EvaluationRule) -> Self {
        self.rules.push(rule);
        self
    }
}

/// The JSON type name a value reports to [`AgentBase::evaluate`].
pub fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn split_qualified(name: &str) -> Option<(&str, &str)> {
    let mut parts = name.splitn(3, '.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("svc"), Some(server), Some(tool)) => Some((server, tool)),
        _ => None,
    }
}

/// Shared helper operations every agent execution gets from its base
/// class. Construct one per execution from
/// an [`crate::agent::AgentContext`]/`AgentBuildArgs`-shaped bundle of
/// services; every field is exactly what `orch-registry::AgentBuildArgs`
/// already hands the spawner.
pub struct AgentBase {
    reasoner: Arc<dyn Reasoner>,
    tool_servers: HashMap<String, Arc<dyn ToolServerHandle>>,
    embedder: Option<Arc<dyn Embedder>>,
    context_store: Option<Arc<dyn ContextStore>>,
    user_id: UserId,
    caller_tag: String,
}

impl AgentBase {
    /// Build a base over this execution's reasoner, composed tool
    /// surface, and optional shared RAG services. `caller_tag` is
    /// usually the agent's own class/type name.
    pub fn new(
        caller_tag: impl Into<String>,
        reasoner: Arc<dyn Reasoner>,
        tool_servers: HashMap<String, Arc<dyn ToolServerHandle>>,
        embedder: Option<Arc<dyn Embedder>>,
        context_store: Option<Arc<dyn ContextStore>>,
        user_id: UserId,
    ) -> Self {
        Self {
            reasoner,
            tool_servers,
            embedder,
            context_store,
            user_id,
            caller_tag: caller_tag.into(),
        }
    }

    /// Thin wrapper over [`Reasoner::reason`] that always tags the call
    /// with this base's `caller_tag`.
    pub async fn reason(
        &self,
        prompt: &str,
        context_map: Option<&Map<String, Value>>,
        tools: Option<&[String]>,
    ) -> ReasonResponse {
        let servers = if self.tool_servers.is_empty() {
            None
        } else {
            Some(&self.tool_servers)
        };
        self.reasoner
            .reason(prompt, context_map, tools, servers, Some(&self.caller_tag))
            .await
    }

    /// Direct tool dispatch by qualified name (`svc.<server>.<tool>`),
    /// bypassing the reasoner.
    pub async fn use_tool(&self, qualified_name: &str, params: Value) -> Result<Value, ToolError> {
        let (server_name, tool_name) =
            split_qualified(qualified_name).ok_or_else(|| ToolError::NotFound(qualified_name.to_string()))?;
        let server = self
            .tool_servers
            .get(server_name)
            .ok_or_else(|| ToolError::NotFound(qualified_name.to_string()))?;
        server.call(tool_name, params).await
    }

    /// Structural validation of `result` against `expected`: a missing required field is an
    /// error, a present field whose type doesn't match is a warning, and
    /// every custom rule that returns `Some(message)` is an error. With
    /// no `expected` spec, everything trivially passes with score `1.0`.
    pub fn evaluate(
        &self,
        result: &Map<String, Value>,
        expected: Option<&EvaluationSpec>,
    ) -> crate::agent::EvaluationResult {
        let Some(expected) = expected else {
            return crate::agent::EvaluationResult {
                passed: true,
                score: 1.0,
                errors: Vec::new(),
                warnings: Vec::new(),
            };
        };

        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        for field in &expected.required_fields {
            match result.get(&field.name) {
                None => errors.push(format!("required field \"{}\" is missing", field.name)),
                Some(value) => {
                    if let Some(expected_type) = field.type_name {
                        let actual_type = value_type_name(value);
                        if actual_type != expected_type {
                            warnings.push(format!(
                                "field \"{}\" expected type {expected_type}, got {actual_type}",
                                field.name
                            ));
                        }
                    }
                }
            }
        }

        for rule in &expected.rules {
            if let Some(message) = rule(result) {
                errors.push(message);
            }
        }

        let denom = (expected.required_fields.len() + expected.rules.len()).max(1) as f32;
        let score = (1.0 - errors.len() as f32 / denom).max(0.0);

        crate::agent::EvaluationResult {
            passed: errors.is_empty(),
            score,
            errors,
            warnings,
        }
    }

    /// RAG helper delegating to the embedding client and context store
    ///. Yields nothing —
    /// rather than erroring — when either service wasn't wired in for
    /// this execution, or when `query` fails to embed.
    pub async fn retrieve_knowledge(&self, query: &str, k: usize) -> Vec<SimilarityHit> {
        let (Some(embedder), Some(store)) = (&self.embedder, &self.context_store) else {
            return Vec::new();
        };
        let Ok(Some(vector)) = embedder.embed(query).await else {
            return Vec::new();
        };
        store
            .similarity_search(&vector, k, Some(&self.user_id))
            .await
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EmbedError, ReasonError};
    use async_trait::async_trait;

    struct EchoReasoner;

    #[async_trait]
    impl Reasoner for EchoReasoner {
        async fn reason(
            &self,
            prompt: &str,
            _context_map: Option<&Map<String, Value>>,
            _tools: Option<&[String]>,
            _tool_servers: Option<&HashMap<String, Arc<dyn ToolServerHandle>>>,
            caller_tag: Option<&str>,
        ) -> ReasonResponse {
            ReasonResponse::text_only(format!("{}:{prompt}", caller_tag.unwrap_or("?")))
        }
    }

    struct EchoTool;

    #[async_trait]
    impl ToolServerHandle for EchoTool {
        fn server_name(&self) -> &str {
            "echo"
        }
        fn tool_names(&self) -> Vec<String> {
            vec!["say".to_string()]
        }
        async fn call(&self, tool_name: &str, params: Value) -> Result<Value, ToolError> {
            assert_eq!(tool_name, "say");
            Ok(params)
        }
    }

    struct NullEmbedder;

    #[async_trait]
    impl Embedder for NullEmbedder {
        async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>, EmbedError> {
            if text.is_empty() {
                Ok(None)
            } else {
                Ok(Some(vec![1.0, 0.0]))
            }
        }
        fn dimension(&self) -> usize {
            2
        }
    }

    struct StubStore {
        hits: Vec<SimilarityHit>,
    }

    #[async_trait]
    impl ContextStore for StubStore {
        async fn create_batch(
            &self,
            _drafts: Vec<crate::context::NewContext>,
        ) -> Vec<Result<crate::model::ContextRecord, crate::error::ContextError>> {
            Vec::new()
        }
        async fn fetch(
            &self,
            _id: &crate::id::ContextId,
        ) -> Result<Option<crate::model::ContextRecord>, crate::error::ContextError> {
            Ok(None)
        }
        async fn fetch_many(
            &self,
            _ids: &[crate::id::ContextId],
        ) -> Result<Vec<crate::model::ContextRecord>, crate::error::ContextError> {
            Ok(Vec::new())
        }
        async fn fetch_by_user(
            &self,
            _user_id: &UserId,
        ) -> Result<Vec<crate::model::ContextRecord>, crate::error::ContextError> {
            Ok(Vec::new())
        }
        async fn similarity_search(
            &self,
            _query: &[f32],
            _k: usize,
            _user_id: Option<&UserId>,
        ) -> Result<Vec<SimilarityHit>, crate::error::ContextError> {
            Ok(self.hits.clone())
        }
    }

    fn base(tool_servers: HashMap<String, Arc<dyn ToolServerHandle>>) -> AgentBase {
        AgentBase::new(
            "test_agent",
            Arc::new(EchoReasoner),
            tool_servers,
            None,
            None,
            UserId::new("u1"),
        )
    }

    #[tokio::test]
    async fn reason_tags_the_call_with_caller_tag() {
        let result = base(HashMap::new()).reason("hello", None, None).await;
        assert_eq!(result.text.as_deref(), Some("test_agent:hello"));
    }

    #[tokio::test]
    async fn use_tool_dispatches_by_qualified_name() {
        let mut servers: HashMap<String, Arc<dyn ToolServerHandle>> = HashMap::new();
        servers.insert("echo".to_string(), Arc::new(EchoTool));
        let result = base(servers)
            .use_tool("svc.echo.say", serde_json::json!({"x": 1}))
            .await
            .unwrap();
        assert_eq!(result, serde_json::json!({"x": 1}));
    }

    #[tokio::test]
    async fn use_tool_unknown_server_is_not_found() {
        let result = base(HashMap::new()).use_tool("svc.missing.say", Value::Null).await;
        assert!(matches!(result, Err(ToolError::NotFound(_))));
    }

    #[test]
    fn evaluate_with_no_spec_always_passes() {
        let base = base(HashMap::new());
        let evaluation = base.evaluate(&Map::new(), None);
        assert!(evaluation.passed);
        assert_eq!(evaluation.score, 1.0);
    }

    #[test]
    fn evaluate_flags_missing_required_field_and_type_mismatch() {
        let base = base(HashMap::new());
        let mut result = Map::new();
        result.insert("name".to_string(), Value::from(42));
        let mut spec = EvaluationSpec::requiring(["name"]).with_last_type("string");
        spec.required_fields.push(FieldExpectation {
            name: "role".to_string(),
            type_name: None,
        });
        let evaluation = base.evaluate(&result, Some(&spec));
        assert!(!evaluation.passed);
        assert_eq!(evaluation.errors.len(), 1);
        assert!(evaluation.errors[0].contains("role"));
        assert_eq!(evaluation.warnings.len(), 1);
        assert!(evaluation.warnings[0].contains("name"));
    }

    #[test]
    fn evaluate_runs_custom_rules() {
        let base = base(HashMap::new());
        let mut result = Map::new();
        result.insert("count".to_string(), Value::from(-1));
        let spec = EvaluationSpec::default().with_rule(Arc::new(|r: &Map<String, Value>| {
            if r.get("count").and_then(Value::as_i64).unwrap_or(0) < 0 {
                Some("count must not be negative".to_string())
            } else {
                None
            }
        }));
        let evaluation = base.evaluate(&result, Some(&spec));
        assert!(!evaluation.passed);
        assert_eq!(evaluation.errors, vec!["count must not be negative".to_string()]);
    }

    #[tokio::test]
    async fn retrieve_knowledge_yields_nothing_without_wired_services() {
        let base = base(HashMap::new());
        assert!(base.retrieve_knowledge("anything", 5).await.is_empty());
    }

    #[tokio::test]
    async fn retrieve_knowledge_delegates_to_embedder_and_store() {
        let hit_context = crate::model::ContextRecord::new(
            UserId::new("u1"),
            "about aurora",
            crate::model::ContextKind::Text,
            chrono::Utc::now(),
        );
        let base = AgentBase::new(
            "test_agent",
            Arc::new(EchoReasoner),
            HashMap::new(),
            Some(Arc::new(NullEmbedder)),
            Some(Arc::new(StubStore {
                hits: vec![SimilarityHit {
                    context: hit_context,
                    similarity: 0.9,
                }],
            })),
            UserId::new("u1"),
        );
        let hits = base.retrieve_knowledge("aurora", 5).await;
        assert_eq!(hits.len(), 1);
        assert!((hits[0].similarity - 0.9).abs() < 1e-6);
    }
}
