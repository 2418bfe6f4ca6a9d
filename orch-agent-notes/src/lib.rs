#![deny(missing_docs)]
//! Note-taking agent (C10): a three-phase pipeline over the reasoner
//! and the `notes` tool server — search for an existing
//! page, append to it if found, otherwise create a new one. The
//! reasoner's job at every phase is narrow: produce the API payload
//! for that phase, nothing else. Payload parsing/validation lives here
//! as plain functions so they're testable without a live reasoner;
//! `execute` just sequences the three phases.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use orch_proto::agent::{AgentContext, AgentResult};
use orch_proto::base::AgentBase;
use orch_proto::context::ContextStore;
use orch_proto::embed::Embedder;
use orch_proto::error::AgentError;
use orch_proto::json_extract::extract_first_json_object;
use orch_proto::reasoner::Reasoner;
use orch_proto::tool::ToolServerHandle;
use orch_proto::Agent;
use orch_registry::AgentBuildArgs;
use serde_json::{Map, Value};

const CALLER_TAG: &str = "note_taking";

fn parse_json_object(text: &str) -> Result<Map<String, Value>, String> {
    let span = extract_first_json_object(text).ok_or("no JSON object found in the reasoner's response")?;
    serde_json::from_str::<Value>(span)
        .ok()
        .and_then(|v| v.as_object().cloned())
        .ok_or_else(|| "the JSON found was not an object".to_string())
}

fn required_str(object: &Map<String, Value>, key: &str) -> Option<String> {
    object.get(key).and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

/// Build the prompt asking the reasoner for a search payload (spec
/// §4.10 phase 1).
fn build_search_prompt(raw_text: &str) -> String {
    format!(
        "A user wants to save the following note content to their notes \
         workspace. Decide what search query would find an existing page \
         this content belongs on.\n\n\
         Content:\n{raw_text}\n\n\
         Reply with a JSON object with this exact structure, nothing else:\n\
         {{\n  \"query\": \"search terms\",\n  \"filter\": null,\n  \"sort\": null,\n  \
         \"page_size\": 5,\n  \"start_cursor\": null\n}}"
    )
}

/// Validated search payload: `query` is the only
/// required field, everything else passes through to the tool call
/// unmodified (including `null`s, which the tool server itself treats
/// as "unset").
struct SearchPayload {
    query: String,
    filter: Option<Value>,
    sort: Option<Value>,
    page_size: Option<Value>,
    start_cursor: Option<Value>,
}

fn parse_search_payload(object: &Map<String, Value>) -> Result<SearchPayload, String> {
    let query = required_str(object, "query").ok_or("search payload is missing a non-empty \"query\"")?;
    Ok(SearchPayload {
        query,
        filter: object.get("filter").cloned(),
        sort: object.get("sort").cloned(),
        page_size: object.get("page_size").cloned(),
        start_cursor: object.get("start_cursor").cloned(),
    })
}

fn search_call_params(payload: SearchPayload) -> Value {
    let mut params = Map::new();
    params.insert("query".to_string(), Value::String(payload.query));
    params.insert("filter".to_string(), payload.filter.unwrap_or(Value::Null));
    params.insert("sort".to_string(), payload.sort.unwrap_or(Value::Null));
    params.insert("page_size".to_string(), payload.page_size.unwrap_or(Value::Null));
    params.insert("start_cursor".to_string(), payload.start_cursor.unwrap_or(Value::Null));
    Value::Object(params)
}

/// First search result, if the response was a non-empty array of pages.
fn first_page(search_response: &Value) -> Option<&Value> {
    search_response.as_array().and_then(|pages| pages.first())
}

fn build_append_prompt(raw_text: &str, page_id: &str, page_title: Option<&str>) -> String {
    let title_line = page_title.map(|t| format!("Existing page title: {t}\n")).unwrap_or_default();
    format!(
        "The following note content belongs on an existing page (id \"{page_id}\").\n\
         {title_line}\
         Turn it into a list of blocks to append, using this taxonomy: \
         paragraph, heading_1, heading_2, to_do (with checked), \
         bulleted_list_item, numbered_list_item, quote, code (with \
         language), divider.\n\n\
         Content:\n{raw_text}\n\n\
         Reply with a JSON object with this exact structure, nothing else:\n\
         {{\n  \"page_id\": \"{page_id}\",\n  \"blocks\": [ {{\"type\": \"paragraph\", \"text\": \"...\"}} ],\n  \"position\": null\n}}"
    )
}

/// Validated append payload. `page_id` is always
/// pinned to the page this agent already found rather than trusted
/// from the reasoner's echo, so a reasoner that garbles or omits it
/// can't redirect the append to the wrong page.
struct AppendPayload {
    blocks: Vec<Value>,
    position: Option<Value>,
}

fn parse_append_payload(object: &Map<String, Value>) -> Result<AppendPayload, String> {
    let blocks = match object.get("blocks") {
        Some(Value::Array(items)) if !items.is_empty() => items.clone(),
        Some(Value::Array(_)) => return Err("append payload's \"blocks\" array is empty".to_string()),
        _ => return Err("append payload is missing a \"blocks\" array".to_string()),
    };
    Ok(AppendPayload {
        blocks,
        position: object.get("position").cloned(),
    })
}

fn append_call_params(page_id: &str, payload: AppendPayload) -> Value {
    let mut params = Map::new();
    params.insert("page_id".to_string(), Value::String(page_id.to_string()));
    params.insert("blocks".to_string(), Value::Array(payload.blocks));
    params.insert("position".to_string(), payload.position.unwrap_or(Value::Null));
    Value::Object(params)
}

fn build_create_prompt(raw_text: &str) -> String {
    format!(
        "No existing page matched this note content, so create a new one. \
         Decide a concise title and the initial blocks (taxonomy: \
         paragraph, heading_1, heading_2, to_do, bulleted_list_item, \
         numbered_list_item, quote, code, divider).\n\n\
         Content:\n{raw_text}\n\n\
         Reply with a JSON object with this exact structure, nothing else:\n\
         {{\n  \"parent_page_id\": null,\n  \"title\": \"...\",\n  \"children\": [ {{\"type\": \"paragraph\", \"text\": \"...\"}} ]\n}}"
    )
}

/// Validated create payload: `title` is the only
/// required field.
struct CreatePayload {
    parent_page_id: Option<Value>,
    title: String,
    children: Vec<Value>,
}

fn parse_create_payload(object: &Map<String, Value>) -> Result<CreatePayload, String> {
    let title = required_str(object, "title").ok_or("create payload is missing a non-empty \"title\"")?;
    let children = match object.get("children") {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    };
    Ok(CreatePayload {
        parent_page_id: object.get("parent_page_id").cloned(),
        title,
        children,
    })
}

fn create_call_params(payload: CreatePayload) -> Value {
    let mut params = Map::new();
    params.insert("parent_page_id".to_string(), payload.parent_page_id.unwrap_or(Value::Null));
    params.insert("title".to_string(), Value::String(payload.title));
    params.insert("children".to_string(), Value::Array(payload.children));
    Value::Object(params)
}

/// Turns reasoner-produced payloads into `svc.notes.*` calls across
/// the search → append-or-create pipeline.
pub struct NoteTakingAgent {
    reasoner: Arc<dyn Reasoner>,
    tool_servers: HashMap<String, Arc<dyn ToolServerHandle>>,
    embedder: Option<Arc<dyn Embedder>>,
    context_store: Option<Arc<dyn ContextStore>>,
}

impl NoteTakingAgent {
    /// Build an agent around a reasoner and this execution's composed
    /// tool servers.
    pub fn new(reasoner: Arc<dyn Reasoner>, tool_servers: HashMap<String, Arc<dyn ToolServerHandle>>) -> Self {
        Self {
            reasoner,
            tool_servers,
            embedder: None,
            context_store: None,
        }
    }

    /// Adapter matching [`orch_registry::AgentFactory`]'s signature, for
    /// registration under the `"note_taking"` loadable class name.
    pub fn factory(args: AgentBuildArgs) -> Arc<dyn Agent> {
        Arc::new(Self {
            reasoner: args.reasoner,
            tool_servers: args.tool_servers,
            embedder: args.embedder,
            context_store: args.context_store,
        })
    }

    fn notes_server(&self) -> Result<&Arc<dyn ToolServerHandle>, AgentError> {
        self.tool_servers
            .get("notes")
            .ok_or_else(|| AgentError::InvalidInput("note-taking requires a \"notes\" tool server".to_string()))
    }

    async fn ask_json(&self, base: &AgentBase, prompt: &str) -> Result<Map<String, Value>, String> {
        let response = base.reason(prompt, None, None).await;
        let Some(text) = response.text else {
            return Err(response.error.unwrap_or_else(|| "reasoner returned no text".to_string()));
        };
        parse_json_object(&text)
    }
}

fn content_preview(raw_text: &str) -> String {
    const MAX: usize = 200;
    if raw_text.chars().count() <= MAX {
        raw_text.to_string()
    } else {
        format!("{}…", raw_text.chars().take(MAX).collect::<String>())
    }
}

#[async_trait]
impl Agent for NoteTakingAgent {
    async fn execute(&self, _task_input: Map<String, Value>, context: AgentContext) -> Result<AgentResult, AgentError> {
        let notes = self.notes_server()?;
        let raw_text = context.raw_text.as_str();
        let base = AgentBase::new(
            CALLER_TAG,
            self.reasoner.clone(),
            self.tool_servers.clone(),
            self.embedder.clone(),
            self.context_store.clone(),
            context.user_id.clone(),
        );

        // Phase 1: search.
        let search_object = match self.ask_json(&base, &build_search_prompt(raw_text)).await {
            Ok(object) => object,
            Err(e) => return Ok(AgentResult::failed(format!("search payload: {e}"))),
        };
        let search_payload = match parse_search_payload(&search_object) {
            Ok(payload) => payload,
            Err(e) => return Ok(AgentResult::failed(e)),
        };
        let search_response = notes.call("search", search_call_params(search_payload)).await?;
        let found = first_page(&search_response).cloned();

        match found {
            Some(page) => {
                // Phase 2: append to the page we found.
                let page_id = match page.get("page_id").and_then(Value::as_str) {
                    Some(id) => id.to_string(),
                    None => return Ok(AgentResult::failed("search result was missing \"page_id\"")),
                };
                let page_title = page.get("title_plain").and_then(Value::as_str);
                let append_object = match self.ask_json(&base, &build_append_prompt(raw_text, &page_id, page_title)).await {
                    Ok(object) => object,
                    Err(e) => return Ok(AgentResult::failed(format!("append payload: {e}"))),
                };
                let append_payload = match parse_append_payload(&append_object) {
                    Ok(payload) => payload,
                    Err(e) => return Ok(AgentResult::failed(e)),
                };
                let appended = notes.call("append_blocks", append_call_params(&page_id, append_payload)).await?;

                let mut result = Map::new();
                result.insert("page_id".to_string(), Value::String(page_id));
                result.insert("url".to_string(), appended.get("url").cloned().unwrap_or(Value::Null));
                result.insert("summary".to_string(), Value::String("appended to existing page".to_string()));
                result.insert("content_preview".to_string(), Value::String(content_preview(raw_text)));
                Ok(AgentResult::completed(result))
            }
            None => {
                // Phase 3: no match, create a new page.
                let create_object = match self.ask_json(&base, &build_create_prompt(raw_text)).await {
                    Ok(object) => object,
                    Err(e) => return Ok(AgentResult::failed(format!("create payload: {e}"))),
                };
                let create_payload = match parse_create_payload(&create_object) {
                    Ok(payload) => payload,
                    Err(e) => return Ok(AgentResult::failed(e)),
                };
                let title = create_payload.title.clone();
                let created = notes.call("create_page", create_call_params(create_payload)).await?;

                let page_id = created.get("page_id").and_then(Value::as_str).unwrap_or_default().to_string();
                if page_id.is_empty() {
                    return Ok(AgentResult::failed("notes create_page returned no page_id"));
                }

                let mut result = Map::new();
                result.insert("page_id".to_string(), Value::String(page_id));
                result.insert("url".to_string(), created.get("url").cloned().unwrap_or(Value::Null));
                result.insert("title".to_string(), Value::String(title));
                Ok(AgentResult::completed(result))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orch_proto::error::ToolError;
    use orch_proto::id::UserId;
    use orch_proto::model::{AgentResultStatus, TaskIdentificationResult, TaskType};
    use orch_proto::reasoner::ReasonResponse;
    use orch_reasoner::MockReasoner;
    use tokio::sync::Mutex as AsyncMutex;

    #[test]
    fn search_payload_requires_non_empty_query() {
        let mut object = Map::new();
        object.insert("query".to_string(), Value::String("  ".to_string()));
        assert!(parse_search_payload(&object).is_err());
    }

    #[test]
    fn append_payload_requires_non_empty_blocks() {
        let object = Map::new();
        assert!(parse_append_payload(&object).is_err());

        let mut with_empty = Map::new();
        with_empty.insert("blocks".to_string(), Value::Array(vec![]));
        assert!(parse_append_payload(&with_empty).is_err());
    }

    #[test]
    fn create_payload_defaults_children_to_empty() {
        let mut object = Map::new();
        object.insert("title".to_string(), Value::String("New Page".to_string()));
        let payload = parse_create_payload(&object).unwrap();
        assert_eq!(payload.title, "New Page");
        assert!(payload.children.is_empty());
    }

    #[test]
    fn first_page_picks_the_first_array_entry() {
        let pages = serde_json::json!([{"page_id": "p1"}, {"page_id": "p2"}]);
        assert_eq!(first_page(&pages).unwrap()["page_id"], "p1");
        assert!(first_page(&serde_json::json!([])).is_none());
    }

    #[test]
    fn content_preview_truncates_long_text() {
        let long = "x".repeat(250);
        let preview = content_preview(&long);
        assert!(preview.ends_with('…'));
        assert_eq!(preview.chars().count(), 201);
        assert_eq!(content_preview("short"), "short");
    }

    struct RecordingNotes {
        search_result: Value,
        append_result: Value,
        create_result: Value,
        calls: AsyncMutex<Vec<(String, Value)>>,
    }

    #[async_trait]
    impl ToolServerHandle for RecordingNotes {
        fn server_name(&self) -> &str {
            "notes"
        }
        fn tool_names(&self) -> Vec<String> {
            vec!["search".to_string(), "append_blocks".to_string(), "create_page".to_string()]
        }
        async fn call(&self, tool_name: &str, params: Value) -> Result<Value, ToolError> {
            self.calls.lock().await.push((tool_name.to_string(), params));
            Ok(match tool_name {
                "search" => self.search_result.clone(),
                "append_blocks" => self.append_result.clone(),
                "create_page" => self.create_result.clone(),
                other => return Err(ToolError::NotFound(other.to_string())),
            })
        }
    }

    fn test_context(raw_text: &str) -> AgentContext {
        AgentContext::new(
            raw_text,
            TaskIdentificationResult {
                task_type: TaskType::NoteTaking,
                confidence: 0.9,
                reasoning: "x".to_string(),
                alternatives: vec![],
                input: Map::new(),
                output: Map::new(),
            },
            UserId::new("u1"),
            vec![],
        )
    }

    fn servers(notes: Arc<RecordingNotes>) -> HashMap<String, Arc<dyn ToolServerHandle>> {
        let mut map: HashMap<String, Arc<dyn ToolServerHandle>> = HashMap::new();
        map.insert("notes".to_string(), notes);
        map
    }

    #[tokio::test]
    async fn appends_to_an_existing_page_when_search_finds_one() {
        let reasoner = Arc::new(MockReasoner::new(vec![
            ReasonResponse::text_only(r#"{"query": "Amazon Aurora"}"#),
            ReasonResponse::text_only(r#"{"page_id": "p1", "blocks": [{"type": "paragraph", "text": "x"}]}"#),
        ]));
        let notes = Arc::new(RecordingNotes {
            search_result: serde_json::json!([{"page_id": "p1", "url": "https://notes/p1", "title_plain": "Amazon Aurora - Browser Flow"}]),
            append_result: serde_json::json!({"page_id": "p1", "url": "https://notes/p1"}),
            create_result: Value::Null,
            calls: AsyncMutex::new(Vec::new()),
        });
        let agent = NoteTakingAgent::new(reasoner, servers(notes.clone()));

        let result = agent.execute(Map::new(), test_context("Amazon Aurora is a relational database.")).await.unwrap();

        assert_eq!(result.status, AgentResultStatus::Completed);
        assert_eq!(result.result["page_id"], "p1");
        assert_eq!(result.result["url"], "https://notes/p1");

        let calls = notes.calls.lock().await;
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, "search");
        assert_eq!(calls[1].0, "append_blocks");
        assert_eq!(calls[1].1["page_id"], "p1");
    }

    #[tokio::test]
    async fn creates_a_new_page_when_search_finds_nothing() {
        let reasoner = Arc::new(MockReasoner::new(vec![
            ReasonResponse::text_only(r#"{"query": "standalone topic"}"#),
            ReasonResponse::text_only(r#"{"title": "Standalone Topic", "children": [{"type": "paragraph", "text": "x"}]}"#),
        ]));
        let notes = Arc::new(RecordingNotes {
            search_result: serde_json::json!([]),
            append_result: Value::Null,
            create_result: serde_json::json!({"page_id": "new-1", "url": "https://notes/new-1"}),
            calls: AsyncMutex::new(Vec::new()),
        });
        let agent = NoteTakingAgent::new(reasoner, servers(notes.clone()));

        let result = agent.execute(Map::new(), test_context("Some standalone research note.")).await.unwrap();

        assert_eq!(result.status, AgentResultStatus::Completed);
        assert_eq!(result.result["page_id"], "new-1");
        assert_eq!(result.result["title"], "Standalone Topic");

        let calls = notes.calls.lock().await;
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, "search");
        assert_eq!(calls[1].0, "create_page");
    }

    #[tokio::test]
    async fn unparseable_search_payload_yields_failed_not_an_error() {
        let reasoner = Arc::new(MockReasoner::always("I'm not sure what to search for."));
        let notes = Arc::new(RecordingNotes {
            search_result: Value::Null,
            append_result: Value::Null,
            create_result: Value::Null,
            calls: AsyncMutex::new(Vec::new()),
        });
        let agent = NoteTakingAgent::new(reasoner, servers(notes));
        let result = agent.execute(Map::new(), test_context("hi")).await.unwrap();
        assert_eq!(result.status, AgentResultStatus::Failed);
        assert!(result.error.unwrap().contains("search payload"));
    }

    #[tokio::test]
    async fn missing_notes_tool_server_is_a_hard_error_not_a_failed_result() {
        let reasoner = Arc::new(MockReasoner::always("{}"));
        let agent = NoteTakingAgent::new(reasoner, HashMap::new());
        let result = agent.execute(Map::new(), test_context("hi")).await;
        assert!(matches!(result, Err(AgentError::InvalidInput(_))));
    }
}
