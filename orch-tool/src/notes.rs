//! The built-in `notes` tool server: search / create-page /
//! append-blocks against an external collaborative-notes API. The wire
//! format of that API is out of scope — [`NotesClient`] is
//! the capability boundary; [`HttpNotesClient`] is one concrete
//! implementation, [`MockNotesClient`] a scripted test double.

use std::sync::Arc;

use async_trait::async_trait;
use orch_proto::error::ToolError;
use orch_proto::tool::ToolServerHandle;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Mutex;

/// One block in the taxonomy a notes page can be built from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NoteBlock {
    /// A plain paragraph.
    Paragraph {
        /// Plain text content.
        text: String,
    },
    /// A level-1 heading.
    Heading1 {
        /// Plain text content.
        text: String,
    },
    /// A level-2 heading.
    Heading2 {
        /// Plain text content.
        text: String,
    },
    /// A checkbox item.
    ToDo {
        /// Plain text content.
        text: String,
        /// Whether the box is checked.
        #[serde(default)]
        checked: bool,
    },
    /// One item of a bulleted list.
    BulletedListItem {
        /// Plain text content.
        text: String,
    },
    /// One item of a numbered list.
    NumberedListItem {
        /// Plain text content.
        text: String,
    },
    /// A block quote.
    Quote {
        /// Plain text content.
        text: String,
    },
    /// A fenced code block.
    Code {
        /// Source text.
        text: String,
        /// Language tag.
        language: String,
    },
    /// A horizontal divider. Carries no text.
    Divider,
}

/// Normalised shape every notes API call returns.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotesPage {
    /// Opaque page identifier.
    pub page_id: String,
    /// Browsable URL, if the backend exposes one.
    pub url: Option<String>,
    /// Plain-text rendering of the title, if known.
    pub title_plain: Option<String>,
}

/// Capability boundary for the external notes service.
#[async_trait]
pub trait NotesClient: Send + Sync {
    /// Search for pages matching `query`, most-relevant first.
    async fn search(
        &self,
        query: &str,
        filter: Option<Value>,
        sort: Option<Value>,
        page_size: Option<u32>,
        start_cursor: Option<String>,
    ) -> Result<Vec<NotesPage>, ToolError>;

    /// Append blocks to an existing page.
    async fn append_blocks(
        &self,
        page_id: &str,
        blocks: Vec<NoteBlock>,
        position: Option<String>,
    ) -> Result<NotesPage, ToolError>;

    /// Create a new page, optionally nested under `parent_page_id`.
    async fn create_page(
        &self,
        parent_page_id: Option<String>,
        title: &str,
        children: Vec<NoteBlock>,
    ) -> Result<NotesPage, ToolError>;
}

/// Environment-driven configuration for [`HttpNotesClient`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the notes service.
    pub base_url: String,
    /// Bearer token for the integration.
    pub api_key: Option<String>,
}

impl Config {
    /// Build from `ORCH_TOOL_NOTES_*` environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("ORCH_TOOL_NOTES_BASE_URL").unwrap_or_default(),
            api_key: std::env::var("ORCH_TOOL_NOTES_API_KEY").ok(),
        }
    }
}

/// HTTP-backed [`NotesClient`]. Wire format is a thin, capability-level
/// JSON contract.
pub struct HttpNotesClient {
    client: reqwest::Client,
    config: Config,
}

impl HttpNotesClient {
    /// Build a client from an explicit configuration.
    pub fn new(config: Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn request(&self, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.config.base_url, path);
        let mut req = self.client.post(url);
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key);
        }
        req
    }
}

#[async_trait]
impl NotesClient for HttpNotesClient {
    async fn search(
        &self,
        query: &str,
        filter: Option<Value>,
        sort: Option<Value>,
        page_size: Option<u32>,
        start_cursor: Option<String>,
    ) -> Result<Vec<NotesPage>, ToolError> {
        let body = serde_json::json!({
            "query": query,
            "filter": filter,
            "sort": sort,
            "page_size": page_size,
            "start_cursor": start_cursor,
        });
        let response = self
            .request("/search")
            .json(&body)
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool: "svc.notes.search".to_string(),
                message: e.to_string(),
            })?;
        response
            .json::<Vec<NotesPage>>()
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool: "svc.notes.search".to_string(),
                message: e.to_string(),
            })
    }

    async fn append_blocks(
        &self,
        page_id: &str,
        blocks: Vec<NoteBlock>,
        position: Option<String>,
    ) -> Result<NotesPage, ToolError> {
        let body = serde_json::json!({
            "page_id": page_id,
            "blocks": blocks,
            "position": position,
        });
        let response = self
            .request("/append")
            .json(&body)
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool: "svc.notes.append_blocks".to_string(),
                message: e.to_string(),
            })?;
        response
            .json::<NotesPage>()
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool: "svc.notes.append_blocks".to_string(),
                message: e.to_string(),
            })
    }

    async fn create_page(
        &self,
        parent_page_id: Option<String>,
        title: &str,
        children: Vec<NoteBlock>,
    ) -> Result<NotesPage, ToolError> {
        let body = serde_json::json!({
            "parent_page_id": parent_page_id,
            "title": title,
            "children": children,
        });
        let response = self
            .request("/pages")
            .json(&body)
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool: "svc.notes.create_page".to_string(),
                message: e.to_string(),
            })?;
        response
            .json::<NotesPage>()
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool: "svc.notes.create_page".to_string(),
                message: e.to_string(),
            })
    }
}

/// Scripted [`NotesClient`] for tests, mirroring `orch-reasoner`'s
/// `MockReasoner` shape: canned responses in call order, plus a log.
#[derive(Default)]
pub struct MockNotesClient {
    search_results: Mutex<Vec<Vec<NotesPage>>>,
    create_results: Mutex<Vec<NotesPage>>,
    append_results: Mutex<Vec<NotesPage>>,
    pub(crate) calls: Mutex<Vec<String>>,
}

impl MockNotesClient {
    /// Build a mock with no scripted responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a `search` result.
    pub fn with_search_result(self, pages: Vec<NotesPage>) -> Self {
        self.search_results.lock().unwrap().push(pages);
        self
    }

    /// Queue a `create_page` result.
    pub fn with_create_result(self, page: NotesPage) -> Self {
        self.create_results.lock().unwrap().push(page);
        self
    }
}

#[async_trait]
impl NotesClient for MockNotesClient {
    async fn search(
        &self,
        _query: &str,
        _filter: Option<Value>,
        _sort: Option<Value>,
        _page_size: Option<u32>,
        _start_cursor: Option<String>,
    ) -> Result<Vec<NotesPage>, ToolError> {
        self.calls.lock().unwrap().push("search".to_string());
        Ok(self.search_results.lock().unwrap().pop().unwrap_or_default())
    }

    async fn append_blocks(
        &self,
        page_id: &str,
        _blocks: Vec<NoteBlock>,
        _position: Option<String>,
    ) -> Result<NotesPage, ToolError> {
        self.calls.lock().unwrap().push("append_blocks".to_string());
        Ok(self
            .append_results
            .lock()
            .unwrap()
            .pop()
            .unwrap_or(NotesPage {
                page_id: page_id.to_string(),
                url: None,
                title_plain: None,
            }))
    }

    async fn create_page(
        &self,
        _parent_page_id: Option<String>,
        title: &str,
        _children: Vec<NoteBlock>,
    ) -> Result<NotesPage, ToolError> {
        self.calls.lock().unwrap().push("create_page".to_string());
        Ok(self.create_results.lock().unwrap().pop().unwrap_or(NotesPage {
            page_id: format!("generated-{title}"),
            url: None,
            title_plain: Some(title.to_string()),
        }))
    }
}

/// The `notes` tool server: dispatches `svc.notes.{search,
/// create_page, append_blocks}` to a [`NotesClient`].
pub struct NotesServer {
    client: Arc<dyn NotesClient>,
}

impl NotesServer {
    /// Build a server wrapping `client`.
    pub fn new(client: Arc<dyn NotesClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ToolServerHandle for NotesServer {
    fn server_name(&self) -> &str {
        "notes"
    }

    fn tool_names(&self) -> Vec<String> {
        vec![
            "search".to_string(),
            "create_page".to_string(),
            "append_blocks".to_string(),
        ]
    }

    async fn call(&self, tool_name: &str, params: Value) -> Result<Value, ToolError> {
        let page = match tool_name {
            "search" => {
                #[derive(Deserialize)]
                struct In {
                    query: String,
                    #[serde(default)]
                    filter: Option<Value>,
                    #[serde(default)]
                    sort: Option<Value>,
                    #[serde(default)]
                    page_size: Option<u32>,
                    #[serde(default)]
                    start_cursor: Option<String>,
                }
                let input: In = parse(tool_name, params)?;
                let pages = self
                    .client
                    .search(
                        &input.query,
                        input.filter,
                        input.sort,
                        input.page_size,
                        input.start_cursor,
                    )
                    .await?;
                return Ok(serde_json::to_value(pages).unwrap_or(Value::Null));
            }
            "create_page" => {
                #[derive(Deserialize)]
                struct In {
                    #[serde(default)]
                    parent_page_id: Option<String>,
                    title: String,
                    #[serde(default)]
                    children: Vec<NoteBlock>,
                }
                let input: In = parse(tool_name, params)?;
                self.client
                    .create_page(input.parent_page_id, &input.title, input.children)
                    .await?
            }
            "append_blocks" => {
                #[derive(Deserialize)]
                struct In {
                    page_id: String,
                    blocks: Vec<NoteBlock>,
                    #[serde(default)]
                    position: Option<String>,
                }
                let input: In = parse(tool_name, params)?;
                self.client
                    .append_blocks(&input.page_id, input.blocks, input.position)
                    .await?
            }
            other => return Err(ToolError::NotFound(format!("svc.notes.{other}"))),
        };
        Ok(serde_json::to_value(page).unwrap_or(Value::Null))
    }
}

fn parse<T: for<'de> Deserialize<'de>>(tool_name: &str, params: Value) -> Result<T, ToolError> {
    serde_json::from_value(params).map_err(|e| ToolError::InvalidInput {
        tool: format!("svc.notes.{tool_name}"),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn search_returns_normalised_pages() {
        let client = Arc::new(MockNotesClient::new().with_search_result(vec![NotesPage {
            page_id: "p1".to_string(),
            url: Some("https://notes/p1".to_string()),
            title_plain: Some("Amazon Aurora - Browser Flow".to_string()),
        }]));
        let server = NotesServer::new(client);
        let result = server
            .call("search", serde_json::json!({"query": "aurora"}))
            .await
            .unwrap();
        assert_eq!(result[0]["page_id"], "p1");
    }

    #[tokio::test]
    async fn unknown_tool_errors() {
        let server = NotesServer::new(Arc::new(MockNotesClient::new()));
        let result = server.call("delete_everything", Value::Null).await;
        assert!(matches!(result, Err(ToolError::NotFound(_))));
    }

    #[test]
    fn note_block_serializes_with_type_tag() {
        let block = NoteBlock::ToDo {
            text: "buy milk".to_string(),
            checked: true,
        };
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(value["type"], "to_do");
        assert_eq!(value["checked"], true);
    }
}
