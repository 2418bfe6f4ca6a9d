//! The reasoner contract (C2): prompt → text or structured output,
//! optionally backed by a tool-call loop.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::ReasonError;
use crate::tool::ToolServerHandle;

/// Token/latency accounting a backend may report back.
#[non_exhaustive]
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Usage {
    /// Tokens consumed by the prompt.
    pub input_tokens: Option<u64>,
    /// Tokens produced in the response.
    pub output_tokens: Option<u64>,
}

/// Why the backend stopped producing output.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The backend considers its answer complete.
    EndTurn,
    /// The backend was cut off by a length limit.
    MaxTokens,
    /// The backend wants to invoke a tool.
    ToolUse,
    /// Any other stop condition the backend reports.
    Other(String),
}

/// Result of a single `reason` call. The reasoner never raises on
/// backend errors — a failure is carried in `error` and
/// the caller decides what to do with it.
#[non_exhaustive]
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ReasonResponse {
    /// The text produced, if any.
    pub text: Option<String>,
    /// Usage accounting, if the backend reported it.
    pub usage: Option<Usage>,
    /// Why the backend stopped.
    pub stop_reason: Option<StopReason>,
    /// A backend-reported error, carried as data rather than raised.
    pub error: Option<String>,
}

impl ReasonResponse {
    /// A response carrying only text, everything else default.
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// A response carrying only an error.
    pub fn error_only(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }
}

/// Result of [`Reasoner::reason_json`]: either a parsed object, or the
/// raw text with a flag noting that parsing failed. Never fabricates
/// JSON that wasn't in the text.
#[derive(Debug, Clone)]
pub enum ReasonJson {
    /// Successfully parsed the first balanced `{...}` span.
    Parsed(Map<String, Value>),
    /// No valid JSON object found; raw text is preserved.
    Unparsed {
        /// The raw text returned by the backend.
        raw: String,
        /// True for any parse failure (including "no brace found").
        warning: bool,
    },
}

/// Abstract LLM-driven text/JSON producer with optional tool-use
/// capability (C2). Object-safe so it can be shared as `Arc<dyn
/// Reasoner>` and swapped (mock vs. live backend) across tests.
#[async_trait]
pub trait Reasoner: Send + Sync {
    /// Run one reasoning call. When `tool_servers` is empty this is a
    /// single-shot prompt→text call; otherwise the implementation runs
    /// an interactive tool-call loop against the given servers until
    /// the backend emits a terminal result.
    async fn reason(
        &self,
        prompt: &str,
        context_map: Option<&Map<String, Value>>,
        tools: Option<&[String]>,
        tool_servers: Option<&HashMap<String, Arc<dyn ToolServerHandle>>>,
        caller_tag: Option<&str>,
    ) -> ReasonResponse;

    /// Convenience wrapper: run `reason`, then extract and parse the
    /// first balanced `{...}` substring from the resulting text.
    async fn reason_json(
        &self,
        prompt: &str,
        context_map: Option<&Map<String, Value>>,
        caller_tag: Option<&str>,
    ) -> ReasonJson {
        let response = self.reason(prompt, context_map, None, None, caller_tag).await;
        match response.text {
            Some(text) => crate::json_extract::extract_first_json_object(&text)
                .and_then(|span| serde_json::from_str::<Value>(span).ok())
                .and_then(|v| v.as_object().cloned())
                .map(ReasonJson::Parsed)
                .unwrap_or(ReasonJson::Unparsed {
                    raw: text,
                    warning: true,
                }),
            None => ReasonJson::Unparsed {
                raw: response.error.unwrap_or_default(),
                warning: true,
            },
        }
    }
}

/// Optional observability sink a reasoner may emit system prompts and
/// full prompts to, keyed by `<caller_tag>_<method>_<kind>`. A null
/// sink (doing nothing) is the default — mirrors an optional hook
/// interface with a no-op implementation.
#[async_trait]
pub trait PromptSink: Send + Sync {
    /// Record one prompt emission.
    async fn emit(&self, key: &str, prompt: &str, metadata: &Map<String, Value>);
}

/// A [`PromptSink`] that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPromptSink;

#[async_trait]
impl PromptSink for NullPromptSink {
    async fn emit(&self, _key: &str, _prompt: &str, _metadata: &Map<String, Value>) {}
}
