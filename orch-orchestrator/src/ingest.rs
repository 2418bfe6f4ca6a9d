//! Context ingestion: the "context-processing
//! reasoner call" turns URLs or free text into a list of ingestable
//! entries, each becoming one `ContextRecord` via `create_batch`.
//!
//! Per §9's REDESIGN FLAG the original `url_context_output.json`
//! on-disk artefact is not reproduced here — the reasoner's answer is
//! parsed directly into an in-memory `Vec<IngestedEntry>` and handed to
//! the caller; a missing or unparsable artefact and an empty in-memory
//! result are the same failure mode, so nothing is lost by skipping
//! the round-trip through disk.

use std::sync::Arc;

use orch_proto::reasoner::Reasoner;
use serde::Deserialize;

const CALLER_TAG: &str = "context_ingest";

/// One entry the context-processing reasoner call produced.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngestedEntry {
    /// Source URL, if this entry came from a fetched page.
    #[serde(default)]
    pub url: Option<String>,
    /// Short human title, if the reasoner produced one.
    #[serde(default)]
    pub title: Option<String>,
    /// Tags the reasoner derived for this entry.
    #[serde(default)]
    pub tags: Vec<String>,
    /// The entry's body text.
    #[serde(default)]
    pub content: String,
    /// One-line summary, if produced.
    #[serde(default)]
    pub short_summary: Option<String>,
}

/// Run the context-processing reasoner call. When `urls` is non-empty
/// the reasoner is allowed a `web_fetch` tool; otherwise it works from
/// `free_text` alone. Any failure to produce or parse a JSON array is
/// logged and yields an empty vec — the caller falls back to a single
/// raw-input context, never treating this as fatal.
pub async fn run_context_processing(
    reasoner: &Arc<dyn Reasoner>,
    urls: &[String],
    free_text: &str,
) -> Vec<IngestedEntry> {
    let prompt = build_prompt(urls, free_text);
    let tools = if urls.is_empty() {
        None
    } else {
        Some(vec!["web_fetch".to_string()])
    };

    let response = reasoner
        .reason(&prompt, None, tools.as_deref(), None, Some(CALLER_TAG))
        .await;

    let Some(text) = response.text else {
        tracing::warn!(
            error = response.error.as_deref().unwrap_or("no text returned"),
            "context-processing reasoner call produced no text, falling back to raw input"
        );
        return Vec::new();
    };

    let Some(span) = orch_proto::json_extract::extract_first_json_array(&text) else {
        tracing::warn!("context-processing reasoner answer had no JSON array, falling back to raw input");
        return Vec::new();
    };

    match serde_json::from_str::<Vec<IngestedEntry>>(span) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(error = %e, "context-processing JSON array failed to parse, falling back to raw input");
            Vec::new()
        }
    }
}

fn build_prompt(urls: &[String], free_text: &str) -> String {
    let mut prompt = String::from(
        "You process content into discrete, taggable context entries. \
         Return ONLY a JSON array of objects, each with keys \"url\" \
         (optional), \"title\" (optional), \"tags\" (array of strings), \
         \"content\" (string), and \"short_summary\" (optional string).\n\n",
    );
    if !urls.is_empty() {
        prompt.push_str("Fetch and summarise each of these URLs as one entry:\n");
        for url in urls {
            prompt.push_str("- ");
            prompt.push_str(url);
            prompt.push('\n');
        }
        prompt.push('\n');
    }
    if !free_text.trim().is_empty() {
        prompt.push_str("Free-form content to process:\n");
        prompt.push_str(free_text);
        prompt.push('\n');
    }
    prompt.push_str("\nOutput only the JSON array, no other text.");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use orch_proto::reasoner::ReasonResponse;
    use orch_proto::tool::ToolServerHandle;
    use serde_json::{Map, Value};
    use std::collections::HashMap;

    struct ScriptedReasoner(String);

    #[async_trait]
    impl Reasoner for ScriptedReasoner {
        async fn reason(
            &self,
            _prompt: &str,
            _context_map: Option<&Map<String, Value>>,
            _tools: Option<&[String]>,
            _tool_servers: Option<&HashMap<String, Arc<dyn ToolServerHandle>>>,
            _caller_tag: Option<&str>,
        ) -> ReasonResponse {
            ReasonResponse::text_only(self.0.clone())
        }
    }

    #[tokio::test]
    async fn parses_well_formed_array() {
        let reasoner: Arc<dyn Reasoner> = Arc::new(ScriptedReasoner(
            r#"here: [{"content": "hello", "tags": ["a", "b"]}] done"#.to_string(),
        ));
        let entries = run_context_processing(&reasoner, &[], "hello").await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].content, "hello");
        assert_eq!(entries[0].tags, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn unparseable_answer_yields_empty_vec() {
        let reasoner: Arc<dyn Reasoner> = Arc::new(ScriptedReasoner("no json at all".to_string()));
        let entries = run_context_processing(&reasoner, &[], "hello").await;
        assert!(entries.is_empty());
    }

    #[test]
    fn urls_request_the_web_fetch_tool_in_the_prompt() {
        let prompt = build_prompt(&["https://example.com".to_string()], "");
        assert!(prompt.contains("https://example.com"));
    }
}
