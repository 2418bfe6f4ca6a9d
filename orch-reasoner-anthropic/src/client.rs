//! Low-level request building / response parsing against the Anthropic
//! Messages API. No retry, no tool loop — that's `lib.rs`'s job.

use serde_json::Value;

use crate::types::{
    AnthropicContentBlock, AnthropicErrorBody, AnthropicMessage, AnthropicRequest,
    AnthropicResponse, AnthropicTool,
};

pub(crate) struct RawClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    api_version: String,
}

impl RawClient {
    pub(crate) fn new(api_url: String, api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url,
            api_key,
            api_version: "2023-06-01".to_string(),
        }
    }

    pub(crate) fn build_request(
        model: &str,
        max_tokens: u32,
        system: Option<String>,
        messages: Vec<AnthropicMessage>,
        tool_names: &[String],
    ) -> AnthropicRequest {
        let tools = tool_names
            .iter()
            .map(|qualified| AnthropicTool {
                name: qualified.clone(),
                description: format!("Tool exposed by the composed tool surface: {qualified}"),
                input_schema: serde_json::json!({"type": "object"}),
            })
            .collect();

        AnthropicRequest {
            model: model.to_string(),
            max_tokens,
            messages,
            system,
            tools,
        }
    }

    pub(crate) async fn send(&self, request: &AnthropicRequest) -> Result<AnthropicResponse, String> {
        let response = self
            .http
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.api_version)
            .json(request)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<AnthropicErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or(body);
            return Err(format!("HTTP {status}: {message}"));
        }

        response
            .json::<AnthropicResponse>()
            .await
            .map_err(|e| format!("failed to parse response: {e}"))
    }
}

pub(crate) fn user_message(text: impl Into<String>) -> AnthropicMessage {
    AnthropicMessage {
        role: "user".to_string(),
        content: vec![AnthropicContentBlock::Text { text: text.into() }],
    }
}

pub(crate) fn concat_text(content: &[AnthropicContentBlock]) -> Option<String> {
    let text: String = content
        .iter()
        .filter_map(|block| match block {
            AnthropicContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n");
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

pub(crate) fn tool_uses(content: &[AnthropicContentBlock]) -> Vec<(String, String, Value)> {
    content
        .iter()
        .filter_map(|block| match block {
            AnthropicContentBlock::ToolUse { id, name, input } => {
                Some((id.clone(), name.clone(), input.clone()))
            }
            _ => None,
        })
        .collect()
}
