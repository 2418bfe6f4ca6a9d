#![deny(missing_docs)]
//! Anthropic-backed [`Reasoner`] (C2's concrete half).
//!
//! Single-shot when `tool_servers` is empty; otherwise runs an
//! interactive tool-call loop — dispatch every
//! `tool_use` block the model emits to the named server, feed the
//! results back as `tool_result` blocks, repeat until the model emits a
//! terminal (non-tool-use) response or `max_turns` is hit. Never raises
//! on backend failure: every error becomes `ReasonResponse.error`.

mod client;
mod types;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use orch_proto::reasoner::{ReasonResponse, Reasoner, StopReason, Usage};
use orch_proto::tool::ToolServerHandle;
use serde_json::{Map, Value};

use client::{concat_text, tool_uses, user_message, RawClient};
use types::AnthropicContentBlock;

/// Environment-driven configuration, in the teacher's `Config::from_env`
/// style (`app/core/config.py`'s env-var-driven settings, translated).
#[derive(Debug, Clone)]
pub struct Config {
    /// Anthropic API key.
    pub api_key: String,
    /// Messages API endpoint.
    pub api_url: String,
    /// Default model identifier.
    pub model: String,
    /// Default max tokens per response.
    pub max_tokens: u32,
    /// Upper bound on tool-call loop iterations.
    pub max_turns: u32,
}

impl Config {
    /// Build from `ORCH_REASONER_*` environment variables.
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("ORCH_REASONER_API_KEY").unwrap_or_default(),
            api_url: std::env::var("ORCH_REASONER_API_URL")
                .unwrap_or_else(|_| "https://api.anthropic.com/v1/messages".to_string()),
            model: std::env::var("ORCH_REASONER_MODEL")
                .unwrap_or_else(|_| "claude-haiku-4-5-20251001".to_string()),
            max_tokens: std::env::var("ORCH_REASONER_MAX_TOKENS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4096),
            max_turns: std::env::var("ORCH_REASONER_MAX_TURNS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8),
        }
    }
}

/// Concrete Anthropic-backed reasoner.
pub struct AnthropicReasoner {
    client: RawClient,
    config: Config,
}

impl AnthropicReasoner {
    /// Build a reasoner from an explicit configuration.
    pub fn new(config: Config) -> Self {
        let client = RawClient::new(config.api_url.clone(), config.api_key.clone());
        Self { client, config }
    }

    /// Build a reasoner from the environment (see [`Config::from_env`]).
    pub fn from_env() -> Self {
        Self::new(Config::from_env())
    }

    /// Dispatch one `tool_use` block to its owning server, looked up by
    /// the `svc.<server>.<tool>` qualified name.
    async fn dispatch_tool(
        servers: &HashMap<String, Arc<dyn ToolServerHandle>>,
        qualified_name: &str,
        input: Value,
    ) -> Result<Value, String> {
        let mut parts = qualified_name.splitn(3, '.');
        let (Some("svc"), Some(server_name), Some(tool_name)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(format!("malformed qualified tool name: {qualified_name}"));
        };
        let server = servers
            .get(server_name)
            .ok_or_else(|| format!("no tool server named '{server_name}' in this surface"))?;
        server
            .call(tool_name, input)
            .await
            .map_err(|e| e.to_string())
    }
}

#[async_trait]
impl Reasoner for AnthropicReasoner {
    async fn reason(
        &self,
        prompt: &str,
        context_map: Option<&Map<String, Value>>,
        tools: Option<&[String]>,
        tool_servers: Option<&HashMap<String, Arc<dyn ToolServerHandle>>>,
        caller_tag: Option<&str>,
    ) -> ReasonResponse {
        let system = context_map.map(|m| serde_json::to_string(m).unwrap_or_default());
        let tool_names: Vec<String> = tools.map(|t| t.to_vec()).unwrap_or_default();
        let mut messages = vec![user_message(prompt)];

        let empty_servers = HashMap::new();
        let servers = tool_servers.unwrap_or(&empty_servers);
        let has_tools = !tool_names.is_empty() && !servers.is_empty();

        tracing::debug!(caller_tag, has_tools, "anthropic reasoner call starting");

        let mut turns_used = 0u32;
        let mut total_usage = Usage::default();

        loop {
            turns_used += 1;
            let request = RawClient::build_request(
                &self.config.model,
                self.config.max_tokens,
                system.clone(),
                messages.clone(),
                if has_tools { &tool_names } else { &[] },
            );

            let response = match self.client.send(&request).await {
                Ok(response) => response,
                Err(message) => {
                    tracing::warn!(caller_tag, %message, "anthropic reasoner backend error");
                    return ReasonResponse::error_only(message);
                }
            };

            total_usage.input_tokens =
                Some(total_usage.input_tokens.unwrap_or(0) + response.usage.input_tokens);
            total_usage.output_tokens =
                Some(total_usage.output_tokens.unwrap_or(0) + response.usage.output_tokens);

            let uses = tool_uses(&response.content);
            let is_tool_use = response.stop_reason.as_deref() == Some("tool_use") && !uses.is_empty();

            if !is_tool_use || !has_tools || turns_used >= self.config.max_turns {
                let text = concat_text(&response.content);
                let stop_reason = match response.stop_reason.as_deref() {
                    Some("end_turn") => StopReason::EndTurn,
                    Some("max_tokens") => StopReason::MaxTokens,
                    Some("tool_use") => StopReason::ToolUse,
                    Some(other) => StopReason::Other(other.to_string()),
                    None => StopReason::EndTurn,
                };
                return ReasonResponse {
                    text,
                    usage: Some(total_usage),
                    stop_reason: Some(stop_reason),
                    error: None,
                };
            }

            // Append the assistant turn, then the tool results, and loop.
            messages.push(types::AnthropicMessage {
                role: "assistant".to_string(),
                content: response.content,
            });

            let mut result_blocks = Vec::with_capacity(uses.len());
            for (id, name, input) in uses {
                match Self::dispatch_tool(servers, &name, input).await {
                    Ok(output) => result_blocks.push(AnthropicContentBlock::ToolResult {
                        tool_use_id: id,
                        content: output.to_string(),
                        is_error: None,
                    }),
                    Err(message) => result_blocks.push(AnthropicContentBlock::ToolResult {
                        tool_use_id: id,
                        content: message,
                        is_error: Some(true),
                    }),
                }
            }
            messages.push(types::AnthropicMessage {
                role: "user".to_string(),
                content: result_blocks,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_from_env_has_spec_defaults() {
        // SAFETY: test-only mutation of process env, single-threaded test.
        unsafe {
            std::env::remove_var("ORCH_REASONER_MAX_TURNS");
            std::env::remove_var("ORCH_REASONER_MODEL");
        }
        let config = Config::from_env();
        assert_eq!(config.max_turns, 8);
        assert_eq!(config.model, "claude-haiku-4-5-20251001");
    }

    #[tokio::test]
    async fn dispatch_tool_rejects_malformed_qualified_name() {
        let servers: HashMap<String, Arc<dyn ToolServerHandle>> = HashMap::new();
        let result = AnthropicReasoner::dispatch_tool(&servers, "not_qualified", Value::Null).await;
        assert!(result.is_err());
    }
}
