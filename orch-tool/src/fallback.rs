//! The fallback-provider bridge: "an external
//! gateway that fronts many third-party toolkits behind one tool-server
//! interface" (GLOSSARY). [`FallbackGateway`] is the capability
//! boundary (concrete gateway wire format is out of scope, spec §1);
//! [`FallbackServer`] wraps one session bound to a `user_id` and a set
//! of inferred toolkits, exposed to the composer as the single server
//! named `fallback`.

use std::sync::Arc;

use async_trait::async_trait;
use orch_proto::error::ToolError;
use orch_proto::id::UserId;
use orch_proto::tool::ToolServerHandle;
use serde_json::Value;

/// Capability boundary for the external fallback/automation gateway
/// (e.g. the original's Composio bridge — spec §9 GLOSSARY "Fallback
/// provider"). Sessions are per-user; toolkits scope which third-party
/// actions a session may invoke.
#[async_trait]
pub trait FallbackGateway: Send + Sync {
    /// Invoke one action of `toolkit` on behalf of `user_id`.
    async fn call_toolkit_action(
        &self,
        user_id: &UserId,
        toolkit: &str,
        action: &str,
        params: Value,
    ) -> Result<Value, ToolError>;
}

/// A `FallbackGateway` for tests: echoes the call back as its result
/// and records every invocation.
#[derive(Default)]
pub struct MockFallbackGateway {
    calls: std::sync::Mutex<Vec<(String, String, String)>>,
}

impl MockFallbackGateway {
    /// Build an empty mock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of `(user_id, toolkit, action)` for every call made.
    pub fn calls(&self) -> Vec<(String, String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FallbackGateway for MockFallbackGateway {
    async fn call_toolkit_action(
        &self,
        user_id: &UserId,
        toolkit: &str,
        action: &str,
        params: Value,
    ) -> Result<Value, ToolError> {
        self.calls.lock().unwrap().push((
            user_id.as_str().to_string(),
            toolkit.to_string(),
            action.to_string(),
        ));
        Ok(serde_json::json!({ "toolkit": toolkit, "action": action, "echo": params }))
    }
}

/// One fallback-provider session, bound to `user_id` and a fixed set of
/// toolkits inferred from the unsatisfied tools that triggered it (spec
/// §4.4 step 3). Tool names this server reports are `<toolkit>.<action>`
/// placeholders — the gateway resolves the actual action set, which is
/// provider-specific and out of scope here.
pub struct FallbackServer {
    gateway: Arc<dyn FallbackGateway>,
    user_id: UserId,
    toolkits: Vec<String>,
}

impl FallbackServer {
    /// Build a session for `user_id` scoped to `toolkits`.
    pub fn new(gateway: Arc<dyn FallbackGateway>, user_id: UserId, toolkits: Vec<String>) -> Self {
        Self {
            gateway,
            user_id,
            toolkits,
        }
    }

    /// Toolkits this session was bound to.
    pub fn toolkits(&self) -> &[String] {
        &self.toolkits
    }
}

#[async_trait]
impl ToolServerHandle for FallbackServer {
    fn server_name(&self) -> &str {
        "fallback"
    }

    fn tool_names(&self) -> Vec<String> {
        // The gateway's real action catalogue is provider-specific and
        // not enumerable here; report the bound toolkits themselves so
        // callers can at least see what this session covers.
        self.toolkits.clone()
    }

    async fn call(&self, tool_name: &str, params: Value) -> Result<Value, ToolError> {
        let (toolkit, action) = tool_name.split_once('.').unwrap_or((tool_name, "default"));
        if !self.toolkits.iter().any(|t| t == toolkit) {
            return Err(ToolError::NotFound(format!("svc.fallback.{tool_name}")));
        }
        self.gateway
            .call_toolkit_action(&self.user_id, toolkit, action, params)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dispatches_within_bound_toolkits() {
        let gateway = Arc::new(MockFallbackGateway::new());
        let server = FallbackServer::new(
            gateway.clone(),
            UserId::new("u1"),
            vec!["board".to_string()],
        );
        let result = server
            .call("board.create_card", serde_json::json!({"title": "x"}))
            .await
            .unwrap();
        assert_eq!(result["toolkit"], "board");
        assert_eq!(gateway.calls().len(), 1);
    }

    #[tokio::test]
    async fn rejects_toolkit_outside_the_bound_set() {
        let gateway = Arc::new(MockFallbackGateway::new());
        let server = FallbackServer::new(gateway, UserId::new("u1"), vec!["board".to_string()]);
        let result = server.call("notes.create_page", Value::Null).await;
        assert!(matches!(result, Err(ToolError::NotFound(_))));
    }
}
