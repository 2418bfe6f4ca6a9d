//! The tool-server contract (C4's building block).
//!
//! A *tool server* is anything that exposes named tools under a
//! qualified prefix `svc.<server_name>.<tool_name>` (GLOSSARY). Built-in
//! servers (`writer`, `notes`) and the fallback-provider bridge all
//! implement this one trait — the composer (`orch-tool`) only ever sees
//! `Arc<dyn ToolServerHandle>`.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ToolError;

/// One tool server's contract: enumerate what it offers, dispatch a call.
///
/// Object-safe so the composed tool surface handed to a single agent
/// execution can be a plain `HashMap<String, Arc<dyn ToolServerHandle>>`.
#[async_trait]
pub trait ToolServerHandle: Send + Sync {
    /// This server's unqualified name (`writer`, `notes`, `fallback`, …).
    fn server_name(&self) -> &str;

    /// Unqualified tool names this server currently offers. The composer
    /// qualifies these as `svc.<server_name>.<tool>` when building the
    /// allowed-tools list handed to the reasoner.
    fn tool_names(&self) -> Vec<String>;

    /// Dispatch one call by its unqualified tool name.
    async fn call(&self, tool_name: &str, params: Value) -> Result<Value, ToolError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct EchoServer;

    #[async_trait]
    impl ToolServerHandle for EchoServer {
        fn server_name(&self) -> &str {
            "echo"
        }

        fn tool_names(&self) -> Vec<String> {
            vec!["say".to_string()]
        }

        async fn call(&self, tool_name: &str, params: Value) -> Result<Value, ToolError> {
            if tool_name != "say" {
                return Err(ToolError::NotFound(tool_name.to_string()));
            }
            Ok(params)
        }
    }

    fn _assert_object_safe(_: &dyn ToolServerHandle) {}

    #[tokio::test]
    async fn dispatches_known_tool() {
        let server: Arc<dyn ToolServerHandle> = Arc::new(EchoServer);
        let result = server.call("say", serde_json::json!({"hi": true})).await;
        assert_eq!(result.unwrap(), serde_json::json!({"hi": true}));
    }

    #[tokio::test]
    async fn unknown_tool_errors() {
        let server: Arc<dyn ToolServerHandle> = Arc::new(EchoServer);
        let result = server.call("missing", Value::Null).await;
        assert!(matches!(result, Err(ToolError::NotFound(_))));
    }
}
