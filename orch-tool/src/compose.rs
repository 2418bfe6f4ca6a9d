//! The tool-surface composition algorithm, the heart of C4.

use std::collections::HashMap;
use std::sync::Arc;

use orch_proto::id::UserId;
use orch_proto::model::AgentDescriptor;
use orch_proto::tool::ToolServerHandle;

use crate::fallback::{FallbackGateway, FallbackServer};

/// Static unsatisfied-tool-server → fallback-toolkit mapping table (spec
/// §4.4 step 3). `sheets` names the built-in `writer` server in the
/// fallback-mapping context (GLOSSARY's "Fallback provider" note); any
/// server name not listed here falls back to the generic `fallback`
/// toolkit.
const TOOLKIT_MAPPING: &[(&str, &[&str])] = &[
    ("notes", &["notes"]),
    ("board", &["board"]),
    ("sheets", &["writer"]),
];

fn toolkits_for_unsatisfied_server(server_name: &str) -> &'static [&'static str] {
    TOOLKIT_MAPPING
        .iter()
        .find(|(name, _)| *name == server_name)
        .map(|(_, toolkits)| *toolkits)
        .unwrap_or(&["fallback"])
}

/// The built-in servers available to be assembled, constructed on
/// demand by the caller (orchestrator owns the long-lived `writer`/
/// `notes` handles; `board` has no native implementation, spec's
/// "[ADDED] task-board integration capability" note — it always routes
/// through the fallback provider).
#[derive(Default, Clone)]
pub struct BuiltinServers {
    /// The `writer` server, if this deployment has one.
    pub writer: Option<Arc<dyn ToolServerHandle>>,
    /// The `notes` server, if this deployment has one.
    pub notes: Option<Arc<dyn ToolServerHandle>>,
}

impl BuiltinServers {
    fn get(&self, name: &str) -> Option<Arc<dyn ToolServerHandle>> {
        match name {
            "writer" => self.writer.clone(),
            "notes" => self.notes.clone(),
            _ => None,
        }
    }
}

/// Output of [`compose_tool_surface`]: the per-execution server map plus
/// the flat qualified-tool-name list handed to the reasoner.
#[derive(Clone)]
pub struct ComposedToolSurface {
    /// `server_name -> handle`, ready to pass to [`orch_proto::Reasoner::reason`].
    pub servers: HashMap<String, Arc<dyn ToolServerHandle>>,
    /// Qualified (`svc.<server>.<tool>`) names the reasoner may call.
    pub allowed_tools: Vec<String>,
}

fn split_qualified(name: &str) -> Option<(&str, &str)> {
    let mut parts = name.splitn(3, '.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("svc"), Some(server), Some(tool)) => Some((server, tool)),
        _ => None,
    }
}

/// Compose the tool surface for one agent execution.
///
/// `gateway` is only consulted when a fallback session is actually
/// needed — building the session is cheap (no I/O), matching "per-
/// request isolation": every execution gets its own
/// `FallbackServer` even though they may share the same underlying
/// `gateway` `Arc`.
pub fn compose_tool_surface(
    descriptor: &AgentDescriptor,
    user_id: &UserId,
    builtins: &BuiltinServers,
    gateway: Option<Arc<dyn FallbackGateway>>,
) -> ComposedToolSurface {
    let mut servers: HashMap<String, Arc<dyn ToolServerHandle>> = HashMap::new();
    for server_name in &descriptor.required_tool_servers {
        if let Some(handle) = builtins.get(server_name) {
            servers.insert(server_name.clone(), handle);
        }
    }

    let explicit_fallback = descriptor.required_tool_servers.contains("fallback")
        || descriptor
            .required_tools
            .iter()
            .any(|t| t.starts_with("svc.fallback."));

    let mut unsatisfied_servers: Vec<String> = Vec::new();
    for required in &descriptor.required_tools {
        if let Some((server_name, _tool)) = split_qualified(required) {
            if !servers.contains_key(server_name) {
                unsatisfied_servers.push(server_name.to_string());
            }
        }
    }
    unsatisfied_servers.sort();
    unsatisfied_servers.dedup();

    let needs_fallback =
        descriptor.use_fallback_provider && (!unsatisfied_servers.is_empty() || explicit_fallback);

    if needs_fallback {
        if let Some(gateway) = gateway {
            let toolkits = descriptor.fallback_toolkits.clone().unwrap_or_else(|| {
                let mut inferred: Vec<String> = unsatisfied_servers
                    .iter()
                    .flat_map(|name| toolkits_for_unsatisfied_server(name).iter().map(|s| s.to_string()))
                    .collect();
                inferred.sort();
                inferred.dedup();
                if inferred.is_empty() {
                    inferred.push("fallback".to_string());
                }
                inferred
            });
            servers.insert(
                "fallback".to_string(),
                Arc::new(FallbackServer::new(gateway, user_id.clone(), toolkits)),
            );
        }
    }

    let mut allowed_tools = Vec::new();
    for required in &descriptor.required_tools {
        if let Some((server_name, tool)) = split_qualified(required) {
            if servers.contains_key(server_name) {
                allowed_tools.push(required.clone());
            } else if servers.contains_key("fallback") {
                allowed_tools.push(format!("svc.fallback.{server_name}.{tool}"));
            }
        }
    }

    ComposedToolSurface {
        servers,
        allowed_tools,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::MockFallbackGateway;
    use crate::notes::{MockNotesClient, NotesServer};
    use orch_proto::model::{AgentDescriptorConfig, TaskType};
    use std::collections::BTreeSet;

    fn descriptor(
        required_tools: &[&str],
        required_tool_servers: &[&str],
        use_fallback_provider: bool,
    ) -> AgentDescriptor {
        AgentDescriptor {
            agent_id: orch_proto::id::AgentId::new("a1"),
            loadable_class_name: "test".to_string(),
            supported_task_types: BTreeSet::from([TaskType::NoteTaking]),
            capabilities: BTreeSet::new(),
            required_tools: required_tools.iter().map(|s| s.to_string()).collect(),
            required_tool_servers: required_tool_servers.iter().map(|s| s.to_string()).collect(),
            fallback_toolkits: None,
            use_fallback_provider,
            description: "test".to_string(),
            config: AgentDescriptorConfig::default(),
        }
    }

    #[test]
    fn satisfied_tool_needs_no_fallback() {
        let desc = descriptor(&["svc.notes.search"], &["notes"], true);
        let builtins = BuiltinServers {
            writer: None,
            notes: Some(Arc::new(NotesServer::new(Arc::new(MockNotesClient::new())))),
        };
        let composed = compose_tool_surface(&desc, &UserId::new("u1"), &builtins, None);
        assert!(composed.servers.contains_key("notes"));
        assert!(!composed.servers.contains_key("fallback"));
        assert_eq!(composed.allowed_tools, vec!["svc.notes.search".to_string()]);
    }

    #[test]
    fn unsatisfied_tool_falls_back_when_gateway_present() {
        let desc = descriptor(&["svc.board.create_card"], &[], true);
        let builtins = BuiltinServers::default();
        let gateway = Arc::new(MockFallbackGateway::new());
        let composed = compose_tool_surface(&desc, &UserId::new("u1"), &builtins, Some(gateway));
        assert!(composed.servers.contains_key("fallback"));
        assert_eq!(
            composed.allowed_tools,
            vec!["svc.fallback.board.create_card".to_string()]
        );
    }

    #[test]
    fn fallback_disabled_leaves_tool_unsatisfied() {
        let desc = descriptor(&["svc.board.create_card"], &[], false);
        let builtins = BuiltinServers::default();
        let composed = compose_tool_surface(&desc, &UserId::new("u1"), &builtins, None);
        assert!(composed.servers.is_empty());
        assert!(composed.allowed_tools.is_empty());
    }

    #[test]
    fn explicit_fallback_toolkits_override_inference() {
        let mut desc = descriptor(&["svc.board.create_card"], &[], true);
        desc.fallback_toolkits = Some(vec!["custom_toolkit".to_string()]);
        let gateway = Arc::new(MockFallbackGateway::new());
        let composed =
            compose_tool_surface(&desc, &UserId::new("u1"), &BuiltinServers::default(), Some(gateway));
        let fallback = composed.servers.get("fallback").unwrap();
        assert_eq!(fallback.tool_names(), vec!["custom_toolkit".to_string()]);
    }
}
