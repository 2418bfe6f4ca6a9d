//! Pure function building the `/contexts/graph` shape out of a flat list of context rows. Kept as a free
//! function rather than a trait method — it's a projection over
//! `fetch_by_user`'s output, not a persistence concern.

use orch_proto::id::ContextId;
use orch_proto::model::ContextRecord;

/// One parent→child edge in a context graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextEdge {
    /// The root/parent context.
    pub parent: ContextId,
    /// The child context linked under it.
    pub child: ContextId,
}

/// Nodes, edges, and root ids for a user's context graph.
#[derive(Debug, Clone, Default)]
pub struct ContextGraph {
    /// Every context row, unchanged.
    pub nodes: Vec<ContextRecord>,
    /// One edge per non-root context.
    pub edges: Vec<ContextEdge>,
    /// Ids of contexts with no parent.
    pub roots: Vec<ContextId>,
}

/// Build a [`ContextGraph`] from a flat list of context rows (the two-
/// level context hierarchy means every non-root's parent is a root, so
/// there is exactly one edge per non-root row).
pub fn build_graph(records: Vec<ContextRecord>) -> ContextGraph {
    let mut roots = Vec::new();
    let mut edges = Vec::new();

    for record in &records {
        match &record.parent_context_id {
            Some(parent) => edges.push(ContextEdge {
                parent: parent.clone(),
                child: record.context_id.clone(),
            }),
            None => roots.push(record.context_id.clone()),
        }
    }

    ContextGraph {
        nodes: records,
        edges,
        roots,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use orch_proto::id::UserId;
    use orch_proto::model::ContextKind;

    fn record(id: &str, parent: Option<&str>) -> ContextRecord {
        let mut record = ContextRecord::new(UserId::new("u1"), "x", ContextKind::Text, Utc::now());
        record.context_id = ContextId::new(id);
        record.parent_context_id = parent.map(ContextId::new);
        record
    }

    #[test]
    fn roots_have_no_incoming_edge() {
        let graph = build_graph(vec![record("a", None), record("b", Some("a"))]);
        assert_eq!(graph.roots, vec![ContextId::new("a")]);
        assert_eq!(
            graph.edges,
            vec![ContextEdge {
                parent: ContextId::new("a"),
                child: ContextId::new("b"),
            }]
        );
    }

    #[test]
    fn empty_input_yields_empty_graph() {
        let graph = build_graph(vec![]);
        assert!(graph.nodes.is_empty());
        assert!(graph.edges.is_empty());
        assert!(graph.roots.is_empty());
    }
}
