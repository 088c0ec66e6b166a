//! Graph data surface for external visualisers.
//!
//! One read returns `{nodes, edges}` in node-first order; the companion
//! streaming channel lives in [`crate::events`]. Transport (HTTP,
//! WebSocket) is the consumer's concern.

use serde::{Deserialize, Serialize};

use crate::errors::QueryError;
use crate::graph::{Edge, GraphStore, Node};

/// A complete or file-scoped view of the graph.
#[derive(Debug, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

/// Read the graph for the visualiser.
///
/// # Arguments
/// * `store` - The graph store
/// * `file_path` - When given, restrict nodes to that file and edges to
///   those touching the file's nodes
pub fn graph_snapshot(
    store: &GraphStore,
    file_path: Option<&str>,
) -> Result<GraphSnapshot, QueryError> {
    match file_path {
        None => Ok(GraphSnapshot {
            nodes: store.all_nodes()?,
            edges: store.all_edges()?,
        }),
        Some(path) => {
            let nodes = store.nodes_by_file(path)?;
            let ids: Vec<String> = nodes.iter().map(|n| n.id.clone()).collect();
            let edges = store.edges_touching(&ids)?;
            Ok(GraphSnapshot { nodes, edges })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NodeKind, Relation, Visibility};
    use crate::ident::node_id;

    fn node(path: &str, name: &str) -> Node {
        Node {
            id: node_id(path, name),
            name: name.into(),
            qualified_name: name.into(),
            kind: NodeKind::Function,
            file_path: path.into(),
            start_line: 1,
            end_line: 1,
            signature: String::new(),
            docstring: String::new(),
            decorators: vec![],
            visibility: Visibility::Public,
        }
    }

    #[test]
    fn full_snapshot_contains_everything() {
        let store = GraphStore::open_in_memory().unwrap();
        let a = node("a.py", "f");
        let b = node("b.py", "g");
        store.refresh_file("a.py", &[a.clone()], &[]).unwrap();
        store
            .refresh_file("b.py", &[b.clone()], &[Edge::new(&b.id, &a.id, Relation::Calls)])
            .unwrap();

        let snapshot = graph_snapshot(&store, None).unwrap();
        assert_eq!(snapshot.nodes.len(), 2);
        assert_eq!(snapshot.edges.len(), 1);
    }

    #[test]
    fn file_snapshot_keeps_connected_edges() {
        let store = GraphStore::open_in_memory().unwrap();
        let a = node("a.py", "f");
        let b = node("b.py", "g");
        let c = node("c.py", "h");
        store.refresh_file("a.py", &[a.clone()], &[]).unwrap();
        store
            .refresh_file("b.py", &[b.clone()], &[Edge::new(&b.id, &a.id, Relation::Calls)])
            .unwrap();
        store.refresh_file("c.py", &[c.clone()], &[]).unwrap();

        let snapshot = graph_snapshot(&store, Some("a.py")).unwrap();
        assert_eq!(snapshot.nodes.len(), 1);
        assert_eq!(snapshot.nodes[0].file_path, "a.py");
        // the incoming edge from b.py is connected, so it is included
        assert_eq!(snapshot.edges.len(), 1);

        let empty = graph_snapshot(&store, Some("missing.py")).unwrap();
        assert!(empty.nodes.is_empty());
        assert!(empty.edges.is_empty());
    }

    #[test]
    fn snapshot_serializes_node_first() {
        let store = GraphStore::open_in_memory().unwrap();
        store.refresh_file("a.py", &[node("a.py", "f")], &[]).unwrap();
        let snapshot = graph_snapshot(&store, None).unwrap();
        let json = serde_json::to_string(&snapshot).unwrap();
        let nodes_pos = json.find("\"nodes\"").unwrap();
        let edges_pos = json.find("\"edges\"").unwrap();
        assert!(nodes_pos < edges_pos);
    }
}
