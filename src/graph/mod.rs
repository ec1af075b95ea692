pub mod builder;
pub mod edge;
pub mod node;
pub mod validate;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use edge::{Edge, EdgeKind};
use node::{Node, NodeType};

/// A non-fatal problem recorded while analyzing one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub file: String,
    pub message: String,
}

/// Counters persisted alongside the graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub node_types: BTreeMap<NodeType, usize>,
    pub edge_types: BTreeMap<EdgeKind, usize>,
    /// Edges dropped by the validator because an endpoint was missing.
    pub ghost_edges_removed: usize,
    #[serde(default)]
    pub files_scanned: usize,
    /// Pending symbol references that never matched a node.
    #[serde(default)]
    pub unresolved_references: usize,
    #[serde(default)]
    pub warnings: usize,
}

/// The structural graph of one source tree.
///
/// Nodes are keyed by id in a `BTreeMap`, so iterating the node set always
/// yields ascending id order.
#[derive(Debug, Clone, Default)]
pub struct CodeGraph {
    /// Name of the analyzed project (root directory name).
    pub project: String,
    pub nodes: BTreeMap<String, Node>,
    pub edges: Vec<Edge>,
    pub summary: Summary,
    pub warnings: Vec<Warning>,
}

impl CodeGraph {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            ..Self::default()
        }
    }

    /// Insert a node. Returns `false` (and keeps the existing node) if the id is taken.
    pub fn add_node(&mut self, node: Node) -> bool {
        if self.nodes.contains_key(&node.id) {
            return false;
        }
        self.nodes.insert(node.id.clone(), node);
        true
    }

    pub fn add_edge(&mut self, edge: Edge) {
        self.edges.push(edge);
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Recompute the node/edge counters from the current contents.
    ///
    /// Leaves `ghost_edges_removed`, `files_scanned` and
    /// `unresolved_references` untouched: those are facts about the build,
    /// not about the final graph.
    pub fn refresh_summary(&mut self) {
        let mut node_types: BTreeMap<NodeType, usize> = BTreeMap::new();
        for node in self.nodes.values() {
            *node_types.entry(node.kind).or_insert(0) += 1;
        }
        let mut edge_types: BTreeMap<EdgeKind, usize> = BTreeMap::new();
        for edge in &self.edges {
            *edge_types.entry(edge.kind).or_insert(0) += 1;
        }
        self.summary.total_nodes = self.nodes.len();
        self.summary.total_edges = self.edges.len();
        self.summary.node_types = node_types;
        self.summary.edge_types = edge_types;
        self.summary.warnings = self.warnings.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_duplicate_node_keeps_first() {
        let mut graph = CodeGraph::new("demo");
        assert!(graph.add_node(Node::new("a.py", NodeType::File, "a.py", "a.py")));
        assert!(!graph.add_node(Node::new("a.py", NodeType::Service, "other", "a.py")));
        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.node("a.py").unwrap().kind, NodeType::File);
    }

    #[test]
    fn test_refresh_summary_counts_by_type() {
        let mut graph = CodeGraph::new("demo");
        graph.add_node(Node::new("a.py", NodeType::File, "a.py", "a.py"));
        graph.add_node(Node::new("b.py", NodeType::File, "b.py", "b.py"));
        graph.add_node(Node::new("model:User", NodeType::Collection, "User", "b.py"));
        graph.add_edge(Edge::new("a.py", "b.py", EdgeKind::Imports));
        graph.add_edge(Edge::new("a.py", "model:User", EdgeKind::DbRead));
        graph.summary.ghost_edges_removed = 2;

        graph.refresh_summary();

        assert_eq!(graph.summary.total_nodes, 3);
        assert_eq!(graph.summary.total_edges, 2);
        assert_eq!(graph.summary.node_types.get(&NodeType::File), Some(&2));
        assert_eq!(graph.summary.edge_types.get(&EdgeKind::DbRead), Some(&1));
        assert_eq!(graph.summary.ghost_edges_removed, 2, "build facts survive a refresh");
    }
}
