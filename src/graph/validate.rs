use tracing::debug;

use super::CodeGraph;

/// Drop every edge whose source or target is not a node of `graph`.
///
/// Adds the number of removed edges to `summary.ghost_edges_removed`, refreshes
/// the counters, and returns the number removed by this call. After this runs,
/// consumers may index edges by endpoint without re-checking.
pub fn validate(graph: &mut CodeGraph) -> usize {
    let before = graph.edges.len();
    let nodes = &graph.nodes;
    graph.edges.retain(|edge| {
        let valid = nodes.contains_key(&edge.source) && nodes.contains_key(&edge.target);
        if !valid {
            debug!(source = %edge.source, target = %edge.target, kind = %edge.kind, "dropping ghost edge");
        }
        valid
    });
    let removed = before - graph.edges.len();
    graph.summary.ghost_edges_removed += removed;
    graph.refresh_summary();
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::edge::{Edge, EdgeKind};
    use crate::graph::node::{Node, NodeType};

    fn two_files() -> CodeGraph {
        let mut graph = CodeGraph::new("demo");
        graph.add_node(Node::new("a.py", NodeType::File, "a.py", "a.py"));
        graph.add_node(Node::new("b.py", NodeType::File, "b.py", "b.py"));
        graph
    }

    #[test]
    fn test_removes_exactly_the_ghost_edge() {
        let mut graph = two_files();
        graph.add_edge(Edge::new("a.py", "b.py", EdgeKind::Imports));
        graph.add_edge(Edge::new("a.py", "missing.py", EdgeKind::Imports));
        graph.add_edge(Edge::new("b.py", "a.py", EdgeKind::Inherits));

        let removed = validate(&mut graph);

        assert_eq!(removed, 1);
        assert_eq!(graph.edges.len(), 2);
        assert!(graph.edges.iter().all(|e| e.target != "missing.py"));
        assert_eq!(graph.summary.ghost_edges_removed, 1);
        assert_eq!(graph.summary.total_edges, 2);
    }

    #[test]
    fn test_missing_source_is_also_a_ghost() {
        let mut graph = two_files();
        graph.add_edge(Edge::new("gone.py", "a.py", EdgeKind::Imports));
        assert_eq!(validate(&mut graph), 1);
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn test_count_accumulates_across_runs() {
        let mut graph = two_files();
        graph.add_edge(Edge::new("a.py", "x", EdgeKind::Imports));
        validate(&mut graph);
        graph.add_edge(Edge::new("a.py", "y", EdgeKind::Imports));
        validate(&mut graph);
        assert_eq!(graph.summary.ghost_edges_removed, 2);
    }

    #[test]
    fn test_valid_graph_untouched() {
        let mut graph = two_files();
        graph.add_edge(Edge::new("a.py", "b.py", EdgeKind::Imports));
        assert_eq!(validate(&mut graph), 0);
        assert_eq!(graph.edges.len(), 1);
    }
}
