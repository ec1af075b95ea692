use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::Serialize;

use crate::graph::CodeGraph;
use crate::graph::edge::EdgeKind;
use crate::graph::node::NodeType;

/// Per-file warnings echoed to stderr before the count is summarized.
const WARNINGS_SHOWN: usize = 10;

/// Aggregate statistics produced by an `analyze` run.
#[derive(Debug, Serialize)]
pub struct AnalyzeSummary {
    pub project: String,
    pub output: String,
    pub files_scanned: usize,
    pub nodes: usize,
    pub edges: usize,
    pub node_types: BTreeMap<NodeType, usize>,
    pub edge_types: BTreeMap<EdgeKind, usize>,
    pub ghost_edges_removed: usize,
    pub unresolved_references: usize,
    /// Files that were analyzed with pattern rules only, or skipped.
    pub warnings: usize,
    /// Wall-clock time for the run in seconds.
    pub elapsed_secs: f64,
}

impl AnalyzeSummary {
    pub fn new(graph: &CodeGraph, output: &Path, elapsed: Duration) -> Self {
        let s = &graph.summary;
        Self {
            project: graph.project.clone(),
            output: output.display().to_string(),
            files_scanned: s.files_scanned,
            nodes: s.total_nodes,
            edges: s.total_edges,
            node_types: s.node_types.clone(),
            edge_types: s.edge_types.clone(),
            ghost_edges_removed: s.ghost_edges_removed,
            unresolved_references: s.unresolved_references,
            warnings: s.warnings,
            elapsed_secs: elapsed.as_secs_f64(),
        }
    }
}

fn counts<K: std::fmt::Display>(map: &BTreeMap<K, usize>) -> String {
    map.iter().map(|(k, c)| format!("{c} {k}")).collect::<Vec<_>>().join(", ")
}

/// Print a summary of the analyze run.
///
/// - `json = true`: emit a pretty-printed JSON object to stdout.
/// - `json = false`: emit a cargo-style human-readable summary to stdout.
///
/// Per-file warnings go to **stderr** so that stdout stays clean for
/// downstream JSON consumers.
pub fn print_summary(summary: &AnalyzeSummary, graph: &CodeGraph, json: bool) {
    if json {
        match serde_json::to_string_pretty(summary) {
            Ok(s) => println!("{s}"),
            Err(e) => eprintln!("error serialising summary: {e}"),
        }
    } else {
        println!(
            "Analyzed {} files of {} in {:.2}s",
            summary.files_scanned, summary.project, summary.elapsed_secs
        );
        println!("  {} nodes: {}", summary.nodes, counts(&summary.node_types));
        println!("  {} edges: {}", summary.edges, counts(&summary.edge_types));
        println!(
            "  {} ghost edges removed, {} unresolved references",
            summary.ghost_edges_removed, summary.unresolved_references
        );
        println!("  Wrote {}", summary.output);
    }

    for w in graph.warnings.iter().take(WARNINGS_SHOWN) {
        eprintln!("  warning: {}: {}", w.file, w.message);
    }
    if summary.warnings > WARNINGS_SHOWN {
        eprintln!("  ... and {} more warnings", summary.warnings - WARNINGS_SHOWN);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::Node;

    #[test]
    fn test_summary_from_graph() {
        let mut graph = CodeGraph::new("shop");
        graph.add_node(Node::new("a.py", NodeType::File, "a.py", "a.py"));
        graph.summary.files_scanned = 1;
        graph.refresh_summary();

        let summary = AnalyzeSummary::new(&graph, Path::new("out.json"), Duration::from_millis(1500));
        assert_eq!(summary.nodes, 1);
        assert_eq!(summary.files_scanned, 1);
        assert_eq!(summary.output, "out.json");
        assert!((summary.elapsed_secs - 1.5).abs() < f64::EPSILON);
        assert_eq!(counts(&summary.node_types), "1 file");
    }
}
