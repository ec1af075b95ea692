use std::collections::BTreeMap;

use serde::Serialize;

use crate::graph::edge::EdgeKind;
use crate::graph::node::NodeType;

use super::{GraphIndex, RankedNode};

/// Hubs listed at the end of `stats`.
const STATS_TOP_HUBS: usize = 5;

/// Architectural layers shown by `overview`, each a set of node types.
pub const LAYERS: &[(&str, &[NodeType])] = &[
    (
        "API",
        &[NodeType::Endpoint, NodeType::Router, NodeType::Serializer, NodeType::Middleware],
    ),
    ("Business logic", &[NodeType::Service, NodeType::Task, NodeType::Utility]),
    ("Data", &[NodeType::Collection, NodeType::CacheKey]),
    ("Frontend", &[NodeType::Component]),
    ("Integration", &[NodeType::Webhook, NodeType::ExternalApi, NodeType::Event]),
    ("Quality", &[NodeType::Test]),
];

/// `stats`: counters of the (re-validated) graph.
#[derive(Debug, Serialize)]
pub struct StatsReport {
    pub project: String,
    pub total_nodes: usize,
    pub total_edges: usize,
    pub node_types: BTreeMap<NodeType, usize>,
    pub edge_types: BTreeMap<EdgeKind, usize>,
    pub ghost_edges_removed: usize,
    pub files_scanned: usize,
    pub unresolved_references: usize,
    pub warnings: usize,
    pub top_hubs: Vec<RankedNode>,
}

#[derive(Debug, Serialize)]
pub struct DirectoryBreakdown {
    pub directory: String,
    pub nodes: usize,
    /// The three most common node types in the directory.
    pub top_types: Vec<(NodeType, usize)>,
}

#[derive(Debug, Serialize)]
pub struct Layer {
    pub name: &'static str,
    pub nodes: usize,
    pub types: Vec<(NodeType, usize)>,
}

/// `overview`: where things live and how the layers are populated.
#[derive(Debug, Serialize)]
pub struct Overview {
    pub project: String,
    pub total_nodes: usize,
    pub total_edges: usize,
    pub directories: Vec<DirectoryBreakdown>,
    pub relationships: Vec<(EdgeKind, usize)>,
    pub layers: Vec<Layer>,
}

pub fn stats(index: &GraphIndex) -> StatsReport {
    let summary = &index.graph().summary;
    StatsReport {
        project: index.graph().project.clone(),
        total_nodes: summary.total_nodes,
        total_edges: summary.total_edges,
        node_types: summary.node_types.clone(),
        edge_types: summary.edge_types.clone(),
        ghost_edges_removed: summary.ghost_edges_removed,
        files_scanned: summary.files_scanned,
        unresolved_references: summary.unresolved_references,
        warnings: summary.warnings,
        top_hubs: index
            .ranked()
            .iter()
            .take(STATS_TOP_HUBS)
            .map(|&i| index.ranked_node(i))
            .collect(),
    }
}

/// Sort `(key, count)` pairs by count descending, key ascending.
fn by_count<K: Ord>(counts: BTreeMap<K, usize>) -> Vec<(K, usize)> {
    let mut pairs: Vec<(K, usize)> = counts.into_iter().collect();
    pairs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    pairs
}

pub fn overview(index: &GraphIndex) -> Overview {
    let graph = index.graph();

    let mut dirs: BTreeMap<String, BTreeMap<NodeType, usize>> = BTreeMap::new();
    for idx in index.indices() {
        let node = index.node(idx);
        let top = match node.file.split_once('/') {
            Some((dir, _)) => dir.to_string(),
            None => ".".to_string(),
        };
        *dirs.entry(top).or_default().entry(node.kind).or_insert(0) += 1;
    }
    let mut directories: Vec<DirectoryBreakdown> = dirs
        .into_iter()
        .map(|(directory, types)| {
            let nodes = types.values().sum();
            let mut top_types = by_count(types);
            top_types.truncate(3);
            DirectoryBreakdown {
                directory,
                nodes,
                top_types,
            }
        })
        .collect();
    directories.sort_by(|a, b| b.nodes.cmp(&a.nodes).then_with(|| a.directory.cmp(&b.directory)));

    let node_types = &graph.summary.node_types;
    let layers = LAYERS
        .iter()
        .filter_map(|(name, kinds)| {
            let types: Vec<(NodeType, usize)> = kinds
                .iter()
                .filter_map(|k| node_types.get(k).map(|&c| (*k, c)))
                .filter(|(_, c)| *c > 0)
                .collect();
            let nodes: usize = types.iter().map(|(_, c)| c).sum();
            (nodes > 0).then_some(Layer {
                name: *name,
                nodes,
                types,
            })
        })
        .collect();

    Overview {
        project: graph.project.clone(),
        total_nodes: graph.summary.total_nodes,
        total_edges: graph.summary.total_edges,
        directories,
        relationships: by_count(graph.summary.edge_types.clone()),
        layers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::test_support::index;

    fn sample() -> GraphIndex {
        index(
            &[
                ("api/views.py", NodeType::Endpoint),
                ("api/urls.py", NodeType::Router),
                ("core/services.py", NodeType::Service),
                ("model:Order", NodeType::Collection),
                ("manage.py", NodeType::File),
            ],
            &[
                ("api/urls.py", "api/views.py", EdgeKind::Imports),
                ("api/views.py", "core/services.py", EdgeKind::Imports),
                ("core/services.py", "model:Order", EdgeKind::DbWrite),
                ("manage.py", "missing.py", EdgeKind::Imports),
            ],
        )
    }

    #[test]
    fn test_stats_counts_and_ghosts() {
        let report = stats(&sample());
        assert_eq!(report.total_nodes, 5);
        assert_eq!(report.total_edges, 3);
        assert_eq!(report.ghost_edges_removed, 1);
        assert_eq!(report.edge_types.get(&EdgeKind::Imports), Some(&2));
        assert_eq!(report.node_types.get(&NodeType::Endpoint), Some(&1));
        assert_eq!(report.top_hubs.len(), 5);
        assert_eq!(report.top_hubs[0].node.id, "api/views.py");
    }

    #[test]
    fn test_overview_directories_and_layers() {
        let report = overview(&sample());
        let dirs: Vec<(&str, usize)> = report
            .directories
            .iter()
            .map(|d| (d.directory.as_str(), d.nodes))
            .collect();
        assert_eq!(dirs, vec![(".", 2), ("api", 2), ("core", 1)]);
        assert_eq!(report.relationships[0], (EdgeKind::Imports, 2));

        let layers: Vec<(&str, usize)> = report.layers.iter().map(|l| (l.name, l.nodes)).collect();
        assert_eq!(layers, vec![("API", 2), ("Business logic", 1), ("Data", 1)]);
    }
}
