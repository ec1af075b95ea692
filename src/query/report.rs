use std::collections::{BTreeMap, HashSet};

use petgraph::graph::NodeIndex;
use serde::Serialize;

use crate::graph::node::NodeType;

use super::dead_code::{DeadCodeReport, dead_code};
use super::hubs::{Ranking, hubs, risky_files};
use super::stats::{Overview, overview};
use super::{GraphIndex, RankedNode};

/// Entries in each ranked section of `report`.
const REPORT_TOP: usize = 10;
/// Degree at which an untested node is called out by `gaps`.
const UNTESTED_DEGREE: usize = 8;
/// Types that are not expected to have tests of their own.
const UNTESTABLE: &[NodeType] = &[NodeType::Test, NodeType::Config, NodeType::Router, NodeType::Component];

#[derive(Debug, Serialize)]
pub struct TypeGap {
    #[serde(rename = "type")]
    pub kind: NodeType,
    pub nodes: usize,
}

/// `gaps`: where tests are missing.
#[derive(Debug, Serialize)]
pub struct GapReport {
    pub test_nodes: usize,
    /// Nodes adjacent to at least one test.
    pub tested_nodes: usize,
    /// Node types present in the graph with no test-connected node at all.
    pub untested_types: Vec<TypeGap>,
    pub high_risk_untested: Vec<RankedNode>,
}

/// `report`: the usual first look at a project in one call.
#[derive(Debug, Serialize)]
pub struct ProjectReport {
    pub overview: Overview,
    pub ghost_edges_removed: usize,
    pub hubs: Ranking,
    pub risky: Ranking,
    pub dead_code: DeadCodeReport,
    pub gaps: GapReport,
}

/// Non-test nodes with an edge to or from a test node.
fn test_connected(index: &GraphIndex) -> HashSet<NodeIndex> {
    index
        .indices()
        .filter(|&i| index.node(i).kind == NodeType::Test)
        .flat_map(|t| index.undirected_neighbors(t))
        .filter(|&n| index.node(n).kind != NodeType::Test)
        .collect()
}

pub fn gaps(index: &GraphIndex) -> GapReport {
    let tested = test_connected(index);

    let mut per_type: BTreeMap<NodeType, (usize, bool)> = BTreeMap::new();
    let mut test_nodes = 0;
    for idx in index.indices() {
        let kind = index.node(idx).kind;
        if kind == NodeType::Test {
            test_nodes += 1;
            continue;
        }
        let entry = per_type.entry(kind).or_insert((0, false));
        entry.0 += 1;
        entry.1 |= tested.contains(&idx);
    }
    let mut untested_types: Vec<TypeGap> = per_type
        .into_iter()
        .filter(|(_, (_, any_tested))| !any_tested)
        .map(|(kind, (nodes, _))| TypeGap { kind, nodes })
        .collect();
    untested_types.sort_by(|a, b| b.nodes.cmp(&a.nodes).then(a.kind.cmp(&b.kind)));

    let high_risk_untested = index
        .ranked()
        .iter()
        .filter(|&&i| {
            index.degree(i) >= UNTESTED_DEGREE
                && !UNTESTABLE.contains(&index.node(i).kind)
                && !tested.contains(&i)
        })
        .take(REPORT_TOP)
        .map(|&i| index.ranked_node(i))
        .collect();

    GapReport {
        test_nodes,
        tested_nodes: tested.len(),
        untested_types,
        high_risk_untested,
    }
}

pub fn report(index: &GraphIndex) -> ProjectReport {
    ProjectReport {
        overview: overview(index),
        ghost_edges_removed: index.graph().summary.ghost_edges_removed,
        hubs: hubs(index, REPORT_TOP),
        risky: risky_files(index, REPORT_TOP),
        dead_code: dead_code(index, false),
        gaps: gaps(index),
    }
}
