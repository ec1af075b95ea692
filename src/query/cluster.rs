use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::Direction;
use petgraph::graph::NodeIndex;
use serde::Serialize;

use crate::graph::edge::EdgeKind;

use super::{GraphIndex, NodeRef, QueryError, TypeGroup};

/// Members listed per type in a `cluster` report.
pub const CLUSTER_GROUP_LIMIT: usize = 8;

/// `cluster`: the connected component around a node.
#[derive(Debug, Serialize)]
pub struct ClusterReport {
    pub node: NodeRef,
    pub size: usize,
    pub groups: Vec<TypeGroup>,
}

/// One hop of a path, with the edge that links it to the previous hop.
#[derive(Debug, Serialize)]
pub struct PathStep {
    pub node: NodeRef,
    /// Edge type and whether it runs `forward` (previous -> this) or `backward`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub via: Option<(EdgeKind, &'static str)>,
}

/// `path`: shortest undirected path, or `found: false`.
#[derive(Debug, Serialize)]
pub struct PathReport {
    pub from: NodeRef,
    pub to: NodeRef,
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
    pub steps: Vec<PathStep>,
}

/// Flood fill over edges treated as undirected.
pub fn component(index: &GraphIndex, start: NodeIndex) -> Vec<NodeIndex> {
    let mut seen: HashSet<NodeIndex> = HashSet::from([start]);
    let mut queue: VecDeque<NodeIndex> = VecDeque::from([start]);
    while let Some(current) = queue.pop_front() {
        for next in index.undirected_neighbors(current) {
            if seen.insert(next) {
                queue.push_back(next);
            }
        }
    }
    let mut members: Vec<NodeIndex> = seen.into_iter().collect();
    members.sort();
    members
}

pub fn cluster(index: &GraphIndex, path: &str) -> Result<ClusterReport, QueryError> {
    let idx = index.resolve(path)?;
    let members = component(index, idx);
    Ok(ClusterReport {
        node: index.node_ref(idx),
        size: members.len(),
        groups: index.group_by_type(&members, Some(CLUSTER_GROUP_LIMIT)),
    })
}

/// Breadth-first search over the undirected adjacency. Neighbours are
/// expanded in id order, so among equally short paths the result is stable.
fn bfs_path(index: &GraphIndex, start: NodeIndex, goal: NodeIndex) -> Option<Vec<NodeIndex>> {
    let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();
    let mut seen: HashSet<NodeIndex> = HashSet::from([start]);
    let mut queue: VecDeque<NodeIndex> = VecDeque::from([start]);

    while let Some(current) = queue.pop_front() {
        if current == goal {
            let mut path = vec![goal];
            let mut at = goal;
            while let Some(&prev) = parent.get(&at) {
                path.push(prev);
                at = prev;
            }
            path.reverse();
            return Some(path);
        }
        for next in index.undirected_neighbors(current) {
            if seen.insert(next) {
                parent.insert(next, current);
                queue.push_back(next);
            }
        }
    }
    None
}

/// The edge linking `prev` to `next`, preferring the forward direction.
fn link(index: &GraphIndex, prev: NodeIndex, next: NodeIndex) -> Option<(EdgeKind, &'static str)> {
    index
        .edges(prev, Direction::Outgoing)
        .into_iter()
        .find(|(_, other)| *other == next)
        .map(|(edge, _)| (edge.kind, "forward"))
        .or_else(|| {
            index
                .edges(prev, Direction::Incoming)
                .into_iter()
                .find(|(_, other)| *other == next)
                .map(|(edge, _)| (edge.kind, "backward"))
        })
}

pub fn shortest_path(index: &GraphIndex, from: &str, to: &str) -> Result<PathReport, QueryError> {
    let start = index.resolve(from)?;
    let goal = index.resolve(to)?;
    let path = bfs_path(index, start, goal);

    let steps = path
        .as_deref()
        .unwrap_or_default()
        .iter()
        .enumerate()
        .map(|(i, &idx)| PathStep {
            node: index.node_ref(idx),
            via: match i {
                0 => None,
                _ => path.as_deref().and_then(|p| link(index, p[i - 1], idx)),
            },
        })
        .collect();

    Ok(PathReport {
        from: index.node_ref(start),
        to: index.node_ref(goal),
        found: path.is_some(),
        length: path.as_ref().map(|p| p.len() - 1),
        steps,
    })
}
