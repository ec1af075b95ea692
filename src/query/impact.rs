use std::collections::{BTreeSet, HashSet, VecDeque};

use petgraph::Direction;
use petgraph::graph::NodeIndex;
use serde::Serialize;

use crate::risk::RiskLevel;

use super::{GraphIndex, NodeRef, QueryError, RankedNode};

/// Levels of dependents reported by `impact`.
pub const MAX_IMPACT_DEPTH: usize = 3;

#[derive(Debug, Serialize)]
pub struct ImpactLevel {
    pub depth: usize,
    pub nodes: Vec<NodeRef>,
}

/// `impact`: who depends on a node, level by level.
#[derive(Debug, Serialize)]
pub struct ImpactReport {
    #[serde(flatten)]
    pub node: RankedNode,
    pub levels: Vec<ImpactLevel>,
    /// Distinct nodes across every level.
    pub total_affected: usize,
}

/// One changed path in a `changes` batch.
#[derive(Debug, Serialize)]
pub struct ChangedNode {
    #[serde(flatten)]
    pub node: RankedNode,
    pub affected: usize,
}

#[derive(Debug, Serialize)]
pub struct ChangesReport {
    pub changed: Vec<ChangedNode>,
    pub not_found: Vec<String>,
    /// Union of every changed node's impact set, minus the changed nodes.
    pub affected: Vec<NodeRef>,
    pub total_affected: usize,
    pub max_risk: RiskLevel,
}

/// Breadth-first walk over incoming edges from `start`, at most
/// [`MAX_IMPACT_DEPTH`] levels deep.
///
/// Each node is reported once, at the first level that reaches it; `start`
/// itself is never reported. Nodes within a level are in id order.
pub fn dependents_by_level(index: &GraphIndex, start: NodeIndex) -> Vec<Vec<NodeIndex>> {
    let mut levels: Vec<Vec<NodeIndex>> = Vec::new();
    let mut visited: HashSet<NodeIndex> = HashSet::from([start]);
    let mut queue: VecDeque<(NodeIndex, usize)> = VecDeque::from([(start, 0)]);

    while let Some((current, depth)) = queue.pop_front() {
        if depth == MAX_IMPACT_DEPTH {
            continue;
        }
        for (_, source) in index.edges(current, Direction::Incoming) {
            if visited.insert(source) {
                if levels.len() <= depth {
                    levels.resize_with(depth + 1, Vec::new);
                }
                levels[depth].push(source);
                queue.push_back((source, depth + 1));
            }
        }
    }

    for level in &mut levels {
        level.sort();
    }
    levels
}

pub fn impact(index: &GraphIndex, path: &str) -> Result<ImpactReport, QueryError> {
    let idx = index.resolve(path)?;
    let levels = dependents_by_level(index, idx);
    let total_affected = levels.iter().map(Vec::len).sum();
    Ok(ImpactReport {
        node: index.ranked_node(idx),
        levels: levels
            .into_iter()
            .enumerate()
            .map(|(i, nodes)| ImpactLevel {
                depth: i + 1,
                nodes: nodes.into_iter().map(|n| index.node_ref(n)).collect(),
            })
            .collect(),
        total_affected,
    })
}

/// Impact of a batch of paths. Fails only when none of them resolves.
pub fn changes(index: &GraphIndex, paths: &[String]) -> Result<ChangesReport, QueryError> {
    if paths.is_empty() {
        return Err(QueryError::BadArguments("changes needs at least one path".to_string()));
    }

    let mut changed = Vec::new();
    let mut changed_set: HashSet<NodeIndex> = HashSet::new();
    let mut not_found = Vec::new();
    let mut affected: BTreeSet<NodeIndex> = BTreeSet::new();

    for path in paths {
        let idx = match index.resolve(path) {
            Ok(idx) => idx,
            Err(QueryError::NotFound { .. }) => {
                not_found.push(path.clone());
                continue;
            }
            Err(err) => return Err(err),
        };
        if !changed_set.insert(idx) {
            continue;
        }
        let reached: Vec<NodeIndex> = dependents_by_level(index, idx).into_iter().flatten().collect();
        changed.push(ChangedNode {
            node: index.ranked_node(idx),
            affected: reached.len(),
        });
        affected.extend(reached);
    }

    if changed.is_empty() {
        return Err(QueryError::not_found("node", &paths.join(", ")));
    }

    let affected: Vec<NodeRef> = affected
        .into_iter()
        .filter(|idx| !changed_set.contains(idx))
        .map(|idx| index.node_ref(idx))
        .collect();
    let max_risk = changed
        .iter()
        .map(|c| c.node.risk)
        .max()
        .unwrap_or(RiskLevel::Low);

    Ok(ChangesReport {
        total_affected: affected.len(),
        changed,
        not_found,
        affected,
        max_risk,
    })
}
