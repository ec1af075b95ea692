use petgraph::graph::NodeIndex;
use serde::Serialize;

use super::{GraphIndex, TypeGroup};

/// Nodes listed per type unless `--all` is given.
pub const DEAD_CODE_GROUP_LIMIT: usize = 8;

/// `dead-code`: unconnected nodes and nodes nothing depends on.
#[derive(Debug, Serialize)]
pub struct DeadCodeReport {
    /// Nodes with no edges at all.
    pub isolated_total: usize,
    pub isolated: Vec<TypeGroup>,
    /// Nodes with outgoing edges but no dependents, excluding entry-point types.
    pub no_dependents_total: usize,
    pub no_dependents: Vec<TypeGroup>,
    pub truncated: bool,
}

/// Split the node set into (isolated, no-dependents), both in id order.
///
/// Every node of degree zero is isolated. A node with outgoing but no
/// incoming edges is reported unless its type is an entry point (routers,
/// endpoints, tests...), which are expected to have no dependents.
pub fn find_dead(index: &GraphIndex) -> (Vec<NodeIndex>, Vec<NodeIndex>) {
    let entry_points = &index.options().entry_point_types;
    let mut isolated = Vec::new();
    let mut no_dependents = Vec::new();
    for idx in index.indices() {
        if index.degree(idx) == 0 {
            isolated.push(idx);
        } else if index.in_degree(idx) == 0 && !entry_points.contains(&index.node(idx).kind) {
            no_dependents.push(idx);
        }
    }
    (isolated, no_dependents)
}

pub fn dead_code(index: &GraphIndex, all: bool) -> DeadCodeReport {
    let (isolated, no_dependents) = find_dead(index);
    let limit = (!all).then_some(DEAD_CODE_GROUP_LIMIT);
    let isolated_groups = index.group_by_type(&isolated, limit);
    let no_dependents_groups = index.group_by_type(&no_dependents, limit);
    let truncated = isolated_groups
        .iter()
        .chain(&no_dependents_groups)
        .any(|g| g.nodes.len() < g.total);

    DeadCodeReport {
        isolated_total: isolated.len(),
        isolated: isolated_groups,
        no_dependents_total: no_dependents.len(),
        no_dependents: no_dependents_groups,
        truncated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::edge::EdgeKind;
    use crate::graph::node::NodeType;
    use crate::query::test_support::{ids, index};

    fn ids_of(groups: &[TypeGroup]) -> Vec<&str> {
        groups.iter().flat_map(|g| ids(&g.nodes)).collect()
    }

    #[test]
    fn test_isolated_and_entry_points() {
        let idx = index(
            &[
                ("orphan.py", NodeType::File),
                ("old_router.py", NodeType::Router),
                ("urls.py", NodeType::Router),
                ("views.py", NodeType::Endpoint),
                ("script.py", NodeType::File),
                ("lib.py", NodeType::Utility),
            ],
            &[
                ("urls.py", "views.py", EdgeKind::Imports),
                ("views.py", "lib.py", EdgeKind::Imports),
                ("script.py", "lib.py", EdgeKind::Imports),
            ],
        );
        let report = dead_code(&idx, false);
        assert_eq!(ids_of(&report.isolated), vec!["orphan.py", "old_router.py"]);
        assert_eq!(report.isolated_total, 2, "an isolated router is still reported");
        assert_eq!(ids_of(&report.no_dependents), vec!["script.py"]);
        assert!(!report.truncated);
    }

    #[test]
    fn test_truncation_and_all_flag() {
        let nodes: Vec<(String, NodeType)> = (0..10).map(|i| (format!("dead{i}.py"), NodeType::File)).collect();
        let refs: Vec<(&str, NodeType)> = nodes.iter().map(|(i, k)| (i.as_str(), *k)).collect();
        let idx = index(&refs, &[]);

        let report = dead_code(&idx, false);
        assert_eq!(report.isolated_total, 10);
        assert_eq!(report.isolated[0].nodes.len(), DEAD_CODE_GROUP_LIMIT);
        assert!(report.truncated);

        let full = dead_code(&idx, true);
        assert_eq!(full.isolated[0].nodes.len(), 10);
        assert!(!full.truncated);
    }
}
