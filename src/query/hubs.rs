use serde::Serialize;

use super::{GraphIndex, RankedNode};

pub const DEFAULT_HUBS: usize = 15;
pub const DEFAULT_RISKY: usize = 20;

/// `hubs` / `risky-files`: nodes by degree, highest first.
#[derive(Debug, Serialize)]
pub struct Ranking {
    pub total_nodes: usize,
    pub nodes: Vec<RankedNode>,
}

/// The `top` most connected nodes, ties broken by id.
pub fn hubs(index: &GraphIndex, top: usize) -> Ranking {
    Ranking {
        total_nodes: index.node_count(),
        nodes: index.ranked().iter().take(top).map(|&i| index.ranked_node(i)).collect(),
    }
}

/// Same order as [`hubs`], skipping nodes with no edges at all.
pub fn risky_files(index: &GraphIndex, top: usize) -> Ranking {
    Ranking {
        total_nodes: index.node_count(),
        nodes: index
            .ranked()
            .iter()
            .filter(|&&i| index.degree(i) > 0)
            .take(top)
            .map(|&i| index.ranked_node(i))
            .collect(),
    }
}
