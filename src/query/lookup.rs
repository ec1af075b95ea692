use petgraph::Direction;
use serde::Serialize;

use crate::graph::edge::EdgeKind;
use crate::graph::node::NodeType;

use super::{GraphIndex, Neighbor, NodeRef, QueryError, RankedNode};

/// Default number of `search` hits returned.
pub const SEARCH_LIMIT: usize = 20;

/// `file`: one node, its risk, and every edge touching it.
#[derive(Debug, Serialize)]
pub struct FileReport {
    #[serde(flatten)]
    pub node: RankedNode,
    pub is_hub: bool,
    pub outgoing_edges: Vec<Neighbor>,
    pub incoming_edges: Vec<Neighbor>,
}

/// `deps` / `dependents`: depth-1 edges in one direction.
#[derive(Debug, Serialize)]
pub struct EdgeList {
    pub node: NodeRef,
    pub direction: &'static str,
    pub edges: Vec<Neighbor>,
}

/// `model`: who reads and who writes a collection.
#[derive(Debug, Serialize)]
pub struct ModelReport {
    #[serde(flatten)]
    pub node: RankedNode,
    pub readers: Vec<NodeRef>,
    pub writers: Vec<NodeRef>,
    /// Incoming edges that are neither reads nor writes (definitions, imports).
    pub other: Vec<Neighbor>,
}

#[derive(Debug, Serialize)]
pub struct SearchReport {
    pub query: String,
    pub total: usize,
    pub results: Vec<RankedNode>,
}

pub fn file(index: &GraphIndex, path: &str) -> Result<FileReport, QueryError> {
    let idx = index.resolve(path)?;
    Ok(FileReport {
        node: index.ranked_node(idx),
        is_hub: index.is_hub(idx),
        outgoing_edges: index.neighbors(idx, Direction::Outgoing),
        incoming_edges: index.neighbors(idx, Direction::Incoming),
    })
}

pub fn edges(index: &GraphIndex, path: &str, direction: Direction) -> Result<EdgeList, QueryError> {
    let idx = index.resolve(path)?;
    Ok(EdgeList {
        node: index.node_ref(idx),
        direction: match direction {
            Direction::Outgoing => "outgoing",
            Direction::Incoming => "incoming",
        },
        edges: index.neighbors(idx, direction),
    })
}

/// Resolve a collection by label: exact (case-insensitive) first, then the
/// smallest id whose label contains `name`.
pub fn model(index: &GraphIndex, name: &str) -> Result<ModelReport, QueryError> {
    let wanted = name.trim().trim_start_matches("model:").to_lowercase();
    if wanted.is_empty() {
        return Err(QueryError::BadArguments("model name is empty".to_string()));
    }
    let collections: Vec<_> = index
        .indices()
        .filter(|&i| index.node(i).kind == NodeType::Collection)
        .collect();
    let idx = collections
        .iter()
        .find(|&&i| index.node(i).label.to_lowercase() == wanted)
        .or_else(|| {
            collections
                .iter()
                .find(|&&i| index.node(i).label.to_lowercase().contains(&wanted))
        })
        .copied()
        .ok_or_else(|| QueryError::not_found("model", name))?;

    let mut readers = Vec::new();
    let mut writers = Vec::new();
    let mut other = Vec::new();
    for neighbor in index.neighbors(idx, Direction::Incoming) {
        match neighbor.kind {
            EdgeKind::DbRead => readers.push(neighbor.node),
            EdgeKind::DbWrite => writers.push(neighbor.node),
            _ => other.push(neighbor),
        }
    }
    readers.dedup_by(|a, b| a.id == b.id);
    writers.dedup_by(|a, b| a.id == b.id);

    Ok(ModelReport {
        node: index.ranked_node(idx),
        readers,
        writers,
        other,
    })
}

/// Case-insensitive substring match over label and file path, highest degree first.
pub fn search(index: &GraphIndex, query: &str, limit: Option<usize>) -> Result<SearchReport, QueryError> {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return Err(QueryError::BadArguments("search query is empty".to_string()));
    }
    let hits: Vec<_> = index
        .ranked()
        .iter()
        .copied()
        .filter(|&i| {
            let node = index.node(i);
            node.label.to_lowercase().contains(&q) || node.file.to_lowercase().contains(&q)
        })
        .collect();
    let total = hits.len();
    Ok(SearchReport {
        query: query.to_string(),
        total,
        results: hits
            .into_iter()
            .take(limit.unwrap_or(total))
            .map(|i| index.ranked_node(i))
            .collect(),
    })
}
