pub mod cluster;
pub mod dead_code;
pub mod endpoint;
pub mod hubs;
pub mod impact;
pub mod lookup;
pub mod output;
pub mod report;
pub mod stats;

use std::collections::HashMap;
use std::path::PathBuf;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{DEFAULT_HUB_TOP_K, default_entry_point_types};
use crate::graph::CodeGraph;
use crate::graph::edge::{Edge, EdgeKind};
use crate::graph::node::{Node, NodeType};
use crate::graph::validate::validate;
use crate::risk::{RiskLevel, rank_by_degree};

/// Categorized query failure. Each variant maps to its own exit code.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("no graph found at {} (run `code-graph analyze <root>` first)", path.display())]
    NotInitialized { path: PathBuf },

    #[error("no {kind} matching '{query}'")]
    NotFound { kind: &'static str, query: String },

    #[error("bad arguments: {0}")]
    BadArguments(String),

    #[error("graph artifact {} is corrupt: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },
}

impl QueryError {
    pub fn exit_code(&self) -> i32 {
        match self {
            QueryError::Corrupt { .. } => 1,
            QueryError::BadArguments(_) => 2,
            QueryError::NotInitialized { .. } => 3,
            QueryError::NotFound { .. } => 4,
        }
    }

    pub(crate) fn not_found(kind: &'static str, query: &str) -> Self {
        QueryError::NotFound {
            kind,
            query: query.to_string(),
        }
    }
}

/// Knobs read from the `[query]` config section.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub hub_top_k: usize,
    pub entry_point_types: Vec<NodeType>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            hub_top_k: DEFAULT_HUB_TOP_K,
            entry_point_types: default_entry_point_types(),
        }
    }
}

/// A node as it appears in query results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeRef {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeType,
    pub label: String,
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

/// One edge seen from a node: the edge type and the node on the other end.
#[derive(Debug, Clone, Serialize)]
pub struct Neighbor {
    #[serde(rename = "type")]
    pub kind: EdgeKind,
    pub node: NodeRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

/// A node together with its degree and risk classification.
#[derive(Debug, Clone, Serialize)]
pub struct RankedNode {
    #[serde(flatten)]
    pub node: NodeRef,
    pub degree: usize,
    pub incoming: usize,
    pub outgoing: usize,
    pub risk: RiskLevel,
}

/// Nodes of one type, possibly truncated.
#[derive(Debug, Clone, Serialize)]
pub struct TypeGroup {
    #[serde(rename = "type")]
    pub kind: NodeType,
    pub total: usize,
    pub nodes: Vec<NodeRef>,
}

/// Read-only adjacency view over a validated graph.
///
/// Node indices follow ascending id order, so sorting by index sorts by id.
pub struct GraphIndex {
    graph: CodeGraph,
    nodes: Vec<Node>,
    pg: DiGraph<String, Edge>,
    by_id: HashMap<String, NodeIndex>,
    degrees: Vec<usize>,
    hub_rank: Vec<NodeIndex>,
    options: QueryOptions,
}

impl GraphIndex {
    /// Validate `graph` once more and index it.
    ///
    /// Ghost edges found here (a hand-edited or stale artifact) are dropped and
    /// added to `summary.ghost_edges_removed`.
    pub fn new(mut graph: CodeGraph, options: QueryOptions) -> Self {
        let ghosts = validate(&mut graph);
        if ghosts > 0 {
            warn!(ghosts, "artifact contained edges to unknown nodes, dropped");
        }

        let nodes: Vec<Node> = graph.nodes.values().cloned().collect();
        let mut pg = DiGraph::with_capacity(nodes.len(), graph.edges.len());
        let mut by_id = HashMap::with_capacity(nodes.len());
        for node in &nodes {
            let idx = pg.add_node(node.id.clone());
            by_id.insert(node.id.clone(), idx);
        }
        for edge in &graph.edges {
            if let (Some(&s), Some(&t)) = (by_id.get(&edge.source), by_id.get(&edge.target)) {
                pg.add_edge(s, t, edge.clone());
            }
        }

        let degrees: Vec<usize> = pg
            .node_indices()
            .map(|idx| {
                pg.edges_directed(idx, Direction::Incoming).count()
                    + pg.edges_directed(idx, Direction::Outgoing).count()
            })
            .collect();
        let hub_rank = rank_by_degree(nodes.iter().zip(&degrees).map(|(n, d)| (n.id.as_str(), *d)))
            .into_iter()
            .filter_map(|(id, _)| by_id.get(id).copied())
            .collect();

        debug!(nodes = nodes.len(), edges = pg.edge_count(), "graph indexed");
        Self {
            graph,
            nodes,
            pg,
            by_id,
            degrees,
            hub_rank,
            options,
        }
    }

    pub fn graph(&self) -> &CodeGraph {
        &self.graph
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.pg.node_indices()
    }

    pub fn node(&self, idx: NodeIndex) -> &Node {
        &self.nodes[idx.index()]
    }

    pub fn node_ref(&self, idx: NodeIndex) -> NodeRef {
        let node = self.node(idx);
        NodeRef {
            id: node.id.clone(),
            kind: node.kind,
            label: node.label.clone(),
            file: node.file.clone(),
            line: node.line,
        }
    }

    pub fn degree(&self, idx: NodeIndex) -> usize {
        self.degrees[idx.index()]
    }

    pub fn in_degree(&self, idx: NodeIndex) -> usize {
        self.pg.edges_directed(idx, Direction::Incoming).count()
    }

    pub fn out_degree(&self, idx: NodeIndex) -> usize {
        self.pg.edges_directed(idx, Direction::Outgoing).count()
    }

    /// Every node ordered by degree descending, ties by id ascending.
    pub fn ranked(&self) -> &[NodeIndex] {
        &self.hub_rank
    }

    pub fn is_hub(&self, idx: NodeIndex) -> bool {
        self.hub_rank.iter().take(self.options.hub_top_k).any(|&h| h == idx)
    }

    pub fn risk(&self, idx: NodeIndex) -> RiskLevel {
        RiskLevel::classify(self.degree(idx), self.is_hub(idx))
    }

    pub fn ranked_node(&self, idx: NodeIndex) -> RankedNode {
        RankedNode {
            node: self.node_ref(idx),
            degree: self.degree(idx),
            incoming: self.in_degree(idx),
            outgoing: self.out_degree(idx),
            risk: self.risk(idx),
        }
    }

    /// Edges touching `idx` in `direction`, as (edge, other end), sorted by
    /// edge type then by the other end's id.
    pub fn edges(&self, idx: NodeIndex, direction: Direction) -> Vec<(&Edge, NodeIndex)> {
        let mut edges: Vec<(&Edge, NodeIndex)> = self
            .pg
            .edges_directed(idx, direction)
            .map(|e| {
                let other = match direction {
                    Direction::Incoming => e.source(),
                    Direction::Outgoing => e.target(),
                };
                (e.weight(), other)
            })
            .collect();
        edges.sort_by(|a, b| a.0.kind.cmp(&b.0.kind).then(a.1.cmp(&b.1)).then(a.0.line.cmp(&b.0.line)));
        edges
    }

    pub fn neighbors(&self, idx: NodeIndex, direction: Direction) -> Vec<Neighbor> {
        self.edges(idx, direction)
            .into_iter()
            .map(|(edge, other)| Neighbor {
                kind: edge.kind,
                node: self.node_ref(other),
                line: edge.line,
            })
            .collect()
    }

    /// Distinct neighbours ignoring direction, in id order.
    pub fn undirected_neighbors(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut out: Vec<NodeIndex> = self.pg.neighbors_undirected(idx).collect();
        out.sort();
        out.dedup();
        out
    }

    /// Look up a node from a user-supplied path or id.
    ///
    /// Tries, in order: the exact id; the normalized path (`./`, `\`, leading
    /// `/` stripped); nodes whose file equals that path, preferring the file
    /// node; the smallest id ending in `/<query>` or `::<query>`.
    pub fn resolve(&self, query: &str) -> Result<NodeIndex, QueryError> {
        if let Some(&idx) = self.by_id.get(query) {
            return Ok(idx);
        }
        let wanted = normalize_query(query);
        if wanted.is_empty() {
            return Err(QueryError::BadArguments(format!("empty path {query:?}")));
        }
        if let Some(&idx) = self.by_id.get(wanted.as_str()) {
            return Ok(idx);
        }

        let in_file: Vec<NodeIndex> = self
            .indices()
            .filter(|&idx| self.node(idx).file == wanted)
            .collect();
        if let Some(&idx) = in_file
            .iter()
            .find(|&&idx| self.node(idx).kind == NodeType::File)
            .or(in_file.first())
        {
            return Ok(idx);
        }

        let by_path = format!("/{wanted}");
        let by_symbol = format!("::{wanted}");
        self.indices()
            .find(|&idx| {
                let id = &self.node(idx).id;
                id.ends_with(&by_path) || id.ends_with(&by_symbol)
            })
            .ok_or_else(|| QueryError::not_found("node", query))
    }

    /// Group `indices` by node type, largest group first, each truncated to
    /// `limit` nodes in id order.
    pub fn group_by_type(&self, indices: &[NodeIndex], limit: Option<usize>) -> Vec<TypeGroup> {
        let mut groups: HashMap<NodeType, Vec<NodeIndex>> = HashMap::new();
        for &idx in indices {
            groups.entry(self.node(idx).kind).or_default().push(idx);
        }
        let mut groups: Vec<TypeGroup> = groups
            .into_iter()
            .map(|(kind, mut members)| {
                members.sort();
                let total = members.len();
                let shown = limit.unwrap_or(total);
                TypeGroup {
                    kind,
                    total,
                    nodes: members.into_iter().take(shown).map(|i| self.node_ref(i)).collect(),
                }
            })
            .collect();
        groups.sort_by(|a, b| b.total.cmp(&a.total).then(a.kind.cmp(&b.kind)));
        groups
    }
}

fn normalize_query(query: &str) -> String {
    let mut q = query.trim().replace('\\', "/");
    while let Some(rest) = q.strip_prefix("./") {
        q = rest.to_string();
    }
    q.trim_matches('/').to_string()
}

/// One query against the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    File { path: String },
    Deps { path: String },
    Dependents { path: String },
    Impact { path: String },
    Model { name: String },
    Hubs { top: usize },
    Cluster { path: String },
    Path { from: String, to: String },
    Search { query: String, limit: Option<usize> },
    Stats,
    DeadCode { all: bool },
    RiskyFiles { top: usize },
    Endpoint { path: String },
    Overview,
    Report,
    Gaps,
    Changes { paths: Vec<String> },
}

impl Request {
    pub fn name(&self) -> &'static str {
        match self {
            Request::File { .. } => "file",
            Request::Deps { .. } => "deps",
            Request::Dependents { .. } => "dependents",
            Request::Impact { .. } => "impact",
            Request::Model { .. } => "model",
            Request::Hubs { .. } => "hubs",
            Request::Cluster { .. } => "cluster",
            Request::Path { .. } => "path",
            Request::Search { .. } => "search",
            Request::Stats => "stats",
            Request::DeadCode { .. } => "dead-code",
            Request::RiskyFiles { .. } => "risky-files",
            Request::Endpoint { .. } => "endpoint",
            Request::Overview => "overview",
            Request::Report => "report",
            Request::Gaps => "gaps",
            Request::Changes { .. } => "changes",
        }
    }
}

/// The answer to one [`Request`]. Serializes as the inner result.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum QueryOutput {
    File(lookup::FileReport),
    Edges(lookup::EdgeList),
    Impact(impact::ImpactReport),
    Model(lookup::ModelReport),
    Hubs(hubs::Ranking),
    Cluster(cluster::ClusterReport),
    Path(cluster::PathReport),
    Search(lookup::SearchReport),
    Stats(stats::StatsReport),
    DeadCode(dead_code::DeadCodeReport),
    Endpoint(endpoint::EndpointReport),
    Overview(stats::Overview),
    Report(report::ProjectReport),
    Gaps(report::GapReport),
    Changes(impact::ChangesReport),
}

/// Answer `request` against `index`.
pub fn execute(index: &GraphIndex, request: &Request) -> Result<QueryOutput, QueryError> {
    debug!(command = request.name(), "executing query");
    Ok(match request {
        Request::File { path } => QueryOutput::File(lookup::file(index, path)?),
        Request::Deps { path } => QueryOutput::Edges(lookup::edges(index, path, Direction::Outgoing)?),
        Request::Dependents { path } => QueryOutput::Edges(lookup::edges(index, path, Direction::Incoming)?),
        Request::Impact { path } => QueryOutput::Impact(impact::impact(index, path)?),
        Request::Model { name } => QueryOutput::Model(lookup::model(index, name)?),
        Request::Hubs { top } => QueryOutput::Hubs(hubs::hubs(index, *top)),
        Request::Cluster { path } => QueryOutput::Cluster(cluster::cluster(index, path)?),
        Request::Path { from, to } => QueryOutput::Path(cluster::shortest_path(index, from, to)?),
        Request::Search { query, limit } => QueryOutput::Search(lookup::search(index, query, *limit)?),
        Request::Stats => QueryOutput::Stats(stats::stats(index)),
        Request::DeadCode { all } => QueryOutput::DeadCode(dead_code::dead_code(index, *all)),
        Request::RiskyFiles { top } => QueryOutput::Hubs(hubs::risky_files(index, *top)),
        Request::Endpoint { path } => QueryOutput::Endpoint(endpoint::endpoint(index, path)?),
        Request::Overview => QueryOutput::Overview(stats::overview(index)),
        Request::Report => QueryOutput::Report(report::report(index)),
        Request::Gaps => QueryOutput::Gaps(report::gaps(index)),
        Request::Changes { paths } => QueryOutput::Changes(impact::changes(index, paths)?),
    })
}
