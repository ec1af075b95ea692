use petgraph::Direction;
use petgraph::graph::NodeIndex;
use serde::Serialize;

use crate::graph::edge::EdgeKind;
use crate::graph::node::NodeType;

use super::{GraphIndex, NodeRef, QueryError};

/// Endpoints traced per query.
const MAX_ENDPOINTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Handler,
    Service,
    Storage,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Handler => "handler",
            Stage::Service => "service",
            Stage::Storage => "storage",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChainLink {
    pub stage: Stage,
    #[serde(rename = "type")]
    pub kind: EdgeKind,
    pub from: NodeRef,
    pub to: NodeRef,
}

#[derive(Debug, Serialize)]
pub struct EndpointChain {
    pub endpoint: NodeRef,
    pub chain: Vec<ChainLink>,
}

#[derive(Debug, Serialize)]
pub struct EndpointReport {
    pub total: usize,
    pub endpoints: Vec<EndpointChain>,
}

/// Endpoints named by `query`: the node itself, the endpoints a file
/// declares, or endpoints whose label contains the query.
fn find_endpoints(index: &GraphIndex, query: &str) -> Vec<NodeIndex> {
    if let Ok(idx) = index.resolve(query) {
        if index.node(idx).kind == NodeType::Endpoint && index.out_degree(idx) == 0 {
            return vec![idx];
        }
        let declared: Vec<NodeIndex> = index
            .edges(idx, Direction::Outgoing)
            .into_iter()
            .filter(|(edge, _)| edge.kind == EdgeKind::EndpointHandler)
            .map(|(_, target)| target)
            .collect();
        if !declared.is_empty() {
            return declared;
        }
        if index.node(idx).kind == NodeType::Endpoint {
            return vec![idx];
        }
    }

    let wanted = query.trim().to_lowercase();
    index
        .indices()
        .filter(|&i| {
            let node = index.node(i);
            node.kind == NodeType::Endpoint && node.label.to_lowercase().contains(&wanted)
        })
        .collect()
}

/// Follow handler -> service -> storage from one endpoint, as far as edges go.
fn trace(index: &GraphIndex, endpoint: NodeIndex) -> Vec<ChainLink> {
    let link = |stage, kind, from: NodeIndex, to: NodeIndex| ChainLink {
        stage,
        kind,
        from: index.node_ref(from),
        to: index.node_ref(to),
    };
    let mut chain = Vec::new();

    let mut handlers: Vec<NodeIndex> = Vec::new();
    for (edge, source) in index.edges(endpoint, Direction::Incoming) {
        if edge.kind == EdgeKind::EndpointHandler {
            chain.push(link(Stage::Handler, edge.kind, source, endpoint));
            handlers.push(source);
        }
    }
    if handlers.is_empty() {
        // A file classified as an endpoint is its own handler.
        handlers.push(endpoint);
    }

    let mut services: Vec<NodeIndex> = Vec::new();
    for &handler in &handlers {
        for (edge, target) in index.edges(handler, Direction::Outgoing) {
            if index.node(target).kind == NodeType::Service
                && matches!(edge.kind, EdgeKind::Imports | EdgeKind::Inherits)
            {
                chain.push(link(Stage::Service, edge.kind, handler, target));
                if !services.contains(&target) {
                    services.push(target);
                }
            }
        }
    }

    for &caller in handlers.iter().chain(&services) {
        for (edge, target) in index.edges(caller, Direction::Outgoing) {
            if edge.kind.is_storage() {
                chain.push(link(Stage::Storage, edge.kind, caller, target));
            }
        }
    }
    chain
}

pub fn endpoint(index: &GraphIndex, path: &str) -> Result<EndpointReport, QueryError> {
    let found = find_endpoints(index, path);
    if found.is_empty() {
        return Err(QueryError::not_found("endpoint", path));
    }
    Ok(EndpointReport {
        total: found.len(),
        endpoints: found
            .into_iter()
            .take(MAX_ENDPOINTS)
            .map(|ep| EndpointChain {
                endpoint: index.node_ref(ep),
                chain: trace(index, ep),
            })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::test_support::index;

    fn api() -> GraphIndex {
        index(
            &[
                ("api/orders.py", NodeType::File),
                ("api/orders.py::GET /orders", NodeType::Endpoint),
                ("api/orders.py::POST /orders", NodeType::Endpoint),
                ("core/order_service.py", NodeType::Service),
                ("cache:orders", NodeType::CacheKey),
                ("model:Order", NodeType::Collection),
                ("lib/util.py", NodeType::Utility),
            ],
            &[
                ("api/orders.py", "api/orders.py::GET /orders", EdgeKind::EndpointHandler),
                ("api/orders.py", "api/orders.py::POST /orders", EdgeKind::EndpointHandler),
                ("api/orders.py", "core/order_service.py", EdgeKind::Imports),
                ("api/orders.py", "lib/util.py", EdgeKind::Imports),
                ("api/orders.py", "cache:orders", EdgeKind::CacheRead),
                ("core/order_service.py", "model:Order", EdgeKind::DbWrite),
            ],
        )
    }

    fn stages(chain: &[ChainLink]) -> Vec<(Stage, &str)> {
        chain.iter().map(|l| (l.stage, l.to.id.as_str())).collect()
    }

    #[test]
    fn test_chain_follows_handler_service_storage() {
        let report = endpoint(&api(), "GET /orders").unwrap();
        assert_eq!(report.total, 1);
        let chain = &report.endpoints[0].chain;
        assert_eq!(
            stages(chain),
            vec![
                (Stage::Handler, "api/orders.py::GET /orders"),
                (Stage::Service, "core/order_service.py"),
                (Stage::Storage, "cache:orders"),
                (Stage::Storage, "model:Order"),
            ]
        );
    }

    #[test]
    fn test_file_query_lists_declared_endpoints() {
        let report = endpoint(&api(), "api/orders.py").unwrap();
        assert_eq!(report.total, 2);
        assert_eq!(report.endpoints[1].endpoint.id, "api/orders.py::POST /orders");
    }

    #[test]
    fn test_label_substring_is_case_insensitive() {
        let report = endpoint(&api(), "ORDER").unwrap();
        assert_eq!(report.total, 2);
        assert_eq!(report.endpoints[0].endpoint.id, "api/orders.py::GET /orders");
    }

    #[test]
    fn test_unknown_endpoint() {
        assert!(matches!(endpoint(&api(), "/nothing"), Err(QueryError::NotFound { .. })));
    }
}
