use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of directed edge between two nodes in the code graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// File -> File: the source file imports the target module.
    Imports,
    /// Code -> Collection: a query reading the model.
    DbRead,
    /// Code -> Collection: a create/update/delete on the model.
    DbWrite,
    /// Code -> CacheKey: cache lookup.
    CacheRead,
    /// Code -> CacheKey: cache store or invalidation.
    CacheWrite,
    /// Code -> ExternalApi: outgoing HTTP call.
    ApiCall,
    /// File -> Endpoint: the file declares a request handler or route.
    EndpointHandler,
    /// Class -> Base: declared base class or implemented interface.
    Inherits,
    /// Code -> Webhook: webhook delivery.
    Webhook,
    /// Code -> Event: signal / event emission.
    EventEmit,
    /// Code -> Event: signal receiver / event subscription.
    EventListen,
    /// File -> Task: the file declares a background or scheduled task.
    TaskSchedule,
    /// File -> Middleware: the file declares middleware.
    MiddlewareChain,
    /// File -> Symbol: the file declares a model, serializer, service or view class.
    Defines,
}

impl EdgeKind {
    /// Every edge kind, in declaration order.
    pub const ALL: [EdgeKind; 14] = [
        EdgeKind::Imports,
        EdgeKind::DbRead,
        EdgeKind::DbWrite,
        EdgeKind::CacheRead,
        EdgeKind::CacheWrite,
        EdgeKind::ApiCall,
        EdgeKind::EndpointHandler,
        EdgeKind::Inherits,
        EdgeKind::Webhook,
        EdgeKind::EventEmit,
        EdgeKind::EventListen,
        EdgeKind::TaskSchedule,
        EdgeKind::MiddlewareChain,
        EdgeKind::Defines,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Imports => "imports",
            EdgeKind::DbRead => "db_read",
            EdgeKind::DbWrite => "db_write",
            EdgeKind::CacheRead => "cache_read",
            EdgeKind::CacheWrite => "cache_write",
            EdgeKind::ApiCall => "api_call",
            EdgeKind::EndpointHandler => "endpoint_handler",
            EdgeKind::Inherits => "inherits",
            EdgeKind::Webhook => "webhook",
            EdgeKind::EventEmit => "event_emit",
            EdgeKind::EventListen => "event_listen",
            EdgeKind::TaskSchedule => "task_schedule",
            EdgeKind::MiddlewareChain => "middleware_chain",
            EdgeKind::Defines => "defines",
        }
    }

    /// Storage and cache edges: the tail of an endpoint request chain.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            EdgeKind::DbRead | EdgeKind::DbWrite | EdgeKind::CacheRead | EdgeKind::CacheWrite
        )
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed, directed relationship between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub kind: EdgeKind,
    /// 1-based line of the statement that produced the edge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>, kind: EdgeKind) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
            line: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_kind_names_round_trip_through_serde() {
        for kind in EdgeKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn test_storage_kinds() {
        assert!(EdgeKind::DbWrite.is_storage());
        assert!(EdgeKind::CacheRead.is_storage());
        assert!(!EdgeKind::Imports.is_storage());
        assert!(!EdgeKind::ApiCall.is_storage());
    }
}
