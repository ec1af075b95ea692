use std::fmt;

use serde::{Deserialize, Serialize};

/// The semantic role of a node in the code graph.
///
/// Serialized in snake_case (`external_api`, `cache_key`). The graph artifact
/// and the query output both use these names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// A plain source file with no stronger role signal.
    File,
    /// A request handler: a view, controller action, or declared route.
    Endpoint,
    /// A persisted model / database collection.
    Collection,
    /// A frontend component.
    Component,
    /// A service / use-case layer file or class.
    Service,
    /// A background or scheduled task.
    Task,
    /// A URL configuration or router file.
    Router,
    /// A serializer, schema, or DTO.
    Serializer,
    /// Middleware, guards, interceptors.
    Middleware,
    /// An outgoing or incoming webhook.
    Webhook,
    /// A signal / event channel.
    Event,
    /// A third-party HTTP API reached from the code.
    ExternalApi,
    /// A cache key (or the cache itself when the key is unknown).
    CacheKey,
    /// Helpers and shared utilities.
    Utility,
    /// Test code.
    Test,
    /// Configuration files.
    Config,
}

impl NodeType {
    /// Every node type, in declaration order.
    pub const ALL: [NodeType; 16] = [
        NodeType::File,
        NodeType::Endpoint,
        NodeType::Collection,
        NodeType::Component,
        NodeType::Service,
        NodeType::Task,
        NodeType::Router,
        NodeType::Serializer,
        NodeType::Middleware,
        NodeType::Webhook,
        NodeType::Event,
        NodeType::ExternalApi,
        NodeType::CacheKey,
        NodeType::Utility,
        NodeType::Test,
        NodeType::Config,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::File => "file",
            NodeType::Endpoint => "endpoint",
            NodeType::Collection => "collection",
            NodeType::Component => "component",
            NodeType::Service => "service",
            NodeType::Task => "task",
            NodeType::Router => "router",
            NodeType::Serializer => "serializer",
            NodeType::Middleware => "middleware",
            NodeType::Webhook => "webhook",
            NodeType::Event => "event",
            NodeType::ExternalApi => "external_api",
            NodeType::CacheKey => "cache_key",
            NodeType::Utility => "utility",
            NodeType::Test => "test",
            NodeType::Config => "config",
        }
    }

    /// Parse a type name as written in config files. Accepts `-` for `_`.
    pub fn from_str_loose(s: &str) -> Option<NodeType> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        NodeType::ALL.into_iter().find(|t| t.as_str() == wanted)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A uniquely identified entity in the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Deterministic identity: a project-relative path, `<path>::<symbol>`, or
    /// a global entity key such as `model:User`.
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeType,
    /// Short display label (file name, class name, route, cache key).
    pub label: String,
    /// Project-relative path of the file the node originates from.
    pub file: String,
    /// 1-based line of the definition or first reference, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl Node {
    pub fn new(id: impl Into<String>, kind: NodeType, label: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            label: label.into(),
            file: file.into(),
            line: None,
        }
    }

    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }
}
