use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::DEFAULT_OUTPUT;
use crate::graph::edge::Edge;
use crate::graph::node::Node;
use crate::graph::{CodeGraph, Summary, Warning};
use crate::query::QueryError;

/// Artifact format version. Bump when the JSON layout changes incompatibly.
pub const ARTIFACT_VERSION: u32 = 1;

/// Locations tried, in order, when the requested artifact does not exist.
pub const FALLBACK_ARTIFACTS: &[&str] = &["code_graph.json", ".claude/code_graph.json"];

/// The persisted graph document.
#[derive(Debug, Serialize, Deserialize)]
pub struct GraphArtifact {
    pub version: u32,
    #[serde(default)]
    pub project: String,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub summary: Summary,
    #[serde(default)]
    pub warnings: Vec<Warning>,
}

impl From<&CodeGraph> for GraphArtifact {
    fn from(graph: &CodeGraph) -> Self {
        Self {
            version: ARTIFACT_VERSION,
            project: graph.project.clone(),
            nodes: graph.nodes.values().cloned().collect(),
            edges: graph.edges.clone(),
            summary: graph.summary.clone(),
            warnings: graph.warnings.clone(),
        }
    }
}

impl GraphArtifact {
    /// Rebuild the in-memory graph. A repeated node id keeps its first entry.
    pub fn into_graph(self) -> CodeGraph {
        let mut graph = CodeGraph::new(self.project);
        for node in self.nodes {
            let id = node.id.clone();
            if !graph.add_node(node) {
                warn!(%id, "duplicate node id in artifact, keeping the first");
            }
        }
        graph.edges = self.edges;
        graph.summary = self.summary;
        graph.warnings = self.warnings;
        graph
    }
}

/// Write `graph` to `path` atomically.
///
/// The document goes to a temporary file in the destination directory which
/// is then renamed over `path`, so a concurrent reader sees either the old or
/// the new artifact in full.
pub fn save(graph: &CodeGraph, path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let tmp = tempfile::NamedTempFile::new_in(&dir)
        .with_context(|| format!("failed to create a temporary file in {}", dir.display()))?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        serde_json::to_writer_pretty(&mut writer, &GraphArtifact::from(graph))
            .context("failed to serialize graph")?;
        writer.flush().context("failed to write graph")?;
    }
    tmp.as_file().sync_all().context("failed to sync graph")?;
    tmp.persist(path)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    debug!(path = %path.display(), "graph written");
    Ok(())
}

/// Read and decode the artifact at `path`.
pub fn load(path: &Path) -> Result<CodeGraph, QueryError> {
    let bytes = std::fs::read(path).map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            QueryError::NotInitialized {
                path: path.to_path_buf(),
            }
        } else {
            QueryError::Corrupt {
                path: path.to_path_buf(),
                reason: err.to_string(),
            }
        }
    })?;

    let artifact: GraphArtifact = serde_json::from_slice(&bytes).map_err(|err| QueryError::Corrupt {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    if artifact.version != ARTIFACT_VERSION {
        return Err(QueryError::Corrupt {
            path: path.to_path_buf(),
            reason: format!("unsupported artifact version {}", artifact.version),
        });
    }
    Ok(artifact.into_graph())
}

/// Pick the artifact to query: `requested` (or the default name) if it
/// exists, else the first existing fallback location.
pub fn discover(requested: Option<&Path>) -> Result<PathBuf, QueryError> {
    let primary = requested
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));
    if primary.is_file() {
        return Ok(primary);
    }
    FALLBACK_ARTIFACTS
        .iter()
        .map(PathBuf::from)
        .find(|candidate| candidate.is_file())
        .ok_or(QueryError::NotInitialized { path: primary })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::edge::EdgeKind;
    use crate::graph::node::NodeType;

    fn sample() -> CodeGraph {
        let mut graph = CodeGraph::new("demo");
        graph.add_node(Node::new("a.py", NodeType::File, "a.py", "a.py"));
        graph.add_node(Node::new("model:User", NodeType::Collection, "User", "a.py").with_line(3));
        graph.add_edge(Edge::new("a.py", "model:User", EdgeKind::Defines));
        graph.warnings.push(Warning {
            file: "b.py".into(),
            message: "syntax errors, used pattern rules".into(),
        });
        graph.refresh_summary();
        graph
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/.code_graph.json");
        save(&sample(), &path).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.project, "demo");
        assert_eq!(loaded.nodes.len(), 2);
        assert_eq!(loaded.edges.len(), 1);
        assert_eq!(loaded.node("model:User").unwrap().line, Some(3));
        assert_eq!(loaded.warnings.len(), 1);
        assert_eq!(loaded.summary.total_nodes, 2);
    }

    #[test]
    fn test_save_replaces_existing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        std::fs::write(&path, "stale").unwrap();
        save(&sample(), &path).unwrap();
        assert!(load(&path).is_ok());
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1, "no temporary file is left behind");
    }

    #[test]
    fn test_missing_artifact_is_not_initialized() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, QueryError::NotInitialized { .. }));
    }

    #[test]
    fn test_garbage_artifact_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        std::fs::write(&path, "{\"nodes\": 3}").unwrap();
        assert!(matches!(load(&path).unwrap_err(), QueryError::Corrupt { .. }));
    }

    #[test]
    fn test_duplicate_node_keeps_first() {
        let artifact = GraphArtifact {
            version: ARTIFACT_VERSION,
            project: "demo".into(),
            nodes: vec![
                Node::new("a.py", NodeType::Service, "a.py", "a.py"),
                Node::new("a.py", NodeType::File, "a.py", "a.py"),
            ],
            edges: Vec::new(),
            summary: Summary::default(),
            warnings: Vec::new(),
        };
        let graph = artifact.into_graph();
        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.node("a.py").unwrap().kind, NodeType::Service);
    }
}
