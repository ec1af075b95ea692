use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::classify::classify;
use crate::parser::{self, FileFacts, Origin, Target};
use crate::resolver::FileIndex;
use crate::walker::{self, ScanOptions, SourceFile};

use super::edge::{Edge, EdgeKind};
use super::node::Node;
use super::validate::validate;
use super::{CodeGraph, Warning};

/// An edge whose target is a symbol label, resolved once every file is merged.
#[derive(Debug)]
struct Pending {
    source: String,
    kind: EdgeKind,
    label: String,
    file: String,
    line: usize,
}

/// Single-threaded accumulator over per-file facts, fed in file id order.
#[derive(Default)]
struct Merge {
    graph: CodeGraph,
    /// Ids whose current node came from a definition rather than a reference.
    defined: HashSet<String>,
    seen_edges: HashSet<(String, String, EdgeKind)>,
    pending: Vec<Pending>,
    /// Declared symbol name -> files declaring it, in file order.
    symbol_files: HashMap<String, Vec<String>>,
}

impl Merge {
    fn node(&mut self, node: Node, defined: bool) {
        let id = node.id.clone();
        if !self.graph.nodes.contains_key(&id) {
            self.graph.add_node(node);
            if defined {
                self.defined.insert(id);
            }
        } else if defined && !self.defined.contains(&id) {
            // A definition replaces an earlier mere reference.
            self.graph.nodes.insert(id.clone(), node);
            self.defined.insert(id);
        }
    }

    /// Push an edge unless it is a self-edge or an exact duplicate.
    fn edge(&mut self, source: &str, target: &str, kind: EdgeKind, line: usize) {
        if source == target {
            return;
        }
        if !self.seen_edges.insert((source.to_string(), target.to_string(), kind)) {
            return;
        }
        let mut edge = Edge::new(source, target, kind);
        edge.line = Some(line);
        self.graph.add_edge(edge);
    }

    fn file(&mut self, file: &SourceFile, facts: FileFacts, index: &FileIndex) {
        let rel = file.rel.as_str();
        let name = rel.rsplit('/').next().unwrap_or(rel);
        self.node(Node::new(rel, classify(rel), name, rel), true);

        for declared in facts.nodes {
            let node = Node::new(declared.id, declared.kind, declared.label, rel).with_line(declared.line);
            self.node(node, declared.defined);
        }

        for candidate in facts.edges {
            let source = match candidate.from {
                Origin::File => rel.to_string(),
                Origin::Node(id) => id,
            };
            match candidate.target {
                Target::Import(import) => {
                    for target in index.resolve(rel, &import) {
                        self.edge(&source, &target, candidate.kind, candidate.line);
                    }
                }
                Target::Node(target) => self.edge(&source, &target, candidate.kind, candidate.line),
                Target::Label(label) => self.pending.push(Pending {
                    source,
                    kind: candidate.kind,
                    label,
                    file: rel.to_string(),
                    line: candidate.line,
                }),
            }
        }

        for symbol in facts.symbols {
            let files = self.symbol_files.entry(symbol).or_default();
            if files.last().map(String::as_str) != Some(rel) {
                files.push(rel.to_string());
            }
        }

        for message in facts.warnings {
            self.graph.warnings.push(Warning {
                file: rel.to_string(),
                message,
            });
        }
    }

    /// Second pass: match pending labels against the merged node set.
    ///
    /// Order: a node with that label in the same file, then the smallest id
    /// carrying the label anywhere, then the file node of the first file
    /// declaring a symbol of that name. The emitting node is never a
    /// candidate. Returns how many stayed unresolved.
    fn resolve_pending(&mut self) -> usize {
        let mut by_label: HashMap<&str, Vec<&Node>> = HashMap::new();
        for node in self.graph.nodes.values() {
            by_label.entry(node.label.as_str()).or_default().push(node);
        }

        let mut resolved = Vec::new();
        let mut unresolved = 0;
        for pending in std::mem::take(&mut self.pending) {
            let candidates: Vec<&Node> = by_label
                .get(pending.label.as_str())
                .map(|nodes| nodes.iter().copied().filter(|n| n.id != pending.source).collect())
                .unwrap_or_default();
            let target = candidates
                .iter()
                .find(|n| n.file == pending.file)
                .or_else(|| candidates.first())
                .map(|n| n.id.clone())
                .or_else(|| {
                    self.symbol_files
                        .get(&pending.label)?
                        .iter()
                        .find(|f| **f != pending.source)
                        .cloned()
                });
            match target {
                Some(target) => resolved.push((pending, target)),
                None => {
                    debug!(source = %pending.source, label = %pending.label, "unresolved reference dropped");
                    unresolved += 1;
                }
            }
        }
        drop(by_label);

        for (pending, target) in resolved {
            self.edge(&pending.source, &target, pending.kind, pending.line);
        }
        unresolved
    }
}

fn project_name(root: &Path) -> String {
    root.canonicalize()
        .ok()
        .as_deref()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "project".to_string())
}

/// Scan `root`, analyze every file and assemble the validated graph.
pub fn build(root: &Path, options: &ScanOptions) -> Result<CodeGraph> {
    let start = Instant::now();
    let files = walker::scan(root, options)?;
    info!(files = files.len(), "scanned {}", root.display());

    // Extraction is independent per file; the merge below is serial.
    let extracted: Vec<FileFacts> = files.par_iter().map(parser::extract).collect();
    let index = FileIndex::new(root, &files);

    let mut merge = Merge {
        graph: CodeGraph::new(project_name(root)),
        ..Merge::default()
    };
    for (file, facts) in files.iter().zip(extracted) {
        merge.file(file, facts, &index);
    }
    let unresolved = merge.resolve_pending();

    let mut graph = merge.graph;
    graph.summary.files_scanned = files.len();
    graph.summary.unresolved_references = unresolved;
    let ghosts = validate(&mut graph);

    info!(
        nodes = graph.summary.total_nodes,
        edges = graph.summary.total_edges,
        ghosts,
        unresolved,
        warnings = graph.warnings.len(),
        "graph built in {:.2?}",
        start.elapsed()
    );
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::fs;

    use super::*;
    use crate::graph::node::NodeType;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "shop/__init__.py", "");
        write(
            root,
            "shop/models.py",
            "from django.db import models\n\nclass Order(models.Model):\n    pass\n\nclass Auditable:\n    pass\n",
        );
        write(
            root,
            "shop/views.py",
            "from .models import Order\nfrom .helpers import fmt\n\nclass OrderView(APIView, Auditable):\n    def get(self, request):\n        return Order.objects.filter(paid=True)\n\nclass Broken(Missing):\n    pass\n",
        );
        write(root, "shop/helpers.py", "def fmt(x):\n    return x\n");
        write(root, "web/src/api.ts", "import { get } from './http';\nexport const list = () => get('/orders');\n");
        write(root, "web/src/http.ts", "export const get = (u: string) => fetch(u);\n");
        dir
    }

    fn edge_set(graph: &CodeGraph) -> BTreeSet<(String, String, EdgeKind)> {
        graph
            .edges
            .iter()
            .map(|e| (e.source.clone(), e.target.clone(), e.kind))
            .collect()
    }

    #[test]
    fn test_build_links_imports_models_and_bases() {
        let dir = fixture();
        let graph = build(dir.path(), &ScanOptions::default()).unwrap();
        let edges = edge_set(&graph);
        let has = |s: &str, t: &str, k: EdgeKind| edges.contains(&(s.to_string(), t.to_string(), k));

        assert!(has("shop/views.py", "shop/models.py", EdgeKind::Imports));
        assert!(has("shop/views.py", "shop/helpers.py", EdgeKind::Imports));
        assert!(has("web/src/api.ts", "web/src/http.ts", EdgeKind::Imports));
        assert!(has("shop/views.py", "model:Order", EdgeKind::DbRead));
        assert!(has("shop/models.py", "model:Order", EdgeKind::Defines));
        // `Auditable` is a plain class: the base edge lands on its declaring file.
        assert!(has("shop/views.py::OrderView", "shop/models.py", EdgeKind::Inherits));

        let order = graph.node("model:Order").unwrap();
        assert_eq!(order.kind, NodeType::Collection);
        assert_eq!(order.file, "shop/models.py", "the definition wins over the call site");

        assert_eq!(graph.summary.unresolved_references, 1, "`Missing` is never declared");
        assert_eq!(graph.summary.files_scanned, 6);
        assert_eq!(graph.summary.ghost_edges_removed, 0);
    }

    #[test]
    fn test_every_edge_endpoint_exists() {
        let dir = fixture();
        let graph = build(dir.path(), &ScanOptions::default()).unwrap();
        for edge in &graph.edges {
            assert!(graph.nodes.contains_key(&edge.source), "ghost source {}", edge.source);
            assert!(graph.nodes.contains_key(&edge.target), "ghost target {}", edge.target);
            assert_ne!(edge.source, edge.target);
        }
    }

    #[test]
    fn test_build_is_idempotent() {
        let dir = fixture();
        let first = build(dir.path(), &ScanOptions::default()).unwrap();
        let second = build(dir.path(), &ScanOptions::default()).unwrap();
        assert_eq!(
            first.nodes.keys().collect::<Vec<_>>(),
            second.nodes.keys().collect::<Vec<_>>()
        );
        assert_eq!(edge_set(&first), edge_set(&second));
    }

    #[test]
    fn test_pending_prefers_same_file_candidate() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "a/serializers.py",
            "from rest_framework import serializers\n\nclass BaseSerializer(serializers.ModelSerializer):\n    pass\n",
        );
        write(
            dir.path(),
            "b/serializers.py",
            "from rest_framework import serializers\n\nclass BaseSerializer(serializers.Serializer):\n    pass\n\nclass OrderSerializer(BaseSerializer):\n    pass\n",
        );
        let graph = build(dir.path(), &ScanOptions::default()).unwrap();
        let edges = edge_set(&graph);
        assert!(edges.contains(&(
            "b/serializers.py".to_string(),
            "b/serializers.py::BaseSerializer".to_string(),
            EdgeKind::Inherits
        )));
        assert!(!edges.iter().any(|(_, t, k)| *k == EdgeKind::Inherits && t == "a/serializers.py::BaseSerializer"));
    }

    #[test]
    fn test_broken_file_still_yields_its_node() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "bad.py", "def broken(:\n");
        write(dir.path(), "good.py", "import bad\n");
        let graph = build(dir.path(), &ScanOptions::default()).unwrap();
        assert!(graph.node("bad.py").is_some());
        assert_eq!(graph.warnings.len(), 1);
        assert_eq!(graph.warnings[0].file, "bad.py");
        assert_eq!(graph.summary.warnings, 1);
        assert!(edge_set(&graph).contains(&("good.py".to_string(), "bad.py".to_string(), EdgeKind::Imports)));
    }
}
