pub mod calls;
pub mod go;
pub mod javascript;
pub mod languages;
pub mod patterns;
pub mod python;
pub mod rust;

use std::cell::RefCell;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

use anyhow::{Context, Result, anyhow};
use tracing::warn;
use tree_sitter::{Node, Parser, Tree};

use crate::graph::edge::EdgeKind;
use crate::graph::node::NodeType;
use crate::language::{LanguageKind, Strategy};
use crate::walker::SourceFile;

use languages::Grammar;

// Thread-local Parser instances, one per grammar per rayon worker thread.
// Each Parser gets its grammar on first use; a failure is reported, not unwrapped.
thread_local! {
    static PARSERS: RefCell<HashMap<Grammar, Parser>> = RefCell::new(HashMap::new());
}

// ---------------------------------------------------------------------------
// Per-file facts
// ---------------------------------------------------------------------------

/// A node a file contributes besides its own file node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredNode {
    pub id: String,
    pub kind: NodeType,
    pub label: String,
    pub line: usize,
    /// `true` when this file is where the entity is declared (a model class),
    /// `false` for a mere reference (a DB call naming the model).
    pub defined: bool,
}

/// Where an edge candidate starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// The file node of the analyzed file.
    File,
    /// A node declared by the analyzed file.
    Node(String),
}

/// How an import specifier is to be resolved against the scanned files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStyle {
    /// `import a.b` / `from ..a import b`; `level` counts the leading dots.
    Python { level: usize },
    /// ES module or CommonJS specifier (`./x`, `@/x`, `lodash`).
    Js,
    /// `mod name;` declared in a Rust file.
    RustMod,
    /// `use crate::a::b` / `super::` / `self::`.
    RustUse,
    /// Go import path.
    Go,
    /// A path relative to the importing file (`require_relative`, `include`).
    Relative,
    /// A namespace or module name matched against file stems (Java, C#, PHP, Ruby).
    Stem,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRef {
    pub style: ImportStyle,
    pub spec: String,
    /// Names pulled in by `from x import a, b`. Used when `spec` is only dots.
    pub names: Vec<String>,
}

/// The target side of an edge candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A module reference resolved by the builder to a file node.
    Import(ImportRef),
    /// A fully formed node id (declared by this file or a global entity key).
    Node(String),
    /// A symbol label resolved after every file is merged (base classes).
    Label(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeCandidate {
    pub from: Origin,
    pub kind: EdgeKind,
    pub target: Target,
    pub line: usize,
}

/// Everything extracted from one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileFacts {
    pub nodes: Vec<DeclaredNode>,
    pub edges: Vec<EdgeCandidate>,
    /// Names of classes, structs, traits and types declared in the file.
    pub symbols: Vec<String>,
    pub warnings: Vec<String>,
}

impl FileFacts {
    /// Declare an entity defined in this file.
    pub fn define(&mut self, id: impl Into<String>, kind: NodeType, label: impl Into<String>, line: usize) {
        self.push_node(id.into(), kind, label.into(), line, true);
    }

    /// Declare an entity this file only refers to (a model named in a query).
    pub fn reference(&mut self, id: impl Into<String>, kind: NodeType, label: impl Into<String>, line: usize) {
        self.push_node(id.into(), kind, label.into(), line, false);
    }

    fn push_node(&mut self, id: String, kind: NodeType, label: String, line: usize, defined: bool) {
        self.nodes.push(DeclaredNode {
            id,
            kind,
            label,
            line,
            defined,
        });
    }

    pub fn edge(&mut self, from: Origin, kind: EdgeKind, target: Target, line: usize) {
        self.edges.push(EdgeCandidate {
            from,
            kind,
            target,
            line,
        });
    }

    /// Shorthand: edge from the file node to a node id.
    pub fn link(&mut self, kind: EdgeKind, target_id: impl Into<String>, line: usize) {
        self.edge(Origin::File, kind, Target::Node(target_id.into()), line);
    }

    pub fn import(&mut self, style: ImportStyle, spec: impl Into<String>, names: Vec<String>, line: usize) {
        let spec = spec.into();
        if spec.is_empty() && names.is_empty() {
            return;
        }
        self.edge(
            Origin::File,
            EdgeKind::Imports,
            Target::Import(ImportRef { style, spec, names }),
            line,
        );
    }

    /// Pending inheritance edge toward a base type named `base`.
    pub fn inherits(&mut self, from: Origin, base: &str, line: usize) {
        let label = base.rsplit(['.', ':', '\\']).next().unwrap_or(base).trim();
        if label.is_empty() {
            return;
        }
        self.edge(from, EdgeKind::Inherits, Target::Label(label.to_string()), line);
    }
}

// ---------------------------------------------------------------------------
// Strategy interface
// ---------------------------------------------------------------------------

/// Extraction capability shared by the structural and pattern strategies.
pub trait Analyzer: Sync {
    /// Extract facts from `source`, the contents of `file`.
    fn analyze(&self, file: &SourceFile, source: &str) -> Result<FileFacts>;
}

/// The analyzer for a language, chosen by its [`Strategy`].
pub fn analyzer_for(language: LanguageKind) -> &'static dyn Analyzer {
    match (language.strategy(), language) {
        (Strategy::Structural, LanguageKind::Python) => &python::PythonAnalyzer,
        (Strategy::Structural, LanguageKind::JavaScript | LanguageKind::TypeScript) => {
            &javascript::JsAnalyzer
        }
        (Strategy::Structural, LanguageKind::Rust) => &rust::RustAnalyzer,
        (Strategy::Structural, LanguageKind::Go) => &go::GoAnalyzer,
        _ => &patterns::PatternAnalyzer,
    }
}

/// Read and analyze one file, never failing.
///
/// An unreadable file, an analyzer error, or a panic inside extraction all
/// yield empty facts carrying one warning, so the caller still emits the
/// file node.
pub fn extract(file: &SourceFile) -> FileFacts {
    let source = match std::fs::read(&file.abs) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(err) => return failed(file, format!("unreadable: {err}")),
    };

    let analyzer = analyzer_for(file.language);
    match catch_unwind(AssertUnwindSafe(|| analyzer.analyze(file, &source))) {
        Ok(Ok(facts)) => facts,
        Ok(Err(err)) => failed(file, format!("extraction failed: {err:#}")),
        Err(_) => failed(file, "extraction panicked".to_string()),
    }
}

fn failed(file: &SourceFile, message: String) -> FileFacts {
    warn!(file = %file.rel, "{message}");
    FileFacts {
        warnings: vec![message],
        ..FileFacts::default()
    }
}

// ---------------------------------------------------------------------------
// tree-sitter helpers
// ---------------------------------------------------------------------------

/// Parse `source` with the thread-local parser for `grammar`.
pub(crate) fn parse_tree(grammar: Grammar, source: &str) -> Result<Tree> {
    PARSERS.with(|cell| {
        let mut parsers = cell.borrow_mut();
        let parser = match parsers.entry(grammar) {
            std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
            std::collections::hash_map::Entry::Vacant(e) => {
                let mut parser = Parser::new();
                parser
                    .set_language(&grammar.language())
                    .with_context(|| format!("failed to set tree-sitter language {grammar:?}"))?;
                e.insert(parser)
            }
        };
        parser
            .parse(source, None)
            .ok_or_else(|| anyhow!("tree-sitter returned no tree"))
    })
}

/// Outcome of [`parse_or_fallback`].
pub(crate) enum Parsed {
    Tree(Tree),
    /// The tree had errors; these facts came from the pattern rules.
    Fallback(FileFacts),
}

/// Parse with `grammar`; on syntax errors fall back to the pattern rules of the
/// file's language and record a warning.
pub(crate) fn parse_or_fallback(grammar: Grammar, file: &SourceFile, source: &str) -> Result<Parsed> {
    let tree = parse_tree(grammar, source)?;
    if !tree.root_node().has_error() {
        return Ok(Parsed::Tree(tree));
    }
    let mut facts = patterns::extract_patterns(file, source);
    let message = "syntax errors, used pattern rules".to_string();
    warn!(file = %file.rel, "{message}");
    facts.warnings.push(message);
    Ok(Parsed::Fallback(facts))
}

/// Visit every node of `tree` in preorder.
pub(crate) fn walk_tree<'t>(tree: &'t Tree, mut visit: impl FnMut(Node<'t>)) {
    let mut cursor = tree.walk();
    loop {
        visit(cursor.node());
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return;
            }
        }
    }
}

pub(crate) fn text<'s>(node: Node<'_>, source: &'s str) -> &'s str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

/// 1-based line of `node`.
pub(crate) fn line_of(node: Node<'_>) -> usize {
    node.start_position().row + 1
}

/// Strip one layer of quotes (`"`, `'`, `` ` ``) from a string literal.
pub(crate) fn unquote(raw: &str) -> &str {
    let raw = raw.trim();
    for q in ['"', '\'', '`'] {
        if raw.len() >= 2 && raw.starts_with(q) && raw.ends_with(q) {
            return &raw[1..raw.len() - 1];
        }
    }
    raw
}

/// First named child of `node` whose kind is one of `kinds`.
pub(crate) fn named_child_of_kind<'t>(node: Node<'t>, kinds: &[&str]) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node.named_children(&mut cursor).find(|c| kinds.contains(&c.kind()));
    found
}

/// First string-literal argument of a call's `arguments` node, unquoted.
pub(crate) fn first_string_arg(args: Node<'_>, source: &str, string_kinds: &[&str]) -> Option<String> {
    let first = args.named_child(0)?;
    if string_kinds.contains(&first.kind()) {
        Some(unquote(text(first, source)).to_string())
    } else {
        None
    }
}

/// Route node id: `<file>::<METHOD> <path>`.
pub fn route_id(file: &str, method: &str, path: &str) -> String {
    format!("{file}::{} {path}", method.to_uppercase())
}

/// Symbol node id: `<file>::<name>`.
pub fn symbol_id(file: &str, name: &str) -> String {
    format!("{file}::{name}")
}
