use std::sync::OnceLock;

use anyhow::Result;
use regex::Regex;
use tree_sitter::Node;

use crate::graph::edge::EdgeKind;
use crate::graph::node::NodeType;
use crate::walker::SourceFile;

use super::languages::Grammar;
use super::{Analyzer, FileFacts, ImportStyle, Origin, Parsed, calls, line_of, parse_or_fallback, route_id, text, walk_tree};

/// Standard-library and serde traits whose impls are not architecture.
pub(crate) const STD_TRAITS: &[&str] = &[
    "Display", "Debug", "From", "Into", "TryFrom", "TryInto", "Default", "Clone", "Copy", "Drop",
    "Iterator", "IntoIterator", "Error", "Deref", "DerefMut", "FromStr", "AsRef", "AsMut",
    "PartialEq", "Eq", "Hash", "Ord", "PartialOrd", "Serialize", "Deserialize", "Send", "Sync",
    "Write", "Read", "Future", "Add", "Sub", "Index", "IndexMut", "Borrow",
];

struct RouteRules {
    attribute: Regex,
    axum: Regex,
}

fn route_rules() -> &'static RouteRules {
    static RULES: OnceLock<RouteRules> = OnceLock::new();
    RULES.get_or_init(|| RouteRules {
        attribute: Regex::new(r#"#\[\s*(?:\w+::)*(get|post|put|delete|patch|head|options)\s*\(\s*"([^"]*)""#)
            .expect("invalid route attribute pattern"),
        axum: Regex::new(r#"\.route\(\s*"([^"]+)"\s*,\s*(get|post|put|delete|patch|any)\s*\("#)
            .expect("invalid axum route pattern"),
    })
}

/// Structural analyzer for Rust, backed by tree-sitter-rust.
pub struct RustAnalyzer;

impl Analyzer for RustAnalyzer {
    fn analyze(&self, file: &SourceFile, source: &str) -> Result<FileFacts> {
        let tree = match parse_or_fallback(Grammar::Rust, file, source)? {
            Parsed::Tree(tree) => tree,
            Parsed::Fallback(facts) => return Ok(facts),
        };

        let mut facts = FileFacts::default();
        walk_tree(&tree, |node| match node.kind() {
            "mod_item" => {
                if node.child_by_field_name("body").is_none()
                    && let Some(name) = node.child_by_field_name("name")
                {
                    facts.import(ImportStyle::RustMod, text(name, source), Vec::new(), line_of(node));
                }
            }
            "use_declaration" => {
                if let Some(arg) = node.child_by_field_name("argument") {
                    for path in expand_use(text(arg, source)) {
                        if is_local_path(&path) {
                            facts.import(ImportStyle::RustUse, path, Vec::new(), line_of(node));
                        }
                    }
                }
            }
            "struct_item" | "enum_item" | "trait_item" | "type_item" | "union_item" => {
                if let Some(name) = node.child_by_field_name("name") {
                    facts.symbols.push(text(name, source).to_string());
                }
            }
            "impl_item" => impl_item(node, source, &mut facts),
            "attribute_item" => attribute(node, source, &file.rel, &mut facts),
            "call_expression" | "macro_invocation" => {
                let body = text(node, source);
                axum_routes(body, line_of(node), &file.rel, &mut facts);
                calls::scan(body, line_of(node), &file.rel, &mut facts);
            }
            _ => {}
        });
        Ok(facts)
    }
}

pub(crate) fn is_local_path(path: &str) -> bool {
    path == "crate"
        || path.starts_with("crate::")
        || path.starts_with("super::")
        || path.starts_with("self::")
        || path == "super"
}

/// Expand a use tree into flat paths: `a::{b, c::{d, e}}` -> `a::b`, `a::c::d`, `a::c::e`.
///
/// `self` leaves collapse onto their parent, `as` aliases and globs are dropped.
pub fn expand_use(tree: &str) -> Vec<String> {
    let compact: String = tree.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut out = Vec::new();
    expand_into("", &compact, &mut out);
    out
}

fn expand_into(prefix: &str, tree: &str, out: &mut Vec<String>) {
    let tree = tree.trim();
    if tree.is_empty() {
        return;
    }
    match tree.find('{') {
        Some(open) if tree.ends_with('}') => {
            let head = tree[..open].trim().trim_end_matches("::");
            let base = join_path(prefix, head);
            for part in split_top_level(&tree[open + 1..tree.len() - 1]) {
                expand_into(&base, part, out);
            }
        }
        _ => {
            let leaf = tree.split(" as ").next().unwrap_or(tree).trim();
            let leaf = leaf.trim_end_matches("::*").trim_end_matches('*');
            let path = if leaf == "self" {
                prefix.to_string()
            } else {
                join_path(prefix, leaf.trim_end_matches("::self"))
            };
            if !path.is_empty() {
                out.push(path);
            }
        }
    }
}

fn join_path(prefix: &str, tail: &str) -> String {
    match (prefix.is_empty(), tail.is_empty()) {
        (true, _) => tail.to_string(),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{prefix}::{tail}"),
    }
}

/// Split on commas not nested inside braces.
fn split_top_level(list: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in list.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&list[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&list[start..]);
    parts
}

fn impl_item(node: Node<'_>, source: &str, facts: &mut FileFacts) {
    let Some(tr) = node.child_by_field_name("trait") else {
        return;
    };
    let name = text(tr, source).split('<').next().unwrap_or("").trim();
    let last = name.rsplit("::").next().unwrap_or(name);
    if last.is_empty() || STD_TRAITS.contains(&last) {
        return;
    }
    facts.inherits(Origin::File, last, line_of(node));
}

fn attribute(node: Node<'_>, source: &str, file: &str, facts: &mut FileFacts) {
    let body = text(node, source);
    if let Some(caps) = route_rules().attribute.captures(body) {
        let method = caps[1].to_uppercase();
        let path = &caps[2];
        let line = line_of(node);
        let id = route_id(file, &method, path);
        facts.define(id.clone(), NodeType::Endpoint, format!("{method} {path}"), line);
        facts.link(EdgeKind::EndpointHandler, id, line);
    }
}

fn axum_routes(body: &str, line: usize, file: &str, facts: &mut FileFacts) {
    for caps in route_rules().axum.captures_iter(body) {
        let method = caps[2].to_uppercase();
        let path = &caps[1];
        let id = route_id(file, &method, path);
        facts.define(id.clone(), NodeType::Endpoint, format!("{method} {path}"), line);
        facts.link(EdgeKind::EndpointHandler, id, line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Target;
    use crate::parser::test_support::{has_edge, run};

    #[test]
    fn test_expand_use() {
        assert_eq!(expand_use("crate::graph::node::Node"), vec!["crate::graph::node::Node"]);
        assert_eq!(
            expand_use("crate::graph::{self, edge::{Edge, EdgeKind}, node::Node as N}"),
            vec![
                "crate::graph",
                "crate::graph::edge::Edge",
                "crate::graph::edge::EdgeKind",
                "crate::graph::node::Node",
            ]
        );
        assert_eq!(expand_use("super::*"), vec!["super"]);
    }

    #[test]
    fn test_mod_and_use() {
        let source = "mod config;\nmod inline { }\nuse crate::graph::{edge::Edge, node};\nuse std::fmt;\n";
        let facts = run("src/main.rs", source);
        let imports: Vec<(ImportStyle, String)> = facts
            .edges
            .iter()
            .filter_map(|e| match &e.target {
                Target::Import(r) => Some((r.style, r.spec.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(
            imports,
            vec![
                (ImportStyle::RustMod, "config".to_string()),
                (ImportStyle::RustUse, "crate::graph::edge::Edge".to_string()),
                (ImportStyle::RustUse, "crate::graph::node".to_string()),
            ]
        );
    }

    #[test]
    fn test_routes_and_trait_impls() {
        let source = r#"
#[get("/health")]
async fn health() -> &'static str { "ok" }

fn app() -> Router {
    Router::new().route("/users", post(create_user))
}

struct Store;
impl Repository for Store {}
impl fmt::Display for Store {}
"#;
        let facts = run("src/server.rs", source);
        assert!(has_edge(&facts, EdgeKind::EndpointHandler, "src/server.rs::GET /health"));
        assert!(has_edge(&facts, EdgeKind::EndpointHandler, "src/server.rs::POST /users"));
        assert!(has_edge(&facts, EdgeKind::Inherits, "Repository"));
        assert!(!has_edge(&facts, EdgeKind::Inherits, "Display"));
        assert_eq!(facts.symbols, vec!["Store"]);
    }
}
