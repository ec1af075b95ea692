use anyhow::Result;
use tree_sitter::Node;

use crate::graph::edge::EdgeKind;
use crate::graph::node::NodeType;
use crate::walker::SourceFile;

use super::languages::Grammar;
use super::{
    Analyzer, FileFacts, ImportStyle, Parsed, calls, first_string_arg, line_of, parse_or_fallback, route_id, text,
    unquote, walk_tree,
};

const STRING_KINDS: &[&str] = &["interpreted_string_literal", "raw_string_literal"];

/// Router methods of net/http, gorilla/mux, chi, gin and echo.
const ROUTE_METHODS: &[&str] = &[
    "HandleFunc", "Handle", "GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS", "Any", "Get", "Post",
    "Put", "Delete", "Patch", "Head", "Options",
];

const HTTP_VERBS: &[&str] = &["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"];

/// Structural analyzer for Go, backed by tree-sitter-go.
pub struct GoAnalyzer;

impl Analyzer for GoAnalyzer {
    fn analyze(&self, file: &SourceFile, source: &str) -> Result<FileFacts> {
        let tree = match parse_or_fallback(Grammar::Go, file, source)? {
            Parsed::Tree(tree) => tree,
            Parsed::Fallback(facts) => return Ok(facts),
        };

        let mut facts = FileFacts::default();
        walk_tree(&tree, |node| match node.kind() {
            "import_spec" => {
                if let Some(path) = node.child_by_field_name("path") {
                    facts.import(ImportStyle::Go, unquote(text(path, source)), Vec::new(), line_of(node));
                }
            }
            "type_spec" => {
                if let Some(name) = node.child_by_field_name("name") {
                    facts.symbols.push(text(name, source).to_string());
                }
            }
            "call_expression" => {
                if !route(node, source, &file.rel, &mut facts) {
                    calls::scan(text(node, source), line_of(node), &file.rel, &mut facts);
                }
            }
            _ => {}
        });
        Ok(facts)
    }
}

/// Record a route registration; returns whether `call` was one.
fn route(call: Node<'_>, source: &str, file: &str, facts: &mut FileFacts) -> bool {
    let Some(func) = call.child_by_field_name("function") else {
        return false;
    };
    if func.kind() != "selector_expression" {
        return false;
    }
    let Some(field) = func.child_by_field_name("field") else {
        return false;
    };
    let method = text(field, source);
    if !ROUTE_METHODS.contains(&method) {
        return false;
    }
    let Some(pattern) = call
        .child_by_field_name("arguments")
        .and_then(|args| first_string_arg(args, source, STRING_KINDS))
    else {
        return false;
    };
    let Some((verb, path)) = split_pattern(method, &pattern) else {
        return false;
    };

    let line = line_of(call);
    let id = route_id(file, &verb, &path);
    facts.define(id.clone(), NodeType::Endpoint, format!("{verb} {path}"), line);
    facts.link(EdgeKind::EndpointHandler, id, line);
    true
}

/// Split a registration into verb and path.
///
/// `HandleFunc("GET /items/{id}", h)` carries its verb in the pattern; a bare
/// `HandleFunc("/x", h)` serves any verb.
fn split_pattern(method: &str, pattern: &str) -> Option<(String, String)> {
    if let Some((verb, path)) = pattern.split_once(' ')
        && HTTP_VERBS.contains(&verb)
        && path.starts_with('/')
    {
        return Some((verb.to_string(), path.trim().to_string()));
    }
    if !pattern.starts_with('/') {
        return None;
    }
    let verb = match method {
        "HandleFunc" | "Handle" | "Any" => "ANY".to_string(),
        other => other.to_uppercase(),
    };
    Some((verb, pattern.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Target;
    use crate::parser::test_support::{has_edge, run};

    #[test]
    fn test_imports_and_types() {
        let source = r#"package api

import (
    "fmt"
    store "example.com/shop/internal/store"
)

import "net/http"

type Handler struct{}
type Option func(*Handler)
"#;
        let facts = run("internal/api/handler.go", source);
        let specs: Vec<&str> = facts
            .edges
            .iter()
            .filter_map(|e| match &e.target {
                Target::Import(r) => Some(r.spec.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(specs, vec!["fmt", "example.com/shop/internal/store", "net/http"]);
        assert_eq!(facts.symbols, vec!["Handler", "Option"]);
    }

    #[test]
    fn test_routes() {
        let source = r#"package main

func main() {
    mux := http.NewServeMux()
    mux.HandleFunc("GET /items/{id}", getItem)
    mux.HandleFunc("/health", health)
    r := gin.Default()
    r.POST("/orders", createOrder)
    r.Use(logger)
}
"#;
        let facts = run("cmd/server/main.go", source);
        assert!(has_edge(&facts, EdgeKind::EndpointHandler, "cmd/server/main.go::GET /items/{id}"));
        assert!(has_edge(&facts, EdgeKind::EndpointHandler, "cmd/server/main.go::ANY /health"));
        assert!(has_edge(&facts, EdgeKind::EndpointHandler, "cmd/server/main.go::POST /orders"));
        assert_eq!(facts.nodes.len(), 3);
    }

    #[test]
    fn test_split_pattern() {
        assert_eq!(split_pattern("Get", "/a"), Some(("GET".to_string(), "/a".to_string())));
        assert_eq!(split_pattern("HandleFunc", "DELETE /a"), Some(("DELETE".to_string(), "/a".to_string())));
        assert_eq!(split_pattern("GET", "users"), None);
    }
}
