use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Result, anyhow};
use regex::Regex;
use tree_sitter::Node;

use crate::graph::edge::EdgeKind;
use crate::graph::node::NodeType;
use crate::walker::SourceFile;

use super::languages::Grammar;
use super::{
    Analyzer, FileFacts, ImportStyle, Origin, Parsed, calls, first_string_arg, line_of,
    parse_or_fallback, route_id, symbol_id, text, walk_tree,
};

const STRING_KINDS: &[&str] = &["string", "template_string"];

const CLASS_KINDS: &[&str] = &["class_declaration", "abstract_class_declaration", "class"];

const ROUTE_METHODS: &[&str] = &["get", "post", "put", "patch", "delete", "all", "options", "head"];

/// Interfaces that mark a Nest class as middleware.
pub(crate) const MIDDLEWARE_INTERFACES: &[&str] = &["NestMiddleware", "CanActivate", "NestInterceptor", "HttpInterceptor"];

/// Framework bases that never become inheritance edges.
pub(crate) const FRAMEWORK_BASES: &[&str] = &[
    "Component",
    "PureComponent",
    "React.Component",
    "React.PureComponent",
    "Error",
    "Model",
    "Vue",
    "LitElement",
    "HTMLElement",
];

/// Structural analyzer for JavaScript and TypeScript (tree-sitter-javascript / -typescript).
pub struct JsAnalyzer;

impl Analyzer for JsAnalyzer {
    fn analyze(&self, file: &SourceFile, source: &str) -> Result<FileFacts> {
        let ext = Path::new(&file.rel)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        let grammar = Grammar::for_file(file.language, ext)
            .ok_or_else(|| anyhow!("no grammar for {}", file.rel))?;
        let tree = match parse_or_fallback(grammar, file, source)? {
            Parsed::Tree(tree) => tree,
            Parsed::Fallback(facts) => return Ok(facts),
        };

        let mut facts = FileFacts::default();
        walk_tree(&tree, |node| match node.kind() {
            "import_statement" | "export_statement" => {
                if let Some(src) = node.child_by_field_name("source") {
                    let spec = super::unquote(text(src, source));
                    facts.import(ImportStyle::Js, spec, Vec::new(), line_of(node));
                }
            }
            "call_expression" => call(node, source, &file.rel, &mut facts),
            "decorator" => method_decorator(node, source, &file.rel, &mut facts),
            kind if CLASS_KINDS.contains(&kind) => class(node, source, &file.rel, &mut facts),
            _ => {}
        });
        Ok(facts)
    }
}

// ---------------------------------------------------------------------------
// Calls: require / import() / express routes / call-site families
// ---------------------------------------------------------------------------

fn call(node: Node<'_>, source: &str, file: &str, facts: &mut FileFacts) {
    let Some(func) = node.child_by_field_name("function") else {
        return;
    };
    let args = node.child_by_field_name("arguments");
    let line = line_of(node);

    let is_require = func.kind() == "identifier" && text(func, source) == "require";
    if is_require || func.kind() == "import" {
        if let Some(spec) = args.and_then(|a| first_string_arg(a, source, STRING_KINDS)) {
            facts.import(ImportStyle::Js, spec, Vec::new(), line);
        }
        return;
    }

    if func.kind() == "member_expression"
        && let (Some(object), Some(property)) = (
            func.child_by_field_name("object"),
            func.child_by_field_name("property"),
        )
    {
        let receiver = text(object, source);
        let method = text(property, source);
        let is_router = matches!(receiver, "app" | "router" | "server" | "api" | "routes")
            || receiver.ends_with("Router")
            || receiver.ends_with("router");
        if is_router
            && ROUTE_METHODS.contains(&method)
            && let Some(path) = args.and_then(|a| first_string_arg(a, source, STRING_KINDS))
            && path.starts_with('/')
        {
            let method = method.to_uppercase();
            let id = route_id(file, &method, &path);
            facts.define(id.clone(), NodeType::Endpoint, format!("{method} {path}"), line);
            facts.link(EdgeKind::EndpointHandler, id, line);
        }
    }

    calls::scan(text(node, source), line, file, facts);
}

// ---------------------------------------------------------------------------
// Classes and decorators
// ---------------------------------------------------------------------------

/// A decorator's callee name and first string argument.
fn decorator_parts(decorator: Node<'_>, source: &str) -> Option<(String, Option<String>)> {
    let expr = decorator.named_child(0)?;
    match expr.kind() {
        "call_expression" => {
            let func = expr.child_by_field_name("function")?;
            let name = text(func, source).rsplit('.').next().unwrap_or("").to_string();
            let arg = expr
                .child_by_field_name("arguments")
                .and_then(|a| first_string_arg(a, source, STRING_KINDS));
            Some((name, arg))
        }
        "identifier" | "member_expression" => {
            let name = text(expr, source).rsplit('.').next().unwrap_or("").to_string();
            Some((name, None))
        }
        _ => None,
    }
}

/// Decorators attached to a class, including those written before `export`.
fn class_decorators(class: Node<'_>, source: &str) -> Vec<(String, Option<String>)> {
    let mut holders = vec![class];
    if let Some(parent) = class.parent()
        && parent.kind() == "export_statement"
    {
        holders.push(parent);
    }
    let mut out = Vec::new();
    for holder in holders {
        let mut cursor = holder.walk();
        for child in holder.named_children(&mut cursor) {
            if child.kind() == "decorator"
                && let Some(parts) = decorator_parts(child, source)
            {
                out.push(parts);
            }
        }
    }
    out
}

struct Heritage {
    extends: Vec<String>,
    implements: Vec<String>,
}

fn heritage_re() -> &'static (Regex, Regex) {
    static RE: OnceLock<(Regex, Regex)> = OnceLock::new();
    RE.get_or_init(|| {
        (
            Regex::new(r"\bextends\s+([\w$.]+)").expect("invalid extends pattern"),
            Regex::new(r"\bimplements\s+([^{]+)").expect("invalid implements pattern"),
        )
    })
}

fn heritage(class: Node<'_>, source: &str) -> Heritage {
    let mut cursor = class.walk();
    let clause = class
        .named_children(&mut cursor)
        .find(|c| c.kind() == "class_heritage")
        .map(|c| text(c, source))
        .unwrap_or("");
    let (extends_re, implements_re) = heritage_re();
    let extends = extends_re
        .captures_iter(clause)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect();
    let implements = implements_re
        .captures(clause)
        .and_then(|c| c.get(1))
        .map(|m| {
            m.as_str()
                .split(',')
                .map(|s| s.split('<').next().unwrap_or("").trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();
    Heritage { extends, implements }
}

fn class(node: Node<'_>, source: &str, file: &str, facts: &mut FileFacts) {
    let Some(name) = node.child_by_field_name("name").map(|n| text(n, source)) else {
        return;
    };
    let line = line_of(node);
    facts.symbols.push(name.to_string());

    let decorators = class_decorators(node, source);
    let has = |wanted: &[&str]| decorators.iter().any(|(d, _)| wanted.contains(&d.as_str()));
    let heritage = heritage(node, source);
    let is_middleware = heritage
        .implements
        .iter()
        .any(|i| MIDDLEWARE_INTERFACES.contains(&i.as_str()));
    let extends_model = heritage.extends.iter().any(|e| e == "Model");

    let declared = if has(&["Controller", "Resolver"]) {
        let id = symbol_id(file, name);
        facts.define(id.clone(), NodeType::Endpoint, name, line);
        facts.link(EdgeKind::EndpointHandler, id.clone(), line);
        Some(id)
    } else if has(&["Entity", "Schema", "Table", "Document"]) || extends_model {
        let id = format!("model:{name}");
        facts.define(id.clone(), NodeType::Collection, name, line);
        facts.link(EdgeKind::Defines, id.clone(), line);
        Some(id)
    } else if is_middleware {
        let id = symbol_id(file, name);
        facts.define(id.clone(), NodeType::Middleware, name, line);
        facts.link(EdgeKind::MiddlewareChain, id.clone(), line);
        Some(id)
    } else if has(&["Injectable"]) {
        let id = symbol_id(file, name);
        facts.define(id.clone(), NodeType::Service, name, line);
        facts.link(EdgeKind::Defines, id.clone(), line);
        Some(id)
    } else {
        None
    };

    let origin = declared.map(Origin::Node).unwrap_or(Origin::File);
    for base in heritage.extends.iter().chain(heritage.implements.iter()) {
        if FRAMEWORK_BASES.contains(&base.as_str()) || MIDDLEWARE_INTERFACES.contains(&base.as_str()) {
            continue;
        }
        facts.inherits(origin.clone(), base, line);
    }
}

/// Join a controller prefix and a route path into `/a/b`.
pub(crate) fn join_route(prefix: Option<&str>, path: Option<&str>) -> String {
    let joined: Vec<&str> = [prefix, path]
        .into_iter()
        .flatten()
        .flat_map(|p| p.split('/'))
        .filter(|s| !s.is_empty())
        .collect();
    format!("/{}", joined.join("/"))
}

/// The class and method a member decorator is attached to.
fn decorated_method<'t>(decorator: Node<'t>) -> Option<(Node<'t>, Node<'t>)> {
    let parent = decorator.parent()?;
    let method = match parent.kind() {
        "method_definition" => parent,
        "class_body" => {
            let mut next = decorator.next_named_sibling();
            while let Some(n) = next
                && n.kind() == "decorator"
            {
                next = n.next_named_sibling();
            }
            next?
        }
        _ => return None,
    };
    let mut class = method.parent();
    while let Some(c) = class {
        if CLASS_KINDS.contains(&c.kind()) {
            return Some((c, method));
        }
        class = c.parent();
    }
    None
}

fn method_decorator(node: Node<'_>, source: &str, file: &str, facts: &mut FileFacts) {
    let Some((class, method)) = decorated_method(node) else {
        return;
    };
    let Some((name, arg)) = decorator_parts(node, source) else {
        return;
    };
    let line = line_of(node);
    let class_name = class.child_by_field_name("name").map(|n| text(n, source)).unwrap_or("");
    let method_name = method.child_by_field_name("name").map(|n| text(n, source)).unwrap_or("");

    match name.as_str() {
        "Get" | "Post" | "Put" | "Patch" | "Delete" | "All" | "Options" | "Head" => {
            let prefix = class_decorators(class, source)
                .into_iter()
                .find(|(d, _)| d == "Controller")
                .and_then(|(_, a)| a);
            let path = join_route(prefix.as_deref(), arg.as_deref());
            let http = name.to_uppercase();
            let id = route_id(file, &http, &path);
            facts.define(id.clone(), NodeType::Endpoint, format!("{http} {path}"), line);
            facts.link(EdgeKind::EndpointHandler, id, line);
        }
        "Cron" | "Interval" | "Timeout" | "Process" => {
            let label = if class_name.is_empty() {
                method_name.to_string()
            } else {
                format!("{class_name}.{method_name}")
            };
            let id = symbol_id(file, &label);
            facts.define(id.clone(), NodeType::Task, label, line);
            facts.link(EdgeKind::TaskSchedule, id, line);
        }
        "OnEvent" | "EventPattern" | "MessagePattern" | "SubscribeMessage" => {
            if let Some(event) = arg.filter(|a| !a.is_empty()) {
                let id = format!("event:{event}");
                facts.reference(id.clone(), NodeType::Event, event, line);
                facts.link(EdgeKind::EventListen, id, line);
            }
        }
        _ => {}
    }
}
