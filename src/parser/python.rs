use anyhow::Result;
use tree_sitter::Node;

use crate::graph::edge::EdgeKind;
use crate::graph::node::NodeType;
use crate::walker::SourceFile;

use super::languages::Grammar;
use super::{
    Analyzer, FileFacts, ImportStyle, Origin, Parsed, calls, line_of, parse_or_fallback, route_id,
    symbol_id, text, walk_tree,
};

pub const MODEL_BASES: &[&str] = &[
    "Model",
    "models.Model",
    "Document",
    "Base",
    "DeclarativeBase",
    "AbstractBaseUser",
    "AbstractUser",
    "SQLModel",
];

pub const VIEW_BASES: &[&str] = &[
    "ViewSet",
    "ModelViewSet",
    "ReadOnlyModelViewSet",
    "GenericViewSet",
    "APIView",
    "GenericAPIView",
    "ListAPIView",
    "CreateAPIView",
    "RetrieveAPIView",
    "UpdateAPIView",
    "DestroyAPIView",
    "ListCreateAPIView",
    "RetrieveUpdateDestroyAPIView",
    "View",
    "TemplateView",
    "ListView",
    "DetailView",
    "FormView",
    "MethodView",
];

pub const SERIALIZER_BASES: &[&str] = &[
    "Serializer",
    "ModelSerializer",
    "HyperlinkedModelSerializer",
    "BaseModel",
    "Schema",
];

/// Bases that never become inheritance edges.
pub(crate) const IGNORED_BASES: &[&str] = &[
    "object",
    "type",
    "Exception",
    "BaseException",
    "ValueError",
    "RuntimeError",
    "ABC",
    "Protocol",
    "Generic",
    "Enum",
    "IntEnum",
    "StrEnum",
    "str",
    "int",
    "dict",
    "list",
    "TypedDict",
    "NamedTuple",
];

const HTTP_METHODS: &[&str] = &["get", "post", "put", "patch", "delete", "head", "options", "websocket"];

/// Structural analyzer for Python, backed by tree-sitter-python.
pub struct PythonAnalyzer;

impl Analyzer for PythonAnalyzer {
    fn analyze(&self, file: &SourceFile, source: &str) -> Result<FileFacts> {
        let tree = match parse_or_fallback(Grammar::Python, file, source)? {
            Parsed::Tree(tree) => tree,
            Parsed::Fallback(facts) => return Ok(facts),
        };

        let mut facts = FileFacts::default();
        let url_conf = file.rel.rsplit('/').next().is_some_and(|n| n.contains("urls"));

        walk_tree(&tree, |node| match node.kind() {
            "import_statement" => import_statement(node, source, &mut facts),
            "import_from_statement" => import_from(node, source, &mut facts),
            "class_definition" => class_definition(node, source, &file.rel, &mut facts),
            "decorated_definition" => decorated(node, source, &file.rel, &mut facts),
            "call" => {
                calls::scan(text(node, source), line_of(node), &file.rel, &mut facts);
                if url_conf {
                    url_pattern(node, source, &file.rel, &mut facts);
                }
            }
            _ => {}
        });

        Ok(facts)
    }
}

/// Unquote a Python string literal, including prefixed forms (`f"..."`, `r'...'`).
fn py_string(node: Node<'_>, source: &str) -> Option<String> {
    if node.kind() != "string" {
        return None;
    }
    let raw = text(node, source).trim_start_matches(|c: char| c.is_ascii_alphabetic());
    let raw = raw
        .strip_prefix("\"\"\"")
        .and_then(|r| r.strip_suffix("\"\"\""))
        .or_else(|| raw.strip_prefix("'''").and_then(|r| r.strip_suffix("'''")))
        .unwrap_or(raw);
    Some(super::unquote(raw).to_string())
}

fn import_statement(node: Node<'_>, source: &str, facts: &mut FileFacts) {
    let mut cursor = node.walk();
    let names: Vec<Node<'_>> = node.children_by_field_name("name", &mut cursor).collect();
    for name in names {
        let module = module_name(name, source);
        facts.import(ImportStyle::Python { level: 0 }, module, Vec::new(), line_of(node));
    }
}

fn module_name(node: Node<'_>, source: &str) -> String {
    if node.kind() == "aliased_import"
        && let Some(inner) = node.child_by_field_name("name")
    {
        return text(inner, source).to_string();
    }
    text(node, source).to_string()
}

fn import_from(node: Node<'_>, source: &str, facts: &mut FileFacts) {
    let Some(module) = node.child_by_field_name("module_name") else {
        return;
    };
    let raw = text(module, source);
    let level = raw.chars().take_while(|c| *c == '.').count();
    let spec = raw[level..].trim().to_string();

    let mut cursor = node.walk();
    let names: Vec<String> = node
        .children_by_field_name("name", &mut cursor)
        .map(|n| module_name(n, source))
        .collect();

    facts.import(ImportStyle::Python { level }, spec, names, line_of(node));
}

/// Base class expressions of a class definition, as written.
fn bases(node: Node<'_>, source: &str) -> Vec<String> {
    let Some(args) = node.child_by_field_name("superclasses") else {
        return Vec::new();
    };
    let mut cursor = args.walk();
    args.named_children(&mut cursor)
        .filter_map(|arg| match arg.kind() {
            "identifier" | "attribute" => Some(text(arg, source).to_string()),
            "subscript" => arg.child_by_field_name("value").map(|v| text(v, source).to_string()),
            _ => None,
        })
        .collect()
}

fn matches_any(bases: &[String], set: &[&str]) -> bool {
    bases.iter().any(|b| {
        let last = b.rsplit('.').next().unwrap_or(b);
        set.contains(&b.as_str()) || set.contains(&last)
    })
}

fn class_definition(node: Node<'_>, source: &str, file: &str, facts: &mut FileFacts) {
    let Some(name) = node.child_by_field_name("name").map(|n| text(n, source)) else {
        return;
    };
    let line = line_of(node);
    let bases = bases(node, source);
    facts.symbols.push(name.to_string());

    let declared = if matches_any(&bases, MODEL_BASES) {
        let id = format!("model:{name}");
        facts.define(id.clone(), NodeType::Collection, name, line);
        facts.link(EdgeKind::Defines, id.clone(), line);
        Some(id)
    } else if matches_any(&bases, VIEW_BASES) {
        let id = symbol_id(file, name);
        facts.define(id.clone(), NodeType::Endpoint, name, line);
        facts.link(EdgeKind::EndpointHandler, id.clone(), line);
        Some(id)
    } else if matches_any(&bases, SERIALIZER_BASES) {
        let id = symbol_id(file, name);
        facts.define(id.clone(), NodeType::Serializer, name, line);
        facts.link(EdgeKind::Defines, id.clone(), line);
        Some(id)
    } else if name.contains("Middleware") || bases.iter().any(|b| b.contains("Middleware")) {
        let id = symbol_id(file, name);
        facts.define(id.clone(), NodeType::Middleware, name, line);
        facts.link(EdgeKind::MiddlewareChain, id.clone(), line);
        Some(id)
    } else {
        None
    };

    let origin = declared.map(Origin::Node).unwrap_or(Origin::File);
    for base in &bases {
        let last = base.rsplit('.').next().unwrap_or(base);
        let framework = [MODEL_BASES, VIEW_BASES, SERIALIZER_BASES, IGNORED_BASES]
            .iter()
            .any(|set| set.contains(&base.as_str()) || set.contains(&last));
        if !framework {
            facts.inherits(origin.clone(), base, line);
        }
    }
}

/// A decorator's dotted name and, for call decorators, its argument list.
fn decorator_parts<'t>(decorator: Node<'t>, source: &str) -> Option<(String, Option<Node<'t>>)> {
    let expr = decorator.named_child(0)?;
    if expr.kind() == "call" {
        let func = expr.child_by_field_name("function")?;
        Some((text(func, source).to_string(), expr.child_by_field_name("arguments")))
    } else {
        Some((text(expr, source).to_string(), None))
    }
}

/// HTTP method named by `methods=[...]` in a Flask `route` call, else `GET`.
fn route_method(args: Node<'_>, source: &str) -> String {
    let mut cursor = args.walk();
    let keyword = args.named_children(&mut cursor).find(|a| {
        a.kind() == "keyword_argument"
            && a.child_by_field_name("name").is_some_and(|n| text(n, source) == "methods")
    });
    keyword
        .and_then(|kw| kw.child_by_field_name("value"))
        .and_then(|list| list.named_child(0))
        .and_then(|first| py_string(first, source))
        .map(|m| m.to_uppercase())
        .unwrap_or_else(|| "GET".to_string())
}

fn decorated(node: Node<'_>, source: &str, file: &str, facts: &mut FileFacts) {
    let Some(def) = node.child_by_field_name("definition") else {
        return;
    };
    if def.kind() != "function_definition" {
        return;
    }
    let Some(func) = def.child_by_field_name("name").map(|n| text(n, source)) else {
        return;
    };

    let mut cursor = node.walk();
    let decorators: Vec<Node<'_>> = node
        .named_children(&mut cursor)
        .filter(|c| c.kind() == "decorator")
        .collect();

    for decorator in decorators {
        let Some((name, args)) = decorator_parts(decorator, source) else {
            continue;
        };
        let line = line_of(decorator);
        let last = name.rsplit('.').next().unwrap_or(&name);
        let dotted = name.contains('.');

        if matches!(name.as_str(), "task" | "shared_task" | "periodic_task")
            || (dotted && matches!(last, "task" | "periodic_task"))
        {
            let id = symbol_id(file, func);
            facts.define(id.clone(), NodeType::Task, func, line);
            facts.link(EdgeKind::TaskSchedule, id, line);
        } else if last == "receiver" {
            let signal = args
                .and_then(|a| a.named_child(0))
                .map(|s| text(s, source))
                .map(|s| s.rsplit('.').next().unwrap_or(s).to_string());
            if let Some(signal) = signal.filter(|s| !s.is_empty()) {
                let id = format!("event:{signal}");
                facts.reference(id.clone(), NodeType::Event, signal, line);
                facts.link(EdgeKind::EventListen, id, line);
            }
        } else if matches!(name.as_str(), "api_view" | "action") {
            let id = symbol_id(file, func);
            facts.define(id.clone(), NodeType::Endpoint, func, line);
            facts.link(EdgeKind::EndpointHandler, id, line);
        } else if dotted && (last == "route" || HTTP_METHODS.contains(&last)) {
            let path = args.and_then(|a| a.named_child(0)).and_then(|p| py_string(p, source));
            let (id, label) = match path {
                Some(path) => {
                    let method = if last == "route" {
                        args.map(|a| route_method(a, source)).unwrap_or_else(|| "GET".into())
                    } else {
                        last.to_uppercase()
                    };
                    (route_id(file, &method, &path), format!("{method} {path}"))
                }
                None => (symbol_id(file, func), func.to_string()),
            };
            facts.define(id.clone(), NodeType::Endpoint, label, line);
            facts.link(EdgeKind::EndpointHandler, id, line);
        }
    }
}

/// `path("users/", views.users)` in a URL configuration.
fn url_pattern(node: Node<'_>, source: &str, file: &str, facts: &mut FileFacts) {
    let Some(func) = node.child_by_field_name("function").map(|f| text(f, source)) else {
        return;
    };
    if !matches!(func, "path" | "re_path" | "url") {
        return;
    }
    let Some(route) = node
        .child_by_field_name("arguments")
        .and_then(|a| a.named_child(0))
        .and_then(|p| py_string(p, source))
    else {
        return;
    };
    let route = if route.is_empty() { "/".to_string() } else { route };
    let line = line_of(node);
    let id = route_id(file, "ANY", &route);
    facts.define(id.clone(), NodeType::Endpoint, format!("ANY {route}"), line);
    facts.link(EdgeKind::EndpointHandler, id, line);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Target;
    use crate::parser::test_support::{has_edge, node, run};

    #[test]
    fn test_imports_absolute_and_relative() {
        let facts = run(
            "app/views.py",
            "import os\nimport app.services as svc\nfrom ..core import utils\nfrom . import models\n",
        );
        let imports: Vec<(usize, String, Vec<String>)> = facts
            .edges
            .iter()
            .filter_map(|e| match &e.target {
                Target::Import(r) => match r.style {
                    ImportStyle::Python { level } => Some((level, r.spec.clone(), r.names.clone())),
                    _ => None,
                },
                _ => None,
            })
            .collect();
        assert_eq!(
            imports,
            vec![
                (0, "os".to_string(), vec![]),
                (0, "app.services".to_string(), vec![]),
                (2, "core".to_string(), vec!["utils".to_string()]),
                (1, String::new(), vec!["models".to_string()]),
            ]
        );
    }

    #[test]
    fn test_model_class_defines_collection() {
        let facts = run(
            "shop/models.py",
            "from django.db import models\n\nclass Order(models.Model):\n    total = 1\n",
        );
        let order = node(&facts, "model:Order").expect("model node");
        assert_eq!(order.kind, NodeType::Collection);
        assert!(order.defined);
        assert_eq!(order.line, 3);
        assert!(has_edge(&facts, EdgeKind::Defines, "model:Order"));
        assert!(!facts.edges.iter().any(|e| e.kind == EdgeKind::Inherits));
    }

    #[test]
    fn test_view_and_custom_base() {
        let facts = run(
            "shop/views.py",
            "class OrderView(APIView):\n    pass\n\nclass Special(BaseHandler, metaclass=Meta):\n    pass\n",
        );
        assert!(has_edge(&facts, EdgeKind::EndpointHandler, "shop/views.py::OrderView"));
        let inherits: Vec<&crate::parser::EdgeCandidate> =
            facts.edges.iter().filter(|e| e.kind == EdgeKind::Inherits).collect();
        assert_eq!(inherits.len(), 1);
        assert_eq!(inherits[0].from, Origin::File);
        assert_eq!(inherits[0].target, Target::Label("BaseHandler".to_string()));
        assert_eq!(facts.symbols, vec!["OrderView", "Special"]);
    }

    #[test]
    fn test_decorators() {
        let source = r#"
@shared_task
def send_report():
    pass

@app.route("/orders", methods=["POST"])
def create_order():
    Order.objects.create(total=1)

@receiver(post_save)
def on_save(sender, **kw):
    pass
"#;
        let facts = run("shop/jobs.py", source);
        assert!(has_edge(&facts, EdgeKind::TaskSchedule, "shop/jobs.py::send_report"));
        assert!(has_edge(&facts, EdgeKind::EndpointHandler, "shop/jobs.py::POST /orders"));
        assert!(has_edge(&facts, EdgeKind::EventListen, "event:post_save"));
        assert!(has_edge(&facts, EdgeKind::DbWrite, "model:Order"));
    }

    #[test]
    fn test_url_conf_routes() {
        let facts = run("shop/urls.py", "urlpatterns = [path('orders/', views.orders)]\n");
        assert!(has_edge(&facts, EdgeKind::EndpointHandler, "shop/urls.py::ANY orders/"));
    }
}
