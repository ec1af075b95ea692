//! Line-oriented extraction for languages without a tree-sitter grammar, and
//! the fallback for structurally-parsed files whose syntax tree has errors.
//!
//! Every language gets a [`LanguageRules`] table. Each source line is run
//! through the table in a fixed order: imports, route prefix, routes, model
//! shapes, event listeners, annotations, class declarations, annotated methods,
//! then the shared call-site rules.

use std::sync::OnceLock;

use anyhow::Result;
use regex::{Captures, Regex};

use crate::graph::edge::EdgeKind;
use crate::graph::node::NodeType;
use crate::language::LanguageKind;
use crate::walker::SourceFile;

use super::javascript::{FRAMEWORK_BASES, MIDDLEWARE_INTERFACES, join_route};
use super::python::{IGNORED_BASES, MODEL_BASES, SERIALIZER_BASES, VIEW_BASES};
use super::rust::{STD_TRAITS, expand_use, is_local_path};
use super::{Analyzer, FileFacts, ImportStyle, Origin, calls, route_id, symbol_id};

const HTTP_VERBS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

/// Pattern-rule analyzer used for php, ruby, java, csharp, vue and svelte.
pub struct PatternAnalyzer;

impl Analyzer for PatternAnalyzer {
    fn analyze(&self, file: &SourceFile, source: &str) -> Result<FileFacts> {
        Ok(extract_patterns(file, source))
    }
}

struct ImportRule {
    /// Group `spec`; optional groups `dots` (Python relative level) and `names`.
    re: Regex,
    style: ImportStyle,
    /// `spec` is a comma-separated list (`import a, b`).
    list: bool,
}

struct RouteRule {
    /// Group `path`; optional group `method`.
    re: Regex,
    default_method: &'static str,
    /// Only applied to files whose name contains this.
    file_hint: Option<&'static str>,
    /// Keep the path as written instead of normalising to `/a/b`.
    raw_path: bool,
}

struct ResourceRule {
    re: Regex,
    param: &'static str,
    update: &'static str,
}

/// Base and annotation names that classify a declared class.
#[derive(Default)]
struct ClassKinds {
    models: &'static [&'static str],
    endpoints: &'static [&'static str],
    serializers: &'static [&'static str],
    tasks: &'static [&'static str],
    middleware: &'static [&'static str],
    ignored: &'static [&'static str],
}

#[derive(Default)]
struct LanguageRules {
    comments: &'static [&'static str],
    imports: Vec<ImportRule>,
    /// Go's `import ( ... )` block.
    import_block: bool,
    routes: Vec<RouteRule>,
    resources: Vec<ResourceRule>,
    /// Class-level route prefix, only before the first class declaration.
    route_prefix: Option<Regex>,
    /// Group `model`; a reference read through a repository shape.
    model_reads: Vec<Regex>,
    /// Group `model`; a collection declared by the file (`DbSet<T>`).
    model_defs: Vec<Regex>,
    /// Group `name` (kept as written) or `cls` (last segment).
    listens: Vec<Regex>,
    /// Group `name`; an annotation, decorator or attribute line.
    marker: Option<Regex>,
    /// Groups `name` and optional `bases`.
    class: Option<Regex>,
    /// Group `base`; `impl Trait for T`.
    trait_impl: Option<Regex>,
    /// Group `name`; a method or function head.
    method: Option<Regex>,
    kinds: ClassKinds,
    /// Markers that turn the following class into a model, endpoint or service.
    model_markers: &'static [&'static str],
    endpoint_markers: &'static [&'static str],
    service_markers: &'static [&'static str],
    /// Markers that turn the following method into a scheduled task.
    task_markers: &'static [&'static str],
}

struct AllRules {
    python: LanguageRules,
    js: LanguageRules,
    php: LanguageRules,
    ruby: LanguageRules,
    java: LanguageRules,
    go: LanguageRules,
    rust: LanguageRules,
    csharp: LanguageRules,
}

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("invalid pattern rule")
}

fn import(pattern: &str, style: ImportStyle) -> ImportRule {
    ImportRule {
        re: re(pattern),
        style,
        list: false,
    }
}

fn route(pattern: &str, default_method: &'static str) -> RouteRule {
    RouteRule {
        re: re(pattern),
        default_method,
        file_hint: None,
        raw_path: false,
    }
}

const C_COMMENTS: &[&str] = &["//", "/*", "*"];
const HASH_COMMENTS: &[&str] = &["#"];
const PHP_COMMENTS: &[&str] = &["//", "/*", "*", "#"];

impl AllRules {
    fn compile() -> Self {
        Self {
            python: LanguageRules {
                comments: HASH_COMMENTS,
                imports: vec![
                    import(
                        r"^from\s+(?P<dots>\.*)(?P<spec>[\w.]*)\s+import\s+(?P<names>[\w\s,*]+)",
                        ImportStyle::Python { level: 0 },
                    ),
                    ImportRule {
                        re: re(r"^import\s+(?P<spec>[\w.]+(?:\s*,\s*[\w.]+)*)"),
                        style: ImportStyle::Python { level: 0 },
                        list: true,
                    },
                ],
                routes: vec![
                    route(
                        r#"^@\w+\.route\(\s*['"](?P<path>[^'"]+)['"](?:.*?methods\s*=\s*[\[(]\s*['"](?P<method>\w+))?"#,
                        "GET",
                    ),
                    route(r#"^@\w+\.(?P<method>get|post|put|patch|delete)\(\s*['"](?P<path>[^'"]+)['"]"#, "GET"),
                    RouteRule {
                        re: re(r#"\b(?:re_path|path|url)\(\s*r?['"](?P<path>[^'"]*)['"]"#),
                        default_method: "ANY",
                        file_hint: Some("urls"),
                        raw_path: true,
                    },
                ],
                listens: vec![re(r"^@receiver\(\s*(?:\w+\.)*(?P<name>\w+)")],
                marker: Some(re(r"^@(?:[\w]+\.)*(?P<name>\w+)")),
                class: Some(re(r"^class\s+(?P<name>\w+)\s*(?:\((?P<bases>[^)]*)\))?\s*:")),
                method: Some(re(r"^(?:async\s+)?def\s+(?P<name>\w+)")),
                kinds: ClassKinds {
                    models: MODEL_BASES,
                    endpoints: VIEW_BASES,
                    serializers: SERIALIZER_BASES,
                    middleware: &["MiddlewareMixin"],
                    ignored: IGNORED_BASES,
                    ..ClassKinds::default()
                },
                task_markers: &["task", "shared_task", "periodic_task"],
                ..LanguageRules::default()
            },
            js: LanguageRules {
                comments: C_COMMENTS,
                imports: vec![
                    import(r#"\bimport\s+(?:[\w*{}\s,$]+\s+from\s+)?['"](?P<spec>[^'"]+)['"]"#, ImportStyle::Js),
                    import(r#"\bexport\s+[\w*{}\s,$]+\s+from\s+['"](?P<spec>[^'"]+)['"]"#, ImportStyle::Js),
                    import(r#"\brequire\(\s*['"](?P<spec>[^'"]+)['"]\s*\)"#, ImportStyle::Js),
                    import(r#"\bimport\(\s*['"](?P<spec>[^'"]+)['"]\s*\)"#, ImportStyle::Js),
                ],
                routes: vec![route(
                    r#"\b(?:app|router|server|api|routes|\w*[rR]outer)\.(?P<method>get|post|put|patch|delete|all|options|head)\(\s*['"`](?P<path>/[^'"`]*)['"`]"#,
                    "ANY",
                )],
                listens: vec![re(r#"@OnEvent\(\s*['"](?P<name>[^'"]+)['"]"#)],
                marker: Some(re(r"^@(?P<name>\w+)")),
                class: Some(re(
                    r"^(?:export\s+)?(?:default\s+)?(?:abstract\s+)?class\s+(?P<name>\w+)(?P<bases>[^{]*)",
                )),
                method: Some(re(r"^(?:(?:public|private|protected|static|async)\s+)*(?P<name>\w+)\s*\(")),
                kinds: ClassKinds {
                    models: &["Model"],
                    middleware: MIDDLEWARE_INTERFACES,
                    ignored: FRAMEWORK_BASES,
                    ..ClassKinds::default()
                },
                model_markers: &["Entity", "Schema", "Table", "Document"],
                endpoint_markers: &["Controller", "Resolver"],
                service_markers: &["Injectable"],
                task_markers: &["Cron", "Interval", "Timeout", "Process"],
                ..LanguageRules::default()
            },
            php: LanguageRules {
                comments: PHP_COMMENTS,
                imports: vec![
                    import(r"^use\s+(?P<spec>[\w\\]+)(?:\s+as\s+\w+)?\s*;", ImportStyle::Stem),
                    import(
                        r#"\b(?:require|include)(?:_once)?\s*\(?\s*(?:__DIR__\s*\.\s*)?['"](?P<spec>[^'"]+)['"]"#,
                        ImportStyle::Relative,
                    ),
                ],
                routes: vec![route(
                    r#"Route::(?P<method>get|post|put|patch|delete|options|any)\(\s*['"](?P<path>[^'"]*)['"]"#,
                    "ANY",
                )],
                resources: vec![ResourceRule {
                    re: re(r#"Route::(?:api)?[rR]esource\(\s*['"](?P<path>[^'"]+)['"]"#),
                    param: "{id}",
                    update: "PUT",
                }],
                listens: vec![re(
                    r#"Event::listen\(\s*(?:['"](?P<name>[\w.:\\]+)['"]|(?P<cls>[\w\\]+)::class)"#,
                )],
                class: Some(re(
                    r"^(?:(?:abstract|final|readonly)\s+)*(?:class|interface|trait)\s+(?P<name>\w+)(?P<bases>[^{]*)",
                )),
                kinds: ClassKinds {
                    models: &["Model", "Eloquent", "Authenticatable", "Pivot"],
                    endpoints: &["Controller", "BaseController"],
                    serializers: &["JsonResource", "ResourceCollection"],
                    tasks: &["ShouldQueue"],
                    ignored: &["Exception", "Throwable", "JsonSerializable", "Stringable"],
                    ..ClassKinds::default()
                },
                ..LanguageRules::default()
            },
            ruby: LanguageRules {
                comments: HASH_COMMENTS,
                imports: vec![
                    import(r#"^require_relative\s+['"](?P<spec>[^'"]+)['"]"#, ImportStyle::Relative),
                    import(r#"^require\s+['"](?P<spec>[^'"]+)['"]"#, ImportStyle::Stem),
                    import(r"^include\s+(?P<spec>[A-Z][\w:]*)", ImportStyle::Stem),
                ],
                routes: vec![route(
                    r#"^(?P<method>get|post|put|patch|delete|match)\s+['"](?P<path>[^'"]+)['"]"#,
                    "ANY",
                )],
                resources: vec![ResourceRule {
                    re: re(r"^resources\s+:(?P<path>\w+)"),
                    param: ":id",
                    update: "PATCH",
                }],
                listens: vec![re(r#"Notifications\.subscribe\(\s*['"](?P<name>[\w.]+)['"]"#)],
                class: Some(re(r"^class\s+(?P<name>[\w:]+)(?:\s*<\s*(?P<bases>[\w:]+))?")),
                kinds: ClassKinds {
                    models: &["ApplicationRecord", "ActiveRecord::Base"],
                    endpoints: &["ApplicationController", "ActionController::Base", "ActionController::API"],
                    serializers: &["ActiveModel::Serializer", "ApplicationSerializer"],
                    tasks: &["ApplicationJob", "ActiveJob::Base"],
                    ignored: &["StandardError", "Struct", "Exception"],
                    ..ClassKinds::default()
                },
                ..LanguageRules::default()
            },
            java: LanguageRules {
                comments: C_COMMENTS,
                imports: vec![import(r"^import\s+(?:static\s+)?(?P<spec>[\w.]+?)(?:\.\*)?\s*;", ImportStyle::Stem)],
                routes: vec![route(
                    r#"@(?P<method>Get|Post|Put|Delete|Patch|Request)Mapping\b(?:\s*\(\s*(?:(?:value|path)\s*=\s*)?\{?\s*"(?P<path>[^"]*)")?"#,
                    "ANY",
                )],
                route_prefix: Some(re(r#"^@RequestMapping\s*\(\s*(?:(?:value|path)\s*=\s*)?\{?\s*"(?P<path>[^"]*)""#)),
                model_reads: vec![re(
                    r"\b(?:Jpa|Crud|Mongo|PagingAndSorting|Reactive\w*)Repository<\s*(?P<model>\w+)",
                )],
                listens: vec![re(
                    r#"@(?:KafkaListener|RabbitListener|JmsListener)\(\s*(?:topics|queues|destination)\s*=\s*\{?\s*"(?P<name>[^"]+)""#,
                )],
                marker: Some(re(r"^@(?P<name>\w+)")),
                class: Some(re(
                    r"\b(?:class|interface|enum|record)\s+(?P<name>\w+)(?P<bases>[^{]*)",
                )),
                method: Some(re(
                    r"^(?:(?:public|private|protected|static|final|synchronized|abstract)\s+)*[\w<>\[\],.?]+\s+(?P<name>\w+)\s*\(",
                )),
                kinds: ClassKinds {
                    middleware: &["Filter", "OncePerRequestFilter", "HandlerInterceptor", "GenericFilterBean"],
                    ignored: &[
                        "Object",
                        "Serializable",
                        "Exception",
                        "RuntimeException",
                        "Comparable",
                        "Cloneable",
                        "Runnable",
                        "JpaRepository",
                        "CrudRepository",
                        "MongoRepository",
                        "PagingAndSortingRepository",
                    ],
                    ..ClassKinds::default()
                },
                model_markers: &["Entity", "Document", "Table"],
                endpoint_markers: &["RestController", "Controller"],
                service_markers: &["Service"],
                task_markers: &["Scheduled", "Async"],
                ..LanguageRules::default()
            },
            go: LanguageRules {
                comments: C_COMMENTS,
                imports: vec![import(r#"^import\s+(?:[\w.]+\s+)?"(?P<spec>[^"]+)""#, ImportStyle::Go)],
                import_block: true,
                routes: vec![route(
                    r#"\.(?P<method>HandleFunc|Handle|GET|POST|PUT|PATCH|DELETE|Get|Post|Put|Patch|Delete)\(\s*"(?P<path>[^"]+)""#,
                    "ANY",
                )],
                class: Some(re(r"^type\s+(?P<name>\w+)\s+")),
                ..LanguageRules::default()
            },
            rust: LanguageRules {
                comments: &["//", "/*", "*"],
                imports: vec![
                    import(r"^(?:pub(?:\([^)]*\))?\s+)?mod\s+(?P<spec>\w+)\s*;", ImportStyle::RustMod),
                    import(r"^(?:pub(?:\([^)]*\))?\s+)?use\s+(?P<spec>[^;]+);", ImportStyle::RustUse),
                ],
                routes: vec![
                    route(
                        r#"#\[\s*(?:\w+::)*(?P<method>get|post|put|patch|delete|head|options)\s*\(\s*"(?P<path>[^"]*)""#,
                        "ANY",
                    ),
                    route(r#"\.route\(\s*"(?P<path>[^"]+)"\s*,\s*(?P<method>get|post|put|patch|delete|any)\s*\("#, "ANY"),
                ],
                class: Some(re(
                    r"^(?:pub(?:\([^)]*\))?\s+)?(?:struct|enum|trait|type|union)\s+(?P<name>\w+)",
                )),
                trait_impl: Some(re(r"^impl(?:<[^>]*>)?\s+(?P<base>[\w:]+)(?:<[^>]*>)?\s+for\s+")),
                ..LanguageRules::default()
            },
            csharp: LanguageRules {
                comments: C_COMMENTS,
                imports: vec![import(r"^using\s+(?:static\s+)?(?P<spec>[\w.]+)\s*;", ImportStyle::Stem)],
                routes: vec![
                    route(r#"\[Http(?P<method>Get|Post|Put|Patch|Delete)(?:\(\s*"(?P<path>[^"]*)"\s*\))?\]"#, "ANY"),
                    route(r#"\.Map(?P<method>Get|Post|Put|Patch|Delete)\(\s*"(?P<path>[^"]*)""#, "ANY"),
                ],
                route_prefix: Some(re(r#"^\[Route\(\s*"(?P<path>[^"]*)"\s*\)\]"#)),
                model_defs: vec![re(r"\bDbSet<\s*(?P<model>\w+)\s*>")],
                marker: Some(re(r"^\[(?P<name>\w+)")),
                class: Some(re(
                    r"\b(?:class|interface|record|struct)\s+(?P<name>\w+)(?P<bases>[^{]*)",
                )),
                method: Some(re(
                    r"^(?:(?:public|private|protected|internal|static|async|virtual|override)\s+)*[\w<>\[\],.?]+\s+(?P<name>\w+)\s*\(",
                )),
                kinds: ClassKinds {
                    endpoints: &["Controller", "ControllerBase"],
                    tasks: &["BackgroundService", "IHostedService", "IJob"],
                    middleware: &["IMiddleware"],
                    ignored: &["Exception", "IDisposable", "DbContext", "IEquatable", "Attribute"],
                    ..ClassKinds::default()
                },
                model_markers: &["Table"],
                endpoint_markers: &["ApiController"],
                ..LanguageRules::default()
            },
        }
    }

    fn for_language(&self, language: LanguageKind) -> &LanguageRules {
        match language {
            LanguageKind::Python => &self.python,
            LanguageKind::JavaScript | LanguageKind::TypeScript | LanguageKind::Vue | LanguageKind::Svelte => {
                &self.js
            }
            LanguageKind::Php => &self.php,
            LanguageKind::Ruby => &self.ruby,
            LanguageKind::Java => &self.java,
            LanguageKind::Go => &self.go,
            LanguageKind::Rust => &self.rust,
            LanguageKind::CSharp => &self.csharp,
        }
    }
}

fn rules() -> &'static AllRules {
    static RULES: OnceLock<AllRules> = OnceLock::new();
    RULES.get_or_init(AllRules::compile)
}

/// Line state carried across one file.
#[derive(Default)]
struct Scan {
    in_import_block: bool,
    class_seen: bool,
    current_class: Option<String>,
    route_prefix: Option<String>,
    markers: Vec<String>,
}

/// Extract facts from `source` with the pattern rules of `file`'s language.
pub fn extract_patterns(file: &SourceFile, source: &str) -> FileFacts {
    let lang = rules().for_language(file.language);
    let mut facts = FileFacts::default();
    let mut scan = Scan::default();

    for (idx, raw) in source.lines().enumerate() {
        let line = raw.trim();
        let line_no = idx + 1;
        if line.is_empty() || is_comment(lang, line) {
            continue;
        }

        if lang.import_block && go_import_block(line, line_no, &mut scan, &mut facts) {
            continue;
        }
        imports(lang, line, line_no, &mut facts);

        if !scan.class_seen
            && let Some(caps) = lang.route_prefix.as_ref().and_then(|r| r.captures(line))
        {
            scan.route_prefix = caps.name("path").map(|p| p.as_str().to_string());
            continue;
        }
        routes(lang, &file.rel, line, line_no, &scan, &mut facts);
        resources(lang, &file.rel, line, line_no, &mut facts);
        models(lang, line, line_no, &mut facts);
        listens(lang, line, line_no, &mut facts);

        if let Some(caps) = lang.marker.as_ref().and_then(|r| r.captures(line)) {
            scan.markers.push(caps["name"].to_string());
        } else if let Some(caps) = lang.class.as_ref().and_then(|r| r.captures(line)) {
            class(lang, &file.rel, &caps, line_no, &scan.markers, &mut facts);
            let name = caps["name"].rsplit("::").next().unwrap_or("").to_string();
            scan.current_class = Some(name);
            scan.class_seen = true;
            scan.markers.clear();
        } else if let Some(caps) = lang.trait_impl.as_ref().and_then(|r| r.captures(line)) {
            let base = caps["base"].rsplit("::").next().unwrap_or("");
            if !STD_TRAITS.contains(&base) {
                facts.inherits(Origin::File, base, line_no);
            }
        } else if !scan.markers.is_empty()
            && let Some(caps) = lang.method.as_ref().and_then(|r| r.captures(line))
        {
            method(lang, &file.rel, &caps["name"], line_no, &scan, &mut facts);
            scan.markers.clear();
        }

        calls::scan(line, line_no, &file.rel, &mut facts);
        calls::scan_urls(line, line_no, &mut facts);
    }
    facts
}

fn is_comment(lang: &LanguageRules, line: &str) -> bool {
    lang.comments.iter().any(|c| line.starts_with(c))
}

/// Handle `import (` ... `)`; returns whether the line belonged to the block.
fn go_import_block(line: &str, line_no: usize, scan: &mut Scan, facts: &mut FileFacts) -> bool {
    if scan.in_import_block {
        if line.starts_with(')') {
            scan.in_import_block = false;
        } else if let Some(start) = line.find('"')
            && let Some(len) = line[start + 1..].find('"')
        {
            let spec = &line[start + 1..start + 1 + len];
            facts.import(ImportStyle::Go, spec, Vec::new(), line_no);
        }
        return true;
    }
    if line.starts_with("import (") || line == "import(" {
        scan.in_import_block = true;
        return true;
    }
    false
}

fn imports(lang: &LanguageRules, line: &str, line_no: usize, facts: &mut FileFacts) {
    for rule in &lang.imports {
        for caps in rule.re.captures_iter(line) {
            let spec = caps.name("spec").map(|m| m.as_str().trim()).unwrap_or("");
            let style = match (rule.style, caps.name("dots")) {
                (ImportStyle::Python { .. }, Some(dots)) => ImportStyle::Python {
                    level: dots.as_str().len(),
                },
                (style, _) => style,
            };
            let names: Vec<String> = caps
                .name("names")
                .map(|m| {
                    m.as_str()
                        .split(',')
                        .filter_map(|n| n.split_whitespace().next())
                        .filter(|n| *n != "*")
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();

            match style {
                ImportStyle::RustUse => {
                    for path in expand_use(spec).into_iter().filter(|p| is_local_path(p)) {
                        facts.import(style, path, Vec::new(), line_no);
                    }
                }
                _ if rule.list => {
                    for part in spec.split(',') {
                        facts.import(style, part.trim(), Vec::new(), line_no);
                    }
                }
                _ => facts.import(style, spec, names, line_no),
            }
        }
    }
}

/// Verb and path of a route declaration; `"GET /x"` patterns carry their verb.
fn route_parts(method: &str, path: &str) -> (String, String) {
    if let Some((verb, rest)) = path.split_once(' ')
        && HTTP_VERBS.contains(&verb)
    {
        return (verb.to_string(), rest.trim().to_string());
    }
    let verb = match method.to_uppercase().as_str() {
        "REQUEST" | "HANDLEFUNC" | "HANDLE" | "ALL" | "MATCH" | "ANY" => "ANY".to_string(),
        other => other.to_string(),
    };
    (verb, path.to_string())
}

fn add_route(file: &str, method: &str, path: &str, line: usize, facts: &mut FileFacts) {
    let id = route_id(file, method, path);
    facts.define(id.clone(), NodeType::Endpoint, format!("{} {path}", method.to_uppercase()), line);
    facts.link(EdgeKind::EndpointHandler, id, line);
}

fn routes(lang: &LanguageRules, file: &str, line: &str, line_no: usize, scan: &Scan, facts: &mut FileFacts) {
    let file_name = file.rsplit('/').next().unwrap_or(file);
    for rule in &lang.routes {
        if rule.file_hint.is_some_and(|hint| !file_name.contains(hint)) {
            continue;
        }
        for caps in rule.re.captures_iter(line) {
            let method = caps.name("method").map(|m| m.as_str()).unwrap_or(rule.default_method);
            let path = caps.name("path").map(|m| m.as_str()).unwrap_or("");
            let (verb, path) = route_parts(method, path);
            let path = if rule.raw_path {
                if path.is_empty() { "/".to_string() } else { path }
            } else {
                let prefix = scan.route_prefix.as_deref().map(|p| controller_token(p, scan));
                join_route(prefix.as_deref(), Some(path.as_str()))
            };
            add_route(file, &verb, &path, line_no, facts);
        }
    }
}

/// Replace ASP.NET's `[controller]` token with the controller name.
fn controller_token(prefix: &str, scan: &Scan) -> String {
    match &scan.current_class {
        Some(class) if prefix.contains("[controller]") => {
            prefix.replace("[controller]", class.strip_suffix("Controller").unwrap_or(class))
        }
        _ => prefix.to_string(),
    }
}

fn resources(lang: &LanguageRules, file: &str, line: &str, line_no: usize, facts: &mut FileFacts) {
    for rule in &lang.resources {
        let Some(caps) = rule.re.captures(line) else {
            continue;
        };
        let base = join_route(None, Some(&caps["path"]));
        let member = format!("{base}/{}", rule.param);
        for (verb, path) in [
            ("GET", &base),
            ("POST", &base),
            ("GET", &member),
            (rule.update, &member),
            ("DELETE", &member),
        ] {
            add_route(file, verb, path, line_no, facts);
        }
    }
}

fn models(lang: &LanguageRules, line: &str, line_no: usize, facts: &mut FileFacts) {
    for rule in &lang.model_reads {
        if let Some(caps) = rule.captures(line) {
            let name = &caps["model"];
            let id = format!("model:{name}");
            facts.reference(id.clone(), NodeType::Collection, name, line_no);
            facts.link(EdgeKind::DbRead, id, line_no);
        }
    }
    for rule in &lang.model_defs {
        if let Some(caps) = rule.captures(line) {
            let name = &caps["model"];
            let id = format!("model:{name}");
            facts.define(id.clone(), NodeType::Collection, name, line_no);
            facts.link(EdgeKind::Defines, id, line_no);
        }
    }
}

fn listens(lang: &LanguageRules, line: &str, line_no: usize, facts: &mut FileFacts) {
    for rule in &lang.listens {
        let Some(caps) = rule.captures(line) else {
            continue;
        };
        let name = match (caps.name("name"), caps.name("cls")) {
            (Some(name), _) => name.as_str(),
            (None, Some(cls)) => cls.as_str().rsplit(['\\', '.']).next().unwrap_or(""),
            (None, None) => continue,
        };
        if name.is_empty() {
            continue;
        }
        let id = format!("event:{name}");
        facts.reference(id.clone(), NodeType::Event, name, line_no);
        facts.link(EdgeKind::EventListen, id, line_no);
    }
}

/// Base type names from the text after a class name: generics and
/// parenthesised parts removed, keywords dropped.
fn base_names(raw: &str) -> Vec<String> {
    let raw = raw.split(" where ").next().unwrap_or(raw);
    let mut flat = String::with_capacity(raw.len());
    let mut depth = 0usize;
    for c in raw.chars() {
        match c {
            '<' | '(' => depth += 1,
            '>' | ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => flat.push(c),
            _ => {}
        }
    }
    let scoped = flat.contains("::");
    flat.split(|c: char| c == ',' || c.is_whitespace() || (c == ':' && !scoped))
        .map(|s| s.trim_matches(|c: char| c == ':' || c == '{'))
        .filter(|s| !s.is_empty() && !s.contains('='))
        .filter(|s| !matches!(*s, "extends" | "implements" | "with" | "public" | "private" | "protected" | "internal"))
        .map(str::to_string)
        .collect()
}

fn matches_kind(bases: &[String], set: &[&str]) -> bool {
    bases.iter().any(|b| {
        let last = b.rsplit(['.', ':', '\\']).next().unwrap_or(b);
        set.contains(&b.as_str()) || set.contains(&last)
    })
}

fn has_marker(markers: &[String], set: &[&str]) -> bool {
    markers.iter().any(|m| set.contains(&m.as_str()))
}

fn class(lang: &LanguageRules, file: &str, caps: &Captures<'_>, line: usize, markers: &[String], facts: &mut FileFacts) {
    let name = caps["name"].rsplit("::").next().unwrap_or("");
    if name.is_empty() {
        return;
    }
    let bases = caps.name("bases").map(|b| base_names(b.as_str())).unwrap_or_default();
    let kinds = &lang.kinds;
    facts.symbols.push(name.to_string());

    let declared = if has_marker(markers, lang.model_markers) || matches_kind(&bases, kinds.models) {
        Some((format!("model:{name}"), NodeType::Collection, EdgeKind::Defines))
    } else if has_marker(markers, lang.endpoint_markers) || matches_kind(&bases, kinds.endpoints) {
        Some((symbol_id(file, name), NodeType::Endpoint, EdgeKind::EndpointHandler))
    } else if matches_kind(&bases, kinds.serializers) {
        Some((symbol_id(file, name), NodeType::Serializer, EdgeKind::Defines))
    } else if matches_kind(&bases, kinds.tasks) {
        Some((symbol_id(file, name), NodeType::Task, EdgeKind::TaskSchedule))
    } else if matches_kind(&bases, kinds.middleware) || name.ends_with("Middleware") {
        Some((symbol_id(file, name), NodeType::Middleware, EdgeKind::MiddlewareChain))
    } else if has_marker(markers, lang.service_markers) {
        Some((symbol_id(file, name), NodeType::Service, EdgeKind::Defines))
    } else {
        None
    };

    let origin = match declared {
        Some((id, kind, edge)) => {
            facts.define(id.clone(), kind, name, line);
            facts.link(edge, id.clone(), line);
            Origin::Node(id)
        }
        None => Origin::File,
    };

    let framework = [
        kinds.models,
        kinds.endpoints,
        kinds.serializers,
        kinds.tasks,
        kinds.middleware,
        kinds.ignored,
    ];
    for base in &bases {
        if !framework.iter().any(|set| matches_kind(std::slice::from_ref(base), set)) {
            facts.inherits(origin.clone(), base, line);
        }
    }
}

fn method(lang: &LanguageRules, file: &str, name: &str, line: usize, scan: &Scan, facts: &mut FileFacts) {
    if !has_marker(&scan.markers, lang.task_markers) {
        return;
    }
    let label = match &scan.current_class {
        Some(class) => format!("{class}.{name}"),
        None => name.to_string(),
    };
    let id = symbol_id(file, &label);
    facts.define(id.clone(), NodeType::Task, label, line);
    facts.link(EdgeKind::TaskSchedule, id, line);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Target;
    use crate::parser::test_support::{has_edge, node, source_file};

    fn facts(rel: &str, source: &str) -> FileFacts {
        extract_patterns(&source_file(rel), source)
    }

    fn imports_of(facts: &FileFacts) -> Vec<(ImportStyle, String)> {
        facts
            .edges
            .iter()
            .filter_map(|e| match &e.target {
                Target::Import(r) => Some((r.style, r.spec.clone())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_python_fallback_imports_and_routes() {
        let source = "from ..core import models\nimport os, json\n@app.route('/items', methods=['POST'])\ndef create():\n    pass\n";
        let f = facts("svc/api.py", source);
        assert_eq!(
            imports_of(&f),
            vec![
                (ImportStyle::Python { level: 2 }, "core".to_string()),
                (ImportStyle::Python { level: 0 }, "os".to_string()),
                (ImportStyle::Python { level: 0 }, "json".to_string()),
            ]
        );
        assert!(has_edge(&f, EdgeKind::EndpointHandler, "svc/api.py::POST /items"));
    }

    #[test]
    fn test_laravel_routes_and_model() {
        let source = r#"<?php
use App\Http\Controllers\UserController;
// Route::get('/ignored', fn() => 1);
Route::get('/users', [UserController::class, 'index']);
Route::resource('photos', PhotoController::class);
"#;
        let f = facts("routes/web.php", source);
        assert_eq!(imports_of(&f), vec![(ImportStyle::Stem, "App\\Http\\Controllers\\UserController".to_string())]);
        assert!(has_edge(&f, EdgeKind::EndpointHandler, "routes/web.php::GET /users"));
        assert!(has_edge(&f, EdgeKind::EndpointHandler, "routes/web.php::PUT /photos/{id}"));
        assert!(!has_edge(&f, EdgeKind::EndpointHandler, "routes/web.php::GET /ignored"));
        assert_eq!(f.nodes.len(), 6);

        let f = facts("app/Models/User.php", "class User extends Model\n{\n    $this->posts = Post::where('a', 1)->get();\n}\n");
        assert!(node(&f, "model:User").is_some_and(|n| n.defined));
        assert!(has_edge(&f, EdgeKind::DbRead, "model:Post"));
    }

    #[test]
    fn test_rails_routes_and_records() {
        let f = facts("config/routes.rb", "Rails.application.routes.draw do\n  resources :orders\n  get 'health', to: 'status#show'\nend\n");
        assert!(has_edge(&f, EdgeKind::EndpointHandler, "config/routes.rb::GET /orders/:id"));
        assert!(has_edge(&f, EdgeKind::EndpointHandler, "config/routes.rb::PATCH /orders/:id"));
        assert!(has_edge(&f, EdgeKind::EndpointHandler, "config/routes.rb::GET /health"));

        let source = "require_relative '../lib/pricing'\nclass Order < ApplicationRecord\n  include Auditable\nend\nclass ChargeJob < ApplicationJob\nend\n";
        let f = facts("app/models/order.rb", source);
        assert_eq!(
            imports_of(&f),
            vec![
                (ImportStyle::Relative, "../lib/pricing".to_string()),
                (ImportStyle::Stem, "Auditable".to_string()),
            ]
        );
        assert!(has_edge(&f, EdgeKind::Defines, "model:Order"));
        assert!(has_edge(&f, EdgeKind::TaskSchedule, "app/models/order.rb::ChargeJob"));
    }

    #[test]
    fn test_spring_controller_entity_and_repository() {
        let source = r#"package com.shop.web;

import com.shop.service.UserService;

@RestController
@RequestMapping("/api/users")
public class UserController extends BaseController {
    @GetMapping("/{id}")
    public User get(@PathVariable Long id) {
        return userRepository.findById(id);
    }

    @Scheduled(cron = "0 0 * * * *")
    public void purge() {}
}
"#;
        let f = facts("src/main/java/com/shop/web/UserController.java", source);
        let file = "src/main/java/com/shop/web/UserController.java";
        assert_eq!(imports_of(&f), vec![(ImportStyle::Stem, "com.shop.service.UserService".to_string())]);
        assert!(has_edge(&f, EdgeKind::EndpointHandler, &format!("{file}::GET /api/users/{{id}}")));
        assert!(has_edge(&f, EdgeKind::EndpointHandler, &format!("{file}::UserController")));
        assert!(has_edge(&f, EdgeKind::TaskSchedule, &format!("{file}::UserController.purge")));
        assert!(has_edge(&f, EdgeKind::DbRead, "model:User"));
        assert!(has_edge(&f, EdgeKind::Inherits, "BaseController"));

        let f = facts("User.java", "@Entity\npublic class User {}\n");
        assert!(has_edge(&f, EdgeKind::Defines, "model:User"));

        let f = facts("UserRepository.java", "public interface UserRepository extends JpaRepository<User, Long> {}\n");
        assert!(has_edge(&f, EdgeKind::DbRead, "model:User"));
        assert!(!has_edge(&f, EdgeKind::Inherits, "JpaRepository"));
    }

    #[test]
    fn test_aspnet_controller_and_dbset() {
        let source = r#"using Shop.Data;

[ApiController]
[Route("api/[controller]")]
public class OrdersController : ControllerBase
{
    [HttpGet("{id}")]
    public IActionResult Get(int id) => Ok();
}
"#;
        let f = facts("Controllers/OrdersController.cs", source);
        assert_eq!(imports_of(&f), vec![(ImportStyle::Stem, "Shop.Data".to_string())]);
        assert!(has_edge(&f, EdgeKind::EndpointHandler, "Controllers/OrdersController.cs::GET /api/Orders/{id}"));

        let f = facts("Data/ShopContext.cs", "public class ShopContext : DbContext\n{\n    public DbSet<Order> Orders { get; set; }\n}\n");
        assert!(has_edge(&f, EdgeKind::Defines, "model:Order"));
        assert!(!f.edges.iter().any(|e| e.kind == EdgeKind::Inherits));
    }

    #[test]
    fn test_go_and_rust_fallback_imports() {
        let f = facts("cmd/main.go", "package main\n\nimport (\n    \"fmt\"\n    db \"example.com/app/db\"\n)\n");
        assert_eq!(
            imports_of(&f),
            vec![
                (ImportStyle::Go, "fmt".to_string()),
                (ImportStyle::Go, "example.com/app/db".to_string()),
            ]
        );

        let f = facts("src/lib.rs", "pub mod store;\nuse crate::store::{Store, load};\nuse std::io;\n");
        assert_eq!(
            imports_of(&f),
            vec![
                (ImportStyle::RustMod, "store".to_string()),
                (ImportStyle::RustUse, "crate::store::Store".to_string()),
                (ImportStyle::RustUse, "crate::store::load".to_string()),
            ]
        );
    }

    #[test]
    fn test_vue_script_imports_and_external_urls() {
        let source = "<script setup>\nimport Card from './Card.vue'\nconst r = await fetch('https://api.github.com/repos')\n</script>\n";
        let f = facts("src/components/Repo.vue", source);
        assert_eq!(imports_of(&f), vec![(ImportStyle::Js, "./Card.vue".to_string())]);
        assert!(has_edge(&f, EdgeKind::ApiCall, "api:api.github.com"));
    }

    #[test]
    fn test_base_names() {
        assert_eq!(base_names(" extends Base implements A, B<T> "), vec!["Base", "A", "B"]);
        assert_eq!(base_names("<T> : Repo<T>, IDisposable where T : class"), vec!["Repo", "IDisposable"]);
        assert_eq!(base_names("(int X) implements Shape"), vec!["Shape"]);
    }
}
