//! Call-site rules shared by every analyzer.
//!
//! Each family (db reads, db writes, cache reads, cache writes, outgoing HTTP,
//! webhooks, event emission) is an ordered list of regular expressions. For one
//! piece of text at most one rule per family fires.

use std::sync::OnceLock;

use regex::Regex;

use crate::graph::edge::EdgeKind;
use crate::graph::node::NodeType;

use super::FileFacts;

/// Receivers that look like models but are language built-ins.
const NOT_MODELS: &[&str] = &[
    "self", "this", "cls", "super", "Object", "Array", "Promise", "Math", "JSON", "Date", "Reflect",
    "Symbol", "Number", "String", "Map", "Set", "Boolean", "Buffer", "URL", "Intl", "React", "Vue",
    "Error", "Console", "Path", "File", "Files", "Arrays", "Collections", "Optional", "Stream",
    "Route", "Cache", "Config", "DB", "Log", "Auth", "Session", "Storage", "Event", "Queue", "Http",
    "Request", "Redirect", "Schema", "Gate", "View", "Mail", "Validator", "Str", "Arr", "Carbon",
];

/// Receivers of `.send(` / `.emit(` that are transports, not events.
const NOT_EVENTS: &[&str] = &[
    "self", "this", "res", "response", "req", "request", "requests", "httpx", "axios", "http",
    "socket", "sock", "ws", "conn", "connection", "mail", "mailer", "smtp", "tx", "sender",
    "client", "session", "window", "process", "stream",
];

const LOCAL_HOSTS: &[&str] = &[
    "localhost", "127.0.0.1", "0.0.0.0", "example.com", "example.org", "schema.org", "www.w3.org",
    "w3.org",
];

struct ModelRule {
    re: Regex,
    /// Strip one trailing `s` (`context.Users` -> `User`).
    plural: bool,
}

struct CallRules {
    db_read: Vec<ModelRule>,
    db_write: Vec<ModelRule>,
    cache_read: Vec<Regex>,
    cache_write: Vec<Regex>,
    api_call: Vec<Regex>,
    webhook: Vec<Regex>,
    event_emit: Regex,
    string_literal: Regex,
    url: Regex,
}

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("invalid call-site pattern")
}

fn model(pattern: &str) -> ModelRule {
    ModelRule {
        re: re(pattern),
        plural: false,
    }
}

fn plural_model(pattern: &str) -> ModelRule {
    ModelRule {
        re: re(pattern),
        plural: true,
    }
}

impl CallRules {
    fn compile() -> Self {
        Self {
            db_read: vec![
                // Django ORM
                model(
                    r"\b(?P<model>\w+)\.objects\.(?:all|filter|get|exclude|values|values_list|annotate|aggregate|count|exists|first|last|order_by|select_related|prefetch_related|raw|extra|in_bulk|iterator)\b",
                ),
                // SQLAlchemy
                model(r"\bsession\.query\(\s*(?P<model>[A-Z]\w*)"),
                model(r"\bselect\(\s*(?P<model>[A-Z]\w*)\s*\)"),
                // Prisma
                model(
                    r"\bprisma\.(?P<model>\w+)\.(?:findUnique|findUniqueOrThrow|findFirst|findFirstOrThrow|findMany|count|aggregate|groupBy)\b",
                ),
                // Mongoose / Sequelize / ActiveRecord style statics
                model(
                    r"\b(?P<model>[A-Z]\w*)\.(?:find|findOne|findById|findAll|findMany|findByPk|findAndCountAll|countDocuments|aggregate|where|find_by|find_each|pluck|exists\?)\s*[(\s]",
                ),
                // Spring Data / TypeORM repositories
                model(r"\b(?P<model>\w+?)(?:Repository|Repo|_repository)\.(?:find\w*|get\w*|count\w*|exists\w*|query)\s*\("),
                // Eloquent
                model(r"\b(?P<model>[A-Z]\w*)::(?:where|find|findOrFail|all|first|get|query|with)\s*\("),
                // EF Core
                plural_model(
                    r"\b_?(?:context|db|ctx|dbContext)\.(?P<model>[A-Z]\w*)\s*\.(?:Where|First\w*|Single\w*|ToList\w*|Find\w*|Any\w*|Count\w*|Include|AsNoTracking)\b",
                ),
            ],
            db_write: vec![
                model(
                    r"\b(?P<model>\w+)\.objects\.(?:create|get_or_create|update_or_create|bulk_create|bulk_update)\b",
                ),
                model(r"\b(?P<model>\w+)\.objects\.filter\(.*\)\.(?:update|delete)\("),
                model(r"\bsession\.(?:add|merge|delete)\(\s*(?P<model>[A-Z]\w*)\("),
                model(
                    r"\bprisma\.(?P<model>\w+)\.(?:create|createMany|update|updateMany|upsert|delete|deleteMany)\b",
                ),
                model(
                    r"\b(?P<model>[A-Z]\w*)\.(?:create|insertMany|insertOne|updateOne|updateMany|deleteOne|deleteMany|findByIdAndUpdate|findOneAndUpdate|findByIdAndDelete|findOneAndDelete|bulkWrite|bulkCreate|destroy|upsert|create!|update_all|delete_all|destroy_all)\s*[(\s]",
                ),
                model(r"\b(?P<model>\w+?)(?:Repository|Repo|_repository)\.(?:save\w*|delete\w*|insert\w*|update\w*|remove\w*)\s*\("),
                model(r"\b(?P<model>[A-Z]\w*)::(?:create|insert|update|destroy|updateOrCreate|firstOrCreate|upsert)\s*\("),
                plural_model(
                    r"\b_?(?:context|db|ctx|dbContext)\.(?P<model>[A-Z]\w*)\s*\.(?:Add|AddRange|Remove|RemoveRange|Update|UpdateRange)\b",
                ),
            ],
            cache_read: vec![
                re(r"(?i)\b\w*(?:cache|redis)\w*\.(?:get|get_many|get_or_set|has_key|hget|hgetall|mget|lrange|smembers|exists|fetch)\s*\("),
                re(r"\bCache::(?:get|has|remember|rememberForever|pull)\s*\("),
                re(r"\bRails\.cache\.(?:read|fetch|exist\?)"),
            ],
            cache_write: vec![
                re(r"(?i)\b\w*(?:cache|redis)\w*\.(?:set|set_many|add|delete|delete_many|clear|hset|hdel|setex|lpush|rpush|sadd|mset|del|expire|incr|invalidate|put)\s*\("),
                re(r"\bCache::(?:put|forever|forget|flush|add)\s*\("),
                re(r"\bRails\.cache\.(?:write|delete|clear)"),
            ],
            api_call: vec![
                re(r"\b(?:requests|httpx)\.(?:get|post|put|patch|delete|head|options|request)\s*\("),
                re(r"\baiohttp\.ClientSession\b"),
                re(r"\burllib\.request\.urlopen\b"),
                re(r"\bfetch\s*\("),
                re(r"\baxios(?:\.(?:get|post|put|patch|delete|request))?\s*\("),
                re(r"\breqwest::(?:get|Client|blocking)\b"),
                re(r"\bhttp\.(?:Get|Post|PostForm|Head|NewRequest\w*)\s*\("),
                re(r"\b(?:RestTemplate|WebClient|HttpClient|OkHttpClient)\b"),
                re(r"\bNet::HTTP\b|\bHTTParty\.|\bFaraday\."),
                re(r"\bHttp::(?:get|post|put|patch|delete)\s*\(|\bcurl_init\s*\("),
            ],
            webhook: vec![
                re(r"(?i)webhook\w*\.(?:send|post|trigger|deliver|dispatch)\b"),
                re(r"(?i)\b(?:send|post|trigger|deliver|dispatch)_?webhooks?\b"),
            ],
            event_emit: re(
                r#"\b(?P<recv>\w+)\.(?:send_robust|send|emit|publish|dispatch|Publish|Emit)\s*\(\s*(?:["'`](?P<name>[\w.:\-]+)["'`])?"#,
            ),
            string_literal: re(r#"["'`](?P<s>[^"'`]*)["'`]"#),
            url: re(r#"https?://(?P<host>[A-Za-z0-9][\w\-.]*[A-Za-z0-9])(?::\d+)?[\w\-.~:/?#\[\]@!$&()*+,;=%]*"#),
        }
    }
}

fn rules() -> &'static CallRules {
    static RULES: OnceLock<CallRules> = OnceLock::new();
    RULES.get_or_init(CallRules::compile)
}

/// Normalise a captured model name: capitalised, optional plural stripped.
fn model_name(raw: &str, plural: bool) -> Option<String> {
    let raw = raw.trim_matches('_');
    if raw.is_empty() || NOT_MODELS.contains(&raw) {
        return None;
    }
    let mut chars = raw.chars();
    let first = chars.next()?;
    let mut name: String = first.to_uppercase().chain(chars).collect();
    if plural && name.len() > 3 && name.ends_with('s') && !name.ends_with("ss") {
        name.pop();
    }
    Some(name)
}

fn first_model(family: &[ModelRule], text: &str) -> Option<String> {
    family.iter().find_map(|rule| {
        let caps = rule.re.captures(text)?;
        model_name(caps.name("model")?.as_str(), rule.plural)
    })
}

fn is_local_host(host: &str) -> bool {
    let host = host.to_lowercase();
    LOCAL_HOSTS
        .iter()
        .any(|h| host == *h || host.ends_with(&format!(".{h}")))
}

/// The cache key named after `start`: the first string literal, else `cache`.
fn cache_key(text: &str, start: usize) -> String {
    rules()
        .string_literal
        .captures(&text[start..])
        .and_then(|c| c.name("s"))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty() && s.len() <= 64 && !s.contains(char::is_whitespace))
        .map(str::to_string)
        .unwrap_or_else(|| "cache".to_string())
}

fn record_model(facts: &mut FileFacts, kind: EdgeKind, name: String, line: usize) {
    let id = format!("model:{name}");
    facts.reference(id.clone(), NodeType::Collection, name, line);
    facts.link(kind, id, line);
}

fn record_api(facts: &mut FileFacts, host: &str, line: usize) {
    let id = format!("api:{host}");
    facts.reference(id.clone(), NodeType::ExternalApi, host, line);
    facts.link(EdgeKind::ApiCall, id, line);
}

/// Apply every call-site family to `text`, a call expression or a source line
/// of `file` starting at `line`.
pub fn scan(text: &str, line: usize, file: &str, facts: &mut FileFacts) {
    let rules = rules();

    if let Some(name) = first_model(&rules.db_read, text) {
        record_model(facts, EdgeKind::DbRead, name, line);
    }
    if let Some(name) = first_model(&rules.db_write, text) {
        record_model(facts, EdgeKind::DbWrite, name, line);
    }

    for (family, kind) in [
        (&rules.cache_read, EdgeKind::CacheRead),
        (&rules.cache_write, EdgeKind::CacheWrite),
    ] {
        if let Some(m) = family.iter().find_map(|r| r.find(text)) {
            let key = cache_key(text, m.start());
            let id = format!("cache:{key}");
            facts.reference(id.clone(), NodeType::CacheKey, key, line);
            facts.link(kind, id, line);
        }
    }

    if let Some(m) = rules.api_call.iter().find_map(|r| r.find(text)) {
        let tail = &text[m.start()..];
        let first_literal = rules
            .string_literal
            .captures(tail)
            .and_then(|c| c.name("s"))
            .map(|s| s.as_str());
        let relative = first_literal.is_some_and(|s| s.starts_with('/') || s.starts_with('.'));
        if !relative {
            match rules.url.captures(tail).and_then(|c| c.name("host")) {
                Some(host) if is_local_host(host.as_str()) => {}
                Some(host) => record_api(facts, host.as_str(), line),
                None => record_api(facts, "external_api", line),
            }
        }
    }

    if rules.webhook.iter().any(|r| r.is_match(text)) {
        let id = format!("webhook:{file}");
        facts.reference(id.clone(), NodeType::Webhook, "webhook_out", line);
        facts.link(EdgeKind::Webhook, id, line);
    }

    if let Some(caps) = rules.event_emit.captures(text) {
        let recv = caps.name("recv").map(|m| m.as_str()).unwrap_or("");
        let name = caps
            .name("name")
            .map(|m| m.as_str().to_string())
            .or_else(|| (!NOT_EVENTS.contains(&recv)).then(|| recv.to_string()));
        if let Some(name) = name.filter(|n| !n.is_empty()) {
            let id = format!("event:{name}");
            facts.reference(id.clone(), NodeType::Event, name, line);
            facts.link(EdgeKind::EventEmit, id, line);
        }
    }
}

/// Record an `api_call` for every literal external URL in `text`.
pub fn scan_urls(text: &str, line: usize, facts: &mut FileFacts) {
    for caps in rules().url.captures_iter(text) {
        if let Some(host) = caps.name("host")
            && !is_local_host(host.as_str())
        {
            record_api(facts, host.as_str(), line);
        }
    }
}
