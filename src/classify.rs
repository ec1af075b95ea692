//! Role classification of source files.
//!
//! Resolution order, first match wins:
//! 1. file-name rules, checked in [`RULE_ORDER`];
//! 2. barrel files (`index.*`, `__init__.py`, `mod.rs`) are plain `file`;
//! 3. directory rules, checked in the same order;
//! 4. `file`.
//!
//! Directory names are a weak signal: `models/__init__.py` is a barrel and
//! stays `file`, only `models/user.py` falls through to `collection`.

use crate::graph::node::NodeType;

/// The fixed order in which both file-name and directory rules are tried.
pub const RULE_ORDER: [NodeType; 13] = [
    NodeType::Test,
    NodeType::Config,
    NodeType::Router,
    NodeType::Middleware,
    NodeType::Serializer,
    NodeType::Collection,
    NodeType::Endpoint,
    NodeType::Service,
    NodeType::Task,
    NodeType::Webhook,
    NodeType::Event,
    NodeType::Utility,
    NodeType::Component,
];

const CONFIG_FILES: &[&str] = &[
    "settings.py",
    "config.py",
    "conf.py",
    "setup.py",
    "manage.py",
    "wsgi.py",
    "asgi.py",
    "config.js",
    "config.ts",
    "build.rs",
    "config.php",
    "application.java",
];

const BARREL_FILES: &[&str] = &[
    "index.ts",
    "index.tsx",
    "index.js",
    "index.jsx",
    "index.mjs",
    "index.cjs",
    "__init__.py",
    "mod.rs",
];

/// Lowercased pieces of a relative path the rules look at.
struct PathParts<'a> {
    /// File name, e.g. `user.service.ts`.
    name: &'a str,
    /// File name without its last extension, e.g. `user.service`.
    stem: &'a str,
    ext: &'a str,
    /// Directory components, root first.
    dirs: Vec<&'a str>,
}

impl<'a> PathParts<'a> {
    fn new(lower: &'a str) -> Self {
        let mut segments: Vec<&str> = lower.split('/').filter(|s| !s.is_empty()).collect();
        let name = segments.pop().unwrap_or("");
        let (stem, ext) = match name.rfind('.') {
            Some(i) if i > 0 => (&name[..i], &name[i + 1..]),
            _ => (name, ""),
        };
        Self {
            name,
            stem,
            ext,
            dirs: segments,
        }
    }

    /// True if the stem, split on `.`, `_` and `-`, contains `word`.
    fn stem_has_word(&self, word: &str) -> bool {
        self.stem.split(['.', '_', '-']).any(|w| w == word)
    }

    fn in_dir(&self, names: &[&str]) -> bool {
        self.dirs.iter().any(|d| names.contains(d))
    }
}

fn name_rule(kind: NodeType, p: &PathParts<'_>) -> bool {
    match kind {
        NodeType::Test => {
            p.name.starts_with("test_")
                || p.name == "tests.py"
                || p.name == "conftest.py"
                || p.stem.ends_with("_test")
                || p.stem.ends_with("_spec")
                || p.stem.ends_with(".test")
                || p.stem.ends_with(".spec")
                || (p.ext == "java" && p.stem.ends_with("test"))
        }
        NodeType::Config => {
            CONFIG_FILES.contains(&p.name) || p.stem.ends_with(".config") || p.stem == "settings"
        }
        NodeType::Router => {
            p.name == "urls.py"
                || matches!(p.stem, "routes" | "router" | "routing")
                || p.stem.ends_with(".routes")
                || p.stem.ends_with(".router")
                || p.stem.ends_with("_routes")
        }
        NodeType::Middleware => {
            p.stem.contains("middleware") || p.stem.ends_with(".guard") || p.stem.ends_with(".interceptor")
        }
        NodeType::Serializer => {
            p.stem.contains("serializer") || p.stem.contains("schema") || p.stem_has_word("dto")
        }
        NodeType::Collection => {
            matches!(p.stem, "models" | "model" | "entities" | "entity")
                || p.stem.ends_with(".model")
                || p.stem.ends_with(".entity")
        }
        NodeType::Endpoint => {
            p.stem.contains("controller")
                || p.stem.contains("viewset")
                || matches!(p.stem, "views" | "api" | "handlers" | "endpoints")
                || p.stem.ends_with("_views")
        }
        NodeType::Service => {
            matches!(p.stem, "service" | "services")
                || p.stem.ends_with(".service")
                || p.stem.ends_with("_service")
                || (p.ext != "py" && p.stem.ends_with("service") && p.stem.len() > "service".len())
        }
        NodeType::Task => {
            matches!(p.stem, "tasks" | "celery" | "jobs" | "cron")
                || p.stem.ends_with(".task")
                || p.stem.ends_with("_task")
                || p.stem.ends_with("_tasks")
                || p.stem.ends_with(".job")
        }
        NodeType::Webhook => p.stem.contains("webhook"),
        NodeType::Event => {
            p.stem.contains("signal")
                || p.stem.contains("listener")
                || matches!(p.stem, "events" | "event")
                || p.stem.ends_with(".event")
                || p.stem.ends_with("_events")
        }
        NodeType::Utility => {
            matches!(p.stem, "utils" | "util" | "helpers" | "helper" | "common")
                || p.stem.ends_with("_utils")
                || p.stem.ends_with(".utils")
                || p.stem.ends_with(".util")
                || p.stem.ends_with("_helpers")
        }
        NodeType::Component => p.stem.ends_with(".component"),
        _ => false,
    }
}

fn dir_rule(kind: NodeType, p: &PathParts<'_>) -> bool {
    match kind {
        NodeType::Test => p.in_dir(&["tests", "test", "__tests__", "spec", "specs"]),
        NodeType::Config => p.in_dir(&["config", "configs", "settings"]),
        NodeType::Router => p.in_dir(&["routes", "routers", "routing", "urls"]),
        NodeType::Middleware => p.in_dir(&["middleware", "middlewares", "guards", "interceptors"]),
        NodeType::Serializer => p.in_dir(&["serializers", "schemas", "dto", "dtos"]),
        NodeType::Collection => p.in_dir(&["models", "entities"]),
        NodeType::Endpoint => p.in_dir(&["views", "controllers", "endpoints", "handlers", "api", "resolvers"]),
        NodeType::Service => p.in_dir(&["services", "use_cases", "usecases"]),
        NodeType::Task => p.in_dir(&["tasks", "jobs", "workers", "cron"]),
        NodeType::Webhook => p.in_dir(&["webhooks"]),
        NodeType::Event => p.in_dir(&["events", "signals", "listeners", "subscribers"]),
        NodeType::Utility => p.in_dir(&["utils", "helpers", "lib", "common", "shared"]),
        NodeType::Component => {
            p.in_dir(&["components"]) || matches!(p.ext, "vue" | "svelte" | "jsx" | "tsx")
        }
        _ => false,
    }
}

/// Returns true for re-export hubs: `index.*`, `__init__.py`, `mod.rs`.
pub fn is_barrel(rel: &str) -> bool {
    let lower = rel.to_lowercase();
    let name = lower.rsplit('/').next().unwrap_or("");
    BARREL_FILES.contains(&name)
}

/// Classify a root-relative path (`/` separators) into a node type.
pub fn classify(rel: &str) -> NodeType {
    let lower = rel.to_lowercase();
    let parts = PathParts::new(&lower);

    if let Some(kind) = RULE_ORDER.into_iter().find(|k| name_rule(*k, &parts)) {
        return kind;
    }
    if is_barrel(rel) {
        return NodeType::File;
    }
    RULE_ORDER
        .into_iter()
        .find(|k| dir_rule(*k, &parts))
        .unwrap_or(NodeType::File)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_barrel_in_models_dir_is_file() {
        assert_eq!(classify("app/models/__init__.py"), NodeType::File);
        assert_eq!(classify("src/models/index.ts"), NodeType::File);
        assert_eq!(classify("src/models/mod.rs"), NodeType::File);
        assert_eq!(classify("app/models/user.py"), NodeType::Collection);
    }

    #[test]
    fn test_filename_beats_directory() {
        assert_eq!(classify("app/models/user_serializer.py"), NodeType::Serializer);
        assert_eq!(classify("src/components/user.service.ts"), NodeType::Service);
        assert_eq!(classify("src/services/helpers.py"), NodeType::Utility);
    }

    #[test]
    fn test_filename_rule_order_first_match_wins() {
        // test before everything else
        assert_eq!(classify("app/test_views.py"), NodeType::Test);
        assert_eq!(classify("src/user.controller.spec.ts"), NodeType::Test);
        // router before endpoint
        assert_eq!(classify("api/urls.py"), NodeType::Router);
        // middleware before serializer
        assert_eq!(classify("auth/schema_middleware.py"), NodeType::Middleware);
        // serializer before collection
        assert_eq!(classify("src/user.schema.model.ts"), NodeType::Serializer);
        // collection before endpoint
        assert_eq!(classify("app/models.py"), NodeType::Collection);
        // endpoint before service
        assert_eq!(classify("src/service.controller.ts"), NodeType::Endpoint);
        // task before webhook
        assert_eq!(classify("billing/webhook_tasks.py"), NodeType::Task);
        // webhook before event
        assert_eq!(classify("billing/webhook_signals.py"), NodeType::Webhook);
    }

    #[test]
    fn test_directory_rule_order() {
        assert_eq!(classify("tests/models/user.py"), NodeType::Test);
        // `api/` (endpoint) is checked before `services/`
        assert_eq!(classify("src/api/services/payment.ts"), NodeType::Endpoint);
        assert_eq!(classify("lib/components/Button.tsx"), NodeType::Utility);
    }

    #[test]
    fn test_framework_files() {
        assert_eq!(classify("project/settings.py"), NodeType::Config);
        assert_eq!(classify("vite.config.ts"), NodeType::Config);
        assert_eq!(classify("src/auth.guard.ts"), NodeType::Middleware);
        assert_eq!(classify("src/create-user.dto.ts"), NodeType::Serializer);
        assert_eq!(classify("src/user.entity.ts"), NodeType::Collection);
        assert_eq!(classify("app/tasks.py"), NodeType::Task);
        assert_eq!(classify("app/signals.py"), NodeType::Event);
        assert_eq!(classify("src/App.vue"), NodeType::Component);
        assert_eq!(classify("src/UserCard.tsx"), NodeType::Component);
    }

    #[test]
    fn test_default_is_file() {
        assert_eq!(classify("main.go"), NodeType::File);
        assert_eq!(classify("src/index.tsx"), NodeType::File);
    }

    #[test]
    fn test_is_barrel() {
        assert!(is_barrel("pkg/__init__.py"));
        assert!(is_barrel("src/Index.ts"));
        assert!(!is_barrel("src/indexer.ts"));
    }
}
