use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::graph::node::NodeType;

/// Name of the optional per-project configuration file.
pub const CONFIG_FILE: &str = "code-graph.toml";

/// Default artifact path, relative to the analyzed root.
pub const DEFAULT_OUTPUT: &str = ".code_graph.json";

pub const DEFAULT_MAX_DEPTH: usize = 10;
pub const DEFAULT_HUB_TOP_K: usize = 15;

/// Configuration loaded from `code-graph.toml` at the project root.
///
/// Every field is optional; CLI flags take precedence over file values, which
/// take precedence over the built-in defaults.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct CodeGraphConfig {
    /// Extra directory names or glob patterns to skip, on top of the default list.
    pub exclude: Option<Vec<String>>,
    /// Maximum directory depth below the root.
    pub max_depth: Option<usize>,
    /// Language allow-list (`python`, `ts`, ...). Absent means every supported language.
    pub languages: Option<Vec<String>>,
    /// Artifact path relative to the root.
    pub output: Option<String>,
    #[serde(default)]
    pub query: QueryConfig,
}

/// `[query]` section: knobs consumed by the query engine.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct QueryConfig {
    /// Number of highest-degree nodes that count as hubs.
    pub hub_top_k: Option<usize>,
    /// Node types that are expected to have no dependents.
    pub entry_point_types: Option<Vec<String>>,
}

impl CodeGraphConfig {
    /// Load configuration from `code-graph.toml` in the given directory.
    ///
    /// Returns the default configuration if the file does not exist or cannot be parsed.
    pub fn load(root: &Path) -> Self {
        let config_path = root.join(CONFIG_FILE);

        if !config_path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match toml::from_str::<Self>(&contents) {
                Ok(config) => config,
                Err(err) => {
                    warn!("failed to parse {}: {err}. Using defaults.", config_path.display());
                    Self::default()
                }
            },
            Err(err) => {
                warn!("failed to read {}: {err}. Using defaults.", config_path.display());
                Self::default()
            }
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth.unwrap_or(DEFAULT_MAX_DEPTH)
    }

    pub fn output(&self) -> &str {
        self.output.as_deref().unwrap_or(DEFAULT_OUTPUT)
    }

    pub fn hub_top_k(&self) -> usize {
        self.query.hub_top_k.unwrap_or(DEFAULT_HUB_TOP_K)
    }

    /// Entry-point node types, with unknown names dropped (and logged).
    pub fn entry_point_types(&self) -> Vec<NodeType> {
        match &self.query.entry_point_types {
            None => default_entry_point_types(),
            Some(names) => names
                .iter()
                .filter_map(|name| {
                    let parsed = NodeType::from_str_loose(name);
                    if parsed.is_none() {
                        warn!("unknown node type {name:?} in entry_point_types, ignored");
                    }
                    parsed
                })
                .collect(),
        }
    }
}

/// Node types that legitimately have no incoming edges.
pub fn default_entry_point_types() -> Vec<NodeType> {
    vec![
        NodeType::Router,
        NodeType::Endpoint,
        NodeType::Test,
        NodeType::Config,
        NodeType::Task,
        NodeType::Webhook,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn tmp() -> TempDir {
        tempfile::tempdir().expect("tempdir")
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tmp();
        let config = CodeGraphConfig::load(dir.path());
        assert_eq!(config.max_depth(), 10);
        assert_eq!(config.output(), ".code_graph.json");
        assert_eq!(config.hub_top_k(), 15);
        assert!(config.entry_point_types().contains(&NodeType::Router));
    }

    #[test]
    fn test_reads_all_sections() {
        let dir = tmp();
        fs::write(
            dir.path().join(CONFIG_FILE),
            r#"
exclude = ["legacy", "*.gen.ts"]
max_depth = 4
languages = ["python"]
output = "graph.json"

[query]
hub_top_k = 5
entry_point_types = ["endpoint", "bogus"]
"#,
        )
        .unwrap();

        let config = CodeGraphConfig::load(dir.path());
        assert_eq!(config.exclude.as_deref().unwrap().len(), 2);
        assert_eq!(config.max_depth(), 4);
        assert_eq!(config.output(), "graph.json");
        assert_eq!(config.hub_top_k(), 5);
        assert_eq!(config.entry_point_types(), vec![NodeType::Endpoint]);
    }

    #[test]
    fn test_unparsable_file_falls_back_to_defaults() {
        let dir = tmp();
        fs::write(dir.path().join(CONFIG_FILE), "max_depth = \"deep\"").unwrap();
        let config = CodeGraphConfig::load(dir.path());
        assert_eq!(config.max_depth(), DEFAULT_MAX_DEPTH);
    }
}
