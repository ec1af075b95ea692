use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::query::Request;
use crate::query::hubs::{DEFAULT_HUBS, DEFAULT_RISKY};
use crate::query::lookup::SEARCH_LIMIT;

/// Structural dependency graph for polyglot source trees.
///
/// `analyze` scans a project once and writes a graph artifact; `query` answers
/// focused questions (risk, blast radius, dead code, paths) from that artifact
/// without re-reading the sources.
#[derive(Parser, Debug)]
#[command(
    name = "code-graph",
    version,
    about,
    long_about = None,
    propagate_version = true,
)]
pub struct Cli {
    /// Log progress to stderr (`RUST_LOG` takes precedence).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for query results.
#[derive(Clone, Debug, ValueEnum, Default)]
pub enum OutputFormat {
    /// Compact one-fact-per-line format, token-optimized for agent use (default).
    #[default]
    Compact,
    /// Pretty-printed JSON of the full result.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan a project and write its code graph.
    Analyze {
        /// Path to the project root.
        root: PathBuf,

        /// Artifact path (default: `.code_graph.json` under the root).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only scan these languages (comma-separated: python,js,ts,rust,go).
        #[arg(long, value_delimiter = ',')]
        languages: Vec<String>,

        /// Extra directory names or globs to skip (comma-separated).
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<String>,

        /// Maximum directory depth below the root.
        #[arg(long)]
        max_depth: Option<usize>,

        /// Print the run summary as JSON instead of human-readable text.
        #[arg(long)]
        json: bool,
    },

    /// Ask a question about a previously analyzed project.
    Query {
        /// Graph artifact to read (default: `.code_graph.json` in the current directory).
        #[arg(long)]
        graph: Option<PathBuf>,

        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Compact)]
        format: OutputFormat,

        /// Number of top-degree nodes treated as hubs (overrides the config file).
        #[arg(long)]
        hub_k: Option<usize>,

        #[command(subcommand)]
        command: QueryCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum QueryCommand {
    /// Node summary: type, degree, risk and every edge.
    File { path: String },

    /// What a node depends on (outgoing edges).
    Deps { path: String },

    /// What depends on a node (incoming edges).
    Dependents { path: String },

    /// Transitive dependents up to three levels deep.
    Impact { path: String },

    /// Readers and writers of a data model.
    Model { name: String },

    /// Most connected nodes.
    Hubs {
        #[arg(long, default_value_t = DEFAULT_HUBS)]
        top: usize,
    },

    /// Connected component around a node.
    Cluster { path: String },

    /// Shortest path between two nodes, ignoring edge direction.
    Path { from: String, to: String },

    /// Case-insensitive search over labels and files.
    Search {
        query: String,

        #[arg(long, default_value_t = SEARCH_LIMIT)]
        limit: usize,

        /// Return every match.
        #[arg(long, conflicts_with = "limit")]
        all: bool,
    },

    /// Graph counters and top hubs.
    Stats,

    /// Isolated nodes and nodes nothing depends on.
    DeadCode {
        /// List every node instead of eight per type.
        #[arg(long)]
        all: bool,
    },

    /// Nodes ranked by degree, with their risk level.
    RiskyFiles {
        #[arg(long, default_value_t = DEFAULT_RISKY)]
        top: usize,
    },

    /// Handler, service and storage chain behind an endpoint.
    Endpoint { path: String },

    /// Directory breakdown, layers and relationship counts.
    Overview,

    /// Overview, hubs, risky files, dead code and test gaps in one pass.
    Report,

    /// Node types and busy nodes with no test touching them.
    Gaps,

    /// Combined impact of a set of changed files.
    Changes {
        #[arg(required = true, num_args = 1..)]
        paths: Vec<String>,
    },
}

impl From<QueryCommand> for Request {
    fn from(command: QueryCommand) -> Self {
        match command {
            QueryCommand::File { path } => Request::File { path },
            QueryCommand::Deps { path } => Request::Deps { path },
            QueryCommand::Dependents { path } => Request::Dependents { path },
            QueryCommand::Impact { path } => Request::Impact { path },
            QueryCommand::Model { name } => Request::Model { name },
            QueryCommand::Hubs { top } => Request::Hubs { top },
            QueryCommand::Cluster { path } => Request::Cluster { path },
            QueryCommand::Path { from, to } => Request::Path { from, to },
            QueryCommand::Search { query, limit, all } => Request::Search {
                query,
                limit: (!all).then_some(limit),
            },
            QueryCommand::Stats => Request::Stats,
            QueryCommand::DeadCode { all } => Request::DeadCode { all },
            QueryCommand::RiskyFiles { top } => Request::RiskyFiles { top },
            QueryCommand::Endpoint { path } => Request::Endpoint { path },
            QueryCommand::Overview => Request::Overview,
            QueryCommand::Report => Request::Report,
            QueryCommand::Gaps => Request::Gaps,
            QueryCommand::Changes { paths } => Request::Changes { paths },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(args: &[&str]) -> Request {
        let cli = Cli::try_parse_from(["code-graph", "query"].iter().chain(args)).unwrap();
        match cli.command {
            Commands::Query { command, .. } => command.into(),
            other => panic!("expected query, got {other:?}"),
        }
    }

    #[test]
    fn test_query_defaults() {
        assert_eq!(request(&["hubs"]), Request::Hubs { top: DEFAULT_HUBS });
        assert_eq!(request(&["risky-files"]), Request::RiskyFiles { top: DEFAULT_RISKY });
        assert_eq!(
            request(&["search", "order"]),
            Request::Search {
                query: "order".into(),
                limit: Some(SEARCH_LIMIT)
            }
        );
        assert_eq!(
            request(&["search", "order", "--all"]),
            Request::Search {
                query: "order".into(),
                limit: None
            }
        );
    }

    #[test]
    fn test_changes_takes_many_paths() {
        assert_eq!(
            request(&["changes", "a.py", "b.py"]),
            Request::Changes {
                paths: vec!["a.py".into(), "b.py".into()]
            }
        );
        assert!(Cli::try_parse_from(["code-graph", "query", "changes"]).is_err());
    }

    #[test]
    fn test_analyze_lists_split_on_commas() {
        let cli = Cli::try_parse_from(["code-graph", "analyze", ".", "--languages", "python,ts", "-v"]).unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Analyze { languages, .. } => assert_eq!(languages, vec!["python", "ts"]),
            other => panic!("expected analyze, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_command_rejected() {
        let err = Cli::try_parse_from(["code-graph", "query", "bogus"]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
