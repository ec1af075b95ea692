mod classify;
mod cli;
mod config;
mod graph;
mod language;
mod output;
mod parser;
mod query;
mod resolver;
mod risk;
mod store;
mod walker;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Result, bail};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, OutputFormat, QueryCommand};
use config::CodeGraphConfig;
use language::LanguageKind;
use query::{GraphIndex, QueryError, QueryOptions, Request};
use walker::ScanOptions;

fn init_tracing(verbose: bool) {
    let default = if verbose { "warn,code_graph=info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .init();
}

/// Parse a language allow-list, dropping names we do not know.
fn parse_languages(names: &[String]) -> Result<Option<HashSet<LanguageKind>>> {
    if names.is_empty() {
        return Ok(None);
    }
    let known: HashSet<LanguageKind> = names
        .iter()
        .filter_map(|name| {
            let parsed = LanguageKind::from_str_loose(name);
            if parsed.is_none() {
                warn!("unknown language {name:?}, ignored");
            }
            parsed
        })
        .collect();
    if known.is_empty() {
        bail!("none of the requested languages ({}) is supported", names.join(", "));
    }
    Ok(Some(known))
}

struct AnalyzeArgs {
    root: PathBuf,
    output: Option<PathBuf>,
    languages: Vec<String>,
    exclude: Vec<String>,
    max_depth: Option<usize>,
    json: bool,
}

fn analyze(args: AnalyzeArgs) -> Result<()> {
    let start = Instant::now();
    let config = CodeGraphConfig::load(&args.root);

    let mut exclude = config.exclude.clone().unwrap_or_default();
    exclude.extend(args.exclude);
    let languages = if args.languages.is_empty() {
        config.languages.clone().unwrap_or_default()
    } else {
        args.languages
    };
    let options = ScanOptions {
        exclude,
        max_depth: args.max_depth.unwrap_or_else(|| config.max_depth()),
        languages: parse_languages(&languages)?,
    };

    let graph = graph::builder::build(&args.root, &options)?;
    let output = args.output.unwrap_or_else(|| args.root.join(config.output()));
    store::save(&graph, &output)?;
    info!(path = %output.display(), "graph written");

    let summary = output::AnalyzeSummary::new(&graph, &output, start.elapsed());
    output::print_summary(&summary, &graph, args.json);
    Ok(())
}

fn run_query(
    graph_path: Option<&Path>,
    format: &OutputFormat,
    hub_k: Option<usize>,
    command: QueryCommand,
) -> Result<(), QueryError> {
    let request = Request::from(command);
    let path = store::discover(graph_path)?;
    let config = CodeGraphConfig::load(path.parent().unwrap_or(Path::new(".")));
    let options = QueryOptions {
        hub_top_k: hub_k.unwrap_or_else(|| config.hub_top_k()),
        entry_point_types: config.entry_point_types(),
    };
    if options.hub_top_k == 0 {
        return Err(QueryError::BadArguments("--hub-k must be at least 1".to_string()));
    }

    let graph = store::load(&path)?;
    let index = GraphIndex::new(graph, options);
    let result = query::execute(&index, &request)?;
    query::output::print(&result, format);
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let code = match cli.command {
        Commands::Analyze {
            root,
            output,
            languages,
            exclude,
            max_depth,
            json,
        } => {
            let args = AnalyzeArgs {
                root,
                output,
                languages,
                exclude,
                max_depth,
                json,
            };
            match analyze(args) {
                Ok(()) => 0,
                Err(e) => {
                    eprintln!("error: {e:#}");
                    1
                }
            }
        }
        Commands::Query {
            graph,
            format,
            hub_k,
            command,
        } => match run_query(graph.as_deref(), &format, hub_k, command) {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("error: {e}");
                e.exit_code()
            }
        },
    };

    if code != 0 {
        std::process::exit(code);
    }
}
