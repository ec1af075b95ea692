use crate::cli::OutputFormat;

use super::cluster::{ClusterReport, PathReport};
use super::dead_code::DeadCodeReport;
use super::endpoint::EndpointReport;
use super::hubs::Ranking;
use super::impact::{ChangesReport, ImpactReport};
use super::lookup::{EdgeList, FileReport, ModelReport, SearchReport};
use super::report::{GapReport, ProjectReport};
use super::stats::{Overview, StatsReport};
use super::{Neighbor, NodeRef, QueryOutput, RankedNode, TypeGroup};

/// Print a query result to stdout in the selected format.
pub fn print(output: &QueryOutput, format: &OutputFormat) {
    match format {
        OutputFormat::Compact => print!("{}", render_compact(output)),
        OutputFormat::Json => match serde_json::to_string_pretty(output) {
            Ok(s) => println!("{s}"),
            Err(e) => eprintln!("error serialising result: {e}"),
        },
    }
}

/// Line-oriented rendering: one fact per line, lowercase keywords first.
pub fn render_compact(output: &QueryOutput) -> String {
    let mut out = Lines::default();
    match output {
        QueryOutput::File(r) => file(&mut out, r),
        QueryOutput::Edges(r) => edges(&mut out, r),
        QueryOutput::Impact(r) => impact(&mut out, r),
        QueryOutput::Model(r) => model(&mut out, r),
        QueryOutput::Hubs(r) => ranking(&mut out, r),
        QueryOutput::Cluster(r) => cluster(&mut out, r),
        QueryOutput::Path(r) => path(&mut out, r),
        QueryOutput::Search(r) => search(&mut out, r),
        QueryOutput::Stats(r) => stats(&mut out, r),
        QueryOutput::DeadCode(r) => dead_code(&mut out, r),
        QueryOutput::Endpoint(r) => endpoint(&mut out, r),
        QueryOutput::Overview(r) => overview(&mut out, r),
        QueryOutput::Report(r) => report(&mut out, r),
        QueryOutput::Gaps(r) => gaps(&mut out, r),
        QueryOutput::Changes(r) => changes(&mut out, r),
    }
    out.0
}

#[derive(Default)]
struct Lines(String);

impl Lines {
    fn line(&mut self, text: impl AsRef<str>) {
        self.0.push_str(text.as_ref());
        self.0.push('\n');
    }
}

fn at(node: &NodeRef) -> String {
    match node.line {
        Some(line) => format!("{}:{line}", node.id),
        None => node.id.clone(),
    }
}

fn ranked(node: &RankedNode) -> String {
    format!(
        "{} {} {} degree {} in {} out {}",
        node.risk, node.node.id, node.node.kind, node.degree, node.incoming, node.outgoing
    )
}

fn neighbor(prefix: &str, n: &Neighbor) -> String {
    match n.line {
        Some(line) => format!("{prefix} {} {} line {line}", n.kind, n.node.id),
        None => format!("{prefix} {} {}", n.kind, n.node.id),
    }
}

fn groups(out: &mut Lines, groups: &[TypeGroup]) {
    for g in groups {
        let ids: Vec<&str> = g.nodes.iter().map(|n| n.id.as_str()).collect();
        let more = g.total - g.nodes.len();
        if more > 0 {
            out.line(format!("  {} {}: {} (+{more} more)", g.kind, g.total, ids.join(", ")));
        } else {
            out.line(format!("  {} {}: {}", g.kind, g.total, ids.join(", ")));
        }
    }
}

fn file(out: &mut Lines, r: &FileReport) {
    out.line(format!("node {}{}", ranked(&r.node), if r.is_hub { " hub" } else { "" }));
    for n in &r.outgoing_edges {
        out.line(neighbor("out", n));
    }
    for n in &r.incoming_edges {
        out.line(neighbor("in", n));
    }
}

fn edges(out: &mut Lines, r: &EdgeList) {
    let prefix = if r.direction == "outgoing" { "dep" } else { "rdep" };
    for n in &r.edges {
        out.line(neighbor(prefix, n));
    }
    out.line(format!("{} {} edges of {}", r.edges.len(), r.direction, r.node.id));
}

fn impact(out: &mut Lines, r: &ImpactReport) {
    out.line(format!("impact {}", ranked(&r.node)));
    for level in &r.levels {
        for n in &level.nodes {
            out.line(format!("depth {} {} {}", level.depth, n.id, n.kind));
        }
    }
    out.line(format!("{} affected", r.total_affected));
}

fn model(out: &mut Lines, r: &ModelReport) {
    out.line(format!("model {} {}", r.node.node.label, ranked(&r.node)));
    for n in &r.readers {
        out.line(format!("read {}", n.id));
    }
    for n in &r.writers {
        out.line(format!("write {}", n.id));
    }
    for n in &r.other {
        out.line(neighbor("other", n));
    }
}

fn ranking(out: &mut Lines, r: &Ranking) {
    for n in &r.nodes {
        out.line(ranked(n));
    }
    out.line(format!("{} of {} nodes", r.nodes.len(), r.total_nodes));
}

fn cluster(out: &mut Lines, r: &ClusterReport) {
    out.line(format!("cluster {} size {}", r.node.id, r.size));
    groups(out, &r.groups);
}

fn path(out: &mut Lines, r: &PathReport) {
    match r.length {
        Some(length) => out.line(format!("path {} -> {} length {length}", r.from.id, r.to.id)),
        None => {
            out.line(format!("no path {} -> {}", r.from.id, r.to.id));
            return;
        }
    }
    for step in &r.steps {
        match step.via {
            Some((kind, direction)) => out.line(format!("  {kind} {direction} {}", at(&step.node))),
            None => out.line(format!("  {}", at(&step.node))),
        }
    }
}

fn search(out: &mut Lines, r: &SearchReport) {
    for n in &r.results {
        out.line(ranked(n));
    }
    out.line(format!("{} of {} matches for {:?}", r.results.len(), r.total, r.query));
}

fn stats(out: &mut Lines, r: &StatsReport) {
    out.line(format!("project {}", r.project));
    out.line(format!("nodes {} edges {}", r.total_nodes, r.total_edges));
    out.line(format!(
        "files {} unresolved {} ghost_edges_removed {} warnings {}",
        r.files_scanned, r.unresolved_references, r.ghost_edges_removed, r.warnings
    ));
    let types: Vec<String> = r.node_types.iter().map(|(k, c)| format!("{k} {c}")).collect();
    out.line(format!("types {}", types.join(" ")));
    let kinds: Vec<String> = r.edge_types.iter().map(|(k, c)| format!("{k} {c}")).collect();
    out.line(format!("relationships {}", kinds.join(" ")));
    for n in &r.top_hubs {
        out.line(format!("hub {}", ranked(n)));
    }
}

fn dead_code(out: &mut Lines, r: &DeadCodeReport) {
    out.line(format!("isolated {}", r.isolated_total));
    groups(out, &r.isolated);
    out.line(format!("no_dependents {}", r.no_dependents_total));
    groups(out, &r.no_dependents);
    if r.truncated {
        out.line("truncated, use --all for the full list");
    }
}

fn endpoint(out: &mut Lines, r: &EndpointReport) {
    for ep in &r.endpoints {
        out.line(format!("endpoint {}", at(&ep.endpoint)));
        for link in &ep.chain {
            out.line(format!(
                "  {} {} -{}-> {}",
                link.stage.as_str(),
                link.from.id,
                link.kind,
                link.to.id
            ));
        }
    }
    if r.total > r.endpoints.len() {
        out.line(format!("{} of {} endpoints shown", r.endpoints.len(), r.total));
    }
}

fn overview(out: &mut Lines, r: &Overview) {
    out.line(format!("project {} nodes {} edges {}", r.project, r.total_nodes, r.total_edges));
    for d in &r.directories {
        let types: Vec<String> = d.top_types.iter().map(|(k, c)| format!("{k} {c}")).collect();
        out.line(format!("dir {} {} ({})", d.directory, d.nodes, types.join(", ")));
    }
    for l in &r.layers {
        let types: Vec<String> = l.types.iter().map(|(k, c)| format!("{k} {c}")).collect();
        out.line(format!("layer {} {} ({})", l.name, l.nodes, types.join(", ")));
    }
    let kinds: Vec<String> = r.relationships.iter().map(|(k, c)| format!("{k} {c}")).collect();
    out.line(format!("relationships {}", kinds.join(" ")));
}

fn gaps(out: &mut Lines, r: &GapReport) {
    out.line(format!("tests {} tested_nodes {}", r.test_nodes, r.tested_nodes));
    for g in &r.untested_types {
        out.line(format!("untested_type {} {}", g.kind, g.nodes));
    }
    for n in &r.high_risk_untested {
        out.line(format!("untested {}", ranked(n)));
    }
}

fn report(out: &mut Lines, r: &ProjectReport) {
    overview(out, &r.overview);
    out.line(format!("ghost_edges_removed {}", r.ghost_edges_removed));
    for n in &r.hubs.nodes {
        out.line(format!("hub {}", ranked(n)));
    }
    for n in &r.risky.nodes {
        out.line(format!("risky {}", ranked(n)));
    }
    out.line(format!(
        "dead_code isolated {} no_dependents {}",
        r.dead_code.isolated_total, r.dead_code.no_dependents_total
    ));
    gaps(out, &r.gaps);
}

fn changes(out: &mut Lines, r: &ChangesReport) {
    for c in &r.changed {
        out.line(format!("changed {} affected {}", ranked(&c.node), c.affected));
    }
    for missing in &r.not_found {
        out.line(format!("missing {missing}"));
    }
    for n in &r.affected {
        out.line(format!("affected {} {}", n.id, n.kind));
    }
    out.line(format!("{} affected max_risk {}", r.total_affected, r.max_risk));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::edge::EdgeKind;
    use crate::graph::node::NodeType;
    use crate::query::test_support::index;
    use crate::query::{Request, execute};

    fn run(request: Request) -> String {
        let idx = index(
            &[
                ("a.py", NodeType::File),
                ("b.py", NodeType::Service),
                ("c.py", NodeType::File),
            ],
            &[("a.py", "b.py", EdgeKind::Imports), ("b.py", "c.py", EdgeKind::Imports)],
        );
        render_compact(&execute(&idx, &request).unwrap())
    }

    #[test]
    fn test_compact_deps() {
        let text = run(Request::Deps { path: "a.py".into() });
        assert_eq!(text, "dep imports b.py\n1 outgoing edges of a.py\n");
    }

    #[test]
    fn test_compact_hubs() {
        let text = run(Request::Hubs { top: 1 });
        assert_eq!(text, "LOW b.py service degree 2 in 1 out 1\n1 of 3 nodes\n");
    }

    #[test]
    fn test_compact_path_steps() {
        let text = run(Request::Path {
            from: "c.py".into(),
            to: "a.py".into(),
        });
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "path c.py -> a.py length 2");
        assert_eq!(lines[1], "  c.py");
        assert_eq!(lines[2], "  imports backward b.py");
    }

    #[test]
    fn test_json_serializes_flattened_node() {
        let idx = index(&[("a.py", NodeType::File)], &[]);
        let output = execute(&idx, &Request::File { path: "a.py".into() }).unwrap();
        let value = serde_json::to_value(&output).unwrap();
        assert_eq!(value["id"], "a.py");
        assert_eq!(value["type"], "file");
        assert_eq!(value["risk"], "LOW");
        assert_eq!(value["is_hub"], true);
    }
}
