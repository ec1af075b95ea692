//! Rust module paths mapped onto file ids by the 2018+ layout rules.
//!
//! Crate roots (`lib.rs`, `main.rs`) and `mod.rs` files own their directory:
//! `src/lib.rs` declaring `mod parser;` means `src/parser.rs` or
//! `src/parser/mod.rs`. Any other file owns a directory named after its stem:
//! `src/parser.rs` declaring `mod imports;` means `src/parser/imports.rs`.

use super::{FileIndex, dir_of, join_path};

const CRATE_ROOTS: &[&str] = &["lib.rs", "main.rs"];

fn file_name(id: &str) -> &str {
    id.rsplit('/').next().unwrap_or(id)
}

fn owns_directory(id: &str) -> bool {
    matches!(file_name(id), "mod.rs" | "lib.rs" | "main.rs")
}

/// Directory holding the submodules of the module defined by `id`.
fn module_dir(id: &str) -> String {
    if owns_directory(id) {
        dir_of(id).to_string()
    } else {
        let stem = file_name(id).strip_suffix(".rs").unwrap_or(file_name(id));
        join_path(dir_of(id), stem)
    }
}

/// `{dir}/{name}.rs`, then `{dir}/{name}/mod.rs`.
fn module_file(index: &FileIndex, dir: &str, name: &str) -> Option<String> {
    [format!("{name}.rs"), format!("{name}/mod.rs")]
        .into_iter()
        .map(|tail| join_path(dir, &tail))
        .find(|candidate| index.contains(candidate))
}

/// The file defining the module whose submodules live in `dir`.
fn owner_of_dir(index: &FileIndex, dir: &str) -> Option<String> {
    CRATE_ROOTS
        .iter()
        .chain(["mod.rs"].iter())
        .map(|name| join_path(dir, name))
        .find(|candidate| index.contains(candidate))
        .or_else(|| {
            let (parent, name) = match dir.rfind('/') {
                Some(pos) => (&dir[..pos], &dir[pos + 1..]),
                None => ("", dir),
            };
            let sibling = join_path(parent, &format!("{name}.rs"));
            (!dir.is_empty() && index.contains(&sibling)).then_some(sibling)
        })
}

/// Directory of the crate root above `id`: the nearest ancestor holding `lib.rs` or `main.rs`.
fn crate_dir(index: &FileIndex, id: &str) -> Option<String> {
    let mut dir = dir_of(id);
    loop {
        if CRATE_ROOTS.iter().any(|root| index.contains(&join_path(dir, root))) {
            return Some(dir.to_string());
        }
        if dir.is_empty() {
            return None;
        }
        dir = dir_of(dir);
    }
}

/// `mod name;` declared in `from`.
pub fn resolve_mod(index: &FileIndex, from: &str, name: &str) -> Option<String> {
    module_file(index, &module_dir(from), name)
}

/// A `use` path starting with `crate`, `super` or `self`.
///
/// Segments are tried deepest first and the last one is stripped until a
/// module file matches (`crate::graph::node::Node` -> `graph/node.rs`).
pub fn resolve_use(index: &FileIndex, from: &str, path: &str) -> Option<String> {
    let mut segments: Vec<&str> = path.split("::").filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return None;
    }

    let mut dir = match segments.remove(0) {
        "crate" => crate_dir(index, from)?,
        "self" => module_dir(from),
        "super" => {
            let mut dir = dir_of(from).to_string();
            if owns_directory(from) {
                dir = dir_of(&dir).to_string();
            }
            dir
        }
        _ => return None,
    };
    while segments.first() == Some(&"super") {
        segments.remove(0);
        dir = dir_of(&dir).to_string();
    }

    while !segments.is_empty() {
        let (name, parents) = segments.split_last()?;
        let parent_dir = parents.iter().fold(dir.clone(), |acc, seg| join_path(&acc, seg));
        if let Some(file) = module_file(index, &parent_dir, name) {
            return Some(file);
        }
        segments.pop();
    }
    owner_of_dir(index, &dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> FileIndex {
        FileIndex::from_ids(
            [
                "src/main.rs",
                "src/config.rs",
                "src/graph/mod.rs",
                "src/graph/node.rs",
                "src/graph/edge.rs",
                "src/parser.rs",
                "src/parser/calls.rs",
            ]
            .iter()
            .map(|s| s.to_string()),
            None,
        )
    }

    #[test]
    fn test_mod_declarations() {
        let idx = index();
        assert_eq!(resolve_mod(&idx, "src/main.rs", "graph").as_deref(), Some("src/graph/mod.rs"));
        assert_eq!(resolve_mod(&idx, "src/main.rs", "config").as_deref(), Some("src/config.rs"));
        assert_eq!(resolve_mod(&idx, "src/graph/mod.rs", "node").as_deref(), Some("src/graph/node.rs"));
        assert_eq!(resolve_mod(&idx, "src/parser.rs", "calls").as_deref(), Some("src/parser/calls.rs"));
        assert_eq!(resolve_mod(&idx, "src/main.rs", "missing"), None);
    }

    #[test]
    fn test_use_paths() {
        let idx = index();
        assert_eq!(
            resolve_use(&idx, "src/parser/calls.rs", "crate::graph::node::NodeType").as_deref(),
            Some("src/graph/node.rs")
        );
        assert_eq!(resolve_use(&idx, "src/graph/node.rs", "super::edge::Edge").as_deref(), Some("src/graph/edge.rs"));
        assert_eq!(resolve_use(&idx, "src/graph/node.rs", "super::Warning").as_deref(), Some("src/graph/mod.rs"));
        assert_eq!(resolve_use(&idx, "src/parser.rs", "self::calls::scan").as_deref(), Some("src/parser/calls.rs"));
        assert_eq!(resolve_use(&idx, "src/graph/mod.rs", "crate::config").as_deref(), Some("src/config.rs"));
        assert_eq!(resolve_use(&idx, "src/graph/edge.rs", "super::super::config").as_deref(), Some("src/config.rs"));
    }
}
