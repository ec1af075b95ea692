use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use tracing::{debug, warn};

use crate::language::LanguageKind;

/// Directory names that are never descended into.
pub const DEFAULT_EXCLUDE_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    "__pycache__",
    ".venv",
    "venv",
    "env",
    ".env",
    "dist",
    "build",
    ".next",
    ".nuxt",
    ".svelte-kit",
    "vendor",
    ".tox",
    ".mypy_cache",
    ".pytest_cache",
    ".ruff_cache",
    "htmlcov",
    "coverage",
    ".coverage",
    "eggs",
    "*.egg-info",
    ".idea",
    ".vscode",
    "staticfiles",
    "media",
    "target",
];

/// Options controlling a scan.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Extra names or glob patterns, matched against each entry's file name and
    /// its root-relative path.
    pub exclude: Vec<String>,
    /// Directories deeper than this many levels below the root are not entered.
    pub max_depth: usize,
    /// `None` means every supported language.
    pub languages: Option<HashSet<LanguageKind>>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            exclude: Vec::new(),
            max_depth: crate::config::DEFAULT_MAX_DEPTH,
            languages: None,
        }
    }
}

/// One discovered source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Root-relative path with `/` separators. This is the file node id.
    pub rel: String,
    pub abs: PathBuf,
    pub language: LanguageKind,
}

/// Compiled exclusion rules, shared with the walker's `filter_entry` closure.
#[derive(Debug, Clone)]
struct Exclusions {
    names: HashSet<String>,
    patterns: Vec<glob::Pattern>,
}

impl Exclusions {
    fn new(extra: &[String]) -> Self {
        let mut names = HashSet::new();
        let mut patterns = Vec::new();
        for raw in DEFAULT_EXCLUDE_DIRS.iter().copied().chain(extra.iter().map(String::as_str)) {
            let raw = raw.trim().trim_end_matches('/');
            if raw.is_empty() {
                continue;
            }
            if raw.contains(['*', '?', '[']) {
                match glob::Pattern::new(raw) {
                    Ok(p) => patterns.push(p),
                    Err(err) => warn!("ignoring invalid exclude pattern {raw:?}: {err}"),
                }
            } else {
                names.insert(raw.to_string());
            }
        }
        Self { names, patterns }
    }

    fn is_excluded(&self, name: &str, rel: &str) -> bool {
        self.names.contains(name)
            || self.names.contains(rel)
            || self.patterns.iter().any(|p| p.matches(name) || p.matches(rel))
    }
}

/// Walk `root` and collect every source file of a known (and allowed) language.
///
/// Respects `.gitignore` rules and skips hidden entries. Excluded directories
/// are pruned during the walk, so nothing below them is read. The result is
/// sorted by relative path.
pub fn scan(root: &Path, opts: &ScanOptions) -> Result<Vec<SourceFile>> {
    if !root.is_dir() {
        bail!("{} is not a directory", root.display());
    }

    let exclusions = Exclusions::new(&opts.exclude);
    let filter_root = root.to_path_buf();

    let walker = ignore::WalkBuilder::new(root)
        .standard_filters(true)
        // Read .gitignore files even when the directory is not inside a git repository.
        .require_git(false)
        // Files directly in the root are at walker depth 1.
        .max_depth(Some(opts.max_depth.saturating_add(1)))
        .filter_entry(move |entry| {
            if entry.depth() == 0 {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            let rel = relative_id(&filter_root, entry.path());
            !exclusions.is_excluded(&name, &rel)
        })
        .build();

    let mut files = Vec::new();
    for result in walker {
        let entry = match result {
            Ok(e) => e,
            Err(err) => {
                warn!("{err}");
                continue;
            }
        };

        if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            continue;
        }

        let path = entry.path();
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let Some(language) = LanguageKind::from_extension(ext) else {
            continue;
        };

        if let Some(langs) = &opts.languages
            && !langs.contains(&language)
        {
            continue;
        }

        let rel = relative_id(root, path);
        debug!(file = %rel, %language, "discovered");
        files.push(SourceFile {
            rel,
            abs: path.to_path_buf(),
            language,
        });
    }

    files.sort_by(|a, b| a.rel.cmp(&b.rel));
    Ok(files)
}

/// Root-relative path of `path` with `/` separators.
pub fn relative_id(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn tmp() -> TempDir {
        tempfile::tempdir().expect("tempdir")
    }

    fn rels(files: &[SourceFile]) -> Vec<&str> {
        files.iter().map(|f| f.rel.as_str()).collect()
    }

    #[test]
    fn test_scan_returns_only_source_files_sorted() {
        let dir = tmp();
        fs::create_dir_all(dir.path().join("app")).unwrap();
        fs::write(dir.path().join("app/views.py"), "").unwrap();
        fs::write(dir.path().join("main.rs"), "fn main() {}").unwrap();
        fs::write(dir.path().join("README.md"), "# Hello").unwrap();

        let files = scan(dir.path(), &ScanOptions::default()).unwrap();
        assert_eq!(rels(&files), vec!["app/views.py", "main.rs"]);
        assert_eq!(files[0].language, LanguageKind::Python);
    }

    #[test]
    fn test_excluded_directories_are_pruned() {
        let dir = tmp();
        let nm = dir.path().join("node_modules").join("pkg");
        fs::create_dir_all(&nm).unwrap();
        fs::write(nm.join("index.js"), "").unwrap();
        fs::create_dir_all(dir.path().join("migrations")).unwrap();
        fs::write(dir.path().join("migrations/0001.py"), "").unwrap();
        fs::create_dir_all(dir.path().join("pkg.egg-info")).unwrap();
        fs::write(dir.path().join("pkg.egg-info/x.py"), "").unwrap();
        fs::write(dir.path().join("app.py"), "").unwrap();

        let opts = ScanOptions {
            exclude: vec!["migrations".to_string()],
            ..ScanOptions::default()
        };
        let files = scan(dir.path(), &opts).unwrap();
        assert_eq!(rels(&files), vec!["app.py"]);
    }

    #[test]
    fn test_glob_exclude_applies_to_files() {
        let dir = tmp();
        fs::write(dir.path().join("a.gen.ts"), "").unwrap();
        fs::write(dir.path().join("b.ts"), "").unwrap();
        let opts = ScanOptions {
            exclude: vec!["*.gen.ts".to_string()],
            ..ScanOptions::default()
        };
        let files = scan(dir.path(), &opts).unwrap();
        assert_eq!(rels(&files), vec!["b.ts"]);
    }

    #[test]
    fn test_max_depth() {
        let dir = tmp();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::write(dir.path().join("root.py"), "").unwrap();
        fs::write(dir.path().join("a/one.py"), "").unwrap();
        fs::write(dir.path().join("a/b/two.py"), "").unwrap();

        let opts = ScanOptions {
            max_depth: 1,
            ..ScanOptions::default()
        };
        let files = scan(dir.path(), &opts).unwrap();
        assert_eq!(rels(&files), vec!["a/one.py", "root.py"]);

        let opts = ScanOptions {
            max_depth: 0,
            ..ScanOptions::default()
        };
        let files = scan(dir.path(), &opts).unwrap();
        assert_eq!(rels(&files), vec!["root.py"]);
    }

    #[test]
    fn test_language_allow_list() {
        let dir = tmp();
        fs::write(dir.path().join("a.py"), "").unwrap();
        fs::write(dir.path().join("b.ts"), "").unwrap();
        let opts = ScanOptions {
            languages: Some(HashSet::from([LanguageKind::TypeScript])),
            ..ScanOptions::default()
        };
        let files = scan(dir.path(), &opts).unwrap();
        assert_eq!(rels(&files), vec!["b.ts"]);
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let dir = tmp();
        assert!(scan(&dir.path().join("nope"), &ScanOptions::default()).is_err());
    }
}
