pub mod rust_modules;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use tracing::debug;

use crate::parser::{ImportRef, ImportStyle};
use crate::walker::SourceFile;

/// Extensions tried for an extension-less JS/TS specifier, in priority order.
const JS_EXTENSIONS: &[&str] = &[
    ".ts", ".tsx", ".js", ".jsx", ".mjs", ".cjs", ".mts", ".cts", ".vue", ".svelte",
];

/// Source roots tried for `@/x` and `~/x` aliases.
const ALIAS_ROOTS: &[&str] = &["src/", ""];

/// Conventional source roots for absolute Python imports, after the project
/// root and the importer's ancestor directories.
const PYTHON_ROOTS: &[&str] = &["src/", "lib/"];

/// Lookup tables over the scanned file ids.
///
/// Every import is resolved against this index only; nothing touches the
/// filesystem after construction.
#[derive(Debug, Default)]
pub struct FileIndex {
    files: BTreeSet<String>,
    /// Path suffix (`b/c.py`, `a/b/c.py`) -> file ids ending with it, sorted.
    by_suffix: HashMap<String, Vec<String>>,
    /// Directory -> files directly inside it, sorted.
    dirs: BTreeMap<String, Vec<String>>,
    /// Directory suffix -> directories ending with it, sorted.
    dir_suffix: HashMap<String, Vec<String>>,
    /// `module` path from the root `go.mod`.
    go_module: Option<String>,
}

impl FileIndex {
    /// Build the index for `files` scanned under `root`, reading `go.mod` if present.
    pub fn new(root: &Path, files: &[SourceFile]) -> Self {
        let go_module = std::fs::read_to_string(root.join("go.mod"))
            .ok()
            .and_then(|content| parse_go_module(&content));
        Self::from_ids(files.iter().map(|f| f.rel.clone()), go_module)
    }

    pub fn from_ids(ids: impl IntoIterator<Item = String>, go_module: Option<String>) -> Self {
        let mut index = FileIndex {
            go_module,
            ..FileIndex::default()
        };
        for id in ids {
            let dir = dir_of(&id).to_string();
            index.dirs.entry(dir).or_default().push(id.clone());

            let mut start = 0;
            loop {
                index
                    .by_suffix
                    .entry(id[start..].to_string())
                    .or_default()
                    .push(id.clone());
                match id[start..].find('/') {
                    Some(pos) => start += pos + 1,
                    None => break,
                }
            }
            index.files.insert(id);
        }
        for dir in index.dirs.keys().filter(|d| !d.is_empty()) {
            let mut start = 0;
            loop {
                index
                    .dir_suffix
                    .entry(dir[start..].to_string())
                    .or_default()
                    .push(dir.clone());
                match dir[start..].find('/') {
                    Some(pos) => start += pos + 1,
                    None => break,
                }
            }
        }
        for list in index.by_suffix.values_mut().chain(index.dirs.values_mut()) {
            list.sort();
        }
        for list in index.dir_suffix.values_mut() {
            list.sort();
        }
        index
    }

    pub fn contains(&self, id: &str) -> bool {
        self.files.contains(id)
    }

    /// Files of the project an import in `from` refers to; empty when the
    /// import is external or unknown. Never contains `from`.
    pub fn resolve(&self, from: &str, import: &ImportRef) -> Vec<String> {
        let mut targets = match import.style {
            ImportStyle::Python { level } => self.resolve_python(from, level, &import.spec, &import.names),
            ImportStyle::Js => self.resolve_js(from, &import.spec).into_iter().collect(),
            ImportStyle::RustMod => rust_modules::resolve_mod(self, from, &import.spec).into_iter().collect(),
            ImportStyle::RustUse => rust_modules::resolve_use(self, from, &import.spec).into_iter().collect(),
            ImportStyle::Go => self.resolve_go(&import.spec),
            ImportStyle::Relative => self.resolve_relative(from, &import.spec).into_iter().collect(),
            ImportStyle::Stem => self.resolve_stem(from, &import.spec),
        };
        targets.retain(|t| t != from);
        targets.sort();
        targets.dedup();
        if targets.is_empty() {
            debug!(file = from, spec = %import.spec, "import not resolved to a project file");
        }
        targets
    }

    /// Best file for a path suffix: the exact id, else the candidate sharing
    /// the longest directory prefix with `from`, ties to the smallest id.
    fn by_path(&self, path: &str, from: &str) -> Option<String> {
        if self.files.contains(path) {
            return Some(path.to_string());
        }
        let candidates = self.by_suffix.get(path)?;
        let from_dir = dir_of(from);
        candidates
            .iter()
            .max_by(|a, b| {
                shared_prefix(dir_of(a), from_dir)
                    .cmp(&shared_prefix(dir_of(b), from_dir))
                    .then_with(|| b.cmp(a))
            })
            .cloned()
    }

    // -- Python -------------------------------------------------------------

    /// Module file for an absolute import path. Only directories that could
    /// sit on `sys.path` are tried: the root, each ancestor of the importer
    /// (nearest first) and the conventional source roots. A same-named file
    /// deeper in the tree (`tools/vendored/logging.py`) never matches.
    fn python_rooted(&self, path: &str, from: &str) -> Option<String> {
        if self.files.contains(path) {
            return Some(path.to_string());
        }
        let mut dir = dir_of(from);
        while !dir.is_empty() {
            let candidate = join_path(dir, path);
            if self.files.contains(&candidate) {
                return Some(candidate);
            }
            dir = dir_of(dir);
        }
        PYTHON_ROOTS
            .iter()
            .map(|root| format!("{root}{path}"))
            .find(|candidate| self.files.contains(candidate))
    }

    /// Module file for a dotted or slashed path. Trailing segments are dropped
    /// one at a time (`a.b.func` -> `a/b.py`) but never below `floor` segments.
    fn python_module(&self, dotted_path: &str, from: &str, floor: usize) -> Option<String> {
        let anchored = floor > 0;
        let mut segments: Vec<&str> = dotted_path.split(['.', '/']).filter(|s| !s.is_empty()).collect();
        while segments.len() > floor {
            let path = segments.join("/");
            for candidate in [format!("{path}.py"), format!("{path}/__init__.py")] {
                let hit = if anchored {
                    self.files.contains(&candidate).then_some(candidate)
                } else {
                    self.python_rooted(&candidate, from)
                };
                if hit.is_some() {
                    return hit;
                }
            }
            segments.pop();
        }
        None
    }

    fn resolve_python(&self, from: &str, level: usize, spec: &str, names: &[String]) -> Vec<String> {
        let base = if level == 0 {
            None
        } else {
            let mut dir = dir_of(from).to_string();
            for _ in 1..level {
                dir = dir_of(&dir).to_string();
            }
            Some(dir)
        };
        let qualify = |tail: &str| match &base {
            Some(dir) => join_path(dir, &tail.replace('.', "/")),
            None => tail.replace('.', "/"),
        };
        let anchored = base.is_some();

        // `from pkg import module` links the submodules themselves when they exist.
        let submodules: Vec<String> = names
            .iter()
            .filter_map(|name| {
                let tail = if spec.is_empty() { name.clone() } else { format!("{spec}.{name}") };
                let path = qualify(&tail);
                [format!("{path}.py"), format!("{path}/__init__.py")]
                    .into_iter()
                    .find_map(|c| if anchored { self.files.contains(&c).then_some(c) } else { self.python_rooted(&c, from) })
            })
            .collect();
        if !submodules.is_empty() {
            return submodules;
        }

        if spec.is_empty() {
            // `from . import x` where x is not a module: the package itself.
            return base
                .as_ref()
                .map(|dir| join_path(dir, "__init__.py"))
                .filter(|init| self.files.contains(init))
                .into_iter()
                .collect();
        }
        let floor = base
            .as_ref()
            .map(|dir| dir.split('/').filter(|s| !s.is_empty()).count())
            .unwrap_or(0);
        self.python_module(&qualify(spec), from, floor).into_iter().collect()
    }

    // -- JavaScript / TypeScript ----------------------------------------------

    fn resolve_js(&self, from: &str, spec: &str) -> Option<String> {
        if spec.starts_with("./") || spec.starts_with("../") || spec == "." || spec == ".." {
            let base = normalize(&join_path(dir_of(from), spec))?;
            return self.find_js(&base);
        }
        if let Some(rest) = spec.strip_prefix("@/").or_else(|| spec.strip_prefix("~/")) {
            return ALIAS_ROOTS
                .iter()
                .find_map(|root| normalize(&format!("{root}{rest}")).and_then(|b| self.find_js(&b)));
        }
        if let Some(rest) = spec.strip_prefix('/') {
            return normalize(rest).and_then(|b| self.find_js(&b));
        }
        None
    }

    fn find_js(&self, base: &str) -> Option<String> {
        if self.files.contains(base) {
            return Some(base.to_string());
        }
        // `./x.js` written for a `x.ts` source (TypeScript ESM).
        let stem = [".js", ".jsx", ".mjs", ".cjs"]
            .iter()
            .find_map(|ext| base.strip_suffix(ext))
            .unwrap_or(base);
        JS_EXTENSIONS
            .iter()
            .map(|ext| format!("{stem}{ext}"))
            .chain(JS_EXTENSIONS.iter().map(|ext| join_path(base, &format!("index{ext}"))))
            .find(|candidate| self.files.contains(candidate))
    }

    // -- Go ---------------------------------------------------------------------

    fn resolve_go(&self, spec: &str) -> Vec<String> {
        let dir = match &self.go_module {
            Some(module) if spec == module => Some(String::new()),
            Some(module) => spec.strip_prefix(&format!("{module}/")).map(str::to_string),
            None => None,
        };
        let dir = dir.or_else(|| {
            // Without a matching go.mod, only domain-qualified paths may be local.
            let segments: Vec<&str> = spec.split('/').collect();
            if !segments.first().is_some_and(|s| s.contains('.')) {
                return None;
            }
            (1..segments.len().saturating_sub(1))
                .map(|start| segments[start..].join("/"))
                .find_map(|tail| self.dir_suffix.get(&tail).and_then(|dirs| dirs.first().cloned()))
        });
        let Some(dir) = dir else {
            return Vec::new();
        };
        self.dirs
            .get(&dir)
            .map(|files| {
                files
                    .iter()
                    .filter(|f| f.ends_with(".go") && !f.ends_with("_test.go"))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    // -- Relative paths (require_relative, include) -------------------------------

    fn resolve_relative(&self, from: &str, spec: &str) -> Option<String> {
        let spec = spec.trim_start_matches('/');
        let base = normalize(&join_path(dir_of(from), spec))?;
        if self.files.contains(&base) {
            return Some(base);
        }
        let ext = extension(from)?;
        let with_ext = format!("{base}.{ext}");
        self.files.contains(&with_ext).then_some(with_ext)
    }

    // -- Namespaces and module stems (Java, C#, PHP, Ruby) ------------------------

    fn resolve_stem(&self, from: &str, spec: &str) -> Vec<String> {
        let Some(ext) = extension(from) else {
            return Vec::new();
        };
        let ruby = ext == "rb";
        let segments: Vec<String> = spec
            .split(['.', '\\', '/', ':'])
            .filter(|s| !s.is_empty())
            .map(|s| if ruby { snake_case(s) } else { s.to_string() })
            .collect();
        let n = segments.len();
        if n == 0 {
            return Vec::new();
        }

        // Full name, longest tail first. A qualified name must match at least
        // its last two segments; `java.util.List` is not any `List.java`.
        let min_tail = n.min(2);
        for k in (min_tail..=n).rev() {
            let path = format!("{}.{ext}", segments[n - k..].join("/"));
            if let Some(hit) = self.by_path(&path, from) {
                return vec![hit];
            }
        }
        // Member import (`a.b.Class.member`): drop the last segment.
        if n > 2 {
            for k in (2..n).rev() {
                let path = format!("{}.{ext}", segments[n - 1 - k..n - 1].join("/"));
                if let Some(hit) = self.by_path(&path, from) {
                    return vec![hit];
                }
            }
        }
        // Namespace import: every file of the matching directory.
        for k in (min_tail..=n).rev() {
            let tail = segments[n - k..].join("/");
            if let Some(files) = self
                .dir_suffix
                .get(&tail)
                .and_then(|dirs| dirs.first())
                .and_then(|dir| self.dirs.get(dir))
            {
                let suffix = format!(".{ext}");
                return files.iter().filter(|f| f.ends_with(&suffix)).cloned().collect();
            }
        }
        Vec::new()
    }
}

fn parse_go_module(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("module")?;
        let module = rest.trim().trim_matches('"');
        (!module.is_empty() && rest.starts_with(char::is_whitespace)).then(|| module.to_string())
    })
}

/// Directory part of a file id; `""` for files at the root.
pub fn dir_of(id: &str) -> &str {
    id.rfind('/').map(|pos| &id[..pos]).unwrap_or("")
}

fn extension(id: &str) -> Option<&str> {
    let name = id.rsplit('/').next()?;
    name.rfind('.').map(|pos| &name[pos + 1..])
}

pub fn join_path(dir: &str, rel: &str) -> String {
    if dir.is_empty() {
        rel.to_string()
    } else if rel.is_empty() {
        dir.to_string()
    } else {
        format!("{dir}/{rel}")
    }
}

/// Lexically resolve `.` and `..`; `None` when the path climbs above the root.
pub fn normalize(path: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}

fn shared_prefix(a: &str, b: &str) -> usize {
    a.split('/').zip(b.split('/')).take_while(|(x, y)| x == y).count()
}

/// `OrderItems` -> `order_items`.
fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(ids: &[&str]) -> FileIndex {
        FileIndex::from_ids(ids.iter().map(|s| s.to_string()), None)
    }

    fn import(style: ImportStyle, spec: &str, names: &[&str]) -> ImportRef {
        ImportRef {
            style,
            spec: spec.to_string(),
            names: names.iter().map(|n| n.to_string()).collect(),
        }
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("a/./b/../c").as_deref(), Some("a/c"));
        assert_eq!(normalize("../x"), None);
        assert_eq!(normalize("src/../index.ts").as_deref(), Some("index.ts"));
    }

    #[test]
    fn test_python_absolute_and_relative() {
        let idx = index(&["app/__init__.py", "app/models.py", "app/views.py", "app/api/serializers.py"]);
        let py = |level| ImportStyle::Python { level };

        assert_eq!(idx.resolve("app/views.py", &import(py(1), "models", &["User"])), vec!["app/models.py"]);
        assert_eq!(idx.resolve("app/views.py", &import(py(0), "app.models", &["User"])), vec!["app/models.py"]);
        // prefix fallback: `app.models.User` is a class in app/models.py
        assert_eq!(idx.resolve("app/views.py", &import(py(0), "app.models.User", &[])), vec!["app/models.py"]);
        assert_eq!(
            idx.resolve("app/api/serializers.py", &import(py(2), "", &["models", "views"])),
            vec!["app/models.py", "app/views.py"]
        );
        assert_eq!(idx.resolve("app/views.py", &import(py(0), "app", &[])), vec!["app/__init__.py"]);
        assert!(idx.resolve("app/views.py", &import(py(0), "django.db", &["models"])).is_empty());
    }

    #[test]
    fn test_python_nested_source_root() {
        let idx = index(&["backend/app/models.py", "backend/app/views.py"]);
        let import = import(ImportStyle::Python { level: 0 }, "app.models", &[]);
        assert_eq!(idx.resolve("backend/app/views.py", &import), vec!["backend/app/models.py"]);
    }

    #[test]
    fn test_python_same_name_file_deeper_in_tree_not_linked() {
        let idx = index(&["app/main.py", "tools/vendored/logging.py", "tools/vendored/json.py"]);
        let py = |spec| import(ImportStyle::Python { level: 0 }, spec, &[]);
        assert!(idx.resolve("app/main.py", &py("logging")).is_empty());
        assert!(idx.resolve("app/main.py", &py("json")).is_empty());
        assert!(idx.resolve("app/main.py", &import(ImportStyle::Python { level: 0 }, "", &["json"])).is_empty());
        // the vendored tree still resolves its own siblings
        assert_eq!(
            idx.resolve("tools/vendored/logging.py", &py("json")),
            vec!["tools/vendored/json.py"]
        );
    }

    #[test]
    fn test_python_src_layout() {
        let idx = index(&["src/shop/orders.py", "tests/test_orders.py"]);
        let import = import(ImportStyle::Python { level: 0 }, "shop.orders", &["place"]);
        assert_eq!(idx.resolve("tests/test_orders.py", &import), vec!["src/shop/orders.py"]);
    }

    #[test]
    fn test_js_relative_alias_and_index() {
        let idx = index(&["src/api/client.ts", "src/components/index.tsx", "src/app.tsx", "src/util.ts"]);
        let js = |spec| import(ImportStyle::Js, spec, &[]);

        assert_eq!(idx.resolve("src/app.tsx", &js("./api/client")), vec!["src/api/client.ts"]);
        assert_eq!(idx.resolve("src/app.tsx", &js("./components")), vec!["src/components/index.tsx"]);
        assert_eq!(idx.resolve("src/api/client.ts", &js("../util.js")), vec!["src/util.ts"]);
        assert_eq!(idx.resolve("src/app.tsx", &js("@/api/client")), vec!["src/api/client.ts"]);
        assert!(idx.resolve("src/app.tsx", &js("react")).is_empty());
        assert!(idx.resolve("src/app.tsx", &js("../../outside")).is_empty());
    }

    #[test]
    fn test_go_package_directory() {
        let idx = FileIndex::from_ids(
            ["cmd/main.go", "internal/store/db.go", "internal/store/db_test.go", "internal/store/cache.go"]
                .iter()
                .map(|s| s.to_string()),
            Some("example.com/shop".to_string()),
        );
        let go = |spec| import(ImportStyle::Go, spec, &[]);
        assert_eq!(
            idx.resolve("cmd/main.go", &go("example.com/shop/internal/store")),
            vec!["internal/store/cache.go", "internal/store/db.go"]
        );
        assert!(idx.resolve("cmd/main.go", &go("net/http")).is_empty());

        let no_mod = index(&["cmd/main.go", "internal/store/db.go"]);
        assert_eq!(
            no_mod.resolve("cmd/main.go", &go("github.com/acme/shop/internal/store")),
            vec!["internal/store/db.go"]
        );
    }

    #[test]
    fn test_stem_and_relative() {
        let idx = index(&[
            "src/main/java/com/shop/service/UserService.java",
            "src/main/java/com/shop/web/UserController.java",
            "app/Http/Controllers/UserController.php",
            "routes/web.php",
            "app/models/concerns/auditable.rb",
            "app/models/order.rb",
            "lib/pricing.rb",
            "Shop/Data/ShopContext.cs",
            "Shop/Data/Order.cs",
            "Shop/Api/OrdersController.cs",
        ]);
        let stem = |spec| import(ImportStyle::Stem, spec, &[]);

        assert_eq!(
            idx.resolve("src/main/java/com/shop/web/UserController.java", &stem("com.shop.service.UserService")),
            vec!["src/main/java/com/shop/service/UserService.java"]
        );
        assert_eq!(
            idx.resolve("routes/web.php", &stem("App\\Http\\Controllers\\UserController")),
            vec!["app/Http/Controllers/UserController.php"]
        );
        assert_eq!(
            idx.resolve("app/models/order.rb", &stem("Auditable")),
            vec!["app/models/concerns/auditable.rb"]
        );
        assert_eq!(
            idx.resolve("Shop/Api/OrdersController.cs", &stem("Shop.Data")),
            vec!["Shop/Data/Order.cs", "Shop/Data/ShopContext.cs"]
        );
        assert_eq!(
            idx.resolve("app/models/order.rb", &import(ImportStyle::Relative, "../../lib/pricing", &[])),
            vec!["lib/pricing.rb"]
        );
    }

    #[test]
    fn test_stem_needs_two_segments_for_qualified_names() {
        let idx = index(&[
            "src/model/List.java",
            "src/web/Page.java",
            "app/Models/Request.php",
            "app/Http/Kernel.php",
            "util/Strings.java",
        ]);
        let stem = |spec| import(ImportStyle::Stem, spec, &[]);

        assert!(idx.resolve("src/web/Page.java", &stem("java.util.List")).is_empty());
        assert!(idx.resolve("app/Http/Kernel.php", &stem("Illuminate\\Http\\Request")).is_empty());
        assert!(idx.resolve("src/web/Page.java", &stem("java.util")).is_empty());
        // a bare name still matches on its own
        assert_eq!(idx.resolve("src/web/Page.java", &stem("List")), vec!["src/model/List.java"]);
    }

    #[test]
    fn test_parse_go_module() {
        assert_eq!(parse_go_module("module example.com/shop\n\ngo 1.22\n").as_deref(), Some("example.com/shop"));
        assert_eq!(parse_go_module("go 1.22\n"), None);
    }
}
