use std::fmt;

use serde::{Deserialize, Serialize};

/// A source language the analyzer recognises.
///
/// A plain `Copy` enum, pattern-matched at dispatch boundaries. The extraction
/// strategy is looked up once per file through [`LanguageKind::strategy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageKind {
    Python,
    JavaScript,
    TypeScript,
    Php,
    Ruby,
    Java,
    Go,
    Rust,
    CSharp,
    Vue,
    Svelte,
}

/// How a language's files are turned into facts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// A tree-sitter grammar is available: walk the syntax tree.
    Structural,
    /// Ordered per-language regular expressions over the raw text.
    Pattern,
}

impl LanguageKind {
    pub const ALL: [LanguageKind; 11] = [
        LanguageKind::Python,
        LanguageKind::JavaScript,
        LanguageKind::TypeScript,
        LanguageKind::Php,
        LanguageKind::Ruby,
        LanguageKind::Java,
        LanguageKind::Go,
        LanguageKind::Rust,
        LanguageKind::CSharp,
        LanguageKind::Vue,
        LanguageKind::Svelte,
    ];

    /// Returns true if this language kind matches a given file extension (no dot, lowercase).
    pub fn matches_extension(&self, ext: &str) -> bool {
        match self {
            LanguageKind::Python => ext == "py",
            LanguageKind::JavaScript => matches!(ext, "js" | "jsx" | "mjs" | "cjs"),
            LanguageKind::TypeScript => matches!(ext, "ts" | "tsx" | "mts" | "cts"),
            LanguageKind::Php => ext == "php",
            LanguageKind::Ruby => ext == "rb",
            LanguageKind::Java => ext == "java",
            LanguageKind::Go => ext == "go",
            LanguageKind::Rust => ext == "rs",
            LanguageKind::CSharp => ext == "cs",
            LanguageKind::Vue => ext == "vue",
            LanguageKind::Svelte => ext == "svelte",
        }
    }

    /// Language owning a file extension, if any. Case-insensitive.
    pub fn from_extension(ext: &str) -> Option<LanguageKind> {
        let ext = ext.to_lowercase();
        LanguageKind::ALL.into_iter().find(|lk| lk.matches_extension(&ext))
    }

    /// Canonical lowercase name, as accepted by `--languages`.
    pub fn name(&self) -> &'static str {
        match self {
            LanguageKind::Python => "python",
            LanguageKind::JavaScript => "javascript",
            LanguageKind::TypeScript => "typescript",
            LanguageKind::Php => "php",
            LanguageKind::Ruby => "ruby",
            LanguageKind::Java => "java",
            LanguageKind::Go => "go",
            LanguageKind::Rust => "rust",
            LanguageKind::CSharp => "csharp",
            LanguageKind::Vue => "vue",
            LanguageKind::Svelte => "svelte",
        }
    }

    /// Parse a CLI or config string into a `LanguageKind`. Case-insensitive,
    /// accepts the canonical name and the usual short forms (`py`, `ts`, `rs`, `cs`).
    pub fn from_str_loose(s: &str) -> Option<LanguageKind> {
        match s.trim().to_lowercase().as_str() {
            "python" | "py" => Some(LanguageKind::Python),
            "javascript" | "js" => Some(LanguageKind::JavaScript),
            "typescript" | "ts" => Some(LanguageKind::TypeScript),
            "php" => Some(LanguageKind::Php),
            "ruby" | "rb" => Some(LanguageKind::Ruby),
            "java" => Some(LanguageKind::Java),
            "go" | "golang" => Some(LanguageKind::Go),
            "rust" | "rs" => Some(LanguageKind::Rust),
            "csharp" | "c#" | "cs" => Some(LanguageKind::CSharp),
            "vue" => Some(LanguageKind::Vue),
            "svelte" => Some(LanguageKind::Svelte),
            _ => None,
        }
    }

    pub fn strategy(&self) -> Strategy {
        match self {
            LanguageKind::Python
            | LanguageKind::JavaScript
            | LanguageKind::TypeScript
            | LanguageKind::Rust
            | LanguageKind::Go => Strategy::Structural,
            LanguageKind::Php
            | LanguageKind::Ruby
            | LanguageKind::Java
            | LanguageKind::CSharp
            | LanguageKind::Vue
            | LanguageKind::Svelte => Strategy::Pattern,
        }
    }
}

impl fmt::Display for LanguageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
