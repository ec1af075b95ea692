use tree_sitter::Language;

use crate::language::LanguageKind;

/// A tree-sitter grammar available to the structural analyzers.
///
/// # Grammar selection rules
/// - `.ts`/`.mts`/`.cts` -> TypeScript grammar (`LANGUAGE_TYPESCRIPT`)
/// - `.tsx`              -> TSX grammar (`LANGUAGE_TSX`)
///   These MUST be different: the TypeScript grammar cannot parse JSX, and the TSX grammar
///   breaks angle-bracket type assertions (`<T>expr`).
/// - `.js`/`.jsx`/`.mjs`/`.cjs` -> JavaScript grammar (handles JSX natively)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Grammar {
    Python,
    JavaScript,
    TypeScript,
    Tsx,
    Rust,
    Go,
}

impl Grammar {
    /// Grammar for a file of `language` with extension `ext`, if one exists.
    pub fn for_file(language: LanguageKind, ext: &str) -> Option<Grammar> {
        match language {
            LanguageKind::Python => Some(Grammar::Python),
            LanguageKind::JavaScript => Some(Grammar::JavaScript),
            LanguageKind::TypeScript if ext.eq_ignore_ascii_case("tsx") => Some(Grammar::Tsx),
            LanguageKind::TypeScript => Some(Grammar::TypeScript),
            LanguageKind::Rust => Some(Grammar::Rust),
            LanguageKind::Go => Some(Grammar::Go),
            _ => None,
        }
    }

    pub fn language(&self) -> Language {
        match self {
            Grammar::Python => tree_sitter_python::LANGUAGE.into(),
            Grammar::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Grammar::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Grammar::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Grammar::Rust => tree_sitter_rust::LANGUAGE.into(),
            Grammar::Go => tree_sitter_go::LANGUAGE.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tsx_gets_its_own_grammar() {
        assert_eq!(Grammar::for_file(LanguageKind::TypeScript, "tsx"), Some(Grammar::Tsx));
        assert_eq!(Grammar::for_file(LanguageKind::TypeScript, "ts"), Some(Grammar::TypeScript));
        assert_eq!(Grammar::for_file(LanguageKind::JavaScript, "jsx"), Some(Grammar::JavaScript));
        assert_eq!(Grammar::for_file(LanguageKind::Ruby, "rb"), None);
    }

    #[test]
    fn test_every_grammar_loads() {
        for g in [
            Grammar::Python,
            Grammar::JavaScript,
            Grammar::TypeScript,
            Grammar::Tsx,
            Grammar::Rust,
            Grammar::Go,
        ] {
            let mut parser = tree_sitter::Parser::new();
            parser.set_language(&g.language()).expect("grammar ABI compatible");
        }
    }
}
