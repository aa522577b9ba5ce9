//! Factory utilities and metadata for the supported source languages.

use std::path::Path;
use tree_sitter::Language;

use crate::core::errors::{PkgshiftError, Result};

/// Metadata describing one of the built-in languages.
#[derive(Debug, Clone, Copy)]
pub struct LanguageInfo {
    /// Canonical short key (matches CLI/config usage, e.g. "go").
    pub key: &'static str,
    /// Human-friendly display name.
    pub name: &'static str,
    /// Supported file extensions (without leading dots).
    pub extensions: &'static [&'static str],
}

const REGISTERED_LANGUAGES: &[LanguageInfo] = &[LanguageInfo {
    key: "go",
    name: "Go",
    extensions: &["go"],
}];

/// Return the languages that are compiled into this build.
pub fn registered_languages() -> &'static [LanguageInfo] {
    REGISTERED_LANGUAGES
}

/// Identify the canonical language key for a file path.
pub fn language_key_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_string_lossy().to_ascii_lowercase();
    if ext.is_empty() {
        return None;
    }

    registered_languages()
        .iter()
        .find(|info| info.extensions.iter().any(|candidate| *candidate == ext))
        .map(|info| info.key)
}

/// Get tree-sitter language for a given language key
pub fn get_tree_sitter_language(language_key: &str) -> Result<Language> {
    match normalize_language_key(language_key) {
        Some("go") => Ok(tree_sitter_go::LANGUAGE.into()),
        _ => Err(PkgshiftError::config(format!(
            "No tree-sitter grammar for: {}",
            language_key
        ))),
    }
}

/// Create a new parser for the given language
pub fn create_parser_for_language(language_key: &str) -> Result<tree_sitter::Parser> {
    let mut parser = tree_sitter::Parser::new();
    let tree_sitter_language = get_tree_sitter_language(language_key)?;
    parser.set_language(&tree_sitter_language).map_err(|e| {
        PkgshiftError::parse(
            language_key,
            format!("Failed to set parser language: {}", e),
        )
    })?;
    Ok(parser)
}

/// Normalizes a language identifier to its canonical key.
fn normalize_language_key(language: &str) -> Option<&'static str> {
    match language.to_ascii_lowercase().as_str() {
        "go" | "golang" => Some("go"),
        _ => None,
    }
}
