//! # Language Hint Resolution
//!
//! Normalizes file extensions and user supplied hints to the small fixed set
//! of grammars the segmenter knows about.

use crate::error::{ImdbugError, Result};
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// Hints that select the C++ grammar.
const CPP_ALIASES: &[&str] = &["cpp", "h", "hpp", "h++", "c++", "cc", "hh"];

/// Grammar used to parse a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    C,
    Cpp,
}

impl Language {
    /// Resolves a language hint (an extension with or without the leading dot,
    /// case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`ImdbugError::UnsupportedLanguage`] when the hint matches no grammar.
    pub fn from_hint(hint: &str) -> Result<Self> {
        let normalized = hint.trim().trim_start_matches('.').to_lowercase();

        if normalized == "c" {
            return Ok(Language::C);
        }
        if CPP_ALIASES.contains(&normalized.as_str()) {
            return Ok(Language::Cpp);
        }

        Err(ImdbugError::UnsupportedLanguage(hint.to_string()))
    }

    /// Resolves the language of a file from its extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) => Self::from_hint(ext),
            None => Err(ImdbugError::UnsupportedLanguage(path.display().to_string())),
        }
    }

    /// Returns `true` if files with this path would be accepted by [`Language::from_path`].
    pub fn is_supported_path(path: &Path) -> bool {
        Self::from_path(path).is_ok()
    }

    /// Canonical hint passed on to detection models.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::C => "c",
            Language::Cpp => "cpp",
        }
    }

    /// Tree-sitter grammar for this language.
    pub(crate) fn grammar(&self) -> tree_sitter::Language {
        match self {
            Language::C => tree_sitter_c::LANGUAGE.into(),
            Language::Cpp => tree_sitter_cpp::LANGUAGE.into(),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
