//! # Error Types
//!
//! @title Annotation Pipeline Errors
//! @author Ramprasad
//!
//! Every failure the annotation pipeline can surface to a caller. Errors are
//! split into client errors (the request itself was unusable) and server
//! errors (a detection model misbehaved), matching how a frontend should
//! report them.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the library.
pub type Result<T> = std::result::Result<T, ImdbugError>;

/// Errors raised while segmenting, dispatching or annotating source code.
#[derive(Debug, Error)]
pub enum ImdbugError {
    /// The language hint matched no known grammar.
    #[error("unsupported language '{0}' (expected c, cpp, h, hpp, h++, c++, cc or hh)")]
    UnsupportedLanguage(String),

    /// No detection model was registered under the requested label.
    #[error("unknown model '{label}' (available: {})", available.join(", "))]
    UnknownModel {
        label: String,
        available: Vec<String>,
    },

    /// The model failed to initialize. It stays unloaded so a later request may retry.
    #[error("failed to load model '{label}': {reason}")]
    ModelLoad { label: String, reason: String },

    /// The model raised during inference; no partial results are kept.
    #[error("inference failed for model '{label}': {reason}")]
    Inference { label: String, reason: String },

    /// Segmentation produced nothing to analyze.
    #[error("no functions found in code")]
    NoFunctionsFound,

    /// The parser could not produce a syntax tree.
    #[error("failed to parse source: {0}")]
    Parse(String),

    /// The configuration file could not be read or decoded.
    #[error("invalid configuration at {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },
}

impl ImdbugError {
    /// Returns `true` when the error was caused by the caller's input rather
    /// than by a model or the environment.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ImdbugError::UnsupportedLanguage(_)
                | ImdbugError::UnknownModel { .. }
                | ImdbugError::NoFunctionsFound
        )
    }
}
