//! # imdbug Library
//!
//! @title imdbug - Line-Level Vulnerability Annotation
//! @author Ramprasad
//!
//! Annotates C and C++ source code with line-level vulnerability risk.
//! A source file is split into functions, each function is scored by a
//! pluggable detection model, token attributions are reduced to per-line
//! scores and everything is classified into discrete severities.
//!
//! ## Modules
//!
//! - [`parser`] - Bounded-depth function segmentation with tree-sitter
//! - [`models`] - Detection model trait, registry and built-in models
//! - [`dispatch`] - Load-on-first-use batch dispatch to a model
//! - [`scoring`] - Token attribution to line score reduction
//! - [`report`] - Severity classification, merging and report rendering
//! - [`pipeline`] - The end-to-end annotator
//! - [`config`] - Configuration file discovery
//! - [`cli`] - Command-line interface definitions
//!
//! ## Example
//!
//! ```rust,ignore
//! use imdbug::{default_registry, AppConfig, Annotator, Segmenter};
//!
//! let registry = default_registry(&AppConfig::default())?;
//! let annotator = Annotator::new(&registry, Segmenter::default());
//! let annotation = annotator.annotate(&source, "cpp", "FlawFinder")?;
//! for finding in &annotation.findings {
//!     println!("{}: {}", finding.line_index, finding.text);
//! }
//! ```

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod report;
pub mod scoring;

pub use cli::Cli;
pub use config::AppConfig;
pub use dispatch::DetectionDispatcher;
pub use error::{ImdbugError, Result};
pub use models::{default_registry, DetectionModel, ModelDescriptor, ModelRegistry, RawDetectionResult};
pub use parser::{segment, FunctionUnit, Language, Segmenter};
pub use pipeline::{Annotation, Annotator};
pub use report::{LineFinding, Report, Severity};
