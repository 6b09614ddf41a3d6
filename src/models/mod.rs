//! # Detection Model Module
//!
//! @title Pluggable Vulnerability Detection Models
//! @author Ramprasad
//!
//! This module provides the framework that makes detection models
//! substitutable at runtime, together with the built-in models.
//!
//! ## Architecture
//!
//! All models implement the [`DetectionModel`] trait. The [`ModelRegistry`]
//! owns one slot per model, tracks whether it has been loaded and makes sure
//! the (possibly very slow) load step runs at most once per process.
//!
//! ## Available Models
//!
//! | Label | Kind | Line-level output |
//! |-------|------|-------------------|
//! | FlawFinder | Rule-based static analyzer | Line notes |
//! | TokenRisk | Lexicon-weighted token attribution | Token weights |
//! | *configured* | External process (neural models) | Either |

mod external;
mod flawfinder;
mod registry;
mod token_risk;

pub use external::ExternalModel;
pub use flawfinder::FlawFinderModel;
pub use registry::{ModelHandle, ModelRegistry};
pub use token_risk::{TokenRiskModel, DEFAULT_THRESHOLD};

use crate::config::AppConfig;
use crate::parser::Language;
use serde::{Deserialize, Serialize};

/// Trait for implementing detection models.
///
/// A model scores whole functions and may additionally explain its call,
/// either with per-token attribution weights or with per-line notes.
///
/// # Example Implementation
///
/// ```rust,ignore
/// pub struct AlwaysFine;
///
/// impl DetectionModel for AlwaysFine {
///     fn label(&self) -> &str { "AlwaysFine" }
///     fn detail(&self) -> &str { "Never reports anything" }
///     fn load(&self) -> anyhow::Result<()> { Ok(()) }
///
///     fn infer(&self, functions: &[&str], _: Language) -> anyhow::Result<Vec<RawDetectionResult>> {
///         Ok(functions.iter().map(|_| RawDetectionResult::clean(1.0)).collect())
///     }
/// }
/// ```
pub trait DetectionModel: Send + Sync {
    /// Unique label used to select the model.
    fn label(&self) -> &str;

    /// Human-readable description shown in model listings.
    fn detail(&self) -> &str;

    /// Models that need no initialization report `true` and start loaded.
    fn preloaded(&self) -> bool {
        false
    }

    /// Performs the one-time initialization of the model.
    ///
    /// The registry guarantees this is called at most once successfully.
    fn load(&self) -> anyhow::Result<()>;

    /// Scores a batch of functions.
    ///
    /// Must return exactly one result per input function, in input order.
    fn infer(&self, functions: &[&str], language: Language) -> anyhow::Result<Vec<RawDetectionResult>>;
}

/// Attribution weight of one token of the analyzed function text.
///
/// Serialized as a `[token, weight]` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "(String, f64)", into = "(String, f64)")]
pub struct TokenWeight {
    pub token: String,
    pub weight: f64,
}

impl TokenWeight {
    pub fn new(token: impl Into<String>, weight: f64) -> Self {
        Self {
            token: token.into(),
            weight,
        }
    }
}

impl From<(String, f64)> for TokenWeight {
    fn from((token, weight): (String, f64)) -> Self {
        Self { token, weight }
    }
}

impl From<TokenWeight> for (String, f64) {
    fn from(value: TokenWeight) -> Self {
        (value.token, value.weight)
    }
}

/// A textual explanation attached to one line of a function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineNote {
    /// Line offset inside the function text (0-based).
    pub line: usize,

    /// Risk level from 1 (lowest) to 5 (highest).
    pub level: u8,

    /// Explanation shown to the user.
    pub text: String,
}

/// Raw output of a model for one function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetectionResult {
    /// Whether the model considers the function vulnerable.
    pub predicted: bool,

    /// Confidence of the model in `predicted`, in `[0, 1]`.
    pub probability: f64,

    /// Token attributions in the token order of the function text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_scores: Option<Vec<TokenWeight>>,

    /// Line notes produced by rule-based models.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub line_notes: Vec<LineNote>,
}

impl RawDetectionResult {
    /// A "not vulnerable" call with the given confidence.
    pub fn clean(probability: f64) -> Self {
        Self {
            predicted: false,
            probability,
            line_scores: None,
            line_notes: Vec::new(),
        }
    }

    /// A "vulnerable" call with the given confidence and no explanation.
    pub fn vulnerable(probability: f64) -> Self {
        Self {
            predicted: true,
            probability,
            line_scores: None,
            line_notes: Vec::new(),
        }
    }

    pub fn with_line_scores(mut self, line_scores: Vec<TokenWeight>) -> Self {
        self.line_scores = Some(line_scores);
        self
    }

    pub fn with_line_notes(mut self, line_notes: Vec<LineNote>) -> Self {
        self.line_notes = line_notes;
        self
    }
}

/// Public description of a registered model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelDescriptor {
    pub label: String,
    pub detail: String,
    pub is_loaded: bool,
}

/// Builds the registry of every model known to this build.
///
/// Registration happens here and only here: the built-in models first, then
/// one external model per entry of the configuration.
pub fn default_registry(config: &AppConfig) -> anyhow::Result<ModelRegistry> {
    let mut registry = ModelRegistry::new();

    registry.register(FlawFinderModel::new()?);
    registry.register(TokenRiskModel::new(config.token_risk.clone()));

    for external in &config.external_models {
        log::debug!("Registering external model {}", external.label);
        registry.register(ExternalModel::new(external.clone()));
    }

    Ok(registry)
}
