//! # Annotation Pipeline
//!
//! @title Source to Line Findings
//! @author Ramprasad
//!
//! Wires the stages together for one source text:
//!
//! ```text
//! segment -> dispatch to model -> reduce attributions -> classify & merge
//! ```
//!
//! Each call is independent; the only state shared between calls is the
//! model load state inside the [`ModelRegistry`].

use crate::dispatch::DetectionDispatcher;
use crate::error::{ImdbugError, Result};
use crate::models::ModelRegistry;
use crate::parser::{FunctionUnit, Language, Segmenter};
use crate::report::{merge, LineFinding};

/// Outcome of annotating one source text.
#[derive(Debug, Clone)]
pub struct Annotation {
    pub language: Language,
    pub functions: Vec<FunctionUnit>,
    pub findings: Vec<LineFinding>,
}

/// Runs the full annotation pipeline against a registry.
pub struct Annotator<'r> {
    dispatcher: DetectionDispatcher<'r>,
    segmenter: Segmenter,
}

impl<'r> Annotator<'r> {
    pub fn new(registry: &'r ModelRegistry, segmenter: Segmenter) -> Self {
        Self {
            dispatcher: DetectionDispatcher::new(registry),
            segmenter,
        }
    }

    /// Annotates `source` with the model `label`.
    ///
    /// # Errors
    ///
    /// Returns [`ImdbugError::NoFunctionsFound`] when segmentation finds
    /// nothing to analyze, and propagates segmentation, load and inference
    /// errors unchanged.
    pub fn annotate(&self, source: &str, language_hint: &str, label: &str) -> Result<Annotation> {
        let language = Language::from_hint(language_hint)?;
        self.annotate_language(source, language, label)
    }

    /// Same as [`Annotator::annotate`] with an already resolved language.
    pub fn annotate_language(&self, source: &str, language: Language, label: &str) -> Result<Annotation> {
        let functions = self.segmenter.segment_language(source, language)?;

        if functions.is_empty() {
            return Err(ImdbugError::NoFunctionsFound);
        }

        log::debug!(
            "Analyzing {} {} function(s) with {}",
            functions.len(),
            language,
            label
        );

        let results = self.dispatcher.analyze(label, &functions, language)?;
        let findings = merge(&functions, &results);

        log::debug!("{} finding(s) after classification", findings.len());

        Ok(Annotation {
            language,
            functions,
            findings,
        })
    }
}
