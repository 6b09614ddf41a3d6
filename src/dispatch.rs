//! # Detection Dispatcher
//!
//! Resolves a model by label, loads it on first use and forwards a whole
//! batch of functions to it. Inference is all-or-nothing: any failure or any
//! malformed result fails the batch.

use crate::error::{ImdbugError, Result};
use crate::models::{ModelRegistry, RawDetectionResult};
use crate::parser::{FunctionUnit, Language};
use std::time::Instant;

/// Sends function batches to registered models.
pub struct DetectionDispatcher<'r> {
    registry: &'r ModelRegistry,
}

impl<'r> DetectionDispatcher<'r> {
    pub fn new(registry: &'r ModelRegistry) -> Self {
        Self { registry }
    }

    /// Runs the model `label` over `functions`.
    ///
    /// Returns exactly one result per function, in input order. An empty
    /// batch returns an empty result without loading the model.
    ///
    /// # Errors
    ///
    /// - [`ImdbugError::UnknownModel`] if `label` is not registered
    /// - [`ImdbugError::ModelLoad`] if the first load fails
    /// - [`ImdbugError::Inference`] if the model fails or returns a malformed batch
    pub fn analyze(
        &self,
        label: &str,
        functions: &[FunctionUnit],
        language: Language,
    ) -> Result<Vec<RawDetectionResult>> {
        let model = self.registry.get(label)?;

        if functions.is_empty() {
            return Ok(Vec::new());
        }

        model.ensure_loaded()?;

        let texts: Vec<&str> = functions.iter().map(|unit| unit.text.as_str()).collect();
        let started = Instant::now();

        let inference_error = |reason: String| {
            log::error!("Inference with {} failed: {}", model.label(), reason);
            ImdbugError::Inference {
                label: model.label().to_string(),
                reason,
            }
        };

        let results = model
            .infer(&texts, language)
            .map_err(|e| inference_error(format!("{:#}", e)))?;

        if results.len() != functions.len() {
            return Err(inference_error(format!(
                "expected {} result(s), got {}",
                functions.len(),
                results.len()
            )));
        }

        if let Some(index) = results
            .iter()
            .position(|result| !(0.0..=1.0).contains(&result.probability))
        {
            return Err(inference_error(format!(
                "probability {} for function {} is outside [0, 1]",
                results[index].probability, index
            )));
        }

        log::debug!(
            "{} analyzed {} function(s) in {:.2?}",
            model.label(),
            functions.len(),
            started.elapsed()
        );

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DetectionModel;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Echoes the function length back as the probability of a clean call.
    struct LengthModel {
        loads: Arc<AtomicUsize>,
    }

    impl DetectionModel for LengthModel {
        fn label(&self) -> &str {
            "Length"
        }

        fn detail(&self) -> &str {
            "Scores by text length"
        }

        fn load(&self) -> anyhow::Result<()> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn infer(&self, functions: &[&str], _: Language) -> anyhow::Result<Vec<RawDetectionResult>> {
            Ok(functions
                .iter()
                .map(|f| RawDetectionResult::clean(f.len() as f64 / 100.0))
                .collect())
        }
    }

    struct BrokenModel {
        load_fails: bool,
        short_batch: bool,
    }

    impl DetectionModel for BrokenModel {
        fn label(&self) -> &str {
            "Broken"
        }

        fn detail(&self) -> &str {
            "Fails on purpose"
        }

        fn load(&self) -> anyhow::Result<()> {
            if self.load_fails {
                anyhow::bail!("checkpoint missing");
            }
            Ok(())
        }

        fn infer(&self, functions: &[&str], _: Language) -> anyhow::Result<Vec<RawDetectionResult>> {
            if self.short_batch {
                return Ok(vec![RawDetectionResult::clean(1.0); functions.len() - 1]);
            }
            anyhow::bail!("out of memory")
        }
    }

    fn unit(text: &str, line: usize) -> FunctionUnit {
        FunctionUnit {
            text: text.to_string(),
            start_line: line,
            end_line: line,
        }
    }

    fn length_registry() -> (ModelRegistry, Arc<AtomicUsize>) {
        let loads = Arc::new(AtomicUsize::new(0));
        let mut registry = ModelRegistry::new();
        registry.register(LengthModel {
            loads: Arc::clone(&loads),
        });
        (registry, loads)
    }

    #[test]
    fn test_results_follow_input_order() {
        let (registry, loads) = length_registry();
        let dispatcher = DetectionDispatcher::new(&registry);
        let functions = vec![unit("aaaaa", 0), unit("a", 1), unit("aaa", 2)];

        let results = dispatcher.analyze("Length", &functions, Language::C).unwrap();

        assert_eq!(results.len(), functions.len());
        let probabilities: Vec<f64> = results.iter().map(|r| r.probability).collect();
        assert_eq!(probabilities, vec![0.05, 0.01, 0.03]);
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_empty_batch_skips_load() {
        let (registry, loads) = length_registry();
        let dispatcher = DetectionDispatcher::new(&registry);

        assert!(dispatcher.analyze("Length", &[], Language::C).unwrap().is_empty());
        assert_eq!(loads.load(Ordering::SeqCst), 0);
        assert!(!registry.list()[0].is_loaded);
    }

    #[test]
    fn test_unknown_model_even_for_empty_batch() {
        let (registry, _) = length_registry();
        let dispatcher = DetectionDispatcher::new(&registry);
        assert!(matches!(
            dispatcher.analyze("Nope", &[], Language::C),
            Err(ImdbugError::UnknownModel { .. })
        ));
    }

    #[test]
    fn test_load_failure() {
        let mut registry = ModelRegistry::new();
        registry.register(BrokenModel {
            load_fails: true,
            short_batch: false,
        });
        let dispatcher = DetectionDispatcher::new(&registry);

        let err = dispatcher
            .analyze("Broken", &[unit("x", 0)], Language::C)
            .unwrap_err();
        assert!(matches!(err, ImdbugError::ModelLoad { .. }));
        assert!(!registry.list()[0].is_loaded);
    }

    #[test]
    fn test_inference_failure() {
        let mut registry = ModelRegistry::new();
        registry.register(BrokenModel {
            load_fails: false,
            short_batch: false,
        });
        let dispatcher = DetectionDispatcher::new(&registry);

        let err = dispatcher
            .analyze("Broken", &[unit("x", 0)], Language::C)
            .unwrap_err();
        assert!(matches!(err, ImdbugError::Inference { .. }));
        assert!(err.to_string().contains("out of memory"));
    }

    #[test]
    fn test_short_batch_is_inference_error() {
        let mut registry = ModelRegistry::new();
        registry.register(BrokenModel {
            load_fails: false,
            short_batch: true,
        });
        let dispatcher = DetectionDispatcher::new(&registry);

        let err = dispatcher
            .analyze("Broken", &[unit("x", 0), unit("y", 1)], Language::C)
            .unwrap_err();
        assert!(matches!(err, ImdbugError::Inference { .. }));
    }

    #[test]
    fn test_out_of_range_probability_rejected() {
        let (registry, _) = length_registry();
        let dispatcher = DetectionDispatcher::new(&registry);
        let long = "x".repeat(150);

        let err = dispatcher
            .analyze("Length", &[unit(&long, 0)], Language::C)
            .unwrap_err();
        assert!(matches!(err, ImdbugError::Inference { .. }));
    }
}
