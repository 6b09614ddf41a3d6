//! # Model Registry
//!
//! Catalog of detection models with per-model lazy-load state.
//!
//! Load state is shared by every request touching the registry. Each slot
//! pairs an atomic `loaded` flag (read without locking once set) with a
//! mutex that serializes the first load, so concurrent first requests for
//! the same model trigger exactly one `load()` while other models stay
//! available.

use super::{DetectionModel, ModelDescriptor, RawDetectionResult};
use crate::error::{ImdbugError, Result};
use crate::parser::Language;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Instant;

struct ModelSlot {
    model: Box<dyn DetectionModel>,
    loaded: AtomicBool,
    load_guard: Mutex<()>,
}

impl ModelSlot {
    fn new(model: Box<dyn DetectionModel>) -> Self {
        let loaded = AtomicBool::new(model.preloaded());
        Self {
            model,
            loaded,
            load_guard: Mutex::new(()),
        }
    }

    fn descriptor(&self) -> ModelDescriptor {
        ModelDescriptor {
            label: self.model.label().to_string(),
            detail: self.model.detail().to_string(),
            is_loaded: self.loaded.load(Ordering::Acquire),
        }
    }
}

/// Registry containing all available detection models.
///
/// # Example
///
/// ```rust,ignore
/// let mut registry = ModelRegistry::new();
/// registry.register(FlawFinderModel::new()?);
/// let model = registry.get("FlawFinder")?;
/// model.ensure_loaded()?;
/// ```
#[derive(Default)]
pub struct ModelRegistry {
    slots: Vec<ModelSlot>,
}

impl ModelRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Registers a model. A model with the same label (case-insensitive)
    /// is replaced in place, keeping listing order stable.
    pub fn register<M: DetectionModel + 'static>(&mut self, model: M) -> &mut Self {
        let slot = ModelSlot::new(Box::new(model));

        match self.position(slot.model.label()) {
            Some(index) => {
                log::warn!("Replacing already registered model {}", slot.model.label());
                self.slots[index] = slot;
            }
            None => self.slots.push(slot),
        }

        self
    }

    /// Returns descriptors for every registered model, in registration order.
    pub fn list(&self) -> Vec<ModelDescriptor> {
        self.slots.iter().map(ModelSlot::descriptor).collect()
    }

    /// Returns the labels of every registered model, in registration order.
    pub fn labels(&self) -> Vec<String> {
        self.slots
            .iter()
            .map(|slot| slot.model.label().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Resolves a model by label. Exact matches win over case-insensitive ones.
    ///
    /// # Errors
    ///
    /// Returns [`ImdbugError::UnknownModel`] if no model has that label.
    pub fn get(&self, label: &str) -> Result<ModelHandle<'_>> {
        self.position(label)
            .map(|index| ModelHandle {
                slot: &self.slots[index],
            })
            .ok_or_else(|| ImdbugError::UnknownModel {
                label: label.to_string(),
                available: self.labels(),
            })
    }

    fn position(&self, label: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.model.label() == label)
            .or_else(|| {
                self.slots
                    .iter()
                    .position(|slot| slot.model.label().eq_ignore_ascii_case(label))
            })
    }
}

/// Borrowed handle to one registered model.
#[derive(Clone, Copy)]
pub struct ModelHandle<'r> {
    slot: &'r ModelSlot,
}

impl<'r> ModelHandle<'r> {
    pub fn label(&self) -> &'r str {
        self.slot.model.label()
    }

    pub fn is_loaded(&self) -> bool {
        self.slot.loaded.load(Ordering::Acquire)
    }

    /// Loads the model unless it already is.
    ///
    /// # Errors
    ///
    /// Returns [`ImdbugError::ModelLoad`] if `load()` fails; the model then
    /// stays unloaded so the next request retries.
    pub fn ensure_loaded(&self) -> Result<()> {
        if self.is_loaded() {
            return Ok(());
        }

        let _guard = self
            .slot
            .load_guard
            .lock()
            .map_err(|_| ImdbugError::ModelLoad {
                label: self.label().to_string(),
                reason: "a previous load attempt panicked".to_string(),
            })?;

        // Another request may have finished loading while we waited.
        if self.is_loaded() {
            return Ok(());
        }

        log::info!("Model {} hasn't been loaded yet, loading now...", self.label());
        let started = Instant::now();

        self.slot.model.load().map_err(|e| {
            log::error!("Loading model {} failed: {:#}", self.label(), e);
            ImdbugError::ModelLoad {
                label: self.label().to_string(),
                reason: format!("{:#}", e),
            }
        })?;

        self.slot.loaded.store(true, Ordering::Release);
        log::info!("Model {} loaded in {:.2?}", self.label(), started.elapsed());

        Ok(())
    }

    /// Forwards a batch to the model without any load or length checks.
    pub fn infer(&self, functions: &[&str], language: Language) -> anyhow::Result<Vec<RawDetectionResult>> {
        self.slot.model.infer(functions, language)
    }
}
