use crate::models::{ModelVariant, Precision};
use crate::utils::error::OcrError;
use crate::Result;
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Performs the single expensive acquisition of a model variant.
pub trait ModelLoader: Send + Sync + 'static {
    type Model: Send + Sync + 'static;

    fn load(&self, variant: ModelVariant) -> Result<Self::Model>;

    fn precision(&self) -> Precision {
        Precision::Full
    }
}

/// Owns every loaded model and guarantees each variant is acquired at most once.
///
/// Concurrent first callers for a variant block on the same initialisation; a
/// failed load leaves the slot empty so a later call can retry.
pub struct ModelRegistry<L: ModelLoader> {
    loader: L,
    slots: HashMap<ModelVariant, OnceCell<Arc<L::Model>>>,
    load_attempts: AtomicUsize,
}

/// Snapshot of registry state for health and info endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct ModelStats {
    pub variant: ModelVariant,
    pub precision: Precision,
    pub loaded: bool,
    pub loaded_variants: Vec<ModelVariant>,
    pub load_attempts: usize,
}

impl<L: ModelLoader> ModelRegistry<L> {
    pub fn new(loader: L) -> Self {
        let slots = ModelVariant::ALL
            .iter()
            .map(|variant| (*variant, OnceCell::new()))
            .collect();

        Self {
            loader,
            slots,
            load_attempts: AtomicUsize::new(0),
        }
    }

    /// Return the model for `variant`, loading it on first use.
    pub fn ensure_loaded(&self, variant: ModelVariant) -> Result<Arc<L::Model>> {
        let slot = self.slot(variant)?;
        if let Some(model) = slot.get() {
            return Ok(Arc::clone(model));
        }

        let model = slot.get_or_try_init(|| {
            self.load_attempts.fetch_add(1, Ordering::SeqCst);
            tracing::info!("Loading recognition model {} ({})...", variant, self.loader.precision());
            let start = Instant::now();

            match self.loader.load(variant) {
                Ok(model) => {
                    tracing::info!(
                        "Recognition model {} ready in {:.2}s",
                        variant,
                        start.elapsed().as_secs_f32()
                    );
                    Ok(Arc::new(model))
                }
                Err(e) => {
                    tracing::error!("Failed to load recognition model {}: {}", variant, e);
                    Err(match e {
                        OcrError::ModelLoad(_) => e,
                        other => OcrError::ModelLoad(other.to_string()),
                    })
                }
            }
        })?;

        Ok(Arc::clone(model))
    }

    /// Return an already loaded model without triggering acquisition.
    pub fn model_for(&self, variant: ModelVariant) -> Result<Arc<L::Model>> {
        self.slot(variant)?
            .get()
            .cloned()
            .ok_or(OcrError::ModelNotLoaded(variant))
    }

    pub fn is_loaded(&self, variant: ModelVariant) -> bool {
        self.slots
            .get(&variant)
            .map(|slot| slot.get().is_some())
            .unwrap_or(false)
    }

    pub fn load_attempts(&self) -> usize {
        self.load_attempts.load(Ordering::SeqCst)
    }

    pub fn stats(&self, variant: ModelVariant) -> ModelStats {
        let loaded_variants = ModelVariant::ALL
            .iter()
            .copied()
            .filter(|v| self.is_loaded(*v))
            .collect();

        ModelStats {
            variant,
            precision: self.loader.precision(),
            loaded: self.is_loaded(variant),
            loaded_variants,
            load_attempts: self.load_attempts(),
        }
    }

    fn slot(&self, variant: ModelVariant) -> Result<&OnceCell<Arc<L::Model>>> {
        self.slots
            .get(&variant)
            .ok_or_else(|| OcrError::Internal(format!("No registry slot for variant {}", variant)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    #[derive(Debug)]
    struct FakeModel {
        variant: ModelVariant,
    }

    #[derive(Default)]
    struct CountingLoader {
        calls: AtomicUsize,
        fail_first: AtomicBool,
    }

    impl ModelLoader for CountingLoader {
        type Model = FakeModel;

        fn load(&self, variant: ModelVariant) -> Result<FakeModel> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            // Widen the race window so concurrent callers really overlap.
            thread::sleep(Duration::from_millis(50));
            if self.fail_first.swap(false, Ordering::SeqCst) {
                return Err(OcrError::ModelLoad("hub unreachable".to_string()));
            }
            Ok(FakeModel { variant })
        }
    }

    #[test]
    fn test_concurrent_first_requests_load_once() {
        let registry = Arc::new(ModelRegistry::new(CountingLoader::default()));
        let callers = 16;
        let barrier = Arc::new(Barrier::new(callers));

        let handles: Vec<_> = (0..callers)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    registry.ensure_loaded(ModelVariant::Small).unwrap()
                })
            })
            .collect();

        let models: Vec<Arc<FakeModel>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(registry.loader.calls.load(Ordering::SeqCst), 1);
        assert_eq!(registry.load_attempts(), 1);
        for model in &models {
            assert!(Arc::ptr_eq(model, &models[0]));
            assert_eq!(model.variant, ModelVariant::Small);
        }
    }

    #[test]
    fn test_repeated_calls_are_idempotent() {
        let registry = ModelRegistry::new(CountingLoader::default());
        let first = registry.ensure_loaded(ModelVariant::Base).unwrap();
        let second = registry.ensure_loaded(ModelVariant::Base).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.loader.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_variants_load_independently() {
        let registry = ModelRegistry::new(CountingLoader::default());
        registry.ensure_loaded(ModelVariant::Small).unwrap();
        assert!(!registry.is_loaded(ModelVariant::Base));
        registry.ensure_loaded(ModelVariant::Base).unwrap();
        assert_eq!(registry.loader.calls.load(Ordering::SeqCst), 2);
        assert_eq!(registry.stats(ModelVariant::Small).loaded_variants.len(), 2);
    }

    #[test]
    fn test_model_for_does_not_trigger_load() {
        let registry = ModelRegistry::new(CountingLoader::default());
        assert!(matches!(
            registry.model_for(ModelVariant::Small),
            Err(OcrError::ModelNotLoaded(ModelVariant::Small))
        ));
        assert_eq!(registry.loader.calls.load(Ordering::SeqCst), 0);

        registry.ensure_loaded(ModelVariant::Small).unwrap();
        assert!(registry.model_for(ModelVariant::Small).is_ok());
    }

    #[test]
    fn test_failed_load_is_retried_on_next_call() {
        let loader = CountingLoader::default();
        loader.fail_first.store(true, Ordering::SeqCst);
        let registry = ModelRegistry::new(loader);

        let err = registry.ensure_loaded(ModelVariant::Small).unwrap_err();
        assert!(matches!(err, OcrError::ModelLoad(_)));
        assert!(!registry.is_loaded(ModelVariant::Small));

        registry.ensure_loaded(ModelVariant::Small).unwrap();
        assert_eq!(registry.loader.calls.load(Ordering::SeqCst), 2);
        assert!(registry.stats(ModelVariant::Small).loaded);
    }
}
