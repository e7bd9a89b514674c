use crate::image::NormalizedImage;
use crate::models::{ModelLoader, ModelRegistry, ModelStats, ModelVariant};
use crate::ocr::RecognitionResult;
use crate::Result;
use std::sync::Arc;
use std::time::Instant;

/// A loaded model that can turn a normalized image into text.
pub trait TextGenerator: Send + Sync {
    fn generate_text(&self, image: &NormalizedImage) -> Result<String>;
}

/// What the pipeline, batch coordinator and HTTP layer depend on.
pub trait TextRecognizer: Send + Sync {
    /// Make sure the backing model is available. Called before batch work starts.
    fn warm_up(&self) -> Result<()> {
        Ok(())
    }

    fn recognize(&self, image: &NormalizedImage) -> Result<RecognitionResult>;

    fn stats(&self) -> ModelStats;
}

/// Runs recognition against the registry's model for one configured variant.
pub struct RecognitionEngine<L: ModelLoader> {
    registry: Arc<ModelRegistry<L>>,
    variant: ModelVariant,
}

impl<L> RecognitionEngine<L>
where
    L: ModelLoader,
    L::Model: TextGenerator,
{
    pub fn new(registry: Arc<ModelRegistry<L>>, variant: ModelVariant) -> Self {
        Self { registry, variant }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry<L>> {
        &self.registry
    }

    pub fn variant(&self) -> ModelVariant {
        self.variant
    }

    /// Run one image through `model`. Any failure comes back as an inference error.
    pub fn infer(model: &L::Model, image: &NormalizedImage) -> Result<RecognitionResult> {
        let start = Instant::now();
        let text = model
            .generate_text(image)
            .map_err(|e| e.into_inference())?;
        let elapsed = start.elapsed();

        tracing::debug!(
            "Recognized {}x{} image in {:.3}s: '{}'",
            image.dimensions().0,
            image.dimensions().1,
            elapsed.as_secs_f32(),
            text
        );

        Ok(RecognitionResult::new(text, elapsed))
    }
}

impl<L> TextRecognizer for RecognitionEngine<L>
where
    L: ModelLoader,
    L::Model: TextGenerator,
{
    fn warm_up(&self) -> Result<()> {
        self.registry.ensure_loaded(self.variant).map(|_| ())
    }

    fn recognize(&self, image: &NormalizedImage) -> Result<RecognitionResult> {
        let model = self.registry.ensure_loaded(self.variant)?;
        Self::infer(&model, image)
    }

    fn stats(&self) -> ModelStats {
        self.registry.stats(self.variant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{ImageNormalizer, NormalizeOptions};
    use crate::utils::error::OcrError;
    use image::{DynamicImage, RgbImage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoModel;

    impl TextGenerator for EchoModel {
        fn generate_text(&self, image: &NormalizedImage) -> Result<String> {
            let (w, h) = image.dimensions();
            if w == 1 {
                return Err(OcrError::Internal("shape mismatch".to_string()));
            }
            Ok(format!("{}x{}", w, h))
        }
    }

    #[derive(Default)]
    struct EchoLoader {
        calls: AtomicUsize,
    }

    impl ModelLoader for EchoLoader {
        type Model = EchoModel;

        fn load(&self, _variant: ModelVariant) -> Result<EchoModel> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(EchoModel)
        }
    }

    fn image(width: u32, height: u32) -> NormalizedImage {
        ImageNormalizer::new(NormalizeOptions::default())
            .normalize_image(DynamicImage::ImageRgb8(RgbImage::new(width, height)))
    }

    #[test]
    fn test_recognize_loads_lazily_and_reuses_model() {
        let registry = Arc::new(ModelRegistry::new(EchoLoader::default()));
        let engine = RecognitionEngine::new(Arc::clone(&registry), ModelVariant::Small);
        assert!(!engine.stats().loaded);

        assert_eq!(engine.recognize(&image(20, 10)).unwrap().text, "20x10");
        assert_eq!(engine.recognize(&image(30, 10)).unwrap().text, "30x10");
        assert_eq!(registry.load_attempts(), 1);
        assert!(engine.stats().loaded);
    }

    #[test]
    fn test_generation_failure_becomes_inference_error() {
        let registry = Arc::new(ModelRegistry::new(EchoLoader::default()));
        let engine = RecognitionEngine::new(registry, ModelVariant::Base);

        let err = engine.recognize(&image(1, 10)).unwrap_err();
        assert!(matches!(err, OcrError::Inference(ref msg) if msg.contains("shape mismatch")));
    }
}
