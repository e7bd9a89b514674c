use crate::{
    image::ImageNormalizer,
    ocr::{RecognitionResult, TextRecognizer},
    utils::error::OcrError,
    Result,
};
use axum::body::Bytes;
use std::sync::Arc;
use std::time::Instant;

/// Single-image flow: normalize, then recognize, off the async executor.
#[derive(Clone)]
pub struct OcrPipeline {
    normalizer: ImageNormalizer,
    recognizer: Arc<dyn TextRecognizer>,
}

impl OcrPipeline {
    pub fn new(normalizer: ImageNormalizer, recognizer: Arc<dyn TextRecognizer>) -> Self {
        Self {
            normalizer,
            recognizer,
        }
    }

    pub fn normalizer(&self) -> &ImageNormalizer {
        &self.normalizer
    }

    pub fn recognizer(&self) -> &Arc<dyn TextRecognizer> {
        &self.recognizer
    }

    /// Process an uploaded image end to end.
    pub async fn process_bytes(&self, bytes: Bytes) -> Result<RecognitionResult> {
        let pipeline = self.clone();
        run_blocking(move || pipeline.process_blocking(&bytes)).await
    }

    /// Blocking core shared with the batch coordinator.
    pub fn process_blocking(&self, bytes: &[u8]) -> Result<RecognitionResult> {
        let start_time = Instant::now();

        let image = self.normalizer.normalize(bytes)?;
        let preprocessing_time = start_time.elapsed();

        let result = self.recognizer.recognize(&image)?;

        tracing::info!(
            "OCR completed: {}x{} image, {} chars, preprocess={:.3}s, total={:.3}s",
            image.dimensions().0,
            image.dimensions().1,
            result.text.chars().count(),
            preprocessing_time.as_secs_f32(),
            start_time.elapsed().as_secs_f32()
        );

        Ok(result)
    }
}

/// Run CPU-bound work on the blocking pool. A panic there is reported as an
/// inference failure instead of taking the worker down.
pub(crate) async fn run_blocking<T, F>(task: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task).await.map_err(|e| {
        if e.is_panic() {
            OcrError::Inference(format!("recognition task panicked: {}", e))
        } else {
            OcrError::Internal(format!("recognition task cancelled: {}", e))
        }
    })?
}
