use crate::{
    ocr::{pipeline::run_blocking, BatchItem, BatchStats, OcrPipeline},
    utils::error::OcrError,
    Result,
};
use axum::body::Bytes;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

/// Runs many uploads through the single-image pipeline, preserving input order.
#[derive(Clone)]
pub struct BatchCoordinator {
    pipeline: OcrPipeline,
}

impl BatchCoordinator {
    pub fn new(pipeline: OcrPipeline) -> Self {
        Self { pipeline }
    }

    /// One output per input, in the same order. Only an empty input set or an
    /// unavailable model fails the whole batch.
    pub async fn extract_many(&self, raw_images: Vec<Bytes>) -> Result<Vec<BatchItem>> {
        if raw_images.is_empty() {
            return Err(OcrError::NoFilesProvided);
        }

        let pipeline = self.pipeline.clone();
        run_blocking(move || Self::extract_blocking(&pipeline, &raw_images)).await
    }

    fn extract_blocking(pipeline: &OcrPipeline, raw_images: &[Bytes]) -> Result<Vec<BatchItem>> {
        let start_time = Instant::now();
        pipeline.recognizer().warm_up()?;

        let mut items = Vec::with_capacity(raw_images.len());
        for (i, bytes) in raw_images.iter().enumerate() {
            tracing::debug!("Processing file {} of {}", i + 1, raw_images.len());

            // A panic stays in its own slot; the remaining files still run.
            let outcome = catch_unwind(AssertUnwindSafe(|| pipeline.process_blocking(bytes)))
                .unwrap_or_else(|panic| {
                    Err(OcrError::Inference(format!(
                        "recognition task panicked: {}",
                        panic_message(panic.as_ref())
                    )))
                });

            let item = match outcome {
                Ok(result) => BatchItem::Recognized(result),
                Err(e) => {
                    tracing::warn!("Batch item {} failed: {}", i, e);
                    BatchItem::Failed { error: e.to_string() }
                }
            };
            items.push(item);
        }

        let stats = BatchStats::from_items(&items, start_time.elapsed());
        tracing::info!(
            "Batch OCR completed: files={}, recognized={}, failed={}, time={}ms",
            stats.total,
            stats.recognized,
            stats.failed,
            stats.total_time_ms
        );

        Ok(items)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
