use serde::Serialize;
use std::time::Duration;

/// Text recognized from one image, with how long it took.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionResult {
    pub text: String,
    pub elapsed: Duration,
}

impl RecognitionResult {
    pub fn new(text: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            text: text.into(),
            elapsed,
        }
    }
}

/// Outcome of one batch item; failures stay local to their slot.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchItem {
    Recognized(RecognitionResult),
    Failed { error: String },
}

impl BatchItem {
    pub fn text(&self) -> Option<&str> {
        match self {
            BatchItem::Recognized(result) => Some(&result.text),
            BatchItem::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            BatchItem::Recognized(_) => None,
            BatchItem::Failed { error } => Some(error),
        }
    }
}

/// Per-item failure reported alongside batch texts.
#[derive(Debug, Clone, Serialize)]
pub struct BatchItemError {
    pub index: usize,
    pub error: String,
}

/// Batch statistics for logging.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchStats {
    pub total: usize,
    pub recognized: usize,
    pub failed: usize,
    pub total_time_ms: u64,
}

impl BatchStats {
    pub fn from_items(items: &[BatchItem], total_time: Duration) -> Self {
        let recognized = items.iter().filter(|item| item.text().is_some()).count();
        Self {
            total: items.len(),
            recognized,
            failed: items.len() - recognized,
            total_time_ms: total_time.as_millis() as u64,
        }
    }
}
