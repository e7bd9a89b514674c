pub mod batch;
pub mod engine;
pub mod pipeline;
pub mod types;

pub use batch::BatchCoordinator;
pub use engine::{RecognitionEngine, TextGenerator, TextRecognizer};
pub use pipeline::OcrPipeline;
pub use types::{BatchItem, BatchItemError, BatchStats, RecognitionResult};
