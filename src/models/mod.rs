pub mod decoder;
pub mod encoder;
pub mod processor;
pub mod registry;
pub mod source;
pub mod trocr;
pub mod variant;

pub use decoder::{GenerationConfig, TextDecoder};
pub use encoder::VisionEncoder;
pub use processor::ImageProcessor;
pub use registry::{ModelLoader, ModelRegistry, ModelStats};
pub use source::{ModelFiles, ModelSource};
pub use trocr::{OnnxModelLoader, RecognitionModel};
pub use variant::{ModelVariant, Precision};
