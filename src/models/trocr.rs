use crate::config::ModelConfig;
use crate::image::NormalizedImage;
use crate::models::{
    GenerationConfig, ImageProcessor, ModelLoader, ModelSource, ModelVariant, Precision,
    TextDecoder, VisionEncoder,
};
use crate::ocr::TextGenerator;
use crate::utils::error::OcrError;
use crate::Result;
use std::path::Path;
use tokenizers::Tokenizer;

/// A loaded TrOCR encoder-decoder with its processor and tokenizer. Immutable after load.
pub struct RecognitionModel {
    variant: ModelVariant,
    precision: Precision,
    processor: ImageProcessor,
    tokenizer: Tokenizer,
    encoder: VisionEncoder,
    decoder: TextDecoder,
    is_ready: bool,
}

impl std::fmt::Debug for RecognitionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecognitionModel")
            .field("variant", &self.variant)
            .field("precision", &self.precision)
            .field("input_size", &self.processor.input_size())
            .field("is_ready", &self.is_ready)
            .finish_non_exhaustive()
    }
}

impl RecognitionModel {
    pub fn variant(&self) -> ModelVariant {
        self.variant
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    pub fn is_ready(&self) -> bool {
        self.is_ready
    }
}

impl TextGenerator for RecognitionModel {
    fn generate_text(&self, image: &NormalizedImage) -> Result<String> {
        let pixel_values = self.processor.extract(image)?;
        let hidden_states = self.encoder.encode(pixel_values)?;
        let token_ids = self.decoder.generate(&hidden_states)?;

        let text = self
            .tokenizer
            .decode(&token_ids, true)
            .map_err(|e| OcrError::Inference(format!("Token decoding failed: {}", e)))?;

        tracing::debug!("Decoded {} tokens: '{}'", token_ids.len(), text);
        Ok(text.trim().to_string())
    }
}

/// Acquires TrOCR artifacts from the configured source and builds ONNX sessions.
pub struct OnnxModelLoader {
    source: ModelSource,
    precision: Precision,
    intra_threads: usize,
    max_new_tokens: usize,
}

impl OnnxModelLoader {
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            source: config.source.clone(),
            precision: config.precision,
            intra_threads: config.intra_threads,
            max_new_tokens: config.max_new_tokens,
        }
    }
}

impl ModelLoader for OnnxModelLoader {
    type Model = RecognitionModel;

    fn load(&self, variant: ModelVariant) -> Result<RecognitionModel> {
        let files = self.source.acquire(variant, self.precision)?;

        let processor = ImageProcessor::from_file(&files.preprocessor_config)?;
        let tokenizer = load_tokenizer(&files.tokenizer)?;
        let generation = GenerationConfig::from_file(&files.config, self.max_new_tokens)?;

        let encoder = VisionEncoder::new(&files.encoder, self.intra_threads)?;
        let decoder = TextDecoder::new(&files.decoder, self.intra_threads, generation)?;

        tracing::info!(
            "Loaded {} ({}): input {:?}, vocab {} tokens",
            variant,
            self.precision,
            processor.input_size(),
            tokenizer.get_vocab_size(true)
        );

        Ok(RecognitionModel {
            variant,
            precision: self.precision,
            processor,
            tokenizer,
            encoder,
            decoder,
            is_ready: true,
        })
    }

    fn precision(&self) -> Precision {
        self.precision
    }
}

fn load_tokenizer(path: &Path) -> Result<Tokenizer> {
    Tokenizer::from_file(path).map_err(|e| {
        OcrError::ModelLoad(format!("Failed to load tokenizer {}: {}", path.display(), e))
    })
}
