use serde::Serialize;
use std::fmt;

/// Capacity tier of the handwritten TrOCR checkpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelVariant {
    Small,
    Base,
}

impl ModelVariant {
    pub const ALL: [ModelVariant; 2] = [ModelVariant::Small, ModelVariant::Base];

    /// Hugging Face repository holding the ONNX export of this variant.
    pub fn repo_id(&self) -> &'static str {
        match self {
            ModelVariant::Small => "Xenova/trocr-small-handwritten",
            ModelVariant::Base => "Xenova/trocr-base-handwritten",
        }
    }

    /// Directory name used when models are served from a local directory.
    pub fn dir_name(&self) -> &'static str {
        match self {
            ModelVariant::Small => "trocr-small-handwritten",
            ModelVariant::Base => "trocr-base-handwritten",
        }
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelVariant::Small => write!(f, "small-handwritten"),
            ModelVariant::Base => write!(f, "base-handwritten"),
        }
    }
}

/// Weight precision of the loaded graphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    #[default]
    Full,
    /// Dynamically quantized int8 linear layers.
    Quantized,
}

impl Precision {
    pub fn encoder_file(&self) -> &'static str {
        match self {
            Precision::Full => "onnx/encoder_model.onnx",
            Precision::Quantized => "onnx/encoder_model_quantized.onnx",
        }
    }

    pub fn decoder_file(&self) -> &'static str {
        match self {
            Precision::Full => "onnx/decoder_model.onnx",
            Precision::Quantized => "onnx/decoder_model_quantized.onnx",
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Precision::Full => write!(f, "fp32"),
            Precision::Quantized => write!(f, "int8"),
        }
    }
}
