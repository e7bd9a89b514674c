use crate::utils::error::OcrError;
use crate::Result;
use ndarray::{Array2, Array3, ArrayView1, Axis, Ix3};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use parking_lot::Mutex;
use serde::Deserialize;
use std::path::Path;

/// Default cap on generated tokens per image.
pub const DEFAULT_MAX_NEW_TOKENS: usize = 64;

/// Token ids that drive greedy decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationConfig {
    pub decoder_start_token_id: u32,
    pub eos_token_id: u32,
    pub max_new_tokens: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        // TrOCR checkpoints start decoding from </s> (id 2).
        Self {
            decoder_start_token_id: 2,
            eos_token_id: 2,
            max_new_tokens: DEFAULT_MAX_NEW_TOKENS,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawModelConfig {
    decoder_start_token_id: Option<u32>,
    eos_token_id: Option<u32>,
    #[serde(default)]
    decoder: Option<RawDecoderConfig>,
}

#[derive(Debug, Deserialize)]
struct RawDecoderConfig {
    decoder_start_token_id: Option<u32>,
    eos_token_id: Option<u32>,
}

impl GenerationConfig {
    /// Read special token ids from a model `config.json`, falling back to TrOCR defaults.
    pub fn from_file(path: &Path, max_new_tokens: usize) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            OcrError::ModelLoad(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content, max_new_tokens)
            .map_err(|e| OcrError::ModelLoad(format!("Malformed {}: {}", path.display(), e)))
    }

    pub fn from_json(content: &str, max_new_tokens: usize) -> std::result::Result<Self, serde_json::Error> {
        let raw: RawModelConfig = serde_json::from_str(content)?;
        let defaults = Self::default();
        let decoder = raw.decoder.as_ref();

        Ok(Self {
            decoder_start_token_id: raw
                .decoder_start_token_id
                .or_else(|| decoder.and_then(|d| d.decoder_start_token_id))
                .unwrap_or(defaults.decoder_start_token_id),
            eos_token_id: raw
                .eos_token_id
                .or_else(|| decoder.and_then(|d| d.eos_token_id))
                .unwrap_or(defaults.eos_token_id),
            max_new_tokens: max_new_tokens.max(1),
        })
    }
}

/// Text half of the encoder-decoder: runs greedy autoregressive generation.
pub struct TextDecoder {
    session: Mutex<Session>,
    logits_name: String,
    needs_attention_mask: bool,
    generation: GenerationConfig,
}

impl TextDecoder {
    pub fn new(model_path: &Path, intra_threads: usize, generation: GenerationConfig) -> Result<Self> {
        tracing::info!("Loading text decoder from: {}", model_path.display());

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(intra_threads)?
            .commit_from_file(model_path)
            .map_err(|e| {
                OcrError::ModelLoad(format!(
                    "Failed to load decoder {}: {}",
                    model_path.display(),
                    e
                ))
            })?;

        let input_names: Vec<&str> = session.inputs.iter().map(|i| i.name.as_str()).collect();
        tracing::debug!("Decoder inputs: {:?}", input_names);

        for required in ["input_ids", "encoder_hidden_states"] {
            if !input_names.contains(&required) {
                return Err(OcrError::ModelLoad(format!(
                    "Decoder model is missing input '{}' (found {:?})",
                    required, input_names
                )));
            }
        }
        let needs_attention_mask = input_names.contains(&"encoder_attention_mask");

        let logits_name = session
            .outputs
            .iter()
            .find(|output| output.name == "logits")
            .or_else(|| session.outputs.first())
            .map(|output| output.name.clone())
            .ok_or_else(|| OcrError::ModelLoad("Decoder model has no outputs".to_string()))?;

        Ok(Self {
            session: Mutex::new(session),
            logits_name,
            needs_attention_mask,
            generation,
        })
    }

    /// Generate token ids for one image, excluding the start token and EOS.
    pub fn generate(&self, encoder_hidden_states: &Array3<f32>) -> Result<Vec<u32>> {
        let mut tokens = vec![self.generation.decoder_start_token_id];

        for step in 0..self.generation.max_new_tokens {
            let logits = self.forward(encoder_hidden_states, &tokens)?;
            let positions = logits.index_axis(Axis(0), 0);
            let last = positions.index_axis(Axis(0), positions.len_of(Axis(0)) - 1);

            let next_token = argmax(last).ok_or_else(|| {
                OcrError::Inference("Decoder produced empty logits".to_string())
            })?;

            if next_token == self.generation.eos_token_id {
                tracing::debug!("Generation stopped at EOS after {} steps", step + 1);
                break;
            }
            tokens.push(next_token);
        }

        tokens.remove(0);
        Ok(tokens)
    }

    /// Single decoder pass over the full prefix; returns `[1, seq, vocab]` logits.
    fn forward(&self, encoder_hidden_states: &Array3<f32>, tokens: &[u32]) -> Result<Array3<f32>> {
        let input_ids = Array2::from_shape_vec(
            (1, tokens.len()),
            tokens.iter().map(|&t| t as i64).collect(),
        )
        .map_err(|e| OcrError::Inference(format!("Failed to build input_ids: {}", e)))?;

        let mut inputs = ort::inputs![
            "input_ids" => Tensor::from_array(input_ids)?,
            "encoder_hidden_states" => Tensor::from_array(encoder_hidden_states.clone())?
        ];
        if self.needs_attention_mask {
            let mask = Array2::<i64>::ones((1, encoder_hidden_states.len_of(Axis(1))));
            inputs.push(("encoder_attention_mask".into(), Tensor::from_array(mask)?.into()));
        }

        let logits = {
            let mut session = self.session.lock();
            let outputs = session.run(inputs)?;
            match outputs.get(self.logits_name.as_str()) {
                Some(output) => output.try_extract_array::<f32>()?.into_owned(),
                None => {
                    return Err(OcrError::Inference(format!(
                        "Output '{}' not found in decoder outputs",
                        self.logits_name
                    )));
                }
            }
        };

        let logits = logits.into_dimensionality::<Ix3>().map_err(|e| {
            OcrError::Inference(format!("Unexpected decoder output rank: {}", e))
        })?;
        if logits.len_of(Axis(1)) == 0 {
            return Err(OcrError::Inference("Decoder returned no positions".to_string()));
        }

        Ok(logits)
    }
}

/// Greedy pick: index of the largest logit.
pub(crate) fn argmax(logits: ArrayView1<f32>) -> Option<u32> {
    logits
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(idx, _)| idx as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_argmax_picks_largest_logit() {
        let logits = array![0.1f32, 2.5, -1.0, 2.4];
        assert_eq!(argmax(logits.view()), Some(1));
    }

    #[test]
    fn test_argmax_empty() {
        let logits = ndarray::Array1::<f32>::zeros(0);
        assert_eq!(argmax(logits.view()), None);
    }

    #[test]
    fn test_generation_config_reads_top_level_ids() {
        let json = r#"{"decoder_start_token_id": 2, "eos_token_id": 2, "pad_token_id": 1}"#;
        let config = GenerationConfig::from_json(json, 32).unwrap();
        assert_eq!(config.decoder_start_token_id, 2);
        assert_eq!(config.max_new_tokens, 32);
    }

    #[test]
    fn test_generation_config_falls_back_to_decoder_section() {
        let json = r#"{"decoder": {"decoder_start_token_id": 0, "eos_token_id": 7, "pad_token_id": 5}}"#;
        let config = GenerationConfig::from_json(json, 0).unwrap();
        assert_eq!(config.decoder_start_token_id, 0);
        assert_eq!(config.eos_token_id, 7);
        assert_eq!(config.max_new_tokens, 1);
    }

    #[test]
    fn test_generation_config_defaults_when_absent() {
        let config = GenerationConfig::from_json("{}", DEFAULT_MAX_NEW_TOKENS).unwrap();
        assert_eq!(config, GenerationConfig::default());
    }
}
