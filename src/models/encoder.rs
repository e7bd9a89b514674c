use crate::utils::error::OcrError;
use crate::Result;
use ndarray::{Array3, Array4, Ix3};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use parking_lot::Mutex;
use std::path::Path;

/// Vision half of the encoder-decoder: pixels in, hidden states out.
pub struct VisionEncoder {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
}

impl VisionEncoder {
    pub fn new(model_path: &Path, intra_threads: usize) -> Result<Self> {
        tracing::info!("Loading vision encoder from: {}", model_path.display());

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(intra_threads)?
            .commit_from_file(model_path)
            .map_err(|e| {
                OcrError::ModelLoad(format!(
                    "Failed to load encoder {}: {}",
                    model_path.display(),
                    e
                ))
            })?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| OcrError::ModelLoad("Encoder model has no inputs".to_string()))?;

        // Prefer the canonical name; some exports only expose positional outputs.
        let output_name = session
            .outputs
            .iter()
            .find(|output| output.name == "last_hidden_state")
            .or_else(|| session.outputs.first())
            .map(|output| output.name.clone())
            .ok_or_else(|| OcrError::ModelLoad("Encoder model has no outputs".to_string()))?;

        tracing::info!("Encoder input: '{}', output: '{}'", input_name, output_name);

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
        })
    }

    /// Encode a `[1, 3, H, W]` pixel tensor into `[1, seq_len, hidden]` states.
    pub fn encode(&self, pixel_values: Array4<f32>) -> Result<Array3<f32>> {
        let shape = pixel_values.shape();
        if shape[0] != 1 || shape[1] != 3 {
            return Err(OcrError::Inference(format!(
                "Invalid pixel tensor shape {:?}, expected [1, 3, H, W]",
                shape
            )));
        }

        let input_tensor = Tensor::from_array(pixel_values)?;
        let hidden_states = {
            let mut session = self.session.lock();
            let outputs = session.run(ort::inputs![self.input_name.as_str() => input_tensor])?;

            match outputs.get(&self.output_name) {
                Some(output) => output.try_extract_array::<f32>()?.into_owned(),
                None => {
                    let available: Vec<String> = outputs.keys().map(|s| s.to_string()).collect();
                    return Err(OcrError::Inference(format!(
                        "Output '{}' not found. Available outputs: {:?}",
                        self.output_name, available
                    )));
                }
            }
        };

        let hidden_states = hidden_states.into_dimensionality::<Ix3>().map_err(|e| {
            OcrError::Inference(format!("Unexpected encoder output rank: {}", e))
        })?;

        tracing::debug!("Encoder output shape: {:?}", hidden_states.shape());
        Ok(hidden_states)
    }
}
