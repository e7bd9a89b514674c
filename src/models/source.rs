use crate::models::{ModelVariant, Precision};
use crate::utils::error::OcrError;
use crate::Result;
use hf_hub::api::sync::ApiBuilder;
use std::path::{Path, PathBuf};

/// Where pretrained artifacts are acquired from.
#[derive(Debug, Clone)]
pub enum ModelSource {
    /// Download from the Hugging Face hub into a local cache.
    Hub { cache_dir: Option<PathBuf> },
    /// Read a pre-populated directory laid out as `<root>/<variant dir>/...`.
    Local { root: PathBuf },
}

impl Default for ModelSource {
    fn default() -> Self {
        ModelSource::Hub { cache_dir: None }
    }
}

/// Resolved on-disk paths of every file a recognition model needs.
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub config: PathBuf,
    pub preprocessor_config: PathBuf,
    pub tokenizer: PathBuf,
    pub encoder: PathBuf,
    pub decoder: PathBuf,
}

impl ModelSource {
    /// Acquire all model files for `variant`, downloading them if needed.
    pub fn acquire(&self, variant: ModelVariant, precision: Precision) -> Result<ModelFiles> {
        match self {
            ModelSource::Hub { cache_dir } => Self::acquire_from_hub(cache_dir.as_deref(), variant, precision),
            ModelSource::Local { root } => Self::acquire_from_dir(&root.join(variant.dir_name()), precision),
        }
    }

    fn acquire_from_hub(
        cache_dir: Option<&Path>,
        variant: ModelVariant,
        precision: Precision,
    ) -> Result<ModelFiles> {
        let mut builder = ApiBuilder::new().with_progress(false);
        if let Some(dir) = cache_dir {
            builder = builder.with_cache_dir(dir.to_path_buf());
        }
        let api = builder
            .build()
            .map_err(|e| OcrError::ModelLoad(format!("Failed to create hub client: {}", e)))?;

        let repo = api.model(variant.repo_id().to_string());
        tracing::info!("Acquiring {} ({}) from {}", variant, precision, variant.repo_id());

        let fetch = |file: &str| -> Result<PathBuf> {
            tracing::debug!("Fetching {}/{}", variant.repo_id(), file);
            repo.get(file).map_err(|e| {
                OcrError::ModelLoad(format!("Failed to fetch {} from {}: {}", file, variant.repo_id(), e))
            })
        };

        Ok(ModelFiles {
            config: fetch("config.json")?,
            preprocessor_config: fetch("preprocessor_config.json")?,
            tokenizer: fetch("tokenizer.json")?,
            encoder: fetch(precision.encoder_file())?,
            decoder: fetch(precision.decoder_file())?,
        })
    }

    fn acquire_from_dir(dir: &Path, precision: Precision) -> Result<ModelFiles> {
        tracing::info!("Loading model files from: {}", dir.display());

        let locate = |file: &str| -> Result<PathBuf> {
            let path = dir.join(file);
            if path.is_file() {
                Ok(path)
            } else {
                Err(OcrError::ModelLoad(format!("Model file not found: {}", path.display())))
            }
        };

        Ok(ModelFiles {
            config: locate("config.json")?,
            preprocessor_config: locate("preprocessor_config.json")?,
            tokenizer: locate("tokenizer.json")?,
            encoder: locate(precision.encoder_file())?,
            decoder: locate(precision.decoder_file())?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn populate(dir: &Path, precision: Precision) {
        fs::create_dir_all(dir.join("onnx")).unwrap();
        for file in [
            "config.json",
            "preprocessor_config.json",
            "tokenizer.json",
            precision.encoder_file(),
            precision.decoder_file(),
        ] {
            fs::write(dir.join(file), b"{}").unwrap();
        }
    }

    #[test]
    fn test_local_source_resolves_variant_directory() {
        let root = tempfile::tempdir().unwrap();
        populate(&root.path().join(ModelVariant::Small.dir_name()), Precision::Quantized);

        let source = ModelSource::Local { root: root.path().to_path_buf() };
        let files = source.acquire(ModelVariant::Small, Precision::Quantized).unwrap();
        assert!(files.encoder.ends_with("onnx/encoder_model_quantized.onnx"));
        assert!(files.tokenizer.is_file());
    }

    #[test]
    fn test_local_source_missing_file_is_model_load_error() {
        let root = tempfile::tempdir().unwrap();
        populate(&root.path().join(ModelVariant::Base.dir_name()), Precision::Quantized);

        let source = ModelSource::Local { root: root.path().to_path_buf() };
        // Only quantized graphs exist, so full precision must fail.
        let err = source.acquire(ModelVariant::Base, Precision::Full).unwrap_err();
        assert!(matches!(err, OcrError::ModelLoad(ref msg) if msg.contains("encoder_model.onnx")));
    }
}
