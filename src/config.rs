use crate::export::ExportConfig;
use crate::image::{ColorMode, NormalizeOptions};
use crate::models::{decoder::DEFAULT_MAX_NEW_TOKENS, ModelSource, ModelVariant, Precision};
use crate::utils::error::OcrError;
use crate::Result;
use std::net::SocketAddr;

#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listener settings
    pub server: ServerConfig,

    /// Recognition model selection and runtime settings
    pub model: ModelConfig,

    /// Upload decoding and normalization
    pub normalize: NormalizeOptions,

    /// Append-only result store
    pub export: ExportConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,

    pub port: u16,

    /// Maximum request body size in bytes
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub variant: ModelVariant,

    pub precision: Precision,

    pub source: ModelSource,

    /// Load at startup instead of on the first request.
    pub eager: bool,

    /// ONNX Runtime intra-op threads
    pub intra_threads: usize,

    pub max_new_tokens: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5001,
            max_upload_bytes: 16 * 1024 * 1024, // 16MB
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        let cpu_cores = num_cpus::get();
        Self {
            variant: ModelVariant::Small,
            precision: Precision::Full,
            source: ModelSource::default(),
            eager: false,
            intra_threads: (cpu_cores * 3 / 4).max(1), // 75% of available cores
            max_new_tokens: DEFAULT_MAX_NEW_TOKENS,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let server = ServerConfig::default();
        let normalize = NormalizeOptions {
            max_bytes: server.max_upload_bytes,
            ..NormalizeOptions::default()
        };

        Self {
            server,
            model: ModelConfig::default(),
            normalize,
            export: ExportConfig::default(),
        }
    }
}

impl Config {
    /// Apply an upload ceiling to both the HTTP layer and the image decoder.
    pub fn with_upload_limit(mut self, max_upload_bytes: usize) -> Self {
        self.server.max_upload_bytes = max_upload_bytes;
        self.normalize.max_bytes = max_upload_bytes;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.max_upload_bytes == 0 {
            return Err(OcrError::Config("Upload limit must be positive".to_string()));
        }
        if self.normalize.max_side == 0 {
            return Err(OcrError::Config("Maximum image side must be positive".to_string()));
        }
        if self.model.intra_threads == 0 {
            return Err(OcrError::Config("Intra-op thread count must be positive".to_string()));
        }
        if self.model.max_new_tokens == 0 {
            return Err(OcrError::Config("max_new_tokens must be positive".to_string()));
        }
        if self.export.sheet_name.trim().is_empty() {
            return Err(OcrError::Config("Export sheet name must not be empty".to_string()));
        }
        if self.normalize.color_mode == ColorMode::Luma {
            tracing::info!("Grayscale normalization enabled; channels are replicated for the encoder");
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let addr = format!("{}:{}", self.server.host, self.server.port);
        addr.parse().map_err(|e| {
            OcrError::Config(format!("Invalid bind address {}: {}", addr, e))
        })
    }

    /// Upload ceiling in whole megabytes, as shown to clients.
    pub fn max_upload_mb(&self) -> usize {
        self.server.max_upload_bytes / (1024 * 1024)
    }
}
