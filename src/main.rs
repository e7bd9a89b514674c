use anyhow::Result;
use clap::Parser;
use handwriting_ocr::{
    config::Config,
    image::{ColorMode, ResizeOrder},
    models::{ModelSource, ModelVariant, Precision},
    web::serve,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "handwriting-ocr")]
#[command(about = "Handwritten text recognition service backed by ONNX Runtime")]
struct Args {
    /// Bind host
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Bind port
    #[arg(long, env = "PORT", default_value_t = 5001)]
    port: u16,

    /// Recognition model variant
    #[arg(long, env = "OCR_MODEL_VARIANT", value_enum, default_value_t = ModelVariant::Small)]
    variant: ModelVariant,

    /// Use the int8 quantized model graphs
    #[arg(long, env = "OCR_QUANTIZED")]
    quantized: bool,

    /// Load models from this directory instead of the Hugging Face Hub
    #[arg(long, env = "OCR_MODELS_DIR")]
    models_dir: Option<PathBuf>,

    /// Hugging Face Hub cache directory
    #[arg(long, env = "OCR_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Load the model at startup instead of on the first request
    #[arg(long, env = "OCR_EAGER_LOAD")]
    eager: bool,

    /// Longest image side before downscaling
    #[arg(long, env = "OCR_MAX_IMAGE_SIDE", default_value_t = 1000)]
    max_image_side: u32,

    #[arg(long, env = "OCR_COLOR_MODE", value_enum, default_value_t = ColorMode::Rgb)]
    color_mode: ColorMode,

    #[arg(long, env = "OCR_RESIZE_ORDER", value_enum, default_value_t = ResizeOrder::ResizeThenConvert)]
    resize_order: ResizeOrder,

    /// Upload size ceiling in megabytes
    #[arg(long, env = "OCR_MAX_UPLOAD_MB", default_value_t = 16)]
    max_upload_mb: usize,

    /// Workbook that accumulates saved rows
    #[arg(long, env = "OCR_EXPORT_PATH", default_value = "extracted_words.xlsx")]
    export_path: PathBuf,

    /// ONNX Runtime intra-op threads
    #[arg(long, env = "OCR_THREADS")]
    threads: Option<usize>,

    /// Generation cap per image
    #[arg(long, env = "OCR_MAX_NEW_TOKENS")]
    max_new_tokens: Option<usize>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn into_config(self) -> Config {
        let mut config = Config::default().with_upload_limit(self.max_upload_mb * 1024 * 1024);

        config.server.host = self.host;
        config.server.port = self.port;

        config.model.variant = self.variant;
        config.model.eager = self.eager;
        if self.quantized {
            config.model.precision = Precision::Quantized;
        }
        config.model.source = match self.models_dir {
            Some(root) => ModelSource::Local { root },
            None => ModelSource::Hub {
                cache_dir: self.cache_dir,
            },
        };
        if let Some(threads) = self.threads {
            config.model.intra_threads = threads;
        }
        if let Some(max_new_tokens) = self.max_new_tokens {
            config.model.max_new_tokens = max_new_tokens;
        }

        config.normalize.max_side = self.max_image_side;
        config.normalize.color_mode = self.color_mode;
        config.normalize.resize_order = self.resize_order;

        config.export.path = self.export_path;

        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&args.log_level))
        )
        .with_target(false)
        .init();

    tracing::info!("Starting handwriting OCR service...");

    let config = args.into_config();
    tracing::info!("Export store: {}", config.export.path.display());

    serve(config).await?;

    Ok(())
}
