pub mod extractors;
pub mod handlers;
pub mod middleware;

use crate::{
    export::ExportAccumulator,
    image::ImageNormalizer,
    models::{ModelRegistry, OnnxModelLoader},
    ocr::{pipeline::run_blocking, BatchCoordinator, OcrPipeline, RecognitionEngine, TextRecognizer},
    utils::error::OcrError,
    Config, Result,
};
use axum::{
    extract::{DefaultBodyLimit, FromRef},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use extractors::UploadLimit;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer};

/// Shared request state. Everything here is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pipeline: OcrPipeline,
    pub batch: BatchCoordinator,
    pub exporter: Arc<ExportAccumulator>,
}

impl AppState {
    pub fn new(config: Config, recognizer: Arc<dyn TextRecognizer>) -> Self {
        let pipeline = OcrPipeline::new(ImageNormalizer::new(config.normalize.clone()), recognizer);
        let batch = BatchCoordinator::new(pipeline.clone());
        let exporter = Arc::new(ExportAccumulator::new(config.export.clone()));

        Self {
            config: Arc::new(config),
            pipeline,
            batch,
            exporter,
        }
    }
}

impl FromRef<AppState> for UploadLimit {
    fn from_ref(state: &AppState) -> Self {
        UploadLimit(state.config.server.max_upload_bytes)
    }
}

pub async fn serve(config: Config) -> Result<()> {
    config.validate()?;
    let addr = config.bind_addr()?;

    let registry = Arc::new(ModelRegistry::new(OnnxModelLoader::new(&config.model)));
    let engine = Arc::new(RecognitionEngine::new(Arc::clone(&registry), config.model.variant));

    if config.model.eager {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            // A failed startup load is retried by the first request.
            if let Err(e) = run_blocking(move || engine.warm_up()).await {
                tracing::warn!("Eager model load failed: {}", e);
            }
        });
    }

    tracing::info!(
        "Model: {} ({}), intra_threads={}",
        config.model.variant,
        config.model.precision,
        config.model.intra_threads
    );

    let app = create_app(AppState::new(config, engine));

    tracing::info!("Server starting on http://{}", addr);
    tracing::info!("API endpoints:");
    tracing::info!("  POST /extract        - Single image upload");
    tracing::info!("  POST /batch_extract  - Multiple image upload");
    tracing::info!("  POST /save_to_excel  - Append words and download the workbook");
    tracing::info!("  GET  /health         - Health check");
    tracing::info!("  GET  /api/info       - Service information");

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| OcrError::Internal(format!("Failed to bind to address {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| OcrError::Internal(format!("Server failed to start: {}", e)))?;

    Ok(())
}

pub fn create_app(state: AppState) -> Router {
    let limit = state.config.server.max_upload_bytes;

    Router::new()
        .route("/extract", post(handlers::extract_handler))
        .route("/batch_extract", post(handlers::batch_extract_handler))
        .route("/save_to_excel", post(handlers::save_to_excel_handler))
        .route("/health", get(handlers::health_handler))
        .route("/api/info", get(handlers::info_handler))
        // The tower-http layer owns the byte ceiling for streamed bodies.
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(limit))
        .layer(from_fn_with_state(limit, middleware::enforce_upload_limit))
        .layer(from_fn(middleware::request_logging))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
