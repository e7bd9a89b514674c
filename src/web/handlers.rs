use crate::{
    ocr::{pipeline::run_blocking, BatchItemError},
    utils::error::OcrError,
    web::{
        extractors::{RequestId, SaveWordsRequest, ValidatedJson},
        AppState,
    },
    Result,
};
use axum::{
    body::Bytes,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct BatchExtractResponse {
    /// One slot per uploaded file, `null` where recognition failed.
    pub texts: Vec<Option<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<BatchItemError>,
}

/// `POST /extract`: recognize the single multipart `file` part.
pub async fn extract_handler(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<ExtractResponse>> {
    let start_time = Instant::now();
    let limit = state.config.server.max_upload_bytes;

    // A request that is not multipart cannot carry a file.
    let mut multipart = multipart.map_err(|_| OcrError::NoFileProvided)?;
    let files = read_parts(&mut multipart, "file", limit).await?;
    if files.len() > 1 {
        tracing::debug!("Ignoring {} extra file parts", files.len() - 1);
    }
    let image_data = files.into_iter().next().ok_or(OcrError::NoFileProvided)?;

    tracing::info!(
        "Processing extract request: request_id={}, bytes={}",
        request_id,
        image_data.len()
    );

    let result = state.pipeline.process_bytes(image_data).await?;

    tracing::info!(
        "Extract completed: request_id={}, chars={}, time={:.3}s",
        request_id,
        result.text.chars().count(),
        start_time.elapsed().as_secs_f32()
    );

    Ok(Json(ExtractResponse { text: result.text }))
}

/// `POST /batch_extract`: recognize every multipart `files` part in order.
pub async fn batch_extract_handler(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<BatchExtractResponse>> {
    let limit = state.config.server.max_upload_bytes;

    let mut multipart = multipart.map_err(|_| OcrError::NoFilesProvided)?;
    let files = read_parts(&mut multipart, "files", limit).await?;

    tracing::info!(
        "Processing batch request: request_id={}, files={}",
        request_id,
        files.len()
    );

    let items = state.batch.extract_many(files).await?;

    let mut texts = Vec::with_capacity(items.len());
    let mut errors = Vec::new();
    for (index, item) in items.into_iter().enumerate() {
        texts.push(item.text().map(str::to_string));
        if let Some(error) = item.error() {
            errors.push(BatchItemError {
                index,
                error: error.to_string(),
            });
        }
    }

    Ok(Json(BatchExtractResponse { texts, errors }))
}

/// `POST /save_to_excel`: append one row and download the whole store.
pub async fn save_to_excel_handler(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    ValidatedJson(request): ValidatedJson<SaveWordsRequest>,
) -> Result<impl IntoResponse> {
    let words = request.into_words();
    tracing::info!(
        "Saving words: request_id={}, words={}",
        request_id,
        words.len()
    );

    let exporter = Arc::clone(&state.exporter);
    let bytes = run_blocking(move || exporter.append_and_export(&words)).await?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        state.exporter.config().download_name
    );

    Ok((
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

/// Health check endpoint
pub async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let stats = state.pipeline.recognizer().stats();
    Json(json!({
        "status": "healthy",
        "model_loaded": stats.loaded,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Service information endpoint
pub async fn info_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let stats = state.pipeline.recognizer().stats();
    let config = &state.config;
    Json(json!({
        "service": "Handwriting OCR Service",
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
        "models": stats,
        "limits": {
            "max_upload_mb": config.max_upload_mb(),
            "max_image_side": config.normalize.max_side,
        },
        "normalization": state.pipeline.normalizer().options(),
        "export": {
            "sheet_name": config.export.sheet_name,
            "download_name": config.export.download_name,
        },
    }))
}

/// Collect the non-empty parts named `field_name`, in upload order.
async fn read_parts(multipart: &mut Multipart, field_name: &str, limit: usize) -> Result<Vec<Bytes>> {
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        let name = field.name().unwrap_or("unknown").to_string();
        if name != field_name {
            tracing::debug!("Ignoring unknown field: {}", name);
            continue;
        }

        let data = field.bytes().await.map_err(|e| multipart_error(e, limit))?;

        // Browsers send an empty part when no file was chosen.
        if data.is_empty() {
            continue;
        }

        tracing::debug!("Received file: {} bytes", data.len());
        files.push(data);
    }

    Ok(files)
}

fn multipart_error(e: MultipartError, limit: usize) -> OcrError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        OcrError::UploadTooLarge { size: None, limit }
    } else {
        OcrError::InvalidInput(format!("Failed to read multipart field: {}", e.body_text()))
    }
}
