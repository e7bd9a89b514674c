use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::models::ModelVariant;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("Invalid image format: {0}")]
    InvalidImageFormat(String),

    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Model '{0}' is not loaded")]
    ModelNotLoaded(ModelVariant),

    #[error("OCR inference failed: {0}")]
    Inference(String),

    #[error("No file uploaded")]
    NoFileProvided,

    #[error("No files uploaded")]
    NoFilesProvided,

    #[error("No words provided")]
    NoWordsProvided,

    #[error("File size exceeds the {}MB limit", .limit / (1024 * 1024))]
    UploadTooLarge { size: Option<usize>, limit: usize },

    #[error("Export failed: {0}")]
    ExportIo(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("ORT error: {0}")]
    Ort(#[from] ort::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl OcrError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            OcrError::InvalidImageFormat(_) => StatusCode::BAD_REQUEST,
            OcrError::NoFileProvided => StatusCode::BAD_REQUEST,
            OcrError::NoFilesProvided => StatusCode::BAD_REQUEST,
            OcrError::NoWordsProvided => StatusCode::BAD_REQUEST,
            OcrError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            OcrError::UploadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            OcrError::ModelLoad(_) => StatusCode::SERVICE_UNAVAILABLE,
            OcrError::ModelNotLoaded(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            OcrError::InvalidImageFormat(_) => "INVALID_IMAGE_FORMAT",
            OcrError::ModelLoad(_) => "MODEL_LOAD_ERROR",
            OcrError::ModelNotLoaded(_) => "MODEL_NOT_LOADED",
            OcrError::Inference(_) => "INFERENCE_ERROR",
            OcrError::NoFileProvided => "NO_FILE_PROVIDED",
            OcrError::NoFilesProvided => "NO_FILES_PROVIDED",
            OcrError::NoWordsProvided => "NO_WORDS_PROVIDED",
            OcrError::UploadTooLarge { .. } => "UPLOAD_TOO_LARGE",
            OcrError::ExportIo(_) => "EXPORT_IO_ERROR",
            OcrError::InvalidInput(_) => "INVALID_INPUT",
            OcrError::Config(_) => "CONFIG_ERROR",
            OcrError::Ort(_) => "ORT_ERROR",
            OcrError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Re-labels any failure raised while running the model as an inference error.
    pub fn into_inference(self) -> Self {
        match self {
            OcrError::Inference(_) => self,
            other => OcrError::Inference(other.to_string()),
        }
    }
}

impl IntoResponse for OcrError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_response = serde_json::json!({
            "error": self.to_string(),
            "code": self.error_code(),
        });

        if status.is_server_error() {
            tracing::error!("Request failed: {} ({})", self, status);
        } else {
            tracing::warn!("Request rejected: {} ({})", self, status);
        }

        (status, axum::Json(error_response)).into_response()
    }
}
