use crate::utils::error::OcrError;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::time::Instant;

/// Request logging middleware
pub async fn request_logging(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let start_time = Instant::now();

    tracing::debug!(
        "Request started: {} {} - User-Agent: {}",
        method,
        uri,
        user_agent
    );

    let response = next.run(req).await;

    tracing::info!(
        "Request completed: {} {} - {} - {}ms",
        method,
        uri,
        response.status(),
        start_time.elapsed().as_millis()
    );

    response
}

/// Rejects declared oversize bodies before any handler reads them.
/// Chunked bodies are cut off later by the body limit layer.
pub async fn enforce_upload_limit(
    State(limit): State<usize>,
    req: Request,
    next: Next,
) -> Result<Response, OcrError> {
    let declared = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());

    if let Some(size) = declared {
        if size > limit {
            return Err(OcrError::UploadTooLarge {
                size: Some(size),
                limit,
            });
        }
    }

    Ok(next.run(req).await)
}
