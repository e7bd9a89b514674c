use crate::utils::error::OcrError;
use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRef, FromRequest, FromRequestParts, Request},
    http::{request::Parts, StatusCode},
    Json,
};
use serde::Deserialize;

/// Configured request body ceiling in bytes.
#[derive(Debug, Clone, Copy)]
pub struct UploadLimit(pub usize);

/// JSON body that is deserialized and then checked by [`Validate`].
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: for<'de> Deserialize<'de> + Validate,
    UploadLimit: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = OcrError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let UploadLimit(limit) = UploadLimit::from_ref(state);
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| json_rejection(rejection, limit))?;

        value.validate()?;

        Ok(ValidatedJson(value))
    }
}

pub trait Validate {
    fn validate(&self) -> Result<(), OcrError>;
}

fn json_rejection(rejection: JsonRejection, limit: usize) -> OcrError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return OcrError::UploadTooLarge { size: None, limit };
    }
    OcrError::InvalidInput(rejection.body_text())
}

/// Body of `POST /save_to_excel`.
#[derive(Debug, Deserialize)]
pub struct SaveWordsRequest {
    #[serde(default)]
    pub words: Option<Vec<String>>,
}

impl SaveWordsRequest {
    pub fn into_words(self) -> Vec<String> {
        self.words.unwrap_or_default()
    }
}

impl Validate for SaveWordsRequest {
    fn validate(&self) -> Result<(), OcrError> {
        match &self.words {
            Some(words) if !words.is_empty() => Ok(()),
            _ => Err(OcrError::NoWordsProvided),
        }
    }
}

/// Request id from `X-Request-ID`, or a fresh UUID.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let request_id = parts
            .headers
            .get("X-Request-ID")
            .and_then(|value| value.to_str().ok())
            .map(|s| s.to_string())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Ok(RequestId(request_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_or_empty_words_rejected() {
        let missing: SaveWordsRequest = serde_json::from_str("{}").unwrap();
        assert!(matches!(missing.validate(), Err(OcrError::NoWordsProvided)));

        let empty: SaveWordsRequest = serde_json::from_str(r#"{"words":[]}"#).unwrap();
        assert!(matches!(empty.validate(), Err(OcrError::NoWordsProvided)));

        let ok: SaveWordsRequest = serde_json::from_str(r#"{"words":["a","b"]}"#).unwrap();
        assert!(ok.validate().is_ok());
        assert_eq!(ok.into_words(), vec!["a", "b"]);
    }
}
