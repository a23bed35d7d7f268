use axum::{
    extract::rejection::BytesRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use papaya_prediction::PredictionError;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WebError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),
    #[error("Prediction failed: {0}")]
    Prediction(#[from] PredictionError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WebError {
    fn status_code(&self) -> StatusCode {
        match self {
            WebError::BadRequest(_) => StatusCode::BAD_REQUEST,
            WebError::NotFound(_) => StatusCode::NOT_FOUND,
            WebError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            WebError::Prediction(PredictionError::EmptyImage) => StatusCode::BAD_REQUEST,
            WebError::Prediction(err) if err.is_client_error() => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            WebError::Prediction(_) | WebError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<BytesRejection> for WebError {
    fn from(rejection: BytesRejection) -> Self {
        match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE => WebError::PayloadTooLarge(rejection.body_text()),
            _ => WebError::BadRequest(rejection.body_text()),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("{}", self);
        }

        let body = ErrorResponse {
            detail: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            WebError::from(PredictionError::EmptyImage).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            WebError::from(PredictionError::UnsupportedFormat("Gif".into())).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            WebError::from(PredictionError::Inference("boom".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            WebError::NotFound("image".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            WebError::PayloadTooLarge("body".into()).status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }
}
