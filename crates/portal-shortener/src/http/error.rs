use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::warn;

use crate::error::ShortenerError;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorInfo,
}

#[derive(Serialize)]
struct ErrorInfo {
    code: &'static str,
    message: String,
}

#[derive(Debug)]
pub enum AppError {
    Shortener(ShortenerError),
    /// The request body could not be decoded.
    InvalidRequest(String),
    /// The request's time budget ran out.
    Timeout,
}

impl From<ShortenerError> for AppError {
    fn from(value: ShortenerError) -> Self {
        Self::Shortener(value)
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Shortener(e) => match e {
                ShortenerError::InvalidUrl(_) => (StatusCode::BAD_REQUEST, "invalid_url"),
                ShortenerError::InvalidTtl(_) => (StatusCode::BAD_REQUEST, "invalid_ttl"),
                ShortenerError::InvalidShortCode(_) => {
                    (StatusCode::BAD_REQUEST, "invalid_short_code")
                }
                ShortenerError::CodeTaken(_) => (StatusCode::CONFLICT, "code_taken"),
                ShortenerError::GenerationExhausted(_) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "generation_exhausted")
                }
                ShortenerError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
                ShortenerError::StoreUnavailable(_) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "store_unavailable")
                }
            },
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            AppError::Timeout => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.parts();
        let message = match self {
            // Infrastructure details stay in the logs.
            AppError::Shortener(ShortenerError::StoreUnavailable(detail)) => {
                warn!(error = %detail, "store unavailable");
                "the link store is unavailable".to_string()
            }
            AppError::Shortener(e) => e.to_string(),
            AppError::InvalidRequest(message) => message,
            AppError::Timeout => "request timed out".to_string(),
        };

        let body = ErrorBody {
            error: ErrorInfo { code, message },
        };

        (status, Json(body)).into_response()
    }
}
