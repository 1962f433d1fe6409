use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};

use crate::error::RedirectError;

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
    Redirect(RedirectError),
    /// The stored URL cannot be sent as a `Location` header.
    InvalidTarget(String),
    Timeout,
}

impl From<RedirectError> for AppError {
    fn from(value: RedirectError) -> Self {
        Self::Redirect(value)
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Redirect(RedirectError::NotFound(_)) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Redirect(RedirectError::Expired(_)) => (StatusCode::GONE, "expired"),
            AppError::Redirect(RedirectError::StoreUnavailable(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "store_unavailable")
            }
            AppError::InvalidTarget(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
            AppError::Timeout => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.parts();
        let message = match self {
            AppError::Redirect(RedirectError::StoreUnavailable(detail)) => {
                warn!(error = %detail, "store unavailable");
                "the link store is unavailable".to_string()
            }
            AppError::Redirect(e) => e.to_string(),
            AppError::InvalidTarget(detail) => {
                error!(error = %detail, "stored URL is not a valid header value");
                "internal error".to_string()
            }
            AppError::Timeout => "request timed out".to_string(),
        };

        let body = ErrorBody {
            error: ErrorInfo { code, message },
        };

        (status, Json(body)).into_response()
    }
}
