use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use portal_core::{RedirectKind, REQUEST_TIMEOUT_HEADER};
use serde::Serialize;

use crate::http::error::{AppError, Result};
use crate::http::state::AppState;

/// Browsers and CDNs may keep permanent redirects for an hour.
pub const PERMANENT_CACHE_CONTROL: &str = "public, max-age=3600";
pub const TEMPORARY_CACHE_CONTROL: &str = "no-store";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn redirect_handler(
    Path(code): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response> {
    let header = headers
        .get(REQUEST_TIMEOUT_HEADER)
        .and_then(|value| value.to_str().ok());
    let budget = state.timeouts.budget(header);

    let resolved = tokio::time::timeout(budget, state.redirector.resolve(&code))
        .await
        .map_err(|_| AppError::Timeout)??;

    let location = HeaderValue::from_bytes(resolved.long_url.as_bytes())
        .map_err(|e| AppError::InvalidTarget(format!("{code}: {e}")))?;

    let (status, cache_control) = match resolved.kind {
        RedirectKind::Permanent => (StatusCode::MOVED_PERMANENTLY, PERMANENT_CACHE_CONTROL),
        RedirectKind::Temporary => (StatusCode::FOUND, TEMPORARY_CACHE_CONTROL),
    };

    Ok((
        status,
        [
            (header::LOCATION, location),
            (header::CACHE_CONTROL, HeaderValue::from_static(cache_control)),
        ],
    )
        .into_response())
}
