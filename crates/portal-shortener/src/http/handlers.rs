use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use jiff::SignedDuration;
use portal_core::REQUEST_TIMEOUT_HEADER;
use std::future::Future;

use crate::http::error::{AppError, Result};
use crate::http::model::{CreateLinkRequest, HealthResponse, LinkResponse};
use crate::http::state::AppState;
use crate::service::ShortenRequest;

/// Runs `fut` within the request's time budget.
async fn within_budget<T, F>(state: &AppState, headers: &HeaderMap, fut: F) -> Result<T>
where
    F: Future<Output = crate::error::Result<T>>,
{
    let header = headers
        .get(REQUEST_TIMEOUT_HEADER)
        .and_then(|value| value.to_str().ok());
    let budget = state.timeouts.budget(header);

    match tokio::time::timeout(budget, fut).await {
        Ok(result) => result.map_err(AppError::from),
        Err(_) => Err(AppError::Timeout),
    }
}

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn create_link_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: std::result::Result<Json<CreateLinkRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(body) = payload.map_err(|e| AppError::InvalidRequest(e.body_text()))?;

    let request = ShortenRequest {
        long_url: body.long_url,
        custom_code: body.custom_code,
        ttl: body.ttl_seconds.map(SignedDuration::from_secs),
    };

    let link = within_budget(&state, &headers, state.shortener.shorten(request)).await?;
    let short_url = state.shortener.short_url(&link.code);

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, short_url.clone())],
        Json(LinkResponse::created(link, short_url)),
    ))
}

pub async fn get_link_handler(
    Path(code): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<LinkResponse>> {
    let link = within_budget(&state, &headers, state.shortener.details(&code)).await?;
    let short_url = state.shortener.short_url(&link.code);

    Ok(Json(LinkResponse::details(link, short_url)))
}

pub async fn delete_link_handler(
    Path(code): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode> {
    within_budget(&state, &headers, state.shortener.delete(&code)).await?;
    Ok(StatusCode::NO_CONTENT)
}
