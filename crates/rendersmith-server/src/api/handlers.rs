//! Route handlers

use super::types::{
    decode_batch_item, BatchBody, BatchResponse, BatchResult, HealthResponse, RenderBody,
    VideoBody, VideoResponse,
};
use super::{ApiError, AppState};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderName, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use rendersmith::{BatchEntry, RenderError, RenderResult};
use serde::de::DeserializeOwned;
use tracing::info;

/// Width header on image responses
pub const RENDER_WIDTH_HEADER: HeaderName = HeaderName::from_static("x-render-width");
/// Height header on image responses
pub const RENDER_HEIGHT_HEADER: HeaderName = HeaderName::from_static("x-render-height");

/// Parse a JSON body, reporting syntax and type errors as a bad request
fn parse_body<T: DeserializeOwned>(body: &[u8]) -> RenderResult<T> {
    serde_json::from_slice(body).map_err(|e| RenderError::invalid_input("body", e.to_string()))
}

/// `GET /health`
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "rendersmith",
    })
}

/// `POST /render`
pub async fn render(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let request = parse_body::<RenderBody>(&body)?.into_request()?;
    let image = state.service().render_image(&request).await?;

    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static(image.format.content_type()),
            ),
            (RENDER_WIDTH_HEADER, HeaderValue::from(image.width)),
            (RENDER_HEIGHT_HEADER, HeaderValue::from(image.height)),
        ],
        image.bytes,
    )
        .into_response())
}

/// `POST /render/batch`
pub async fn render_batch(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<BatchResponse>, ApiError> {
    let items = parse_body::<BatchBody>(&body)?
        .items
        .ok_or_else(|| RenderError::invalid_input("items", "is required"))?;
    state.service().check_batch_len(items.len())?;

    let entries: Vec<BatchEntry> = items
        .into_iter()
        .enumerate()
        .map(|(index, raw)| decode_batch_item(index, raw))
        .collect();
    let outcomes = state.service().render_batch(entries).await?;

    Ok(Json(BatchResponse {
        results: outcomes.into_iter().map(BatchResult::from).collect(),
    }))
}

/// `POST /render/video`
pub async fn render_video(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<VideoResponse>, ApiError> {
    let request = parse_body::<VideoBody>(&body)
        .and_then(VideoBody::into_request)
        .map_err(ApiError::Video)?;

    let bytes = state
        .service()
        .render_video(&request)
        .await
        .map_err(ApiError::Video)?;

    let composition_id = request.composition_id.as_str();
    info!(composition_id, size_bytes = bytes.len(), "video response ready");
    Ok(Json(VideoResponse::new(composition_id, &bytes)))
}
