use aimint_pipeline::AssetPipeline;
use aimint_types::{CreationRequest, PipelineState, RunId};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use crate::error::ApiError;

/// Health check handler.
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "name": "aimint-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Debug, Serialize)]
pub struct StateResponse {
    /// Human-readable status line.
    pub status: String,
    pub state: PipelineState,
}

/// Current pipeline state.
pub async fn state_handler(State(pipeline): State<AssetPipeline>) -> Json<StateResponse> {
    let state = pipeline.state();
    Json(StateResponse {
        status: state.status_message(),
        state,
    })
}

/// Raw bytes of the most recently generated image.
pub async fn image_handler(
    State(pipeline): State<AssetPipeline>,
) -> Result<impl IntoResponse, ApiError> {
    let image = pipeline
        .latest_image()
        .ok_or_else(|| ApiError::not_found("no image has been generated"))?;
    Ok(([(header::CONTENT_TYPE, image.content_type)], image.bytes))
}

#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub run_id: RunId,
    pub state: &'static str,
}

/// Claim the pipeline for a request and run it in the background.
pub async fn create_asset_handler(
    State(pipeline): State<AssetPipeline>,
    Json(request): Json<CreationRequest>,
) -> Result<(StatusCode, Json<AcceptedResponse>), ApiError> {
    let pending = pipeline.start(request)?;
    let run_id = pending.run_id();
    tokio::spawn(async move {
        let report = pending.execute().await;
        info!(run_id = %report.run_id, state = %report.state, "background run settled");
    });
    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            run_id,
            state: PipelineState::GeneratingImage.name(),
        }),
    ))
}

/// Return a finished pipeline to idle.
pub async fn reset_handler(State(pipeline): State<AssetPipeline>) -> Result<StatusCode, ApiError> {
    pipeline.reset()?;
    Ok(StatusCode::NO_CONTENT)
}
