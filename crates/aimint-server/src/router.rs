use aimint_pipeline::AssetPipeline;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handler;

/// Build the axum router with all AIMint endpoints.
pub fn build_router(pipeline: AssetPipeline, permissive_cors: bool) -> Router {
    let router = Router::new()
        .route("/v1/health", get(handler::health_handler))
        .route("/v1/state", get(handler::state_handler))
        .route("/v1/image", get(handler::image_handler))
        .route("/v1/assets", post(handler::create_asset_handler))
        .route("/v1/reset", post(handler::reset_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(pipeline);
    if permissive_cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}
