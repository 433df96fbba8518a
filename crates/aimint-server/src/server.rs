use aimint_pipeline::AssetPipeline;
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::build_router;

/// HTTP front end for one asset pipeline.
pub struct AimintServer {
    config: ServerConfig,
    pipeline: AssetPipeline,
}

impl AimintServer {
    pub fn new(config: ServerConfig, pipeline: AssetPipeline) -> Self {
        Self { config, pipeline }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(self.pipeline.clone(), self.config.permissive_cors)
    }

    /// Start serving requests.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router();
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        tracing::info!("AIMint server listening on {}", self.config.bind_addr);
        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}
