//! HTTP server for AIMint.
//!
//! Exposes one [`AssetPipeline`](aimint_pipeline::AssetPipeline) to a
//! browser UI: submit a name and description, then poll the state and
//! fetch the generated image as soon as it exists.
//!
//! | method | path | |
//! |---|---|---|
//! | GET | `/v1/health` | liveness |
//! | GET | `/v1/state` | current [`PipelineState`](aimint_types::PipelineState) |
//! | GET | `/v1/image` | latest image bytes, 404 before the first one |
//! | POST | `/v1/assets` | start a run: 202, 400 on invalid input, 409 when busy |
//! | POST | `/v1/reset` | back to idle: 204, 409 when busy |

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use config::{ServerConfig, DEFAULT_PORT};
pub use error::{ApiError, ServerError, ServerResult};
pub use server::AimintServer;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use aimint_chain::{
        Address, ChainError, ChainResult, MintExecutor, MintResult, Signer, TransactionRequest,
        TxHash, U256,
    };
    use aimint_pipeline::{AssetPipeline, PipelineConfig};
    use aimint_store::InMemoryMetadataStore;
    use aimint_synth::{ImageSynthesisClient, SynthResult};
    use aimint_types::{ImageAsset, MintReceipt, PipelineState};
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use serde_json::Value;
    use tokio::sync::Notify;
    use tower::util::ServiceExt;

    struct GatedSynth(Option<Arc<Notify>>);

    #[async_trait]
    impl ImageSynthesisClient for GatedSynth {
        fn name(&self) -> &str {
            "stub"
        }

        async fn synthesize(&self, _prompt: &str) -> SynthResult<ImageAsset> {
            if let Some(gate) = &self.0 {
                gate.notified().await;
            }
            Ok(ImageAsset::new(b"ABC".to_vec(), "image/png"))
        }
    }

    struct StubMinter;

    #[async_trait]
    impl MintExecutor for StubMinter {
        async fn mint(&self, _uri: &str, _s: &dyn Signer, _p: U256) -> MintResult<MintReceipt> {
            Ok(MintReceipt::confirmed("0xdead"))
        }
    }

    struct StubSigner;

    #[async_trait]
    impl Signer for StubSigner {
        fn address(&self) -> Address {
            Address::ZERO
        }

        async fn send_transaction(&self, _tx: TransactionRequest) -> ChainResult<TxHash> {
            Err(ChainError::NoAccounts)
        }
    }

    fn pipeline(gate: Option<Arc<Notify>>) -> AssetPipeline {
        AssetPipeline::new(
            Arc::new(GatedSynth(gate)),
            Arc::new(InMemoryMetadataStore::new()),
            Arc::new(StubMinter),
            Arc::new(StubSigner),
            PipelineConfig::default(),
        )
    }

    fn app(pipeline: &AssetPipeline) -> Router {
        AimintServer::new(ServerConfig::default(), pipeline.clone()).router()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn wait_until_terminal(pipeline: &AssetPipeline) {
        for _ in 0..100 {
            if pipeline.state().is_terminal() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("pipeline never settled: {}", pipeline.state());
    }

    #[tokio::test]
    async fn health_endpoint() {
        let response = app(&pipeline(None)).oneshot(get("/v1/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn idle_state_and_missing_image() {
        let p = pipeline(None);
        let response = app(&p).oneshot(get("/v1/state")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["state"]["state"], "idle");
        assert_eq!(body["status"], "Ready");

        let response = app(&p).oneshot(get("/v1/image")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_request_is_bad_request() {
        let p = pipeline(None);
        let response = app(&p)
            .oneshot(post_json("/v1/assets", r#"{"name":"","description":"Bar"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert!(body["error"].as_str().unwrap().contains("name"));
        assert_eq!(p.state(), PipelineState::Idle);
    }

    #[tokio::test]
    async fn submit_runs_in_background() {
        let p = pipeline(None);
        let response = app(&p)
            .oneshot(post_json("/v1/assets", r#"{"name":"Foo","description":"Bar"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = json_body(response).await;
        assert!(body["run_id"].is_string());

        wait_until_terminal(&p).await;
        let body = json_body(app(&p).oneshot(get("/v1/state")).await.unwrap()).await;
        assert_eq!(body["state"]["state"], "completed");
        assert_eq!(body["state"]["tx_hash"], "0xdead");

        let response = app(&p).oneshot(get("/v1/image")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"ABC");
    }

    #[tokio::test]
    async fn busy_pipeline_conflicts() {
        let gate = Arc::new(Notify::new());
        let p = pipeline(Some(gate.clone()));
        let first = app(&p)
            .oneshot(post_json("/v1/assets", r#"{"name":"Foo","description":"Bar"}"#))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::ACCEPTED);

        let second = app(&p)
            .oneshot(post_json("/v1/assets", r#"{"name":"Baz","description":"Qux"}"#))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);
        assert_eq!(json_body(second).await["state"], "generating_image");

        let reset = app(&p)
            .oneshot(Request::builder().method("POST").uri("/v1/reset").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(reset.status(), StatusCode::CONFLICT);

        gate.notify_one();
        wait_until_terminal(&p).await;
        let reset = app(&p)
            .oneshot(Request::builder().method("POST").uri("/v1/reset").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(reset.status(), StatusCode::NO_CONTENT);
        assert_eq!(p.state(), PipelineState::Idle);
    }
}
