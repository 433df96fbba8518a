use std::fmt;
use std::time::Duration;

use aimint_types::{ImageAsset, TransportError, DEFAULT_CONTENT_TYPE};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::client::ImageSynthesisClient;
use crate::error::{SynthError, SynthResult};

/// Stable Diffusion v1.5 on the hosted inference API.
pub const DEFAULT_ENDPOINT: &str =
    "https://api-inference.huggingface.co/models/runwayml/stable-diffusion-v1-5";

/// Settings for [`HuggingFaceClient`].
#[derive(Clone)]
pub struct SynthConfig {
    /// Full model URL the prompt is POSTed to.
    pub endpoint: String,
    /// Bearer token sent in the `Authorization` header.
    pub api_token: String,
    /// Ask the service to hold the request while a cold model loads
    /// instead of failing fast with 503.
    pub wait_for_model: bool,
    /// Client-side request timeout. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl SynthConfig {
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_token: api_token.into(),
            wait_for_model: true,
            timeout: None,
        }
    }
}

impl fmt::Debug for SynthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SynthConfig")
            .field("endpoint", &self.endpoint)
            .field("api_token", &"<redacted>")
            .field("wait_for_model", &self.wait_for_model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    options: InferenceOptions,
}

#[derive(Serialize)]
struct InferenceOptions {
    wait_for_model: bool,
}

/// Hugging Face inference API client.
pub struct HuggingFaceClient {
    http: reqwest::Client,
    config: SynthConfig,
}

impl HuggingFaceClient {
    pub fn new(config: SynthConfig) -> SynthResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| SynthError::Config(e.to_string()))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &SynthConfig {
        &self.config
    }

    fn transport(&self, err: reqwest::Error) -> SynthError {
        let endpoint = self.config.endpoint.as_str();
        if err.is_timeout() {
            TransportError::timeout(endpoint, err.to_string()).into()
        } else {
            TransportError::new(endpoint, err.to_string()).into()
        }
    }
}

impl fmt::Debug for HuggingFaceClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HuggingFaceClient")
            .field("config", &self.config)
            .finish()
    }
}

#[async_trait]
impl ImageSynthesisClient for HuggingFaceClient {
    fn name(&self) -> &str {
        "huggingface"
    }

    async fn synthesize(&self, prompt: &str) -> SynthResult<ImageAsset> {
        if prompt.trim().is_empty() {
            return Err(SynthError::EmptyPrompt);
        }

        debug!(endpoint = %self.config.endpoint, "requesting image synthesis");
        let body = InferenceRequest {
            inputs: prompt,
            options: InferenceOptions {
                wait_for_model: self.config.wait_for_model,
            },
        };
        let response = self
            .http
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "inference service rejected request");
            return Err(SynthError::Remote {
                status: status.as_u16(),
                body,
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
        let bytes = response.bytes().await.map_err(|e| self.transport(e))?;

        info!(bytes = bytes.len(), content_type = %content_type, "image synthesized");
        Ok(ImageAsset::new(bytes, content_type))
    }
}
