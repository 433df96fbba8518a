use std::fmt;
use std::time::Duration;

use aimint_types::{MetadataRecord, StorageReceipt, TransportError};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::document::UriStyle;
use crate::error::{StorageError, StoreResult};
use crate::traits::MetadataStore;

pub const DEFAULT_API_URL: &str = "https://api.nft.storage";
pub const DEFAULT_GATEWAY: &str = "ipfs.io";

/// Settings for [`NftStorageClient`].
#[derive(Clone)]
pub struct NftStorageConfig {
    /// Base URL of the upload API; `/store` is appended.
    pub api_url: String,
    /// Bearer token for the upload API.
    pub api_token: String,
    /// Public gateway host used to build the returned metadata URI.
    pub gateway: String,
    /// Client-side request timeout. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl NftStorageConfig {
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_token: api_token.into(),
            gateway: DEFAULT_GATEWAY.to_string(),
            timeout: None,
        }
    }
}

impl fmt::Debug for NftStorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NftStorageConfig")
            .field("api_url", &self.api_url)
            .field("api_token", &"<redacted>")
            .field("gateway", &self.gateway)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Deserialize)]
struct StoreResponse {
    ok: bool,
    value: Option<StoreValue>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct StoreValue {
    ipnft: String,
}

#[derive(Deserialize)]
struct ApiError {
    message: Option<String>,
}

/// Client for the nft.storage `store` endpoint.
///
/// Sends one multipart request holding a `meta` JSON field (name and
/// description, with the image slot left `null`) and the image file under
/// `image`. The service pins both, writes `metadata.json` with the image
/// reference filled in, and answers with the bundle's IPFS CID.
pub struct NftStorageClient {
    http: reqwest::Client,
    config: NftStorageConfig,
    style: UriStyle,
}

impl NftStorageClient {
    pub fn new(config: NftStorageConfig) -> StoreResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| StorageError::Config(e.to_string()))?;
        let style = UriStyle::Gateway(config.gateway.clone());
        Ok(Self {
            http,
            config,
            style,
        })
    }

    fn store_url(&self) -> String {
        format!("{}/store", self.config.api_url.trim_end_matches('/'))
    }

    fn transport(&self, err: reqwest::Error) -> StorageError {
        let url = self.store_url();
        if err.is_timeout() {
            TransportError::timeout(url, err.to_string()).into()
        } else {
            TransportError::new(url, err.to_string()).into()
        }
    }

    fn build_form(record: &MetadataRecord) -> StoreResult<Form> {
        let meta = json!({
            "name": record.name,
            "description": record.description,
            "image": null,
        });
        let image = Part::bytes(record.image.bytes.to_vec())
            .file_name(record.image.file_name())
            .mime_str(&record.image.content_type)
            .map_err(|e| StorageError::Malformed(format!("content type: {e}")))?;
        Ok(Form::new().text("meta", meta.to_string()).part("image", image))
    }
}

impl fmt::Debug for NftStorageClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NftStorageClient")
            .field("config", &self.config)
            .finish()
    }
}

#[async_trait]
impl MetadataStore for NftStorageClient {
    fn name(&self) -> &str {
        "nft.storage"
    }

    async fn store(&self, record: &MetadataRecord) -> StoreResult<StorageReceipt> {
        if record.image.is_empty() {
            return Err(StorageError::EmptyImage);
        }

        let form = Self::build_form(record)?;
        debug!(bytes = record.image.len(), "uploading image bundle");
        let response = self
            .http
            .post(self.store_url())
            .bearer_auth(&self.config.api_token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.transport(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport(e))?;
        if !status.is_success() {
            warn!(status = status.as_u16(), "storage backend rejected upload");
            return Err(StorageError::Rejected {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: StoreResponse = serde_json::from_str(&body)
            .map_err(|e| StorageError::InvalidResponse(e.to_string()))?;
        let cid = match parsed {
            StoreResponse {
                ok: true,
                value: Some(value),
                ..
            } => value.ipnft,
            StoreResponse { error, .. } => {
                let message = error
                    .and_then(|e| e.message)
                    .unwrap_or_else(|| "upload not acknowledged".to_string());
                return Err(StorageError::Rejected {
                    status: status.as_u16(),
                    message,
                });
            }
        };
        if cid.is_empty() {
            return Err(StorageError::InvalidResponse("empty ipnft".into()));
        }

        let uri = self.style.metadata_uri(&cid);
        info!(cid = %cid, uri = %uri, "metadata bundle stored");
        Ok(StorageReceipt::new(uri, cid))
    }
}
