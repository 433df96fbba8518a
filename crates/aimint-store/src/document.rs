use aimint_types::MetadataRecord;
use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StoreResult};

/// File name of the metadata document inside a stored bundle.
pub const METADATA_FILE: &str = "metadata.json";

/// ERC-721 style metadata document written next to the image.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataDocument {
    pub name: String,
    pub description: String,
    /// URI of the uploaded image.
    pub image: String,
}

impl MetadataDocument {
    pub fn new(record: &MetadataRecord, image_uri: impl Into<String>) -> Self {
        Self {
            name: record.name.clone(),
            description: record.description.clone(),
            image: image_uri.into(),
        }
    }

    pub fn to_json(&self) -> StoreResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| StorageError::Serialization(e.to_string()))
    }
}

/// How a content identifier is turned into a resolvable URI.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UriStyle {
    /// `ipfs://<cid>/<file>`
    Ipfs,
    /// `https://<gateway host>/ipfs/<cid>/<file>`
    Gateway(String),
}

impl UriStyle {
    pub fn file_uri(&self, cid: &str, file: &str) -> String {
        match self {
            Self::Ipfs => format!("ipfs://{cid}/{file}"),
            Self::Gateway(host) => {
                let host = host
                    .trim_start_matches("https://")
                    .trim_start_matches("http://")
                    .trim_end_matches('/');
                format!("https://{host}/ipfs/{cid}/{file}")
            }
        }
    }

    pub fn metadata_uri(&self, cid: &str) -> String {
        self.file_uri(cid, METADATA_FILE)
    }

    /// Extract the content identifier from a metadata URI built by this
    /// style. Returns `None` for URIs of another shape.
    pub fn content_id_of<'a>(&self, uri: &'a str) -> Option<&'a str> {
        let rest = match self {
            Self::Ipfs => uri.strip_prefix("ipfs://")?,
            Self::Gateway(_) => {
                let (_, after) = uri.split_once("/ipfs/")?;
                after
            }
        };
        let cid = rest.strip_suffix(METADATA_FILE)?.strip_suffix('/')?;
        if cid.is_empty() || cid.contains('/') {
            return None;
        }
        Some(cid)
    }
}
