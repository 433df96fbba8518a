use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::request::CreationRequest;

/// Content type recorded when the remote service does not send one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Raw image bytes as returned by the synthesis service.
///
/// The bytes are never decoded or validated; they travel verbatim from the
/// inference response to the storage upload. `Bytes` keeps clones cheap, so
/// progress events and terminal states can carry the image freely.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAsset {
    /// Image payload, base64-encoded when serialized.
    #[serde(with = "base64_bytes")]
    pub bytes: Bytes,
    /// MIME type taken from the response `content-type` header.
    pub content_type: String,
}

impl ImageAsset {
    pub fn new(bytes: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: content_type.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Render as a `data:` URI suitable for an `<img src>` attribute.
    pub fn data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.content_type,
            STANDARD.encode(&self.bytes)
        )
    }

    /// File extension matching the content type, ignoring parameters.
    pub fn file_extension(&self) -> &'static str {
        let essence = self
            .content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "image/jpeg" | "image/jpg" => "jpeg",
            "image/png" => "png",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "bin",
        }
    }

    /// File name used when uploading the image.
    pub fn file_name(&self) -> String {
        format!("image.{}", self.file_extension())
    }
}

impl fmt::Debug for ImageAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageAsset")
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// The exact payload persisted by a metadata store: the image plus the
/// descriptive fields of the originating request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetadataRecord {
    pub image: ImageAsset,
    pub name: String,
    pub description: String,
}

impl MetadataRecord {
    pub fn new(request: &CreationRequest, image: ImageAsset) -> Self {
        Self {
            image,
            name: request.name.clone(),
            description: request.description.clone(),
        }
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use bytes::Bytes;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Bytes, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}
