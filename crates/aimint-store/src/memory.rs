use std::collections::HashMap;
use std::sync::RwLock;

use aimint_types::{ImageAsset, MetadataRecord, StorageReceipt};
use async_trait::async_trait;
use tracing::debug;

use crate::cid::ContentHasher;
use crate::document::{MetadataDocument, UriStyle};
use crate::error::{StorageError, StoreResult};
use crate::traits::MetadataStore;

/// In-memory, HashMap-based metadata store.
///
/// Intended for tests and offline runs. Images and documents are addressed
/// by domain-separated BLAKE3 hashes, so storing the same record twice is a
/// no-op that returns the same URI.
pub struct InMemoryMetadataStore {
    style: UriStyle,
    images: RwLock<HashMap<String, ImageAsset>>,
    documents: RwLock<HashMap<String, MetadataDocument>>,
}

impl InMemoryMetadataStore {
    /// Create an empty store that hands out `ipfs://` URIs.
    pub fn new() -> Self {
        Self::with_style(UriStyle::Ipfs)
    }

    pub fn with_style(style: UriStyle) -> Self {
        Self {
            style,
            images: RwLock::new(HashMap::new()),
            documents: RwLock::new(HashMap::new()),
        }
    }

    /// Number of metadata documents stored.
    pub fn len(&self) -> usize {
        self.documents.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up the document a metadata URI points at.
    pub fn resolve(&self, metadata_uri: &str) -> Option<MetadataDocument> {
        let cid = self.style.content_id_of(metadata_uri)?;
        self.documents
            .read()
            .expect("lock poisoned")
            .get(cid)
            .cloned()
    }

    /// Fetch an image by its content identifier.
    pub fn image(&self, cid: &str) -> Option<ImageAsset> {
        self.images.read().expect("lock poisoned").get(cid).cloned()
    }
}

impl Default for InMemoryMetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn store(&self, record: &MetadataRecord) -> StoreResult<StorageReceipt> {
        if record.image.is_empty() {
            return Err(StorageError::EmptyImage);
        }

        let image_cid = ContentHasher::IMAGE.hash(&record.image.bytes).to_hex();
        let image_uri = self.style.file_uri(&image_cid, &record.image.file_name());
        let document = MetadataDocument::new(record, image_uri);
        let metadata_cid = ContentHasher::METADATA.hash(&document.to_json()?).to_hex();

        self.images
            .write()
            .expect("lock poisoned")
            .entry(image_cid)
            .or_insert_with(|| record.image.clone());
        self.documents
            .write()
            .expect("lock poisoned")
            .entry(metadata_cid.clone())
            .or_insert(document);

        let uri = self.style.metadata_uri(&metadata_cid);
        debug!(uri = %uri, "metadata stored in memory");
        Ok(StorageReceipt::new(uri, metadata_cid))
    }
}

impl std::fmt::Debug for InMemoryMetadataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryMetadataStore")
            .field("style", &self.style)
            .field("document_count", &self.len())
            .finish()
    }
}
