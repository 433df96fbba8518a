use aimint_types::{MetadataRecord, StorageReceipt};
use async_trait::async_trait;

use crate::error::StoreResult;

/// Content-addressed metadata store.
///
/// All implementations must satisfy these invariants:
/// - `record.image` must be non-empty; an empty image fails with
///   [`StorageError::EmptyImage`](crate::StorageError::EmptyImage) before any I/O.
/// - One upload per call, no retries.
/// - The returned URI is derived from the bundle's content address and ends
///   in `metadata.json`.
/// - The call returns only once the backend reports the content addressable.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Short backend name used in logs.
    fn name(&self) -> &str;

    /// Upload the image and a generated metadata document; return the
    /// metadata URI.
    async fn store(&self, record: &MetadataRecord) -> StoreResult<StorageReceipt>;
}
