use std::fmt;

use serde::{Deserialize, Serialize};

/// Proof that a metadata bundle was accepted by a content-addressed store.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageReceipt {
    /// Resolvable locator of the metadata document; becomes the token URI.
    pub metadata_uri: String,
    /// Content identifier of the bundle the URI points into.
    pub content_id: String,
}

impl StorageReceipt {
    pub fn new(metadata_uri: impl Into<String>, content_id: impl Into<String>) -> Self {
        Self {
            metadata_uri: metadata_uri.into(),
            content_id: content_id.into(),
        }
    }
}

impl fmt::Display for StorageReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.metadata_uri)
    }
}

/// Outcome of a submitted mint transaction.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MintReceipt {
    /// `0x`-prefixed transaction hash.
    pub tx_hash: String,
    /// `true` once the transaction was observed in a block with success
    /// status. `false` means broadcast but still pending.
    pub confirmed: bool,
}

impl MintReceipt {
    pub fn confirmed(tx_hash: impl Into<String>) -> Self {
        Self {
            tx_hash: tx_hash.into(),
            confirmed: true,
        }
    }

    pub fn pending(tx_hash: impl Into<String>) -> Self {
        Self {
            tx_hash: tx_hash.into(),
            confirmed: false,
        }
    }
}
