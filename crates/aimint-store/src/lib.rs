//! Metadata storage stage for AIMint.
//!
//! Packages a synthesized image together with its name and description into
//! a content-addressed bundle and returns the URI of the bundle's
//! `metadata.json`. That URI becomes the token URI recorded on-chain.
//!
//! # Storage Backends
//!
//! All backends implement the [`MetadataStore`] trait:
//!
//! - [`InMemoryMetadataStore`] -- BLAKE3-addressed store for tests and offline runs
//! - [`NftStorageClient`] -- nft.storage upload API (IPFS + Filecoin)
//!
//! # Design Rules
//!
//! 1. Bundles are immutable once written; the same content always yields the
//!    same address.
//! 2. One upload per call. Partial uploads are never cleaned up here.
//! 3. Storing different image bytes produces a different URI; receipts are
//!    never reused across images.

pub mod cid;
pub mod document;
pub mod error;
pub mod memory;
pub mod nft_storage;
pub mod traits;

pub use cid::{ContentHasher, ContentId};
pub use document::{MetadataDocument, UriStyle, METADATA_FILE};
pub use error::{StorageError, StoreResult};
pub use memory::InMemoryMetadataStore;
pub use nft_storage::{NftStorageClient, NftStorageConfig, DEFAULT_API_URL, DEFAULT_GATEWAY};
pub use traits::MetadataStore;
