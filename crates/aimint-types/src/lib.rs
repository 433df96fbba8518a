//! Foundation types for AIMint.
//!
//! This crate provides the data model shared by every stage of the
//! asset-creation pipeline. Every other AIMint crate depends on `aimint-types`.
//!
//! # Key Types
//!
//! - [`CreationRequest`]: Caller-supplied name and description
//! - [`ImageAsset`]: Synthesized image bytes plus content type
//! - [`MetadataRecord`]: The payload handed to a metadata store
//! - [`StorageReceipt`] / [`MintReceipt`]: Stage outputs
//! - [`PipelineState`]: The orchestrator's tagged state machine
//! - [`ProgressEvent`]: Observable transition notifications

pub mod asset;
pub mod error;
pub mod progress;
pub mod receipt;
pub mod request;
pub mod state;

pub use asset::{ImageAsset, MetadataRecord, DEFAULT_CONTENT_TYPE};
pub use error::{TransportError, ValidationError};
pub use progress::{ProgressEvent, RunId};
pub use receipt::{MintReceipt, StorageReceipt};
pub use request::CreationRequest;
pub use state::{FailureCause, FailureKind, PipelineState, SpendOutcome, Stage};
