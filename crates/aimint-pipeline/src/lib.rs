//! The AIMint asset pipeline.
//!
//! [`AssetPipeline`] runs one [`CreationRequest`](aimint_types::CreationRequest)
//! at a time through three stages:
//!
//! ```text
//! Idle -> GeneratingImage -> UploadingMetadata -> AwaitingMint -> Completed
//!               \                   \                  \
//!                +-------------------+------------------+--> Failed { stage, cause }
//! ```
//!
//! Every transition is broadcast as a
//! [`ProgressEvent`](aimint_types::ProgressEvent). No stage is retried;
//! resubmitting after a failure is the caller's decision.

pub mod config;
pub mod error;
pub mod failure;
pub mod pipeline;
pub mod report;

pub use config::{PipelineConfig, DEFAULT_MINT_PRICE_ETHER};
pub use error::{PipelineError, PipelineResult};
pub use failure::IntoFailureCause;
pub use pipeline::{AssetPipeline, PendingRun};
pub use report::{RunReport, StageRecord};
