use std::fmt;

use serde::{Deserialize, Serialize};

use crate::asset::ImageAsset;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// One of the three sequential pipeline steps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Prompt to image via the synthesis service.
    Image,
    /// Image and metadata upload to content-addressed storage.
    Storage,
    /// Payable mint transaction on the NFT contract.
    Mint,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Stage; 3] = [Stage::Image, Stage::Storage, Stage::Mint];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Storage => "storage",
            Self::Mint => "mint",
        }
    }

    /// Status line shown to the user while this stage runs.
    pub fn status_message(&self) -> &'static str {
        match self {
            Self::Image => "Generating Image...",
            Self::Storage => "Uploading Image...",
            Self::Mint => "Waiting for Mint...",
        }
    }

    /// The in-progress pipeline state for this stage.
    pub fn running_state(&self) -> PipelineState {
        match self {
            Self::Image => PipelineState::GeneratingImage,
            Self::Storage => PipelineState::UploadingMetadata,
            Self::Mint => PipelineState::AwaitingMint,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// FailureCause
// ---------------------------------------------------------------------------

/// Error class of a failed stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Network failure reaching a remote service.
    Transport,
    /// The configured per-stage timeout elapsed.
    Timeout,
    /// The inference service answered with a non-success status.
    Synthesis,
    /// The storage backend refused or failed the upload.
    Storage,
    /// The chain rejected or reverted the mint.
    Mint,
    /// The mint was broadcast but no confirmation was observed.
    Unconfirmed,
    /// The run was dropped before the stage finished.
    Aborted,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Transport => "transport",
            Self::Timeout => "timeout",
            Self::Synthesis => "synthesis",
            Self::Storage => "storage",
            Self::Mint => "mint",
            Self::Unconfirmed => "unconfirmed",
            Self::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// What a failure cost the user on-chain.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SpendOutcome {
    /// No transaction was ever broadcast.
    NothingSpent,
    /// A transaction was broadcast and reverted or was rejected after
    /// submission; gas may have been charged even though nothing minted.
    GasMayBeSpent,
    /// A transaction is live on-chain and may still confirm.
    TransactionLive { tx_hash: String },
    /// The mint call was abandoned mid-flight; whether a transaction was
    /// broadcast cannot be known from here.
    Unknown,
}

impl SpendOutcome {
    /// Human-readable explanation for the user.
    pub fn describe(&self) -> String {
        match self {
            Self::NothingSpent => "no funds were spent".to_string(),
            Self::GasMayBeSpent => {
                "the transaction did not mint, but gas may have been charged".to_string()
            }
            Self::TransactionLive { tx_hash } => format!(
                "transaction {tx_hash} is still live on-chain and may yet confirm; do not resubmit blindly"
            ),
            Self::Unknown => {
                "the mint call was abandoned; check your wallet for a pending transaction"
                    .to_string()
            }
        }
    }
}

/// Serializable description of why a stage failed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureCause {
    pub kind: FailureKind,
    pub message: String,
    pub spend: SpendOutcome,
}

impl FailureCause {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            spend: SpendOutcome::NothingSpent,
        }
    }

    pub fn with_spend(mut self, spend: SpendOutcome) -> Self {
        self.spend = spend;
        self
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.kind, self.message, self.spend.describe())
    }
}

// ---------------------------------------------------------------------------
// PipelineState
// ---------------------------------------------------------------------------

/// The orchestrator's single source of truth.
///
/// Forward transitions only: each stage moves the state one step ahead or
/// into `Failed`. `Idle`, `Completed` and `Failed` are terminal; only from
/// those may a new run begin.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    GeneratingImage,
    UploadingMetadata,
    AwaitingMint,
    Completed {
        image: ImageAsset,
        metadata_uri: String,
        tx_hash: String,
    },
    Failed {
        stage: Stage,
        cause: FailureCause,
    },
}

impl PipelineState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::GeneratingImage => "generating_image",
            Self::UploadingMetadata => "uploading_metadata",
            Self::AwaitingMint => "awaiting_mint",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
        }
    }

    /// `true` when no run is in flight.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Idle | Self::Completed { .. } | Self::Failed { .. }
        )
    }

    /// `true` while a run is in flight.
    pub fn is_busy(&self) -> bool {
        !self.is_terminal()
    }

    /// The stage currently executing, if any.
    pub fn active_stage(&self) -> Option<Stage> {
        match self {
            Self::GeneratingImage => Some(Stage::Image),
            Self::UploadingMetadata => Some(Stage::Storage),
            Self::AwaitingMint => Some(Stage::Mint),
            _ => None,
        }
    }

    /// Human-readable status line for this state.
    pub fn status_message(&self) -> String {
        match self {
            Self::Idle => "Ready".to_string(),
            Self::GeneratingImage => Stage::Image.status_message().to_string(),
            Self::UploadingMetadata => Stage::Storage.status_message().to_string(),
            Self::AwaitingMint => Stage::Mint.status_message().to_string(),
            Self::Completed { metadata_uri, .. } => format!("Minted {metadata_uri}"),
            Self::Failed { stage, cause } => format!("Failed at {stage} stage: {cause}"),
        }
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: &PipelineState) -> bool {
        use PipelineState::*;
        match (self, next) {
            (s, GeneratingImage) => s.is_terminal(),
            (s, Idle) => s.is_terminal(),
            (GeneratingImage, UploadingMetadata) => true,
            (UploadingMetadata, AwaitingMint) => true,
            (AwaitingMint, Completed { .. }) => true,
            (s, Failed { stage, .. }) => s.active_stage() == Some(*stage),
            _ => false,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
