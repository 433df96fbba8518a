use std::time::Duration;

use aimint_chain::MintError;
use aimint_store::StorageError;
use aimint_synth::SynthError;
use aimint_types::{FailureCause, FailureKind, SpendOutcome, Stage, TransportError};

/// Conversion of a stage error into the cause recorded in `Failed`.
pub trait IntoFailureCause {
    fn failure_cause(&self) -> FailureCause;
}

impl IntoFailureCause for TransportError {
    fn failure_cause(&self) -> FailureCause {
        let kind = if self.timed_out {
            FailureKind::Timeout
        } else {
            FailureKind::Transport
        };
        FailureCause::new(kind, self.to_string())
    }
}

impl IntoFailureCause for SynthError {
    fn failure_cause(&self) -> FailureCause {
        match self {
            SynthError::Transport(t) => t.failure_cause(),
            other => FailureCause::new(FailureKind::Synthesis, other.to_string()),
        }
    }
}

impl IntoFailureCause for StorageError {
    fn failure_cause(&self) -> FailureCause {
        match self {
            StorageError::Transport(t) => t.failure_cause(),
            other => FailureCause::new(FailureKind::Storage, other.to_string()),
        }
    }
}

impl IntoFailureCause for MintError {
    fn failure_cause(&self) -> FailureCause {
        let cause = match self {
            MintError::Transport(t) => t.failure_cause(),
            MintError::ConfirmationLost { .. } => {
                FailureCause::new(FailureKind::Unconfirmed, self.to_string())
            }
            other => FailureCause::new(FailureKind::Mint, other.to_string()),
        };
        cause.with_spend(self.spend())
    }
}

/// Cause recorded when a mint was broadcast but not seen confirmed.
pub(crate) fn unconfirmed(tx_hash: &str) -> FailureCause {
    FailureCause::new(
        FailureKind::Unconfirmed,
        format!("transaction {tx_hash} was broadcast but not confirmed"),
    )
    .with_spend(SpendOutcome::TransactionLive {
        tx_hash: tx_hash.to_string(),
    })
}

/// Cause recorded when a stage exceeds the configured timeout.
pub(crate) fn stage_timeout(stage: Stage, limit: Duration) -> FailureCause {
    FailureCause::new(
        FailureKind::Timeout,
        format!("{stage} stage exceeded {}s", limit.as_secs_f64()),
    )
    .with_spend(abandoned_spend(stage))
}

/// Cause recorded when a claimed run is dropped before it settles.
pub(crate) fn aborted(stage: Stage) -> FailureCause {
    FailureCause::new(
        FailureKind::Aborted,
        format!("run dropped during {stage} stage"),
    )
    .with_spend(abandoned_spend(stage))
}

// A mint abandoned mid-flight may or may not have been broadcast.
fn abandoned_spend(stage: Stage) -> SpendOutcome {
    match stage {
        Stage::Mint => SpendOutcome::Unknown,
        Stage::Image | Stage::Storage => SpendOutcome::NothingSpent,
    }
}
