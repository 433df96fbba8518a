use std::time::Duration;

use aimint_types::{PipelineState, RunId, Stage};
use serde::Serialize;

// ---------------------------------------------------------------------------
// StageRecord
// ---------------------------------------------------------------------------

/// The outcome of one stage within a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StageRecord {
    pub stage: Stage,
    pub passed: bool,
    /// Failure description when the stage did not pass.
    pub reason: Option<String>,
    /// Wall-clock time spent in the stage.
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// RunReport
// ---------------------------------------------------------------------------

/// Everything a finished run produced.
#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub run_id: RunId,
    /// Terminal state: `Completed` or `Failed`.
    pub state: PipelineState,
    /// Stages actually attempted, in order.
    pub stages: Vec<StageRecord>,
    /// Total wall-clock time of the run.
    pub elapsed: Duration,
}

impl RunReport {
    pub fn is_completed(&self) -> bool {
        matches!(self.state, PipelineState::Completed { .. })
    }

    /// The stage that ended the run, if it failed.
    pub fn failed_stage(&self) -> Option<Stage> {
        match &self.state {
            PipelineState::Failed { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    pub fn metadata_uri(&self) -> Option<&str> {
        match &self.state {
            PipelineState::Completed { metadata_uri, .. } => Some(metadata_uri),
            _ => None,
        }
    }

    pub fn tx_hash(&self) -> Option<&str> {
        match &self.state {
            PipelineState::Completed { tx_hash, .. } => Some(tx_hash),
            _ => None,
        }
    }
}
