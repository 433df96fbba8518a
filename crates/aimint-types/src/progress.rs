use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::asset::ImageAsset;
use crate::state::PipelineState;

/// Identifier of a single pipeline run (UUID v7, time-ordered).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RunId({})", self.0)
    }
}

/// Notification emitted on every pipeline state transition.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// The run this transition belongs to.
    pub run_id: RunId,
    /// State entered by the transition.
    pub state: PipelineState,
    /// Human-readable status line.
    pub message: String,
    /// The generated image, attached as soon as it exists.
    pub image: Option<ImageAsset>,
    /// Wall-clock time of the transition.
    pub at: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn new(run_id: RunId, state: PipelineState) -> Self {
        Self {
            run_id,
            message: state.status_message(),
            state,
            image: None,
            at: Utc::now(),
        }
    }

    pub fn with_image(mut self, image: ImageAsset) -> Self {
        self.image = Some(image);
        self
    }

    /// Short stage label for log or UI consumers.
    pub fn stage_name(&self) -> &'static str {
        self.state.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Stage;

    #[test]
    fn run_ids_are_unique() {
        let a = RunId::new();
        let b = RunId::new();
        assert_ne!(a, b);
        assert_eq!(a.as_uuid().get_version_num(), 7);
    }

    #[test]
    fn event_message_follows_state() {
        let event = ProgressEvent::new(RunId::new(), Stage::Storage.running_state());
        assert_eq!(event.message, "Uploading Image...");
        assert_eq!(event.stage_name(), "uploading_metadata");
        assert!(event.image.is_none());
    }

    #[test]
    fn event_carries_image() {
        let image = ImageAsset::new(b"ABC".to_vec(), "image/png");
        let event = ProgressEvent::new(RunId::new(), PipelineState::UploadingMetadata)
            .with_image(image.clone());
        assert_eq!(event.image, Some(image));
    }
}
