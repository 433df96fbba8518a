use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// What the caller wants minted: a token name and a description that doubles
/// as the image prompt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreationRequest {
    /// Token name recorded in the metadata document.
    pub name: String,
    /// Token description; also the prompt sent to the image model.
    pub description: String,
}

impl CreationRequest {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }

    /// Check that both fields carry content. Whitespace-only values count
    /// as empty.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyField("name"));
        }
        if self.description.trim().is_empty() {
            return Err(ValidationError::EmptyField("description"));
        }
        Ok(())
    }

    /// The text prompt handed to the image synthesis stage.
    pub fn prompt(&self) -> &str {
        &self.description
    }
}
