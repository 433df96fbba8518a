use aimint_types::TransportError;

/// Errors from the image synthesis stage.
#[derive(Debug, thiserror::Error)]
pub enum SynthError {
    /// The prompt was empty; no request was sent.
    #[error("prompt must not be empty")]
    EmptyPrompt,

    /// The inference service answered with a non-success status.
    #[error("inference service returned {status}: {body}")]
    Remote { status: u16, body: String },

    /// The inference service could not be reached.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The client could not be built from its configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result alias for synthesis operations.
pub type SynthResult<T> = Result<T, SynthError>;
