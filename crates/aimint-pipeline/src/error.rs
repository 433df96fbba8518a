use aimint_types::ValidationError;

/// Reasons a run is refused before any stage executes.
///
/// Stage failures are not errors at this level: they end the run in a
/// `Failed` state reported through the [`RunReport`](crate::RunReport).
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    /// Another run is in flight.
    #[error("pipeline is busy ({state})")]
    Busy { state: &'static str },

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result alias for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
