use thiserror::Error;

/// A creation request was rejected before any stage ran.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
}

/// Connectivity failure while talking to a remote service: timeout, DNS,
/// refused or reset connection. Shared by every stage.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("transport error talking to {endpoint}: {message}")]
pub struct TransportError {
    /// The remote endpoint that could not be reached.
    pub endpoint: String,
    /// Underlying failure description.
    pub message: String,
    /// `true` when the request was abandoned because it took too long.
    pub timed_out: bool,
}

impl TransportError {
    pub fn new(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            message: message.into(),
            timed_out: false,
        }
    }

    pub fn timeout(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timed_out: true,
            ..Self::new(endpoint, message)
        }
    }
}
