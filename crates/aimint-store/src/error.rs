use aimint_types::TransportError;

/// Errors from metadata store operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The record carried no image bytes.
    #[error("image payload is empty")]
    EmptyImage,

    /// The backend answered the upload with a failure.
    #[error("storage backend returned {status}: {message}")]
    Rejected { status: u16, message: String },

    /// The upload could not be assembled (e.g. unparseable content type).
    #[error("malformed upload: {0}")]
    Malformed(String),

    /// The backend acknowledged the upload but its response was unusable.
    #[error("unexpected storage response: {0}")]
    InvalidResponse(String),

    /// Serialization of the metadata document failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The backend could not be reached.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The client could not be built from its configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StorageError>;
