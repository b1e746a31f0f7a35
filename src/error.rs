use thiserror::Error;

use crate::types::BufferId;

/// Result type for blob relay operations
pub type BlobResult<T> = Result<T, BlobError>;

/// Errors that can occur during blob relay operations
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("Invalid request: {message}")]
    Invalid { message: String },

    #[error("Operation not supported")]
    Unsupported,

    #[error("Unknown buffer: {id}")]
    BufferNotFound { id: BufferId },

    #[error("Boundary call failed: {source}")]
    Boundary {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl BlobError {
    /// Create a boundary error from any error type
    pub fn boundary<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Boundary {
            source: Box::new(error),
        }
    }

    /// Create an invalid request error
    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create an unknown buffer error
    pub fn buffer_not_found(id: BufferId) -> Self {
        Self::BufferNotFound { id }
    }
}
