use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A record with the same unique key already exists.
    #[error("profile `{name}` already exists")]
    Conflict { name: String },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Construct a conflict error for a profile name that is already taken.
    pub fn conflict(name: impl Into<String>) -> Self {
        StorageError::Conflict { name: name.into() }
    }
}
