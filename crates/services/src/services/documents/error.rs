use thiserror::Error;

use crate::services::storage::StorageError;

/// Failures reported by the backing database or object store.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug, Error)]
pub enum DocumentError {
    /// A local precondition failed; nothing was sent to the backend.
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    /// The operation would break a lifecycle invariant.
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl DocumentError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }
}

impl From<sqlx::Error> for DocumentError {
    fn from(e: sqlx::Error) -> Self {
        Self::Remote(RemoteError::Database(e))
    }
}

impl From<StorageError> for DocumentError {
    fn from(e: StorageError) -> Self {
        Self::Remote(RemoteError::Storage(e))
    }
}
