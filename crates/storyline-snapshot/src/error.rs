//! Snapshot error types.

use storyline_storage::StorageError;
use thiserror::Error;

/// Result type for snapshot operations.
pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Errors that can occur during snapshot operations.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Snapshot not found (never existed or pruned).
    #[error("Snapshot not found: {0}")]
    NotFound(String),

    /// Underlying storage failed.
    #[error("Snapshot storage error: {0}")]
    Storage(#[from] StorageError),

    /// Store configuration is unusable.
    #[error("Invalid snapshot configuration: {0}")]
    InvalidConfig(String),
}

impl SnapshotError {
    /// Create a not found error.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }
}
