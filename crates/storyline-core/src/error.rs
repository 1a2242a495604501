//! Error types for the core crate.

use serde::{Deserialize, Serialize};
use storyline_snapshot::SnapshotError;
use storyline_storage::StorageError;
use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A story, version, snapshot or variation reference does not resolve.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation is not allowed in the current state.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// A caller-supplied value was rejected before anything was persisted.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation would lose edits or clash with other changes.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Snapshot store error other than a missing snapshot.
    #[error("snapshot error: {0}")]
    Snapshot(SnapshotError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<SnapshotError> for CoreError {
    fn from(err: SnapshotError) -> Self {
        match err {
            SnapshotError::NotFound(id) => Self::NotFound(format!("snapshot {id}")),
            SnapshotError::Storage(e) => Self::Storage(e),
            other => Self::Snapshot(other),
        }
    }
}

impl CoreError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation(message.into())
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Classify this error for callers across the command boundary.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidOperation(_) => ErrorKind::InvalidOperation,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Config(_)
            | Self::Storage(_)
            | Self::Snapshot(_)
            | Self::Io(_)
            | Self::Json(_) => ErrorKind::Internal,
        }
    }
}

/// Error taxonomy exposed to the UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidOperation,
    InvalidArgument,
    Conflict,
    Internal,
}

/// Configuration-specific errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid JSON/JSONC syntax.
    #[error("invalid config at {path}: {message}")]
    InvalidJson { path: String, message: String },

    /// Config validation failed.
    #[error("config validation failed: {message}")]
    Validation { message: String },

    /// Invalid path (e.g., could not determine the data directory).
    #[error("invalid path: {0}")]
    InvalidPath(String),
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
