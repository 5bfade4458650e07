//! Storage error taxonomy.
//!
//! Every failure produced by the factory or a backend is a [`StorageError`].
//! Errors coming out of OpenDAL keep their original value as the `source`
//! so callers can walk the chain down to the root cause.

use thiserror::Error;

/// Boxed cause attached to connection and I/O failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the storage module.
pub type Result<T, E = StorageError> = std::result::Result<T, E>;

/// Errors returned by storage settings, the factory and backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A setting required by the selected driver is empty.
    #[error("missing storage configuration: {0}")]
    MissingConfiguration(&'static str),

    /// The configured driver name is not one of the supported drivers.
    #[error("no valid filestorage driver found for {0:?}")]
    UnknownDriver(String),

    /// The backend medium could not be reached.
    #[error("unable to connect to the {backend} backend: {source}")]
    ConnectionFailure {
        backend: &'static str,
        #[source]
        source: BoxError,
    },

    /// The path does not exist.
    #[error("file not found: {0}")]
    NotFound(String),

    /// The path is malformed or would escape the backend root.
    #[error("invalid path: {0:?}")]
    InvalidPath(String),

    /// Any other read/write/copy/move failure.
    #[error("failed to {op} {path:?}: {source}")]
    IoFailure {
        op: &'static str,
        path: String,
        #[source]
        source: BoxError,
    },
}

impl StorageError {
    /// Wrap a failure to reach `backend`.
    pub fn connection(backend: &'static str, source: impl Into<BoxError>) -> Self {
        StorageError::ConnectionFailure {
            backend,
            source: source.into(),
        }
    }

    /// Wrap a generic I/O failure of `op` on `path`.
    pub fn io(op: &'static str, path: impl Into<String>, source: impl Into<BoxError>) -> Self {
        StorageError::IoFailure {
            op,
            path: path.into(),
            source: source.into(),
        }
    }

    /// Translate an OpenDAL error, keeping `NotFound` distinct.
    pub(crate) fn from_opendal(op: &'static str, path: &str, err: opendal::Error) -> Self {
        match err.kind() {
            opendal::ErrorKind::NotFound => StorageError::NotFound(path.to_string()),
            _ => StorageError::io(op, path, err),
        }
    }

    /// Whether this error means the path is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}
