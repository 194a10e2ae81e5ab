//! Error types for remote-storage-core.
//!
//! [`StorageError`] is what a storage collaborator reports. [`UploadError`] is what
//! the public operations return; each variant keeps the underlying error untouched
//! as its source.

use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a storage backend failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorKind {
    /// The bucket already exists and belongs to the caller.
    AlreadyOwned,
    /// Name conflict with a resource owned by someone else.
    Conflict,
    Unauthenticated,
    PermissionDenied,
    NotFound,
    QuotaExceeded,
    /// The request never produced an HTTP response (DNS, TLS, connection reset...).
    Transport,
    Other,
}

/// Error reported by a [`crate::contract::StorageClient`] or [`crate::contract::ObjectSink`].
#[derive(Error, Debug)]
#[error("{message}")]
pub struct StorageError {
    pub kind: StorageErrorKind,
    /// HTTP status code, when the failure came from a response.
    pub status: Option<u16>,
    pub message: String,
}

impl StorageError {
    pub fn new(kind: StorageErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn kind(&self) -> StorageErrorKind {
        self.kind
    }
}

/// Top-level error type for upload operations.
#[derive(Error, Debug)]
pub enum UploadError {
    /// Credentials or client configuration are malformed; raised before any network call.
    #[error("invalid storage credentials: {0}")]
    Auth(String),

    /// Bucket creation failed for a reason other than "already owned".
    #[error("failed to provision bucket '{bucket}': {source}")]
    Provisioning {
        bucket: String,
        #[source]
        source: StorageError,
    },

    /// Local read or directory traversal failure.
    #[error("filesystem error at {}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Remote open/write/close failed for one object.
    #[error("upload of '{key}' failed: {source}")]
    Transfer {
        key: String,
        #[source]
        source: StorageError,
    },

    /// Every task went away before the batch completed (a task panicked).
    #[error("upload batch ended early: {completed} of {total} files reported success")]
    Incomplete { completed: usize, total: usize },
}

impl UploadError {
    pub(crate) fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        UploadError::Filesystem {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn transfer(key: impl Into<String>, source: StorageError) -> Self {
        UploadError::Transfer {
            key: key.into(),
            source,
        }
    }
}
