//! # contract: seams between the upload pipeline and the outside world
//!
//! - [`StorageClient`] and [`ObjectSink`] describe the authenticated object-storage
//!   backend. The pipeline only ever creates buckets and streams objects into them.
//! - [`Uploader`] is the public interface offered to callers (CLI, tests, other crates).
//!
//! ## Mocking & Testing
//! - All traits are annotated for `mockall`, so consumers can generate deterministic
//!   mocks with the default `test-export-mocks` feature.

use std::path::Path;

use async_trait::async_trait;

#[allow(unused_imports)]
use mockall::{automock, predicate::*};

use crate::config::UploadOptions;
use crate::error::{StorageError, UploadError};

/// A writable handle to one remote object.
///
/// Data becomes visible only after a successful [`ObjectSink::close`]. A sink that
/// is dropped without being closed may leave nothing, or an incomplete object, behind.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ObjectSink: Send {
    /// Set the MIME type of the object. Must be called before the first write.
    fn set_content_type(&mut self, content_type: &str);

    async fn write(&mut self, buf: &[u8]) -> Result<(), StorageError>;

    async fn close(&mut self) -> Result<(), StorageError>;
}

/// Authenticated object-storage client.
///
/// Shared read-only between concurrent upload tasks, hence `Send + Sync`.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Issue a create-bucket request. Backends report an existing bucket owned by
    /// the caller with [`crate::error::StorageErrorKind::AlreadyOwned`].
    async fn create_bucket(&self, bucket: &str) -> Result<(), StorageError>;

    /// Open a write stream to `bucket/key`.
    async fn open_write_stream(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Box<dyn ObjectSink>, StorageError>;
}

/// Public upload operations.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Upload one local file to `bucket/destination`, creating the bucket if absent.
    async fn upload_file(
        &self,
        bucket: &str,
        source: &Path,
        destination: &str,
        options: &UploadOptions,
    ) -> Result<(), UploadError>;

    /// Upload every regular file under `source_root`, keyed by its path relative to
    /// the root (under `destination_prefix` when non-empty).
    async fn upload_dir(
        &self,
        bucket: &str,
        source_root: &Path,
        destination_prefix: &str,
        options: &UploadOptions,
    ) -> Result<(), UploadError>;
}
