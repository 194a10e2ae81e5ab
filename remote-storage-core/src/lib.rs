#![doc = "remote-storage-core: upload logic for remote-storage."]

//! This crate contains everything needed to push a single file or a whole local
//! directory tree into a cloud object-storage bucket.
//!
//! # Layout
//! - [`contract`]: the storage collaborator seams ([`contract::StorageClient`],
//!   [`contract::ObjectSink`]) and the public [`contract::Uploader`] interface.
//! - [`walk`]: enumerates regular files under a root into an [`walk::UploadBatch`].
//! - [`upload`]: the single-file upload operation.
//! - [`coordinator`]: concurrent fan-out of a batch, first failure wins.
//! - [`provision`]: idempotent "ensure bucket exists".
//! - [`storage`]: [`storage::RemoteStorage`], tying the above together.
//! - [`gcs`]: HTTP client for the Google Cloud Storage JSON API.
//!
//! # Usage
//! Construct a [`gcs::GcsClient`] (or any [`contract::StorageClient`]), wrap it in a
//! [`storage::RemoteStorage`] and call the [`contract::Uploader`] methods.

pub mod config;
pub mod contract;
pub mod coordinator;
pub mod error;
pub mod gcs;
pub mod provision;
pub mod storage;
pub mod upload;
pub mod walk;

pub use config::UploadOptions;
pub use contract::{ObjectSink, StorageClient, Uploader};
pub use error::{StorageError, StorageErrorKind, UploadError};
pub use storage::RemoteStorage;
