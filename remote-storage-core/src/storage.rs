//! [`RemoteStorage`]: the [`Uploader`] implementation built on a [`StorageClient`].

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::UploadOptions;
use crate::contract::{StorageClient, Uploader};
use crate::coordinator::upload_all;
use crate::error::UploadError;
use crate::provision::ensure_bucket;
use crate::upload::upload_object;
use crate::walk::{walk, UploadBatch};

/// Uploads files and directory trees through one shared storage client.
///
/// The client is constructed once by the caller and handed to every upload task
/// explicitly; no process-wide client state is kept.
#[derive(Clone)]
pub struct RemoteStorage {
    client: Arc<dyn StorageClient>,
}

impl RemoteStorage {
    pub fn new(client: Arc<dyn StorageClient>) -> Self {
        Self { client }
    }
}

impl std::fmt::Debug for RemoteStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteStorage").finish_non_exhaustive()
    }
}

#[async_trait]
impl Uploader for RemoteStorage {
    async fn upload_file(
        &self,
        bucket: &str,
        source: &Path,
        destination: &str,
        options: &UploadOptions,
    ) -> Result<(), UploadError> {
        ensure_bucket(self.client.as_ref(), bucket).await?;
        upload_object(self.client.as_ref(), bucket, source, destination, options).await?;
        info!(bucket, dst = destination, "UploadFile success");
        Ok(())
    }

    async fn upload_dir(
        &self,
        bucket: &str,
        source_root: &Path,
        destination_prefix: &str,
        options: &UploadOptions,
    ) -> Result<(), UploadError> {
        ensure_bucket(self.client.as_ref(), bucket).await?;

        let root = source_root.to_path_buf();
        // Directory traversal is blocking filesystem work.
        let mapping = tokio::task::spawn_blocking(move || walk(&root))
            .await
            .map_err(|e| {
                UploadError::filesystem(source_root, std::io::Error::other(e.to_string()))
            })??;
        let batch = UploadBatch::from_mapping(mapping, destination_prefix);

        upload_all(Arc::clone(&self.client), bucket, batch, options).await?;
        info!(bucket, root = %source_root.display(), "UploadDir success");
        Ok(())
    }
}
