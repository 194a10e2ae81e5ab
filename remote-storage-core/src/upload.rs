//! Single-file upload operation.

use std::path::Path;

use tracing::{debug, info};

use crate::config::UploadOptions;
use crate::contract::StorageClient;
use crate::error::UploadError;

/// Upload the full content of `source` to `bucket/key`.
///
/// Order of operations: open the remote stream, set the content type (if any),
/// read the whole file into memory, write it in one call, close. The first failing
/// step aborts; a half-written remote object is not cleaned up.
pub async fn upload_object(
    client: &dyn StorageClient,
    bucket: &str,
    source: &Path,
    key: &str,
    options: &UploadOptions,
) -> Result<(), UploadError> {
    info!(src = %source.display(), dst = key, "Upload: {} ---> {}", source.display(), key);

    let mut sink = client
        .open_write_stream(bucket, key)
        .await
        .map_err(|e| UploadError::transfer(key, e))?;
    if let Some(content_type) = options.content_type.as_deref() {
        sink.set_content_type(content_type);
    }

    let bytes = tokio::fs::read(source)
        .await
        .map_err(|e| UploadError::filesystem(source, e))?;
    debug!(dst = key, size = bytes.len(), "Read source file");

    sink.write(&bytes)
        .await
        .map_err(|e| UploadError::transfer(key, e))?;
    sink.close()
        .await
        .map_err(|e| UploadError::transfer(key, e))?;

    debug!(dst = key, "Upload success");
    Ok(())
}
