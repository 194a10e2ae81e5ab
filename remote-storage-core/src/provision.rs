//! Bucket provisioning: idempotent "ensure bucket exists".

use tracing::{error, info};

use crate::contract::StorageClient;
use crate::error::{StorageError, StorageErrorKind, UploadError};

/// Message fragment some backends return instead of a structured code when the
/// caller already owns the bucket.
const ALREADY_OWNED_MESSAGE: &str = "already own";

/// Create `bucket`, treating "already exists and owned by this caller" as success.
///
/// Any other failure is returned as [`UploadError::Provisioning`] and must abort the
/// upload before any file is transferred.
pub async fn ensure_bucket(client: &dyn StorageClient, bucket: &str) -> Result<(), UploadError> {
    match client.create_bucket(bucket).await {
        Ok(()) => {
            info!(bucket, "Created bucket");
            Ok(())
        }
        Err(e) if is_already_owned(&e) => {
            info!(bucket, "Bucket already exists and is owned by caller");
            Ok(())
        }
        Err(e) => {
            error!(bucket, error = %e, kind = ?e.kind(), "Bucket provisioning failed");
            Err(UploadError::Provisioning {
                bucket: bucket.to_string(),
                source: e,
            })
        }
    }
}

fn is_already_owned(err: &StorageError) -> bool {
    match err.kind() {
        StorageErrorKind::AlreadyOwned => true,
        StorageErrorKind::Other => err.message.contains(ALREADY_OWNED_MESSAGE),
        _ => false,
    }
}
