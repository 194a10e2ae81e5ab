//! Fan-out upload coordinator.
//!
//! Spawns one tokio task per [`UploadTask`] and waits on two channels: a "done"
//! channel carrying a success token and an "error" channel carrying the failure of
//! a task. Each task sends exactly one signal. The coordinator returns `Ok` once it
//! has counted a success for every task, and returns the first error it receives
//! as soon as it arrives, without waiting for the rest of the batch.
//!
//! Tasks still running when the coordinator returns early are cancelled through a
//! shared [`CancellationToken`]: they stop at their next await point and report
//! nothing. Which error is returned when several tasks fail at once depends on
//! arrival order and is not deterministic.

use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::UploadOptions;
use crate::contract::StorageClient;
use crate::error::UploadError;
use crate::upload::upload_object;
use crate::walk::{UploadBatch, UploadTask};

/// Upload every task of `batch` into `bucket` concurrently.
///
/// With `options.max_in_flight` unset there is one concurrent upload per task.
/// When set, tasks are still spawned up front but each waits for one of
/// `max_in_flight` permits before opening its stream.
pub async fn upload_all(
    client: Arc<dyn StorageClient>,
    bucket: &str,
    batch: UploadBatch,
    options: &UploadOptions,
) -> Result<(), UploadError> {
    let total = batch.len();
    if total == 0 {
        info!(bucket, "Upload batch is empty, nothing to do");
        return Ok(());
    }
    info!(
        bucket,
        files = total,
        max_in_flight = options.max_in_flight.map(|n| n.get()),
        "Starting concurrent upload"
    );

    let cancel = CancellationToken::new();
    // Cancels every task that is still running when this function returns.
    let _cancel_on_return = cancel.clone().drop_guard();

    let limiter = options
        .max_in_flight
        .map(|n| Arc::new(Semaphore::new(n.get())));
    let bucket: Arc<str> = Arc::from(bucket);
    let options = Arc::new(options.clone());
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<()>();
    let (err_tx, mut err_rx) = mpsc::unbounded_channel::<UploadError>();

    for task in batch.into_tasks() {
        tokio::spawn(run_task(
            Arc::clone(&client),
            Arc::clone(&bucket),
            task,
            Arc::clone(&options),
            limiter.clone(),
            cancel.clone(),
            done_tx.clone(),
            err_tx.clone(),
        ));
    }
    // Only the tasks hold senders now; if they all vanish the channels close.
    drop(done_tx);
    drop(err_tx);

    let mut completed = 0;
    while completed < total {
        tokio::select! {
            Some(()) = done_rx.recv() => {
                completed += 1;
            }
            Some(err) = err_rx.recv() => {
                error!(bucket = %bucket, completed, total, error = %err, "Upload batch failed");
                return Err(err);
            }
            else => {
                error!(bucket = %bucket, completed, total, "Upload tasks exited without reporting");
                return Err(UploadError::Incomplete { completed, total });
            }
        }
    }

    info!(bucket = %bucket, files = total, "Upload batch success");
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_task(
    client: Arc<dyn StorageClient>,
    bucket: Arc<str>,
    task: UploadTask,
    options: Arc<UploadOptions>,
    limiter: Option<Arc<Semaphore>>,
    cancel: CancellationToken,
    done_tx: mpsc::UnboundedSender<()>,
    err_tx: mpsc::UnboundedSender<UploadError>,
) {
    let UploadTask {
        source_path,
        destination_key,
    } = task;

    let upload = async {
        // The semaphore is never closed, so a failed acquire only means "no limit".
        let _permit = match limiter {
            Some(sem) => sem.acquire_owned().await.ok(),
            None => None,
        };
        upload_object(
            client.as_ref(),
            &bucket,
            &source_path,
            &destination_key,
            &options,
        )
        .await
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!(dst = %destination_key, "Upload cancelled, batch already failed");
        }
        result = upload => {
            // A closed channel means the coordinator has already returned.
            let _ = match result {
                Ok(()) => done_tx.send(()).map_err(drop),
                Err(e) => err_tx.send(e).map_err(drop),
            };
        }
    }
}
