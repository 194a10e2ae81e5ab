//! # remote-storage CLI Interface (Module)
//!
//! Command parsing and dispatch for the `remote-storage` binary. All upload
//! behaviour lives in `remote-storage-core`; this module only turns arguments and
//! the optional config file into calls on an [`Uploader`].
//!
//! - [`Cli`] defines the user-facing options and subcommands.
//! - [`run`] is the async entrypoint used by `main` and integration tests.
//! - [`dispatch`] executes a command against any [`Uploader`], so it can be driven
//!   by a mock in tests.
use crate::load_config::{gcs_config, load_config, CliConfig};
use anyhow::Result;
use clap::{Parser, Subcommand};
use remote_storage_core::gcs::GcsClient;
use remote_storage_core::{RemoteStorage, UploadOptions, Uploader};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;

/// CLI for remote-storage: upload files and directory trees to a storage bucket.
#[derive(Parser, Debug)]
#[clap(
    name = "remote-storage",
    version,
    about = "Upload a file or a whole directory tree to a cloud storage bucket"
)]
pub struct Cli {
    /// Path to an optional YAML config file
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Upload a single file
    File {
        /// Target bucket, created if absent
        #[clap(long)]
        bucket: String,
        /// Local file to upload
        #[clap(long)]
        source: PathBuf,
        /// Object key in the bucket
        #[clap(long)]
        destination: String,
        /// MIME type set on the object
        #[clap(long)]
        content_type: Option<String>,
    },
    /// Upload every regular file under a directory, keyed by relative path
    Dir {
        /// Target bucket, created if absent
        #[clap(long)]
        bucket: String,
        /// Local directory to upload
        #[clap(long)]
        source: PathBuf,
        /// Key prefix for every uploaded object
        #[clap(long, default_value = "")]
        prefix: String,
        /// MIME type set on every object
        #[clap(long)]
        content_type: Option<String>,
        /// Maximum concurrent uploads (one per file when omitted)
        #[clap(long)]
        max_in_flight: Option<NonZeroUsize>,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => CliConfig::default(),
    };
    let client = GcsClient::new(gcs_config(&config.storage)?)?;
    let storage = RemoteStorage::new(Arc::new(client));

    dispatch(cli.command, &config.upload, &storage).await
}

/// Run `command` against `uploader`. Flags override the config file's upload options.
pub async fn dispatch<U>(command: Commands, defaults: &UploadOptions, uploader: &U) -> Result<()>
where
    U: Uploader + ?Sized,
{
    match command {
        Commands::File {
            bucket,
            source,
            destination,
            content_type,
        } => {
            let options = merge_options(defaults, content_type, None);
            tracing::info!(command = "file", bucket = %bucket, src = %source.display(), dst = %destination, "Starting file upload");
            match uploader
                .upload_file(&bucket, &source, &destination, &options)
                .await
            {
                Ok(()) => {
                    tracing::info!(command = "file", "Upload complete");
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "file", error = %e, "Upload failed");
                    Err(e.into())
                }
            }
        }
        Commands::Dir {
            bucket,
            source,
            prefix,
            content_type,
            max_in_flight,
        } => {
            let options = merge_options(defaults, content_type, max_in_flight);
            tracing::info!(command = "dir", bucket = %bucket, src = %source.display(), prefix = %prefix, "Starting directory upload");
            match uploader.upload_dir(&bucket, &source, &prefix, &options).await {
                Ok(()) => {
                    tracing::info!(command = "dir", "Upload complete");
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "dir", error = %e, "Upload failed");
                    Err(e.into())
                }
            }
        }
    }
}

fn merge_options(
    defaults: &UploadOptions,
    content_type: Option<String>,
    max_in_flight: Option<NonZeroUsize>,
) -> UploadOptions {
    UploadOptions {
        content_type: content_type.or_else(|| defaults.content_type.clone()),
        max_in_flight: max_in_flight.or(defaults.max_in_flight),
    }
}
