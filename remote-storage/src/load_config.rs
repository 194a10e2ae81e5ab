//! `load_config` module: Loads a static YAML config and injects secrets from the environment.
//!
//! # Responsibilities
//! - Parse the user-supplied YAML file into type-safe structs
//! - Fill in storage settings missing from the file from `GCS_*` environment variables
//! - Inject the access token, which is never read from YAML, from `GCS_ACCESS_TOKEN`
//!
//! # Accepted schema
//! ```yaml
//! storage:
//!   project: my-project
//!   endpoint: https://storage.googleapis.com   # optional
//! upload:
//!   content_type: text/html                    # optional
//!   max_in_flight: 32                          # optional, unbounded when absent
//! ```
//!
//! # Errors
//! All errors use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::{anyhow, Result};
use remote_storage_core::gcs::GcsConfig;
use remote_storage_core::UploadOptions;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{error, info};

#[derive(Debug, Default, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub upload: UploadOptions,
}

#[derive(Debug, Default, Deserialize)]
pub struct StorageSection {
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// Loads a static YAML config file (no secrets).
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow!("Failed to read config file {:?}: {}", path_ref, e));
        }
    };

    let config: CliConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow!("Failed to parse config YAML: {e}"));
        }
    };
    config.upload.trace_loaded();
    Ok(config)
}

/// Build the storage client settings: file values first, then `GCS_PROJECT_ID` /
/// `GCS_ENDPOINT`, with the token always taken from `GCS_ACCESS_TOKEN`.
pub fn gcs_config(storage: &StorageSection) -> Result<GcsConfig> {
    let config = GcsConfig::from_env_with(storage.project.clone(), storage.endpoint.clone())?;
    info!(project = %config.project, endpoint = %config.endpoint, "Resolved storage settings");
    Ok(config)
}
