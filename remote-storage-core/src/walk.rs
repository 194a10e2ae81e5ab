//! Path walker: turns a local directory tree into an [`UploadBatch`].

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info};
use walkdir::WalkDir;

use crate::error::UploadError;

/// One file to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTask {
    /// Absolute path of an existing regular file.
    pub source_path: PathBuf,
    /// Slash-separated object key, unique within its batch.
    pub destination_key: String,
}

/// All tasks of one directory upload. Fixed once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadBatch {
    tasks: Vec<UploadTask>,
}

impl UploadBatch {
    /// Build a batch from a [`walk`] mapping, placing every key under `prefix`.
    ///
    /// An empty prefix leaves keys equal to the relative path.
    pub fn from_mapping(mapping: BTreeMap<PathBuf, String>, prefix: &str) -> Self {
        let prefix = prefix.trim_matches('/');
        let tasks = mapping
            .into_iter()
            .map(|(source_path, relative)| {
                let destination_key = if prefix.is_empty() {
                    relative
                } else {
                    format!("{prefix}/{relative}")
                };
                UploadTask {
                    source_path,
                    destination_key,
                }
            })
            .collect();
        Self { tasks }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn tasks(&self) -> &[UploadTask] {
        &self.tasks
    }

    pub fn into_tasks(self) -> Vec<UploadTask> {
        self.tasks
    }
}

impl FromIterator<UploadTask> for UploadBatch {
    fn from_iter<I: IntoIterator<Item = UploadTask>>(iter: I) -> Self {
        Self {
            tasks: iter.into_iter().collect(),
        }
    }
}

/// Recursively enumerate every regular file under `root`.
///
/// Returns a mapping from absolute source path to the slash-separated path relative
/// to `root`. Directories and symbolic links produce no entries. A `root` that is
/// not a directory is rejected. The first traversal error aborts the walk; no
/// partial mapping is returned.
pub fn walk(root: &Path) -> Result<BTreeMap<PathBuf, String>, UploadError> {
    let canonical = std::fs::canonicalize(root).map_err(|e| {
        error!(path = %root.display(), error = %e, "Cannot resolve upload root");
        UploadError::filesystem(root, e)
    })?;
    let metadata = std::fs::metadata(&canonical).map_err(|e| UploadError::filesystem(root, e))?;
    if !metadata.is_dir() {
        error!(path = %root.display(), "Upload root is not a directory");
        return Err(UploadError::filesystem(
            root,
            io::Error::new(io::ErrorKind::NotADirectory, "upload root is not a directory"),
        ));
    }
    info!(root = %canonical.display(), "Walking directory for upload");

    let entries = WalkDir::new(&canonical)
        .follow_links(false)
        .into_iter()
        .map(|entry| match entry {
            Ok(entry) => {
                let is_file = entry.file_type().is_file();
                Ok((entry.into_path(), is_file))
            }
            Err(e) => {
                let path = e
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| canonical.clone());
                Err((path, io::Error::from(e)))
            }
        });
    let mapping = collect_files(&canonical, entries)?;

    info!(root = %canonical.display(), files = mapping.len(), "Directory walk complete");
    Ok(mapping)
}

/// Keep the regular files of a traversal, stopping at the first failed entry.
fn collect_files<I>(root: &Path, entries: I) -> Result<BTreeMap<PathBuf, String>, UploadError>
where
    I: IntoIterator<Item = Result<(PathBuf, bool), (PathBuf, io::Error)>>,
{
    let mut mapping = BTreeMap::new();
    for entry in entries {
        let (path, is_file) = entry.map_err(|(path, e)| {
            error!(path = %path.display(), error = %e, "Directory traversal failed");
            UploadError::filesystem(path, e)
        })?;
        if !is_file {
            continue;
        }
        let key = relative_key(root, &path)?;
        debug!(path = %path.display(), key = %key, "Discovered file");
        mapping.insert(path, key);
    }
    Ok(mapping)
}

fn relative_key(root: &Path, path: &Path) -> Result<String, UploadError> {
    let relative = path.strip_prefix(root).map_err(|_| {
        UploadError::filesystem(
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "path escapes upload root"),
        )
    })?;
    let mut segments = Vec::new();
    for component in relative.components() {
        let segment = component.as_os_str().to_str().ok_or_else(|| {
            UploadError::filesystem(
                path,
                io::Error::new(io::ErrorKind::InvalidData, "file name is not valid UTF-8"),
            )
        })?;
        segments.push(segment);
    }
    Ok(segments.join("/"))
}
