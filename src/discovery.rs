//! Discovery of files to upload
//!
//! Walks the configured source folders below a root directory and builds the
//! manifest of `(local path, object key)` pairs. Any directory named like the
//! configured exclude folder is pruned wherever it appears below a source
//! folder.
//!
//! Symlinks are never followed. A link pointing at a directory is skipped;
//! any other link, dangling ones included, is treated as a regular file and
//! left for the transfer to accept or reject.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

use crate::error::UploadError;

/// Which folders to scan and which directory name to skip
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Folders relative to the root, scanned in this order
    #[serde(default = "default_source_folders")]
    pub source_folders: Vec<String>,

    /// Directory name pruned at any depth
    #[serde(default = "default_exclude_folder")]
    pub exclude_folder: String,
}

fn default_source_folders() -> Vec<String> {
    vec!["airflow/src".to_string(), "dbt".to_string()]
}

fn default_exclude_folder() -> String {
    "logs".to_string()
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            source_folders: default_source_folders(),
            exclude_folder: default_exclude_folder(),
        }
    }
}

/// A single file to upload and the key it is stored under
///
/// `rejected` carries the reason a discovered file cannot be uploaded (for
/// example a name that is not valid UTF-8). The engine records such tasks
/// as failed without calling the transfer client.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UploadTask {
    pub local_path: PathBuf,
    pub object_key: String,
    pub rejected: Option<String>,
}

impl UploadTask {
    pub fn new(local_path: impl Into<PathBuf>, object_key: impl Into<String>) -> Self {
        Self {
            local_path: local_path.into(),
            object_key: object_key.into(),
            rejected: None,
        }
    }

    /// A discovered file that must be reported as failed instead of uploaded
    pub fn rejected(
        local_path: impl Into<PathBuf>,
        object_key: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            local_path: local_path.into(),
            object_key: object_key.into(),
            rejected: Some(reason.into()),
        }
    }
}

/// Ordered list of files discovered for one invocation
pub type Manifest = Vec<UploadTask>;

/// Why a discovered path has no usable object key
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("{} is not below the root", .0.display())]
    OutsideRoot(PathBuf),

    #[error("{} is not valid UTF-8", .0.display())]
    NotUtf8(PathBuf),
}

/// Build the manifest for `root`.
///
/// Source folders are walked in configured order, each depth-first with
/// entries sorted by name. Missing source folders contribute nothing.
/// Source folders must be plain relative paths; `..`, `.` or absolute
/// folders are rejected with [`UploadError::InvalidSourceFolder`].
///
/// If two source folders overlap, a file is kept the first time its
/// relative path is seen and later duplicates are dropped with a warning.
/// A file whose key cannot be built is kept as a rejected task so it is
/// counted as a failed upload.
///
/// The exclude folder is only pruned below each source folder. A source
/// folder that itself names or lies inside an excluded directory (such as
/// `a/logs`) is scanned, and its keys contain that segment.
pub fn resolve(root: &Path, config: &DiscoveryConfig) -> Result<Manifest, UploadError> {
    if !root.exists() {
        return Err(UploadError::RootNotFound(root.to_path_buf()));
    }

    for folder in &config.source_folders {
        if !is_plain_relative(Path::new(folder)) {
            return Err(UploadError::InvalidSourceFolder(folder.clone()));
        }
    }

    let mut manifest = Vec::new();
    let mut seen_paths: HashSet<PathBuf> = HashSet::new();

    for folder in &config.source_folders {
        let subtree = root.join(folder);
        if !subtree.is_dir() {
            tracing::debug!("Source folder {} not found, skipping", subtree.display());
            continue;
        }

        let walker = WalkDir::new(&subtree)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_excluded(entry, &config.exclude_folder));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry under {}: {}", subtree.display(), e);
                    continue;
                }
            };

            if !is_uploadable(&entry) {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(root)
                .unwrap_or(entry.path())
                .to_path_buf();

            if !seen_paths.insert(relative.clone()) {
                tracing::warn!(
                    "Duplicate path {} from {}, keeping the first occurrence",
                    relative.display(),
                    entry.path().display()
                );
                continue;
            }

            let task = match object_key(root, entry.path()) {
                Ok(key) => UploadTask::new(entry.into_path(), key),
                Err(e) => {
                    tracing::warn!("Cannot derive a key for {}: {}", entry.path().display(), e);
                    let lossy = relative.to_string_lossy().replace('\\', "/");
                    UploadTask::rejected(entry.into_path(), lossy, e.to_string())
                }
            };
            manifest.push(task);
        }
    }

    tracing::debug!("Discovered {} files under {}", manifest.len(), root.display());

    Ok(manifest)
}

/// Derive the object key of `path`: its path relative to `root`, `/`-separated.
///
/// Fails when `path` is not strictly below `root`, when the relative path
/// holds `.`/`..` components, or when a segment is not valid UTF-8.
pub fn object_key(root: &Path, path: &Path) -> Result<String, KeyError> {
    let outside = || KeyError::OutsideRoot(path.to_path_buf());
    let relative = path.strip_prefix(root).map_err(|_| outside())?;

    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                let part = part.to_str().ok_or_else(|| KeyError::NotUtf8(path.to_path_buf()))?;
                segments.push(part);
            }
            _ => return Err(outside()),
        }
    }

    if segments.is_empty() {
        Err(outside())
    } else {
        Ok(segments.join("/"))
    }
}

fn is_plain_relative(folder: &Path) -> bool {
    folder
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
}

/// Locate a project directory named `project_name` next to one of the
/// ancestors of `start`.
///
/// Walks up from the parent of `start`; the first ancestor containing an
/// entry called `project_name` wins. Returns `None` at the filesystem root.
pub fn find_project_root(start: &Path, project_name: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .skip(1)
        .map(|parent| parent.join(project_name))
        .find(|candidate| candidate.exists())
}

// The subtree root itself (depth 0) is never pruned.
fn is_excluded(entry: &DirEntry, exclude_folder: &str) -> bool {
    entry.depth() > 0 && entry.file_type().is_dir() && entry.file_name() == exclude_folder
}

fn is_uploadable(entry: &DirEntry) -> bool {
    let file_type = entry.file_type();
    if file_type.is_dir() {
        false
    } else if file_type.is_symlink() {
        !entry.path().is_dir()
    } else {
        true
    }
}
