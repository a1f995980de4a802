//! Configuration document loading
//!
//! The document is JSON by default, YAML when the file ends in `.yaml` or
//! `.yml`. Without an explicit path it is read from the platform-specific
//! app config folder:
//! - Linux: ~/.config/s3-uploader/conf.json
//! - Windows: %APPDATA%/s3-uploader/config/conf.json
//! - macOS: ~/Library/Application Support/org.s3-uploader.s3-uploader/conf.json

use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::discovery::DiscoveryConfig;
use crate::error::UploadError;
use crate::s3::credentials::RawS3Config;

/// File name looked up in the platform config folder
pub const CONFIG_FILE_NAME: &str = "conf.json";

/// Everything read from the configuration document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Credentials and bucket. A missing section is reported when connecting.
    #[serde(default)]
    pub s3: RawS3Config,

    /// Folders to scan and the directory name to skip
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Worker count for batch mode; sequential when unset
    #[serde(default)]
    pub max_workers: Option<NonZeroUsize>,
}

impl Settings {
    /// Load settings from the given document
    pub fn load(path: &Path) -> Result<Self, UploadError> {
        let contents = fs::read_to_string(path).map_err(|e| UploadError::ConfigFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let settings = Self::parse(&contents, is_yaml(path)).map_err(|reason| {
            UploadError::ConfigFile {
                path: path.to_path_buf(),
                reason,
            }
        })?;

        tracing::info!(
            "Loaded settings from {:?}: source_folders={:?}, exclude_folder={:?}, max_workers={:?}",
            path,
            settings.discovery.source_folders,
            settings.discovery.exclude_folder,
            settings.max_workers
        );

        Ok(settings)
    }

    /// Load settings from the platform config folder
    pub fn load_default() -> Result<Self, UploadError> {
        let path = Self::settings_path().ok_or_else(|| UploadError::ConfigFile {
            path: PathBuf::from(CONFIG_FILE_NAME),
            reason: "Failed to determine settings directory".to_string(),
        })?;
        Self::load(&path)
    }

    /// Get the path to the default settings file
    pub fn settings_path() -> Option<PathBuf> {
        ProjectDirs::from("org", "s3-uploader", "s3-uploader")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    fn parse(contents: &str, yaml: bool) -> Result<Self, String> {
        if yaml {
            serde_yaml::from_str(contents).map_err(|e| e.to_string())
        } else {
            serde_json::from_str(contents).map_err(|e| e.to_string())
        }
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}
