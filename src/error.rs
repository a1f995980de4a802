//! Error types for the uploader
//!
//! Only fatal conditions live here. A failed transfer of a single file is
//! recorded as an [`UploadOutcome`](crate::upload::UploadOutcome) and never
//! surfaces as an `UploadError`.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors that abort an upload invocation before any transfer starts
#[derive(Debug, Error)]
pub enum UploadError {
    /// The root directory to scan does not exist
    #[error("Root path not found: {}", .0.display())]
    RootNotFound(PathBuf),

    /// Access key, secret key or region is missing from the `s3` section
    #[error("S3 credentials not found.")]
    MissingCredentials,

    /// Bucket name is missing from the `s3` section
    #[error("S3 bucket name not found.")]
    MissingBucket,

    /// The configuration document could not be read or parsed
    #[error("Failed to load configuration from {}: {reason}", path.display())]
    ConfigFile { path: PathBuf, reason: String },

    /// The S3 client could not be built from validated credentials
    #[error("Failed to create S3 client: {0}")]
    ClientSetup(String),

    /// A source folder is absolute or contains `.`/`..` components
    #[error("Source folder must be a plain path below the root: {0}")]
    InvalidSourceFolder(String),
}

impl UploadError {
    /// Whether the error comes from configuration rather than the filesystem
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            UploadError::MissingCredentials
                | UploadError::MissingBucket
                | UploadError::ConfigFile { .. }
                | UploadError::ClientSetup(_)
                | UploadError::InvalidSourceFolder(_)
        )
    }
}
