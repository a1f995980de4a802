//! S3 credential validation
//!
//! The configuration document carries an `s3` section with static
//! credentials and the target bucket. [`RawS3Config`] is that section as
//! written on disk; [`Credentials`] is what remains once every required
//! field has been checked.

use serde::{Deserialize, Serialize};

use crate::error::UploadError;

/// The `s3` section of the configuration document, before validation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawS3Config {
    #[serde(default)]
    pub aws_access_key_id: Option<String>,

    #[serde(default)]
    pub aws_secret_access_key: Option<String>,

    #[serde(default)]
    pub region: Option<String>,

    #[serde(default)]
    pub bucket: Option<String>,

    /// Custom endpoint for S3-compatible stores (MinIO, LocalStack)
    #[serde(default)]
    pub endpoint_url: Option<String>,

    /// Use path-style addressing, required by most S3-compatible stores
    #[serde(default)]
    pub force_path_style: bool,
}

/// Validated static credentials and bucket
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    pub bucket_name: String,
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
}

impl Credentials {
    /// Check every required field of the raw section.
    ///
    /// Access key, secret key and region are checked first and reported
    /// together as [`UploadError::MissingCredentials`]; a missing bucket is
    /// reported separately as [`UploadError::MissingBucket`]. Empty strings
    /// count as missing.
    pub fn validate(raw: &RawS3Config) -> Result<Self, UploadError> {
        let access_key_id = non_empty(&raw.aws_access_key_id);
        let secret_access_key = non_empty(&raw.aws_secret_access_key);
        let region = non_empty(&raw.region);

        let (access_key_id, secret_access_key, region) =
            match (access_key_id, secret_access_key, region) {
                (Some(key), Some(secret), Some(region)) => (key, secret, region),
                _ => return Err(UploadError::MissingCredentials),
            };

        let bucket_name = non_empty(&raw.bucket).ok_or(UploadError::MissingBucket)?;

        Ok(Self {
            access_key_id,
            secret_access_key,
            region,
            bucket_name,
            endpoint_url: non_empty(&raw.endpoint_url),
            force_path_style: raw.force_path_style,
        })
    }
}

// Keep the secret out of logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"***")
            .field("region", &self.region)
            .field("bucket_name", &self.bucket_name)
            .field("endpoint_url", &self.endpoint_url)
            .field("force_path_style", &self.force_path_style)
            .finish()
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
}
