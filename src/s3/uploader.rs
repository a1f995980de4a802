//! Two-phase construction of an S3-backed upload engine
//!
//! Building an [`S3Uploader`] only stores the raw `s3` section. Credentials
//! are checked in [`S3Uploader::connect`], so a misconfigured document is
//! reported on first use rather than at construction, and exactly once.

use std::sync::Arc;

use crate::error::UploadError;
use crate::s3::client::S3Client;
use crate::s3::credentials::{Credentials, RawS3Config};
use crate::upload::UploadEngine;

/// Unvalidated uploader holding the raw `s3` configuration section
#[derive(Debug, Clone)]
pub struct S3Uploader {
    raw: RawS3Config,
}

impl S3Uploader {
    /// Wrap a raw configuration section. Never fails.
    pub fn new(raw: RawS3Config) -> Self {
        Self { raw }
    }

    /// The raw section this uploader was built from
    pub fn raw_config(&self) -> &RawS3Config {
        &self.raw
    }

    /// Validate the credentials without building a client
    pub fn credentials(&self) -> Result<Credentials, UploadError> {
        Credentials::validate(&self.raw)
    }

    /// Validate the configuration and build an engine around an S3 client
    pub async fn connect(&self) -> Result<UploadEngine<S3Client>, UploadError> {
        let creds = self.credentials()?;
        let client = S3Client::connect(&creds)
            .await
            .map_err(|e| UploadError::ClientSetup(format!("{:#}", e)))?;

        tracing::info!(
            "Connected to S3: bucket={}, region={}",
            creds.bucket_name,
            client.region()
        );

        Ok(UploadEngine::new(Arc::new(client), creds.bucket_name))
    }
}
