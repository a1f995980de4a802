//! AWS S3 client wrapper

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

use crate::s3::credentials::Credentials;
use crate::upload::TransferClient;

/// Connection settings for building an [`S3Client`]
///
/// Any field left as `None` falls back to the default AWS provider chain
/// (environment, profile, instance metadata).
#[derive(Debug, Clone, Default)]
pub struct S3ClientConfig {
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
    pub region: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

impl From<&Credentials> for S3ClientConfig {
    fn from(creds: &Credentials) -> Self {
        Self {
            endpoint_url: creds.endpoint_url.clone(),
            force_path_style: creds.force_path_style,
            region: Some(creds.region.clone()),
            access_key_id: Some(creds.access_key_id.clone()),
            secret_access_key: Some(creds.secret_access_key.clone()),
        }
    }
}

/// S3 client wrapper with high-level operations
///
/// The underlying SDK client is cheap to clone and safe to share between
/// upload workers.
#[derive(Clone)]
pub struct S3Client {
    client: Client,
    current_region: String,
}

impl S3Client {
    /// Create a client from explicit connection settings
    pub async fn with_config(config: S3ClientConfig) -> Result<Self> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if let Some(region) = &config.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }

        match (&config.access_key_id, &config.secret_access_key) {
            (Some(key), Some(secret)) => {
                let static_creds = aws_sdk_s3::config::Credentials::new(
                    key.clone(),
                    secret.clone(),
                    None,
                    None,
                    "s3-uploader",
                );
                loader = loader.credentials_provider(static_creds);
            }
            (None, None) => {}
            _ => anyhow::bail!("Both access key and secret key must be provided"),
        }

        let sdk_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }
        builder = builder.force_path_style(config.force_path_style);

        let current_region = sdk_config
            .region()
            .map(|r| r.to_string())
            .unwrap_or_else(|| "us-east-1".to_string());

        tracing::debug!(
            "Created S3 client: region={}, endpoint={:?}",
            current_region,
            config.endpoint_url
        );

        Ok(Self {
            client: Client::from_conf(builder.build()),
            current_region,
        })
    }

    /// Create a client authenticated with validated static credentials
    pub async fn connect(creds: &Credentials) -> Result<Self> {
        Self::with_config(S3ClientConfig::from(creds)).await
    }

    /// Stream a local file into the bucket under the given key
    pub async fn upload_file(&self, local_path: &Path, bucket: &str, key: &str) -> Result<()> {
        let body = ByteStream::from_path(local_path)
            .await
            .with_context(|| format!("Failed to open {}", local_path.display()))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| anyhow!("PutObject s3://{}/{} failed: {}", bucket, key, DisplayErrorContext(&e)))?;

        Ok(())
    }

    /// Create a bucket.
    ///
    /// Setup helper for the integration tests; uploads never create buckets.
    pub async fn create_bucket(&self, bucket: &str) -> Result<()> {
        self.client
            .create_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| anyhow!("CreateBucket {} failed: {}", bucket, DisplayErrorContext(&e)))?;

        Ok(())
    }

    /// Download an object to bytes.
    ///
    /// Verification helper for the integration tests.
    pub async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| anyhow!("GetObject s3://{}/{} failed: {}", bucket, key, DisplayErrorContext(&e)))?;

        let data = response.body.collect().await?;
        Ok(data.into_bytes().to_vec())
    }

    /// Get the current region
    pub fn region(&self) -> &str {
        &self.current_region
    }
}

#[async_trait]
impl TransferClient for S3Client {
    async fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> Result<()> {
        self.upload_file(local_path, bucket, key).await
    }
}
