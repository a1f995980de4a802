//! S3 client wrapper module
//!
//! This module provides the S3 side of the uploader:
//! - [`client::S3Client`] - aws-sdk-s3 wrapper implementing [`TransferClient`](crate::upload::TransferClient)
//! - [`credentials::Credentials`] - validated static credentials and bucket
//! - [`uploader::S3Uploader`] - raw config in, connected [`UploadEngine`](crate::upload::UploadEngine) out

pub mod client;
pub mod credentials;
pub mod uploader;

// Re-export commonly used types
pub use client::{S3Client, S3ClientConfig};
pub use credentials::{Credentials, RawS3Config};
pub use uploader::S3Uploader;
