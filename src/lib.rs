//! S3 Uploader Library
//!
//! Bulk uploader that ships the configured source folders of a local
//! directory tree to an S3 bucket. Individual file failures are logged and
//! counted without aborting the batch.
//!
//! Flow: [`discovery::resolve`] builds the manifest, an
//! [`upload::UploadEngine`] (usually obtained from [`s3::S3Uploader::connect`])
//! transfers it sequentially or with a bounded worker pool, and the
//! [`upload::Summary`] reports what was attempted and what failed.

pub mod cli;
pub mod discovery;
pub mod error;
pub mod s3;
pub mod settings;
pub mod upload;

pub use error::UploadError;
