//! Upload orchestration
//!
//! This module drives a [`TransferClient`] over a manifest:
//! - [`engine::UploadEngine`] - sequential and bounded-concurrent scheduling
//! - [`aggregator::ResultAggregator`] - attempted/failed counters and failure records
//!
//! A failed file never aborts the batch; it is logged, counted and reported
//! in the final [`Summary`].

use std::fmt;
use std::path::Path;

use async_trait::async_trait;

use crate::discovery::UploadTask;

pub mod aggregator;
pub mod engine;

pub use aggregator::ResultAggregator;
pub use engine::UploadEngine;

/// Anything able to put one local file into a bucket
///
/// Implementations are shared between upload workers and must tolerate
/// concurrent calls.
#[async_trait]
pub trait TransferClient: Send + Sync {
    /// Upload `local_path` to `bucket` under `key`, resolving once the
    /// transfer has succeeded or failed.
    async fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> anyhow::Result<()>;
}

/// Result of one upload attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub task: UploadTask,
    pub succeeded: bool,
    pub error: Option<String>,
}

impl UploadOutcome {
    pub fn success(task: UploadTask) -> Self {
        Self {
            task,
            succeeded: true,
            error: None,
        }
    }

    pub fn failure(task: UploadTask, error: impl Into<String>) -> Self {
        Self {
            task,
            succeeded: false,
            error: Some(error.into()),
        }
    }

    /// Build an outcome from the client's result; errors keep their full context chain
    pub fn from_result(task: UploadTask, result: anyhow::Result<()>) -> Self {
        match result {
            Ok(()) => Self::success(task),
            Err(e) => Self::failure(task, format!("{:#}", e)),
        }
    }
}

/// Aggregate counts for one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub total_attempted: usize,
    pub total_failed: usize,
}

impl Summary {
    pub fn total_succeeded(&self) -> usize {
        self.total_attempted - self.total_failed
    }

    pub fn is_complete_success(&self) -> bool {
        self.total_failed == 0
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files found, {} files failed to upload.",
            self.total_attempted, self.total_failed
        )
    }
}
