//! Outcome aggregation

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::upload::{Summary, UploadOutcome};

/// Counts attempted and failed uploads
///
/// Safe to share between workers: each [`record`](Self::record) is one
/// atomic increment per counter plus one log record, so no outcome is lost
/// or counted twice regardless of completion order.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    attempted: AtomicUsize,
    failed: AtomicUsize,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one outcome, logging failures as they are observed
    pub fn record(&self, outcome: &UploadOutcome) {
        self.attempted.fetch_add(1, Ordering::SeqCst);

        if outcome.succeeded {
            tracing::debug!(
                "Uploaded {} as {}",
                outcome.task.local_path.display(),
                outcome.task.object_key
            );
        } else {
            self.failed.fetch_add(1, Ordering::SeqCst);
            tracing::error!(
                local_path = %outcome.task.local_path.display(),
                key = %outcome.task.object_key,
                "Error uploading {}: {}",
                outcome.task.local_path.display(),
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    /// Current counts
    pub fn summary(&self) -> Summary {
        Summary {
            total_attempted: self.attempted.load(Ordering::SeqCst),
            total_failed: self.failed.load(Ordering::SeqCst),
        }
    }

    /// Close the batch and log the final summary
    pub fn finish(self) -> Summary {
        let summary = self.summary();
        tracing::info!("{}", summary);
        summary
    }
}
