//! Upload engine
//!
//! Two scheduling modes share one contract: every manifest entry is
//! attempted exactly once, failures are recorded and never abort the batch,
//! and the returned [`Summary`] does not depend on the mode.

use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::discovery::{self, DiscoveryConfig, Manifest, UploadTask};
use crate::error::UploadError;
use crate::upload::{ResultAggregator, Summary, TransferClient, UploadOutcome};

/// Drives a [`TransferClient`] over a manifest
pub struct UploadEngine<C> {
    client: Arc<C>,
    bucket: String,
}

impl<C: TransferClient + 'static> UploadEngine<C> {
    /// Build an engine from an already connected client and a validated bucket name
    pub fn new(client: Arc<C>, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Target bucket
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Shared transfer client
    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// Discover files under `root` and upload them one at a time
    pub async fn upload_files(
        &self,
        root: &Path,
        discovery: &DiscoveryConfig,
    ) -> Result<Summary, UploadError> {
        let manifest = discovery::resolve(root, discovery)?;
        Ok(self.upload_all(manifest).await)
    }

    /// Discover files under `root` and upload them with up to `worker_limit` in flight
    pub async fn batch_upload_files(
        &self,
        root: &Path,
        discovery: &DiscoveryConfig,
        worker_limit: NonZeroUsize,
    ) -> Result<Summary, UploadError> {
        let manifest = discovery::resolve(root, discovery)?;
        Ok(self.upload_all_concurrent(manifest, worker_limit).await)
    }

    /// Upload every task in manifest order, one at a time.
    ///
    /// A transfer that panics is recorded as a failed upload and the batch
    /// moves on to the next task, as in the concurrent mode.
    pub async fn upload_all(&self, manifest: Manifest) -> Summary {
        tracing::info!(
            "Uploading {} files to bucket {}",
            manifest.len(),
            self.bucket
        );

        let aggregator = ResultAggregator::new();
        for task in manifest {
            let client = Arc::clone(&self.client);
            let bucket = self.bucket.clone();
            let fallback = task.clone();

            // Each transfer runs as its own task so a panic fails one file, not the batch.
            let outcome =
                match tokio::spawn(async move { transfer(client.as_ref(), &bucket, task).await }).await {
                    Ok(outcome) => outcome,
                    Err(e) => UploadOutcome::failure(
                        fallback,
                        format!("upload task terminated abnormally: {}", e),
                    ),
                };
            aggregator.record(&outcome);
        }

        aggregator.finish()
    }

    /// Upload every task with at most `worker_limit` transfers in flight.
    ///
    /// A fixed pool of workers pulls tasks from a shared queue and reports
    /// each outcome over a single results channel. Outcomes arrive in any
    /// order; the batch ends once every worker has exited. A task whose
    /// worker died before reporting is counted as failed.
    pub async fn upload_all_concurrent(&self, manifest: Manifest, worker_limit: NonZeroUsize) -> Summary {
        let total = manifest.len();
        let aggregator = ResultAggregator::new();
        if total == 0 {
            return aggregator.finish();
        }

        let worker_count = worker_limit.get().min(total);
        tracing::info!(
            "Uploading {} files to bucket {} with {} workers",
            total,
            self.bucket,
            worker_count
        );

        let (task_tx, task_rx) = async_channel::bounded::<(usize, UploadTask)>(worker_count);
        let (result_tx, mut result_rx) = mpsc::unbounded_channel::<(usize, UploadOutcome)>();

        let mut workers = JoinSet::new();
        for worker_id in 0..worker_count {
            let tasks = task_rx.clone();
            let results = result_tx.clone();
            let client = Arc::clone(&self.client);
            let bucket = self.bucket.clone();

            workers.spawn(async move {
                while let Ok((index, task)) = tasks.recv().await {
                    let outcome = transfer(client.as_ref(), &bucket, task).await;
                    if results.send((index, outcome)).is_err() {
                        break;
                    }
                }
                tracing::debug!("Upload worker {} finished", worker_id);
            });
        }
        // Only the workers hold these now, so the results channel closes when the last one exits.
        drop(task_rx);
        drop(result_tx);

        let queued = manifest.clone();
        let feeder = tokio::spawn(async move {
            for entry in manifest.into_iter().enumerate() {
                if task_tx.send(entry).await.is_err() {
                    tracing::warn!("All upload workers stopped, no more tasks can be queued");
                    break;
                }
            }
        });

        let mut reported = vec![false; total];
        while let Some((index, outcome)) = result_rx.recv().await {
            reported[index] = true;
            aggregator.record(&outcome);
        }

        if let Err(e) = feeder.await {
            tracing::error!("Upload task feeder failed: {}", e);
        }
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Upload worker terminated abnormally: {}", e);
            }
        }

        for (task, _) in queued
            .into_iter()
            .zip(reported)
            .filter(|(_, reported)| !reported)
        {
            aggregator.record(&UploadOutcome::failure(
                task,
                "upload worker stopped before reporting a result",
            ));
        }

        aggregator.finish()
    }
}

async fn transfer<C: TransferClient + ?Sized>(client: &C, bucket: &str, task: UploadTask) -> UploadOutcome {
    if let Some(reason) = task.rejected.clone() {
        return UploadOutcome::failure(task, reason);
    }

    let result = client
        .upload(&task.local_path, bucket, &task.object_key)
        .await;
    UploadOutcome::from_result(task, result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records every call and fails for a chosen set of keys
    #[derive(Default)]
    struct StubClient {
        failing: HashSet<String>,
        panicking: HashSet<String>,
        delay: Duration,
        calls: Mutex<Vec<(PathBuf, String, String)>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl StubClient {
        fn failing_on(keys: &[String]) -> Self {
            Self {
                failing: keys.iter().cloned().collect(),
                ..Default::default()
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TransferClient for StubClient {
        async fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> anyhow::Result<()> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.calls.lock().unwrap().push((
                local_path.to_path_buf(),
                bucket.to_string(),
                key.to_string(),
            ));

            if self.panicking.contains(key) {
                panic!("stub client panicked on {}", key);
            }
            if self.failing.contains(key) {
                anyhow::bail!("Mock object raised an exception");
            }
            Ok(())
        }
    }

    fn manifest(n: usize) -> Manifest {
        (0..n)
            .map(|i| UploadTask::new(format!("/path{}/source_file_{}", i, i), format!("key/{}", i)))
            .collect()
    }

    fn keys(manifest: &Manifest, indices: &[usize]) -> Vec<String> {
        indices.iter().map(|&i| manifest[i].object_key.clone()).collect()
    }

    fn engine(client: StubClient) -> UploadEngine<StubClient> {
        UploadEngine::new(Arc::new(client), "mockbucket")
    }

    fn workers(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[tokio::test]
    async fn test_upload_all_calls_client_for_every_task() {
        let tasks = manifest(2);
        let engine = engine(StubClient::default());

        let summary = engine.upload_all(tasks.clone()).await;

        assert_eq!(summary, Summary { total_attempted: 2, total_failed: 0 });
        let calls = engine.client().calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                (tasks[0].local_path.clone(), "mockbucket".to_string(), "key/0".to_string()),
                (tasks[1].local_path.clone(), "mockbucket".to_string(), "key/1".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_upload_all_continues_after_failure() {
        let tasks = manifest(2);
        let engine = engine(StubClient::failing_on(&keys(&tasks, &[0])));

        let summary = engine.upload_all(tasks).await;

        assert_eq!(summary, Summary { total_attempted: 2, total_failed: 1 });
        let calls = engine.client().calls.lock().unwrap();
        assert_eq!(calls.last().unwrap().2, "key/1");
    }

    #[tokio::test]
    async fn test_upload_all_concurrent_continues_after_failure() {
        let tasks = manifest(2);
        let engine = engine(StubClient::failing_on(&keys(&tasks, &[0])));

        let summary = engine.upload_all_concurrent(tasks, workers(2)).await;

        assert_eq!(summary, Summary { total_attempted: 2, total_failed: 1 });
        assert_eq!(engine.client().call_count(), 2);
    }

    #[tokio::test]
    async fn test_failure_patterns_match_across_modes() {
        let n = 7;
        let tasks = manifest(n);
        let patterns: Vec<Vec<usize>> = vec![
            vec![],
            (0..n).collect(),
            vec![0],
            vec![n - 1],
            vec![1, 3, 5],
        ];

        for pattern in patterns {
            let failing = keys(&tasks, &pattern);
            let expected = Summary {
                total_attempted: n,
                total_failed: pattern.len(),
            };

            let sequential = engine(StubClient::failing_on(&failing))
                .upload_all(tasks.clone())
                .await;
            assert_eq!(sequential, expected, "sequential, pattern {:?}", pattern);

            for limit in [1, n, n + 10] {
                let concurrent = engine(StubClient::failing_on(&failing))
                    .upload_all_concurrent(tasks.clone(), workers(limit))
                    .await;
                assert_eq!(
                    concurrent, expected,
                    "concurrent with {} workers, pattern {:?}",
                    limit, pattern
                );
            }
        }
    }

    #[tokio::test]
    async fn test_empty_manifest_is_a_no_op() {
        let engine = engine(StubClient::default());

        assert_eq!(engine.upload_all(Vec::new()).await, Summary::default());
        assert_eq!(
            engine.upload_all_concurrent(Vec::new(), workers(4)).await,
            Summary::default()
        );
        assert_eq!(engine.client().call_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_is_bounded_by_worker_limit() {
        let engine = engine(StubClient::default().with_delay(Duration::from_millis(20)));

        let summary = engine.upload_all_concurrent(manifest(12), workers(3)).await;

        assert_eq!(summary.total_attempted, 12);
        let max = engine.client().max_in_flight.load(Ordering::SeqCst);
        assert!(max <= 3, "saw {} uploads in flight", max);
        assert!(max >= 2, "expected parallel uploads, saw {}", max);
    }

    #[tokio::test]
    async fn test_sequential_mode_has_one_upload_in_flight() {
        let engine = engine(StubClient::default().with_delay(Duration::from_millis(5)));

        engine.upload_all(manifest(4)).await;

        assert_eq!(engine.client().max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_every_task_attempted_exactly_once_concurrently() {
        let tasks = manifest(50);
        let engine = engine(StubClient::default());

        engine.upload_all_concurrent(tasks.clone(), workers(8)).await;

        let mut uploaded: Vec<String> = engine
            .client()
            .calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, _, key)| key.clone())
            .collect();
        uploaded.sort();
        let mut expected: Vec<String> = tasks.into_iter().map(|t| t.object_key).collect();
        expected.sort();
        assert_eq!(uploaded, expected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_worker_panic_is_counted_as_failure() {
        let tasks = manifest(5);
        let client = StubClient {
            panicking: keys(&tasks, &[1]).into_iter().collect(),
            ..Default::default()
        };
        let engine = engine(client);

        let summary = engine.upload_all_concurrent(tasks, workers(2)).await;

        assert_eq!(summary, Summary { total_attempted: 5, total_failed: 1 });
    }

    #[tokio::test]
    async fn test_sequential_panic_is_counted_as_failure() {
        let tasks = manifest(5);
        let client = StubClient {
            panicking: keys(&tasks, &[1]).into_iter().collect(),
            ..Default::default()
        };
        let engine = engine(client);

        let summary = engine.upload_all(tasks).await;

        assert_eq!(summary, Summary { total_attempted: 5, total_failed: 1 });
        assert_eq!(engine.client().call_count(), 5);
    }

    #[tokio::test]
    async fn test_rejected_task_fails_without_calling_client() {
        let mut tasks = manifest(3);
        tasks[1] = UploadTask::rejected("/path1/f\u{fffd}", "a/f\u{fffd}", "name is not valid UTF-8");

        let sequential = engine(StubClient::default());
        let summary = sequential.upload_all(tasks.clone()).await;
        assert_eq!(summary, Summary { total_attempted: 3, total_failed: 1 });
        assert_eq!(sequential.client().call_count(), 2);

        let concurrent = engine(StubClient::default());
        let summary = concurrent.upload_all_concurrent(tasks, workers(2)).await;
        assert_eq!(summary, Summary { total_attempted: 3, total_failed: 1 });
        assert_eq!(concurrent.client().call_count(), 2);
    }

    #[tokio::test]
    async fn test_upload_files_missing_root() {
        let engine = engine(StubClient::default());
        let dir = tempfile::TempDir::new().unwrap();

        let result = engine
            .upload_files(&dir.path().join("missing"), &DiscoveryConfig::default())
            .await;

        assert!(matches!(result, Err(UploadError::RootNotFound(_))));
        assert_eq!(engine.client().call_count(), 0);
    }

    #[tokio::test]
    async fn test_batch_upload_files_resolves_and_uploads() {
        let dir = tempfile::TempDir::new().unwrap();
        for relative in ["a/x.txt", "a/logs/skip.txt", "b/y.txt"] {
            let path = dir.path().join(relative);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, relative).unwrap();
        }
        let discovery = DiscoveryConfig {
            source_folders: vec!["a".to_string(), "b".to_string()],
            exclude_folder: "logs".to_string(),
        };
        let engine = engine(StubClient::failing_on(&["b/y.txt".to_string()]));

        let summary = engine
            .batch_upload_files(dir.path(), &discovery, workers(2))
            .await
            .unwrap();

        assert_eq!(summary, Summary { total_attempted: 2, total_failed: 1 });
        let mut uploaded: Vec<String> = engine
            .client()
            .calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, _, key)| key.clone())
            .collect();
        uploaded.sort();
        assert_eq!(uploaded, vec!["a/x.txt", "b/y.txt"]);
    }
}
