//! Download loop: pop a URL, save it, put it back if the save failed

use super::{ExitReason, WorkerReport};
use crate::fetch::Fetcher;
use crate::observability::WorkerStats;
use crate::queue::WorkQueue;
use crate::storage::{LocalStorage, SaveOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub struct DownloadWorker {
    idle_ceiling: u32,
    idle_interval: Duration,
    queue_key: String,
    queue: Arc<dyn WorkQueue>,
    fetcher: Arc<dyn Fetcher>,
    storage: LocalStorage,
    shutdown: CancellationToken,
}

impl DownloadWorker {
    pub fn new(
        idle_ceiling: u32,
        idle_interval: Duration,
        queue_key: String,
        queue: Arc<dyn WorkQueue>,
        fetcher: Arc<dyn Fetcher>,
        storage: LocalStorage,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            idle_ceiling,
            idle_interval,
            queue_key,
            queue,
            fetcher,
            storage,
            shutdown,
        }
    }

    /// Run until the idle ceiling is reached or shutdown is requested
    ///
    /// The idle counter resets whenever a URL is popped, so the ceiling is
    /// measured from the last piece of work rather than across the lifetime.
    pub async fn run(self) -> WorkerReport {
        info!("Download worker started");
        let mut stats = WorkerStats::default();
        let mut idle: u32 = 0;

        while idle < self.idle_ceiling {
            if self.shutdown.is_cancelled() {
                return self.cancelled(stats);
            }

            let popped = match self.queue.pop_random_member(&self.queue_key).await {
                Ok(popped) => popped,
                Err(e) => {
                    warn!(error = %e, "Queue pop failed");
                    None
                }
            };

            let Some(url) = popped else {
                idle += 1;
                stats.idle_ticks += 1;
                info!(idle, ceiling = self.idle_ceiling, "No work available");

                tokio::select! {
                    _ = self.shutdown.cancelled() => return self.cancelled(stats),
                    _ = tokio::time::sleep(self.idle_interval) => {}
                }
                continue;
            };

            idle = 0;
            let result = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    self.requeue(&url, &mut stats).await;
                    return self.cancelled(stats);
                }
                result = self.storage.save_resource(self.fetcher.as_ref(), &url) => result,
            };

            match result {
                Ok(SaveOutcome::Saved { path, bytes }) => {
                    stats.saved += 1;
                    info!(url, bytes, path = %path.display(), "Download succeeded");
                }
                Ok(SaveOutcome::AlreadyExists { path }) => {
                    stats.already_present += 1;
                    info!(url, path = %path.display(), "Download succeeded, file already present");
                }
                Err(e) => {
                    stats.failed += 1;
                    warn!(url, error = %e, "Download failed");
                    self.requeue(&url, &mut stats).await;
                }
            }
        }

        info!(ceiling = self.idle_ceiling, "Idle ceiling reached, download worker exiting");
        WorkerReport::new(ExitReason::IdleTimeout, stats)
    }

    async fn requeue(&self, url: &str, stats: &mut WorkerStats) {
        match self
            .queue
            .add_members(&self.queue_key, &[url.to_string()])
            .await
        {
            Ok(_) => stats.requeued += 1,
            Err(e) => error!(url, error = %e, "Failed to re-queue URL, item dropped"),
        }
    }

    fn cancelled(&self, stats: WorkerStats) -> WorkerReport {
        info!("Download worker stopping on shutdown");
        WorkerReport::new(ExitReason::Cancelled, stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::fetch::{self, ByteStream, FetchError};
    use crate::humanize::ByteSize;
    use crate::queue::MemoryQueue;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Serves a small body for every URL except the ones marked broken
    #[derive(Default)]
    struct FlakyFetcher {
        broken: HashSet<String>,
        opened: AtomicUsize,
    }

    #[async_trait]
    impl Fetcher for FlakyFetcher {
        async fn get_text(&self, _url: &str) -> fetch::Result<String> {
            Ok(String::new())
        }

        async fn open_stream(&self, url: &str) -> fetch::Result<ByteStream> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            if self.broken.contains(url) {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: 503,
                });
            }
            let body: std::io::Result<Bytes> = Ok(Bytes::from(url.to_string()));
            Ok(Box::pin(futures_util::stream::iter(vec![body])))
        }
    }

    fn worker(
        dir: &TempDir,
        ceiling: u32,
        queue: Arc<MemoryQueue>,
        fetcher: Arc<FlakyFetcher>,
    ) -> DownloadWorker {
        DownloadWorker::new(
            ceiling,
            Duration::from_millis(10),
            "urls".to_string(),
            queue,
            fetcher,
            LocalStorage::new(&StorageConfig {
                save_dir: dir.path().join("out"),
                chunk_size: ByteSize(4),
            }),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn test_drains_queue_then_idles_out() {
        let dir = TempDir::new().unwrap();
        let queue = Arc::new(MemoryQueue::new());
        queue
            .add_members(
                "urls",
                &["http://cdn.test/a.jpg".to_string(), "http://cdn.test/b.jpg".to_string()],
            )
            .await
            .unwrap();

        let report = worker(&dir, 2, queue.clone(), Arc::new(FlakyFetcher::default()))
            .run()
            .await;

        assert_eq!(report.reason, ExitReason::IdleTimeout);
        assert_eq!(report.stats.saved, 2);
        assert_eq!(report.stats.idle_ticks, 2);
        assert!(queue.is_empty("urls").await.unwrap());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("out/a.jpg")).unwrap(),
            "http://cdn.test/a.jpg"
        );
        assert!(dir.path().join("out/b.jpg").exists());
    }

    #[tokio::test]
    async fn test_idle_worker_consumes_nothing() {
        let dir = TempDir::new().unwrap();
        let queue = Arc::new(MemoryQueue::new());
        let fetcher = Arc::new(FlakyFetcher::default());

        let report = worker(&dir, 3, queue, fetcher.clone()).run().await;

        assert_eq!(report.reason, ExitReason::IdleTimeout);
        assert_eq!(report.stats.idle_ticks, 3);
        assert_eq!(report.stats, WorkerStats { idle_ticks: 3, ..WorkerStats::default() });
        assert_eq!(fetcher.opened.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_url_is_requeued() {
        let dir = TempDir::new().unwrap();
        let queue = Arc::new(MemoryQueue::new());
        queue
            .add_members("urls", &["http://cdn.test/broken.jpg".to_string()])
            .await
            .unwrap();
        let fetcher = Arc::new(FlakyFetcher {
            broken: HashSet::from(["http://cdn.test/broken.jpg".to_string()]),
            ..FlakyFetcher::default()
        });

        let worker = worker(&dir, 2, queue.clone(), fetcher.clone());
        let shutdown = worker.shutdown.clone();
        let handle = tokio::spawn(worker.run());

        // Let the worker cycle the broken URL a few times
        while fetcher.opened.load(Ordering::SeqCst) < 5 {
            tokio::task::yield_now().await;
        }
        shutdown.cancel();
        let report = handle.await.unwrap();

        assert_eq!(report.reason, ExitReason::Cancelled);
        assert!(report.stats.failed >= 5);
        assert_eq!(report.stats.saved, 0);
        assert_eq!(queue.len("urls").await.unwrap(), 1);
        assert!(!dir.path().join("out/broken.jpg").exists());
    }
}
