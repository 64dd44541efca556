//! Supervisor: owns the worker pool for one run
//!
//! A run spawns exactly one extraction worker and `pool.worker_num` download
//! workers, then waits for all of them to exit. OS signals are routed into
//! the monitor loop over a channel; workers only ever see the shutdown token.

mod pool;
pub mod process;

pub use pool::WorkerRecord;
pub use process::{EnvError, check_env, daemonize, prepare_process};

use crate::config::Config;
use crate::extract::{Extractor, RegexExtractor};
use crate::fetch::{FetchError, Fetcher, HttpClient};
use crate::observability::PoolSummary;
use crate::queue::{self, QueueError, WorkQueue};
use crate::signals::SignalRouter;
use crate::storage::LocalStorage;
use crate::worker::{
    DownloadWorker, EXTRACTION_ID, ExtractionWorker, FIRST_DOWNLOAD_ID, SUPERVISOR_ID, WorkerRole,
};
use pool::WorkerPool;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span};

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("HTTP client error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Invalid extraction pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Failed to install signal handlers: {0}")]
    Signals(#[source] std::io::Error),

    #[error("Exit of task {0} does not match any worker record")]
    UnknownWorker(tokio::task::Id),

    #[error("Join set drained with {0} worker records left")]
    RecordsOrphaned(usize),
}

pub type Result<T> = std::result::Result<T, SupervisorError>;

/// One pool run
///
/// Collaborators left unset are built from `config`: the queue backend from
/// `[queue]`, an [`HttpClient`] from `[http]` and a [`RegexExtractor`] from
/// `[source]`.
#[derive(bon::Builder)]
pub struct Supervisor {
    config: Config,
    queue: Option<Arc<dyn WorkQueue>>,
    fetcher: Option<Arc<dyn Fetcher>>,
    extractor: Option<Arc<dyn Extractor>>,
    /// Cancelled on the first shutdown signal
    #[builder(default)]
    shutdown: CancellationToken,
}

impl Supervisor {
    /// Run the pool until every worker has exited
    pub async fn run(self) -> Result<PoolSummary> {
        let span = info_span!("worker", id = SUPERVISOR_ID);
        self.run_pool().instrument(span).await
    }

    async fn run_pool(self) -> Result<PoolSummary> {
        let router = SignalRouter::install().map_err(SupervisorError::Signals)?;
        let (signal_tx, signal_rx) = mpsc::channel(4);
        let forwarder = tokio::spawn(router.forward(signal_tx));

        let queue = match self.queue {
            Some(queue) => queue,
            None => queue::connect(&self.config.queue).await?,
        };
        let fetcher: Arc<dyn Fetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpClient::new(&self.config.http)?),
        };
        let extractor: Arc<dyn Extractor> = match self.extractor {
            Some(extractor) => extractor,
            None => Arc::new(RegexExtractor::from_config(&self.config.source)?),
        };

        let mut pool = WorkerPool::new(self.shutdown.clone());

        let extraction = ExtractionWorker::new(
            self.config.source.clone(),
            self.config.queue.key.clone(),
            queue.clone(),
            fetcher.clone(),
            extractor,
            self.shutdown.clone(),
        );
        pool.spawn(EXTRACTION_ID, WorkerRole::Extraction, extraction.run());

        let storage = LocalStorage::new(&self.config.storage);
        for worker_id in (FIRST_DOWNLOAD_ID..).take(self.config.pool.worker_num) {
            let download = DownloadWorker::new(
                self.config.pool.max_idle_polls,
                self.config.pool.idle_interval(),
                self.config.queue.key.clone(),
                queue.clone(),
                fetcher.clone(),
                storage.clone(),
                self.shutdown.clone(),
            );
            pool.spawn(worker_id, WorkerRole::Download, download.run());
        }

        info!(
            workers = pool.len(),
            queue = %self.config.queue.key,
            save_dir = %storage.save_dir().display(),
            "Worker pool started"
        );

        let result = pool.monitor(signal_rx).await;
        forwarder.abort();
        result
    }
}
