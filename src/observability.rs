//! Log subscriber setup and per-worker counters

use crate::config::LoggingConfig;
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Install the global `tracing` subscriber
///
/// `RUST_LOG` takes precedence over `logging.filter`. With `logging.file` set,
/// output is appended to that file without ANSI colors, which is the only
/// useful sink once the process has detached from its terminal.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), AnyError> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.filter))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match &config.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).try_init()
        }
        None => builder.try_init(),
    }
}

/// Counters kept by a single worker and handed back when it exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub pages_fetched: u64,
    pub urls_published: u64,
    pub saved: u64,
    pub already_present: u64,
    pub failed: u64,
    pub requeued: u64,
    pub idle_ticks: u64,
}

impl WorkerStats {
    pub fn merge(&mut self, other: &WorkerStats) {
        self.pages_fetched += other.pages_fetched;
        self.urls_published += other.urls_published;
        self.saved += other.saved;
        self.already_present += other.already_present;
        self.failed += other.failed;
        self.requeued += other.requeued;
        self.idle_ticks += other.idle_ticks;
    }
}

/// Totals for the whole pool, built by the supervisor as workers exit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolSummary {
    pub exited: usize,
    pub cancelled: usize,
    pub idle_timeouts: usize,
    pub aborted: usize,
    pub panicked: usize,
    pub totals: WorkerStats,
}
