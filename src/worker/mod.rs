//! Pool workers
//!
//! Both worker kinds run as tokio tasks spawned by the supervisor. They share
//! nothing but the work queue and their own copy of the configuration, and
//! they stop cooperatively when the shutdown token is cancelled.

pub mod download;
pub mod extraction;

pub use download::DownloadWorker;
pub use extraction::ExtractionWorker;

use crate::observability::WorkerStats;
use std::fmt;

/// Worker id reserved for the supervisor itself
pub const SUPERVISOR_ID: u32 = 0;
/// Worker id of the single extraction worker
pub const EXTRACTION_ID: u32 = 1;
/// Id of the first download worker; the rest follow consecutively
pub const FIRST_DOWNLOAD_ID: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerRole {
    Extraction,
    Download,
}

impl fmt::Display for WorkerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerRole::Extraction => f.write_str("extraction"),
            WorkerRole::Download => f.write_str("download"),
        }
    }
}

/// Why a worker left its loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The listing ran out of pages
    Finished,
    /// No work was seen for the whole idle ceiling
    IdleTimeout,
    /// Shutdown was requested
    Cancelled,
}

/// Returned by every worker task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerReport {
    pub reason: ExitReason,
    pub stats: WorkerStats,
}

impl WorkerReport {
    pub fn new(reason: ExitReason, stats: WorkerStats) -> Self {
        Self { reason, stats }
    }
}
