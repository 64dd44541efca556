use super::SupervisorError;
use crate::observability::PoolSummary;
use crate::signals::ShutdownSignal;
use crate::worker::{ExitReason, WorkerReport, WorkerRole};
use std::collections::HashMap;
use std::future::Future;
use tokio::sync::mpsc;
use tokio::task::{self, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, warn};

/// Supervisor bookkeeping for one spawned worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerRecord {
    pub worker_id: u32,
    pub role: WorkerRole,
}

/// Live worker set owned by a single supervisor run
///
/// `records` is the ground truth for whether the pool is still running:
/// the monitor loop returns exactly when it becomes empty.
pub(crate) struct WorkerPool {
    tasks: JoinSet<WorkerReport>,
    records: HashMap<task::Id, WorkerRecord>,
    shutdown: CancellationToken,
    summary: PoolSummary,
}

impl WorkerPool {
    pub(crate) fn new(shutdown: CancellationToken) -> Self {
        Self {
            tasks: JoinSet::new(),
            records: HashMap::new(),
            shutdown,
            summary: PoolSummary::default(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn spawn<F>(&mut self, worker_id: u32, role: WorkerRole, worker: F)
    where
        F: Future<Output = WorkerReport> + Send + 'static,
    {
        let span = info_span!(parent: None, "worker", id = worker_id);
        let handle = self.tasks.spawn(worker.instrument(span));
        self.records
            .insert(handle.id(), WorkerRecord { worker_id, role });
    }

    /// Wait for worker exits until none are left
    ///
    /// The first shutdown signal cancels the shared token; any later one
    /// aborts whatever is still running.
    pub(crate) async fn monitor(
        mut self,
        mut signals: mpsc::Receiver<ShutdownSignal>,
    ) -> Result<PoolSummary, SupervisorError> {
        while !self.records.is_empty() {
            tokio::select! {
                Some(signal) = signals.recv() => self.on_signal(signal),
                joined = self.tasks.join_next_with_id() => match joined {
                    Some(Ok((id, report))) => self.retire(id, Ok(report))?,
                    Some(Err(e)) => self.retire(e.id(), Err(e))?,
                    None => {
                        error!(remaining = self.records.len(), "Join set drained with workers still recorded");
                        return Err(SupervisorError::RecordsOrphaned(self.records.len()));
                    }
                },
            }
        }

        info!(
            exited = self.summary.exited,
            saved = self.summary.totals.saved,
            failed = self.summary.totals.failed,
            published = self.summary.totals.urls_published,
            "All workers exited"
        );
        Ok(self.summary)
    }

    fn on_signal(&mut self, signal: ShutdownSignal) {
        if self.shutdown.is_cancelled() {
            warn!(%signal, live = self.records.len(), "Repeated shutdown signal, aborting workers");
            self.tasks.abort_all();
        } else {
            info!(%signal, live = self.records.len(), "Shutdown signal received, stopping all workers");
            self.shutdown.cancel();
        }
    }

    fn retire(
        &mut self,
        id: task::Id,
        outcome: Result<WorkerReport, JoinError>,
    ) -> Result<(), SupervisorError> {
        let Some(record) = self.records.remove(&id) else {
            error!(task = %id, "Exit event does not match any worker");
            return Err(SupervisorError::UnknownWorker(id));
        };
        self.summary.exited += 1;

        match outcome {
            Ok(report) => {
                match report.reason {
                    ExitReason::Cancelled => self.summary.cancelled += 1,
                    ExitReason::IdleTimeout => self.summary.idle_timeouts += 1,
                    ExitReason::Finished => {}
                }
                self.summary.totals.merge(&report.stats);
                info!(
                    worker = record.worker_id,
                    role = %record.role,
                    reason = ?report.reason,
                    remaining = self.records.len(),
                    "Worker exited"
                );
            }
            Err(e) if e.is_cancelled() => {
                self.summary.aborted += 1;
                warn!(worker = record.worker_id, role = %record.role, remaining = self.records.len(), "Worker aborted");
            }
            Err(e) => {
                self.summary.panicked += 1;
                error!(worker = record.worker_id, role = %record.role, error = %e, remaining = self.records.len(), "Worker panicked");
            }
        }
        Ok(())
    }
}
