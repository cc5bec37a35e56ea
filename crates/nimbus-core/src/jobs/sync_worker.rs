//! Pushes queued reports to the remote store.

use std::sync::Arc;

use async_trait::async_trait;

use super::{Job, WorkResult, WorkSummary};
use crate::remote::RemoteStore;
use crate::services::LocalStore;

/// Per-pass counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncPassReport {
    pub synced: usize,
    pub failed: usize,
}

impl SyncPassReport {
    /// Map the counters onto the scheduler outcome.
    pub fn outcome(&self) -> WorkResult {
        match (self.synced, self.failed) {
            (synced, 0) => WorkResult::success(synced),
            (0, failed) => WorkResult::Retry(format!("{failed} report(s) failed to sync")),
            (synced, _) => WorkResult::Success(WorkSummary {
                affected: synced,
                reschedule: true,
            }),
        }
    }
}

/// Drains the pending queue in FIFO order, one push per mutation.
#[derive(Clone)]
pub struct SyncWorker {
    store: LocalStore,
    remote: Arc<dyn RemoteStore>,
}

impl SyncWorker {
    pub fn new(store: LocalStore, remote: Arc<dyn RemoteStore>) -> Self {
        Self { store, remote }
    }

    /// Run a single pass. A failure to list the queue is returned as an error.
    pub async fn sync_pass(&self) -> crate::Result<SyncPassReport> {
        let pending = self.store.list_pending().await?;
        let mut report = SyncPassReport::default();
        if pending.is_empty() {
            tracing::debug!("No pending reports to sync");
            return Ok(report);
        }

        tracing::info!("Syncing {} pending report(s)", pending.len());
        for mutation in pending {
            match self.remote.push(&mutation.payload, &mutation.id).await {
                Ok(ack) => match self.store.mark_synced(&mutation.id).await {
                    Ok(()) => {
                        tracing::debug!(
                            id = %mutation.id,
                            duplicate = ack.duplicate,
                            "Report synced"
                        );
                        report.synced += 1;
                    }
                    Err(error) => {
                        // Row stays pending; the next push is a no-op remotely
                        tracing::warn!(
                            id = %mutation.id,
                            "Report pushed but could not be marked synced: {error}"
                        );
                        report.failed += 1;
                    }
                },
                Err(remote_error) => {
                    let message = remote_error.to_string();
                    tracing::warn!(id = %mutation.id, "Report push failed: {message}");
                    if let Err(error) = self.store.mark_failed(&mutation.id, &message).await {
                        tracing::warn!(id = %mutation.id, "Failed to record push error: {error}");
                    }
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            synced = report.synced,
            failed = report.failed,
            "Sync pass finished"
        );
        Ok(report)
    }
}

#[async_trait]
impl Job for SyncWorker {
    async fn run(&self) -> WorkResult {
        match self.sync_pass().await {
            Ok(report) => report.outcome(),
            Err(error) => {
                tracing::warn!("Sync pass could not read the queue: {error}");
                WorkResult::Retry(error.to_string())
            }
        }
    }
}
