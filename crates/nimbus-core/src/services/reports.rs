//! Report submission: deliver now when possible, queue otherwise.

use std::sync::Arc;

use crate::jobs::{JobSpec, Scheduler};
use crate::models::{MutationId, ReportPayload};
use crate::remote::RemoteStore;
use crate::services::LocalStore;
use crate::Result;

/// What happened to a submitted report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Accepted by the remote store immediately
    Delivered(MutationId),
    /// Durably queued for a background sync pass
    Queued { id: MutationId, reason: String },
}

impl SubmitOutcome {
    pub const fn id(&self) -> &MutationId {
        match self {
            Self::Delivered(id) | Self::Queued { id, .. } => id,
        }
    }
}

#[derive(Clone)]
pub struct ReportService {
    store: LocalStore,
    remote: Option<Arc<dyn RemoteStore>>,
    scheduler: Option<Scheduler>,
}

impl ReportService {
    /// `remote` is `None` when running fully offline.
    pub fn new(store: LocalStore, remote: Option<Arc<dyn RemoteStore>>) -> Self {
        Self {
            store,
            remote,
            scheduler: None,
        }
    }

    /// Request a `sync_reports` pass whenever a report has to be queued.
    #[must_use]
    pub fn with_scheduler(mut self, scheduler: Scheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Validate and submit a report.
    ///
    /// The report is written to the local queue before any network call, so
    /// its id doubles as the idempotency key for the immediate push and for
    /// every later retry. Validation errors are returned; delivery failures
    /// are not.
    pub async fn submit(&self, payload: ReportPayload) -> Result<SubmitOutcome> {
        let queued = self.store.enqueue(payload).await?;

        let reason = match self.remote.as_deref() {
            Some(remote) => match remote.push(&queued.payload, &queued.id).await {
                Ok(_) => {
                    self.store.mark_synced(&queued.id).await?;
                    tracing::info!(id = %queued.id, "Report delivered");
                    return Ok(SubmitOutcome::Delivered(queued.id));
                }
                Err(error) => {
                    let reason = error.to_string();
                    self.store.mark_failed(&queued.id, &reason).await?;
                    reason
                }
            },
            None => "offline".to_string(),
        };

        tracing::info!(id = %queued.id, "Report queued: {reason}");
        if let Some(scheduler) = &self.scheduler {
            scheduler.schedule(JobSpec::sync_reports()).await;
        }
        Ok(SubmitOutcome::Queued {
            id: queued.id,
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::SYNC_REPORTS_JOB;
    use crate::models::{sample_payload, SyncState};
    use crate::remote::MemoryRemoteStore;
    use crate::Error;

    #[tokio::test(flavor = "multi_thread")]
    async fn online_submit_is_delivered() {
        let store = LocalStore::open_in_memory().unwrap();
        let remote = Arc::new(MemoryRemoteStore::new());
        let service = ReportService::new(store.clone(), Some(remote.clone()));

        let outcome = service.submit(sample_payload("A", 1_000)).await.unwrap();

        assert!(matches!(outcome, SubmitOutcome::Delivered(_)));
        assert!(remote.contains_report(outcome.id()));
        let row = store.get_mutation(outcome.id()).await.unwrap().unwrap();
        assert_eq!(row.state, SyncState::Synced);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_push_queues_and_requests_sync() {
        let store = LocalStore::open_in_memory().unwrap();
        let remote = Arc::new(MemoryRemoteStore::new());
        remote.set_unavailable(true);
        let scheduler = Scheduler::default();
        let service = ReportService::new(store.clone(), Some(remote))
            .with_scheduler(scheduler.clone());

        let outcome = service.submit(sample_payload("A", 1_000)).await.unwrap();

        assert!(matches!(outcome, SubmitOutcome::Queued { .. }));
        assert_eq!(store.list_pending().await.unwrap().len(), 1);
        assert!(scheduler.registration(SYNC_REPORTS_JOB).await.is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn offline_submit_is_queued() {
        let store = LocalStore::open_in_memory().unwrap();
        let service = ReportService::new(store.clone(), None);

        let outcome = service.submit(sample_payload("A", 1_000)).await.unwrap();

        assert_eq!(
            outcome,
            SubmitOutcome::Queued {
                id: *outcome.id(),
                reason: "offline".to_string(),
            }
        );
        let row = store.get_mutation(outcome.id()).await.unwrap().unwrap();
        assert_eq!(row.attempts, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn invalid_report_is_rejected_before_queueing() {
        let store = LocalStore::open_in_memory().unwrap();
        let service = ReportService::new(store.clone(), None);
        let mut payload = sample_payload("A", 1_000);
        payload.latitude = 123.0;

        let error = service.submit(payload).await.unwrap_err();

        assert!(matches!(error, Error::InvalidInput(_)));
        assert!(store.list_pending().await.unwrap().is_empty());
    }
}
