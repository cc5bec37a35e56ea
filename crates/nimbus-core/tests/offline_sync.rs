use std::sync::Arc;
use std::time::Duration;

use nimbus_core::jobs::{
    BackoffPolicy, JobSpec, JobTable, Scheduler, SyncWorker, WorkResult, WorkSummary,
    SYNC_REPORTS_JOB,
};
use nimbus_core::remote::MemoryRemoteStore;
use nimbus_core::{LocalStore, ReportPayload, ReportService, SubmitOutcome, SyncState};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

fn report(label: &str, created_at: i64) -> ReportPayload {
    ReportPayload {
        user_id: "user-1".to_string(),
        location_id: format!("loc-{}", label.to_ascii_lowercase()),
        location_label: label.to_string(),
        latitude: 38.72,
        longitude: -9.14,
        condition: "Rain".to_string(),
        intensity: 2,
        temperature_c: Some(12.0),
        humidity_pct: Some(90),
        wind_speed_kmh: Some(18.0),
        note: "  steady drizzle  ".to_string(),
        created_at,
    }
}

fn immediate_followup_scheduler() -> Scheduler {
    Scheduler::new(JobTable::new(BackoffPolicy::default(), Duration::ZERO))
}

async fn run_due(scheduler: &Scheduler) -> Vec<WorkResult> {
    let mut results = Vec::new();
    for handle in scheduler.dispatch_due().await {
        results.push(handle.await.unwrap());
    }
    results
}

#[tokio::test(flavor = "multi_thread")]
async fn offline_reports_sync_after_rejection_is_fixed() {
    let tmp = tempdir().unwrap();
    let db_path = tmp.path().join("nimbus.db");
    let remote = Arc::new(MemoryRemoteStore::new());
    remote.set_unavailable(true);

    // Three reports captured while offline
    let ids = {
        let store = LocalStore::open_path(&db_path).unwrap();
        let service = ReportService::new(store, Some(remote.clone()));
        let mut ids = Vec::new();
        for (label, at) in [("A", 1_000), ("B", 2_000), ("C", 3_000)] {
            let outcome = service.submit(report(label, at)).await.unwrap();
            assert!(matches!(outcome, SubmitOutcome::Queued { .. }));
            ids.push(*outcome.id());
        }
        ids
    };
    let (a, b, c) = (ids[0], ids[1], ids[2]);

    // The queue survives a restart
    let store = LocalStore::open_path(&db_path).unwrap();
    assert_eq!(store.list_pending().await.unwrap().len(), 3);

    let scheduler = immediate_followup_scheduler();
    scheduler
        .register_job(
            SYNC_REPORTS_JOB,
            Arc::new(SyncWorker::new(store.clone(), remote.clone())),
        )
        .await;
    scheduler.schedule(JobSpec::sync_reports()).await;

    // Still no connectivity: nothing runs
    assert!(run_due(&scheduler).await.is_empty());

    remote.set_unavailable(false);
    remote.reject(b, "invalid coordinates");
    scheduler.set_connectivity(true).await;

    let results = run_due(&scheduler).await;
    assert_eq!(
        results,
        vec![WorkResult::Success(WorkSummary {
            affected: 2,
            reschedule: true,
        })]
    );
    for id in [&a, &c] {
        let row = store.get_mutation(id).await.unwrap().unwrap();
        assert_eq!(row.state, SyncState::Synced);
    }
    let rejected = store.get_mutation(&b).await.unwrap().unwrap();
    assert_eq!(rejected.state, SyncState::Pending);
    assert_eq!(rejected.last_error.as_deref(), Some("invalid coordinates"));
    let registration = scheduler.registration(SYNC_REPORTS_JOB).await.unwrap();
    assert_eq!(registration.attempt, 0);

    // Backend fixed: the follow-up pass delivers B
    remote.clear_rejections();
    let results = run_due(&scheduler).await;
    assert_eq!(results, vec![WorkResult::success(1)]);

    let delivered = store.get_mutation(&b).await.unwrap().unwrap();
    assert_eq!(delivered.state, SyncState::Synced);
    assert!(store.list_pending().await.unwrap().is_empty());
    assert!(scheduler.registration(SYNC_REPORTS_JOB).await.is_none());
    assert_eq!(remote.report_count(), 3);
    for id in [&a, &b, &c] {
        assert!(remote.contains_report(id));
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn full_outage_backs_off() {
    let store = LocalStore::open_in_memory().unwrap();
    let remote = Arc::new(MemoryRemoteStore::new());
    let scheduler = immediate_followup_scheduler();
    scheduler
        .register_job(
            SYNC_REPORTS_JOB,
            Arc::new(SyncWorker::new(store.clone(), remote.clone())),
        )
        .await;
    scheduler.set_connectivity(true).await;

    store.enqueue(report("A", 1_000)).await.unwrap();
    store.enqueue(report("B", 2_000)).await.unwrap();
    remote.set_unavailable(true);
    scheduler.schedule(JobSpec::sync_reports()).await;

    let results = run_due(&scheduler).await;
    assert_eq!(results.len(), 1);
    assert!(matches!(results[0], WorkResult::Retry(_)));

    let registration = scheduler.registration(SYNC_REPORTS_JOB).await.unwrap();
    assert_eq!(registration.attempt, 1);
    // The first retry waits a full minute
    assert!(run_due(&scheduler).await.is_empty());
    assert_eq!(store.list_pending().await.unwrap().len(), 2);
    assert_eq!(remote.report_count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn submitted_reports_are_normalized() {
    let store = LocalStore::open_in_memory().unwrap();
    let service = ReportService::new(store.clone(), None);

    let outcome = service.submit(report("Porto", 5_000)).await.unwrap();

    let row = store.get_mutation(outcome.id()).await.unwrap().unwrap();
    assert_eq!(row.payload.condition, "rain");
    assert_eq!(row.payload.note, "steady drizzle");
}
