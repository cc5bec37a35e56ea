//! Daily eviction of expired cache rows and delivered reports.

use std::time::Duration;

use async_trait::async_trait;

use super::{Job, WorkResult};
use crate::models::CacheClass;
use crate::services::LocalStore;
use crate::util::{duration_millis, now_millis};

/// How long a synced report is kept locally after confirmation.
pub const SYNCED_RETENTION: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Rows removed per category, plus the categories that could not be swept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub weather: usize,
    pub hourly_forecast: usize,
    pub synced_reports: usize,
    pub notifications: usize,
    pub errors: Vec<String>,
}

impl CleanupReport {
    pub fn total(&self) -> usize {
        self.weather + self.hourly_forecast + self.synced_reports + self.notifications
    }

    fn record(&mut self, category: &str, result: crate::Result<usize>) -> usize {
        match result {
            Ok(rows) => {
                tracing::debug!(category, rows, "Evicted expired rows");
                rows
            }
            Err(error) => {
                tracing::error!(category, "Cleanup step failed: {error}");
                self.errors.push(format!("{category}: {error}"));
                0
            }
        }
    }
}

#[derive(Clone)]
pub struct CleanupSweeper {
    store: LocalStore,
}

impl CleanupSweeper {
    pub const fn new(store: LocalStore) -> Self {
        Self { store }
    }

    /// Run every deletion against `now`; one failing step does not skip the others.
    pub async fn sweep_at(&self, now: i64) -> CleanupReport {
        let mut report = CleanupReport::default();

        let result = self
            .store
            .delete_older_than(cache_cutoff(now, CacheClass::Weather), CacheClass::Weather)
            .await;
        report.weather = report.record("weather", result);

        let result = self
            .store
            .delete_older_than(
                cache_cutoff(now, CacheClass::HourlyForecast),
                CacheClass::HourlyForecast,
            )
            .await;
        report.hourly_forecast = report.record("hourly_forecast", result);

        let result = self
            .store
            .delete_synced_older_than(now.saturating_sub(duration_millis(SYNCED_RETENTION)))
            .await;
        report.synced_reports = report.record("synced_reports", result);

        let result = self
            .store
            .delete_older_than(
                cache_cutoff(now, CacheClass::Notification),
                CacheClass::Notification,
            )
            .await;
        report.notifications = report.record("notifications", result);

        report
    }
}

fn cache_cutoff(now: i64, class: CacheClass) -> i64 {
    now.saturating_sub(duration_millis(class.ttl()))
}

#[async_trait]
impl Job for CleanupSweeper {
    async fn run(&self) -> WorkResult {
        let report = self.sweep_at(now_millis()).await;
        if report.errors.is_empty() {
            tracing::info!(removed = report.total(), "Cleanup finished");
            WorkResult::success(report.total())
        } else {
            WorkResult::Failure(report.errors.join("; "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{sample_payload, CachedEntity, SyncState};
    use pretty_assertions::assert_eq;

    const NOW: i64 = 1_700_000_000_000;
    const SECOND_MS: i64 = 1_000;

    async fn seed(store: &LocalStore, key: &str, class: CacheClass, fetched_at: i64) {
        let entity = CachedEntity {
            key: key.to_string(),
            class,
            payload: "{}".to_string(),
            fetched_at,
        };
        store.upsert_cache(&entity).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cache_eviction_boundary_per_class() {
        for class in CacheClass::ALL {
            let store = LocalStore::open_in_memory().unwrap();
            let ttl = duration_millis(class.ttl());
            seed(&store, "older", class, NOW - ttl - SECOND_MS).await;
            seed(&store, "younger", class, NOW - ttl + SECOND_MS).await;

            CleanupSweeper::new(store.clone()).sweep_at(NOW).await;

            assert!(
                store.get_cache("older", class).await.unwrap().is_none(),
                "{class} row past its TTL survived"
            );
            assert!(
                store.get_cache("younger", class).await.unwrap().is_some(),
                "{class} row within its TTL was evicted"
            );
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn classes_are_evicted_independently() {
        let store = LocalStore::open_in_memory().unwrap();
        // 7h old: past the hourly TTL, within the weather and notification TTLs
        let fetched_at = NOW - 7 * 60 * 60 * SECOND_MS;
        for class in CacheClass::ALL {
            seed(&store, "lisbon-pt", class, fetched_at).await;
        }

        let report = CleanupSweeper::new(store.clone()).sweep_at(NOW).await;

        assert_eq!(report.hourly_forecast, 1);
        assert_eq!(report.weather, 0);
        assert_eq!(report.notifications, 0);
        assert!(store
            .get_cache("lisbon-pt", CacheClass::Weather)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn synced_report_retention_boundary() {
        let store = LocalStore::open_in_memory().unwrap();
        let retention = duration_millis(SYNCED_RETENTION);
        let old = store.enqueue(sample_payload("old", 1_000)).await.unwrap();
        let recent = store.enqueue(sample_payload("recent", 2_000)).await.unwrap();
        let pending = store.enqueue(sample_payload("pending", 3_000)).await.unwrap();
        store.mark_synced(&old.id).await.unwrap();
        store.mark_synced(&recent.id).await.unwrap();
        store
            .execute_raw(&format!(
                "UPDATE mutations SET synced_at = {} WHERE id = '{}';
                 UPDATE mutations SET synced_at = {} WHERE id = '{}';",
                NOW - retention - SECOND_MS,
                old.id,
                NOW - retention + SECOND_MS,
                recent.id
            ))
            .await
            .unwrap();

        let report = CleanupSweeper::new(store.clone()).sweep_at(NOW).await;

        assert_eq!(report.synced_reports, 1);
        assert!(store.get_mutation(&old.id).await.unwrap().is_none());
        let kept = store.get_mutation(&recent.id).await.unwrap().unwrap();
        assert_eq!(kept.state, SyncState::Synced);
        // Pending rows are never swept
        assert!(store.get_mutation(&pending.id).await.unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn storage_error_is_failure_after_all_steps() {
        let store = LocalStore::open_in_memory().unwrap();
        seed(&store, "stale", CacheClass::Weather, NOW - 30 * 60 * 60 * SECOND_MS).await;
        store.execute_raw("DROP TABLE mutations;").await.unwrap();

        let report = CleanupSweeper::new(store.clone()).sweep_at(NOW).await;

        assert_eq!(report.weather, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("synced_reports"));
        assert!(matches!(
            CleanupSweeper::new(store).run().await,
            WorkResult::Failure(_)
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn empty_store_sweeps_cleanly() {
        let store = LocalStore::open_in_memory().unwrap();

        assert_eq!(
            CleanupSweeper::new(store).run().await,
            WorkResult::success(0)
        );
    }
}
