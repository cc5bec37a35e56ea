//! Periodic refresh of the home location snapshot.

use std::sync::Arc;

use async_trait::async_trait;

use super::{Job, WorkResult};
use crate::display::DisplaySink;
use crate::error::{Error, Result};
use crate::models::{CacheClass, CachedEntity, DisplaySummary};
use crate::remote::{PullOutcome, RemoteStore};
use crate::services::LocalStore;
use crate::util::{duration_millis, now_millis};

/// Result of a successful refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshOutcome {
    pub summary: DisplaySummary,
    /// Stale weather rows removed after the upsert
    pub evicted: usize,
}

#[derive(Clone)]
pub struct RefreshWorker {
    store: LocalStore,
    remote: Arc<dyn RemoteStore>,
    display: Arc<dyn DisplaySink>,
}

impl RefreshWorker {
    pub fn new(
        store: LocalStore,
        remote: Arc<dyn RemoteStore>,
        display: Arc<dyn DisplaySink>,
    ) -> Self {
        Self {
            store,
            remote,
            display,
        }
    }

    /// Pull the home snapshot, cache it and push a summary to the display.
    ///
    /// Any error leaves the display untouched.
    pub async fn refresh_at(&self, now: i64) -> Result<RefreshOutcome> {
        let settings = self.store.load_settings().await?;
        let Some(key) = settings.home_location_key else {
            return Err(Error::NotFound("no home location configured".to_string()));
        };

        let snapshot = match self.remote.pull(&key).await? {
            PullOutcome::Found(snapshot) => snapshot,
            PullOutcome::NotFound => {
                return Err(Error::NotFound(format!("no weather for {key}")));
            }
        };

        self.store
            .upsert_cache(&CachedEntity::from_value(
                &key,
                CacheClass::Weather,
                &snapshot,
                now,
            )?)
            .await?;
        if !snapshot.hourly.is_empty() {
            self.store
                .upsert_cache(&CachedEntity::from_value(
                    &key,
                    CacheClass::HourlyForecast,
                    &snapshot.hourly,
                    now,
                )?)
                .await?;
        }

        // Eviction is best effort; a fresh snapshot is already cached
        let cutoff = now.saturating_sub(duration_millis(CacheClass::Weather.ttl()));
        let evicted = match self.store.delete_older_than(cutoff, CacheClass::Weather).await {
            Ok(evicted) => evicted,
            Err(error) => {
                tracing::warn!("Stale weather eviction failed: {error}");
                0
            }
        };

        let summary = DisplaySummary::from_snapshot(&snapshot, settings.temperature_unit, now);
        if let Err(error) = self.display.update_display(&summary) {
            tracing::warn!("Display update failed: {error}");
        }

        tracing::info!(
            location = %summary.location_label,
            evicted,
            "Weather refreshed"
        );
        Ok(RefreshOutcome { summary, evicted })
    }
}

#[async_trait]
impl Job for RefreshWorker {
    async fn run(&self) -> WorkResult {
        match self.refresh_at(now_millis()).await {
            Ok(outcome) => WorkResult::success(1 + outcome.evicted),
            Err(error) => {
                tracing::warn!("Weather refresh failed: {error}");
                WorkResult::Retry(error.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{sample_snapshot, HourlyForecast, Settings, TemperatureUnit, WeatherSnapshot};
    use crate::remote::MemoryRemoteStore;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    const NOW: i64 = 1_700_000_000_000;
    const HOUR_MS: i64 = 60 * 60 * 1_000;

    #[derive(Default)]
    struct RecordingDisplay {
        updates: Mutex<Vec<DisplaySummary>>,
    }

    impl DisplaySink for RecordingDisplay {
        fn update_display(&self, summary: &DisplaySummary) -> Result<()> {
            self.updates.lock().unwrap().push(summary.clone());
            Ok(())
        }
    }

    struct Fixture {
        worker: RefreshWorker,
        store: LocalStore,
        remote: Arc<MemoryRemoteStore>,
        display: Arc<RecordingDisplay>,
    }

    async fn fixture(home: Option<&str>) -> Fixture {
        let store = LocalStore::open_in_memory().unwrap();
        store
            .save_settings(&Settings {
                home_location_key: home.map(ToString::to_string),
                temperature_unit: TemperatureUnit::Celsius,
            })
            .await
            .unwrap();
        let remote = Arc::new(MemoryRemoteStore::new());
        let display = Arc::new(RecordingDisplay::default());
        let worker = RefreshWorker::new(store.clone(), remote.clone(), display.clone());
        Fixture {
            worker,
            store,
            remote,
            display,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn found_snapshot_updates_cache_and_display() {
        let fx = fixture(Some("lisbon-pt")).await;
        fx.remote
            .insert_snapshot(sample_snapshot("lisbon-pt", NOW - 5 * 60_000));

        let outcome = fx.worker.refresh_at(NOW).await.unwrap();

        assert_eq!(outcome.summary.location_label, "Lisbon, PT");
        assert_eq!(outcome.summary.temperature, 18);
        assert_eq!(outcome.summary.humidity_pct, 64);
        assert_eq!(outcome.summary.freshness, "Updated 5m ago");
        assert_eq!(*fx.display.updates.lock().unwrap(), vec![outcome.summary]);

        let cached = fx
            .store
            .get_cache("lisbon-pt", CacheClass::Weather)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cached.fetched_at, NOW);
        let decoded: WeatherSnapshot = cached.decode().unwrap();
        assert_eq!(decoded.location_key, "lisbon-pt");
        assert!(fx
            .store
            .get_cache("lisbon-pt", CacheClass::HourlyForecast)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn hourly_entries_are_cached_separately() {
        let fx = fixture(Some("lisbon-pt")).await;
        let mut snapshot = sample_snapshot("lisbon-pt", NOW);
        snapshot.hourly = vec![HourlyForecast {
            at: NOW + HOUR_MS,
            temperature_c: 17.0,
            condition: "rain".to_string(),
        }];
        fx.remote.insert_snapshot(snapshot.clone());

        fx.worker.refresh_at(NOW).await.unwrap();

        let hourly: Vec<HourlyForecast> = fx
            .store
            .get_cache("lisbon-pt", CacheClass::HourlyForecast)
            .await
            .unwrap()
            .unwrap()
            .decode()
            .unwrap();
        assert_eq!(hourly, snapshot.hourly);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn refresh_evicts_stale_weather_rows() {
        let fx = fixture(Some("lisbon-pt")).await;
        fx.remote.insert_snapshot(sample_snapshot("lisbon-pt", NOW));
        let stale = CachedEntity::from_value(
            "porto-pt",
            CacheClass::Weather,
            &sample_snapshot("porto-pt", NOW - 25 * HOUR_MS),
            NOW - 25 * HOUR_MS,
        )
        .unwrap();
        fx.store.upsert_cache(&stale).await.unwrap();

        let outcome = fx.worker.refresh_at(NOW).await.unwrap();

        assert_eq!(outcome.evicted, 1);
        assert!(fx
            .store
            .get_cache("porto-pt", CacheClass::Weather)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_eviction_does_not_fail_refresh() {
        let fx = fixture(Some("lisbon-pt")).await;
        fx.remote.insert_snapshot(sample_snapshot("lisbon-pt", NOW));
        fx.store
            .execute_raw(
                "CREATE TRIGGER keep_cache BEFORE DELETE ON cache_entries
                 BEGIN SELECT RAISE(ABORT, 'eviction blocked'); END;",
            )
            .await
            .unwrap();

        let outcome = fx.worker.refresh_at(NOW).await.unwrap();

        assert_eq!(outcome.evicted, 0);
        assert_eq!(fx.display.updates.lock().unwrap().len(), 1);
        assert_eq!(fx.worker.run().await, WorkResult::success(1));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_home_key_is_retry() {
        let fx = fixture(None).await;

        assert!(matches!(fx.worker.run().await, WorkResult::Retry(_)));
        assert!(fx.display.updates.lock().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn not_found_is_retry_and_display_untouched() {
        let fx = fixture(Some("atlantis")).await;

        assert!(matches!(fx.worker.run().await, WorkResult::Retry(_)));
        assert!(fx.display.updates.lock().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn remote_error_is_retry_and_cache_untouched() {
        let fx = fixture(Some("lisbon-pt")).await;
        fx.remote.insert_snapshot(sample_snapshot("lisbon-pt", NOW));
        fx.remote.set_unavailable(true);

        assert!(matches!(fx.worker.run().await, WorkResult::Retry(_)));
        assert!(fx.display.updates.lock().unwrap().is_empty());
        assert!(fx
            .store
            .get_cache("lisbon-pt", CacheClass::Weather)
            .await
            .unwrap()
            .is_none());
    }
}
