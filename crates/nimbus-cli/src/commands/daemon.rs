use std::sync::Arc;
use std::time::Duration;

use nimbus_core::jobs::{
    CleanupSweeper, JobSpec, RefreshWorker, Scheduler, SyncWorker, DAILY_CLEANUP_JOB,
    SYNC_REPORTS_JOB, WEATHER_REFRESH_JOB,
};
use nimbus_core::remote::{HttpRemoteStore, RemoteStore};
use nimbus_core::LocalStore;
use tokio_util::sync::CancellationToken;

use crate::commands::common::{display_sink, open_store, Context};
use crate::error::CliError;

pub async fn run_daemon(probe_interval: u64, ctx: &Context) -> Result<(), CliError> {
    let store = open_store(ctx)?;
    let remote = ctx.config.http_remote()?;
    let scheduler = Scheduler::new(ctx.config.job_table());

    scheduler
        .register_job(DAILY_CLEANUP_JOB, Arc::new(CleanupSweeper::new(store.clone())))
        .await;
    scheduler.schedule(JobSpec::daily_cleanup()).await;

    if let Some(http) = &remote {
        let shared: Arc<dyn RemoteStore> = Arc::new(http.clone());
        scheduler
            .register_job(
                SYNC_REPORTS_JOB,
                Arc::new(SyncWorker::new(store.clone(), Arc::clone(&shared))),
            )
            .await;
        scheduler
            .register_job(
                WEATHER_REFRESH_JOB,
                Arc::new(RefreshWorker::new(store.clone(), shared, display_sink(ctx))),
            )
            .await;
        scheduler.schedule(JobSpec::weather_refresh()).await;
    } else {
        tracing::warn!("NIMBUS_REMOTE_URL not set; only cleanup will run");
    }

    let shutdown = CancellationToken::new();
    let driver = tokio::spawn({
        let scheduler = scheduler.clone();
        let shutdown = shutdown.clone();
        async move { scheduler.run(shutdown).await }
    });
    let prober = remote.map(|http| {
        tokio::spawn(probe_connectivity(
            http,
            store,
            scheduler.clone(),
            Duration::from_secs(probe_interval.max(1)),
            shutdown.clone(),
        ))
    });

    println!("Nimbus daemon running. Press Ctrl-C to stop.");
    tokio::signal::ctrl_c().await?;

    shutdown.cancel();
    scheduler.cancel_all().await;
    if let Err(error) = driver.await {
        tracing::warn!("Scheduler task ended abnormally: {error}");
    }
    if let Some(prober) = prober {
        if let Err(error) = prober.await {
            tracing::warn!("Connectivity probe ended abnormally: {error}");
        }
    }
    Ok(())
}

/// Report reachability to the scheduler and make sure queued reports get a sync pass.
async fn probe_connectivity(
    remote: HttpRemoteStore,
    store: LocalStore,
    scheduler: Scheduler,
    every: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(every);
    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let connected = remote.probe().await;
        scheduler.set_connectivity(connected).await;
        if !connected {
            continue;
        }

        // Reports queued by other processes never reached this scheduler
        let pending = match store.count_by_state().await {
            Ok(counts) => counts.pending,
            Err(error) => {
                tracing::warn!("Could not read queue size: {error}");
                continue;
            }
        };
        if pending > 0 && scheduler.registration(SYNC_REPORTS_JOB).await.is_none() {
            scheduler.schedule(JobSpec::sync_reports()).await;
        }
    }
}
