use chrono::Utc;
use nimbus_core::jobs::CleanupSweeper;

use crate::commands::common::{open_store, Context};
use crate::error::CliError;

pub async fn run_cleanup(ctx: &Context) -> Result<(), CliError> {
    let sweeper = CleanupSweeper::new(open_store(ctx)?);
    let report = sweeper.sweep_at(Utc::now().timestamp_millis()).await;

    println!(
        "Removed {} weather, {} hourly, {} synced report(s), {} notification(s)",
        report.weather, report.hourly_forecast, report.synced_reports, report.notifications
    );
    if report.errors.is_empty() {
        Ok(())
    } else {
        Err(CliError::Cleanup(report.errors.join("; ")))
    }
}
