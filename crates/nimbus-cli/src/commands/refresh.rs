use chrono::Utc;
use nimbus_core::jobs::RefreshWorker;

use crate::commands::common::{display_sink, open_store, require_remote, Context};
use crate::error::CliError;

pub async fn run_refresh(ctx: &Context) -> Result<(), CliError> {
    let remote = require_remote(ctx, "refresh")?;
    let worker = RefreshWorker::new(open_store(ctx)?, remote, display_sink(ctx));

    let outcome = worker
        .refresh_at(Utc::now().timestamp_millis())
        .await
        .map_err(|error| CliError::Refresh(error.to_string()))?;

    let summary = outcome.summary;
    println!(
        "{} {}{} {} | humidity {}% | {}",
        summary.location_label,
        summary.temperature,
        summary.unit.symbol(),
        summary.condition_glyph,
        summary.humidity_pct,
        summary.freshness
    );
    Ok(())
}
