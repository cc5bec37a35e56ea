use nimbus_core::jobs::SyncWorker;

use crate::commands::common::{open_store, require_remote, Context};
use crate::error::CliError;

pub async fn run_sync(ctx: &Context) -> Result<(), CliError> {
    let remote = require_remote(ctx, "sync")?;
    let worker = SyncWorker::new(open_store(ctx)?, remote);

    let report = worker.sync_pass().await?;
    if report.synced + report.failed == 0 {
        println!("Nothing to sync");
    } else {
        println!("Synced {}, failed {}", report.synced, report.failed);
    }
    Ok(())
}
