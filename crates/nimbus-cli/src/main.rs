//! Nimbus CLI - offline-first weather reports from the terminal
//!
//! Reports are queued locally and pushed when the remote store is reachable.

mod cli;
mod commands;
mod error;

use clap::Parser;
use nimbus_core::SyncConfig;

use crate::cli::{Cli, Commands};
use crate::commands::common::{resolve_db_path, Context};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    // Matches both nimbus_core and nimbus_cli targets
    if let Ok(directive) = "nimbus=info".parse::<tracing_subscriber::filter::Directive>() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let ctx = Context {
        db_path: resolve_db_path(cli.db_path)?,
        config: SyncConfig::from_env()?,
    };

    match cli.command {
        Commands::Report(args) => commands::report::run_report(args, &ctx).await?,
        Commands::Queue { all, limit, json } => {
            commands::queue::run_queue(all, limit, json, &ctx).await?;
        }
        Commands::Discard { id } => commands::queue::run_discard(&id, &ctx).await?,
        Commands::RetryFailed => commands::queue::run_retry_failed(&ctx).await?,
        Commands::Sync => commands::sync::run_sync(&ctx).await?,
        Commands::Refresh => commands::refresh::run_refresh(&ctx).await?,
        Commands::Cleanup => commands::cleanup::run_cleanup(&ctx).await?,
        Commands::Home { key, unit, clear } => {
            commands::home::run_home(key, unit, clear, &ctx).await?;
        }
        Commands::Status { json } => commands::status::run_status(json, &ctx).await?,
        Commands::Daemon { probe_interval } => {
            commands::daemon::run_daemon(probe_interval, &ctx).await?;
        }
    }

    Ok(())
}
